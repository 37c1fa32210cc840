//! Configuration Loading Tests
//!
//! Loads complete accessory definitions from disk and builds the action
//! registry from them:
//! - JSON and TOML files
//! - Mapper parameters of every type
//! - Nested inconclusive fallbacks
//! - Invalid files

use std::io::Write;

use devsync_core::{
    AccessoryConfig, ActionRegistry, Direction, Error, MapperConfig, PropertyFormat,
    PropertyState,
};
use tempfile::NamedTempFile;

const TV_JSON: &str = r#"{
    "name": "Living Room TV",
    "service": "Television",
    "optionCharacteristic": ["Volume"],
    "forceRefreshDelay": 5,
    "setterDelay": 200,
    "uriCallsDelay": 50,
    "username": "admin",
    "password": "secret",
    "props": { "Volume": { "format": "uint8", "minValue": 0, "maxValue": 100 } },
    "urls": {
        "getPower": {
            "url": "http://tv.local/status",
            "mappers": [
                { "type": "jpath", "parameters": { "jpath": "$.power" } },
                { "type": "static", "parameters": { "mapping": { "ON": "1", "OFF": "0" } } }
            ],
            "inconclusive": {
                "url": "http://tv.local/legacy/status",
                "mappers": [{ "type": "xpath", "parameters": { "xpath": "/status/power/text()", "index": 0 } }]
            }
        },
        "setPower": { "url": "http://tv.local/power", "httpMethod": "POST", "body": "{\"on\": {value}}" },
        "getVolume": {
            "url": "http://tv.local/volume",
            "resultOnError": 0,
            "mappers": [{ "type": "regex", "parameters": { "regexp": "level=(?P<level>\\d+)", "capture": "level" } }]
        },
        "setVolume": { "url": "http://tv.local/volume?level=${value / 10}" }
    }
}"#;

const FAN_TOML: &str = r#"
name = "Ceiling Fan"
forceRefreshDelay = 0

[props."Rotation Speed"]
format = "float"

[urls.getRotationSpeed]
url = "http://fan.local/speed"
mappers = [
    { type = "eval", parameters = { expression = "value / 2" } },
]

[urls.setRotationSpeed]
url = "http://fan.local/speed?value={value}"
httpMethod = "PUT"
"#;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_json_file() {
    let file = write_temp(".json", TV_JSON);
    let config = AccessoryConfig::load(file.path()).unwrap();

    assert_eq!(config.name, "Living Room TV");
    assert_eq!(config.service.as_deref(), Some("Television"));
    assert_eq!(config.option_characteristic, vec!["Volume"]);
    assert_eq!(config.force_refresh_delay, 5);
    assert!(config.has_credentials());
    assert_eq!(config.format_of("Volume"), PropertyFormat::Uint8);
    assert_eq!(config.urls.len(), 4);
    assert_eq!(config.urls["getVolume"].result_on_error.as_deref(), Some("0"));
}

#[test]
fn test_load_toml_file() {
    let file = write_temp(".toml", FAN_TOML);
    let config = AccessoryConfig::load(file.path()).unwrap();

    assert_eq!(config.name, "Ceiling Fan");
    assert_eq!(config.format_of("Rotation Speed"), PropertyFormat::Float);
    assert_eq!(config.urls["setRotationSpeed"].http_method, "PUT");
    assert!(matches!(
        config.urls["getRotationSpeed"].mappers[0],
        MapperConfig::Eval { .. }
    ));
}

#[test]
fn test_registry_from_loaded_config() {
    let file = write_temp(".json", TV_JSON);
    let config = AccessoryConfig::load(file.path()).unwrap();
    let registry = ActionRegistry::from_config(&config.urls, &PropertyState::new()).unwrap();

    assert_eq!(registry.properties(), vec!["Power", "Volume"]);

    let power = registry.resolve("Power", Direction::Get).unwrap();
    assert_eq!(power.mappers.len(), 2);
    assert_eq!(power.chain_len(), 2);

    let set_volume = registry.resolve("Volume", Direction::Set).unwrap();
    assert!(set_volume.url.has_expressions());
}

#[test]
fn test_registry_with_spaced_property_name() {
    let file = write_temp(".toml", FAN_TOML);
    let config = AccessoryConfig::load(file.path()).unwrap();
    let registry = ActionRegistry::from_config(&config.urls, &PropertyState::new()).unwrap();

    assert!(registry.resolve("Rotation Speed", Direction::Get).is_some());
    assert!(registry.resolve("Rotation Speed", Direction::Set).is_some());
}

#[test]
fn test_load_missing_file() {
    let result = AccessoryConfig::load("/nonexistent/devsync/accessory.json");
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_load_invalid_json() {
    let file = write_temp(".json", "{ \"name\": ");
    assert!(matches!(
        AccessoryConfig::load(file.path()),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn test_load_invalid_toml() {
    let file = write_temp(".toml", "name = ");
    assert!(matches!(AccessoryConfig::load(file.path()), Err(Error::Toml(_))));
}

#[test]
fn test_load_empty_name() {
    let file = write_temp(".json", r#"{ "name": "  " }"#);
    assert!(matches!(
        AccessoryConfig::load(file.path()),
        Err(Error::Configuration(_))
    ));
}
