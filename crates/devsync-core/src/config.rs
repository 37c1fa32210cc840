//! Accessory configuration.
//!
//! The schema follows the keys used by HTTP accessory definitions in bridge
//! configuration files (camelCase). JSON and TOML are both accepted:
//!
//! ```json
//! {
//!   "name": "Living Room TV",
//!   "forceRefreshDelay": 5,
//!   "setterDelay": 200,
//!   "urls": {
//!     "getPower": {
//!       "url": "http://tv.local/status",
//!       "mappers": [{ "type": "static", "parameters": { "mapping": { "ON": "1", "OFF": "0" } } }]
//!     },
//!     "setPower": { "url": "http://tv.local/power?on={value}", "httpMethod": "POST" }
//!   }
//! }
//! ```
//!
//! Validation is limited to what serde enforces (required keys). Patterns and
//! expressions are compiled later by [`crate::registry::ActionRegistry`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::value::PropertyFormat;

/// Top-level configuration of one HTTP accessory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryConfig {
    /// Accessory name, returned for the `Name` property
    pub name: String,
    /// Host service type (carried through, not interpreted)
    #[serde(default)]
    pub service: Option<String>,
    /// Optional host properties to enable (carried through)
    #[serde(default)]
    pub option_characteristic: Vec<String>,
    /// Host props per property; `format` drives numeric coercion
    #[serde(default)]
    pub props: HashMap<String, PropertyProps>,
    /// Seconds between polls, 0 disables polling
    #[serde(default)]
    pub force_refresh_delay: u64,
    /// Milliseconds of write debounce, 0 disables debouncing
    #[serde(default)]
    pub setter_delay: u64,
    /// Milliseconds added per in-flight call before a new call is issued
    #[serde(default)]
    pub uri_calls_delay: u64,
    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
    /// Actions keyed by direction + property (`getPower`, `setVolume`)
    #[serde(default)]
    pub urls: BTreeMap<String, ActionConfig>,
    /// HTTP Basic username
    #[serde(default)]
    pub username: String,
    /// HTTP Basic password
    #[serde(default)]
    pub password: String,
    /// Send credentials with the first request instead of waiting for a challenge
    #[serde(default = "default_immediately")]
    pub immediately: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_immediately() -> bool {
    true
}

fn default_timeout() -> u64 {
    10
}

/// Host props of a single property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyProps {
    #[serde(default)]
    pub format: Option<PropertyFormat>,
    /// Remaining props (minValue, unit, perms, ...) for the host
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One HTTP action, possibly with a nested fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub url: String,
    #[serde(default = "default_http_method")]
    pub http_method: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_optional_scalar")]
    pub result_on_error: Option<String>,
    /// Mappers of unknown type are skipped with a warning
    #[serde(default, deserialize_with = "deserialize_mappers")]
    pub mappers: Vec<MapperConfig>,
    #[serde(default)]
    pub inconclusive: Option<Box<ActionConfig>>,
}

fn default_http_method() -> String {
    "GET".to_string()
}

impl ActionConfig {
    /// Minimal GET action, mostly useful in tests and examples.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_method: default_http_method(),
            body: String::new(),
            result_on_error: None,
            mappers: Vec::new(),
            inconclusive: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = method.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_mapper(mut self, mapper: MapperConfig) -> Self {
        self.mappers.push(mapper);
        self
    }

    pub fn with_result_on_error(mut self, value: impl Into<String>) -> Self {
        self.result_on_error = Some(value.into());
        self
    }

    pub fn with_inconclusive(mut self, fallback: ActionConfig) -> Self {
        self.inconclusive = Some(Box::new(fallback));
        self
    }
}

/// Mapper specification: `{ "type": ..., "parameters": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "lowercase")]
pub enum MapperConfig {
    Static {
        #[serde(deserialize_with = "deserialize_scalar_map")]
        mapping: HashMap<String, String>,
    },
    Regex {
        regexp: String,
        #[serde(default, deserialize_with = "deserialize_optional_scalar")]
        capture: Option<String>,
    },
    XPath {
        xpath: String,
        #[serde(default)]
        index: usize,
    },
    JPath {
        jpath: String,
        #[serde(default)]
        index: usize,
    },
    Eval {
        expression: String,
    },
}

impl AccessoryConfig {
    /// Minimal configuration with no actions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
            option_characteristic: Vec::new(),
            props: HashMap::new(),
            force_refresh_delay: 0,
            setter_delay: 0,
            uri_calls_delay: 0,
            debug: false,
            urls: BTreeMap::new(),
            username: String::new(),
            password: String::new(),
            immediately: default_immediately(),
            timeout: default_timeout(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a file, TOML when the extension is `.toml`, JSON otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };
        if config.name.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "accessory name is empty in {}",
                path.display()
            )));
        }
        Ok(config)
    }

    pub fn with_action(mut self, key: impl Into<String>, action: ActionConfig) -> Self {
        self.urls.insert(key.into(), action);
        self
    }

    pub fn with_format(mut self, property: impl Into<String>, format: PropertyFormat) -> Self {
        self.props.entry(property.into()).or_default().format = Some(format);
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.force_refresh_delay)
    }

    pub fn setter_delay(&self) -> Duration {
        Duration::from_millis(self.setter_delay)
    }

    pub fn uri_calls_delay(&self) -> Duration {
        Duration::from_millis(self.uri_calls_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Declared format of a property, `string` when none is configured.
    pub fn format_of(&self, property: &str) -> PropertyFormat {
        self.props
            .get(property)
            .and_then(|props| props.format.clone())
            .unwrap_or_default()
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

fn scalar_to_string(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err("expected a scalar, found null".to_string()),
        other => Err(format!("expected a scalar, found {}", other)),
    }
}

fn deserialize_optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

const MAPPER_TYPES: [&str; 5] = ["static", "regex", "xpath", "jpath", "eval"];

fn deserialize_mappers<'de, D>(deserializer: D) -> std::result::Result<Vec<MapperConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut mappers = Vec::new();
    for entry in Vec::<Value>::deserialize(deserializer)? {
        let kind = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| serde::de::Error::custom("mapper without a 'type'"))?
            .to_string();
        if !MAPPER_TYPES.contains(&kind.as_str()) {
            warn!("Skipping mapper of unknown type '{}'", kind);
            continue;
        }
        let mapper = MapperConfig::deserialize(entry).map_err(|e| {
            serde::de::Error::custom(format!("invalid '{}' mapper: {}", kind, e))
        })?;
        mappers.push(mapper);
    }
    Ok(mappers)
}

fn deserialize_scalar_map<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    HashMap::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            scalar_to_string(value)
                .map(|v| (key, v))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}
