//! HTTP Accessory Tests
//!
//! End-to-end flows through the accessory facade with a scripted transport:
//! configuration → registry → synchronizers → dispatch → publisher.

mod common;

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use common::{RecordingPublisher, ScriptedTransport};
use devsync_core::{AccessoryConfig, PropertyValue};
use devsync_devices::{
    ChannelPublisher, HttpAccessory, NoopPublisher, StatePublisher, SyncError, NAME_PROPERTY,
};
use parking_lot::Mutex;

const TV: &str = r#"{
    "name": "Living Room TV",
    "props": {
        "Volume": { "format": "uint8" },
        "Rotation Speed": { "format": "float" }
    },
    "urls": {
        "getPower": {
            "url": "http://tv/power",
            "mappers": [{ "type": "static", "parameters": { "mapping": { "ON": "1", "OFF": "0" } } }]
        },
        "setPower": { "url": "http://tv/power?on={value}" },
        "getVolume": {
            "url": "http://tv/status",
            "mappers": [{ "type": "jpath", "parameters": { "jpath": "$.volume" } }]
        },
        "setVolume": { "url": "http://tv/volume?level={value}" },
        "getRotationSpeed": { "url": "http://fan/speed" }
    }
}"#;

fn config() -> AccessoryConfig {
    AccessoryConfig::from_json_str(TV).unwrap()
}

fn accessory(
    config: AccessoryConfig,
    transport: Arc<ScriptedTransport>,
    publisher: Arc<dyn StatePublisher>,
) -> HttpAccessory {
    HttpAccessory::new(config, transport, publisher).unwrap()
}

#[tokio::test]
async fn test_name_is_answered_locally() {
    let transport = Arc::new(ScriptedTransport::new());
    let accessory = accessory(config(), transport.clone(), Arc::new(NoopPublisher));

    assert_eq!(accessory.name(), "Living Room TV");
    assert_eq!(
        accessory.read(NAME_PROPERTY).await.unwrap(),
        Some(PropertyValue::String("Living Room TV".to_string()))
    );
    assert!(transport.requests().is_empty());
    accessory.identify();
}

#[tokio::test]
async fn test_configured_properties() {
    let accessory = accessory(
        config(),
        Arc::new(ScriptedTransport::new()),
        Arc::new(NoopPublisher),
    );
    assert_eq!(
        accessory.configured_properties(),
        vec!["Power", "RotationSpeed", "Volume"]
    );
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let mut config = config();
    config.urls.get_mut("getVolume").unwrap().mappers[0] = devsync_core::MapperConfig::Regex {
        regexp: "(".to_string(),
        capture: None,
    };

    let result = HttpAccessory::new(
        config,
        Arc::new(ScriptedTransport::new()),
        Arc::new(NoopPublisher),
    );
    assert!(matches!(result, Err(SyncError::Configuration(_))));
}

#[tokio::test]
async fn test_power_scenario() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power", "ON");
    let accessory = accessory(config(), transport, Arc::new(NoopPublisher));

    assert_eq!(
        accessory.read("Power").await.unwrap(),
        Some(PropertyValue::String("1".to_string()))
    );
    assert_eq!(
        accessory.state().get("Power"),
        Some(PropertyValue::String("1".to_string()))
    );
}

#[tokio::test]
async fn test_formats_follow_props() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/status", r#"{"volume":"35"}"#);
    transport.respond("http://fan/speed", "12.5");
    let accessory = accessory(config(), transport, Arc::new(NoopPublisher));

    assert_eq!(
        accessory.read("Volume").await.unwrap(),
        Some(PropertyValue::Integer(35))
    );
    assert_eq!(
        accessory.read("Rotation Speed").await.unwrap(),
        Some(PropertyValue::Float(12.5))
    );
}

#[tokio::test]
async fn test_read_many() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power", "OFF");
    transport.respond("http://tv/status", r#"{"volume":10}"#);
    let accessory = accessory(config(), transport, Arc::new(NoopPublisher));

    let results = accessory
        .read_many(&["Power".to_string(), "Volume".to_string(), "Mute".to_string()])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "Power");
    assert_eq!(
        *results[0].1.as_ref().unwrap(),
        Some(PropertyValue::String("0".to_string()))
    );
    assert_eq!(
        *results[1].1.as_ref().unwrap(),
        Some(PropertyValue::Integer(10))
    );
    // No action configured: nothing known, no error
    assert_eq!(*results[2].1.as_ref().unwrap(), None);
}

#[tokio::test]
async fn test_write_without_set_action_is_noop() {
    let transport = Arc::new(ScriptedTransport::new());
    let accessory = accessory(config(), transport.clone(), Arc::new(NoopPublisher));

    accessory
        .write("Rotation Speed", PropertyValue::Float(50.0))
        .await
        .unwrap();
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_synchronizers_are_reused() {
    let accessory = accessory(
        config(),
        Arc::new(ScriptedTransport::new()),
        Arc::new(NoopPublisher),
    );
    let first = accessory.synchronizer("Volume");
    let second = accessory.synchronizer("Volume");
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test(start_paused = true)]
async fn test_watch_publishes_through_channel() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power", "ON");
    transport.respond("http://tv/status", r#"{"volume":20}"#);
    transport.respond("http://fan/speed", "3");
    let mut config = config();
    config.force_refresh_delay = 10;
    let (publisher, mut updates) = ChannelPublisher::new();
    let accessory = accessory(config, transport.clone(), Arc::new(publisher));

    accessory.start_polling();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut received = Vec::new();
    while let Ok(update) = updates.try_recv() {
        received.push((update.property, update.value));
    }
    received.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        received,
        vec![
            ("Power".to_string(), PropertyValue::String("1".to_string())),
            ("RotationSpeed".to_string(), PropertyValue::Float(3.0)),
            ("Volume".to_string(), PropertyValue::Integer(20)),
        ]
    );

    accessory.shutdown();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_throttling_is_shared_across_properties() {
    let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_secs(1)));
    transport.respond("http://tv/power", "ON");
    transport.respond("http://tv/status", r#"{"volume":20}"#);
    let mut config = config();
    config.uri_calls_delay = 300;
    let accessory = accessory(config, transport.clone(), Arc::new(NoopPublisher));

    let (power, volume) = tokio::join!(accessory.read("Power"), accessory.read("Volume"));
    power.unwrap();
    volume.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].at - requests[0].at >= Duration::from_millis(300));
}

/// Publisher that, on a Power update, writes Power back and also writes a
/// genuine Volume change, like a host automation reacting to the update.
#[derive(Default)]
struct ReactingPublisher {
    accessory: OnceLock<Weak<HttpAccessory>>,
    results: Mutex<Vec<String>>,
}

#[async_trait]
impl StatePublisher for ReactingPublisher {
    async fn publish(&self, property: &str, value: &PropertyValue) {
        if property != "Power" {
            return;
        }
        let Some(accessory) = self.accessory.get().and_then(Weak::upgrade) else {
            return;
        };
        accessory.write("Power", value.clone()).await.unwrap();
        accessory
            .write("Volume", PropertyValue::Integer(15))
            .await
            .unwrap();
        self.results.lock().push(format!("{}={}", property, value));
    }
}

#[tokio::test(start_paused = true)]
async fn test_echo_guard_is_per_property() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power", "ON");
    transport.respond("http://tv/status", r#"{"volume":20}"#);
    transport.respond("http://tv/volume?level=15", "");
    let mut config = config();
    config.force_refresh_delay = 60;
    let publisher = Arc::new(ReactingPublisher::default());
    let accessory = Arc::new(accessory(config, transport.clone(), publisher.clone()));
    publisher.accessory.set(Arc::downgrade(&accessory)).unwrap();

    accessory.read("Power").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(*publisher.results.lock(), vec!["Power=1".to_string()]);
    let urls = transport.urls();
    assert!(!urls.iter().any(|url| url.starts_with("http://tv/power?on=")));
    assert!(urls.contains(&"http://tv/volume?level=15".to_string()));

    accessory.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_debounced_writes_per_property() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power?on=1", "");
    transport.respond("http://tv/volume?level=30", "");
    let mut config = config();
    config.setter_delay = 200;
    let recorder = Arc::new(RecordingPublisher::new());
    let accessory = accessory(config, transport.clone(), recorder);

    accessory.write("Volume", PropertyValue::Integer(10)).await.unwrap();
    accessory.write("Power", PropertyValue::Integer(1)).await.unwrap();
    accessory.write("Volume", PropertyValue::Integer(30)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut urls = transport.urls();
    urls.sort();
    assert_eq!(
        urls,
        vec!["http://tv/power?on=1", "http://tv/volume?level=30"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_spaced_and_compact_names_share_one_property() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://fan/speed", "4");
    let mut config = config();
    config.force_refresh_delay = 60;
    let accessory = accessory(config, transport.clone(), Arc::new(NoopPublisher));

    accessory.start_polling();
    accessory.read("Rotation Speed").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(Arc::ptr_eq(
        &accessory.synchronizer("Rotation Speed"),
        &accessory.synchronizer("RotationSpeed")
    ));
    let speed_polls = transport
        .urls()
        .iter()
        .filter(|url| url.as_str() == "http://fan/speed")
        .count();
    assert_eq!(speed_polls, 1);
    assert_eq!(
        accessory.read("Rotation Speed").await.unwrap(),
        Some(PropertyValue::Float(4.0))
    );
    assert_eq!(
        accessory.state().get("RotationSpeed"),
        Some(PropertyValue::Float(4.0))
    );
    assert_eq!(accessory.state().get("Rotation Speed"), None);

    accessory.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_flush_sends_pending_writes() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("http://tv/power?on=0", "");
    transport.respond("http://tv/volume?level=25", "");
    let mut config = config();
    config.setter_delay = 500;
    let accessory = accessory(config, transport.clone(), Arc::new(NoopPublisher));

    accessory.write("Power", PropertyValue::Integer(0)).await.unwrap();
    accessory.write("Volume", PropertyValue::Integer(25)).await.unwrap();
    assert!(transport.requests().is_empty());

    accessory.flush().await.unwrap();
    let mut urls = transport.urls();
    urls.sort();
    assert_eq!(
        urls,
        vec!["http://tv/power?on=0", "http://tv/volume?level=25"]
    );
}
