//! HTTP accessory: the facade the host talks to.

use std::sync::Arc;

use dashmap::DashMap;
use devsync_core::{
    compact_name, AccessoryConfig, ActionRegistry, Direction, PropertyFormat, PropertyState,
    PropertyValue,
};
use futures::future::join_all;
use tracing::{debug, info};

use crate::dispatch::ActionDispatcher;
use crate::error::SyncResult;
use crate::publisher::StatePublisher;
use crate::synchronizer::{PropertySynchronizer, SyncSettings};
use crate::throttler::RequestThrottler;
use crate::transport::{BasicAuth, HttpTransport};

/// Property answered from configuration instead of HTTP.
pub const NAME_PROPERTY: &str = "Name";

/// One configured device, exposing typed property reads and writes.
///
/// Synchronizers are created on first use of a property and share the
/// accessory's throttler and property state. Properties are keyed by their
/// compact name, so `Rotation Speed` and `RotationSpeed` are one property.
pub struct HttpAccessory {
    config: AccessoryConfig,
    state: PropertyState,
    registry: ActionRegistry,
    dispatcher: ActionDispatcher,
    publisher: Arc<dyn StatePublisher>,
    synchronizers: DashMap<String, Arc<PropertySynchronizer>>,
}

impl HttpAccessory {
    /// Build the accessory, compiling every configured action.
    pub fn new(
        config: AccessoryConfig,
        transport: Arc<dyn HttpTransport>,
        publisher: Arc<dyn StatePublisher>,
    ) -> SyncResult<Self> {
        let state = PropertyState::new();
        let registry = ActionRegistry::from_config(&config.urls, &state)?;

        let mut throttler = RequestThrottler::new(transport, config.uri_calls_delay());
        if config.has_credentials() {
            throttler = throttler.with_credentials(BasicAuth {
                username: config.username.clone(),
                password: config.password.clone(),
                preemptive: config.immediately,
            });
        }
        let dispatcher = ActionDispatcher::new(Arc::new(throttler), state.clone());

        info!(
            "Accessory '{}' ready: {} actions, refresh {:?}, setter delay {:?}",
            config.name,
            registry.len(),
            config.refresh_interval(),
            config.setter_delay()
        );

        Ok(Self {
            config,
            state,
            registry,
            dispatcher,
            publisher,
            synchronizers: DashMap::new(),
        })
    }

    /// Build the accessory on a reqwest transport.
    #[cfg(feature = "http")]
    pub fn connect(
        config: AccessoryConfig,
        publisher: Arc<dyn StatePublisher>,
    ) -> SyncResult<Self> {
        let transport = crate::transport::ReqwestTransport::new(config.request_timeout())?;
        Self::new(config, Arc::new(transport), publisher)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AccessoryConfig {
        &self.config
    }

    pub fn state(&self) -> &PropertyState {
        &self.state
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn throttler(&self) -> &RequestThrottler {
        self.dispatcher.throttler()
    }

    /// Host identify request; devices have no way to blink, so it is logged.
    pub fn identify(&self) {
        info!("Identify requested for '{}'", self.config.name);
    }

    /// Properties with at least one configured action.
    pub fn configured_properties(&self) -> Vec<String> {
        self.registry.properties()
    }

    /// Synchronizer of a property, created on first use.
    pub fn synchronizer(&self, property: &str) -> Arc<PropertySynchronizer> {
        let key = compact_name(property);
        if let Some(existing) = self.synchronizers.get(&key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .synchronizers
            .entry(key.clone())
            .or_insert_with(|| {
                let settings = SyncSettings::new(key.as_str())
                    .with_format(self.format_of(property))
                    .with_get_action(self.registry.resolve(property, Direction::Get))
                    .with_set_action(self.registry.resolve(property, Direction::Set))
                    .with_refresh_interval(self.config.refresh_interval())
                    .with_setter_delay(self.config.setter_delay());
                debug!(
                    "Created synchronizer for '{}' (get: {}, set: {})",
                    key,
                    settings.get_action.is_some(),
                    settings.set_action.is_some()
                );
                Arc::new(PropertySynchronizer::new(
                    settings,
                    self.dispatcher.clone(),
                    Arc::clone(&self.publisher),
                ))
            });
        Arc::clone(entry.value())
    }

    /// Read a property.
    ///
    /// `Ok(None)` means no value is known and the host keeps its own.
    pub async fn read(&self, property: &str) -> SyncResult<Option<PropertyValue>> {
        if property == NAME_PROPERTY {
            return Ok(Some(PropertyValue::String(self.config.name.clone())));
        }
        self.synchronizer(property).read().await
    }

    /// Read several properties concurrently.
    pub async fn read_many(
        &self,
        properties: &[String],
    ) -> Vec<(String, SyncResult<Option<PropertyValue>>)> {
        let reads = properties.iter().map(|property| async move {
            (property.clone(), self.read(property).await)
        });
        join_all(reads).await
    }

    /// Write a property.
    pub async fn write(&self, property: &str, value: PropertyValue) -> SyncResult<()> {
        self.synchronizer(property).write(value).await
    }

    /// Wait for every pending debounced write to reach the device.
    ///
    /// Returns the first failure after all writes have finished.
    pub async fn flush(&self) -> SyncResult<()> {
        let synchronizers: Vec<_> = self
            .synchronizers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let results = join_all(synchronizers.iter().map(|sync| sync.flush())).await;
        results.into_iter().collect()
    }

    /// Start polling every property that has a get-action.
    pub fn start_polling(&self) {
        for property in self.registry.properties() {
            if self.registry.resolve(&property, Direction::Get).is_some() {
                self.synchronizer(&property).ensure_polling();
            }
        }
    }

    /// Stop every poll and pending write.
    pub fn shutdown(&self) {
        for entry in self.synchronizers.iter() {
            entry.value().stop();
        }
        info!("Accessory '{}' shut down", self.config.name);
    }

    /// Declared format, matching props keys with or without whitespace.
    fn format_of(&self, property: &str) -> PropertyFormat {
        if self.config.props.contains_key(property) {
            return self.config.format_of(property);
        }
        let compact = compact_name(property);
        self.config
            .props
            .iter()
            .find(|(name, _)| compact_name(name) == compact)
            .and_then(|(_, props)| props.format.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for HttpAccessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAccessory")
            .field("name", &self.config.name)
            .field("actions", &self.registry.len())
            .field("synchronizers", &self.synchronizers.len())
            .finish()
    }
}
