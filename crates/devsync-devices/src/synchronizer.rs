//! Per-property getter/setter synchronization.
//!
//! A [`PropertySynchronizer`] owns everything about one property of one
//! accessory:
//!
//! - **direct mode** (`refresh_interval == 0`): every read is a round trip;
//! - **polling mode**: reads answer from the cache, a background task keeps
//!   the cache fresh and publishes changes to the host;
//! - **debounced writes**: with a setter delay, only the last value written
//!   within the window reaches the device;
//! - **echo suppression**: a write issued by the host from inside the
//!   publish call of a polled value is that value echoed back and is not
//!   sent. Writes from any other task go through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devsync_core::{Action, PropertyFormat, PropertyValue};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::dispatch::ActionDispatcher;
use crate::error::{SyncError, SyncResult};
use crate::publisher::StatePublisher;

tokio::task_local! {
    /// Synchronizer whose publish call the current task is inside.
    static PUBLISHING: usize;
}

/// What a synchronizer needs to know about its property.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub property: String,
    pub format: PropertyFormat,
    pub get_action: Option<Arc<Action>>,
    pub set_action: Option<Arc<Action>>,
    /// Zero selects direct mode
    pub refresh_interval: Duration,
    /// Zero disables debouncing
    pub setter_delay: Duration,
}

impl SyncSettings {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            format: PropertyFormat::default(),
            get_action: None,
            set_action: None,
            refresh_interval: Duration::ZERO,
            setter_delay: Duration::ZERO,
        }
    }

    pub fn with_format(mut self, format: PropertyFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_get_action(mut self, action: Option<Arc<Action>>) -> Self {
        self.get_action = action;
        self
    }

    pub fn with_set_action(mut self, action: Option<Arc<Action>>) -> Self {
        self.set_action = action;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_setter_delay(mut self, delay: Duration) -> Self {
        self.setter_delay = delay;
        self
    }
}

/// State shared with the poll task and pending writes.
struct SyncShared {
    settings: SyncSettings,
    dispatcher: ActionDispatcher,
    publisher: Arc<dyn StatePublisher>,
    /// Raw value of the last poll result that was published
    last_emitted: Mutex<Option<String>>,
    stopped: AtomicBool,
}

impl SyncShared {
    fn property(&self) -> &str {
        &self.settings.property
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn in_own_publish(&self) -> bool {
        PUBLISHING.try_with(|id| *id == self.id()).unwrap_or(false)
    }

    fn store(&self, raw: &str) -> PropertyValue {
        let value = self.settings.format.coerce(raw);
        self.dispatcher
            .state()
            .set(self.settings.property.clone(), value.clone());
        debug!("Cached {} = {}", self.property(), value);
        value
    }

    async fn poll_loop(self: Arc<Self>, action: Arc<Action>) {
        loop {
            match self.dispatcher.get(Some(&*action)).await {
                Ok(Some(raw)) => self.on_polled(raw).await,
                Ok(None) => trace!("Poll of '{}' produced no value", self.property()),
                Err(e) => warn!("Poll of '{}' failed: {}", self.property(), e),
            }
            tokio::time::sleep(self.settings.refresh_interval).await;
        }
    }

    async fn on_polled(&self, raw: String) {
        {
            let mut last = self.last_emitted.lock();
            if last.as_deref() == Some(raw.as_str()) {
                trace!("'{}' unchanged ({})", self.property(), raw);
                return;
            }
            *last = Some(raw.clone());
        }

        let value = self.store(&raw);
        debug!("Publishing {} = {}", self.property(), value);
        PUBLISHING
            .scope(self.id(), self.publisher.publish(self.property(), &value))
            .await;
    }

    async fn send(&self, value: &PropertyValue) -> SyncResult<()> {
        self.dispatcher
            .set(self.property(), self.settings.set_action.as_deref(), value)
            .await
            .map_err(SyncError::from)
    }
}

/// Getter/setter engine of one property.
pub struct PropertySynchronizer {
    shared: Arc<SyncShared>,
    poll: Mutex<Option<JoinHandle<()>>>,
    pending_write: Mutex<Option<JoinHandle<SyncResult<()>>>>,
}

impl PropertySynchronizer {
    pub fn new(
        settings: SyncSettings,
        dispatcher: ActionDispatcher,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                settings,
                dispatcher,
                publisher,
                last_emitted: Mutex::new(None),
                stopped: AtomicBool::new(false),
            }),
            poll: Mutex::new(None),
            pending_write: Mutex::new(None),
        }
    }

    pub fn property(&self) -> &str {
        self.shared.property()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.shared.settings
    }

    pub fn is_polling_mode(&self) -> bool {
        !self.shared.settings.refresh_interval.is_zero()
    }

    /// Whether a poll task is running.
    pub fn is_polling(&self) -> bool {
        self.poll
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether a write from the current task would be treated as an echo.
    ///
    /// True only inside the publish call of this property's polled value.
    pub fn is_write_suppressed(&self) -> bool {
        self.shared.in_own_publish()
    }

    /// Last value stored for this property.
    pub fn cached(&self) -> Option<PropertyValue> {
        self.shared.dispatcher.state().get(self.property())
    }

    /// Current value of the property.
    ///
    /// `Ok(None)` means nothing is known yet and the host should keep the
    /// value it has. In polling mode this never waits on HTTP.
    pub async fn read(&self) -> SyncResult<Option<PropertyValue>> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SyncError::Stopped);
        }

        if self.is_polling_mode() {
            self.ensure_polling();
            let cached = self.cached();
            trace!("Read of '{}' from cache: {:?}", self.property(), cached);
            return Ok(cached);
        }

        let action = self.shared.settings.get_action.as_deref();
        match self.shared.dispatcher.get(action).await? {
            Some(raw) => Ok(Some(self.shared.store(&raw))),
            None => Ok(self.cached()),
        }
    }

    /// Send a value to the device.
    ///
    /// With a setter delay this returns immediately and errors of the
    /// eventual call are only logged.
    pub async fn write(&self, value: PropertyValue) -> SyncResult<()> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(SyncError::Stopped);
        }

        if self.is_write_suppressed() {
            debug!(
                "Ignoring write of {} to '{}': echo of a polled value",
                value,
                self.property()
            );
            return Ok(());
        }

        let delay = self.shared.settings.setter_delay;
        if delay.is_zero() {
            return self.shared.send(&value).await;
        }

        let shared = Arc::clone(&self.shared);
        let mut pending = self.pending_write.lock();
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                debug!("Superseding pending write of '{}'", self.property());
            }
            previous.abort();
        }

        debug!(
            "Scheduling write of {} to '{}' in {:?}",
            value,
            self.property(),
            delay
        );
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Own task: superseding a write must not cancel a call already on the wire
            let property = shared.property().to_string();
            let result = tokio::spawn(async move { shared.send(&value).await })
                .await
                .unwrap_or(Err(SyncError::Stopped));
            if let Err(e) = &result {
                warn!("Delayed write of '{}' failed: {}", property, e);
            }
            result
        }));
        Ok(())
    }

    /// Wait until the pending debounced write, if any, has reached the device.
    ///
    /// Returns the outcome of that call. A write superseded or dropped by
    /// [`stop`](Self::stop) counts as done.
    pub async fn flush(&self) -> SyncResult<()> {
        let Some(handle) = self.pending_write.lock().take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(_) => Err(SyncError::Stopped),
        }
    }

    /// Start the poll task if needed.
    ///
    /// Nothing happens in direct mode, without a get-action, or when a poll
    /// is already running.
    pub fn ensure_polling(&self) {
        if !self.is_polling_mode() || self.shared.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut poll = self.poll.lock();
        if poll.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Some(action) = self.shared.settings.get_action.clone() else {
            debug!("No get action for '{}', not polling", self.property());
            return;
        };

        info!(
            "Polling '{}' every {:?}",
            self.property(),
            self.shared.settings.refresh_interval
        );
        *poll = Some(tokio::spawn(Arc::clone(&self.shared).poll_loop(action)));
    }

    /// Stop polling and drop any pending write.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.poll.lock().take() {
            handle.abort();
            debug!("Stopped polling '{}'", self.property());
        }
        if let Some(handle) = self.pending_write.lock().take() {
            handle.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PropertySynchronizer {
    fn drop(&mut self) {
        if let Some(handle) = self.poll.get_mut().take() {
            handle.abort();
        }
        if let Some(handle) = self.pending_write.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for PropertySynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySynchronizer")
            .field("property", &self.property())
            .field("polling", &self.is_polling())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
