//! Outbound request throttling.
//!
//! Devices behind these endpoints are often small embedded web servers that
//! fall over when several calls arrive at once. Every call waits
//! `in_flight × per_call_delay` before it goes out, so a burst is spread
//! out proportionally to how busy the accessory already is. There is no queue
//! and no ceiling: calls are delayed, never dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::permit::CountPermit;
use crate::transport::{BasicAuth, HttpRequest, HttpResponse, HttpTransport};

/// Per-accessory throttler in front of the transport.
pub struct RequestThrottler {
    transport: Arc<dyn HttpTransport>,
    per_call_delay: Duration,
    auth: Option<BasicAuth>,
    in_flight: AtomicUsize,
}

impl RequestThrottler {
    pub fn new(transport: Arc<dyn HttpTransport>, per_call_delay: Duration) -> Self {
        Self {
            transport,
            per_call_delay,
            auth: None,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Attach Basic credentials to every dispatched request.
    pub fn with_credentials(mut self, auth: BasicAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Calls dispatched and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn per_call_delay(&self) -> Duration {
        self.per_call_delay
    }

    /// Send a request after the throttling delay.
    ///
    /// The call counts as in flight from the moment this is called until it
    /// completes or the returned future is dropped.
    pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let slot = CountPermit::acquire(&self.in_flight);
        let ahead = slot.position();
        let delay = self
            .per_call_delay
            .saturating_mul(u32::try_from(ahead).unwrap_or(u32::MAX));

        debug!(
            in_flight = ahead + 1,
            delay_ms = delay.as_millis() as u64,
            "Dispatching {} {}",
            request.method,
            request.url
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if request.auth.is_none() {
            request.auth = self.auth.clone();
        }

        let result = self.transport.send(request).await;
        drop(slot);
        debug!(in_flight = self.in_flight(), "Call completed");
        result
    }
}

impl std::fmt::Debug for RequestThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottler")
            .field("per_call_delay", &self.per_call_delay)
            .field("in_flight", &self.in_flight())
            .field("has_credentials", &self.auth.is_some())
            .finish()
    }
}
