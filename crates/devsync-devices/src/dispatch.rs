//! Action execution.
//!
//! [`ActionDispatcher::get`] runs a get-action and its inconclusive
//! fallbacks, [`ActionDispatcher::set`] renders and sends a set-action.

use std::sync::Arc;

use devsync_core::{apply_mappers, Action, ExpressionScope, PropertyState, PropertyValue, INCONCLUSIVE};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::throttler::RequestThrottler;
use crate::transport::HttpRequest;

/// Executes actions through the accessory's throttler.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    throttler: Arc<RequestThrottler>,
    state: PropertyState,
}

impl ActionDispatcher {
    pub fn new(throttler: Arc<RequestThrottler>, state: PropertyState) -> Self {
        Self { throttler, state }
    }

    pub fn throttler(&self) -> &RequestThrottler {
        &self.throttler
    }

    pub fn state(&self) -> &PropertyState {
        &self.state
    }

    /// Fetch and map a value.
    ///
    /// `Ok(None)` means no value was produced: there is no action, or the
    /// last action of the fallback chain was inconclusive. A transport
    /// failure is replaced by `result_on_error` when the failing action has
    /// one.
    pub async fn get(&self, action: Option<&Action>) -> Result<Option<String>, TransportError> {
        let Some(mut current) = action else {
            debug!("No get action, nothing to fetch");
            return Ok(None);
        };

        loop {
            let request = HttpRequest::new(current.method.clone(), current.url.source())
                .with_body(current.body.source());

            let response = match self.throttler.dispatch(request).await {
                Ok(response) => response,
                Err(e) => {
                    if let Some(fallback) = &current.result_on_error {
                        debug!(
                            "GET {} failed ({}), using resultOnError '{}'",
                            current.url.source(),
                            e,
                            fallback
                        );
                        return Ok(Some(fallback.clone()));
                    }
                    warn!("GET {} failed: {}", current.url.source(), e);
                    return Err(e);
                }
            };

            if !response.is_success() {
                debug!(
                    "{} answered HTTP {}, mapping the body anyway",
                    current.url.source(),
                    response.status
                );
            }

            let mapped = apply_mappers(&current.mappers, &response.body);
            if mapped != INCONCLUSIVE {
                return Ok(Some(mapped));
            }

            match current.inconclusive.as_deref() {
                Some(next) => {
                    debug!(
                        "Inconclusive result from {}, trying {}",
                        current.url.source(),
                        next.url.source()
                    );
                    current = next;
                }
                None => {
                    info!(
                        "Inconclusive result from {} and no fallback, keeping current value",
                        current.url.source()
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// Send a value to the device.
    ///
    /// A missing action, or one with an empty URL, is a successful no-op.
    pub async fn set(
        &self,
        property: &str,
        action: Option<&Action>,
        value: &PropertyValue,
    ) -> Result<(), TransportError> {
        let Some(action) = action.filter(|action| action.has_url()) else {
            debug!("No set action for '{}', ignoring write of {}", property, value);
            return Ok(());
        };

        let raw = value.to_string();
        let mapped = apply_mappers(&action.mappers, &raw);

        let request = {
            let scope = ExpressionScope::new()
                .with_state(&self.state)
                .with_variable("value", &raw)
                .with_variable("mapped_value", &mapped);
            let url = action.url.render(&scope, &mapped);
            let body = if action.body.is_empty() {
                String::new()
            } else {
                action.body.render(&scope, &mapped)
            };
            HttpRequest::new(action.method.clone(), url).with_body(body)
        };

        debug!(
            "Setting '{}' to '{}' ({} {})",
            property, mapped, request.method, request.url
        );

        match self.throttler.dispatch(request).await {
            Ok(response) => {
                if !response.is_success() {
                    debug!("Set of '{}' answered HTTP {}", property, response.status);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Set of '{}' failed: {}", property, e);
                Err(e)
            }
        }
    }
}
