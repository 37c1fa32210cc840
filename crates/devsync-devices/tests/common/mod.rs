//! Shared test doubles.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devsync_core::{Action, ActionConfig, Direction, PropertyState, PropertyValue};
use devsync_devices::{
    ActionDispatcher, HttpRequest, HttpResponse, HttpTransport, RequestThrottler, StatePublisher,
    TransportError,
};
use parking_lot::Mutex;
use tokio::time::Instant;

/// A request as seen by the transport, with the (tokio) time it arrived.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub at: Instant,
}

/// Transport answering from per-URL scripts.
///
/// Replies for a URL are consumed in order; the last one repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, TransportError>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn respond(&self, url: &str, body: &str) {
        self.push(url, Ok(HttpResponse::ok(body)));
    }

    pub fn respond_status(&self, url: &str, status: u16, body: &str) {
        self.push(
            url,
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub fn fail(&self, url: &str, error: TransportError) {
        self.push(url, Err(error));
    }

    fn push(&self, url: &str, reply: Result<HttpResponse, TransportError>) {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.request.url.clone())
            .collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.request.url == url)
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().push(RecordedRequest {
            request,
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut routes = self.routes.lock();
        match routes.get_mut(&url) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) if !script.is_empty() => script[0].clone(),
            _ => Err(TransportError::Connection(format!("no route for {}", url))),
        }
    }
}

/// Publisher recording every update.
#[derive(Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<(String, PropertyValue)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(String, PropertyValue)> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl StatePublisher for RecordingPublisher {
    async fn publish(&self, property: &str, value: &PropertyValue) {
        self.updates
            .lock()
            .push((property.to_string(), value.clone()));
    }
}

pub fn dispatcher(transport: Arc<ScriptedTransport>, state: PropertyState) -> ActionDispatcher {
    let throttler = RequestThrottler::new(transport, Duration::ZERO);
    ActionDispatcher::new(Arc::new(throttler), state)
}

pub fn get_action(config: ActionConfig, state: &PropertyState) -> Arc<Action> {
    Arc::new(Action::from_config(&config, Direction::Get, state).unwrap())
}

pub fn set_action(config: ActionConfig, state: &PropertyState) -> Arc<Action> {
    Arc::new(Action::from_config(&config, Direction::Set, state).unwrap())
}
