//! In-memory doubles for driving the fetch/extract pipeline without network
//! access or real waits.

use crate::error::{Error, Result};
use crate::fetcher::{RawResponse, Sleeper, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
enum Scripted {
    Response(RawResponse),
    Error(String),
}

/// Replays a fixed sequence of responses, one per request, and remembers
/// every URL it was asked for. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, status: u16, body: &str) -> Self {
        lock(&self.script).push_back(Scripted::Response(RawResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn with_status(self, status: u16) -> Self {
        self.with_response(status, "")
    }

    pub fn with_error(self, message: &str) -> Self {
        lock(&self.script).push_back(Scripted::Error(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        lock(&self.requests).push(url.to_string());
        match lock(&self.script).pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(Error::Internal(message)),
            None => Err(Error::Internal(format!("no scripted response left for {}", url))),
        }
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.slept).clone()
    }

    pub fn total(&self) -> Duration {
        lock(&self.slept).iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.slept).push(duration);
    }
}
