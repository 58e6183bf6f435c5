use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::{lock, ManualClock};
use crate::clock::Clock;
use crate::portal::{Handler, HttpServer, Method, PortalError, Reply, Request};
use crate::quote::{FetchError, HttpClient};

#[derive(Debug, Default)]
struct Exchange {
    routes: HashMap<String, Result<Vec<u8>, u16>>,
    requests: Vec<(String, Duration)>,
}

/// HTTP client answering from a fixed table.
///
/// Unknown URLs fail as transport errors, like an unreachable host.
#[derive(Debug, Clone, Default)]
pub struct CannedHttp {
    exchange: Arc<Mutex<Exchange>>,
    clock: Option<ManualClock>,
}

impl CannedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record request times from `clock`.
    pub fn timed(clock: ManualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    pub fn respond(&self, url: &str, body: &[u8]) {
        lock(&self.exchange)
            .routes
            .insert(url.to_string(), Ok(body.to_vec()));
    }

    /// Answer `url` with a non-2xx status from now on.
    pub fn fail(&self, url: &str, status: u16) {
        lock(&self.exchange)
            .routes
            .insert(url.to_string(), Err(status));
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.exchange)
            .requests
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// When each request was made, on the clock given to [`timed`](Self::timed).
    pub fn request_times(&self) -> Vec<Duration> {
        lock(&self.exchange)
            .requests
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }
}

impl HttpClient for CannedHttp {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let at = self.clock.as_ref().map_or(Duration::ZERO, |c| c.now());
        let mut exchange = lock(&self.exchange);
        exchange.requests.push((url.to_string(), at));

        match exchange.routes.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Transport(format!("no route to {}", url))),
        }
    }
}

/// In-process [`HttpServer`] that dispatches requests synchronously.
///
/// The post-response action of a reply runs before `dispatch` returns.
#[derive(Default)]
pub struct SimServer {
    routes: HashMap<(Method, String), Handler>,
}

impl SimServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, method: Method, path: &str, body: &[u8]) -> Reply {
        let Some(handler) = self.routes.get(&(method, path.to_string())) else {
            debug!("No route for {:?} {}", method, path);
            return Reply::text(404, "Not found");
        };

        let mut reader = body;
        let mut reply = handler(Request {
            content_length: Some(body.len()),
            body: &mut reader,
        });
        if let Some(action) = reply.then.take() {
            action();
        }
        reply
    }
}

impl HttpServer for SimServer {
    fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), PortalError> {
        let key = (method, path.to_string());
        if self.routes.contains_key(&key) {
            return Err(PortalError::Register {
                method,
                path: path.to_string(),
                reason: "route already registered".to_string(),
            });
        }
        self.routes.insert(key, handler);
        Ok(())
    }
}
