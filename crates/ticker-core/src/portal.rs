//! Configuration portal served while the device is its own access point.
//!
//! Two routes: `GET /` returns the settings form and `POST /save` validates
//! and persists a submission, then schedules a restart. The HTTP server
//! itself is a platform seam ([`HttpServer`]): `EspHttpServer` on the
//! device, axum in the simulator, [`crate::sim::SimServer`] in tests.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::TickerConfig;
use crate::device::Device;
use crate::form::FormSubmission;
use crate::settings::{KeyValueStore, SettingsStore};

/// The settings form.
pub const FORM_HTML: &str = include_str!("../assets/portal.html");

/// Largest accepted `POST /save` body, in bytes.
pub const MAX_FORM_BODY: usize = 1024;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

pub type FormBody = heapless::Vec<u8, MAX_FORM_BODY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Failed to register {method:?} {path}: {reason}")]
    Register {
        method: Method,
        path: String,
        reason: String,
    },

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Incremental access to a request body.
pub trait BodyReader {
    /// Read up to `buf.len()` bytes; `Ok(0)` at end of body.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PortalError>;
}

impl BodyReader for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PortalError> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

/// An incoming request as seen by a handler.
pub struct Request<'a> {
    /// Declared `Content-Length`, when the client sent one.
    pub content_length: Option<usize>,
    pub body: &'a mut dyn BodyReader,
}

/// Work to run after the response has been sent.
pub type PostResponse = Box<dyn FnOnce() + Send + 'static>;

pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub then: Option<PostResponse>,
}

impl Reply {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_HTML,
            body: body.into(),
            then: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT,
            body: body.into(),
            then: None,
        }
    }

    /// Attach an action the server runs once the response is on the wire.
    pub fn then(mut self, action: impl FnOnce() + Send + 'static) -> Self {
        self.then = Some(Box::new(action));
        self
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("body", &self.body)
            .field("then", &self.then.is_some())
            .finish()
    }
}

pub type Handler = Box<dyn Fn(Request<'_>) -> Reply + Send + Sync + 'static>;

/// Route registration on a platform HTTP server.
///
/// Implementations must send the reply before running [`Reply::then`].
pub trait HttpServer {
    fn register(&mut self, method: Method, path: &str, handler: Handler)
        -> Result<(), PortalError>;
}

/// Handles the portal routes.
pub struct ConfigService<K, C, D> {
    store: Mutex<SettingsStore<K>>,
    clock: Arc<C>,
    device: Arc<D>,
    restart_grace: Duration,
}

impl<K, C, D> ConfigService<K, C, D>
where
    K: KeyValueStore + 'static,
    C: Clock + 'static,
    D: Device + 'static,
{
    pub fn new(store: SettingsStore<K>, clock: C, device: D, config: &TickerConfig) -> Self {
        Self {
            store: Mutex::new(store),
            clock: Arc::new(clock),
            device: Arc::new(device),
            restart_grace: config.restart_grace(),
        }
    }

    /// Register both routes on `server`.
    pub fn mount<S: HttpServer + ?Sized>(self, server: &mut S) -> Result<(), PortalError> {
        let service = Arc::new(self);

        let form = Arc::clone(&service);
        server.register(Method::Get, "/", Box::new(move |_: Request<'_>| form.form()))?;

        let save = Arc::clone(&service);
        server.register(
            Method::Post,
            "/save",
            Box::new(move |req: Request<'_>| save.save(req)),
        )?;

        info!("Configuration portal ready");
        Ok(())
    }

    pub fn form(&self) -> Reply {
        debug!("GET /");
        Reply::html(FORM_HTML)
    }

    pub fn save(&self, mut request: Request<'_>) -> Reply {
        let body = match read_body(&mut request) {
            Ok(body) => body,
            Err(PortalError::BodyTooLarge { limit }) => {
                warn!("Rejected form body over {} bytes", limit);
                return Reply::text(500, "Content too long");
            }
            Err(e) => {
                warn!("{}", e);
                return Reply::text(500, "Failed to read request");
            }
        };

        let settings = match FormSubmission::parse(&body).and_then(FormSubmission::into_settings)
        {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Rejected form: {}", e);
                return Reply::text(400, e.to_string());
            }
        };

        let saved = self
            .store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .save(&settings);
        if let Err(e) = saved {
            error!("{}", e);
            return Reply::text(500, "Failed to save configuration");
        }
        info!(
            "Saved {}/{} every {}s",
            settings.asset_symbol, settings.currency_code, settings.refresh_interval_secs
        );

        let clock = Arc::clone(&self.clock);
        let device = Arc::clone(&self.device);
        let grace = self.restart_grace;
        Reply::text(
            200,
            format!(
                "Configuration saved. Device will restart in {} seconds...",
                grace.as_secs()
            ),
        )
        .then(move || {
            info!("Restarting in {:?}", grace);
            clock.sleep(grace);
            device.restart();
        })
    }
}

/// Read the whole body into a bounded buffer.
///
/// An oversized declared length is rejected before anything is read.
pub fn read_body(request: &mut Request<'_>) -> Result<FormBody, PortalError> {
    let too_large = PortalError::BodyTooLarge {
        limit: MAX_FORM_BODY,
    };
    if request.content_length.is_some_and(|len| len > MAX_FORM_BODY) {
        return Err(too_large);
    }

    let mut body = FormBody::new();
    let mut chunk = [0u8; 128];
    loop {
        let n = request.body.read(&mut chunk)?;
        if n == 0 {
            return Ok(body);
        }
        if body.extend_from_slice(&chunk[..n]).is_err() {
            return Err(too_large);
        }
    }
}
