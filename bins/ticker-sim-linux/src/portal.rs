//! Axum transport for the configuration portal.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ticker_core::portal::{Handler, HttpServer, Method, PortalError, Request};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Collects portal routes into an axum [`Router`].
#[derive(Clone)]
pub struct AxumPortal {
    router: Router,
}

impl AxumPortal {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone().layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl+C.
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind portal on {}", addr))?;
        info!("Portal listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down...");
                }
            })
            .await?;
        Ok(())
    }
}

impl HttpServer for AxumPortal {
    fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), PortalError> {
        let handler: Arc<Handler> = Arc::new(handler);
        let route = move |body: Bytes| dispatch(Arc::clone(&handler), body);
        let route = match method {
            Method::Get => get(route),
            Method::Post => post(route),
        };
        self.router = self.router.clone().route(path, route);
        Ok(())
    }
}

/// Run a core handler off the async runtime, then its post-response action.
async fn dispatch(handler: Arc<Handler>, body: Bytes) -> Response {
    let reply = tokio::task::spawn_blocking(move || {
        let mut reader: &[u8] = &body;
        handler(Request {
            content_length: Some(body.len()),
            body: &mut reader,
        })
    })
    .await;

    let mut reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            error!("Portal handler failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // The action sleeps through the grace period before acting, which
    // leaves the response time to reach the client.
    if let Some(action) = reply.then.take() {
        tokio::task::spawn_blocking(action);
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, reply.content_type)], reply.body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use pretty_assertions::assert_eq;
    use ticker_core::portal::{ConfigService, FORM_HTML};
    use ticker_core::settings::{KeyValueStore, SettingsStore, KEY_ASSET};
    use ticker_core::sim::{ManualClock, MemoryStore, RecordingDevice};
    use ticker_core::TickerConfig;
    use tower::ServiceExt;

    fn portal(kv: &MemoryStore) -> Router {
        let mut portal = AxumPortal::new();
        ConfigService::new(
            SettingsStore::new(kv.clone()),
            ManualClock::new(),
            RecordingDevice::new(),
            &TickerConfig::default(),
        )
        .mount(&mut portal)
        .unwrap();
        portal.router()
    }

    #[tokio::test]
    async fn test_get_root_returns_form() {
        let response = portal(&MemoryStore::new())
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, FORM_HTML.as_bytes());
    }

    #[tokio::test]
    async fn test_post_save_persists() {
        let kv = MemoryStore::new();
        let response = portal(&kv)
            .oneshot(
                axum::http::Request::post("/save")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("ssid=HomeNet&crypto=DOGE&currency=EUR&interval=90"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(kv.get_str(KEY_ASSET).unwrap().as_deref(), Some("DOGE"));
    }

    #[tokio::test]
    async fn test_post_invalid_is_bad_request() {
        let response = portal(&MemoryStore::new())
            .oneshot(
                axum::http::Request::post("/save")
                    .body(Body::from("ssid=&interval=5"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
