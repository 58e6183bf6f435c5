//! HTTP client for the price endpoint and server for the portal.

use std::time::Duration;

use embedded_svc::http::{client::Client, Headers, Status};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
use esp_idf_svc::http::server::{Configuration as HttpServerConfiguration, EspHttpServer};
use esp_idf_svc::http::Method as EspMethod;
use log::{debug, error};
use ticker_core::portal::{BodyReader, Handler, HttpServer, Method, PortalError, Request};
use ticker_core::quote::{FetchError, HttpClient};

const READ_CHUNK: usize = 256;

/// HTTPS GET with the ESP-IDF certificate bundle.
pub struct EspHttpClient {
    timeout: Duration,
    max_body: usize,
}

impl EspHttpClient {
    /// Bodies are read up to one byte past `max_body`, enough for the
    /// caller to see an oversized response without buffering all of it.
    pub fn new(timeout: Duration, max_body: usize) -> Self {
        Self { timeout, max_body }
    }
}

fn transport(e: impl core::fmt::Debug) -> FetchError {
    FetchError::Transport(format!("{:?}", e))
}

impl HttpClient for EspHttpClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let conf = HttpClientConfiguration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut client = Client::wrap(EspHttpConnection::new(&conf).map_err(transport)?);
        let request = client.get(url).map_err(transport)?;
        let mut response = request.submit().map_err(transport)?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status(status));
        }

        let mut body = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        while body.len() <= self.max_body {
            let read = response.read(&mut chunk).map_err(transport)?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }
        debug!("Read {} byte response", body.len());
        Ok(body)
    }
}

/// Adapts any `embedded_svc` reader to the portal's [`BodyReader`].
struct BodyAdapter<'r, R>(&'r mut R);

impl<R: Read> BodyReader for BodyAdapter<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PortalError> {
        self.0
            .read(buf)
            .map_err(|e| PortalError::Body(format!("{:?}", e)))
    }
}

/// The portal on `EspHttpServer`.
pub struct EspPortalServer {
    server: EspHttpServer<'static>,
}

impl EspPortalServer {
    pub fn new() -> anyhow::Result<Self> {
        let conf = HttpServerConfiguration {
            stack_size: 10 * 1024,
            ..Default::default()
        };
        Ok(Self {
            server: EspHttpServer::new(&conf)?,
        })
    }
}

impl HttpServer for EspPortalServer {
    fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), PortalError> {
        let esp_method = match method {
            Method::Get => EspMethod::Get,
            Method::Post => EspMethod::Post,
        };

        self.server
            .fn_handler::<anyhow::Error, _>(path, esp_method, move |mut req| {
                let content_length = req.content_len().map(|n| n as usize);
                let mut reply = {
                    let mut body = BodyAdapter(&mut req);
                    handler(Request {
                        content_length,
                        body: &mut body,
                    })
                };

                req.into_response(reply.status, None, &[("Content-Type", reply.content_type)])?
                    .write_all(reply.body.as_bytes())?;

                if let Some(action) = reply.then.take() {
                    if let Err(e) = std::thread::Builder::new()
                        .name("portal-action".into())
                        .spawn(action)
                    {
                        error!("Failed to spawn post-response action: {}", e);
                    }
                }
                Ok(())
            })
            .map_err(|e| PortalError::Register {
                method,
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
