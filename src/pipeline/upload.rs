//! Service interaction: send the document, receive the archive.
//!
//! [`ConversionService`] is the seam between the session and the outside
//! world. The session only knows that a call either yields archive bytes or a
//! [`ConversionFailure`]; [`HttpConversionService`] is the production
//! implementation and tests substitute scripted ones.
//!
//! ## Wire contract
//!
//! `POST {base_url}{endpoint_path}` with a `multipart/form-data` body holding
//! a single part (default name `file`) with the raw document bytes and its
//! original file name. A 2xx answer carries the ZIP archive as the body; any
//! other status is a service failure whose body may explain why.

use crate::config::ClientConfig;
use crate::error::{ConversionFailure, Docx2PngError};
use crate::pipeline::input::InputFile;
use crate::pipeline::response::failure_reason;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Converts one document into a packaged archive.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Submit `file` and wait for the service's answer.
    ///
    /// Implementations must not panic on bad responses; every failure is a
    /// [`ConversionFailure`].
    async fn convert(&self, file: &InputFile) -> Result<Bytes, ConversionFailure>;
}

/// [`ConversionService`] speaking multipart HTTP via `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    endpoint: Url,
    field_name: String,
}

impl HttpConversionService {
    /// Build a client for the endpoint described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, Docx2PngError> {
        let endpoint = config.endpoint_url()?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Docx2PngError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            field_name: config.field_name.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn form_for(&self, file: &InputFile) -> Result<Form, ConversionFailure> {
        let part = Part::bytes(file.content().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| transport(&e))?;
        Ok(Form::new().part(self.field_name.clone(), part))
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn convert(&self, file: &InputFile) -> Result<Bytes, ConversionFailure> {
        let start = Instant::now();
        info!(
            "Uploading {} ({} bytes) to {}",
            file.name(),
            file.len(),
            self.endpoint
        );

        let form = self.form_for(file)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = response.status();
        debug!("Service answered HTTP {} after {}ms", status, start.elapsed().as_millis());

        if status.is_success() {
            let body = response.bytes().await.map_err(|e| transport(&e))?;
            info!(
                "Received archive for {} ({} bytes, {}ms)",
                file.name(),
                body.len(),
                start.elapsed().as_millis()
            );
            return Ok(body);
        }

        let reason = match response.bytes().await {
            Ok(body) => failure_reason(&body),
            Err(e) => {
                debug!("Could not read error body: {}", e);
                None
            }
        };
        warn!(
            "Conversion of {} failed with HTTP {}: {}",
            file.name(),
            status,
            reason.as_deref().unwrap_or("<no reason>")
        );
        Err(ConversionFailure::Service {
            status: status.as_u16(),
            reason,
        })
    }
}

fn transport(e: &reqwest::Error) -> ConversionFailure {
    let reason = if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("could not connect: {e}")
    } else {
        e.to_string()
    };
    warn!("Transport failure: {}", reason);
    ConversionFailure::Transport { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_config() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let service = HttpConversionService::new(&config).unwrap();
        assert_eq!(service.endpoint().as_str(), "http://127.0.0.1:9/convert");
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_failure() {
        // Port 9 (discard) is closed on loopback in practice.
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .request_timeout_secs(5)
            .build()
            .unwrap();
        let service = HttpConversionService::new(&config).unwrap();
        let file = InputFile::new("x.docx", b"PK".to_vec());

        let err = service.convert(&file).await.unwrap_err();
        assert!(err.is_transport(), "got: {err:?}");
    }
}
