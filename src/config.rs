//! Configuration types for DOCX-to-PNG conversion sessions.
//!
//! Everything a session needs to know about its surroundings lives in
//! [`ClientConfig`], built via its [`ClientConfigBuilder`]: where the
//! conversion service listens, how the upload is shaped, how the downloaded
//! archive is named, and (optionally) pre-built collaborators that replace
//! the HTTP client or the in-memory artifact store.

use crate::artifact::{ArtifactNaming, ArtifactStore};
use crate::error::Docx2PngError;
use crate::observer::SharedObserver;
use crate::pipeline::upload::ConversionService;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;

/// Origin of the conversion service when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Path of the conversion endpoint, appended to the base URL.
pub const DEFAULT_ENDPOINT_PATH: &str = "/convert";

/// Multipart field carrying the document bytes.
pub const DEFAULT_FIELD_NAME: &str = "file";

/// Message shown when a failure carries no usable reason.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Conversion failed";

/// Configuration for a conversion session.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docx2png::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://converter.internal:8000")
///     .request_timeout_secs(300)
///     .build()
///     .unwrap();
/// assert_eq!(
///     config.endpoint_url().unwrap().as_str(),
///     "http://converter.internal:8000/convert"
/// );
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Scheme, host and port (plus optional path prefix) of the service.
    /// Default: `http://localhost:8000`.
    pub base_url: String,

    /// Endpoint path appended to `base_url`. Default: `/convert`.
    pub endpoint_path: String,

    /// Name of the multipart field holding the file. Default: `file`.
    pub field_name: String,

    /// Transport-level timeout for the whole request, in seconds. Default: none.
    ///
    /// The session itself never times out a conversion; when this is set and
    /// elapses, the request ends as a transport failure.
    pub request_timeout_secs: Option<u64>,

    /// Message used when the service gives no reason. Default: `Conversion failed`.
    pub fallback_message: String,

    /// How the downloaded archive is named.
    pub naming: ArtifactNaming,

    /// Pre-constructed conversion service. Takes precedence over the HTTP
    /// client built from `base_url`.
    pub service: Option<Arc<dyn ConversionService>>,

    /// Pre-constructed artifact store. Default: an in-memory store.
    pub artifact_store: Option<Arc<dyn ArtifactStore>>,

    /// Observers notified after every transition.
    pub observers: Vec<SharedObserver>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            request_timeout_secs: None,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            naming: ArtifactNaming::default(),
            service: None,
            artifact_store: None,
            observers: Vec::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("endpoint_path", &self.endpoint_path)
            .field("field_name", &self.field_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fallback_message", &self.fallback_message)
            .field("naming", &self.naming)
            .field(
                "service",
                &self.service.as_ref().map(|_| "<dyn ConversionService>"),
            )
            .field(
                "artifact_store",
                &self.artifact_store.as_ref().map(|_| "<dyn ArtifactStore>"),
            )
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the conversion endpoint.
    ///
    /// The endpoint path is appended to whatever path the base URL already
    /// has, so `http://host/api` + `/convert` → `http://host/api/convert`.
    pub fn endpoint_url(&self) -> Result<Url, Docx2PngError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        );
        let url = Url::parse(&joined).map_err(|e| {
            Docx2PngError::InvalidConfig(format!("invalid service URL '{joined}': {e}"))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Docx2PngError::InvalidConfig(format!(
                "service URL must be http or https, got '{other}'"
            ))),
        }
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.config.field_name = name.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.config.fallback_message = message.into();
        self
    }

    pub fn naming(mut self, naming: ArtifactNaming) -> Self {
        self.config.naming = naming;
        self
    }

    pub fn service(mut self, service: Arc<dyn ConversionService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.config.artifact_store = Some(store);
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observers.push(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, Docx2PngError> {
        let c = &self.config;
        c.endpoint_url()?;
        if c.field_name.trim().is_empty() {
            return Err(Docx2PngError::InvalidConfig(
                "multipart field name must not be empty".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(Docx2PngError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.fallback_message.trim().is_empty() {
            return Err(Docx2PngError::InvalidConfig(
                "fallback message must not be empty".into(),
            ));
        }
        if c.naming.extension.is_empty() {
            return Err(Docx2PngError::InvalidConfig(
                "archive extension must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_service() {
        let config = ClientConfig::default();
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "http://localhost:8000/convert"
        );
        assert_eq!(config.field_name, "file");
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(config.fallback_message, "Conversion failed");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = ClientConfig::builder()
            .base_url("https://example.com/api/")
            .endpoint_path("convert")
            .build()
            .unwrap();
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "https://example.com/api/convert"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(
            ClientConfig::builder().base_url("not a url").build(),
            Err(Docx2PngError::InvalidConfig(_))
        ));
        assert!(matches!(
            ClientConfig::builder().base_url("ftp://example.com").build(),
            Err(Docx2PngError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_field_and_zero_timeout() {
        assert!(ClientConfig::builder().field_name(" ").build().is_err());
        assert!(ClientConfig::builder().request_timeout_secs(0).build().is_err());
        assert!(ClientConfig::builder()
            .request_timeout_secs(30)
            .build()
            .is_ok());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let config = ClientConfig::builder()
            .observer(Arc::new(crate::observer::NoopObserver))
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("observers: 1"), "got: {dbg}");
        assert!(dbg.contains("service: None"), "got: {dbg}");
    }
}
