//! Live status queries against the designated backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::icon::IconDecoder;
use crate::models::{BackendStatusDescriptor, NativePingResponse};

/// A live connection target that can answer a status query.
#[async_trait]
pub trait BackendHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Perform one status round-trip. Must not block the runtime.
    async fn request_status(&self) -> Result<NativePingResponse, FetchError>;
}

/// Resolves configured backend names to live handles.
#[async_trait]
pub trait BackendConnectionRegistry: Send + Sync {
    async fn lookup(&self, name: &str) -> Option<Arc<dyn BackendHandle>>;
}

/// Issues a single, time-bounded status query per call.
#[derive(Clone)]
pub struct BackendStatusFetcher {
    registry: Arc<dyn BackendConnectionRegistry>,
    timeout: Duration,
}

impl BackendStatusFetcher {
    pub fn new(registry: Arc<dyn BackendConnectionRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Query `backend` once. Never retries.
    pub async fn fetch(&self, backend: &str) -> Result<BackendStatusDescriptor, FetchError> {
        let handle = self
            .registry
            .lookup(backend)
            .await
            .ok_or_else(|| FetchError::BackendUnavailable(backend.to_string()))?;

        let native = tokio::time::timeout(self.timeout, handle.request_status())
            .await
            .map_err(|_| FetchError::FetchTimeout {
                backend: backend.to_string(),
                timeout: self.timeout,
            })??;

        debug!(
            backend,
            protocol = native.version.protocol,
            "backend answered status query"
        );
        Ok(translate(backend, native))
    }
}

/// Convert a backend's status JSON into a descriptor.
///
/// A favicon that fails validation is dropped instead of failing the fetch.
fn translate(backend: &str, native: NativePingResponse) -> BackendStatusDescriptor {
    let favicon = native
        .favicon
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| match IconDecoder::decode(raw) {
            Ok(icon) => Some(icon),
            Err(err) => {
                warn!(backend, %err, "ignoring invalid backend favicon");
                None
            }
        });

    BackendStatusDescriptor {
        motd: native.description,
        protocol_version: native.version.protocol,
        version_label: native.version.name,
        players: native.players,
        favicon,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::icon::tests::png_base64;
    use crate::models::{Players, Version};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend used across the crate's tests.
    pub(crate) struct FakeBackend {
        pub(crate) name: String,
        pub(crate) response: Result<NativePingResponse, String>,
        pub(crate) delay: Duration,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeBackend {
        pub(crate) fn answering(name: &str, response: NativePingResponse) -> Self {
            Self {
                name: name.to_string(),
                response: Ok(response),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(name: &str, reason: &str) -> Self {
            Self {
                name: name.to_string(),
                response: Err(reason.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl BackendHandle for FakeBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn request_status(&self) -> Result<NativePingResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response
                .clone()
                .map_err(FetchError::InvalidResponse)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeRegistry {
        pub(crate) backends: HashMap<String, Arc<dyn BackendHandle>>,
    }

    impl FakeRegistry {
        pub(crate) fn with(backend: Arc<dyn BackendHandle>) -> Self {
            let mut backends = HashMap::new();
            backends.insert(backend.name().to_string(), backend);
            Self { backends }
        }
    }

    #[async_trait]
    impl BackendConnectionRegistry for FakeRegistry {
        async fn lookup(&self, name: &str) -> Option<Arc<dyn BackendHandle>> {
            self.backends.get(name).cloned()
        }
    }

    pub(crate) fn native(protocol: i32, label: &str) -> NativePingResponse {
        NativePingResponse {
            version: Version {
                name: label.to_string(),
                protocol,
            },
            players: Some(Players {
                max: 100,
                online: 10,
                sample: Vec::new(),
            }),
            description: Some(json!({ "text": "Live" })),
            favicon: None,
        }
    }

    fn fetcher_for(backend: FakeBackend, timeout: Duration) -> (BackendStatusFetcher, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let registry = FakeRegistry::with(backend.clone());
        (BackendStatusFetcher::new(Arc::new(registry), timeout), backend)
    }

    #[tokio::test]
    async fn test_fetch_translates_native_response() {
        let (fetcher, backend) = fetcher_for(
            FakeBackend::answering("lobby", native(47, "Paper 1.8.8")),
            Duration::from_secs(1),
        );

        let descriptor = fetcher.fetch("lobby").await.unwrap();
        assert_eq!(descriptor.motd, Some(json!({ "text": "Live" })));
        assert_eq!(descriptor.protocol_version, 47);
        assert_eq!(descriptor.version_label, "Paper 1.8.8");
        assert_eq!(descriptor.players.unwrap().online, 10);
        assert!(descriptor.favicon.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_unavailable() {
        let (fetcher, backend) = fetcher_for(
            FakeBackend::answering("lobby", native(47, "x")),
            Duration::from_secs(1),
        );

        let err = fetcher.fetch("survival").await.unwrap_err();
        assert!(matches!(err, FetchError::BackendUnavailable(ref name) if name == "survival"));
        assert!(!err.was_issued());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_without_retry() {
        let (fetcher, backend) = fetcher_for(
            FakeBackend::answering("lobby", native(47, "x")).with_delay(Duration::from_secs(5)),
            Duration::from_millis(50),
        );

        let err = fetcher.fetch("lobby").await.unwrap_err();
        assert!(matches!(err, FetchError::FetchTimeout { .. }));
        assert!(err.was_issued());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_error_is_propagated() {
        let (fetcher, _backend) = fetcher_for(
            FakeBackend::failing("lobby", "connection reset"),
            Duration::from_secs(1),
        );

        let err = fetcher.fetch("lobby").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_description_stays_absent() {
        let mut response = native(47, "x");
        response.description = None;
        response.players = None;
        let descriptor = translate("lobby", response);
        assert!(descriptor.motd.is_none());
        assert!(descriptor.players.is_none());
    }

    #[test]
    fn test_invalid_backend_favicon_is_dropped() {
        let mut response = native(47, "x");
        response.favicon = Some("data:image/png;base64,@@@".to_string());
        assert!(translate("lobby", response).favicon.is_none());
    }

    #[test]
    fn test_valid_backend_favicon_is_decoded() {
        let payload = png_base64(64, 64);
        let mut response = native(47, "x");
        response.favicon = Some(format!("data:image/png;base64,{payload}"));
        let icon = translate("lobby", response).favicon.unwrap();
        assert_eq!(icon.to_data_uri(), format!("data:image/png;base64,{payload}"));
    }
}
