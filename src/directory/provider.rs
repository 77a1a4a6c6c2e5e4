//! Directory data providers: bundled fixtures and an HTTP backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{DataConfig, FallbackPolicy, MockLatency};
use crate::directory::errors::{DataError, DataResult};
use crate::directory::types::{EvacuationPoint, ServiceEntity};

/// Boxed future type for data provider operations.
pub type DataFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const SERVICES_FIXTURE: &str = include_str!("fixtures/services.json");
const POINTS_FIXTURE: &str = include_str!("fixtures/evacuation_points.json");

const SERVICES_ENDPOINT: &str = "services";
const POINTS_ENDPOINT: &str = "evacuation-routes";

/// Bundled service records.
///
/// # Errors
/// Returns an error if the bundled fixture does not decode.
pub fn fixture_services() -> DataResult<Vec<ServiceEntity>> {
    Ok(serde_json::from_str(SERVICES_FIXTURE)?)
}

/// Bundled evacuation points.
///
/// # Errors
/// Returns an error if the bundled fixture does not decode.
pub fn fixture_evacuation_points() -> DataResult<Vec<EvacuationPoint>> {
    Ok(serde_json::from_str(POINTS_FIXTURE)?)
}

/// Source of directory records.
pub trait DataProvider: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Establish the connection.
    ///
    /// # Errors
    /// Returns an error if the backend is unusable.
    fn connect(&self) -> DataFuture<'_, DataResult<()>>;

    /// Fetch service entities.
    ///
    /// # Errors
    /// Returns an error if the records cannot be fetched or decoded.
    fn services(&self) -> DataFuture<'_, DataResult<Vec<ServiceEntity>>>;

    /// Fetch evacuation points.
    ///
    /// # Errors
    /// Returns an error if the records cannot be fetched or decoded.
    fn evacuation_points(&self) -> DataFuture<'_, DataResult<Vec<EvacuationPoint>>>;
}

/// Provider serving the bundled fixtures after a simulated delay.
#[derive(Clone, Debug, Default)]
pub struct MockDataProvider {
    latency: MockLatency,
}

impl MockDataProvider {
    /// Create a mock provider with the given latencies.
    #[must_use]
    pub const fn new(latency: MockLatency) -> Self {
        Self { latency }
    }
}

impl DataProvider for MockDataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self) -> DataFuture<'_, DataResult<()>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency.connect()).await;
            info!("connected to bundled directory (simulation mode)");
            Ok(())
        })
    }

    fn services(&self) -> DataFuture<'_, DataResult<Vec<ServiceEntity>>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency.services()).await;
            fixture_services()
        })
    }

    fn evacuation_points(&self) -> DataFuture<'_, DataResult<Vec<EvacuationPoint>>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency.points()).await;
            fixture_evacuation_points()
        })
    }
}

/// Provider backed by a REST API exposing `/services` and `/evacuation-routes`.
#[derive(Clone, Debug)]
pub struct HttpDataProvider {
    client: ReqwestClient,
    base_url: Url,
    policy: FallbackPolicy,
}

impl HttpDataProvider {
    /// Create a provider for `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse.
    pub fn new(base_url: &str, policy: FallbackPolicy) -> DataResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: ReqwestClient::new(),
            base_url,
            policy,
        })
    }

    /// Backend root, always ending in `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &'static str) -> DataResult<T> {
        let url = self.base_url.join(endpoint)?;
        debug!(url = %url, "fetching directory records");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn recover<T>(
        &self,
        endpoint: &'static str,
        result: DataResult<T>,
        fallback: fn() -> DataResult<T>,
    ) -> DataResult<T> {
        match (result, self.policy) {
            (Ok(records), _) => Ok(records),
            (Err(err), FallbackPolicy::FailSoft) => {
                warn!(endpoint, error = %err, "directory fetch failed; serving bundled records");
                fallback()
            }
            (Err(err), FallbackPolicy::FailHard) => Err(err),
        }
    }
}

impl DataProvider for HttpDataProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn connect(&self) -> DataFuture<'_, DataResult<()>> {
        Box::pin(async move {
            info!(base_url = %self.base_url, "connected to directory API");
            Ok(())
        })
    }

    fn services(&self) -> DataFuture<'_, DataResult<Vec<ServiceEntity>>> {
        Box::pin(async move {
            let result = self.fetch(SERVICES_ENDPOINT).await;
            self.recover(SERVICES_ENDPOINT, result, fixture_services)
        })
    }

    fn evacuation_points(&self) -> DataFuture<'_, DataResult<Vec<EvacuationPoint>>> {
        Box::pin(async move {
            let result = self.fetch(POINTS_ENDPOINT).await;
            self.recover(POINTS_ENDPOINT, result, fixture_evacuation_points)
        })
    }
}

/// Pick the provider described by `config`: HTTP when a base URL is set,
/// otherwise the bundled mock.
///
/// # Errors
/// Returns an error if the configured URL does not parse.
pub fn build_provider(config: &DataConfig) -> DataResult<Arc<dyn DataProvider>> {
    match &config.base_url {
        Some(base_url) => Ok(Arc::new(HttpDataProvider::new(base_url, config.policy)?)),
        None => Ok(Arc::new(MockDataProvider::new(config.latency))),
    }
}

/// Records loaded at startup.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    /// Service entities.
    pub services: Vec<ServiceEntity>,
    /// Evacuation points.
    pub evacuation_points: Vec<EvacuationPoint>,
    /// When the load finished.
    pub loaded_at: DateTime<Utc>,
}

/// Connect, then fetch services and evacuation points concurrently.
///
/// # Errors
/// Returns the first error reported by the provider.
pub async fn load_directory(provider: &dyn DataProvider) -> DataResult<DirectorySnapshot> {
    provider.connect().await?;
    let (services, evacuation_points) =
        tokio::try_join!(provider.services(), provider.evacuation_points())?;
    info!(
        provider = provider.name(),
        services = services.len(),
        evacuation_points = evacuation_points.len(),
        "directory loaded"
    );
    Ok(DirectorySnapshot {
        services,
        evacuation_points,
        loaded_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/api")
    }

    fn failing_router() -> Router {
        Router::new()
            .route("/api/services", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/api/evacuation-routes", get(|| async { "not json" }))
    }

    #[test]
    fn test_fixtures_decode() {
        assert_eq!(fixture_services().unwrap().len(), 9);
        assert_eq!(fixture_evacuation_points().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_mock_load_returns_fixtures() {
        let provider = MockDataProvider::new(MockLatency::ZERO);
        let snapshot = load_directory(&provider).await.unwrap();

        assert_eq!(snapshot.services.len(), 9);
        assert_eq!(snapshot.evacuation_points.len(), 5);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let provider =
            HttpDataProvider::new("http://localhost:3000/api", FallbackPolicy::FailSoft).unwrap();
        assert_eq!(provider.base_url().as_str(), "http://localhost:3000/api/");
        let joined = provider.base_url().join(POINTS_ENDPOINT).unwrap();
        assert_eq!(joined.as_str(), "http://localhost:3000/api/evacuation-routes");
    }

    #[test]
    fn test_build_provider_picks_by_url() {
        let mock = build_provider(&DataConfig::default()).unwrap();
        assert_eq!(mock.name(), "mock");

        let config = DataConfig {
            base_url: Some("http://localhost:3000/api".to_string()),
            ..DataConfig::default()
        };
        let http = build_provider(&config).unwrap();
        assert_eq!(http.name(), "http");
    }

    #[tokio::test]
    async fn test_http_provider_decodes_backend_records() {
        let router = Router::new()
            .route("/api/services", get(|| async { SERVICES_FIXTURE }))
            .route("/api/evacuation-routes", get(|| async { "[]" }));
        let base = serve(router).await;
        let provider = HttpDataProvider::new(&base, FallbackPolicy::FailHard).unwrap();

        let snapshot = load_directory(&provider).await.unwrap();
        assert_eq!(snapshot.services.len(), 9);
        assert!(snapshot.evacuation_points.is_empty());
    }

    #[tokio::test]
    async fn test_fail_soft_serves_fixtures() {
        let base = serve(failing_router()).await;
        let provider = HttpDataProvider::new(&base, FallbackPolicy::FailSoft).unwrap();

        assert_eq!(provider.services().await.unwrap().len(), 9);
        assert_eq!(provider.evacuation_points().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_fail_hard_surfaces_errors() {
        let base = serve(failing_router()).await;
        let provider = HttpDataProvider::new(&base, FallbackPolicy::FailHard).unwrap();

        assert!(matches!(
            provider.services().await,
            Err(DataError::Status {
                endpoint: SERVICES_ENDPOINT,
                status: 500
            })
        ));
        assert!(matches!(
            provider.evacuation_points().await,
            Err(DataError::Decode(_))
        ));
    }
}
