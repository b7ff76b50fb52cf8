//! # postrelay: Postimages Upload Relay
//!
//! `postrelay` is a single-endpoint HTTP relay in front of the Postimages public upload form.
//! A client POSTs an image as multipart form data; the relay re-submits it to the external
//! site's form, scrapes the HTML reply for a usable URL, and answers with JSON. Its entire job
//! is format translation - multipart in, JSON out - plus best-effort pattern extraction over an
//! unversioned external contract.
//!
//! ## Request Flow
//!
//! A `POST /upload` request moves through a fixed sequence: the uploaded file is spooled to a
//! temp directory, forwarded to the upstream upload form, and the response body is run through
//! an ordered chain of URL patterns ([`extract`]). When the winning match is a page link rather
//! than a direct CDN URL, one extra GET dereferences that page before answering. The spooled
//! file is removed on every exit path. Each request is fully independent; the relay holds no
//! cross-request state.
//!
//! ## Core Components
//!
//! - [`api`]: the axum handlers and wire types for the inbound surface
//! - [`upstream`]: the outbound client for the image host, behind a trait seam for testing
//! - [`extract`]: the ordered-fallback URL extraction chain
//! - [`storage`]: transient spooling of uploads with guaranteed cleanup
//! - [`config`]: YAML + environment configuration, built once at startup
//! - [`errors`]: the service error enum and its JSON envelope

pub mod api;
pub mod config;
pub mod errors;
pub mod extract;
pub mod storage;
pub mod telemetry;
pub mod upstream;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

pub use config::Config;
use config::CorsOrigin;
use upstream::{PostimagesClient, Upstream};

/// Application state shared across all request handlers.
///
/// Holds the configuration built at startup and the outbound client. Everything else is
/// request-scoped. Generic over [`Upstream`] so tests can swap in a scripted client.
#[derive(Clone)]
pub struct AppState<U: Upstream = PostimagesClient> {
    pub config: Config,
    pub upstream: U,
}

/// Build the application router: the relay endpoint, a health probe, CORS, and tracing.
pub fn build_router<U: Upstream>(state: AppState<U>) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let upload_limit = state.config.max_upload_bytes as usize;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/upload",
            post(api::handlers::uploads::relay_upload::<U>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        cors = cors.allow_origin(Any);
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origin headers carry no trailing slash, Url::as_str does
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        cors = cors.allow_origin(origins);
    }

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Main application struct that owns the router and server lifecycle.
///
/// 1. **Create**: [`Application::new`] prepares the spool directory, builds the outbound
///    client and the router
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // The spool directory must exist before the first upload lands.
        tokio::fs::create_dir_all(&config.storage.temp_dir)
            .await
            .with_context(|| format!("failed to create temp dir {}", config.storage.temp_dir.display()))?;

        let upstream = PostimagesClient::new(config.upstream.clone());
        let state = AppState {
            config: config.clone(),
            upstream,
        };
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Upload relay listening on http://{}, forwarding to {}",
            bind_addr, self.config.upstream.upload_url
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shut down cleanly");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::path::Path;

    /// A config pointing the spool at a test-owned directory, everything else default.
    pub fn test_config(temp_dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.temp_dir = temp_dir.to_path_buf();
        config
    }

    /// Test server over the full router with a caller-supplied upstream.
    pub fn mock_server<U: Upstream>(config: Config, upstream: U) -> axum_test::TestServer {
        let router = build_router(AppState { config, upstream }).expect("Failed to build router");
        axum_test::TestServer::new(router).expect("Failed to create test server")
    }
}

#[cfg(test)]
mod test {
    use super::test_utils::{mock_server, test_config};
    use super::*;
    use axum::http::{header, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image_form() -> MultipartForm {
        MultipartForm::new().add_part(
            "image",
            Part::bytes(b"fake image bytes".to_vec())
                .file_name("photo.jpg")
                .mime_type("image/jpeg"),
        )
    }

    /// Full-stack run against a wiremock upstream through the real reqwest client.
    #[test_log::test(tokio::test)]
    async fn test_relay_round_trip_through_real_client() {
        let upstream_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><img src="https://i.postimg.cc/abc123/photo.jpg"></html>"#),
            )
            .expect(1)
            .mount(&upstream_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.upstream.upload_url = Url::parse(&upstream_server.uri()).unwrap();
        let upstream = PostimagesClient::new(config.upstream.clone());
        let server = mock_server(config, upstream);

        let response = server.post("/upload").multipart(image_form()).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["url"], "https://i.postimg.cc/abc123/photo.jpg");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_relay_surfaces_upstream_error_status() {
        let upstream_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&upstream_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.upstream.upload_url = Url::parse(&upstream_server.uri()).unwrap();
        let upstream = PostimagesClient::new(config.upstream.clone());
        let server = mock_server(config, upstream);

        let response = server.post("/upload").multipart(image_form()).await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "Error uploading to Postimages");
        assert!(body["detail"].as_str().unwrap().contains("502"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let upstream = PostimagesClient::new(config.upstream.clone());
        let server = mock_server(config, upstream);

        let response = server.get("/healthz").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_cross_origin_requests_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let upstream = PostimagesClient::new(config.upstream.clone());
        let server = mock_server(config, upstream);

        let response = server
            .get("/healthz")
            .add_header(header::ORIGIN, "http://some-frontend.example")
            .await;

        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            HeaderValue::from_static("*")
        );
    }

    #[test]
    fn test_cors_layer_rejects_nothing_by_default() {
        let config = Config::default();

        assert!(create_cors_layer(&config).is_ok());
    }

    #[test]
    fn test_cors_layer_accepts_specific_origins() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://app.example.com").unwrap())];

        assert!(create_cors_layer(&config).is_ok());
    }
}
