//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via `-f` flag or the
//! `POSTRELAY_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `POSTRELAY_` override YAML values
//! 3. **PORT** - Special case: overrides `port` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `POSTRELAY_STORAGE__TEMP_DIR=/var/spool/postrelay` sets the `storage.temp_dir` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port (both forms are accepted)
//! PORT=8080
//! POSTRELAY_PORT=8080
//!
//! # Point at a staging copy of the upload form
//! POSTRELAY_UPSTREAM__UPLOAD_URL="https://staging.postimages.org/"
//!
//! # Disable the upstream-HTML sample in extraction-failure responses
//! POSTRELAY_EXPOSE_DEBUG_SAMPLE=false
//! ```

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "POSTRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Built once at startup and carried in the application state; there is no ambient global
/// configuration. All fields have working defaults, so the relay runs with no config file at all.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Upstream image host settings
    pub upstream: UpstreamConfig,
    /// Temp-spool storage settings
    pub storage: StorageConfig,
    /// CORS settings for the inbound surface
    pub cors: CorsConfig,
    /// Maximum accepted size of an inbound upload request body, in bytes
    pub max_upload_bytes: u64,
    /// Include a truncated sample of the upstream HTML in extraction-failure responses.
    ///
    /// The sample is a diagnostic convenience but also discloses raw upstream content to the
    /// caller. Leave enabled only when the relay serves trusted/internal clients.
    pub expose_debug_sample: bool,
}

/// Settings for the external image host the relay forwards to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// The host's public upload form endpoint
    pub upload_url: Url,
    /// User-Agent header sent on every outbound request
    pub user_agent: String,
}

/// Settings for transient upload storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory uploads are spooled to for the duration of a request.
    /// Created at startup if missing.
    pub temp_dir: PathBuf,
}

/// CORS configuration for the inbound HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upstream: UpstreamConfig::default(),
            storage: StorageConfig::default(),
            cors: CorsConfig::default(),
            max_upload_bytes: 64 * 1024 * 1024,
            expose_debug_sample: true,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            upload_url: Url::parse("https://postimages.org/").unwrap(),
            user_agent: format!("postrelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("tmp"),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: None,
        }
    }
}

impl Config {
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("POSTRELAY_").split("__"))
            // Bare PORT is the conventional way to pick the listen port in container platforms
            .merge(Env::raw().only(&["PORT"]))
    }

    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        Self::figment(args).extract()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
