use serde::Deserialize;
use tracing::warn;

/// Main configuration for the media gateway
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Object store configuration
    pub store: StoreConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Connection profile for one store endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointProfile {
    #[serde(default = "default_internal_host")]
    pub host: String,
    #[serde(default = "default_internal_port")]
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
}

impl EndpointProfile {
    /// Endpoint URL understood by the S3 SDK
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Internal endpoint used for bucket bootstrap and object writes
    #[serde(default)]
    pub internal: EndpointProfile,
    /// Base URL advertised to clients in signed URLs, e.g. `https://files.example.com`
    pub public_base_url: Option<String>,
    /// Public endpoint overrides, used when no base URL is configured
    pub public_host: Option<String>,
    pub public_port: Option<u16>,
    pub public_ssl: Option<bool>,
    /// Store credentials
    pub access_key: String,
    pub secret_key: String,
    /// Store region
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket receiving direct uploads
    #[serde(default = "default_upload_bucket")]
    pub upload_bucket: String,
    /// Bucket for presigned checklist uploads (defaults to the upload bucket)
    pub presign_bucket: Option<String>,
    /// Skip the bucket existence check at startup
    #[serde(default)]
    pub skip_bucket_check: bool,
}

impl StoreConfig {
    /// Bucket used for presigned uploads
    pub fn presign_bucket(&self) -> &str {
        match self.presign_bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => &self.upload_bucket,
        }
    }

    /// Endpoint profile used when signing URLs handed to clients
    ///
    /// Prefers `public_base_url`; falls back to the per-field public
    /// overrides, then to the internal endpoint.
    pub fn signer_profile(&self) -> EndpointProfile {
        if let Some(raw) = &self.public_base_url {
            match parse_base_url(raw) {
                Some(profile) => return profile,
                None => warn!(
                    url = %raw,
                    "public_base_url parse failed, falling back to public host/port/ssl"
                ),
            }
        }

        EndpointProfile {
            host: self
                .public_host
                .clone()
                .unwrap_or_else(|| self.internal.host.clone()),
            port: self.public_port.unwrap_or(self.internal.port),
            use_ssl: self.public_ssl.unwrap_or(self.internal.use_ssl),
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "media-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_internal_host() -> String {
    "127.0.0.1".to_string()
}

fn default_internal_port() -> u16 {
    9000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_upload_bucket() -> String {
    "dev".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "media-gateway")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            // Add config file if present
            .add_source(config::File::with_name("config/gateway").required(false))
            .add_source(config::File::with_name("/etc/media-gateway/gateway").required(false))
            // Override with environment variables
            // GATEWAY__STORE__ACCESS_KEY -> store.access_key
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for EndpointProfile {
    fn default() -> Self {
        Self {
            host: default_internal_host(),
            port: default_internal_port(),
            use_ssl: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Parse `scheme://host[:port]` into an endpoint profile
fn parse_base_url(raw: &str) -> Option<EndpointProfile> {
    let (scheme, rest) = raw.split_once("://")?;
    let use_ssl = match scheme {
        "https" => true,
        "http" => false,
        _ => return None,
    };

    // Drop any path component
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port_str))
            if !port_str.is_empty() && port_str.chars().all(|c| c.is_ascii_digit()) =>
        {
            (host, port_str.parse().ok()?)
        }
        _ => (authority, if use_ssl { 443 } else { 80 }),
    };

    if host.is_empty() {
        return None;
    }

    Some(EndpointProfile {
        host: host.to_string(),
        port,
        use_ssl,
    })
}
