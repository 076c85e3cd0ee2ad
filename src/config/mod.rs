use crate::credentials::Credentials;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Named credential profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// AWS access key ID
    pub access_key: String,

    /// AWS secret access key
    pub secret_key: String,

    /// Delegated user token (sent as `x-amz-security-token`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,

    /// Delegated product token, only meaningful with a user token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_token: Option<String>,
}

impl Profile {
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(self.access_key.clone(), self.secret_key.clone());
        match &self.user_token {
            Some(user) => credentials.with_delegated_tokens(user.clone(), self.product_token.clone()),
            None => credentials,
        }
    }
}

/// Retry budget of the request executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts allowed for 5xx responses before giving up
    #[serde(default = "default_internal_error_max")]
    pub internal_error_max: u32,

    /// Fixed sleep between 5xx retries, in milliseconds
    #[serde(default = "default_internal_error_delay_ms")]
    pub internal_error_delay_ms: u64,

    /// Immediate retries allowed for `RequestTimeout` errors
    #[serde(default = "default_request_timeout_max")]
    pub request_timeout_max: u32,

    /// Temporary redirects followed before giving up
    #[serde(default = "default_redirect_max")]
    pub redirect_max: u32,
}

fn default_internal_error_max() -> u32 {
    5
}

fn default_internal_error_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_max() -> u32 {
    5
}

fn default_redirect_max() -> u32 {
    5
}

impl RetryConfig {
    pub fn internal_error_delay(&self) -> Duration {
        Duration::from_millis(self.internal_error_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            internal_error_max: default_internal_error_max(),
            internal_error_delay_ms: default_internal_error_delay_ms(),
            request_timeout_max: default_request_timeout_max(),
            redirect_max: default_redirect_max(),
        }
    }
}

/// Multipart upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartConfig {
    /// Objects larger than this are uploaded in parts of at most this size
    #[serde(default = "default_max_part_size")]
    pub max_part_size: u64,

    /// Listing attempts while waiting for a new upload to become visible
    #[serde(default = "default_visibility_poll_attempts")]
    pub visibility_poll_attempts: u32,

    /// Sleep between visibility polls, in milliseconds
    #[serde(default = "default_visibility_poll_interval_ms")]
    pub visibility_poll_interval_ms: u64,

    /// Parts uploaded at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_max_part_size() -> u64 {
    5 * 1024 * 1024
}

fn default_visibility_poll_attempts() -> u32 {
    5
}

fn default_visibility_poll_interval_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    1
}

impl MultipartConfig {
    pub fn with_max_part_size(mut self, size: u64) -> Self {
        self.max_part_size = size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_visibility_poll(mut self, attempts: u32, interval_ms: u64) -> Self {
        self.visibility_poll_attempts = attempts;
        self.visibility_poll_interval_ms = interval_ms;
        self
    }

    pub fn visibility_poll_interval(&self) -> Duration {
        Duration::from_millis(self.visibility_poll_interval_ms)
    }
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_part_size: default_max_part_size(),
            visibility_poll_attempts: default_visibility_poll_attempts(),
            visibility_poll_interval_ms: default_visibility_poll_interval_ms(),
            concurrency: default_concurrency(),
        }
    }
}

/// Page sizes requested from listing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_distribution_page_size")]
    pub distribution_page_size: u32,
}

fn default_page_size() -> u32 {
    1000
}

fn default_distribution_page_size() -> u32 {
    100
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            distribution_page_size: default_distribution_page_size(),
        }
    }
}

/// Endpoint and behaviour settings shared by the storage and distribution clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Storage service host name (path-style addressing)
    #[serde(default = "default_s3_endpoint")]
    pub s3_endpoint: String,

    #[serde(default = "default_https_only")]
    pub https_only: bool,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Distribution API base URL
    #[serde(default = "default_cloudfront_endpoint")]
    pub cloudfront_endpoint: String,

    /// Distribution API version path segment
    #[serde(default = "default_cloudfront_version")]
    pub cloudfront_version: String,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub multipart: MultipartConfig,

    #[serde(default)]
    pub listing: ListingConfig,
}

fn default_s3_endpoint() -> String {
    "s3.amazonaws.com".to_string()
}

fn default_https_only() -> bool {
    true
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

fn default_cloudfront_endpoint() -> String {
    "https://cloudfront.amazonaws.com/".to_string()
}

fn default_cloudfront_version() -> String {
    "2010-11-01".to_string()
}

impl ClientConfig {
    /// Base URL of the storage service, e.g. `https://s3.amazonaws.com`
    ///
    /// The port is only spelled out when it differs from the scheme default.
    pub fn s3_base_url(&self, https: bool) -> String {
        let (scheme, port, default_port) = if https {
            ("https", self.https_port, 443)
        } else {
            ("http", self.http_port, 80)
        };
        if port == default_port {
            format!("{}://{}", scheme, self.s3_endpoint)
        } else {
            format!("{}://{}:{}", scheme, self.s3_endpoint, port)
        }
    }

    /// Distribution API base including the version segment, without trailing slash
    pub fn cloudfront_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.cloudfront_endpoint.trim_end_matches('/'),
            self.cloudfront_version
        )
    }

    /// XML namespace of the distribution API version
    pub fn cloudfront_namespace(&self) -> String {
        format!(
            "http://cloudfront.amazonaws.com/doc/{}/",
            self.cloudfront_version
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            s3_endpoint: default_s3_endpoint(),
            https_only: default_https_only(),
            http_port: default_http_port(),
            https_port: default_https_port(),
            cloudfront_endpoint: default_cloudfront_endpoint(),
            cloudfront_version: default_cloudfront_version(),
            retry: RetryConfig::default(),
            multipart: MultipartConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

/// Profiles file contents, keyed by profile name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named credential profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Profile used when none is requested explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Client settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, falling back to the default profile.
    ///
    /// Without a default profile the lookup only succeeds when the file holds
    /// exactly one profile; several candidates are ambiguous.
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else if self.profiles.len() == 1 {
            self.profiles.values().next()
        } else {
            None
        }
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

/// Load configuration from environment variables
///
/// - AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY (required)
/// - AWS_SESSION_TOKEN (optional, delegated user token)
/// - S3REST_ENDPOINT, S3REST_HTTPS_ONLY
/// - S3REST_CLOUDFRONT_ENDPOINT, S3REST_CLOUDFRONT_VERSION
/// - S3REST_INTERNAL_ERROR_MAX, S3REST_INTERNAL_ERROR_DELAY_MS
/// - S3REST_MAX_PART_SIZE, S3REST_MULTIPART_CONCURRENCY
pub fn load_from_env() -> Result<Config> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let mut config = Config::new();

    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .context("AWS_ACCESS_KEY_ID environment variable is not set")?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY environment variable is not set")?;
    let user_token = std::env::var("AWS_SESSION_TOKEN")
        .ok()
        .filter(|token| !token.is_empty());

    config.profiles.insert(
        "default".to_string(),
        Profile {
            access_key,
            secret_key,
            user_token,
            product_token: None,
        },
    );
    config.default_profile = Some("default".to_string());

    let client = &mut config.client;
    if let Ok(endpoint) = std::env::var("S3REST_ENDPOINT") {
        client.s3_endpoint = endpoint;
    }
    if let Some(https_only) = env_parse("S3REST_HTTPS_ONLY")? {
        client.https_only = https_only;
    }
    if let Ok(endpoint) = std::env::var("S3REST_CLOUDFRONT_ENDPOINT") {
        client.cloudfront_endpoint = endpoint;
    }
    if let Ok(version) = std::env::var("S3REST_CLOUDFRONT_VERSION") {
        client.cloudfront_version = version;
    }
    if let Some(max) = env_parse("S3REST_INTERNAL_ERROR_MAX")? {
        client.retry.internal_error_max = max;
    }
    if let Some(delay) = env_parse("S3REST_INTERNAL_ERROR_DELAY_MS")? {
        client.retry.internal_error_delay_ms = delay;
    }
    if let Some(size) = env_parse("S3REST_MAX_PART_SIZE")? {
        client.multipart.max_part_size = size;
    }
    if let Some(concurrency) = env_parse::<usize>("S3REST_MULTIPART_CONCURRENCY")? {
        client.multipart.concurrency = concurrency.max(1);
    }

    Ok(config)
}

/// Load configuration from a YAML file, or from the environment when no path is given
///
/// A requested profile must exist in the file; it becomes the default profile.
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        load_from_env()
    }
}
