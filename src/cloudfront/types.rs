//! Edge distribution data model

use crate::listing::ListingKind;
use serde::{Deserialize, Serialize};

/// Host suffix of storage origins
pub const S3_ORIGIN_SUFFIX: &str = ".s3.amazonaws.com";

/// Download (HTTP) or streaming (RTMP) distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Standard,
    Streaming,
}

impl DistributionKind {
    /// Resource path segment under the API version
    pub fn path_segment(&self) -> &'static str {
        match self {
            DistributionKind::Standard => "distribution",
            DistributionKind::Streaming => "streaming-distribution",
        }
    }

    pub fn element(&self) -> &'static str {
        match self {
            DistributionKind::Standard => "Distribution",
            DistributionKind::Streaming => "StreamingDistribution",
        }
    }

    pub fn config_element(&self) -> &'static str {
        match self {
            DistributionKind::Standard => "DistributionConfig",
            DistributionKind::Streaming => "StreamingDistributionConfig",
        }
    }

    pub fn summary_element(&self) -> &'static str {
        match self {
            DistributionKind::Standard => "DistributionSummary",
            DistributionKind::Streaming => "StreamingDistributionSummary",
        }
    }

    pub fn listing_kind(&self) -> ListingKind {
        match self {
            DistributionKind::Standard => ListingKind::Distributions,
            DistributionKind::Streaming => ListingKind::StreamingDistributions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginProtocolPolicy {
    HttpOnly,
    MatchViewer,
}

impl OriginProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginProtocolPolicy::HttpOnly => "http-only",
            OriginProtocolPolicy::MatchViewer => "match-viewer",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "http-only" => Some(OriginProtocolPolicy::HttpOnly),
            "match-viewer" => Some(OriginProtocolPolicy::MatchViewer),
            _ => None,
        }
    }
}

/// Where a distribution fetches its content from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    S3 {
        dns_name: String,
        origin_access_identity: Option<String>,
    },
    Custom {
        dns_name: String,
        http_port: u16,
        https_port: u16,
        protocol_policy: OriginProtocolPolicy,
    },
}

impl Origin {
    /// Storage origin for `bucket`; a bare bucket name gets the storage host suffix
    pub fn s3_bucket(bucket: &str) -> Self {
        let dns_name = if bucket.ends_with(S3_ORIGIN_SUFFIX) {
            bucket.to_string()
        } else {
            format!("{}{}", bucket, S3_ORIGIN_SUFFIX)
        };
        Origin::S3 {
            dns_name,
            origin_access_identity: None,
        }
    }

    pub fn dns_name(&self) -> &str {
        match self {
            Origin::S3 { dns_name, .. } | Origin::Custom { dns_name, .. } => dns_name,
        }
    }

    /// Bucket name of a storage origin
    pub fn bucket_name(&self) -> Option<&str> {
        match self {
            Origin::S3 { dns_name, .. } => {
                Some(dns_name.strip_suffix(S3_ORIGIN_SUFFIX).unwrap_or(dns_name))
            }
            Origin::Custom { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingStatus {
    pub bucket: String,
    pub prefix: String,
}

/// Configuration document of a distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub origin: Option<Origin>,
    /// Client-chosen unique value that makes creation idempotent
    pub caller_reference: String,
    pub cnames: Vec<String>,
    pub comment: String,
    pub enabled: bool,
    pub default_root_object: Option<String>,
    pub trusted_signer_self: bool,
    pub trusted_signer_accounts: Vec<String>,
    pub logging: Option<LoggingStatus>,
    pub required_protocols: Vec<String>,
    /// Version tag returned with the config, required to change or delete it
    pub etag: Option<String>,
}

impl DistributionConfig {
    pub fn new(origin: Origin, caller_reference: impl Into<String>) -> Self {
        Self {
            origin: Some(origin),
            caller_reference: caller_reference.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_cname(mut self, cname: impl Into<String>) -> Self {
        self.cnames.push(cname.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_logging(mut self, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.logging = Some(LoggingStatus {
            bucket: bucket.into(),
            prefix: prefix.into(),
        });
        self
    }

    pub fn with_trusted_signer_self(mut self) -> Self {
        self.trusted_signer_self = true;
        self
    }

    pub fn with_default_root_object(mut self, key: impl Into<String>) -> Self {
        self.default_root_object = Some(key.into());
        self
    }

    pub fn with_required_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.required_protocols.push(protocol.into());
        self
    }

    /// Private distributions only serve signed URLs
    pub fn is_private(&self) -> bool {
        self.trusted_signer_self || !self.trusted_signer_accounts.is_empty()
    }
}

/// Changes to apply to the current configuration; `None` fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionConfigUpdate {
    pub origin: Option<Origin>,
    pub cnames: Option<Vec<String>>,
    pub comment: Option<String>,
    pub enabled: Option<bool>,
    /// `Some(None)` disables logging
    pub logging: Option<Option<LoggingStatus>>,
    pub trusted_signer_self: Option<bool>,
    pub trusted_signer_accounts: Option<Vec<String>>,
    pub required_protocols: Option<Vec<String>>,
    pub default_root_object: Option<String>,
}

impl DistributionConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_cnames(mut self, cnames: Vec<String>) -> Self {
        self.cnames = Some(cnames);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_logging(mut self, logging: Option<LoggingStatus>) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Disabled, no aliases, no logging and no trusted signers
    pub fn disable_for_deletion() -> Self {
        Self {
            cnames: Some(Vec::new()),
            comment: Some("Disabled prior to deletion".to_string()),
            enabled: Some(false),
            logging: Some(None),
            trusted_signer_self: Some(false),
            trusted_signer_accounts: Some(Vec::new()),
            required_protocols: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// New configuration document; caller reference and ETag always come from `current`
    pub fn apply(&self, current: &DistributionConfig) -> DistributionConfig {
        DistributionConfig {
            origin: self.origin.clone().or_else(|| current.origin.clone()),
            caller_reference: current.caller_reference.clone(),
            cnames: self.cnames.clone().unwrap_or_else(|| current.cnames.clone()),
            comment: self.comment.clone().unwrap_or_else(|| current.comment.clone()),
            enabled: self.enabled.unwrap_or(current.enabled),
            default_root_object: self
                .default_root_object
                .clone()
                .or_else(|| current.default_root_object.clone()),
            trusted_signer_self: self.trusted_signer_self.unwrap_or(current.trusted_signer_self),
            trusted_signer_accounts: self
                .trusted_signer_accounts
                .clone()
                .unwrap_or_else(|| current.trusted_signer_accounts.clone()),
            logging: self.logging.clone().unwrap_or_else(|| current.logging.clone()),
            required_protocols: self
                .required_protocols
                .clone()
                .unwrap_or_else(|| current.required_protocols.clone()),
            etag: current.etag.clone(),
        }
    }
}

/// Signer currently able to sign URLs for a private distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSigner {
    /// `Self` or an account number
    pub account: String,
    pub key_pair_ids: Vec<String>,
}

/// A distribution, either fully described or as a listing summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub kind: DistributionKind,
    pub id: String,
    pub status: String,
    pub last_modified_time: Option<String>,
    pub domain_name: String,
    pub in_progress_invalidations: Option<u32>,
    pub active_signers: Vec<ActiveSigner>,
    /// Summaries only carry origin, aliases, comment and enabled flag
    pub config: DistributionConfig,
}

impl Distribution {
    pub fn new(kind: DistributionKind) -> Self {
        Self {
            kind,
            id: String::new(),
            status: String::new(),
            last_modified_time: None,
            domain_name: String::new(),
            in_progress_invalidations: None,
            active_signers: Vec::new(),
            config: DistributionConfig::default(),
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.status == "Deployed"
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.config.origin.as_ref()
    }
}

/// An edge cache invalidation request and its progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub id: String,
    pub status: String,
    pub create_time: Option<String>,
    pub paths: Vec<String>,
    pub caller_reference: String,
}

impl Invalidation {
    pub fn is_completed(&self) -> bool {
        self.status == "Completed"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationSummary {
    pub id: String,
    pub status: String,
}

/// Path prefix under which origins reference an access identity
pub const ORIGIN_ACCESS_IDENTITY_PREFIX: &str = "origin-access-identity/cloudfront/";

/// Configuration of an origin access identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAccessIdentityConfig {
    pub caller_reference: String,
    pub comment: String,
    /// `ETag` of the stored config, required for updates and deletion
    pub etag: Option<String>,
}

/// Identity a distribution uses to read private storage objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginAccessIdentity {
    pub id: String,
    /// Canonical user id to grant read access to in object ACLs
    pub s3_canonical_user_id: String,
    /// Listing summaries only carry the comment
    pub config: OriginAccessIdentityConfig,
}

impl OriginAccessIdentity {
    /// Value for an origin's `OriginAccessIdentity` element
    pub fn origin_reference(&self) -> String {
        format!("{}{}", ORIGIN_ACCESS_IDENTITY_PREFIX, self.id)
    }
}
