//! Time-limited signed URLs
//!
//! Two kinds of target are supported:
//!
//! - storage objects, signed with the account's HMAC-SHA1 key and carrying
//!   `AWSAccessKeyId`, `Expires` and `Signature` query parameters;
//! - edge distribution resources, signed with an RSA key pair registered for
//!   the distribution and carrying `Expires` (canned policy) or `Policy`
//!   (custom policy) together with `Signature` and `Key-Pair-Id`.
//!
//! Distribution values use a URL-safe Base64 variant where `+`, `=` and `/`
//! become `-`, `_` and `~`.

use crate::config::ClientConfig;
use crate::error::{Result, ServiceError};
use crate::s3::signer::{uri_encode, RequestSigner};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hyper::Method;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source IP range that admits every client
pub const ANY_SOURCE_IP: &str = "0.0.0.0/0";

/// Base64 with `+`→`-`, `=`→`_`, `/`→`~`
pub fn encode_url_safe(data: &[u8]) -> String {
    BASE64
        .encode(data)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect()
}

/// Inverse of [`encode_url_safe`]
pub fn decode_url_safe(encoded: &str) -> Result<Vec<u8>> {
    let standard: String = encoded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '=',
            '~' => '/',
            other => other,
        })
        .collect();
    BASE64
        .decode(standard)
        .map_err(|e| ServiceError::Signing(format!("invalid URL-safe base64: {}", e)))
}

// ============================================================================
// Policy documents
// ============================================================================

#[derive(Serialize)]
struct PolicyDocument<'a> {
    #[serde(rename = "Statement")]
    statement: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
    #[serde(rename = "Resource")]
    resource: &'a str,
    #[serde(rename = "Condition")]
    condition: Condition<'a>,
}

#[derive(Serialize)]
struct Condition<'a> {
    #[serde(rename = "DateLessThan")]
    date_less_than: EpochTime,
    #[serde(rename = "IpAddress", skip_serializing_if = "Option::is_none")]
    ip_address: Option<SourceIp<'a>>,
    #[serde(rename = "DateGreaterThan", skip_serializing_if = "Option::is_none")]
    date_greater_than: Option<EpochTime>,
}

#[derive(Serialize)]
struct EpochTime {
    #[serde(rename = "AWS:EpochTime")]
    epoch_time: i64,
}

#[derive(Serialize)]
struct SourceIp<'a> {
    #[serde(rename = "AWS:SourceIp")]
    source_ip: &'a str,
}

fn policy_json(document: &PolicyDocument<'_>) -> Result<String> {
    serde_json::to_string(document)
        .map_err(|e| ServiceError::Signing(format!("failed to serialize policy: {}", e)))
}

/// Fixed-shape policy allowing access to `resource` until `expires`
pub fn canned_policy(resource: &str, expires: DateTime<Utc>) -> Result<String> {
    policy_json(&PolicyDocument {
        statement: [Statement {
            resource,
            condition: Condition {
                date_less_than: EpochTime {
                    epoch_time: expires.timestamp(),
                },
                ip_address: None,
                date_greater_than: None,
            },
        }],
    })
}

/// Policy with optional not-before time, source-IP range and wildcard resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPolicy {
    /// Resource pattern; `*` and `?` are wildcards. `None` means `*`.
    pub resource: Option<String>,
    pub date_less_than: DateTime<Utc>,
    pub date_greater_than: Option<DateTime<Utc>>,
    /// CIDR range; `None` means [`ANY_SOURCE_IP`]
    pub ip_address: Option<String>,
}

impl CustomPolicy {
    pub fn new(date_less_than: DateTime<Utc>) -> Self {
        Self {
            resource: None,
            date_less_than,
            date_greater_than: None,
            ip_address: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_date_greater_than(mut self, time: DateTime<Utc>) -> Self {
        self.date_greater_than = Some(time);
        self
    }

    pub fn with_ip_address(mut self, cidr: impl Into<String>) -> Self {
        self.ip_address = Some(cidr.into());
        self
    }

    /// JSON policy document
    pub fn to_json(&self) -> Result<String> {
        if let Some(start) = self.date_greater_than {
            if start >= self.date_less_than {
                return Err(ServiceError::InvalidArgument(format!(
                    "policy start {} is not before its expiry {}",
                    start, self.date_less_than
                )));
            }
        }

        policy_json(&PolicyDocument {
            statement: [Statement {
                resource: self.resource.as_deref().unwrap_or("*"),
                condition: Condition {
                    date_less_than: EpochTime {
                        epoch_time: self.date_less_than.timestamp(),
                    },
                    ip_address: Some(SourceIp {
                        source_ip: self.ip_address.as_deref().unwrap_or(ANY_SOURCE_IP),
                    }),
                    date_greater_than: self.date_greater_than.map(|t| EpochTime {
                        epoch_time: t.timestamp(),
                    }),
                },
            }],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPolicy {
    Canned { expires: DateTime<Utc> },
    Custom(CustomPolicy),
}

// ============================================================================
// Distribution signing key
// ============================================================================

/// RSA private key of a distribution key pair
#[derive(Clone)]
pub struct DistributionSigningKey {
    key: Arc<RsaPrivateKey>,
}

impl DistributionSigningKey {
    /// Load from PEM, PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`)
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ServiceError::Signing(format!("invalid RSA private key PEM: {}", e)))?;
        Ok(Self { key: Arc::new(key) })
    }

    /// Load from DER, PKCS#1 or PKCS#8
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_der(der)
            .or_else(|_| RsaPrivateKey::from_pkcs8_der(der))
            .map_err(|e| ServiceError::Signing(format!("invalid RSA private key DER: {}", e)))?;
        Ok(Self { key: Arc::new(key) })
    }

    /// RSA-SHA1 (PKCS#1 v1.5) signature of `data`
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha1::digest(data);
        self.key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| ServiceError::Signing(format!("RSA signing failed: {}", e)))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }
}

impl std::fmt::Debug for DistributionSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DistributionSigningKey(<redacted>)")
    }
}

/// Check a URL-safe encoded distribution signature over `policy`
pub fn verify_distribution_signature(public_key: &RsaPublicKey, policy: &str, signature: &str) -> bool {
    let Ok(signature) = decode_url_safe(signature) else {
        return false;
    };
    let digest = Sha1::digest(policy.as_bytes());
    public_key
        .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
        .is_ok()
}

// ============================================================================
// Requests
// ============================================================================

/// Storage object to presign with the account key
#[derive(Debug, Clone)]
pub struct ObjectTarget {
    pub method: Method,
    pub bucket: String,
    pub key: String,
    /// Sub-resource such as `torrent` or `acl`, signed with the URL
    pub special_param: Option<String>,
    /// Headers the eventual request will carry (e.g. `content-type` for a PUT)
    pub headers: BTreeMap<String, String>,
    pub expires: DateTime<Utc>,
    /// Overrides the client's `https_only` setting
    pub https: Option<bool>,
}

impl ObjectTarget {
    pub fn new(
        method: Method,
        bucket: impl Into<String>,
        key: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            key: key.into(),
            special_param: None,
            headers: BTreeMap::new(),
            expires,
            https: None,
        }
    }

    pub fn with_special_param(mut self, param: impl Into<String>) -> Self {
        self.special_param = Some(param.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = Some(https);
        self
    }
}

/// Distribution resource to sign with a key pair
#[derive(Debug, Clone)]
pub struct DistributionTarget {
    /// URL (or stream name) the signature is appended to
    pub resource_url: String,
    pub key_pair_id: String,
    pub signing_key: DistributionSigningKey,
    pub policy: UrlPolicy,
}

#[derive(Debug, Clone)]
pub enum SignedUrlTarget {
    Object(ObjectTarget),
    Distribution(DistributionTarget),
}

#[derive(Debug, Clone)]
pub struct SignedUrlRequest {
    pub target: SignedUrlTarget,
}

impl SignedUrlRequest {
    pub fn object(target: ObjectTarget) -> Self {
        Self {
            target: SignedUrlTarget::Object(target),
        }
    }

    pub fn distribution(target: DistributionTarget) -> Self {
        Self {
            target: SignedUrlTarget::Distribution(target),
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

pub struct SignedUrlGenerator {
    signer: Arc<RequestSigner>,
    config: ClientConfig,
}

impl SignedUrlGenerator {
    pub fn new(signer: Arc<RequestSigner>, config: ClientConfig) -> Self {
        Self { signer, config }
    }

    pub fn sign_url(&self, request: &SignedUrlRequest) -> Result<String> {
        match &request.target {
            SignedUrlTarget::Object(target) => self.sign_object_url(target),
            SignedUrlTarget::Distribution(target) => sign_distribution_url(target),
        }
    }

    fn sign_object_url(&self, target: &ObjectTarget) -> Result<String> {
        if target.bucket.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "bucket name must not be empty".to_string(),
            ));
        }
        if target.key.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "object key must not be empty".to_string(),
            ));
        }

        let https = target.https.unwrap_or(self.config.https_only);
        let mut url = self.config.s3_base_url(https);
        url.push('/');
        url.push_str(&target.bucket);
        url.push('/');
        url.push_str(&uri_encode(&target.key, false));
        if let Some(param) = &target.special_param {
            url.push('?');
            url.push_str(param);
        }

        tracing::debug!(
            bucket = %target.bucket,
            key = %target.key,
            expires = target.expires.timestamp(),
            "Signing object URL"
        );
        Ok(self
            .signer
            .presign(target.method.as_str(), &url, &target.headers, target.expires))
    }
}

fn sign_distribution_url(target: &DistributionTarget) -> Result<String> {
    if target.key_pair_id.is_empty() {
        return Err(ServiceError::InvalidArgument(
            "key pair id must not be empty".to_string(),
        ));
    }

    let separator = if target.resource_url.contains('?') { '&' } else { '?' };
    let mut url = String::with_capacity(target.resource_url.len() + 512);
    url.push_str(&target.resource_url);
    url.push(separator);

    match &target.policy {
        UrlPolicy::Canned { expires } => {
            let policy = canned_policy(&target.resource_url, *expires)?;
            let signature = target.signing_key.sign(policy.as_bytes())?;
            url.push_str("Expires=");
            url.push_str(&expires.timestamp().to_string());
            url.push_str("&Signature=");
            url.push_str(&encode_url_safe(&signature));
        }
        UrlPolicy::Custom(custom) => {
            // Signature covers the policy JSON; the URL carries its encoded form
            let policy = custom.to_json()?;
            let signature = target.signing_key.sign(policy.as_bytes())?;
            url.push_str("Policy=");
            url.push_str(&encode_url_safe(policy.as_bytes()));
            url.push_str("&Signature=");
            url.push_str(&encode_url_safe(&signature));
        }
    }

    url.push_str("&Key-Pair-Id=");
    url.push_str(&target.key_pair_id);
    Ok(url)
}
