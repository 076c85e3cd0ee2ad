//! HMAC-SHA1 request signer for the storage REST API
//!
//! The string to sign is
//!
//! ```text
//! METHOD\n
//! Content-MD5\n
//! Content-Type\n
//! Date\n
//! x-amz-name:value\n   (one line per x-amz-* header, sorted by name)
//! /resource[?sub-resources]
//! ```
//!
//! and the signature is `Base64(HMAC-SHA1(secret, string_to_sign))`, sent as
//! `Authorization: AWS <access-key>:<signature>` or as presigned query parameters.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::http::{path_and_query, Authorizer, HttpRequest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// Hex lookup table for zero-allocation percent encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Query parameters that identify a sub-resource and therefore take part in the signature
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "delete",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Prefix of provider-specific headers included in the signature
const AMZ_PREFIX: &str = "x-amz-";

/// Format a timestamp as an RFC 1123 `Date` header value
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Build the canonical string for a request.
///
/// `resource` is the encoded path with its query string (as sent on the wire).
/// Header names are matched case-insensitively. When `expires` is given it
/// takes the place of the date line (presigned URLs).
pub fn canonical_string(
    method: &str,
    resource: &str,
    headers: &BTreeMap<String, String>,
    expires: Option<&str>,
) -> String {
    let mut interesting: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        if name == "content-md5"
            || name == "content-type"
            || name == "date"
            || name.starts_with(AMZ_PREFIX)
        {
            interesting.insert(name, value.trim().to_string());
        }
    }

    // x-amz-date supersedes Date; an expiry supersedes both
    if interesting.contains_key("x-amz-date") {
        interesting.insert("date".to_string(), String::new());
    }
    if let Some(expires) = expires {
        interesting.insert("date".to_string(), expires.to_string());
    }

    let mut buf = String::with_capacity(128 + resource.len());
    buf.push_str(method);
    buf.push('\n');
    for fixed in ["content-md5", "content-type", "date"] {
        if let Some(value) = interesting.get(fixed) {
            buf.push_str(value);
        }
        buf.push('\n');
    }

    for (name, value) in interesting.range(AMZ_PREFIX.to_string()..) {
        if !name.starts_with(AMZ_PREFIX) {
            break;
        }
        buf.push_str(name);
        buf.push(':');
        buf.push_str(value);
        buf.push('\n');
    }

    buf.push_str(&canonical_resource(resource));
    buf
}

/// Path plus the sorted, decoded sub-resource parameters of `resource`
fn canonical_resource(resource: &str) -> String {
    let (path, query) = match resource.split_once('?') {
        Some((path, query)) => (path, query),
        None => (resource, ""),
    };

    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode(name);
        if SUB_RESOURCES.contains(&name.as_str()) {
            params.insert(name, decode(value));
        }
    }

    let mut buf = String::with_capacity(resource.len());
    buf.push_str(if path.is_empty() { "/" } else { path });
    for (index, (name, value)) in params.iter().enumerate() {
        buf.push(if index == 0 { '?' } else { '&' });
        buf.push_str(name);
        if !value.is_empty() {
            buf.push('=');
            buf.push_str(value);
        }
    }
    buf
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// URI encode a string (RFC 3986) using hex lookup table
pub(crate) fn uri_encode(s: &str, encode_slash: bool) -> String {
    let mut result = String::with_capacity(s.len() + 16);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            b'/' if !encode_slash => {
                result.push('/');
            }
            _ => {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    result
}

/// Value of a query parameter in `url`, decoded
pub(crate) fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then(|| decode(value))
    })
}

/// Signs storage requests with one set of credentials
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Base64(HMAC-SHA1(secret, data))
    pub fn sign(&self, data: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.credentials.secret_key().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(data.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// `AWS <access-key>:<signature>`
    pub fn authorization_header(&self, signature: &str) -> String {
        format!("AWS {}:{}", self.credentials.access_key(), signature)
    }

    /// Signature for the distribution API, which signs only the `Date` value
    pub fn sign_date(&self, date: &str) -> String {
        self.sign(date)
    }

    /// Build a query-signed URL for `resource_url`.
    ///
    /// `resource_url` may already carry one sub-resource parameter such as
    /// `?torrent`. Headers that would be sent with the request (e.g.
    /// `content-type`) must be passed so they are covered by the signature.
    pub fn presign(
        &self,
        method: &str,
        resource_url: &str,
        headers: &BTreeMap<String, String>,
        expires: DateTime<Utc>,
    ) -> String {
        let expires = expires.timestamp().to_string();
        let mut headers = headers.clone();

        let mut url = String::with_capacity(resource_url.len() + 128);
        url.push_str(resource_url);
        url.push(if resource_url.contains('?') { '&' } else { '?' });

        if let Some(token) = self.credentials.security_token() {
            url.push_str("x-amz-security-token=");
            url.push_str(&uri_encode(&token, true));
            url.push('&');
            headers.insert("x-amz-security-token".to_string(), token);
        }

        url.push_str("AWSAccessKeyId=");
        url.push_str(&uri_encode(self.credentials.access_key(), true));
        url.push_str("&Expires=");
        url.push_str(&expires);

        let canonical = canonical_string(method, path_and_query(&url), &headers, Some(&expires));
        tracing::debug!(canonical = %canonical, "Presigning URL");

        let signature = self.sign(&canonical);
        url.push_str("&Signature=");
        url.push_str(&uri_encode(&signature, true));
        url
    }

    /// Check a URL produced by [`presign`](Self::presign) against these credentials.
    ///
    /// The expiry itself is not compared with the current time.
    pub fn verify_presigned(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> bool {
        let Some(pos) = url.rfind("&Signature=") else {
            return false;
        };
        let (unsigned, _) = url.split_at(pos);
        let (Some(signature), Some(expires)) =
            (query_param(url, "Signature"), query_param(url, "Expires"))
        else {
            return false;
        };

        let mut headers = headers.clone();
        if let Some(token) = query_param(url, "x-amz-security-token") {
            headers.insert("x-amz-security-token".to_string(), token);
        }

        let canonical = canonical_string(method, path_and_query(unsigned), &headers, Some(&expires));
        self.sign(&canonical) == signature
    }
}

impl Authorizer for RequestSigner {
    fn authorize(&self, request: &mut HttpRequest, now: DateTime<Utc>) -> Result<()> {
        request.set_header("date", http_date(now));
        if let Some(token) = self.credentials.security_token() {
            request.set_header("x-amz-security-token", token);
        }
        request.headers.remove("authorization");

        let canonical = canonical_string(
            request.method.as_str(),
            request.path_and_query(),
            &request.headers,
            None,
        );
        tracing::debug!(canonical = %canonical, "Signing request");

        let signature = self.sign(&canonical);
        let authorization = self.authorization_header(&signature);
        request.set_header("authorization", authorization);
        Ok(())
    }
}
