//! Storage service data model

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Prefix of user metadata headers
pub const METADATA_PREFIX: &str = "x-amz-meta-";

/// Standard HTTP headers that travel as object metadata without the user prefix
pub const HTTP_HEADER_METADATA: &[&str] = &[
    "cache-control",
    "content-disposition",
    "content-encoding",
    "content-language",
    "content-md5",
    "content-type",
    "expires",
];

/// Owner of a bucket, object or upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<String>,
}

/// Result of listing all buckets of the account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketList {
    pub owner: Option<Owner>,
    pub buckets: Vec<Bucket>,
}

/// Predefined access policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
    FullControl,
}

impl Permission {
    /// Name used in access control policy documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::ReadAcp => "READ_ACP",
            Permission::WriteAcp => "WRITE_ACP",
            Permission::FullControl => "FULL_CONTROL",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "READ" => Some(Permission::Read),
            "WRITE" => Some(Permission::Write),
            "READ_ACP" => Some(Permission::ReadAcp),
            "WRITE_ACP" => Some(Permission::WriteAcp),
            "FULL_CONTROL" => Some(Permission::FullControl),
            _ => None,
        }
    }

    /// Request header carrying grants of this permission
    pub fn header_name(&self) -> &'static str {
        match self {
            Permission::Read => "x-amz-grant-read",
            Permission::Write => "x-amz-grant-write",
            Permission::ReadAcp => "x-amz-grant-read-acp",
            Permission::WriteAcp => "x-amz-grant-write-acp",
            Permission::FullControl => "x-amz-grant-full-control",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grantee {
    CanonicalUser(String),
    Email(String),
    Group(String),
}

impl Grantee {
    fn header_value(&self) -> String {
        match self {
            Grantee::CanonicalUser(id) => format!("id=\"{}\"", id),
            Grantee::Email(address) => format!("emailAddress=\"{}\"", address),
            Grantee::Group(uri) => format!("uri=\"{}\"", uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

impl Grant {
    pub fn new(grantee: Grantee, permission: Permission) -> Self {
        Self { grantee, permission }
    }
}

/// Access control policy document of a bucket or object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    pub owner: Option<Owner>,
    pub grants: Vec<Grant>,
}

impl AccessControlList {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner: Some(owner),
            grants: Vec::new(),
        }
    }

    pub fn with_grant(mut self, grantee: Grantee, permission: Permission) -> Self {
        self.grants.push(Grant::new(grantee, permission));
        self
    }

    /// Drop every grant held by `grantee`
    pub fn revoke_all(&mut self, grantee: &Grantee) {
        self.grants.retain(|grant| &grant.grantee != grantee);
    }

    /// Permissions granted to `grantee`
    pub fn permissions_of(&self, grantee: &Grantee) -> Vec<Permission> {
        self.grants
            .iter()
            .filter(|grant| &grant.grantee == grantee)
            .map(|grant| grant.permission)
            .collect()
    }
}

/// Access control applied to a bucket, an object or an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acl {
    Canned(CannedAcl),
    Grants(Vec<Grant>),
    /// A full policy document; sent as XML by the ACL operations and as
    /// grant headers everywhere else
    Policy(AccessControlList),
}

impl Acl {
    /// Write the ACL as request headers
    pub fn apply_headers(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Acl::Canned(canned) => {
                headers.insert("x-amz-acl".to_string(), canned.as_str().to_string());
            }
            Acl::Grants(grants) | Acl::Policy(AccessControlList { grants, .. }) => {
                let mut by_permission: BTreeMap<Permission, Vec<String>> = BTreeMap::new();
                for grant in grants {
                    by_permission
                        .entry(grant.permission)
                        .or_default()
                        .push(grant.grantee.header_value());
                }
                for (permission, grantees) in by_permission {
                    headers.insert(permission.header_name().to_string(), grantees.join(", "));
                }
            }
        }
    }
}

/// Where the bytes of an object come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Bytes(Bytes),
    /// File-backed data can be uploaded in parts
    File(PathBuf),
}

/// An object, as sent to or received from the service
#[derive(Debug, Clone, Default)]
pub struct StorageObject {
    pub key: String,
    /// Ordered metadata; user names are sent with the `x-amz-meta-` prefix
    pub metadata: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub storage_class: Option<String>,
    pub acl: Option<Acl>,
    pub data: Option<DataSource>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub owner: Option<Owner>,
}

impl StorageObject {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_bytes(mut self, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        self.content_length = Some(data.len() as u64);
        self.data = Some(DataSource::Bytes(data));
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data = Some(DataSource::File(path.into()));
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn with_storage_class(mut self, storage_class: impl Into<String>) -> Self {
        self.storage_class = Some(storage_class.into());
        self
    }

    /// Request headers describing this object's metadata, ACL and storage class
    pub fn metadata_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        for (name, value) in &self.metadata {
            let lower = name.to_ascii_lowercase();
            if HTTP_HEADER_METADATA.contains(&lower.as_str()) || lower.starts_with("x-amz-") {
                headers.insert(lower, value.clone());
            } else {
                headers.insert(format!("{}{}", METADATA_PREFIX, lower), value.clone());
            }
        }
        if let Some(content_type) = &self.content_type {
            headers.insert("content-type".to_string(), content_type.clone());
        }
        if let Some(storage_class) = &self.storage_class {
            headers.insert("x-amz-storage-class".to_string(), storage_class.clone());
        }
        if let Some(acl) = &self.acl {
            acl.apply_headers(&mut headers);
        }
        headers
    }

    /// Populate metadata fields from response headers
    pub fn apply_response_headers(&mut self, headers: &BTreeMap<String, String>) {
        for (name, value) in headers {
            if let Some(user_name) = name.strip_prefix(METADATA_PREFIX) {
                self.metadata.insert(user_name.to_string(), value.clone());
            } else if HTTP_HEADER_METADATA.contains(&name.as_str()) {
                self.metadata.insert(name.clone(), value.clone());
            }
        }
        if let Some(content_type) = headers.get("content-type") {
            self.content_type = Some(content_type.clone());
        }
        if let Some(length) = headers.get("content-length").and_then(|v| v.parse().ok()) {
            self.content_length = Some(length);
        }
        if let Some(etag) = headers.get("etag") {
            self.etag = Some(etag.trim_matches('"').to_string());
        }
        if let Some(modified) = headers.get("last-modified") {
            self.last_modified = Some(modified.clone());
        }
        if let Some(storage_class) = headers.get("x-amz-storage-class") {
            self.storage_class = Some(storage_class.clone());
        }
    }
}

/// Parameters of an object listing
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Keys per request; the configured page size when unset
    pub max_keys: Option<u32>,
    /// Resume after this marker
    pub prior_marker: Option<String>,
}

impl ListObjectsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_prior_marker(mut self, marker: impl Into<String>) -> Self {
        self.prior_marker = Some(marker.into());
        self
    }
}

/// Response from the multi-object delete operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteObjectsResponse {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletedObject {
    pub key: String,
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

// =============================================================================
// Copy Types
// =============================================================================

/// Options of a server-side copy
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Take metadata from the destination object instead of the source
    pub replace_metadata: bool,
    /// Copy a specific version of the source
    pub version_id: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
    pub if_match: Vec<String>,
    pub if_none_match: Vec<String>,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replacing_metadata() -> Self {
        Self {
            replace_metadata: true,
            ..Self::default()
        }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_if_modified_since(mut self, time: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(time);
        self
    }

    pub fn with_if_unmodified_since(mut self, time: DateTime<Utc>) -> Self {
        self.if_unmodified_since = Some(time);
        self
    }

    pub fn with_if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match.push(etag.into());
        self
    }

    pub fn with_if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match.push(etag.into());
        self
    }
}

/// Result of a server-side copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    pub etag: String,
    pub last_modified: Option<String>,
    /// Version id of the new object when the bucket is versioned
    pub version_id: Option<String>,
    /// Version id of the source that was copied
    pub source_version_id: Option<String>,
}

/// Result of a move: the copy succeeded, deleting the source may not have
#[derive(Debug)]
pub struct MoveResult {
    pub copy: CopyResult,
    pub delete_error: Option<crate::error::ServiceError>,
}

impl MoveResult {
    pub fn source_deleted(&self) -> bool {
        self.delete_error.is_none()
    }
}

// =============================================================================
// Multipart Upload Types
// =============================================================================

/// One acknowledged part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPart {
    /// Part number (1-10000)
    pub part_number: u32,
    /// ETag returned by the service, without quotes
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<String>,
}

impl MultipartPart {
    pub fn new(part_number: u32, etag: impl Into<String>, size: u64) -> Self {
        Self {
            part_number,
            etag: etag.into(),
            size,
            last_modified: None,
        }
    }
}

/// A started multipart upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub upload_id: String,
    pub bucket_name: String,
    pub object_key: String,
    pub storage_class: Option<String>,
    pub initiated: Option<String>,
    pub initiator: Option<Owner>,
    pub owner: Option<Owner>,
    pub metadata: BTreeMap<String, String>,
    /// Acknowledged parts, in the order they were appended
    pub parts: Vec<MultipartPart>,
}

impl MultipartUpload {
    pub fn new(
        upload_id: impl Into<String>,
        bucket_name: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            bucket_name: bucket_name.into(),
            object_key: object_key.into(),
            ..Self::default()
        }
    }

    /// Record an acknowledged part
    pub fn append_part(&mut self, part: MultipartPart) {
        self.parts.push(part);
    }

    /// Parts ordered by part number, as required by completion
    pub fn sorted_parts(&self) -> Vec<&MultipartPart> {
        let mut parts: Vec<&MultipartPart> = self.parts.iter().collect();
        parts.sort_by_key(|part| part.part_number);
        parts
    }
}

/// Result of completing a multipart upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartCompleted {
    pub location: Option<String>,
    pub bucket_name: String,
    pub object_key: String,
    pub etag: String,
    pub version_id: Option<String>,
}

/// How an object ended up stored
#[derive(Debug, Clone)]
pub enum PutOutcome {
    Single(StorageObject),
    Multipart(MultipartCompleted),
}
