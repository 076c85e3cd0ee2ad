//! S3 REST client
//!
//! This module provides:
//! - Canonical-string HMAC-SHA1 request signing and presigned URLs
//! - Bucket, object, copy, ACL and listing operations
//! - Multipart uploads with abort on failure

pub mod client;
pub mod multipart;
pub mod signer;
pub mod types;
pub mod xml;

pub use client::S3Client;
pub use multipart::{plan_parts, MultipartUploader, PartPlan, UploadState};
pub use signer::RequestSigner;
pub use types::{
    AccessControlList, Acl, Bucket, BucketList, CannedAcl, CopyOptions, CopyResult, DataSource,
    DeleteError, DeleteObjectsResponse, DeletedObject, Grant, Grantee, ListObjectsRequest,
    MoveResult, MultipartCompleted, MultipartPart, MultipartUpload, Owner, Permission, PutOutcome,
    StorageObject,
};
