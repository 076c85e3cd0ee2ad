//! s3rest - authenticated REST client for S3-style object storage
//!
//! Signs requests with the storage service's HMAC-SHA1 scheme, retries
//! internal errors and clock-skew rejections, walks paginated listings,
//! uploads large files as multipart uploads (aborting on failure), manages
//! edge distributions and produces time-limited signed URLs.

pub mod clock;
pub mod cloudfront;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod listing;
pub mod s3;
pub mod signed_url;

mod xml;

pub use clock::TimeOffset;
pub use cloudfront::CloudFrontClient;
pub use config::{ClientConfig, Config};
pub use credentials::Credentials;
pub use error::{RemoteError, Result, ServiceError};
pub use listing::{ListingChunk, ListingKind};
pub use s3::{MultipartUploader, S3Client, StorageObject};
pub use signed_url::{SignedUrlGenerator, SignedUrlRequest};
