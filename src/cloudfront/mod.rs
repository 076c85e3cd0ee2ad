//! Edge distribution (CloudFront) API
//!
//! Distributions, their configurations, cache invalidations and origin access
//! identities. Signed URLs
//! for private distributions live in [`crate::signed_url`].

pub mod client;
pub mod types;
pub mod xml;

pub use client::CloudFrontClient;
pub use types::{
    ActiveSigner, Distribution, DistributionConfig, DistributionConfigUpdate, DistributionKind,
    Invalidation, InvalidationSummary, LoggingStatus, Origin, OriginAccessIdentity,
    OriginAccessIdentityConfig, OriginProtocolPolicy,
};
