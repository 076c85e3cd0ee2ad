//! Edge distribution API client
//!
//! Requests are authenticated by signing only the `Date` header value. Config
//! changes and deletions of distributions and origin access identities use the
//! `ETag` of the current config as `If-Match` precondition.

use crate::clock::TimeOffset;
use crate::cloudfront::types::{
    Distribution, DistributionConfig, DistributionConfigUpdate, DistributionKind, Invalidation,
    InvalidationSummary, Origin, OriginAccessIdentity, OriginAccessIdentityConfig,
};
use crate::cloudfront::xml;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{Result, ServiceError};
use crate::http::{Authorizer, HttpRequest, HyperTransport, RequestExecutor, RetryPolicy, Transport};
use crate::listing::{collect_complete, ListingChunk, ListingKind};
use crate::s3::signer::{http_date, uri_encode, RequestSigner};
use chrono::{DateTime, Utc};
use hyper::Method;
use std::sync::Arc;

/// Signs the `Date` value alone
struct DateAuthorizer {
    signer: Arc<RequestSigner>,
}

impl Authorizer for DateAuthorizer {
    fn authorize(&self, request: &mut HttpRequest, now: DateTime<Utc>) -> Result<()> {
        let date = http_date(now);
        let signature = self.signer.sign_date(&date);
        request.set_header("date", date);
        request.set_header("authorization", self.signer.authorization_header(&signature));
        Ok(())
    }
}

fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') {
        return Err(ServiceError::InvalidArgument(format!("invalid {}: {:?}", what, id)));
    }
    Ok(())
}

/// Path of the origin access identity collection
const IDENTITY_PATH: &str = "/origin-access-identity/cloudfront";

/// Timestamp used when the caller gives no reference
fn default_caller_reference() -> String {
    Utc::now().format("%Y%m%d%H%M%S%3f").to_string()
}

/// Edge distribution service client
pub struct CloudFrontClient {
    executor: RequestExecutor,
    config: ClientConfig,
}

impl CloudFrontClient {
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HyperTransport::new()?);
        Ok(Self::with_transport(credentials, config, transport))
    }

    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let authorizer = Arc::new(DateAuthorizer {
            signer: Arc::new(RequestSigner::new(credentials)),
        });
        let executor = RequestExecutor::new(
            transport,
            authorizer,
            Arc::new(TimeOffset::new()),
            RetryPolicy::from(&config.retry),
        );
        Self { executor, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn time_offset(&self) -> &Arc<TimeOffset> {
        self.executor.clock()
    }

    fn url(&self, path: &str) -> String {
        let mut url = self.config.cloudfront_base_url();
        url.push_str(path);
        url
    }

    fn distribution_url(&self, kind: DistributionKind, id: &str, suffix: &str) -> String {
        self.url(&format!("/{}/{}{}", kind.path_segment(), id, suffix))
    }

    fn xml_request(method: Method, url: String, body: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("content-type", "text/xml; charset=UTF-8")
            .with_header("content-length", body.len().to_string())
            .with_body(body)
    }

    // =========================================================================
    // Distributions
    // =========================================================================

    /// One page of distributions starting after `marker`
    pub async fn list_distributions_chunked(
        &self,
        kind: DistributionKind,
        marker: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<ListingChunk<Distribution>> {
        let page_size = page_size.unwrap_or(self.config.listing.distribution_page_size);
        let mut url = self.url(&format!("/{}?MaxItems={}", kind.path_segment(), page_size));
        if let Some(marker) = marker {
            url.push_str("&Marker=");
            url.push_str(&uri_encode(marker, true));
        }

        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_distribution_list(kind, &response.body)?.into_chunk(kind.listing_kind())
    }

    /// Every distribution of `kind`
    pub async fn list_distributions(&self, kind: DistributionKind) -> Result<Vec<Distribution>> {
        tracing::debug!(kind = ?kind, "Listing distributions");
        let all = collect_complete(kind.listing_kind(), None, |marker: Option<String>| async move {
            self.list_distributions_chunked(kind, marker.as_deref(), None).await
        })
        .await?;
        Ok(all.items)
    }

    /// Distributions whose storage origin is `bucket`
    pub async fn list_distributions_by_origin(
        &self,
        kind: DistributionKind,
        bucket: &str,
    ) -> Result<Vec<Distribution>> {
        let host_suffix = format!(".{}", self.config.s3_endpoint);
        let matches = |dns_name: &str| {
            dns_name == bucket || dns_name.strip_suffix(host_suffix.as_str()) == Some(bucket)
        };

        Ok(self
            .list_distributions(kind)
            .await?
            .into_iter()
            .filter(|distribution| match distribution.origin() {
                Some(origin @ Origin::S3 { .. }) => matches(origin.dns_name()),
                _ => false,
            })
            .collect())
    }

    /// Create a distribution; an empty caller reference is replaced by a timestamp
    pub async fn create_distribution(
        &self,
        kind: DistributionKind,
        config: &DistributionConfig,
    ) -> Result<Distribution> {
        let mut config = config.clone();
        if config.caller_reference.is_empty() {
            config.caller_reference = default_caller_reference();
        }
        let body = xml::build_distribution_config(kind, &config, &self.config.cloudfront_namespace())?;
        let url = self.url(&format!("/{}", kind.path_segment()));

        let response = self
            .executor
            .execute(Self::xml_request(Method::POST, url, body), &[201])
            .await?;
        let distribution = xml::parse_distribution(kind, &response.body)?;
        tracing::info!(
            id = %distribution.id,
            domain = %distribution.domain_name,
            "Created distribution"
        );
        Ok(distribution)
    }

    pub async fn get_distribution_info(&self, kind: DistributionKind, id: &str) -> Result<Distribution> {
        validate_id("distribution id", id)?;
        let url = self.distribution_url(kind, id, "");
        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_distribution(kind, &response.body)
    }

    /// Current config with its `ETag`
    pub async fn get_distribution_config(
        &self,
        kind: DistributionKind,
        id: &str,
    ) -> Result<DistributionConfig> {
        validate_id("distribution id", id)?;
        let url = self.distribution_url(kind, id, "/config");
        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;

        let mut config = xml::parse_distribution_config(&response.body)?;
        config.etag = response.header("etag").map(str::to_string);
        Ok(config)
    }

    /// Merge `update` into the current config and store it.
    ///
    /// Fails with the remote `PreconditionFailed` error when the config changed
    /// between the read and the write.
    pub async fn update_distribution_config(
        &self,
        kind: DistributionKind,
        id: &str,
        update: &DistributionConfigUpdate,
    ) -> Result<DistributionConfig> {
        let current = self.get_distribution_config(kind, id).await?;
        let etag = current.etag.clone().ok_or_else(|| {
            ServiceError::InvalidResponse(format!("config of distribution {} has no ETag", id))
        })?;

        let updated = update.apply(&current);
        let body = xml::build_distribution_config(kind, &updated, &self.config.cloudfront_namespace())?;
        let request = Self::xml_request(Method::PUT, self.distribution_url(kind, id, "/config"), body)
            .with_header("if-match", etag);

        let response = self.executor.execute(request, &[200]).await?;
        let mut config = xml::parse_distribution_config(&response.body)?;
        config.etag = response.header("etag").map(str::to_string);
        tracing::info!(id = %id, enabled = config.enabled, "Updated distribution config");
        Ok(config)
    }

    /// Disable a distribution and reset its config ahead of deletion
    pub async fn disable_distribution_for_deletion(
        &self,
        kind: DistributionKind,
        id: &str,
    ) -> Result<DistributionConfig> {
        self.update_distribution_config(kind, id, &DistributionConfigUpdate::disable_for_deletion())
            .await
    }

    /// Delete a disabled, deployed distribution
    pub async fn delete_distribution(&self, kind: DistributionKind, id: &str) -> Result<()> {
        let current = self.get_distribution_config(kind, id).await?;
        let etag = current.etag.ok_or_else(|| {
            ServiceError::InvalidResponse(format!("config of distribution {} has no ETag", id))
        })?;

        let request =
            HttpRequest::new(Method::DELETE, self.distribution_url(kind, id, "")).with_header("if-match", etag);
        self.executor.execute(request, &[204]).await?;
        tracing::info!(id = %id, "Deleted distribution");
        Ok(())
    }

    // =========================================================================
    // Invalidations
    // =========================================================================

    /// Remove `paths` from the edge caches of a distribution
    pub async fn invalidate_objects(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<Invalidation> {
        validate_id("distribution id", distribution_id)?;
        if paths.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "invalidation needs at least one path".to_string(),
            ));
        }

        let body = xml::build_invalidation_batch(paths, caller_reference, &self.config.cloudfront_namespace());
        let url = self.distribution_url(DistributionKind::Standard, distribution_id, "/invalidation");
        let response = self
            .executor
            .execute(Self::xml_request(Method::POST, url, body), &[201])
            .await?;

        let invalidation = xml::parse_invalidation(&response.body)?;
        tracing::info!(
            distribution_id = %distribution_id,
            invalidation_id = %invalidation.id,
            paths = paths.len(),
            "Created invalidation"
        );
        Ok(invalidation)
    }

    pub async fn get_invalidation(&self, distribution_id: &str, invalidation_id: &str) -> Result<Invalidation> {
        validate_id("distribution id", distribution_id)?;
        validate_id("invalidation id", invalidation_id)?;
        let url = self.distribution_url(
            DistributionKind::Standard,
            distribution_id,
            &format!("/invalidation/{}", invalidation_id),
        );
        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_invalidation(&response.body)
    }

    /// One page of invalidation summaries, most recent first
    pub async fn list_invalidations_chunked(
        &self,
        distribution_id: &str,
        marker: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<ListingChunk<InvalidationSummary>> {
        validate_id("distribution id", distribution_id)?;
        let page_size = page_size.unwrap_or(self.config.listing.distribution_page_size);
        let mut url = self.distribution_url(
            DistributionKind::Standard,
            distribution_id,
            &format!("/invalidation?MaxItems={}", page_size),
        );
        if let Some(marker) = marker {
            url.push_str("&Marker=");
            url.push_str(&uri_encode(marker, true));
        }

        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_invalidation_list(&response.body)?.into_chunk(ListingKind::Invalidations)
    }

    pub async fn list_invalidations(&self, distribution_id: &str) -> Result<Vec<InvalidationSummary>> {
        let all = collect_complete(ListingKind::Invalidations, None, |marker: Option<String>| async move {
            self.list_invalidations_chunked(distribution_id, marker.as_deref(), None)
                .await
        })
        .await?;
        Ok(all.items)
    }

    // =========================================================================
    // Origin access identities
    // =========================================================================

    fn identity_url(&self, id: &str, suffix: &str) -> String {
        self.url(&format!("{}/{}{}", IDENTITY_PATH, id, suffix))
    }

    /// Create an identity; a missing caller reference is replaced by a timestamp
    pub async fn create_origin_access_identity(
        &self,
        caller_reference: Option<&str>,
        comment: &str,
    ) -> Result<OriginAccessIdentity> {
        let config = OriginAccessIdentityConfig {
            caller_reference: caller_reference
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .unwrap_or_else(default_caller_reference),
            comment: comment.to_string(),
            etag: None,
        };
        let body = xml::build_origin_access_identity_config(&config, &self.config.cloudfront_namespace());

        let response = self
            .executor
            .execute(Self::xml_request(Method::POST, self.url(IDENTITY_PATH), body), &[201])
            .await?;
        let mut identity = xml::parse_origin_access_identity(&response.body)?;
        identity.config.etag = response.header("etag").map(str::to_string);
        tracing::info!(id = %identity.id, "Created origin access identity");
        Ok(identity)
    }

    /// One page of identity summaries starting after `marker`
    pub async fn list_origin_access_identities_chunked(
        &self,
        marker: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<ListingChunk<OriginAccessIdentity>> {
        let page_size = page_size.unwrap_or(self.config.listing.distribution_page_size);
        let mut url = self.url(&format!("{}?MaxItems={}", IDENTITY_PATH, page_size));
        if let Some(marker) = marker {
            url.push_str("&Marker=");
            url.push_str(&uri_encode(marker, true));
        }

        let response = self.executor.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_origin_access_identity_list(&response.body)?.into_chunk(ListingKind::OriginAccessIdentities)
    }

    pub async fn list_origin_access_identities(&self) -> Result<Vec<OriginAccessIdentity>> {
        let all = collect_complete(
            ListingKind::OriginAccessIdentities,
            None,
            |marker: Option<String>| async move {
                self.list_origin_access_identities_chunked(marker.as_deref(), None)
                    .await
            },
        )
        .await?;
        Ok(all.items)
    }

    pub async fn get_origin_access_identity(&self, id: &str) -> Result<OriginAccessIdentity> {
        validate_id("origin access identity id", id)?;
        let response = self
            .executor
            .execute(HttpRequest::new(Method::GET, self.identity_url(id, "")), &[200])
            .await?;
        let mut identity = xml::parse_origin_access_identity(&response.body)?;
        identity.config.etag = response.header("etag").map(str::to_string);
        Ok(identity)
    }

    /// Current identity config with its `ETag`
    pub async fn get_origin_access_identity_config(&self, id: &str) -> Result<OriginAccessIdentityConfig> {
        validate_id("origin access identity id", id)?;
        let response = self
            .executor
            .execute(HttpRequest::new(Method::GET, self.identity_url(id, "/config")), &[200])
            .await?;
        let mut config = xml::parse_origin_access_identity_config(&response.body)?;
        config.etag = response.header("etag").map(str::to_string);
        Ok(config)
    }

    /// Replace the comment of an identity; `None` keeps the current one
    pub async fn update_origin_access_identity_config(
        &self,
        id: &str,
        comment: Option<&str>,
    ) -> Result<OriginAccessIdentityConfig> {
        let current = self.get_origin_access_identity_config(id).await?;
        let etag = current.etag.clone().ok_or_else(|| {
            ServiceError::InvalidResponse(format!("config of origin access identity {} has no ETag", id))
        })?;

        let updated = OriginAccessIdentityConfig {
            comment: comment.map(str::to_string).unwrap_or(current.comment),
            caller_reference: current.caller_reference,
            etag: None,
        };
        let body = xml::build_origin_access_identity_config(&updated, &self.config.cloudfront_namespace());
        let request = Self::xml_request(Method::PUT, self.identity_url(id, "/config"), body)
            .with_header("if-match", etag);

        let response = self.executor.execute(request, &[200]).await?;
        let mut config = xml::parse_origin_access_identity_config(&response.body)?;
        config.etag = response.header("etag").map(str::to_string);
        tracing::info!(id = %id, "Updated origin access identity config");
        Ok(config)
    }

    /// Delete an identity that no distribution references any more
    pub async fn delete_origin_access_identity(&self, id: &str) -> Result<()> {
        let current = self.get_origin_access_identity_config(id).await?;
        let etag = current.etag.ok_or_else(|| {
            ServiceError::InvalidResponse(format!("config of origin access identity {} has no ETag", id))
        })?;

        let request =
            HttpRequest::new(Method::DELETE, self.identity_url(id, "")).with_header("if-match", etag);
        self.executor.execute(request, &[204]).await?;
        tracing::info!(id = %id, "Deleted origin access identity");
        Ok(())
    }
}
