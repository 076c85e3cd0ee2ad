//! Storage service client
//!
//! Every operation builds a path-style request (`/bucket/key`), hands it to the
//! [`RequestExecutor`] (signing, retries, skew correction) and decodes the
//! buffered response. The client holds no per-call state, so one instance can
//! serve many concurrent callers.

use crate::clock::TimeOffset;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{Result, ServiceError};
use crate::http::{HttpRequest, HttpResponse, HyperTransport, RequestExecutor, RetryPolicy, Transport};
use crate::listing::{collect_complete, ListingChunk, ListingKind};
use crate::s3::multipart::MultipartUploader;
use crate::s3::signer::{http_date, uri_encode, RequestSigner};
use crate::s3::types::{
    AccessControlList, Acl, BucketList, CopyOptions, CopyResult, DataSource, DeleteObjectsResponse,
    ListObjectsRequest, MoveResult, MultipartCompleted, MultipartPart, MultipartUpload, PutOutcome,
    StorageObject,
};
use crate::s3::xml::{self, UploadMarker};
use crate::signed_url::{SignedUrlGenerator, SignedUrlRequest};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use hyper::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keys accepted by one multi-object delete request
const MAX_DELETE_KEYS: usize = 1000;

/// Base64 of the MD5 digest, as sent in `Content-MD5`
pub(crate) fn content_md5(data: &[u8]) -> String {
    BASE64.encode(md5::compute(data).0)
}

/// Storage service client
pub struct S3Client {
    executor: RequestExecutor,
    signer: Arc<RequestSigner>,
    config: ClientConfig,
}

impl S3Client {
    /// Create a client over a pooled HTTPS transport
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HyperTransport::new()?);
        Ok(Self::with_transport(credentials, config, transport))
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let signer = Arc::new(RequestSigner::new(credentials));
        let executor = RequestExecutor::new(
            transport,
            signer.clone(),
            Arc::new(TimeOffset::new()),
            RetryPolicy::from(&config.retry),
        );
        Self {
            executor,
            signer,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn signer(&self) -> &Arc<RequestSigner> {
        &self.signer
    }

    /// Clock-skew correction shared by every request of this client
    pub fn time_offset(&self) -> &Arc<TimeOffset> {
        self.executor.clock()
    }

    fn validate_bucket_name(bucket: &str) -> Result<()> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(ServiceError::InvalidArgument(format!(
                "invalid bucket name: {:?}",
                bucket
            )));
        }
        Ok(())
    }

    /// `https://endpoint/bucket` (or the service root when `bucket` is `None`)
    pub(crate) fn bucket_url(&self, bucket: Option<&str>, https: bool) -> String {
        let mut url = self.config.s3_base_url(https);
        url.push('/');
        if let Some(bucket) = bucket {
            url.push_str(bucket);
        }
        url
    }

    /// `https://endpoint/bucket/encoded-key`
    pub(crate) fn object_url(&self, bucket: &str, key: &str, https: bool) -> String {
        let mut url = self.bucket_url(Some(bucket), https);
        url.push('/');
        url.push_str(&uri_encode(key, false));
        url
    }

    /// Append query parameters; `None` values produce a bare name (`?uploads`)
    fn with_query(mut url: String, params: &[(&str, Option<&str>)]) -> String {
        for (index, (name, value)) in params.iter().enumerate() {
            url.push(if index == 0 { '?' } else { '&' });
            url.push_str(name);
            if let Some(value) = value {
                url.push('=');
                url.push_str(&uri_encode(value, true));
            }
        }
        url
    }

    async fn execute(&self, request: HttpRequest, expected: &[u16]) -> Result<HttpResponse> {
        self.executor.execute(request, expected).await
    }

    // =========================================================================
    // Buckets
    // =========================================================================

    pub async fn list_buckets(&self) -> Result<BucketList> {
        let url = self.bucket_url(None, self.config.https_only);
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_list_buckets(&response.body)
    }

    /// Create a bucket, optionally constrained to a location
    pub async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        Self::validate_bucket_name(bucket)?;
        let url = self.bucket_url(Some(bucket), self.config.https_only);
        let mut request = HttpRequest::new(Method::PUT, url);
        if let Some(location) = location {
            let body = xml::build_create_bucket(location);
            request.set_header("content-type", "application/xml");
            request = request.with_body(body);
        }
        request.set_header("content-length", request.body.len().to_string());

        self.execute(request, &[200]).await?;
        tracing::info!(bucket = %bucket, "Created bucket");
        Ok(())
    }

    /// Whether the bucket exists and is reachable with these credentials
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Self::validate_bucket_name(bucket)?;
        let url = self.bucket_url(Some(bucket), self.config.https_only);
        let response = self
            .execute(HttpRequest::new(Method::HEAD, url), &[200, 404])
            .await?;
        Ok(response.status.as_u16() == 200)
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        Self::validate_bucket_name(bucket)?;
        let url = self.bucket_url(Some(bucket), self.config.https_only);
        self.execute(HttpRequest::new(Method::DELETE, url), &[200, 204])
            .await?;
        tracing::info!(bucket = %bucket, "Deleted bucket");
        Ok(())
    }

    /// Location constraint of a bucket; `None` for the default region
    pub async fn get_bucket_location(&self, bucket: &str) -> Result<Option<String>> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &[("location", None)]);
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_bucket_location(&response.body)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Upload an object in a single request.
    ///
    /// The returned object carries the service ETag, which is checked against
    /// the MD5 of the uploaded data.
    pub async fn put_object(&self, bucket: &str, object: &StorageObject) -> Result<StorageObject> {
        Self::validate_bucket_name(bucket)?;
        let data = match &object.data {
            Some(DataSource::Bytes(bytes)) => bytes.clone(),
            Some(DataSource::File(path)) => Bytes::from(tokio::fs::read(path).await?),
            None => Bytes::new(),
        };

        let digest = md5::compute(&data);
        let url = self.object_url(bucket, &object.key, self.config.https_only);
        let mut request = HttpRequest::new(Method::PUT, url);
        request.headers = object.metadata_headers();
        request.set_header("content-length", data.len().to_string());
        request.set_header("content-md5", BASE64.encode(digest.0));
        let request = request.with_body(data.clone());

        let response = self.execute(request, &[200]).await?;

        let local_hex = hex::encode(digest.0);
        if let Some(etag) = response.etag() {
            let is_plain_md5 = etag.len() == 32 && etag.bytes().all(|b| b.is_ascii_hexdigit());
            if is_plain_md5 && !etag.eq_ignore_ascii_case(&local_hex) {
                return Err(ServiceError::InvalidResponse(format!(
                    "ETag {} of uploaded object {} does not match local MD5 {}",
                    etag, object.key, local_hex
                )));
            }
        }

        let mut stored = object.clone();
        stored.data = None;
        stored.content_length = Some(data.len() as u64);
        stored.etag = response.etag().or(Some(local_hex));
        tracing::debug!(bucket = %bucket, key = %object.key, size = data.len(), "Put object");
        Ok(stored)
    }

    /// Download an object; the data is returned as an in-memory source
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<StorageObject> {
        Self::validate_bucket_name(bucket)?;
        let url = self.object_url(bucket, key, self.config.https_only);
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;

        let mut object = StorageObject::new(key);
        object.apply_response_headers(&response.headers);
        object.content_length = Some(response.body.len() as u64);
        object.data = Some(DataSource::Bytes(response.body));
        Ok(object)
    }

    /// Object metadata without the data (HEAD)
    pub async fn get_object_details(&self, bucket: &str, key: &str) -> Result<StorageObject> {
        Self::validate_bucket_name(bucket)?;
        let url = self.object_url(bucket, key, self.config.https_only);
        let response = self.execute(HttpRequest::new(Method::HEAD, url), &[200]).await?;

        let mut object = StorageObject::new(key);
        object.apply_response_headers(&response.headers);
        Ok(object)
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        Self::validate_bucket_name(bucket)?;
        let url = self.object_url(bucket, key, self.config.https_only);
        self.execute(HttpRequest::new(Method::DELETE, url), &[200, 204])
            .await?;
        Ok(())
    }

    /// Delete up to 1000 objects in one request
    pub async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<DeleteObjectsResponse> {
        Self::validate_bucket_name(bucket)?;
        if keys.is_empty() {
            return Ok(DeleteObjectsResponse::default());
        }
        if keys.len() > MAX_DELETE_KEYS {
            return Err(ServiceError::InvalidArgument(format!(
                "Cannot delete more than {} objects at once",
                MAX_DELETE_KEYS
            )));
        }

        let body = xml::build_delete_objects(keys, false).into_bytes();
        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &[("delete", None)]);
        let request = HttpRequest::new(Method::POST, url)
            .with_header("content-type", "application/xml")
            .with_header("content-length", body.len().to_string())
            .with_header("content-md5", content_md5(&body))
            .with_body(body);

        let response = self.execute(request, &[200]).await?;
        xml::parse_delete_result(&response.body)
    }

    // =========================================================================
    // Copy, move and metadata updates
    // =========================================================================

    /// Copy an object server-side.
    ///
    /// The destination keeps the source metadata unless `options.replace_metadata`
    /// is set, in which case the destination object's metadata is applied. The
    /// destination ACL and storage class are always applied.
    pub async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination: &StorageObject,
        options: &CopyOptions,
    ) -> Result<CopyResult> {
        Self::validate_bucket_name(source_bucket)?;
        Self::validate_bucket_name(destination_bucket)?;
        if source_key.is_empty() || destination.key.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "copy source and destination keys must not be empty".to_string(),
            ));
        }

        let mut headers = if options.replace_metadata {
            let mut headers = destination.metadata_headers();
            headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/octet-stream".to_string());
            headers.insert("x-amz-metadata-directive".to_string(), "REPLACE".to_string());
            headers
        } else {
            let mut headers = BTreeMap::new();
            if let Some(storage_class) = &destination.storage_class {
                headers.insert("x-amz-storage-class".to_string(), storage_class.clone());
            }
            if let Some(acl) = &destination.acl {
                acl.apply_headers(&mut headers);
            }
            headers.insert("x-amz-metadata-directive".to_string(), "COPY".to_string());
            headers
        };

        let mut copy_source = uri_encode(&format!("{}/{}", source_bucket, source_key), true);
        if let Some(version_id) = &options.version_id {
            copy_source.push_str("?versionId=");
            copy_source.push_str(version_id);
        }
        headers.insert("x-amz-copy-source".to_string(), copy_source);
        if let Some(time) = options.if_modified_since {
            headers.insert("x-amz-copy-source-if-modified-since".to_string(), http_date(time));
        }
        if let Some(time) = options.if_unmodified_since {
            headers.insert("x-amz-copy-source-if-unmodified-since".to_string(), http_date(time));
        }
        if !options.if_match.is_empty() {
            headers.insert("x-amz-copy-source-if-match".to_string(), options.if_match.join(","));
        }
        if !options.if_none_match.is_empty() {
            headers.insert(
                "x-amz-copy-source-if-none-match".to_string(),
                options.if_none_match.join(","),
            );
        }

        let url = self.object_url(destination_bucket, &destination.key, self.config.https_only);
        let mut request = HttpRequest::new(Method::PUT, url);
        request.headers = headers;
        request.set_header("content-length", "0");

        let response = self.execute(request, &[200]).await?;
        let mut result = xml::parse_copy_object_result(&response.body)?;
        result.version_id = response.header("x-amz-version-id").map(str::to_string);
        result.source_version_id = response
            .header("x-amz-copy-source-version-id")
            .map(str::to_string);

        tracing::debug!(
            source = %format!("{}/{}", source_bucket, source_key),
            destination = %format!("{}/{}", destination_bucket, destination.key),
            replace_metadata = options.replace_metadata,
            "Copied object"
        );
        Ok(result)
    }

    /// Copy an object, then delete the source.
    ///
    /// A failed delete does not fail the move; it is reported in the result.
    pub async fn move_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination: &StorageObject,
        options: &CopyOptions,
    ) -> Result<MoveResult> {
        let copy = self
            .copy_object(source_bucket, source_key, destination_bucket, destination, options)
            .await?;

        let delete_error = match self.delete_object(source_bucket, source_key).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    bucket = %source_bucket,
                    key = %source_key,
                    error = %e,
                    "Copied object but could not delete the source"
                );
                Some(e)
            }
        };
        Ok(MoveResult { copy, delete_error })
    }

    /// Move an object to a new key in the same bucket, keeping its metadata
    pub async fn rename_object(
        &self,
        bucket: &str,
        source_key: &str,
        destination: &StorageObject,
    ) -> Result<MoveResult> {
        self.move_object(bucket, source_key, bucket, destination, &CopyOptions::new())
            .await
    }

    /// Replace an object's metadata by copying it over itself
    pub async fn update_object_metadata(&self, bucket: &str, object: &StorageObject) -> Result<CopyResult> {
        self.copy_object(bucket, &object.key, bucket, object, &CopyOptions::replacing_metadata())
            .await
    }

    // =========================================================================
    // Access control
    // =========================================================================

    pub async fn get_bucket_acl(&self, bucket: &str) -> Result<AccessControlList> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &[("acl", None)]);
        self.get_acl(url).await
    }

    pub async fn put_bucket_acl(&self, bucket: &str, acl: &Acl) -> Result<()> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &[("acl", None)]);
        self.put_acl(url, acl).await?;
        tracing::info!(bucket = %bucket, "Updated bucket ACL");
        Ok(())
    }

    pub async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<AccessControlList> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(self.object_url(bucket, key, self.config.https_only), &[("acl", None)]);
        self.get_acl(url).await
    }

    pub async fn put_object_acl(&self, bucket: &str, key: &str, acl: &Acl) -> Result<()> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(self.object_url(bucket, key, self.config.https_only), &[("acl", None)]);
        self.put_acl(url, acl).await?;
        tracing::debug!(bucket = %bucket, key = %key, "Updated object ACL");
        Ok(())
    }

    async fn get_acl(&self, url: String) -> Result<AccessControlList> {
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_access_control_list(&response.body)
    }

    /// Canned ACLs and bare grants travel as headers, a policy document as the body
    async fn put_acl(&self, url: String, acl: &Acl) -> Result<()> {
        let mut request = HttpRequest::new(Method::PUT, url);
        match acl {
            Acl::Policy(policy) => {
                let body = xml::build_access_control_policy(policy).into_bytes();
                request.set_header("content-type", "application/xml");
                request.set_header("content-md5", content_md5(&body));
                request = request.with_body(body);
            }
            Acl::Canned(_) | Acl::Grants(_) => acl.apply_headers(&mut request.headers),
        }
        request.set_header("content-length", request.body.len().to_string());
        self.execute(request, &[200]).await?;
        Ok(())
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List objects, either one chunk or (with `complete`) the whole listing
    pub async fn list_objects_chunked(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
        complete: bool,
    ) -> Result<ListingChunk<StorageObject>> {
        Self::validate_bucket_name(bucket)?;
        if complete {
            collect_complete(ListingKind::Objects, request.prior_marker.clone(), |marker| {
                self.list_objects_page(bucket, request, marker)
            })
            .await
        } else {
            self.list_objects_page(bucket, request, request.prior_marker.clone())
                .await
        }
    }

    /// Complete listing of the objects under `prefix`
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<ListingChunk<StorageObject>> {
        let request = ListObjectsRequest {
            prefix: prefix.map(str::to_string),
            delimiter: delimiter.map(str::to_string),
            ..ListObjectsRequest::default()
        };
        self.list_objects_chunked(bucket, &request, true).await
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
        marker: Option<String>,
    ) -> Result<ListingChunk<StorageObject>> {
        let max_keys = request
            .max_keys
            .unwrap_or(self.config.listing.page_size)
            .to_string();
        let mut params: Vec<(&str, Option<&str>)> = Vec::with_capacity(4);
        if let Some(prefix) = &request.prefix {
            params.push(("prefix", Some(prefix.as_str())));
        }
        if let Some(delimiter) = &request.delimiter {
            params.push(("delimiter", Some(delimiter.as_str())));
        }
        params.push(("max-keys", Some(max_keys.as_str())));
        if let Some(marker) = &marker {
            params.push(("marker", Some(marker.as_str())));
        }

        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &params);
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        let chunk = xml::parse_list_objects(&response.body)?.into_chunk(ListingKind::Objects)?;
        tracing::debug!(
            bucket = %bucket,
            items = chunk.items.len(),
            complete = chunk.is_complete(),
            "Listed objects page"
        );
        Ok(chunk)
    }

    // =========================================================================
    // Multipart Upload Operations
    // =========================================================================

    /// Start a multipart upload carrying the object's metadata, ACL and storage class
    pub async fn multipart_start_upload(
        &self,
        bucket: &str,
        object: &StorageObject,
    ) -> Result<MultipartUpload> {
        Self::validate_bucket_name(bucket)?;
        let url = Self::with_query(
            self.object_url(bucket, &object.key, self.config.https_only),
            &[("uploads", None)],
        );
        let mut request = HttpRequest::new(Method::POST, url);
        request.headers = object.metadata_headers();
        request.set_header("content-length", "0");

        let response = self.execute(request, &[200]).await?;
        let mut upload = xml::parse_initiate_multipart(&response.body)?;
        if upload.bucket_name.is_empty() {
            upload.bucket_name = bucket.to_string();
        }
        if upload.object_key.is_empty() {
            upload.object_key = object.key.clone();
        }
        upload.storage_class = object.storage_class.clone();
        upload.metadata = object.metadata.clone();

        tracing::info!(
            bucket = %bucket,
            key = %object.key,
            upload_id = %upload.upload_id,
            "Started multipart upload"
        );
        Ok(upload)
    }

    /// Upload one part; the returned part carries the service ETag
    pub async fn multipart_upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: u32,
        data: Bytes,
    ) -> Result<MultipartPart> {
        let part_number_text = part_number.to_string();
        let url = Self::with_query(
            self.object_url(&upload.bucket_name, &upload.object_key, self.config.https_only),
            &[
                ("partNumber", Some(part_number_text.as_str())),
                ("uploadId", Some(upload.upload_id.as_str())),
            ],
        );
        let size = data.len() as u64;
        let request = HttpRequest::new(Method::PUT, url)
            .with_header("content-length", size.to_string())
            .with_header("content-md5", content_md5(&data))
            .with_body(data);

        let response = self.execute(request, &[200]).await?;
        let etag = response.etag().ok_or_else(|| {
            ServiceError::InvalidResponse(format!("No ETag for part {}", part_number))
        })?;

        tracing::debug!(upload_id = %upload.upload_id, part_number, size, "Uploaded part");
        Ok(MultipartPart::new(part_number, etag, size))
    }

    /// All parts the service has acknowledged for an upload
    pub async fn multipart_list_parts(&self, upload: &MultipartUpload) -> Result<Vec<MultipartPart>> {
        let chunk = collect_complete(ListingKind::MultipartParts, None, |marker| {
            self.list_parts_page(upload, marker)
        })
        .await?;
        Ok(chunk.items)
    }

    async fn list_parts_page(
        &self,
        upload: &MultipartUpload,
        marker: Option<u32>,
    ) -> Result<ListingChunk<MultipartPart, u32>> {
        let marker_text = marker.map(|m| m.to_string());
        let mut params: Vec<(&str, Option<&str>)> = vec![("uploadId", Some(upload.upload_id.as_str()))];
        if let Some(marker) = &marker_text {
            params.push(("part-number-marker", Some(marker.as_str())));
        }
        let url = Self::with_query(
            self.object_url(&upload.bucket_name, &upload.object_key, self.config.https_only),
            &params,
        );
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_list_parts(&response.body)?.into_chunk(ListingKind::MultipartParts)
    }

    /// In-progress multipart uploads of a bucket, one chunk or the whole listing
    pub async fn multipart_list_uploads_chunked(
        &self,
        bucket: &str,
        prior_marker: Option<UploadMarker>,
        complete: bool,
    ) -> Result<ListingChunk<MultipartUpload, UploadMarker>> {
        Self::validate_bucket_name(bucket)?;
        if complete {
            collect_complete(ListingKind::MultipartUploads, prior_marker, |marker| {
                self.list_uploads_page(bucket, marker)
            })
            .await
        } else {
            self.list_uploads_page(bucket, prior_marker).await
        }
    }

    /// All in-progress multipart uploads of a bucket
    pub async fn multipart_list_uploads(&self, bucket: &str) -> Result<Vec<MultipartUpload>> {
        Ok(self
            .multipart_list_uploads_chunked(bucket, None, true)
            .await?
            .items)
    }

    async fn list_uploads_page(
        &self,
        bucket: &str,
        marker: Option<UploadMarker>,
    ) -> Result<ListingChunk<MultipartUpload, UploadMarker>> {
        let mut params: Vec<(&str, Option<&str>)> = vec![("uploads", None)];
        if let Some(marker) = &marker {
            params.push(("key-marker", Some(marker.key_marker.as_str())));
            if let Some(upload_id) = &marker.upload_id_marker {
                params.push(("upload-id-marker", Some(upload_id.as_str())));
            }
        }
        let url = Self::with_query(self.bucket_url(Some(bucket), self.config.https_only), &params);
        let response = self.execute(HttpRequest::new(Method::GET, url), &[200]).await?;
        xml::parse_list_multipart_uploads(&response.body)?.into_chunk(ListingKind::MultipartUploads)
    }

    /// Complete an upload from its acknowledged parts (sent sorted by part number)
    pub async fn multipart_complete_upload(&self, upload: &MultipartUpload) -> Result<MultipartCompleted> {
        if upload.parts.is_empty() {
            return Err(ServiceError::InvalidArgument(format!(
                "multipart upload {} has no parts to complete",
                upload.upload_id
            )));
        }

        let body = xml::build_complete_multipart(upload).into_bytes();
        let url = Self::with_query(
            self.object_url(&upload.bucket_name, &upload.object_key, self.config.https_only),
            &[("uploadId", Some(upload.upload_id.as_str()))],
        );
        let request = HttpRequest::new(Method::POST, url)
            .with_header("content-type", "application/xml")
            .with_header("content-length", body.len().to_string())
            .with_body(body);

        let response = self.execute(request, &[200]).await?;
        let completed = xml::parse_complete_multipart(&response.body)?;
        tracing::info!(
            bucket = %upload.bucket_name,
            key = %upload.object_key,
            upload_id = %upload.upload_id,
            parts = upload.parts.len(),
            "Completed multipart upload"
        );
        Ok(completed)
    }

    /// Abort an upload, discarding its parts
    pub async fn multipart_abort_upload(&self, upload: &MultipartUpload) -> Result<()> {
        let url = Self::with_query(
            self.object_url(&upload.bucket_name, &upload.object_key, self.config.https_only),
            &[("uploadId", Some(upload.upload_id.as_str()))],
        );
        self.execute(HttpRequest::new(Method::DELETE, url), &[200, 204])
            .await?;
        tracing::info!(upload_id = %upload.upload_id, "Aborted multipart upload");
        Ok(())
    }

    /// Upload in parts when the object is file-backed and larger than the part size,
    /// otherwise with a single PUT
    pub async fn put_object_maybe_as_multipart(
        &self,
        bucket: &str,
        object: &StorageObject,
    ) -> Result<PutOutcome> {
        MultipartUploader::new(self).upload(bucket, object).await
    }

    // =========================================================================
    // Signed URLs
    // =========================================================================

    /// Build a signed URL for an object or a distribution resource
    pub fn create_signed_url(&self, request: &SignedUrlRequest) -> Result<String> {
        SignedUrlGenerator::new(self.signer.clone(), self.config.clone()).sign_url(request)
    }
}
