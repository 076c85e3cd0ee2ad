//! Storage service XML documents
//!
//! Decoders for listing, multipart, copy, ACL and delete responses, and
//! builders for the request bodies the client sends.

use crate::error::{RemoteError, Result, ServiceError};
use crate::listing::RawListingPage;
use crate::s3::types::{
    AccessControlList, Bucket, BucketList, CopyResult, DeleteError, DeleteObjectsResponse,
    DeletedObject, Grant, Grantee, MultipartCompleted, MultipartPart, MultipartUpload, Owner,
    Permission, StorageObject,
};
use crate::xml::{ancestor, escape_into, push_element, walk, XmlEvent};

/// Marker pair used to resume a multipart upload listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMarker {
    pub key_marker: String,
    pub upload_id_marker: Option<String>,
}

fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

/// ETag text without whitespace or the surrounding quotes
fn etag_value(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}

fn set_owner_field(owner: &mut Option<Owner>, field: Option<&str>, text: String) {
    let owner = owner.get_or_insert_with(Owner::default);
    match field {
        Some("ID") => owner.id = text,
        Some("DisplayName") => owner.display_name = Some(text),
        _ => {}
    }
}

/// Decode a `ListBucketResult` page.
///
/// When the page is truncated without `NextMarker` (no delimiter was sent),
/// the last key or common prefix is the marker.
pub fn parse_list_objects(xml: &[u8]) -> Result<RawListingPage<StorageObject>> {
    let mut page = RawListingPage::default();
    let mut current: Option<StorageObject> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("Contents") {
                current = Some(StorageObject::new(String::new()));
            }
        }
        XmlEvent::End { path, text } => {
            let name = ancestor(path, 0);
            let parent = ancestor(path, 1);
            match (parent, name) {
                (Some("Contents"), Some("Key")) => {
                    if let Some(obj) = current.as_mut() {
                        obj.key = text;
                    }
                }
                (Some("Contents"), Some("Size")) => {
                    if let Some(obj) = current.as_mut() {
                        obj.content_length = text.trim().parse().ok();
                    }
                }
                (Some("Contents"), Some("LastModified")) => {
                    if let Some(obj) = current.as_mut() {
                        obj.last_modified = Some(text);
                    }
                }
                (Some("Contents"), Some("ETag")) => {
                    if let Some(obj) = current.as_mut() {
                        obj.etag = Some(etag_value(&text));
                    }
                }
                (Some("Contents"), Some("StorageClass")) => {
                    if let Some(obj) = current.as_mut() {
                        obj.storage_class = Some(text);
                    }
                }
                (Some("Owner"), field) if ancestor(path, 2) == Some("Contents") => {
                    if let Some(obj) = current.as_mut() {
                        set_owner_field(&mut obj.owner, field, text);
                    }
                }
                (_, Some("Contents")) => {
                    if let Some(obj) = current.take() {
                        page.items.push(obj);
                    }
                }
                (Some("CommonPrefixes"), Some("Prefix")) => page.common_prefixes.push(text),
                (Some("ListBucketResult"), Some("Prefix")) => {
                    page.prefix = Some(text).filter(|p| !p.is_empty());
                }
                (Some("ListBucketResult"), Some("Delimiter")) => {
                    page.delimiter = Some(text).filter(|d| !d.is_empty());
                }
                (Some("ListBucketResult"), Some("IsTruncated")) => page.is_truncated = parse_bool(&text),
                (Some("ListBucketResult"), Some("NextMarker")) => {
                    page.next_marker = Some(text).filter(|m| !m.is_empty());
                }
                _ => {}
            }
        }
    })?;

    if page.is_truncated && page.next_marker.is_none() {
        let last_key = page.items.last().map(|obj| obj.key.clone());
        let last_prefix = page.common_prefixes.last().cloned();
        page.next_marker = match (last_key, last_prefix) {
            (Some(key), Some(prefix)) => Some(key.max(prefix)),
            (key, prefix) => key.or(prefix),
        };
    }

    Ok(page)
}

/// Decode a `ListAllMyBucketsResult` document
pub fn parse_list_buckets(xml: &[u8]) -> Result<BucketList> {
    let mut list = BucketList::default();
    let mut current: Option<Bucket> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("Bucket") {
                current = Some(Bucket {
                    name: String::new(),
                    creation_date: None,
                });
            }
        }
        XmlEvent::End { path, text } => match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("Bucket"), Some("Name")) => {
                if let Some(bucket) = current.as_mut() {
                    bucket.name = text;
                }
            }
            (Some("Bucket"), Some("CreationDate")) => {
                if let Some(bucket) = current.as_mut() {
                    bucket.creation_date = Some(text);
                }
            }
            (_, Some("Bucket")) => {
                if let Some(bucket) = current.take() {
                    list.buckets.push(bucket);
                }
            }
            (Some("Owner"), field) => set_owner_field(&mut list.owner, field, text),
            _ => {}
        },
    })?;

    Ok(list)
}

/// Decode an `InitiateMultipartUploadResult` document
pub fn parse_initiate_multipart(xml: &[u8]) -> Result<MultipartUpload> {
    let mut upload = MultipartUpload::default();

    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            match ancestor(path, 0) {
                Some("Bucket") => upload.bucket_name = text,
                Some("Key") => upload.object_key = text,
                Some("UploadId") => upload.upload_id = text.trim().to_string(),
                _ => {}
            }
        }
    })?;

    if upload.upload_id.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "No UploadId in initiate multipart response".to_string(),
        ));
    }
    Ok(upload)
}

/// Decode a `ListPartsResult` page
pub fn parse_list_parts(xml: &[u8]) -> Result<RawListingPage<MultipartPart, u32>> {
    let mut page = RawListingPage::default();
    let mut current: Option<MultipartPart> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("Part") {
                current = Some(MultipartPart::new(0, String::new(), 0));
            }
        }
        XmlEvent::End { path, text } => match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("Part"), Some("PartNumber")) => {
                if let Some(part) = current.as_mut() {
                    part.part_number = text.trim().parse().unwrap_or(0);
                }
            }
            (Some("Part"), Some("ETag")) => {
                if let Some(part) = current.as_mut() {
                    part.etag = etag_value(&text);
                }
            }
            (Some("Part"), Some("Size")) => {
                if let Some(part) = current.as_mut() {
                    part.size = text.trim().parse().unwrap_or(0);
                }
            }
            (Some("Part"), Some("LastModified")) => {
                if let Some(part) = current.as_mut() {
                    part.last_modified = Some(text);
                }
            }
            (_, Some("Part")) => {
                if let Some(part) = current.take() {
                    page.items.push(part);
                }
            }
            (Some("ListPartsResult"), Some("IsTruncated")) => page.is_truncated = parse_bool(&text),
            (Some("ListPartsResult"), Some("NextPartNumberMarker")) => {
                page.next_marker = text.trim().parse().ok();
            }
            _ => {}
        },
    })?;

    Ok(page)
}

/// Decode a `ListMultipartUploadsResult` page
pub fn parse_list_multipart_uploads(
    xml: &[u8],
) -> Result<RawListingPage<MultipartUpload, UploadMarker>> {
    let mut page = RawListingPage::default();
    let mut bucket_name = String::new();
    let mut current: Option<MultipartUpload> = None;
    let mut next_key_marker: Option<String> = None;
    let mut next_upload_id_marker: Option<String> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("Upload") {
                current = Some(MultipartUpload::default());
            }
        }
        XmlEvent::End { path, text } => match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("Upload"), Some("Key")) => {
                if let Some(upload) = current.as_mut() {
                    upload.object_key = text;
                }
            }
            (Some("Upload"), Some("UploadId")) => {
                if let Some(upload) = current.as_mut() {
                    upload.upload_id = text.trim().to_string();
                }
            }
            (Some("Upload"), Some("StorageClass")) => {
                if let Some(upload) = current.as_mut() {
                    upload.storage_class = Some(text);
                }
            }
            (Some("Upload"), Some("Initiated")) => {
                if let Some(upload) = current.as_mut() {
                    upload.initiated = Some(text);
                }
            }
            (Some("Initiator"), field) => {
                if let Some(upload) = current.as_mut() {
                    set_owner_field(&mut upload.initiator, field, text);
                }
            }
            (Some("Owner"), field) => {
                if let Some(upload) = current.as_mut() {
                    set_owner_field(&mut upload.owner, field, text);
                }
            }
            (_, Some("Upload")) => {
                if let Some(mut upload) = current.take() {
                    upload.bucket_name = bucket_name.clone();
                    page.items.push(upload);
                }
            }
            (Some("CommonPrefixes"), Some("Prefix")) => page.common_prefixes.push(text),
            (Some("ListMultipartUploadsResult"), Some("Bucket")) => bucket_name = text,
            (Some("ListMultipartUploadsResult"), Some("Prefix")) => {
                page.prefix = Some(text).filter(|p| !p.is_empty());
            }
            (Some("ListMultipartUploadsResult"), Some("Delimiter")) => {
                page.delimiter = Some(text).filter(|d| !d.is_empty());
            }
            (Some("ListMultipartUploadsResult"), Some("IsTruncated")) => {
                page.is_truncated = parse_bool(&text);
            }
            (Some("ListMultipartUploadsResult"), Some("NextKeyMarker")) => {
                next_key_marker = Some(text).filter(|m| !m.is_empty());
            }
            (Some("ListMultipartUploadsResult"), Some("NextUploadIdMarker")) => {
                next_upload_id_marker = Some(text).filter(|m| !m.is_empty());
            }
            _ => {}
        },
    })?;

    page.next_marker = next_key_marker.map(|key_marker| UploadMarker {
        key_marker,
        upload_id_marker: next_upload_id_marker,
    });
    Ok(page)
}

/// Decode a `CompleteMultipartUploadResult`.
///
/// The service may report a failure inside a 200 response; an `<Error>`
/// document is returned as a remote error.
pub fn parse_complete_multipart(xml: &[u8]) -> Result<MultipartCompleted> {
    if let Some(error) = RemoteError::parse(200, xml)? {
        return Err(error.into());
    }

    let mut completed = MultipartCompleted::default();
    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            match ancestor(path, 0) {
                Some("Location") => completed.location = Some(text),
                Some("Bucket") => completed.bucket_name = text,
                Some("Key") => completed.object_key = text,
                Some("ETag") => completed.etag = etag_value(&text),
                _ => {}
            }
        }
    })?;

    if completed.etag.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "No ETag in complete multipart response".to_string(),
        ));
    }
    Ok(completed)
}

/// Decode a `DeleteResult` document
pub fn parse_delete_result(xml: &[u8]) -> Result<DeleteObjectsResponse> {
    let mut response = DeleteObjectsResponse::default();
    let mut current_deleted: Option<DeletedObject> = None;
    let mut current_error: Option<DeleteError> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => match ancestor(path, 0) {
            Some("Deleted") => current_deleted = Some(DeletedObject::default()),
            Some("Error") => current_error = Some(DeleteError::default()),
            _ => {}
        },
        XmlEvent::End { path, text } => match ancestor(path, 0) {
            Some("Key") => {
                if let Some(deleted) = current_deleted.as_mut() {
                    deleted.key = text;
                } else if let Some(error) = current_error.as_mut() {
                    error.key = text;
                }
            }
            Some("VersionId") => {
                if let Some(deleted) = current_deleted.as_mut() {
                    deleted.version_id = Some(text);
                }
            }
            Some("Code") => {
                if let Some(error) = current_error.as_mut() {
                    error.code = text;
                }
            }
            Some("Message") => {
                if let Some(error) = current_error.as_mut() {
                    error.message = text;
                }
            }
            Some("Deleted") => {
                if let Some(deleted) = current_deleted.take() {
                    response.deleted.push(deleted);
                }
            }
            Some("Error") => {
                if let Some(error) = current_error.take() {
                    response.errors.push(error);
                }
            }
            _ => {}
        },
    })?;

    Ok(response)
}

/// Decode a `CopyObjectResult`; like completion, a failed copy can arrive
/// as an `<Error>` document inside a 200 response
pub fn parse_copy_object_result(xml: &[u8]) -> Result<CopyResult> {
    if let Some(error) = RemoteError::parse(200, xml)? {
        return Err(error.into());
    }

    let mut result = CopyResult::default();
    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            match ancestor(path, 0) {
                Some("ETag") => result.etag = etag_value(&text),
                Some("LastModified") => result.last_modified = Some(text.trim().to_string()),
                _ => {}
            }
        }
    })?;

    if result.etag.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "No ETag in copy object response".to_string(),
        ));
    }
    Ok(result)
}

/// Decode a `LocationConstraint` document; an empty constraint is the default region
pub fn parse_bucket_location(xml: &[u8]) -> Result<Option<String>> {
    let mut location = None;
    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            if ancestor(path, 0) == Some("LocationConstraint") {
                location = Some(text.trim().to_string()).filter(|l| !l.is_empty());
            }
        }
    })?;
    Ok(location)
}

/// Decode an `AccessControlPolicy` document.
///
/// The grantee kind follows from its identifying element: `ID`, `EmailAddress`
/// or `URI`. Grants with an unknown permission are skipped.
pub fn parse_access_control_list(xml: &[u8]) -> Result<AccessControlList> {
    let mut acl = AccessControlList::default();
    let mut grantee: Option<Grantee> = None;
    let mut permission: Option<Permission> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("Grant") {
                grantee = None;
                permission = None;
            }
        }
        XmlEvent::End { path, text } => match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("Owner"), field) if ancestor(path, 2) == Some("AccessControlPolicy") => {
                set_owner_field(&mut acl.owner, field, text.trim().to_string());
            }
            (Some("Grantee"), Some("ID")) => {
                grantee = Some(Grantee::CanonicalUser(text.trim().to_string()));
            }
            (Some("Grantee"), Some("EmailAddress")) => {
                grantee = Some(Grantee::Email(text.trim().to_string()));
            }
            (Some("Grantee"), Some("URI")) => {
                grantee = Some(Grantee::Group(text.trim().to_string()));
            }
            (Some("Grant"), Some("Permission")) => permission = Permission::parse(text.trim()),
            (_, Some("Grant")) => {
                if let (Some(grantee), Some(permission)) = (grantee.take(), permission.take()) {
                    acl.grants.push(Grant::new(grantee, permission));
                }
            }
            _ => {}
        },
    })?;

    Ok(acl)
}

/// `AccessControlPolicy` body for the ACL put operations
pub fn build_access_control_policy(acl: &AccessControlList) -> String {
    let mut xml = String::with_capacity(acl.grants.len() * 200 + 256);
    xml.push_str(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <AccessControlPolicy xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
    );
    if let Some(owner) = &acl.owner {
        xml.push_str("<Owner>");
        push_element(&mut xml, "ID", &owner.id);
        if let Some(name) = &owner.display_name {
            push_element(&mut xml, "DisplayName", name);
        }
        xml.push_str("</Owner>");
    }
    xml.push_str("<AccessControlList>");
    for grant in &acl.grants {
        xml.push_str("<Grant><Grantee xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"");
        match &grant.grantee {
            Grantee::CanonicalUser(id) => {
                xml.push_str("CanonicalUser\">");
                push_element(&mut xml, "ID", id);
            }
            Grantee::Email(address) => {
                xml.push_str("AmazonCustomerByEmail\">");
                push_element(&mut xml, "EmailAddress", address);
            }
            Grantee::Group(uri) => {
                xml.push_str("Group\">");
                push_element(&mut xml, "URI", uri);
            }
        }
        xml.push_str("</Grantee>");
        push_element(&mut xml, "Permission", grant.permission.as_str());
        xml.push_str("</Grant>");
    }
    xml.push_str("</AccessControlList></AccessControlPolicy>");
    xml
}

/// `CompleteMultipartUpload` body with parts sorted by number
pub fn build_complete_multipart(upload: &MultipartUpload) -> String {
    let parts = upload.sorted_parts();
    let mut xml = String::with_capacity(parts.len() * 100 + 64);
    xml.push_str("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str("<Part><PartNumber>");
        xml.push_str(&part.part_number.to_string());
        xml.push_str("</PartNumber><ETag>\"");
        escape_into(&mut xml, &part.etag);
        xml.push_str("\"</ETag></Part>");
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Multi-object `Delete` body
pub fn build_delete_objects(keys: &[String], quiet: bool) -> String {
    let mut xml = String::with_capacity(keys.len() * 60 + 80);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Delete>");
    if quiet {
        xml.push_str("<Quiet>true</Quiet>");
    }
    for key in keys {
        xml.push_str("<Object>");
        push_element(&mut xml, "Key", key);
        xml.push_str("</Object>");
    }
    xml.push_str("</Delete>");
    xml
}

/// `CreateBucketConfiguration` body for a location constraint
pub fn build_create_bucket(location: &str) -> String {
    let mut xml = String::with_capacity(160);
    xml.push_str("<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">");
    push_element(&mut xml, "LocationConstraint", location);
    xml.push_str("</CreateBucketConfiguration>");
    xml
}
