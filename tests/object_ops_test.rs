//! Integration tests for copies, moves, access control and bucket location

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use hyper::Method;
use s3rest::s3::signer::canonical_string;
use s3rest::s3::{
    AccessControlList, Acl, CannedAcl, CopyOptions, Grantee, Owner, Permission, StorageObject,
};
use s3rest::ServiceError;

const COPY_RESULT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
     <CopyObjectResult><LastModified>2009-10-28T22:32:00.000Z</LastModified>\
     <ETag>&quot;9b2cf535f27731c974343645a3985328&quot;</ETag></CopyObjectResult>";

const OWNER_ID: &str = "75aa57f09aa0c8caeab4f8c24e99d10f8e7faeebf76c078efc7c6caea54ba06a";

fn acl_body() -> String {
    format!(
        "<AccessControlPolicy xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Owner><ID>{id}</ID><DisplayName>owner</DisplayName></Owner><AccessControlList>\
         <Grant><Grantee xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"CanonicalUser\">\
         <ID>{id}</ID><DisplayName>owner</DisplayName></Grantee><Permission>FULL_CONTROL</Permission></Grant>\
         <Grant><Grantee xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"Group\">\
         <URI>http://acs.amazonaws.com/groups/global/AllUsers</URI></Grantee><Permission>READ</Permission></Grant>\
         </AccessControlList></AccessControlPolicy>",
        id = OWNER_ID
    )
}

fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

#[tokio::test]
async fn test_copy_object_keeps_source_metadata() {
    let transport = ScriptedTransport::new(vec![
        xml_response(200, COPY_RESULT).with_header("x-amz-version-id", "v2")
    ]);
    let client = s3_client(transport.clone());

    let destination = StorageObject::new("backup/report 1.csv")
        .with_metadata("ignored", "yes")
        .with_storage_class("REDUCED_REDUNDANCY")
        .with_acl(Acl::Canned(CannedAcl::BucketOwnerRead));
    let result = client
        .copy_object("reports", "2024/report 1.csv", "archive", &destination, &CopyOptions::new())
        .await
        .unwrap();

    assert_eq!(result.etag, "9b2cf535f27731c974343645a3985328");
    assert_eq!(result.last_modified.as_deref(), Some("2009-10-28T22:32:00.000Z"));
    assert_eq!(result.version_id.as_deref(), Some("v2"));

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.url, "https://s3.amazonaws.com/archive/backup/report%201.csv");
    assert!(request.body.is_empty());
    assert_eq!(
        request.header("x-amz-copy-source"),
        Some("reports%2F2024%2Freport%201.csv")
    );
    assert_eq!(request.header("x-amz-metadata-directive"), Some("COPY"));
    assert_eq!(request.header("x-amz-storage-class"), Some("REDUCED_REDUNDANCY"));
    assert_eq!(request.header("x-amz-acl"), Some("bucket-owner-read"));
    assert_eq!(request.header("x-amz-meta-ignored"), None);

    // The copy headers take part in the signature
    let canonical = canonical_string("PUT", request.path_and_query(), &request.headers, None);
    assert!(canonical.contains("x-amz-copy-source:reports%2F2024%2Freport%201.csv\n"));
    let expected = client
        .signer()
        .authorization_header(&client.signer().sign(&canonical));
    assert_eq!(request.header("authorization"), Some(expected.as_str()));
}

#[tokio::test]
async fn test_copy_object_with_preconditions_and_version() {
    let transport = ScriptedTransport::new(vec![xml_response(200, COPY_RESULT)]);
    let client = s3_client(transport.clone());

    let since = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let options = CopyOptions::new()
        .with_version_id("3HL4kqtJlcpXroDTDmjVBH40Nrjfkd")
        .with_if_modified_since(since)
        .with_if_match("abc")
        .with_if_match("def")
        .with_if_none_match("xyz");
    client
        .copy_object("src", "a.txt", "dst", &StorageObject::new("a.txt"), &options)
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(
        request.header("x-amz-copy-source"),
        Some("src%2Fa.txt?versionId=3HL4kqtJlcpXroDTDmjVBH40Nrjfkd")
    );
    assert_eq!(
        request.header("x-amz-copy-source-if-modified-since"),
        Some("Tue, 02 Jan 2024 03:04:05 GMT")
    );
    assert_eq!(request.header("x-amz-copy-source-if-match"), Some("abc,def"));
    assert_eq!(request.header("x-amz-copy-source-if-none-match"), Some("xyz"));
    assert_eq!(request.header("x-amz-copy-source-if-unmodified-since"), None);
}

#[tokio::test]
async fn test_copy_error_inside_ok_response_is_surfaced() {
    let transport = ScriptedTransport::new(vec![xml_response(
        200,
        &error_body("InternalError", "copy failed midway"),
    )]);
    let client = s3_client(transport);

    let err = client
        .copy_object("src", "a", "dst", &StorageObject::new("b"), &CopyOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_error_code("InternalError"));
}

#[tokio::test]
async fn test_copy_requires_keys() {
    let transport = ScriptedTransport::new(vec![]);
    let client = s3_client(transport.clone());

    let err = client
        .copy_object("src", "", "dst", &StorageObject::new("b"), &CopyOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_update_object_metadata_replaces_in_place() {
    let transport = ScriptedTransport::new(vec![xml_response(200, COPY_RESULT)]);
    let client = s3_client(transport.clone());

    let object = StorageObject::new("photos/cat.jpg")
        .with_metadata("Author", "alice")
        .with_metadata("Cache-Control", "max-age=60");
    client.update_object_metadata("photos", &object).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://s3.amazonaws.com/photos/photos/cat.jpg");
    assert_eq!(request.header("x-amz-copy-source"), Some("photos%2Fphotos%2Fcat.jpg"));
    assert_eq!(request.header("x-amz-metadata-directive"), Some("REPLACE"));
    assert_eq!(request.header("x-amz-meta-author"), Some("alice"));
    assert_eq!(request.header("cache-control"), Some("max-age=60"));
    assert_eq!(request.header("content-type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn test_move_object_deletes_source_after_copy() {
    let transport = ScriptedTransport::new(vec![xml_response(200, COPY_RESULT), empty_response(204)]);
    let client = s3_client(transport.clone());

    let moved = client
        .move_object("inbox", "new.txt", "done", &StorageObject::new("old.txt"), &CopyOptions::new())
        .await
        .unwrap();

    assert!(moved.source_deleted());
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].url, "https://s3.amazonaws.com/inbox/new.txt");
}

#[tokio::test]
async fn test_move_reports_failed_delete_without_failing() {
    let transport = ScriptedTransport::new(vec![
        xml_response(200, COPY_RESULT),
        error_response(403, "AccessDenied"),
    ]);
    let client = s3_client(transport);

    let moved = client
        .move_object("inbox", "new.txt", "done", &StorageObject::new("old.txt"), &CopyOptions::new())
        .await
        .unwrap();

    assert!(!moved.source_deleted());
    assert!(moved.delete_error.unwrap().is_error_code("AccessDenied"));
    assert_eq!(moved.copy.etag, "9b2cf535f27731c974343645a3985328");
}

#[tokio::test]
async fn test_failed_copy_leaves_source_alone() {
    let transport = ScriptedTransport::new(vec![error_response(404, "NoSuchKey")]);
    let client = s3_client(transport.clone());

    let err = client
        .rename_object("inbox", "missing.txt", &StorageObject::new("renamed.txt"))
        .await
        .unwrap_err();
    assert!(err.is_error_code("NoSuchKey"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_rename_object_stays_in_bucket() {
    let transport = ScriptedTransport::new(vec![xml_response(200, COPY_RESULT), empty_response(204)]);
    let client = s3_client(transport.clone());

    client
        .rename_object("inbox", "draft.txt", &StorageObject::new("final.txt"))
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://s3.amazonaws.com/inbox/final.txt");
    assert_eq!(requests[0].header("x-amz-copy-source"), Some("inbox%2Fdraft.txt"));
    assert_eq!(requests[0].header("x-amz-metadata-directive"), Some("COPY"));
    assert_eq!(requests[1].url, "https://s3.amazonaws.com/inbox/draft.txt");
}

#[tokio::test]
async fn test_get_object_acl() {
    let transport = ScriptedTransport::new(vec![xml_response(200, &acl_body())]);
    let client = s3_client(transport.clone());

    let acl = client.get_object_acl("photos", "cat.jpg").await.unwrap();

    assert_eq!(acl.owner.as_ref().map(|o| o.id.as_str()), Some(OWNER_ID));
    let everyone = Grantee::Group("http://acs.amazonaws.com/groups/global/AllUsers".to_string());
    assert_eq!(acl.permissions_of(&everyone), vec![Permission::Read]);
    assert_eq!(
        acl.permissions_of(&Grantee::CanonicalUser(OWNER_ID.to_string())),
        vec![Permission::FullControl]
    );

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, "https://s3.amazonaws.com/photos/cat.jpg?acl");
    // The acl sub-resource is part of the signed resource
    let canonical = canonical_string("GET", request.path_and_query(), &request.headers, None);
    assert!(canonical.ends_with("\n/photos/cat.jpg?acl"));
}

#[tokio::test]
async fn test_put_bucket_acl_policy_document() {
    let transport = ScriptedTransport::new(vec![empty_response(200)]);
    let client = s3_client(transport.clone());

    let policy = AccessControlList::new(Owner {
        id: OWNER_ID.to_string(),
        display_name: None,
    })
    .with_grant(Grantee::CanonicalUser(OWNER_ID.to_string()), Permission::FullControl)
    .with_grant(Grantee::Email("audit@example.com".to_string()), Permission::ReadAcp);
    client.put_bucket_acl("photos", &Acl::Policy(policy)).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.url, "https://s3.amazonaws.com/photos?acl");
    assert_eq!(request.header("content-type"), Some("application/xml"));
    assert_eq!(request.header("x-amz-grant-read-acp"), None);
    let body = body_text(&request.body);
    assert!(body.starts_with("<?xml"));
    assert!(body.contains(&format!("<Owner><ID>{}</ID></Owner>", OWNER_ID)));
    assert!(body.contains(
        "<EmailAddress>audit@example.com</EmailAddress></Grantee><Permission>READ_ACP</Permission>"
    ));
}

#[tokio::test]
async fn test_put_object_acl_canned_and_grants_use_headers() {
    let transport = ScriptedTransport::new(vec![empty_response(200), empty_response(200)]);
    let client = s3_client(transport.clone());

    client
        .put_object_acl("photos", "cat.jpg", &Acl::Canned(CannedAcl::PublicRead))
        .await
        .unwrap();
    client
        .put_object_acl(
            "photos",
            "cat.jpg",
            &Acl::Grants(vec![s3rest::s3::Grant::new(
                Grantee::Email("audit@example.com".to_string()),
                Permission::Read,
            )]),
        )
        .await
        .unwrap();

    let requests = transport.requests();
    assert!(requests.iter().all(|r| r.url.ends_with("/photos/cat.jpg?acl")));
    assert!(requests.iter().all(|r| r.body.is_empty()));
    assert_eq!(requests[0].header("x-amz-acl"), Some("public-read"));
    assert_eq!(
        requests[1].header("x-amz-grant-read"),
        Some("emailAddress=\"audit@example.com\"")
    );
}

#[tokio::test]
async fn test_get_bucket_acl_error() {
    let transport = ScriptedTransport::new(vec![error_response(403, "AccessDenied")]);
    let client = s3_client(transport);

    let err = client.get_bucket_acl("private").await.unwrap_err();
    assert!(err.is_error_code("AccessDenied"));
}

#[tokio::test]
async fn test_get_bucket_location() {
    let transport = ScriptedTransport::new(vec![
        xml_response(
            200,
            "<LocationConstraint xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">EU</LocationConstraint>",
        ),
        xml_response(
            200,
            "<LocationConstraint xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"/>",
        ),
    ]);
    let client = s3_client(transport.clone());

    assert_eq!(client.get_bucket_location("europe").await.unwrap().as_deref(), Some("EU"));
    assert_eq!(client.get_bucket_location("classic").await.unwrap(), None);
    assert_eq!(transport.requests()[0].url, "https://s3.amazonaws.com/europe?location");
}
