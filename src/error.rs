//! Error types shared by the storage and distribution clients
//!
//! Every public operation returns exactly one [`ServiceError`] on failure.
//! Structured errors reported by the remote service are decoded into
//! [`RemoteError`] so callers can branch on the service's error code.

use crate::xml::{walk, XmlEvent};
use hyper::StatusCode;
use std::fmt;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal server errors persisted after {attempts} attempts")]
    TooManyInternalErrors { attempts: u32 },

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: u32 },

    #[error("{0}")]
    Remote(Box<RemoteError>),

    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("truncated {kind} listing carried no continuation marker")]
    MissingContinuationMarker { kind: &'static str },

    #[error("multipart upload {upload_id} not visible after {attempts} attempts")]
    UploadNotVisible { upload_id: String, attempts: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ServiceError {
    fn from(err: quick_xml::Error) -> Self {
        ServiceError::XmlParse(err.to_string())
    }
}

impl From<RemoteError> for ServiceError {
    fn from(err: RemoteError) -> Self {
        ServiceError::Remote(Box::new(err))
    }
}

impl From<hyper::http::Error> for ServiceError {
    fn from(err: hyper::http::Error) -> Self {
        ServiceError::Transport(format!("request build error: {}", err))
    }
}

impl From<hyper_util::client::legacy::Error> for ServiceError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ServiceError::Transport(format!("client error: {}", err))
    }
}

impl ServiceError {
    /// Error code reported by the remote service, if this is a remote error
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ServiceError::Remote(remote) => Some(remote.code.as_str()),
            _ => None,
        }
    }

    pub fn is_error_code(&self, code: &str) -> bool {
        self.error_code() == Some(code)
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ServiceError::Remote(remote) => Some(remote),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Structured error document returned by the remote service
///
/// The storage service reports `<Error><Code/><Message/><RequestId/><HostId/></Error>`,
/// the distribution API wraps `<Error><Type/><Code/><Message/><Detail/></Error>` in an
/// `<ErrorResponse>` with a sibling `<RequestId>`. Both decode into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteError {
    pub status: u16,
    pub error_type: Option<String>,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub request_id: Option<String>,
    pub host_id: Option<String>,
    /// `Date` header of the failed response, used for clock-skew correction
    pub server_date: Option<String>,
}

impl RemoteError {
    /// Decode an XML error document. Returns `Ok(None)` when the body carries no `Code`.
    pub fn parse(status: u16, body: &[u8]) -> Result<Option<RemoteError>> {
        let mut error = RemoteError {
            status,
            ..RemoteError::default()
        };

        walk(body, |event| {
            if let XmlEvent::End { path, text } = event {
                match path.last().map(String::as_str) {
                    Some("Type") => error.error_type = Some(text),
                    Some("Code") => error.code = text.trim().to_string(),
                    Some("Message") => error.message = text,
                    Some("Detail") => error.detail = Some(text),
                    Some("RequestId") | Some("RequestID") => error.request_id = Some(text),
                    Some("HostId") => error.host_id = Some(text),
                    _ => {}
                }
            }
        })?;

        if error.code.is_empty() {
            return Ok(None);
        }
        Ok(Some(error))
    }

    pub fn with_server_date(mut self, date: Option<String>) -> Self {
        self.server_date = date;
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote error {} ({}): {}", self.code, self.status, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " [{}]", detail)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " request-id={}", request_id)?;
        }
        if let Some(host_id) = &self.host_id {
            write!(f, " host-id={}", host_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_error() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <RequestId>4442587FB7D0A2F9</RequestId>
  <HostId>eftixk72aD6Ap51TnqcoF8eFidJG9Z/2mkiDFu8yU9AS1ed4OpIszj7UDNEHGran</HostId>
</Error>"#;

        let error = RemoteError::parse(404, xml).unwrap().unwrap();
        assert_eq!(error.status, 404);
        assert_eq!(error.code, "NoSuchKey");
        assert_eq!(error.message, "The specified key does not exist.");
        assert_eq!(error.request_id.as_deref(), Some("4442587FB7D0A2F9"));
        assert!(error.host_id.is_some());
        assert!(error.error_type.is_none());
    }

    #[test]
    fn test_parse_distribution_error() {
        let xml = br#"<?xml version="1.0"?>
<ErrorResponse xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Error>
    <Type>Sender</Type>
    <Code>PreconditionFailed</Code>
    <Message>The If-Match version is missing or not valid.</Message>
    <Detail>etag mismatch</Detail>
  </Error>
  <RequestId>b1ed2dd1-5b2b-11e0-bf55-a9c8a8b3b3a2</RequestId>
</ErrorResponse>"#;

        let error = RemoteError::parse(412, xml).unwrap().unwrap();
        assert_eq!(error.error_type.as_deref(), Some("Sender"));
        assert_eq!(error.code, "PreconditionFailed");
        assert_eq!(error.detail.as_deref(), Some("etag mismatch"));
        assert_eq!(
            error.request_id.as_deref(),
            Some("b1ed2dd1-5b2b-11e0-bf55-a9c8a8b3b3a2")
        );
    }

    #[test]
    fn test_parse_without_code() {
        let xml = b"<Result><Message>nothing</Message></Result>";
        assert!(RemoteError::parse(500, xml).unwrap().is_none());
    }

    #[test]
    fn test_error_code_helpers() {
        let err: ServiceError = RemoteError {
            status: 404,
            code: "NoSuchUpload".to_string(),
            ..RemoteError::default()
        }
        .into();

        assert_eq!(err.error_code(), Some("NoSuchUpload"));
        assert!(err.is_error_code("NoSuchUpload"));
        assert!(!err.is_error_code("NoSuchKey"));
        assert!(ServiceError::InvalidArgument("x".into()).error_code().is_none());
    }

    #[test]
    fn test_display_includes_identifiers() {
        let error = RemoteError {
            status: 403,
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
            request_id: Some("REQ".to_string()),
            host_id: Some("HOST".to_string()),
            ..RemoteError::default()
        };
        let rendered = error.to_string();
        assert!(rendered.contains("AccessDenied"));
        assert!(rendered.contains("request-id=REQ"));
        assert!(rendered.contains("host-id=HOST"));
    }
}
