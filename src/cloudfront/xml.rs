//! Distribution API XML documents

use crate::cloudfront::types::{
    ActiveSigner, Distribution, DistributionConfig, DistributionKind, Invalidation,
    InvalidationSummary, Origin, OriginAccessIdentity, OriginAccessIdentityConfig,
    OriginProtocolPolicy,
};
use crate::error::{Result, ServiceError};
use crate::listing::RawListingPage;
use crate::s3::signer::uri_encode;
use crate::xml::{ancestor, escape_into, push_element, walk, XmlEvent};

fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

fn non_empty(text: String) -> Option<String> {
    Some(text).filter(|t| !t.is_empty())
}

#[derive(Default)]
struct OriginFields {
    dns_name: String,
    origin_access_identity: Option<String>,
    http_port: Option<u16>,
    https_port: Option<u16>,
    protocol_policy: Option<OriginProtocolPolicy>,
}

/// Collects configuration fields wherever the enclosing document nests them
#[derive(Default)]
struct ConfigCollector {
    config: DistributionConfig,
    origin: OriginFields,
}

impl ConfigCollector {
    fn on_start(&mut self, name: Option<&str>) {
        if matches!(name, Some("S3Origin" | "CustomOrigin")) {
            self.origin = OriginFields::default();
        }
    }

    /// Returns false when the element is not a configuration field
    fn on_end(&mut self, path: &[String], text: String) -> bool {
        let config = &mut self.config;
        match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("S3Origin" | "CustomOrigin"), Some("DNSName")) => self.origin.dns_name = text,
            (Some("S3Origin"), Some("OriginAccessIdentity")) => {
                self.origin.origin_access_identity = non_empty(text);
            }
            (Some("CustomOrigin"), Some("HTTPPort")) => self.origin.http_port = text.trim().parse().ok(),
            (Some("CustomOrigin"), Some("HTTPSPort")) => self.origin.https_port = text.trim().parse().ok(),
            (Some("CustomOrigin"), Some("OriginProtocolPolicy")) => {
                self.origin.protocol_policy = OriginProtocolPolicy::parse(text.trim());
            }
            (_, Some("S3Origin")) => {
                let origin = std::mem::take(&mut self.origin);
                config.origin = Some(Origin::S3 {
                    dns_name: origin.dns_name,
                    origin_access_identity: origin.origin_access_identity,
                });
            }
            (_, Some("CustomOrigin")) => {
                let origin = std::mem::take(&mut self.origin);
                config.origin = Some(Origin::Custom {
                    dns_name: origin.dns_name,
                    http_port: origin.http_port.unwrap_or(80),
                    https_port: origin.https_port.unwrap_or(443),
                    protocol_policy: origin
                        .protocol_policy
                        .unwrap_or(OriginProtocolPolicy::MatchViewer),
                });
            }
            (_, Some("CallerReference")) => config.caller_reference = text,
            (_, Some("CNAME")) => config.cnames.push(text),
            (_, Some("Comment")) => config.comment = text,
            (_, Some("Enabled")) => config.enabled = parse_bool(&text),
            (_, Some("DefaultRootObject")) => config.default_root_object = non_empty(text),
            (Some("TrustedSigners"), Some("Self")) => config.trusted_signer_self = true,
            (Some("TrustedSigners"), Some("AwsAccountNumber")) => {
                config.trusted_signer_accounts.push(text);
            }
            (Some("Logging"), Some("Bucket")) => {
                config.logging.get_or_insert_with(Default::default).bucket = text;
            }
            (Some("Logging"), Some("Prefix")) => {
                config.logging.get_or_insert_with(Default::default).prefix = text;
            }
            (Some("RequiredProtocols"), Some("Protocol")) => config.required_protocols.push(text),
            _ => return false,
        }
        true
    }
}

/// Collects one `Distribution` document or listing summary
struct DistributionCollector {
    distribution: Distribution,
    config: ConfigCollector,
}

impl DistributionCollector {
    fn new(kind: DistributionKind) -> Self {
        Self {
            distribution: Distribution::new(kind),
            config: ConfigCollector::default(),
        }
    }

    fn on_start(&mut self, path: &[String]) {
        match ancestor(path, 0) {
            Some("Signer") => self.distribution.active_signers.push(ActiveSigner::default()),
            name => self.config.on_start(name),
        }
    }

    fn on_end(&mut self, path: &[String], text: String) {
        if path.iter().any(|name| name == "ActiveTrustedSigners") {
            if let Some(signer) = self.distribution.active_signers.last_mut() {
                match ancestor(path, 0) {
                    Some("Self") => signer.account = "Self".to_string(),
                    Some("AwsAccountNumber") => signer.account = text,
                    Some("KeyPairId") => signer.key_pair_ids.push(text),
                    _ => {}
                }
            }
            return;
        }

        let distribution = &mut self.distribution;
        match ancestor(path, 0) {
            Some("Id") => distribution.id = text,
            Some("Status") => distribution.status = text,
            Some("LastModifiedTime") => distribution.last_modified_time = non_empty(text),
            Some("DomainName") => distribution.domain_name = text,
            Some("InProgressInvalidationBatches") => {
                distribution.in_progress_invalidations = text.trim().parse().ok();
            }
            _ => {
                self.config.on_end(path, text);
            }
        }
    }

    fn finish(self) -> Distribution {
        let mut distribution = self.distribution;
        distribution.config = self.config.config;
        distribution
    }
}

/// Decode a `Distribution` or `StreamingDistribution` document
pub fn parse_distribution(kind: DistributionKind, xml: &[u8]) -> Result<Distribution> {
    let mut collector = DistributionCollector::new(kind);

    walk(xml, |event| match event {
        XmlEvent::Start { path } => collector.on_start(path),
        XmlEvent::End { path, text } => collector.on_end(path, text),
    })?;

    let distribution = collector.finish();
    if distribution.id.is_empty() {
        return Err(ServiceError::InvalidResponse(format!(
            "{} document without Id",
            kind.element()
        )));
    }
    Ok(distribution)
}

/// Decode a `DistributionConfig` or `StreamingDistributionConfig` document
pub fn parse_distribution_config(xml: &[u8]) -> Result<DistributionConfig> {
    let mut collector = ConfigCollector::default();

    walk(xml, |event| match event {
        XmlEvent::Start { path } => collector.on_start(ancestor(path, 0)),
        XmlEvent::End { path, text } => {
            collector.on_end(path, text);
        }
    })?;

    Ok(collector.config)
}

/// Decode a `DistributionList` or `StreamingDistributionList` page
pub fn parse_distribution_list(kind: DistributionKind, xml: &[u8]) -> Result<RawListingPage<Distribution>> {
    let mut page = RawListingPage::default();
    let mut current: Option<DistributionCollector> = None;
    let summary = kind.summary_element();

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some(summary) {
                current = Some(DistributionCollector::new(kind));
            } else if let Some(collector) = current.as_mut() {
                collector.on_start(path);
            }
        }
        XmlEvent::End { path, text } => {
            if ancestor(path, 0) == Some(summary) {
                if let Some(collector) = current.take() {
                    page.items.push(collector.finish());
                }
            } else if let Some(collector) = current.as_mut() {
                collector.on_end(path, text);
            } else {
                match ancestor(path, 0) {
                    Some("IsTruncated") => page.is_truncated = parse_bool(&text),
                    Some("NextMarker") => page.next_marker = non_empty(text),
                    _ => {}
                }
            }
        }
    })?;

    Ok(page)
}

/// Decode an `Invalidation` document
pub fn parse_invalidation(xml: &[u8]) -> Result<Invalidation> {
    let mut invalidation = Invalidation::default();

    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            match (ancestor(path, 1), ancestor(path, 0)) {
                (Some("InvalidationBatch"), Some("Path")) => invalidation.paths.push(text),
                (Some("InvalidationBatch"), Some("CallerReference")) => {
                    invalidation.caller_reference = text;
                }
                (_, Some("Id")) => invalidation.id = text,
                (_, Some("Status")) => invalidation.status = text,
                (_, Some("CreateTime")) => invalidation.create_time = non_empty(text),
                _ => {}
            }
        }
    })?;

    if invalidation.id.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "Invalidation document without Id".to_string(),
        ));
    }
    Ok(invalidation)
}

/// Decode an `InvalidationList` page
pub fn parse_invalidation_list(xml: &[u8]) -> Result<RawListingPage<InvalidationSummary>> {
    let mut page = RawListingPage::default();
    let mut current: Option<InvalidationSummary> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("InvalidationSummary") {
                current = Some(InvalidationSummary::default());
            }
        }
        XmlEvent::End { path, text } => match (ancestor(path, 1), ancestor(path, 0)) {
            (Some("InvalidationSummary"), Some("Id")) => {
                if let Some(summary) = current.as_mut() {
                    summary.id = text;
                }
            }
            (Some("InvalidationSummary"), Some("Status")) => {
                if let Some(summary) = current.as_mut() {
                    summary.status = text;
                }
            }
            (_, Some("InvalidationSummary")) => {
                if let Some(summary) = current.take() {
                    page.items.push(summary);
                }
            }
            (Some("InvalidationList"), Some("IsTruncated")) => page.is_truncated = parse_bool(&text),
            (Some("InvalidationList"), Some("NextMarker")) => page.next_marker = non_empty(text),
            _ => {}
        },
    })?;

    Ok(page)
}

fn on_identity_end(identity: &mut OriginAccessIdentity, name: Option<&str>, text: String) {
    match name {
        Some("Id") => identity.id = text.trim().to_string(),
        Some("S3CanonicalUserId") => identity.s3_canonical_user_id = text.trim().to_string(),
        Some("CallerReference") => identity.config.caller_reference = text,
        Some("Comment") => identity.config.comment = text,
        _ => {}
    }
}

/// Decode a `CloudFrontOriginAccessIdentity` document
pub fn parse_origin_access_identity(xml: &[u8]) -> Result<OriginAccessIdentity> {
    let mut identity = OriginAccessIdentity::default();
    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            on_identity_end(&mut identity, ancestor(path, 0), text);
        }
    })?;

    if identity.id.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "origin access identity document without Id".to_string(),
        ));
    }
    Ok(identity)
}

/// Decode a `CloudFrontOriginAccessIdentityConfig` document
pub fn parse_origin_access_identity_config(xml: &[u8]) -> Result<OriginAccessIdentityConfig> {
    let mut config = OriginAccessIdentityConfig::default();
    walk(xml, |event| {
        if let XmlEvent::End { path, text } = event {
            match ancestor(path, 0) {
                Some("CallerReference") => config.caller_reference = text,
                Some("Comment") => config.comment = text,
                _ => {}
            }
        }
    })?;
    Ok(config)
}

/// Decode a `CloudFrontOriginAccessIdentityList` page
pub fn parse_origin_access_identity_list(xml: &[u8]) -> Result<RawListingPage<OriginAccessIdentity>> {
    let mut page = RawListingPage::default();
    let mut current: Option<OriginAccessIdentity> = None;

    walk(xml, |event| match event {
        XmlEvent::Start { path } => {
            if ancestor(path, 0) == Some("CloudFrontOriginAccessIdentitySummary") {
                current = Some(OriginAccessIdentity::default());
            }
        }
        XmlEvent::End { path, text } => match ancestor(path, 0) {
            Some("CloudFrontOriginAccessIdentitySummary") => {
                if let Some(identity) = current.take() {
                    page.items.push(identity);
                }
            }
            name => match current.as_mut() {
                Some(identity) => on_identity_end(identity, name, text),
                None => match name {
                    Some("IsTruncated") => page.is_truncated = parse_bool(&text),
                    Some("NextMarker") => page.next_marker = non_empty(text.trim().to_string()),
                    _ => {}
                },
            },
        },
    })?;

    Ok(page)
}

/// `CloudFrontOriginAccessIdentityConfig` body for create and update requests
pub fn build_origin_access_identity_config(config: &OriginAccessIdentityConfig, namespace: &str) -> String {
    let mut xml = String::with_capacity(256);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?><CloudFrontOriginAccessIdentityConfig xmlns=\"");
    escape_into(&mut xml, namespace);
    xml.push_str("\">");
    push_element(&mut xml, "CallerReference", &config.caller_reference);
    push_element(&mut xml, "Comment", &config.comment);
    xml.push_str("</CloudFrontOriginAccessIdentityConfig>");
    xml
}

fn push_origin(xml: &mut String, origin: &Origin) {
    match origin {
        Origin::S3 {
            dns_name,
            origin_access_identity,
        } => {
            xml.push_str("<S3Origin>");
            push_element(xml, "DNSName", dns_name);
            if let Some(identity) = origin_access_identity {
                push_element(xml, "OriginAccessIdentity", identity);
            }
            xml.push_str("</S3Origin>");
        }
        Origin::Custom {
            dns_name,
            http_port,
            https_port,
            protocol_policy,
        } => {
            xml.push_str("<CustomOrigin>");
            push_element(xml, "DNSName", dns_name);
            push_element(xml, "HTTPPort", &http_port.to_string());
            push_element(xml, "HTTPSPort", &https_port.to_string());
            push_element(xml, "OriginProtocolPolicy", protocol_policy.as_str());
            xml.push_str("</CustomOrigin>");
        }
    }
}

/// Configuration document for create and update requests
pub fn build_distribution_config(
    kind: DistributionKind,
    config: &DistributionConfig,
    namespace: &str,
) -> Result<String> {
    let origin = config.origin.as_ref().ok_or_else(|| {
        ServiceError::InvalidArgument("distribution config requires an origin".to_string())
    })?;

    let root = kind.config_element();
    let mut xml = String::with_capacity(512);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?><");
    xml.push_str(root);
    xml.push_str(" xmlns=\"");
    escape_into(&mut xml, namespace);
    xml.push_str("\">");

    push_origin(&mut xml, origin);
    push_element(&mut xml, "CallerReference", &config.caller_reference);
    for cname in &config.cnames {
        push_element(&mut xml, "CNAME", cname);
    }
    push_element(&mut xml, "Comment", &config.comment);
    push_element(&mut xml, "Enabled", if config.enabled { "true" } else { "false" });
    if let Some(root_object) = &config.default_root_object {
        push_element(&mut xml, "DefaultRootObject", root_object);
    }
    if config.is_private() {
        xml.push_str("<TrustedSigners>");
        if config.trusted_signer_self {
            xml.push_str("<Self/>");
        }
        for account in &config.trusted_signer_accounts {
            push_element(&mut xml, "AwsAccountNumber", account);
        }
        xml.push_str("</TrustedSigners>");
    }
    if let Some(logging) = &config.logging {
        xml.push_str("<Logging>");
        push_element(&mut xml, "Bucket", &logging.bucket);
        push_element(&mut xml, "Prefix", &logging.prefix);
        xml.push_str("</Logging>");
    }
    if !config.required_protocols.is_empty() {
        xml.push_str("<RequiredProtocols>");
        for protocol in &config.required_protocols {
            push_element(&mut xml, "Protocol", protocol);
        }
        xml.push_str("</RequiredProtocols>");
    }

    xml.push_str("</");
    xml.push_str(root);
    xml.push('>');
    Ok(xml)
}

/// `InvalidationBatch` body; paths are URL-encoded and made absolute
pub fn build_invalidation_batch(paths: &[String], caller_reference: &str, namespace: &str) -> String {
    let mut xml = String::with_capacity(paths.len() * 40 + 160);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?><InvalidationBatch xmlns=\"");
    escape_into(&mut xml, namespace);
    xml.push_str("\">");
    for path in paths {
        let mut encoded = uri_encode(path, false);
        if !encoded.starts_with('/') {
            encoded.insert(0, '/');
        }
        push_element(&mut xml, "Path", &encoded);
    }
    push_element(&mut xml, "CallerReference", caller_reference);
    xml.push_str("</InvalidationBatch>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://cloudfront.amazonaws.com/doc/2010-11-01/";

    #[test]
    fn test_parse_distribution() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Distribution xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Id>EDFDVBD632BHDS5</Id>
  <Status>InProgress</Status>
  <LastModifiedTime>2010-11-01T19:37:58Z</LastModifiedTime>
  <InProgressInvalidationBatches>1</InProgressInvalidationBatches>
  <DomainName>d604721fxaaqy9.cloudfront.net</DomainName>
  <ActiveTrustedSigners>
    <Signer><Self/><KeyPairId>APKA9ONS7QCOWEXAMPLE</KeyPairId></Signer>
    <Signer><AwsAccountNumber>111122223333</AwsAccountNumber></Signer>
  </ActiveTrustedSigners>
  <DistributionConfig>
    <S3Origin>
      <DNSName>mybucket.s3.amazonaws.com</DNSName>
      <OriginAccessIdentity>origin-access-identity/cloudfront/E74FTE3AEXAMPLE</OriginAccessIdentity>
    </S3Origin>
    <CallerReference>20101101193758</CallerReference>
    <CNAME>beagles.com</CNAME>
    <CNAME>www.beagles.com</CNAME>
    <Comment>Hello &amp; welcome</Comment>
    <Enabled>true</Enabled>
    <TrustedSigners><Self/><AwsAccountNumber>111122223333</AwsAccountNumber></TrustedSigners>
    <Logging><Bucket>mylogs.s3.amazonaws.com</Bucket><Prefix>myprefix/</Prefix></Logging>
    <RequiredProtocols><Protocol>https</Protocol></RequiredProtocols>
  </DistributionConfig>
</Distribution>"#;

        let distribution = parse_distribution(DistributionKind::Standard, xml).unwrap();
        assert_eq!(distribution.id, "EDFDVBD632BHDS5");
        assert_eq!(distribution.status, "InProgress");
        assert_eq!(distribution.domain_name, "d604721fxaaqy9.cloudfront.net");
        assert_eq!(distribution.in_progress_invalidations, Some(1));
        assert_eq!(distribution.active_signers.len(), 2);
        assert_eq!(distribution.active_signers[0].account, "Self");
        assert_eq!(distribution.active_signers[0].key_pair_ids, vec!["APKA9ONS7QCOWEXAMPLE"]);
        assert_eq!(distribution.active_signers[1].account, "111122223333");

        let config = &distribution.config;
        assert_eq!(
            config.origin,
            Some(Origin::S3 {
                dns_name: "mybucket.s3.amazonaws.com".to_string(),
                origin_access_identity: Some(
                    "origin-access-identity/cloudfront/E74FTE3AEXAMPLE".to_string()
                ),
            })
        );
        assert_eq!(config.cnames, vec!["beagles.com", "www.beagles.com"]);
        assert_eq!(config.comment, "Hello & welcome");
        assert!(config.enabled);
        assert!(config.trusted_signer_self);
        assert_eq!(config.trusted_signer_accounts, vec!["111122223333"]);
        assert_eq!(config.logging.as_ref().unwrap().prefix, "myprefix/");
        assert_eq!(config.required_protocols, vec!["https"]);
    }

    #[test]
    fn test_parse_distribution_requires_id() {
        let xml = b"<Distribution><Status>Deployed</Status></Distribution>";
        assert!(parse_distribution(DistributionKind::Standard, xml).is_err());
    }

    #[test]
    fn test_parse_custom_origin_config() {
        let xml = br#"<DistributionConfig>
  <CustomOrigin>
    <DNSName>www.example.com</DNSName>
    <HTTPPort>8080</HTTPPort>
    <HTTPSPort>8443</HTTPSPort>
    <OriginProtocolPolicy>http-only</OriginProtocolPolicy>
  </CustomOrigin>
  <CallerReference>ref</CallerReference>
  <Comment></Comment>
  <Enabled>false</Enabled>
  <DefaultRootObject>index.html</DefaultRootObject>
</DistributionConfig>"#;

        let config = parse_distribution_config(xml).unwrap();
        assert_eq!(
            config.origin,
            Some(Origin::Custom {
                dns_name: "www.example.com".to_string(),
                http_port: 8080,
                https_port: 8443,
                protocol_policy: OriginProtocolPolicy::HttpOnly,
            })
        );
        assert!(!config.enabled);
        assert_eq!(config.default_root_object.as_deref(), Some("index.html"));
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_parse_streaming_distribution_list() {
        let xml = br#"<StreamingDistributionList xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Marker></Marker>
  <NextMarker>EMLARXS9EXAMPLE</NextMarker>
  <MaxItems>1</MaxItems>
  <IsTruncated>true</IsTruncated>
  <StreamingDistributionSummary>
    <Id>EGTXBD79EXAMPLE</Id>
    <Status>Deployed</Status>
    <LastModifiedTime>2010-11-01T19:37:58Z</LastModifiedTime>
    <DomainName>s5c39gqb8ow64r.cloudfront.net</DomainName>
    <S3Origin><DNSName>mystreamingbucket.s3.amazonaws.com</DNSName></S3Origin>
    <CNAME>streaming.example.com</CNAME>
    <Comment>First one</Comment>
    <Enabled>true</Enabled>
  </StreamingDistributionSummary>
</StreamingDistributionList>"#;

        let page = parse_distribution_list(DistributionKind::Streaming, xml).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("EMLARXS9EXAMPLE"));
        assert_eq!(page.items.len(), 1);

        let summary = &page.items[0];
        assert_eq!(summary.kind, DistributionKind::Streaming);
        assert_eq!(summary.id, "EGTXBD79EXAMPLE");
        assert!(summary.is_deployed());
        assert_eq!(
            summary.origin().and_then(Origin::bucket_name),
            Some("mystreamingbucket")
        );
        assert_eq!(summary.config.cnames, vec!["streaming.example.com"]);
    }

    #[test]
    fn test_parse_invalidation() {
        let xml = br#"<Invalidation xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Id>IDFDVBD632BHDS5</Id>
  <Status>InProgress</Status>
  <CreateTime>2010-11-01T19:37:58Z</CreateTime>
  <InvalidationBatch>
    <Path>/image1.jpg</Path>
    <Path>/images/image2.jpg</Path>
    <CallerReference>20101101193758</CallerReference>
  </InvalidationBatch>
</Invalidation>"#;

        let invalidation = parse_invalidation(xml).unwrap();
        assert_eq!(invalidation.id, "IDFDVBD632BHDS5");
        assert!(!invalidation.is_completed());
        assert_eq!(invalidation.paths, vec!["/image1.jpg", "/images/image2.jpg"]);
        assert_eq!(invalidation.caller_reference, "20101101193758");
    }

    #[test]
    fn test_parse_invalidation_list() {
        let xml = br#"<InvalidationList>
  <Marker/>
  <MaxItems>2</MaxItems>
  <IsTruncated>false</IsTruncated>
  <InvalidationSummary><Id>ID1</Id><Status>Completed</Status></InvalidationSummary>
  <InvalidationSummary><Id>ID2</Id><Status>InProgress</Status></InvalidationSummary>
</InvalidationList>"#;

        let page = parse_invalidation_list(xml).unwrap();
        assert!(!page.is_truncated);
        assert_eq!(
            page.items,
            vec![
                InvalidationSummary { id: "ID1".into(), status: "Completed".into() },
                InvalidationSummary { id: "ID2".into(), status: "InProgress".into() },
            ]
        );
    }

    #[test]
    fn test_build_distribution_config() {
        let config = DistributionConfig::new(Origin::s3_bucket("media"), "ref-1")
            .with_cname("cdn.example.com")
            .with_comment("a<b")
            .with_trusted_signer_self()
            .with_logging("logs.s3.amazonaws.com", "cdn/");

        let xml = build_distribution_config(DistributionKind::Standard, &config, NS).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <DistributionConfig xmlns=\"http://cloudfront.amazonaws.com/doc/2010-11-01/\">\
             <S3Origin><DNSName>media.s3.amazonaws.com</DNSName></S3Origin>\
             <CallerReference>ref-1</CallerReference>\
             <CNAME>cdn.example.com</CNAME>\
             <Comment>a&lt;b</Comment>\
             <Enabled>true</Enabled>\
             <TrustedSigners><Self/></TrustedSigners>\
             <Logging><Bucket>logs.s3.amazonaws.com</Bucket><Prefix>cdn/</Prefix></Logging>\
             </DistributionConfig>"
        );

        // The decoder reads back what the builder writes
        let parsed = parse_distribution_config(xml.as_bytes()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_build_distribution_config_requires_origin() {
        let config = DistributionConfig::default();
        assert!(matches!(
            build_distribution_config(DistributionKind::Streaming, &config, NS),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_build_invalidation_batch() {
        let xml = build_invalidation_batch(
            &["images/a b.jpg".to_string(), "/index.html".to_string()],
            "ref-2",
            NS,
        );
        assert!(xml.contains("<Path>/images/a%20b.jpg</Path><Path>/index.html</Path>"));
        assert!(xml.ends_with("<CallerReference>ref-2</CallerReference></InvalidationBatch>"));
    }

    #[test]
    fn test_parse_origin_access_identity() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<CloudFrontOriginAccessIdentity xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Id>E74FTE3AEXAMPLE</Id>
  <S3CanonicalUserId>cd13868f797c227fbea2830611a26fe0a21ba1b826ab4bed9b7771c9aEXAMPLE</S3CanonicalUserId>
  <CloudFrontOriginAccessIdentityConfig>
    <CallerReference>20120229090000</CallerReference>
    <Comment> media reader </Comment>
  </CloudFrontOriginAccessIdentityConfig>
</CloudFrontOriginAccessIdentity>"#;
        let identity = parse_origin_access_identity(xml).unwrap();
        assert_eq!(identity.id, "E74FTE3AEXAMPLE");
        assert!(identity.s3_canonical_user_id.starts_with("cd13868f"));
        assert_eq!(identity.config.caller_reference, "20120229090000");
        assert_eq!(identity.config.comment, " media reader ");

        let missing = parse_origin_access_identity(b"<CloudFrontOriginAccessIdentity/>");
        assert!(matches!(missing, Err(ServiceError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_origin_access_identity_list() {
        let xml = br#"<CloudFrontOriginAccessIdentityList xmlns="http://cloudfront.amazonaws.com/doc/2010-11-01/">
  <Marker></Marker>
  <NextMarker>E74FTE3AEXAMPLE</NextMarker>
  <MaxItems>1</MaxItems>
  <IsTruncated>true</IsTruncated>
  <CloudFrontOriginAccessIdentitySummary>
    <Id>E74FTE3AEXAMPLE</Id>
    <S3CanonicalUserId>cd13868f</S3CanonicalUserId>
    <Comment>First</Comment>
  </CloudFrontOriginAccessIdentitySummary>
</CloudFrontOriginAccessIdentityList>"#;
        let page = parse_origin_access_identity_list(xml).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("E74FTE3AEXAMPLE"));
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].config.comment, "First");
    }

    #[test]
    fn test_build_origin_access_identity_config() {
        let config = OriginAccessIdentityConfig {
            caller_reference: "ref-1".to_string(),
            comment: "Reads <private> media".to_string(),
            etag: Some("E2QWRUHEXAMPLE".to_string()),
        };
        let xml = build_origin_access_identity_config(&config, NS);
        assert!(xml.contains(&format!("<CloudFrontOriginAccessIdentityConfig xmlns=\"{}\">", NS)));
        assert!(xml.ends_with(
            "<CallerReference>ref-1</CallerReference>\
             <Comment>Reads &lt;private&gt; media</Comment>\
             </CloudFrontOriginAccessIdentityConfig>"
        ));
        assert!(!xml.contains("E2QWRUHEXAMPLE"));
    }
}
