//! Serialization of Barrel response documents to S3-compatible XML.
//!
//! Implementors of [`S3Serialize`] write their content as child elements of
//! the current context; the root element, namespace, and XML declaration are
//! produced by [`to_xml`]. Error envelopes are a special case with no
//! namespace, produced by [`error_envelope`].

use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use barrel_model::output::{
    AccessControlPolicy, CompleteMultipartUploadResult, CopyObjectResult, DeleteResult,
    InitiateMultipartUploadResult, ListAllMyBucketsResult, ListBucketResult, ListType,
    LocationConstraint,
};
use barrel_model::types::{
    CorsConfiguration, CorsRule, Tagging, WebsiteConfiguration,
};

use crate::error::XmlError;

/// The S3 XML namespace attached to response roots.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing Barrel types to XML.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError>;
}

/// Serialize a value as a complete S3 XML document.
///
/// # Errors
///
/// Returns [`XmlError`] if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Render the S3 error envelope.
///
/// Unlike regular response documents the envelope carries no namespace:
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error><Code>…</Code><Message>…</Message>…<RequestId>…</RequestId></Error>
/// ```
///
/// # Errors
///
/// Returns [`XmlError`] if serialization fails.
pub fn error_envelope(
    code: &str,
    message: &str,
    extra: &[(String, String)],
    request_id: &str,
) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.create_element("Error").write_inner_content(|w| {
        write_text_element(w, "Code", code)?;
        write_text_element(w, "Message", message)?;
        for (name, value) in extra {
            write_text_element(w, name, value)?;
        }
        write_text_element(w, "RequestId", request_id)
    })?;

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<(), XmlError> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `<tag>text</tag>` only if the value is `Some`.
fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> Result<(), XmlError> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

/// Format a timestamp the way S3 does: `2006-02-03T16:45:09.000Z`.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Write a `<tag>true|false</tag>` element.
fn write_bool_element<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> Result<(), XmlError> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

// ---------------------------------------------------------------------------
// Service / bucket documents
// ---------------------------------------------------------------------------

impl S3Serialize for ListAllMyBucketsResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        writer.create_element("Owner").write_inner_content(|w| {
            write_text_element(w, "ID", &self.owner.id)?;
            write_text_element(w, "DisplayName", &self.owner.display_name)
        })?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                w.create_element("Bucket").write_inner_content(|b| {
                    write_text_element(b, "Name", &bucket.name)?;
                    write_text_element(b, "CreationDate", &format_timestamp(&bucket.creation_date))
                })?;
            }
            Ok::<(), XmlError>(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ListBucketResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        write_text_element(writer, "Name", &self.name)?;
        write_text_element(writer, "Prefix", &self.prefix)?;

        match self.list_type {
            ListType::V1 => {
                write_text_element(writer, "Marker", &self.marker)?;
                write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
            }
            ListType::V2 => {
                write_text_element(writer, "KeyCount", &self.key_count.to_string())?;
                write_optional_text(
                    writer,
                    "ContinuationToken",
                    self.continuation_token.as_deref(),
                )?;
                write_optional_text(
                    writer,
                    "NextContinuationToken",
                    self.next_continuation_token.as_deref(),
                )?;
                write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
            }
        }

        write_text_element(writer, "MaxKeys", &self.max_keys.to_string())?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool_element(writer, "IsTruncated", self.is_truncated)?;

        for object in &self.contents {
            writer.create_element("Contents").write_inner_content(|w| {
                write_text_element(w, "Key", &object.key)?;
                write_text_element(w, "LastModified", &format_timestamp(&object.last_modified))?;
                write_text_element(w, "ETag", &format!("\"{}\"", object.etag))?;
                write_text_element(w, "Size", &object.size.to_string())?;
                write_text_element(w, "StorageClass", object.storage_class.as_str())
            })?;
        }

        for prefix in &self.common_prefixes {
            writer
                .create_element("CommonPrefixes")
                .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
        }

        Ok(())
    }
}

impl S3Serialize for LocationConstraint {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        // us-east-1 is represented by an empty constraint; nothing to write.
        if let Some(location) = &self.location {
            writer.write_event(Event::Text(BytesText::new(location)))?;
        }
        Ok(())
    }
}

impl S3Serialize for AccessControlPolicy {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        writer.create_element("Owner").write_inner_content(|w| {
            write_text_element(w, "ID", &self.owner.id)?;
            write_text_element(w, "DisplayName", &self.owner.display_name)
        })?;
        writer
            .create_element("AccessControlList")
            .write_inner_content(|w| {
                w.create_element("Grant").write_inner_content(|g| {
                    g.create_element("Grantee")
                        .with_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"))
                        .with_attribute(("xsi:type", "CanonicalUser"))
                        .write_inner_content(|gr| {
                            write_text_element(gr, "ID", &self.owner.id)?;
                            write_text_element(gr, "DisplayName", &self.owner.display_name)
                        })?;
                    write_text_element(g, "Permission", "FULL_CONTROL")
                })?;
                Ok::<(), XmlError>(())
            })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object / multipart documents
// ---------------------------------------------------------------------------

impl S3Serialize for CopyObjectResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        write_text_element(writer, "LastModified", &format_timestamp(&self.last_modified))?;
        write_text_element(writer, "ETag", &self.etag)
    }
}

impl S3Serialize for InitiateMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)
    }
}

impl S3Serialize for CompleteMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        write_text_element(writer, "Location", &self.location)?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "ETag", &self.etag)
    }
}

impl S3Serialize for DeleteResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        for deleted in &self.deleted {
            writer
                .create_element("Deleted")
                .write_inner_content(|w| write_text_element(w, "Key", &deleted.key))?;
        }
        for error in &self.errors {
            writer.create_element("Error").write_inner_content(|w| {
                write_text_element(w, "Key", &error.key)?;
                write_text_element(w, "Code", &error.code)?;
                write_text_element(w, "Message", &error.message)
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subresource configuration round-trips
// ---------------------------------------------------------------------------

impl S3Serialize for Tagging {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        writer.create_element("TagSet").write_inner_content(|w| {
            for tag in &self.tag_set {
                w.create_element("Tag").write_inner_content(|t| {
                    write_text_element(t, "Key", &tag.key)?;
                    write_text_element(t, "Value", &tag.value)
                })?;
            }
            Ok::<(), XmlError>(())
        })?;
        Ok(())
    }
}

impl S3Serialize for CorsRule {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        for origin in &self.allowed_origins {
            write_text_element(writer, "AllowedOrigin", origin)?;
        }
        for method in &self.allowed_methods {
            write_text_element(writer, "AllowedMethod", method)?;
        }
        for header in &self.allowed_headers {
            write_text_element(writer, "AllowedHeader", header)?;
        }
        for header in &self.expose_headers {
            write_text_element(writer, "ExposeHeader", header)?;
        }
        if let Some(age) = self.max_age_seconds {
            write_text_element(writer, "MaxAgeSeconds", &age.to_string())?;
        }
        Ok(())
    }
}

impl S3Serialize for CorsConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        for rule in &self.rules {
            writer
                .create_element("CORSRule")
                .write_inner_content(|w| rule.serialize_xml(w))?;
        }
        Ok(())
    }
}

impl S3Serialize for WebsiteConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), XmlError> {
        if let Some(index) = &self.index_document {
            writer
                .create_element("IndexDocument")
                .write_inner_content(|w| write_text_element(w, "Suffix", &index.suffix))?;
        }
        if let Some(error) = &self.error_document {
            writer
                .create_element("ErrorDocument")
                .write_inner_content(|w| write_text_element(w, "Key", &error.key))?;
        }
        if !self.routing_rules.is_empty() {
            writer
                .create_element("RoutingRules")
                .write_inner_content(|w| {
                    for rule in &self.routing_rules {
                        w.create_element("RoutingRule").write_inner_content(|r| {
                            if let Some(condition) = &rule.condition {
                                r.create_element("Condition").write_inner_content(|c| {
                                    write_optional_text(
                                        c,
                                        "KeyPrefixEquals",
                                        condition.key_prefix_equals.as_deref(),
                                    )?;
                                    if let Some(code) = condition.http_error_code_returned_equals {
                                        write_text_element(
                                            c,
                                            "HttpErrorCodeReturnedEquals",
                                            &code.to_string(),
                                        )?;
                                    }
                                    Ok::<(), XmlError>(())
                                })?;
                            }
                            r.create_element("Redirect").write_inner_content(|d| {
                                let redirect = &rule.redirect;
                                write_optional_text(d, "Protocol", redirect.protocol.as_deref())?;
                                write_optional_text(d, "HostName", redirect.host_name.as_deref())?;
                                write_optional_text(
                                    d,
                                    "ReplaceKeyPrefixWith",
                                    redirect.replace_key_prefix_with.as_deref(),
                                )?;
                                write_optional_text(
                                    d,
                                    "ReplaceKeyWith",
                                    redirect.replace_key_with.as_deref(),
                                )?;
                                if let Some(code) = redirect.http_redirect_code {
                                    write_text_element(
                                        d,
                                        "HttpRedirectCode",
                                        &code.to_string(),
                                    )?;
                                }
                                Ok::<(), XmlError>(())
                            })?;
                            Ok::<(), XmlError>(())
                        })?;
                    }
                    Ok::<(), XmlError>(())
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use barrel_model::types::{BucketInfo, IndexDocument, Owner, Tag};
    use chrono::TimeZone;

    use super::*;

    fn xml_string<T: S3Serialize>(root: &str, value: &T) -> String {
        String::from_utf8(to_xml(root, value).expect("serialize")).expect("utf8")
    }

    #[test]
    fn test_should_serialize_list_buckets_result() {
        let result = ListAllMyBucketsResult {
            owner: Owner::default(),
            buckets: vec![BucketInfo {
                name: "bucket-a".to_owned(),
                creation_date: Utc.with_ymd_and_hms(2024, 2, 3, 16, 45, 9).unwrap(),
            }],
        };
        let xml = xml_string("ListAllMyBucketsResult", &result);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\""));
        assert!(xml.contains("<Name>bucket-a</Name>"));
        assert!(xml.contains("<CreationDate>2024-02-03T16:45:09.000Z</CreationDate>"));
    }

    #[test]
    fn test_should_serialize_error_envelope_without_namespace() {
        let xml = String::from_utf8(
            error_envelope("NoSuchKey", "The specified key does not exist.", &[], "req-1")
                .expect("serialize"),
        )
        .expect("utf8");
        assert!(xml.contains("<Error><Code>NoSuchKey</Code>"));
        assert!(!xml.contains("xmlns"));
        assert!(xml.contains("<RequestId>req-1</RequestId>"));
    }

    #[test]
    fn test_should_serialize_error_envelope_extras_in_order() {
        let extra = vec![
            ("StringToSign".to_owned(), "abc".to_owned()),
            ("StringToSignBytes".to_owned(), "61 62 63".to_owned()),
        ];
        let xml = String::from_utf8(
            error_envelope("SignatureDoesNotMatch", "mismatch", &extra, "req-2").expect("serialize"),
        )
        .expect("utf8");
        let sts = xml.find("<StringToSign>").expect("StringToSign present");
        let bytes = xml.find("<StringToSignBytes>").expect("bytes present");
        let rid = xml.find("<RequestId>").expect("request id present");
        assert!(sts < bytes && bytes < rid);
    }

    #[test]
    fn test_should_serialize_tagging_round_trip_document() {
        let tagging = Tagging {
            tag_set: vec![Tag {
                key: "env".to_owned(),
                value: "dev".to_owned(),
            }],
        };
        let xml = xml_string("Tagging", &tagging);
        assert!(xml.contains("<TagSet><Tag><Key>env</Key><Value>dev</Value></Tag></TagSet>"));
    }

    #[test]
    fn test_should_escape_text_content() {
        let tagging = Tagging {
            tag_set: vec![Tag {
                key: "query".to_owned(),
                value: "a=1&b=2".to_owned(),
            }],
        };
        let xml = xml_string("Tagging", &tagging);
        assert!(xml.contains("<Value>a=1&amp;b=2</Value>"));
    }

    #[test]
    fn test_should_serialize_website_configuration() {
        let config = WebsiteConfiguration {
            index_document: Some(IndexDocument {
                suffix: "index.html".to_owned(),
            }),
            error_document: None,
            routing_rules: Vec::new(),
        };
        let xml = xml_string("WebsiteConfiguration", &config);
        assert!(xml.contains("<IndexDocument><Suffix>index.html</Suffix></IndexDocument>"));
        assert!(!xml.contains("RoutingRules"));
    }

    #[test]
    fn test_should_serialize_v2_listing_fields() {
        let result = ListBucketResult {
            list_type: ListType::V2,
            name: "b".to_owned(),
            prefix: String::new(),
            delimiter: Some("/".to_owned()),
            max_keys: 1000,
            is_truncated: true,
            contents: Vec::new(),
            common_prefixes: vec!["key/".to_owned()],
            marker: String::new(),
            next_marker: None,
            key_count: 1,
            continuation_token: None,
            next_continuation_token: Some("dG9rZW4=".to_owned()),
            start_after: None,
        };
        let xml = xml_string("ListBucketResult", &result);
        assert!(xml.contains("<KeyCount>1</KeyCount>"));
        assert!(xml.contains("<NextContinuationToken>dG9rZW4=</NextContinuationToken>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>key/</Prefix></CommonPrefixes>"));
        assert!(!xml.contains("<Marker>"));
    }
}
