//! Deserialization of S3 XML request bodies into Barrel types.
//!
//! Implementors of [`S3Deserialize`] are handed a reader positioned just
//! after their opening tag and must consume through the matching end tag.
//! Text content is entity-unescaped so configuration values containing
//! encoded characters (`&amp;`, `&lt;`, …) round-trip exactly.

use quick_xml::Reader;
use quick_xml::events::Event;

use barrel_model::types::{
    CompletedMultipartUpload, CompletedPart, CorsConfiguration, CorsRule, Delete, ErrorDocument,
    IndexDocument, ObjectIdentifier, Redirect, RoutingRule, RoutingRuleCondition, Tag, Tagging,
    WebsiteConfiguration,
};

use crate::error::XmlError;

/// Trait for deserializing Barrel types from XML.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// The reader is positioned just after the opening tag of this element;
    /// the implementation reads all child content and returns when the
    /// matching end tag is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the XML is malformed or required fields are
    /// missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize a complete S3 XML document into a typed value.
///
/// Finds the root element (skipping the declaration and any comments) and
/// delegates to the type's [`S3Deserialize`] implementation.
///
/// # Errors
///
/// Returns [`XmlError`] if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Return the root element name of a document without fully parsing it.
///
/// Used to sniff preconfigured bucket config files (CORS vs website).
///
/// # Errors
///
/// Returns [`XmlError`] if no root element is found.
pub fn root_element_name(xml: &[u8]) -> Result<String, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Parse a boolean from XML text (`true` / `false`).
fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::ParseError(format!("invalid boolean: {s}"))),
    }
}

fn parse_u16(s: &str) -> Result<u16, XmlError> {
    s.parse::<u16>()
        .map_err(|e| XmlError::ParseError(format!("invalid number '{s}': {e}")))
}

fn parse_i32(s: &str) -> Result<i32, XmlError> {
    s.parse::<i32>()
        .map_err(|e| XmlError::ParseError(format!("invalid number '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// CORS configuration
// ---------------------------------------------------------------------------

impl S3Deserialize for CorsConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut rules = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"CORSRule" => rules.push(CorsRule::deserialize_xml(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(Self { rules }),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unterminated CORSConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

impl S3Deserialize for CorsRule {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut rule = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"AllowedOrigin" => rule.allowed_origins.push(read_text_content(reader)?),
                    b"AllowedMethod" => rule.allowed_methods.push(read_text_content(reader)?),
                    b"AllowedHeader" => rule.allowed_headers.push(read_text_content(reader)?),
                    b"ExposeHeader" => rule.expose_headers.push(read_text_content(reader)?),
                    b"MaxAgeSeconds" => {
                        rule.max_age_seconds = Some(parse_i32(&read_text_content(reader)?)?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(rule),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement("unterminated CORSRule".to_owned()));
                }
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Website configuration
// ---------------------------------------------------------------------------

impl S3Deserialize for WebsiteConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"IndexDocument" => {
                        config.index_document = Some(read_index_document(reader)?);
                    }
                    b"ErrorDocument" => {
                        config.error_document = Some(read_error_document(reader)?);
                    }
                    b"RoutingRules" => {
                        config.routing_rules = read_routing_rules(reader)?;
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(config),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unterminated WebsiteConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

fn read_index_document(reader: &mut Reader<&[u8]>) -> Result<IndexDocument, XmlError> {
    let mut suffix = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Suffix" => suffix = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                let suffix =
                    suffix.ok_or_else(|| XmlError::MissingElement("IndexDocument.Suffix".to_owned()))?;
                return Ok(IndexDocument { suffix });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unterminated IndexDocument".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn read_error_document(reader: &mut Reader<&[u8]>) -> Result<ErrorDocument, XmlError> {
    let mut key = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                let key =
                    key.ok_or_else(|| XmlError::MissingElement("ErrorDocument.Key".to_owned()))?;
                return Ok(ErrorDocument { key });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unterminated ErrorDocument".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn read_routing_rules(reader: &mut Reader<&[u8]>) -> Result<Vec<RoutingRule>, XmlError> {
    let mut rules = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"RoutingRule" => rules.push(RoutingRule::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(rules),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unterminated RoutingRules".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

impl S3Deserialize for RoutingRule {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut condition = None;
        let mut redirect = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"Condition" => condition = Some(read_condition(reader)?),
                    b"Redirect" => redirect = Some(read_redirect(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => {
                    let redirect = redirect
                        .ok_or_else(|| XmlError::MissingElement("RoutingRule.Redirect".to_owned()))?;
                    return Ok(Self { condition, redirect });
                }
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unterminated RoutingRule".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

fn read_condition(reader: &mut Reader<&[u8]>) -> Result<RoutingRuleCondition, XmlError> {
    let mut condition = RoutingRuleCondition::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"KeyPrefixEquals" => {
                    condition.key_prefix_equals = Some(read_text_content(reader)?);
                }
                b"HttpErrorCodeReturnedEquals" => {
                    condition.http_error_code_returned_equals =
                        Some(parse_u16(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(condition),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated Condition".to_owned()));
            }
            _ => {}
        }
    }
}

fn read_redirect(reader: &mut Reader<&[u8]>) -> Result<Redirect, XmlError> {
    let mut redirect = Redirect::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Protocol" => redirect.protocol = Some(read_text_content(reader)?),
                b"HostName" => redirect.host_name = Some(read_text_content(reader)?),
                b"ReplaceKeyPrefixWith" => {
                    redirect.replace_key_prefix_with = Some(read_text_content(reader)?);
                }
                b"ReplaceKeyWith" => {
                    redirect.replace_key_with = Some(read_text_content(reader)?);
                }
                b"HttpRedirectCode" => {
                    redirect.http_redirect_code = Some(parse_u16(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(redirect),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated Redirect".to_owned()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

impl S3Deserialize for Tagging {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut tag_set = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"TagSet" => tag_set = read_tag_set(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(Self { tag_set }),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement("unterminated Tagging".to_owned()));
                }
                _ => {}
            }
        }
    }
}

fn read_tag_set(reader: &mut Reader<&[u8]>) -> Result<Vec<Tag>, XmlError> {
    let mut tags = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Tag" => tags.push(read_tag(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(tags),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated TagSet".to_owned()));
            }
            _ => {}
        }
    }
}

fn read_tag(reader: &mut Reader<&[u8]>) -> Result<Tag, XmlError> {
    let mut key = None;
    let mut value = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                b"Value" => value = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                let key = key.ok_or_else(|| XmlError::MissingElement("Tag.Key".to_owned()))?;
                let value = value.ok_or_else(|| XmlError::MissingElement("Tag.Value".to_owned()))?;
                return Ok(Tag { key, value });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated Tag".to_owned()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk delete
// ---------------------------------------------------------------------------

impl S3Deserialize for Delete {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut delete = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"Object" => delete.objects.push(read_object_identifier(reader)?),
                    b"Quiet" => delete.quiet = parse_bool(&read_text_content(reader)?)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(delete),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement("unterminated Delete".to_owned()));
                }
                _ => {}
            }
        }
    }
}

fn read_object_identifier(reader: &mut Reader<&[u8]>) -> Result<ObjectIdentifier, XmlError> {
    let mut key = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                let key = key.ok_or_else(|| XmlError::MissingElement("Object.Key".to_owned()))?;
                return Ok(ObjectIdentifier { key });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated Object".to_owned()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Multipart completion
// ---------------------------------------------------------------------------

impl S3Deserialize for CompletedMultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut parts = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"Part" => parts.push(read_completed_part(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(Self { parts }),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unterminated CompleteMultipartUpload".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

fn read_completed_part(reader: &mut Reader<&[u8]>) -> Result<CompletedPart, XmlError> {
    let mut part_number = None;
    let mut etag = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"PartNumber" => part_number = Some(parse_u16(&read_text_content(reader)?)?),
                b"ETag" => etag = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                let part_number =
                    part_number.ok_or_else(|| XmlError::MissingElement("Part.PartNumber".to_owned()))?;
                let etag = etag.ok_or_else(|| XmlError::MissingElement("Part.ETag".to_owned()))?;
                return Ok(CompletedPart { part_number, etag });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement("unterminated Part".to_owned()));
            }
            _ => {}
        }
    }
}
