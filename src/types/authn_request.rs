//! SAML AuthnRequest parsing.
//!
//! Extracts the handful of request parameters the pipeline needs from an
//! inbound AuthnRequest document. The parsed value is transient: it exists
//! only for the duration of one processing call.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

/// A parsed SAML AuthnRequest.
///
/// Only the fields the response pipeline consumes are retained.
#[derive(Debug, Clone, Default)]
pub struct AuthnRequest {
    /// Unique identifier of the request (echoed back as `InResponseTo`).
    pub id: String,

    /// The Assertion Consumer Service URL, when the SP sent one.
    pub acs_url: Option<String>,

    /// The destination URL the SP addressed, or empty.
    pub destination: String,

    /// The human-readable provider name, or empty.
    pub provider_name: String,

    /// The issuer (SP entity ID), when present.
    pub issuer: Option<String>,

    /// The requested NameID format, when present.
    pub name_id_format: Option<String>,
}

impl AuthnRequest {
    /// Parses an AuthnRequest from decoded XML text.
    ///
    /// Rejects payloads that do not look like XML at all (a leftover
    /// base64 or deflate layer), then pulls the request attributes off the
    /// document element and the issuer from its child element.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        if !xml.trim_start().starts_with('<') {
            return Err(SamlError::XmlParse(
                "request is not valid XML; it may need to be decoded or decompressed".to_string(),
            ));
        }

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut request = Self::default();
        let mut id = None;
        let mut root_seen = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if !root_seen => {
                    root_seen = true;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| SamlError::XmlParse(e.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| SamlError::XmlParse(e.to_string()))?
                            .into_owned();
                        match attr.key.local_name().as_ref() {
                            b"ID" => id = Some(value),
                            b"AssertionConsumerServiceURL" => request.acs_url = Some(value),
                            b"Destination" => request.destination = value,
                            b"ProviderName" => request.provider_name = value,
                            _ => {}
                        }
                    }
                }
                Event::Start(e) if e.local_name().as_ref() == b"Issuer" => {
                    let text = reader.read_text(e.name())?;
                    request.issuer = Some(text.trim().to_string());
                }
                Event::Start(e) | Event::Empty(e)
                    if e.local_name().as_ref() == b"NameIDPolicy" =>
                {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| SamlError::XmlParse(e.to_string()))?;
                        if attr.key.local_name().as_ref() == b"Format" {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                            request.name_id_format = Some(value.into_owned());
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        request.id =
            id.ok_or_else(|| SamlError::MissingElement("AuthnRequest ID".to_string()))?;
        Ok(request)
    }
}
