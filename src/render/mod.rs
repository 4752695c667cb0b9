//! XML rendering for responses and assertions.
//!
//! Documents are produced by substituting `${KEY}` markers in fixed
//! templates rather than through a streaming writer: the enveloped
//! signature is computed over the exact unsigned byte layout, so the
//! renderer must be able to reproduce a document bit-for-bit with only the
//! signature slot changed.
//!
//! Substitution is strict. A marker with no matching parameter aborts the
//! render; silently emitting a literal `${KEY}` would produce a document
//! that validates nowhere and signs garbage.

pub mod templates;

use std::collections::BTreeMap;

use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSigner;

/// Substitution parameters for one render.
pub type Params = BTreeMap<String, String>;

/// Renders a template, replacing every `${KEY}` marker from `params`.
///
/// Fails with [`SamlError::Template`] on the first marker that has no
/// parameter. Parameters without a marker are ignored.
pub fn substitute(template: &str, params: &Params) -> SamlResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| SamlError::Template(format!("unterminated marker in {rest:.40}")))?;
        let key = &after[..end];
        let value = params
            .get(key)
            .ok_or_else(|| SamlError::Template(key.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Builds the `InResponseTo="..." ` attribute fragment, or the empty
/// string for IdP-initiated flows that answer no request.
#[must_use]
pub fn in_response_to_fragment(request_id: Option<&str>) -> String {
    match request_id {
        Some(id) => format!("InResponseTo=\"{id}\" "),
        None => String::new(),
    }
}

/// Renders the bearer subject statement.
pub fn subject_statement_xml(params: &Params) -> SamlResult<String> {
    substitute(templates::SUBJECT, params)
}

/// Renders the attribute statement, or the empty string when there are no
/// attributes to assert.
pub fn attribute_statement_xml(attributes: &BTreeMap<String, String>) -> SamlResult<String> {
    if attributes.is_empty() {
        return Ok(String::new());
    }
    let mut rendered = String::new();
    for (name, value) in attributes {
        let mut params = Params::new();
        params.insert("ATTRIBUTE_NAME".to_string(), name.clone());
        params.insert("ATTRIBUTE_VALUE".to_string(), value.clone());
        rendered.push_str(&substitute(templates::ATTRIBUTE, &params)?);
    }
    let mut params = Params::new();
    params.insert("ATTRIBUTES".to_string(), rendered);
    substitute(templates::ATTRIBUTE_STATEMENT, &params)
}

/// Renders an assertion, signing it in place when a signer is supplied.
///
/// The unsigned document is rendered first with an empty signature slot,
/// the signature is computed over those exact bytes, and the document is
/// rendered again with the signature spliced in after the issuer.
pub fn assertion_xml(
    template: &str,
    params: &mut Params,
    signer: Option<&XmlSigner>,
) -> SamlResult<String> {
    params.insert("ASSERTION_SIGNATURE".to_string(), String::new());
    let unsigned = substitute(template, params)?;
    let Some(signer) = signer else {
        return Ok(unsigned);
    };
    let reference = params
        .get("ASSERTION_ID")
        .ok_or_else(|| SamlError::Template("ASSERTION_ID".to_string()))?
        .clone();
    let signature = signer.signature_xml(&unsigned, &reference)?;
    params.insert("ASSERTION_SIGNATURE".to_string(), signature);
    substitute(template, params)
}

/// Renders the response envelope, signing it in place when a signer is
/// supplied. Same two-pass scheme as [`assertion_xml`].
pub fn response_xml(params: &mut Params, signer: Option<&XmlSigner>) -> SamlResult<String> {
    params.insert("RESPONSE_SIGNATURE".to_string(), String::new());
    let unsigned = substitute(templates::RESPONSE, params)?;
    let Some(signer) = signer else {
        return Ok(unsigned);
    };
    let reference = params
        .get("RESPONSE_ID")
        .ok_or_else(|| SamlError::Template("RESPONSE_ID".to_string()))?
        .clone();
    let signature = signer.signature_xml(&unsigned, &reference)?;
    params.insert("RESPONSE_SIGNATURE".to_string(), signature);
    substitute(templates::RESPONSE, params)
}
