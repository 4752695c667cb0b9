//! SAML IdP error types.
//!
//! Provides error types for the request/response pipeline: decoding,
//! parsing, template rendering, signing, and dispatch.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML IdP processing errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// This processor variant / SP binding is not applicable to the request.
    ///
    /// Recoverable at the dispatcher level (the next configured binding is
    /// probed); fatal when no binding accepts the request.
    #[error("cannot handle assertion: {0}")]
    CannotHandleAssertion(String),

    /// Externally supplied configuration is malformed or unresolvable.
    ///
    /// Never retried: a bad processor path, an unresolvable derivation
    /// function or missing key material will not fix itself.
    #[error("improperly configured: {0}")]
    Configuration(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Inbound payload is not well-formed XML.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Required element or attribute missing from the request.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// A required substitution key was absent while rendering a template.
    ///
    /// Indicates an implementation bug rather than bad input.
    #[error("template error: missing substitution key {0}")]
    Template(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}
