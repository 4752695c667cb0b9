//! SAML 2.0 constants and URIs.
//!
//! Namespace URIs, NameID formats and status codes used by the rendered
//! documents. Exact values matter for interoperability.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Bearer subject confirmation method.
pub const CM_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// Success status code.
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Email NameID format (pipeline default).
pub const NAMEID_FORMAT_EMAIL: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:email";

/// Persistent NameID format (directory-style SPs).
pub const NAMEID_FORMAT_PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";

/// Basic attribute name format.
pub const ATTRNAME_FORMAT_BASIC: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:basic";
