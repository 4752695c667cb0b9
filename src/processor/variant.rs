//! Per-service-provider processing variants.
//!
//! Each supported SP family is described by a [`Variant`]: a plain data
//! descriptor the one concrete [`Processor`](super::Processor) is driven
//! by. Adding a variant means adding a descriptor, not a type.

use crate::render::templates;
use crate::types::constants;

/// Fixed ACS endpoint for Microsoft Online / Azure AD federation.
pub const AZURE_ACS_URL: &str = "https://login.microsoftonline.com/login.srf";

/// Issuer Microsoft Online puts in its AuthnRequests.
pub const AZURE_REQUEST_ISSUER: &str = "urn:federation:MicrosoftOnline";

/// How the `SAMLRequest` payload is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEncoding {
    /// Plain base64 (POST binding).
    Base64,

    /// Base64 over a raw deflate stream (Redirect-style compression).
    Base64Deflate,
}

/// Where the Assertion Consumer Service URL comes from, and what an
/// unexpected one in the request means.
#[derive(Debug, Clone, Copy)]
pub enum AcsPolicy {
    /// The request must carry an ACS URL that exactly matches the
    /// binding's configured one. A binding without a configured ACS URL
    /// matches nothing.
    FromRequest,

    /// The request must carry an ACS URL containing the given fragment,
    /// on top of the exact-match rule when the binding configures one.
    /// For SP families whose ACS URLs embed a per-tenant domain.
    FromRequestMatching(&'static str),

    /// The ACS URL is fixed. When `reject_request_acs` is set, a request
    /// that carries its own ACS URL is refused outright: for SPs whose
    /// protocol never sends one, its presence means the request is not
    /// theirs.
    Fixed {
        url: &'static str,
        reject_request_acs: bool,
    },
}

/// Where the assertion audience comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudienceSource {
    /// Request `Destination`, falling back to `ProviderName`.
    DestinationOrProviderName,

    /// Request issuer, falling back to the federation issuer constant
    /// for IdP-initiated flows.
    RequestIssuer,
}

/// Where the NameID value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSource {
    /// The authenticated user's email address.
    Email,

    /// The SP's configured subject-derivation function. Mandatory: a
    /// binding without one cannot serve this variant.
    ConfiguredFunction,
}

/// Descriptor for one SP family.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    /// Short variant name, the middle segment of the dotted processor
    /// path.
    pub name: &'static str,

    pub encoding: RequestEncoding,
    pub acs: AcsPolicy,

    /// Issuer the request must carry, when the SP family mandates one.
    pub required_issuer: Option<&'static str>,

    pub audience: AudienceSource,
    pub subject: SubjectSource,

    /// NameID format placed on the subject.
    pub name_id_format: &'static str,

    /// Attribute asserted with the user's email when the binding has no
    /// attribute function of its own.
    pub email_attribute: Option<&'static str>,

    /// Whether user validation requires an obtainable email address.
    pub requires_email: bool,

    /// Assertion template for this family.
    pub assertion_template: &'static str,

    /// Whether the assertion itself carries a signature (the response
    /// envelope is always signed when signing is enabled).
    pub sign_assertion: bool,
}

/// Default processing: CRM-style SPs speaking plain POST binding.
pub static GENERIC: Variant = Variant {
    name: "generic",
    encoding: RequestEncoding::Base64,
    acs: AcsPolicy::FromRequest,
    required_issuer: None,
    audience: AudienceSource::DestinationOrProviderName,
    subject: SubjectSource::Email,
    name_id_format: constants::NAMEID_FORMAT_EMAIL,
    email_attribute: None,
    requires_email: false,
    assertion_template: templates::ASSERTION,
    sign_assertion: false,
};

/// Google Workspace: deflated requests, hosted-domain ACS URLs.
pub static GOOGLE_APPS: Variant = Variant {
    name: "google_apps",
    encoding: RequestEncoding::Base64Deflate,
    acs: AcsPolicy::FromRequestMatching(".google.com/a/"),
    required_issuer: None,
    audience: AudienceSource::DestinationOrProviderName,
    subject: SubjectSource::Email,
    name_id_format: constants::NAMEID_FORMAT_EMAIL,
    email_attribute: None,
    requires_email: false,
    assertion_template: templates::ASSERTION,
    sign_assertion: true,
};

/// Microsoft Online / Azure AD federation.
pub static AZURE: Variant = Variant {
    name: "azure",
    encoding: RequestEncoding::Base64,
    acs: AcsPolicy::Fixed {
        url: AZURE_ACS_URL,
        reject_request_acs: true,
    },
    required_issuer: Some(AZURE_REQUEST_ISSUER),
    audience: AudienceSource::RequestIssuer,
    subject: SubjectSource::ConfiguredFunction,
    name_id_format: constants::NAMEID_FORMAT_PERSISTENT,
    email_attribute: Some("IDPEmail"),
    requires_email: true,
    assertion_template: templates::ASSERTION_AZURE,
    sign_assertion: true,
};

/// Looks up a variant by its short name.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static Variant> {
    match name {
        "generic" => Some(&GENERIC),
        "google_apps" => Some(&GOOGLE_APPS),
        "azure" => Some(&AZURE),
        _ => None,
    }
}
