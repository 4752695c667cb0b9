//! The request/response pipeline.
//!
//! One concrete [`Processor`] handles every SP family; behavioral
//! differences live in the [`Variant`] descriptor it is constructed with.
//! A processor runs in two phases: `can_handle` binds an inbound request
//! (decode, parse, validate), then `generate_response` issues the signed
//! response for an authenticated user. IdP-initiated deep links skip the
//! first phase through `init_deep_link`.

pub mod variant;

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::codec::{decode_base64_and_inflate, nice64};
use crate::config::{
    AuthenticatedUser, FunctionRef, FunctionResolver, IdpConfig, SpConfig, SsoResponseParams,
    SsoSession,
};
use crate::error::{SamlError, SamlResult};
use crate::render::{
    assertion_xml, attribute_statement_xml, in_response_to_fragment, response_xml,
    subject_statement_xml, Params,
};
use crate::signature::XmlSigner;
use crate::types::AuthnRequest;

pub use variant::{AcsPolicy, AudienceSource, RequestEncoding, SubjectSource, Variant};

/// How long before `now` the assertion validity window opens.
const NOT_BEFORE_SLACK: i64 = 3600;

/// How long after `now` the assertion validity window closes.
const VALIDITY_SECONDS: i64 = 900;

/// Session lifetime advertised in directory-style assertions.
const SESSION_HOURS: i64 = 8;

/// Formats a timestamp the way SAML documents expect, second precision,
/// explicit `Z` suffix.
fn saml_instant(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Generates a document ID. The leading underscore keeps IDs valid XML
/// NCNames regardless of the hex that follows.
fn make_id() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

/// All timestamps for one response, derived from a single captured `now`
/// so they are mutually consistent.
struct Timestamps {
    instant: String,
    not_before: String,
    not_on_or_after: String,
    session_not_on_or_after: String,
}

impl Timestamps {
    fn capture() -> Self {
        let now = Utc::now();
        Self {
            instant: saml_instant(now),
            not_before: saml_instant(now - Duration::seconds(NOT_BEFORE_SLACK)),
            not_on_or_after: saml_instant(now + Duration::seconds(VALIDITY_SECONDS)),
            session_not_on_or_after: saml_instant(now + Duration::hours(SESSION_HOURS)),
        }
    }
}

/// Processes AuthnRequests and issues responses for one SP binding.
pub struct Processor {
    variant: &'static Variant,
    sp_name: String,
    sp: SpConfig,
    idp: IdpConfig,
    resolver: Arc<dyn FunctionResolver>,
    request: Option<AuthnRequest>,
    relay_state: Option<String>,
    acs_url: Option<String>,
}

impl Processor {
    /// Builds a processor for one SP binding. Use
    /// [`get_processor`](crate::registry::get_processor) to construct one
    /// from the binding's dotted processor path.
    #[must_use]
    pub fn new(
        variant: &'static Variant,
        sp_name: impl Into<String>,
        sp: SpConfig,
        idp: IdpConfig,
        resolver: Arc<dyn FunctionResolver>,
    ) -> Self {
        Self {
            variant,
            sp_name: sp_name.into(),
            sp,
            idp,
            resolver,
            request: None,
            relay_state: None,
            acs_url: None,
        }
    }

    /// Name of the SP binding this processor serves.
    #[must_use]
    pub fn sp_name(&self) -> &str {
        &self.sp_name
    }

    /// Variant name this processor runs as.
    #[must_use]
    pub fn variant_name(&self) -> &str {
        self.variant.name
    }

    fn reset(&mut self) {
        self.request = None;
        self.relay_state = None;
        self.acs_url = None;
    }

    /// Probes whether this binding can serve the session's request, and
    /// binds it when it can.
    ///
    /// A refusal is [`SamlError::CannotHandleAssertion`]; the dispatcher
    /// moves on to the next binding. Misconfiguration surfaces as
    /// [`SamlError::Configuration`] and is never retried.
    pub fn can_handle(&mut self, session: &SsoSession) -> SamlResult<()> {
        self.reset();
        if session.saml_request.is_empty() {
            return Err(SamlError::CannotHandleAssertion(
                "session carries no SAMLRequest".to_string(),
            ));
        }
        self.relay_state = session.relay_state.clone();

        let xml = self.decode_request(&session.saml_request)?;
        let request = AuthnRequest::parse(&xml).map_err(|e| {
            SamlError::CannotHandleAssertion(format!("request does not parse: {e}"))
        })?;
        self.validate_request(&request)?;
        debug!(
            sp = %self.sp_name,
            variant = %self.variant.name,
            request_id = %request.id,
            "request accepted"
        );
        self.request = Some(request);
        Ok(())
    }

    /// Primes the processor for an IdP-initiated flow: no inbound
    /// request, ACS from configuration, relay state from the resolved
    /// deep link.
    pub fn init_deep_link(&mut self, relay_state: impl Into<String>) -> SamlResult<()> {
        self.reset();
        let acs_url = match self.variant.acs {
            AcsPolicy::Fixed { url, .. } => url.to_string(),
            AcsPolicy::FromRequest | AcsPolicy::FromRequestMatching(_) => self
                .sp
                .acs_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    SamlError::Configuration(format!(
                        "binding {} has no acs_url for IdP-initiated login",
                        self.sp_name
                    ))
                })?,
        };
        self.acs_url = Some(acs_url);
        self.relay_state = Some(relay_state.into());
        Ok(())
    }

    /// Issues the response for an authenticated user.
    ///
    /// Requires a bound request (`can_handle`) or a primed deep link
    /// (`init_deep_link`).
    pub fn generate_response(&self, user: &AuthenticatedUser) -> SamlResult<SsoResponseParams> {
        let acs_url = self.acs_url.clone().ok_or_else(|| {
            SamlError::InvalidArgument(
                "no request bound; call can_handle or init_deep_link first".to_string(),
            )
        })?;
        if self.variant.requires_email && user.email.is_empty() {
            return Err(SamlError::CannotHandleAssertion(
                "authenticated user has no email".to_string(),
            ));
        }

        let subject = self.resolve_subject(user)?;
        let attributes = self.resolve_attributes(user)?;
        let audience = self.audience();
        let in_response_to =
            in_response_to_fragment(self.request.as_ref().map(|r| r.id.as_str()));
        let ts = Timestamps::capture();
        let assertion_id = make_id();
        let response_id = make_id();
        let session_index = user.session_index.clone().unwrap_or_else(make_id);

        let signer = if self.idp.signing {
            Some(XmlSigner::from_config(&self.idp)?)
        } else {
            None
        };

        let mut subject_params = Params::new();
        subject_params.insert(
            "SUBJECT_FORMAT".to_string(),
            self.variant.name_id_format.to_string(),
        );
        subject_params.insert("SP_NAME_QUALIFIER".to_string(), audience.clone());
        subject_params.insert("SUBJECT".to_string(), subject);
        subject_params.insert("IN_RESPONSE_TO".to_string(), in_response_to.clone());
        subject_params.insert("NOT_ON_OR_AFTER".to_string(), ts.not_on_or_after.clone());
        subject_params.insert("ACS_URL".to_string(), acs_url.clone());
        let subject_statement = subject_statement_xml(&subject_params)?;

        let mut assertion_params = Params::new();
        assertion_params.insert("ASSERTION_ID".to_string(), assertion_id);
        assertion_params.insert("ISSUE_INSTANT".to_string(), ts.instant.clone());
        assertion_params.insert("ISSUER".to_string(), self.idp.issuer.clone());
        assertion_params.insert("SUBJECT_STATEMENT".to_string(), subject_statement);
        assertion_params.insert("NOT_BEFORE".to_string(), ts.not_before.clone());
        assertion_params.insert("NOT_ON_OR_AFTER".to_string(), ts.not_on_or_after.clone());
        assertion_params.insert("AUDIENCE".to_string(), audience);
        assertion_params.insert("AUTH_INSTANT".to_string(), ts.instant.clone());
        assertion_params.insert(
            "ATTRIBUTE_STATEMENT".to_string(),
            attribute_statement_xml(&attributes)?,
        );
        assertion_params.insert("SESSION_INDEX".to_string(), session_index);
        assertion_params.insert(
            "SESSION_NOT_ON_OR_AFTER".to_string(),
            ts.session_not_on_or_after.clone(),
        );
        let assertion_signer = signer.as_ref().filter(|_| self.variant.sign_assertion);
        let assertion = assertion_xml(
            self.variant.assertion_template,
            &mut assertion_params,
            assertion_signer,
        )?;

        let mut response_params = Params::new();
        response_params.insert("ACS_URL".to_string(), acs_url.clone());
        response_params.insert("RESPONSE_ID".to_string(), response_id.clone());
        response_params.insert("IN_RESPONSE_TO".to_string(), in_response_to);
        response_params.insert("ISSUE_INSTANT".to_string(), ts.instant.clone());
        response_params.insert("ISSUER".to_string(), self.idp.issuer.clone());
        response_params.insert("ASSERTION".to_string(), assertion);
        let response = response_xml(&mut response_params, signer.as_ref())?;

        debug!(
            sp = %self.sp_name,
            response_id = %response_id,
            signed = self.idp.signing,
            "response issued"
        );
        Ok(SsoResponseParams {
            acs_url,
            saml_response: nice64(response.as_bytes()),
            relay_state: self.relay_state.clone(),
            autosubmit: self.idp.autosubmit,
        })
    }

    fn decode_request(&self, encoded: &str) -> SamlResult<String> {
        let bytes = match self.variant.encoding {
            RequestEncoding::Base64 => STANDARD.decode(encoded.trim()).map_err(|e| {
                SamlError::CannotHandleAssertion(format!("request is not base64: {e}"))
            })?,
            RequestEncoding::Base64Deflate => decode_base64_and_inflate(encoded.trim())
                .map_err(|e| {
                    SamlError::CannotHandleAssertion(format!("request does not inflate: {e}"))
                })?,
        };
        String::from_utf8(bytes).map_err(|e| {
            SamlError::CannotHandleAssertion(format!("request is not UTF-8: {e}"))
        })
    }

    // Request ACS URL, refused when absent.
    fn request_acs<'r>(&self, request: &'r AuthnRequest) -> SamlResult<&'r str> {
        request
            .acs_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                SamlError::CannotHandleAssertion("request carries no ACS URL".to_string())
            })
    }

    // Exact-match resolution against the binding's configured ACS URL.
    // A request addressed elsewhere is never served, and a response is
    // never issued to a destination that exists only in the request.
    fn match_configured_acs(&self, acs: &str, required: bool) -> SamlResult<()> {
        match self.sp.acs_url.as_deref().filter(|u| !u.is_empty()) {
            Some(configured) if acs == configured => Ok(()),
            Some(_) => Err(SamlError::CannotHandleAssertion(format!(
                "ACS URL {acs} does not belong to binding {}",
                self.sp_name
            ))),
            None if required => Err(SamlError::CannotHandleAssertion(format!(
                "binding {} has no configured ACS URL to match",
                self.sp_name
            ))),
            None => Ok(()),
        }
    }

    fn validate_request(&mut self, request: &AuthnRequest) -> SamlResult<()> {
        match self.variant.acs {
            AcsPolicy::FromRequest => {
                let acs = self.request_acs(request)?;
                self.match_configured_acs(acs, true)?;
                self.acs_url = Some(acs.to_string());
            }
            AcsPolicy::FromRequestMatching(fragment) => {
                let acs = self.request_acs(request)?;
                self.match_configured_acs(acs, false)?;
                if !acs.contains(fragment) {
                    return Err(SamlError::CannotHandleAssertion(format!(
                        "ACS URL {acs} does not contain {fragment}"
                    )));
                }
                self.acs_url = Some(acs.to_string());
            }
            AcsPolicy::Fixed {
                url,
                reject_request_acs,
            } => {
                if reject_request_acs && request.acs_url.is_some() {
                    return Err(SamlError::CannotHandleAssertion(
                        "request unexpectedly carries an ACS URL".to_string(),
                    ));
                }
                self.acs_url = Some(url.to_string());
            }
        }
        if let Some(required) = self.variant.required_issuer {
            if request.issuer.as_deref() != Some(required) {
                return Err(SamlError::CannotHandleAssertion(format!(
                    "request issuer {:?} is not {required}",
                    request.issuer
                )));
            }
        }
        Ok(())
    }

    fn audience(&self) -> String {
        match self.variant.audience {
            AudienceSource::DestinationOrProviderName => match &self.request {
                Some(r) if !r.destination.is_empty() => r.destination.clone(),
                Some(r) => r.provider_name.clone(),
                None => String::new(),
            },
            AudienceSource::RequestIssuer => self
                .request
                .as_ref()
                .and_then(|r| r.issuer.clone())
                .unwrap_or_else(|| variant::AZURE_REQUEST_ISSUER.to_string()),
        }
    }

    fn resolve_subject(&self, user: &AuthenticatedUser) -> SamlResult<String> {
        match self.variant.subject {
            SubjectSource::Email => Ok(user.email.clone()),
            SubjectSource::ConfiguredFunction => {
                let func = match &self.sp.subject_function {
                    None => {
                        return Err(SamlError::CannotHandleAssertion(format!(
                            "binding {} has no subject function",
                            self.sp_name
                        )))
                    }
                    Some(FunctionRef::Inline(f)) => f.clone(),
                    Some(FunctionRef::Named(name)) => {
                        self.resolver.subject_function(name).ok_or_else(|| {
                            SamlError::Configuration(format!(
                                "subject function {name} is not registered"
                            ))
                        })?
                    }
                };
                func(user)
            }
        }
    }

    fn resolve_attributes(
        &self,
        user: &AuthenticatedUser,
    ) -> SamlResult<BTreeMap<String, String>> {
        match &self.sp.attribute_function {
            Some(FunctionRef::Inline(f)) => f(user),
            Some(FunctionRef::Named(name)) => {
                let func = self.resolver.attribute_function(name).ok_or_else(|| {
                    SamlError::Configuration(format!(
                        "attribute function {name} is not registered"
                    ))
                })?;
                func(user)
            }
            None => {
                let mut attributes = BTreeMap::new();
                if let Some(name) = self.variant.email_attribute {
                    attributes.insert(name.to_string(), user.email.clone());
                }
                Ok(attributes)
            }
        }
    }
}
