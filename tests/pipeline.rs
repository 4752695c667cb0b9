//! End-to-end pipeline tests: SP-initiated and IdP-initiated flows
//! across the supported variants, dispatch, and signing.

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::DateTime;
use rsa::pkcs1v15::Signature;
use rsa::signature::Verifier;

use saml2idp::codec::{convert_guid_to_immutable_id, deflate_and_base64_encode, nice64};
use saml2idp::config::{deep_link_url, AttributeFn, SubjectFn};
use saml2idp::{
    find_processor, get_processor, AuthenticatedUser, FunctionRef, FunctionResolver, NullResolver,
    SamlError, SsoSession, XmlSigner,
};

fn user() -> AuthenticatedUser {
    AuthenticatedUser {
        email: "fred@example.com".to_string(),
        session_index: Some("sess-1".to_string()),
    }
}

fn session(saml_request: String, relay_state: Option<&str>) -> SsoSession {
    SsoSession {
        saml_request,
        relay_state: relay_state.map(str::to_string),
    }
}

fn decode_response(saml_response: &str) -> String {
    let bytes = STANDARD.decode(saml_response).unwrap();
    String::from_utf8(bytes).unwrap()
}

fn immutable_id_subject() -> SubjectFn {
    Arc::new(|_user: &AuthenticatedUser| {
        convert_guid_to_immutable_id("1f478d69-8585-4bee-89f6-a772287e6449")
    })
}

struct TestResolver;

impl FunctionResolver for TestResolver {
    fn subject_function(&self, name: &str) -> Option<SubjectFn> {
        (name == "objectguid").then(immutable_id_subject)
    }

    fn attribute_function(&self, _name: &str) -> Option<AttributeFn> {
        None
    }
}

#[test]
fn generic_sp_initiated_flow() {
    let metadata = common::metadata(
        false,
        vec![("crm", common::generic_sp(Some("https://crm.example.com/acs")))],
    );
    let sso = session(nice64(common::GENERIC_REQUEST_XML), Some("token-123"));
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    assert_eq!(processor.sp_name(), "crm");

    let params = processor.generate_response(&user()).unwrap();
    assert_eq!(params.acs_url, "https://crm.example.com/acs");
    assert_eq!(params.relay_state.as_deref(), Some("token-123"));
    assert!(params.autosubmit);

    let xml = decode_response(&params.saml_response);
    assert!(xml.contains(">fred@example.com</saml:NameID>"));
    assert_eq!(
        common::xml_attr(&xml, "Format").as_deref(),
        Some("urn:oasis:names:tc:SAML:2.0:nameid-format:email")
    );
    assert!(xml.contains("InResponseTo=\"_generic_req_1\""));
    assert!(xml.contains("<saml:Audience>https://idp.example.com/sso</saml:Audience>"));
    assert!(xml.contains("urn:oasis:names:tc:SAML:2.0:status:Success"));
    assert!(!xml.contains("<ds:Signature"));
}

#[test]
fn generic_requires_acs_in_request() {
    // The azure-style request carries no ACS URL.
    let metadata = common::metadata(
        false,
        vec![("crm", common::generic_sp(Some("https://crm.example.com/acs")))],
    );
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let result = find_processor(&metadata, &sso, Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn unconfigured_binding_never_takes_the_request_acs() {
    // A binding with no configured ACS URL must not issue a response to
    // whatever destination the request names.
    let metadata = common::metadata(false, vec![("crm", common::generic_sp(None))]);
    let xml = common::GENERIC_REQUEST_XML.replace(
        "https://crm.example.com/acs",
        "https://attacker.example.com/steal",
    );
    let result = find_processor(&metadata, &session(nice64(xml), None), Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn google_flow_takes_deflated_requests() {
    let metadata = common::metadata(false, vec![("google", common::google_sp())]);
    let encoded = deflate_and_base64_encode(common::GOOGLE_REQUEST_XML.as_bytes()).unwrap();
    let processor = find_processor(&metadata, &session(encoded, None), Arc::new(NullResolver))
        .unwrap();
    let params = processor.generate_response(&user()).unwrap();
    assert_eq!(params.acs_url, "https://www.google.com/a/example.com/acs");
    let xml = decode_response(&params.saml_response);
    assert!(xml.contains("InResponseTo=\"_google_req_1\""));
    // No Destination in the request: the audience falls back to the
    // provider name.
    assert!(xml.contains("<saml:Audience>google.com</saml:Audience>"));
}

#[test]
fn google_rejects_undeflated_request() {
    let metadata = common::metadata(false, vec![("google", common::google_sp())]);
    let sso = session(nice64(common::GOOGLE_REQUEST_XML), None);
    let result = find_processor(&metadata, &sso, Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn google_assertion_is_signed() {
    let metadata = common::metadata(true, vec![("google", common::google_sp())]);
    let encoded = deflate_and_base64_encode(common::GOOGLE_REQUEST_XML.as_bytes()).unwrap();
    let processor = find_processor(&metadata, &session(encoded, None), Arc::new(NullResolver))
        .unwrap();
    let params = processor.generate_response(&user()).unwrap();
    let xml = decode_response(&params.saml_response);
    // Assertion and response envelope each carry a signature.
    assert_eq!(xml.matches("<ds:Signature ").count(), 2);
    let assertion_start = xml.find("<saml:Assertion").unwrap();
    assert!(xml[assertion_start..].contains("<ds:Signature "));
}

#[test]
fn google_rejects_foreign_acs() {
    let metadata = common::metadata(false, vec![("google", common::google_sp())]);
    let encoded = deflate_and_base64_encode(common::GENERIC_REQUEST_XML.as_bytes()).unwrap();
    let result = find_processor(&metadata, &session(encoded, None), Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn dispatch_selects_the_matching_binding() {
    let bindings = vec![
        ("azure", common::azure_sp()),
        ("crm", common::generic_sp(Some("https://crm.example.com/acs"))),
    ];
    let metadata = common::metadata(false, bindings);

    // The generic request carries an ACS URL, which azure refuses.
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    assert_eq!(processor.sp_name(), "crm");

    // The azure request carries none, which generic refuses.
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    assert_eq!(processor.sp_name(), "azure");
}

#[test]
fn dispatch_matches_binding_by_acs_url() {
    let bindings = vec![
        ("alpha", common::generic_sp(Some("https://alpha.example.com/acs"))),
        ("crm", common::generic_sp(Some("https://crm.example.com/acs"))),
        ("zeta", common::generic_sp(Some("https://zeta.example.com/acs"))),
    ];
    let metadata = common::metadata(false, bindings);
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    assert_eq!(processor.sp_name(), "crm");
}

#[test]
fn binding_refuses_foreign_acs_url() {
    let metadata = common::metadata(
        false,
        vec![("other", common::generic_sp(Some("https://other.example.com/acs")))],
    );
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let result = find_processor(&metadata, &sso, Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn azure_rejects_request_carrying_acs() {
    let metadata = common::metadata(false, vec![("azure", common::azure_sp())]);
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let result = find_processor(&metadata, &sso, Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn azure_rejects_wrong_issuer() {
    let xml = common::AZURE_REQUEST_XML
        .replace("urn:federation:MicrosoftOnline", "https://evil.example.com");
    let metadata = common::metadata(false, vec![("azure", common::azure_sp())]);
    let result = find_processor(&metadata, &session(nice64(xml), None), Arc::new(NullResolver));
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn azure_signed_flow() {
    let mut sp = common::azure_sp();
    sp.subject_function = Some(FunctionRef::Inline(immutable_id_subject()));
    let metadata = common::metadata(true, vec![("azure", sp)]);
    let sso = session(
        nice64(common::AZURE_REQUEST_XML),
        Some(common::AZURE_RELAY_STATE),
    );
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let params = processor.generate_response(&user()).unwrap();

    assert_eq!(params.acs_url, "https://login.microsoftonline.com/login.srf");
    assert_eq!(params.relay_state.as_deref(), Some(common::AZURE_RELAY_STATE));

    let xml = decode_response(&params.saml_response);
    assert!(xml.contains(">aY1HH4WF7kuJ9qdyKH5kSQ==</saml:NameID>"));
    assert_eq!(
        common::xml_attr(&xml, "Format").as_deref(),
        Some("urn:oasis:names:tc:SAML:2.0:nameid-format:persistent")
    );
    assert!(xml.contains("<saml:Audience>urn:federation:MicrosoftOnline</saml:Audience>"));
    assert!(xml.contains("Name=\"IDPEmail\""));
    assert!(xml.contains("<saml:AttributeValue>fred@example.com</saml:AttributeValue>"));
    assert!(xml.contains("SessionIndex=\"sess-1\""));
    assert!(xml.contains("PasswordProtectedTransport"));
    // Both the assertion and the response envelope are signed.
    assert_eq!(xml.matches("<ds:Signature ").count(), 2);

    // Session expiry sits eight hours after issuance.
    let issued = DateTime::parse_from_rfc3339(&common::xml_attr(&xml, "IssueInstant").unwrap())
        .unwrap();
    let session_end =
        DateTime::parse_from_rfc3339(&common::xml_attr(&xml, "SessionNotOnOrAfter").unwrap())
            .unwrap();
    assert_eq!((session_end - issued).num_seconds(), 8 * 3600);
}

#[test]
fn azure_named_subject_function_resolves() {
    let mut sp = common::azure_sp();
    sp.subject_function = Some(FunctionRef::Named("objectguid".to_string()));
    let metadata = common::metadata(false, vec![("azure", sp)]);
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(TestResolver)).unwrap();
    let params = processor.generate_response(&user()).unwrap();
    let xml = decode_response(&params.saml_response);
    assert!(xml.contains(">aY1HH4WF7kuJ9qdyKH5kSQ==</saml:NameID>"));
}

#[test]
fn azure_unresolvable_named_function_is_fatal() {
    let mut sp = common::azure_sp();
    sp.subject_function = Some(FunctionRef::Named("objectguid".to_string()));
    let metadata = common::metadata(false, vec![("azure", sp)]);
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let result = processor.generate_response(&user());
    assert!(matches!(result, Err(SamlError::Configuration(_))));
}

#[test]
fn generic_serves_user_without_email() {
    // The base variant performs no user validation; an email-less
    // principal simply yields an empty NameID.
    let metadata = common::metadata(
        false,
        vec![("crm", common::generic_sp(Some("https://crm.example.com/acs")))],
    );
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let no_email = AuthenticatedUser {
        email: String::new(),
        session_index: None,
    };
    let params = processor.generate_response(&no_email).unwrap();
    let xml = decode_response(&params.saml_response);
    assert!(xml.contains("></saml:NameID>"));
}

#[test]
fn azure_refuses_user_without_email() {
    let mut sp = common::azure_sp();
    sp.subject_function = Some(FunctionRef::Inline(immutable_id_subject()));
    let metadata = common::metadata(false, vec![("azure", sp)]);
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let no_email = AuthenticatedUser {
        email: String::new(),
        session_index: None,
    };
    let result = processor.generate_response(&no_email);
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn azure_without_subject_function_refuses_user() {
    let metadata = common::metadata(false, vec![("azure", common::azure_sp())]);
    let sso = session(nice64(common::AZURE_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let result = processor.generate_response(&user());
    assert!(matches!(result, Err(SamlError::CannotHandleAssertion(_))));
}

#[test]
fn deep_link_flow() {
    let mut sp = common::generic_sp(Some("https://crm.example.com/acs"));
    sp.links.insert(
        "deeplink".to_string(),
        "http://crm.example.com/sp/%s/".to_string(),
    );
    let metadata = common::metadata(false, vec![("crm", sp)]);

    let (name, sp, pattern) = metadata.config_for_resource("deeplink").unwrap();
    let target_url = deep_link_url(pattern, "test");
    assert_eq!(target_url, "http://crm.example.com/sp/test/");

    let mut processor =
        get_processor(name, sp, &metadata.idp, Arc::new(NullResolver)).unwrap();
    processor.init_deep_link(target_url.clone()).unwrap();
    let params = processor.generate_response(&user()).unwrap();

    assert_eq!(params.acs_url, "https://crm.example.com/acs");
    assert_eq!(params.relay_state, Some(target_url));
    let xml = decode_response(&params.saml_response);
    assert!(!xml.contains("InResponseTo"));
}

#[test]
fn deep_link_requires_configured_acs() {
    let metadata = common::metadata(false, vec![("crm", common::generic_sp(None))]);
    let mut processor = get_processor(
        "crm",
        &metadata.service_providers["crm"],
        &metadata.idp,
        Arc::new(NullResolver),
    )
    .unwrap();
    let result = processor.init_deep_link("http://crm.example.com/sp/test/");
    assert!(matches!(result, Err(SamlError::Configuration(_))));
}

#[test]
fn response_without_bound_request_is_refused() {
    let metadata = common::metadata(false, vec![("crm", common::generic_sp(None))]);
    let processor = get_processor(
        "crm",
        &metadata.service_providers["crm"],
        &metadata.idp,
        Arc::new(NullResolver),
    )
    .unwrap();
    let result = processor.generate_response(&user());
    assert!(matches!(result, Err(SamlError::InvalidArgument(_))));
}

#[test]
fn assertion_validity_window_is_fixed() {
    let metadata = common::metadata(
        false,
        vec![("crm", common::generic_sp(Some("https://crm.example.com/acs")))],
    );
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let params = processor.generate_response(&user()).unwrap();
    let xml = decode_response(&params.saml_response);

    let not_before =
        DateTime::parse_from_rfc3339(&common::xml_attr(&xml, "NotBefore").unwrap()).unwrap();
    let not_on_or_after =
        DateTime::parse_from_rfc3339(&common::xml_attr(&xml, "NotOnOrAfter").unwrap()).unwrap();
    let issued =
        DateTime::parse_from_rfc3339(&common::xml_attr(&xml, "IssueInstant").unwrap()).unwrap();

    // One hour of clock slack before issuance, fifteen minutes of
    // validity after it.
    assert_eq!((issued - not_before).num_seconds(), 3600);
    assert_eq!((not_on_or_after - issued).num_seconds(), 900);
}

#[test]
fn signature_verifies_with_the_certificate_key() {
    let signer = XmlSigner::from_config(&common::idp_config(true)).unwrap();
    let sig_xml = signer.signature_xml("this is a test", "ref1").unwrap();

    assert!(sig_xml.contains("+ia+Gd5r/5P3C8IwhDTkpEC7rQI="));
    assert!(sig_xml.contains("URI=\"#ref1\""));
    // The certificate body is embedded without PEM armor or newlines.
    assert!(sig_xml.contains("MIIDcTCC"));
    assert!(!common::xml_between(&sig_xml, "<ds:X509Certificate>", "</ds:X509Certificate>")
        .unwrap()
        .contains('\n'));

    // The RSA signature covers SignedInfo with its namespace declaration,
    // which the embedded copy drops.
    let embedded = {
        let start = sig_xml.find("<ds:SignedInfo>").unwrap();
        let end = sig_xml.find("</ds:SignedInfo>").unwrap() + "</ds:SignedInfo>".len();
        sig_xml[start..end].to_string()
    };
    let canonical = embedded.replacen(
        "<ds:SignedInfo>",
        "<ds:SignedInfo xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">",
        1,
    );
    let sig_b64 =
        common::xml_between(&sig_xml, "<ds:SignatureValue>", "</ds:SignatureValue>").unwrap();
    let sig_bytes = STANDARD.decode(sig_b64).unwrap();
    let signature = Signature::try_from(sig_bytes.as_slice()).unwrap();
    signer
        .verifying_key()
        .verify(canonical.as_bytes(), &signature)
        .unwrap();
}

#[test]
fn signing_without_key_material_is_configuration_error() {
    let mut idp = common::idp_config(true);
    idp.private_key = None;
    let metadata = saml2idp::IdpMetadata {
        idp,
        service_providers: [(
            "crm".to_string(),
            common::generic_sp(Some("https://crm.example.com/acs")),
        )]
        .into_iter()
        .collect(),
    };
    let sso = session(nice64(common::GENERIC_REQUEST_XML), None);
    let processor = find_processor(&metadata, &sso, Arc::new(NullResolver)).unwrap();
    let result = processor.generate_response(&user());
    assert!(matches!(result, Err(SamlError::Configuration(_))));
}
