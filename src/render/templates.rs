//! XML document templates.
//!
//! Fixed-layout templates for the rendered SAML documents. Byte layout is
//! deliberate: signatures are computed over the exact rendered text, so
//! whitespace, attribute order and explicit close tags must stay as-is.
//! `${KEY}` markers are filled by the substitution engine in the parent
//! module.

/// Bearer subject with confirmation data.
///
/// `${IN_RESPONSE_TO}` receives either an empty string or a pre-rendered
/// `InResponseTo="..." ` fragment with its trailing space.
pub const SUBJECT: &str = r#"<saml:Subject><saml:NameID Format="${SUBJECT_FORMAT}" SPNameQualifier="${SP_NAME_QUALIFIER}">${SUBJECT}</saml:NameID><saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer"><saml:SubjectConfirmationData ${IN_RESPONSE_TO}NotOnOrAfter="${NOT_ON_OR_AFTER}" Recipient="${ACS_URL}"></saml:SubjectConfirmationData></saml:SubjectConfirmation></saml:Subject>"#;

/// Assertion with password authentication context.
pub const ASSERTION: &str = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="${ASSERTION_ID}" IssueInstant="${ISSUE_INSTANT}" Version="2.0"><saml:Issuer>${ISSUER}</saml:Issuer>${ASSERTION_SIGNATURE}${SUBJECT_STATEMENT}<saml:Conditions NotBefore="${NOT_BEFORE}" NotOnOrAfter="${NOT_ON_OR_AFTER}"><saml:AudienceRestriction><saml:Audience>${AUDIENCE}</saml:Audience></saml:AudienceRestriction></saml:Conditions><saml:AuthnStatement AuthnInstant="${AUTH_INSTANT}"><saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement>${ATTRIBUTE_STATEMENT}</saml:Assertion>"#;

/// Assertion variant with a session index, as expected by Microsoft Online.
pub const ASSERTION_AZURE: &str = r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="${ASSERTION_ID}" IssueInstant="${ISSUE_INSTANT}" Version="2.0"><saml:Issuer>${ISSUER}</saml:Issuer>${ASSERTION_SIGNATURE}${SUBJECT_STATEMENT}<saml:Conditions NotBefore="${NOT_BEFORE}" NotOnOrAfter="${NOT_ON_OR_AFTER}"><saml:AudienceRestriction><saml:Audience>${AUDIENCE}</saml:Audience></saml:AudienceRestriction></saml:Conditions><saml:AuthnStatement AuthnInstant="${AUTH_INSTANT}" SessionIndex="${SESSION_INDEX}" SessionNotOnOrAfter="${SESSION_NOT_ON_OR_AFTER}"><saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement>${ATTRIBUTE_STATEMENT}</saml:Assertion>"#;

/// Successful response envelope wrapping one assertion.
pub const RESPONSE: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" Destination="${ACS_URL}" ID="${RESPONSE_ID}" ${IN_RESPONSE_TO}IssueInstant="${ISSUE_INSTANT}" Version="2.0"><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">${ISSUER}</saml:Issuer>${RESPONSE_SIGNATURE}<samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"></samlp:StatusCode></samlp:Status>${ASSERTION}</samlp:Response>"#;

/// SignedInfo block with the exclusive-C14N / RSA-SHA1 / SHA1 algorithm suite.
pub const SIGNED_INFO: &str = r##"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"></ds:CanonicalizationMethod><ds:SignatureMethod Algorithm="http://www.w3.org/2000/09/xmldsig#rsa-sha1"></ds:SignatureMethod><ds:Reference URI="#${REFERENCE_URI}"><ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"></ds:Transform><ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"></ds:Transform></ds:Transforms><ds:DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"></ds:DigestMethod><ds:DigestValue>${SUBJECT_DIGEST}</ds:DigestValue></ds:Reference></ds:SignedInfo>"##;

/// Enveloped signature. `${SIGNED_INFO}` is the rendered [`SIGNED_INFO`]
/// with its `xmlns:ds` declaration stripped (the wrapper declares it).
pub const SIGNATURE: &str = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">${SIGNED_INFO}<ds:SignatureValue>${RSA_SIGNATURE}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>${CERTIFICATE}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#;

/// One attribute inside an attribute statement.
pub const ATTRIBUTE: &str = r#"<saml:Attribute Name="${ATTRIBUTE_NAME}" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:basic"><saml:AttributeValue>${ATTRIBUTE_VALUE}</saml:AttributeValue></saml:Attribute>"#;

/// Attribute statement wrapper. Rendered as the empty string when there
/// are no attributes.
pub const ATTRIBUTE_STATEMENT: &str = r#"<saml:AttributeStatement>${ATTRIBUTES}</saml:AttributeStatement>"#;
