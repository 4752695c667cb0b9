//! RSA-SHA1 signer for rendered documents.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{Keypair, SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha1::{Digest, Sha1};

use crate::codec::nice64;
use crate::config::IdpConfig;
use crate::error::{SamlError, SamlResult};
use crate::render::{substitute, templates, Params};

/// Base64-encoded SHA-1 digest of the given bytes, as placed in a
/// `ds:DigestValue` element.
#[must_use]
pub fn sha1_digest_b64(data: &[u8]) -> String {
    nice64(Sha1::digest(data))
}

/// Signs rendered assertions and responses.
///
/// Holds the parsed private key and the certificate body so repeated
/// signings do not re-read or re-parse key material.
pub struct XmlSigner {
    signing_key: SigningKey<Sha1>,
    certificate: String,
}

impl XmlSigner {
    /// Builds a signer from the IdP configuration.
    ///
    /// Fails with [`SamlError::Configuration`] when key material is
    /// missing or does not parse. Accepts both PKCS#8 and PKCS#1 private
    /// key PEM encodings.
    pub fn from_config(idp: &IdpConfig) -> SamlResult<Self> {
        let key_pem = idp
            .private_key
            .as_ref()
            .ok_or_else(|| {
                SamlError::Configuration("signing enabled but no private key configured".to_string())
            })?
            .pem()?;
        let cert_pem = idp
            .certificate
            .as_ref()
            .ok_or_else(|| {
                SamlError::Configuration("signing enabled but no certificate configured".to_string())
            })?
            .pem()?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&key_pem))
            .map_err(|e| SamlError::Configuration(format!("cannot parse private key: {e}")))?;

        Ok(Self {
            signing_key: SigningKey::new(private_key),
            certificate: certificate_body(&cert_pem)?,
        })
    }

    /// Produces the enveloped `ds:Signature` element for a rendered
    /// document.
    ///
    /// `subject` is the exact unsigned document text (empty signature
    /// slot); `reference_uri` is the ID of the element being signed,
    /// without the leading `#`.
    pub fn signature_xml(&self, subject: &str, reference_uri: &str) -> SamlResult<String> {
        let mut params = Params::new();
        params.insert("REFERENCE_URI".to_string(), reference_uri.to_string());
        params.insert(
            "SUBJECT_DIGEST".to_string(),
            sha1_digest_b64(subject.as_bytes()),
        );
        let signed_info = substitute(templates::SIGNED_INFO, &params)?;

        let signature = self
            .signing_key
            .try_sign(signed_info.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        // The wrapper element declares xmlns:ds, so the embedded copy of
        // SignedInfo drops its own declaration.
        let embedded = signed_info.replacen(" xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\"", "", 1);

        let mut params = Params::new();
        params.insert("SIGNED_INFO".to_string(), embedded);
        params.insert("RSA_SIGNATURE".to_string(), nice64(signature.to_bytes()));
        params.insert("CERTIFICATE".to_string(), self.certificate.clone());
        substitute(templates::SIGNATURE, &params)
    }

    /// Verifying half of the signing key. Test support.
    #[must_use]
    pub fn verifying_key(&self) -> rsa::pkcs1v15::VerifyingKey<Sha1> {
        self.signing_key.verifying_key()
    }
}

/// Extracts the base64 body of a PEM certificate as one line, the form
/// expected inside `ds:X509Certificate`.
fn certificate_body(pem: &str) -> SamlResult<String> {
    let mut body = String::new();
    let mut inside = false;
    for line in pem.lines() {
        let line = line.trim();
        if line.starts_with("-----BEGIN") {
            inside = true;
        } else if line.starts_with("-----END") {
            break;
        } else if inside {
            body.push_str(line);
        }
    }
    if body.is_empty() {
        return Err(SamlError::Configuration(
            "certificate PEM has no body".to_string(),
        ));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyMaterial;

    #[test]
    fn digest_matches_known_value() {
        assert_eq!(sha1_digest_b64(b"this is a test"), "+ia+Gd5r/5P3C8IwhDTkpEC7rQI=");
    }

    #[test]
    fn certificate_body_joins_lines() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\nBBBB\n-----END CERTIFICATE-----\n";
        assert_eq!(certificate_body(pem).unwrap(), "AAAABBBB");
    }

    #[test]
    fn certificate_body_rejects_empty() {
        let result = certificate_body("not a pem at all");
        assert!(matches!(result, Err(SamlError::Configuration(_))));
    }

    #[test]
    fn from_config_requires_key_material() {
        let idp = IdpConfig {
            issuer: "https://idp.example.com".to_string(),
            signing: true,
            autosubmit: true,
            certificate: Some(KeyMaterial::Inline(
                "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----".to_string(),
            )),
            private_key: None,
        };
        assert!(matches!(
            XmlSigner::from_config(&idp),
            Err(SamlError::Configuration(_))
        ));
    }
}
