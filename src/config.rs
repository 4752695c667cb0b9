//! IdP and service-provider configuration.
//!
//! All configuration is passed in explicitly by the host application;
//! nothing here reads process-global state. Subject and attribute
//! derivation hooks are plain function values: supplied inline as
//! closures, or by name and resolved through a [`FunctionResolver`] the
//! host provides.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// The authenticated principal a response is issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Primary email address, used as the default NameID.
    pub email: String,

    /// Session identifier from the host's session layer, when available.
    pub session_index: Option<String>,
}

/// State captured between receiving an AuthnRequest and issuing the
/// response, typically held in the host's session store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsoSession {
    /// The raw `SAMLRequest` form value, still encoded. Empty for
    /// IdP-initiated (deep link) flows.
    pub saml_request: String,

    /// The `RelayState` form value, or the resolved deep-link target.
    pub relay_state: Option<String>,
}

/// Everything the host needs to render the POST-binding submit form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoResponseParams {
    /// Where the form posts to.
    pub acs_url: String,

    /// The base64-encoded signed response document.
    pub saml_response: String,

    /// Relay state to echo back, when one was supplied.
    pub relay_state: Option<String>,

    /// Whether the form should submit itself without user interaction.
    pub autosubmit: bool,
}

/// PEM key material, either embedded in configuration or on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMaterial {
    /// PEM text held directly in the configuration.
    Inline(String),

    /// Path to a PEM file, read at signer construction.
    File(PathBuf),
}

impl KeyMaterial {
    /// Returns the PEM text, reading the file form from disk.
    pub fn pem(&self) -> SamlResult<String> {
        match self {
            Self::Inline(pem) => Ok(pem.clone()),
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                SamlError::Configuration(format!("cannot read {}: {e}", path.display()))
            }),
        }
    }
}

/// Derives the NameID value for a user.
pub type SubjectFn = Arc<dyn Fn(&AuthenticatedUser) -> SamlResult<String> + Send + Sync>;

/// Derives the attribute statement values for a user.
pub type AttributeFn =
    Arc<dyn Fn(&AuthenticatedUser) -> SamlResult<BTreeMap<String, String>> + Send + Sync>;

/// A configured derivation function: a closure, or a name resolved
/// through the host's [`FunctionResolver`].
#[derive(Clone)]
pub enum FunctionRef<F> {
    /// A function value supplied directly.
    Inline(F),

    /// A symbolic name looked up at processing time.
    Named(String),
}

impl<F> fmt::Debug for FunctionRef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("FunctionRef::Inline(..)"),
            Self::Named(name) => write!(f, "FunctionRef::Named({name:?})"),
        }
    }
}

/// Resolves named derivation functions.
///
/// Hosts register their functions behind whatever naming scheme they use;
/// an unknown name is a configuration error surfaced by the processor.
pub trait FunctionResolver: Send + Sync {
    /// Looks up a named subject function.
    fn subject_function(&self, name: &str) -> Option<SubjectFn>;

    /// Looks up a named attribute function.
    fn attribute_function(&self, name: &str) -> Option<AttributeFn>;
}

/// Resolver that knows no names. The default when a host configures only
/// inline functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl FunctionResolver for NullResolver {
    fn subject_function(&self, _name: &str) -> Option<SubjectFn> {
        None
    }

    fn attribute_function(&self, _name: &str) -> Option<AttributeFn> {
        None
    }
}

/// Identity-provider-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpConfig {
    /// Entity ID placed in the Issuer element of every document.
    pub issuer: String,

    /// Whether responses and assertions are signed at all.
    pub signing: bool,

    /// Whether the POST form auto-submits.
    pub autosubmit: bool,

    /// X.509 certificate, required when `signing` is set.
    pub certificate: Option<KeyMaterial>,

    /// RSA private key, required when `signing` is set.
    pub private_key: Option<KeyMaterial>,
}

/// Per-service-provider settings.
#[derive(Clone, Default)]
pub struct SpConfig {
    /// Dotted processor path selecting the variant, for example
    /// `"saml2idp.google_apps.Processor"`.
    pub processor: String,

    /// Configured ACS URL, for SPs addressed by deep link.
    pub acs_url: Option<String>,

    /// Deep-link resource patterns, keyed by resource name. A `%s` in
    /// the pattern is replaced by the link target.
    pub links: BTreeMap<String, String>,

    /// Override for NameID derivation.
    pub subject_function: Option<FunctionRef<SubjectFn>>,

    /// Override for attribute statement derivation.
    pub attribute_function: Option<FunctionRef<AttributeFn>>,
}

impl fmt::Debug for SpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpConfig")
            .field("processor", &self.processor)
            .field("acs_url", &self.acs_url)
            .field("links", &self.links)
            .field("subject_function", &self.subject_function)
            .field("attribute_function", &self.attribute_function)
            .finish()
    }
}

/// Full IdP metadata: provider-wide settings plus the configured SPs.
///
/// SPs are held in a `BTreeMap` so dispatch probes them in a stable,
/// predictable order.
#[derive(Debug, Clone)]
pub struct IdpMetadata {
    pub idp: IdpConfig,
    pub service_providers: BTreeMap<String, SpConfig>,
}

/// Expands a deep-link pattern by substituting the target for `%s`.
///
/// A pattern without a `%s` is returned unchanged, which makes static
/// deep links expressible too.
#[must_use]
pub fn deep_link_url(pattern: &str, target: &str) -> String {
    pattern.replacen("%s", target, 1)
}

impl IdpMetadata {
    /// Finds the SP configured with the given ACS URL.
    #[must_use]
    pub fn config_for_acs(&self, acs_url: &str) -> Option<(&str, &SpConfig)> {
        self.service_providers
            .iter()
            .find(|(_, sp)| sp.acs_url.as_deref() == Some(acs_url))
            .map(|(name, sp)| (name.as_str(), sp))
    }

    /// Finds the SP that serves the given deep-link resource, together
    /// with the resource's URL pattern.
    #[must_use]
    pub fn config_for_resource(&self, resource: &str) -> Option<(&str, &SpConfig, &str)> {
        self.service_providers.iter().find_map(|(name, sp)| {
            sp.links
                .get(resource)
                .map(|pattern| (name.as_str(), sp, pattern.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> IdpMetadata {
        let mut links = BTreeMap::new();
        links.insert("deeplink".to_string(), "http://sp.example.com/dl/%s".to_string());
        let mut service_providers = BTreeMap::new();
        service_providers.insert(
            "sp1".to_string(),
            SpConfig {
                processor: "saml2idp.generic.Processor".to_string(),
                acs_url: Some("https://sp.example.com/acs".to_string()),
                links,
                ..SpConfig::default()
            },
        );
        IdpMetadata {
            idp: IdpConfig {
                issuer: "https://idp.example.com".to_string(),
                signing: false,
                autosubmit: true,
                certificate: None,
                private_key: None,
            },
            service_providers,
        }
    }

    #[test]
    fn finds_sp_by_acs_url() {
        let meta = metadata();
        let (name, _) = meta.config_for_acs("https://sp.example.com/acs").unwrap();
        assert_eq!(name, "sp1");
        assert!(meta.config_for_acs("https://other.example.com/acs").is_none());
    }

    #[test]
    fn finds_sp_by_resource() {
        let meta = metadata();
        let (name, _, pattern) = meta.config_for_resource("deeplink").unwrap();
        assert_eq!(name, "sp1");
        assert_eq!(pattern, "http://sp.example.com/dl/%s");
        assert!(meta.config_for_resource("unknown").is_none());
    }

    #[test]
    fn deep_link_substitutes_target() {
        assert_eq!(
            deep_link_url("http://host/sp/%s/", "test"),
            "http://host/sp/test/"
        );
        assert_eq!(deep_link_url("http://host/fixed", "test"), "http://host/fixed");
    }

    #[test]
    fn inline_key_material_returns_pem() {
        let key = KeyMaterial::Inline("-----BEGIN X-----".to_string());
        assert_eq!(key.pem().unwrap(), "-----BEGIN X-----");
    }

    #[test]
    fn missing_key_file_is_configuration_error() {
        let key = KeyMaterial::File(PathBuf::from("/nonexistent/key.pem"));
        assert!(matches!(key.pem(), Err(SamlError::Configuration(_))));
    }
}
