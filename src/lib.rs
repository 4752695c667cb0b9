//! SAML 2.0 Identity Provider request/response core.
//!
//! Implements the IdP half of the Web Browser SSO POST profile: decoding
//! and validating inbound `AuthnRequest`s, rendering assertions and
//! responses from fixed templates, and signing them with enveloped
//! RSA-SHA1 XML signatures. Per-SP behavioral differences (request
//! encoding, ACS URL policy, subject derivation, assertion shape) are
//! expressed as [`processor::Variant`] descriptors driving one concrete
//! [`Processor`].
//!
//! The crate is transport-agnostic. The host application owns HTTP
//! routing, sessions and authentication; it hands this crate an
//! [`SsoSession`] and an [`AuthenticatedUser`] and gets back the
//! [`SsoResponseParams`] needed to render the POST-binding submit form.
//!
//! # Flow
//!
//! SP-initiated:
//!
//! ```text
//! SAMLRequest + RelayState
//!     -> registry::find_processor    (probe bindings, bind the request)
//!     -> Processor::generate_response (render, sign, encode)
//!     -> SsoResponseParams            (host renders the POST form)
//! ```
//!
//! IdP-initiated deep links resolve a resource to a binding through
//! [`IdpMetadata::config_for_resource`], prime the processor with
//! [`Processor::init_deep_link`], and proceed identically.

pub mod codec;
pub mod config;
pub mod error;
pub mod processor;
pub mod registry;
pub mod render;
pub mod signature;
pub mod types;

pub use config::{
    AuthenticatedUser, FunctionRef, FunctionResolver, IdpConfig, IdpMetadata, KeyMaterial,
    NullResolver, SpConfig, SsoResponseParams, SsoSession,
};
pub use error::{SamlError, SamlResult};
pub use processor::Processor;
pub use registry::{find_processor, get_processor};
pub use signature::XmlSigner;
