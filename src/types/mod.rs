//! Core SAML types.

mod authn_request;
pub mod constants;

pub use authn_request::AuthnRequest;
