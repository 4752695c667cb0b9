//! Processor construction and dispatch.
//!
//! SP bindings name their processor by a dotted path
//! (`saml2idp.<variant>.Processor`), kept for configuration compatibility
//! with existing deployments. [`get_processor`] resolves one binding;
//! [`find_processor`] probes every binding in stable order until one
//! accepts the inbound request.

use std::sync::Arc;

use tracing::debug;

use crate::config::{FunctionResolver, IdpConfig, IdpMetadata, SpConfig, SsoSession};
use crate::error::{SamlError, SamlResult};
use crate::processor::{variant, Processor, Variant};

fn resolve_variant(path: &str) -> SamlResult<&'static Variant> {
    let mut parts = path.split('.');
    if let (Some("saml2idp"), Some(name), Some("Processor"), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    {
        return variant::by_name(name).ok_or_else(|| {
            SamlError::Configuration(format!("unknown processor variant {name:?} in {path:?}"))
        });
    }
    Err(SamlError::Configuration(format!(
        "processor path {path:?} must have the form saml2idp.<variant>.Processor"
    )))
}

/// Builds the processor an SP binding names through its dotted path.
///
/// An unknown or malformed path is [`SamlError::Configuration`].
pub fn get_processor(
    sp_name: &str,
    sp: &SpConfig,
    idp: &IdpConfig,
    resolver: Arc<dyn FunctionResolver>,
) -> SamlResult<Processor> {
    let variant = resolve_variant(&sp.processor)?;
    Ok(Processor::new(
        variant,
        sp_name,
        sp.clone(),
        idp.clone(),
        resolver,
    ))
}

/// Finds the first configured binding that accepts the session's request.
///
/// Bindings are probed in the metadata's stable map order. A binding's
/// refusal ([`SamlError::CannotHandleAssertion`]) is logged and the next
/// binding is tried; configuration errors abort dispatch immediately.
pub fn find_processor(
    metadata: &IdpMetadata,
    session: &SsoSession,
    resolver: Arc<dyn FunctionResolver>,
) -> SamlResult<Processor> {
    for (name, sp) in &metadata.service_providers {
        let mut processor = get_processor(name, sp, &metadata.idp, resolver.clone())?;
        match processor.can_handle(session) {
            Ok(()) => return Ok(processor),
            Err(SamlError::CannotHandleAssertion(reason)) => {
                debug!(sp = %name, %reason, "binding refused request");
            }
            Err(other) => return Err(other),
        }
    }
    Err(SamlError::CannotHandleAssertion(
        "no configured binding accepts this request".to_string(),
    ))
}
