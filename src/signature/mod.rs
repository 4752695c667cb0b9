//! Enveloped XML signatures.
//!
//! Produces the `ds:Signature` element carried inside signed assertions
//! and responses, using the RSA-SHA1 / SHA1 / exclusive-C14N algorithm
//! suite. SHA-1 is obsolete as a general-purpose hash but remains what
//! the supported relying parties accept for this profile.

mod signer;

pub use signer::{sha1_digest_b64, XmlSigner};
