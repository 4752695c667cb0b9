//! Encoding helpers for SAML payloads.
//!
//! Base64 and raw-deflate transforms for the wire encodings used by the
//! POST and Redirect bindings, plus the Active Directory ObjectGUID to
//! ImmutableID conversion used for directory-derived persistent NameIDs.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use uuid::Uuid;

use crate::error::{SamlError, SamlResult};

/// Decodes a base64 string and decompresses the raw deflate stream inside.
///
/// The stream carries no zlib header or trailer, as mandated by the SAML
/// HTTP-Redirect binding.
pub fn decode_base64_and_inflate(b64: &str) -> SamlResult<Vec<u8>> {
    let compressed = STANDARD.decode(b64)?;
    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    Ok(decompressed)
}

/// Compresses data as a raw deflate stream and base64-encodes it.
///
/// Round-trips with [`decode_base64_and_inflate`].
pub fn deflate_and_base64_encode(data: &[u8]) -> SamlResult<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))?;
    Ok(STANDARD.encode(compressed))
}

/// Base64-encodes data as a single line with no embedded breaks.
///
/// Safe to splice into XML attribute or element content.
#[must_use]
pub fn nice64(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data.as_ref())
}

/// Converts an AD ObjectGUID to its Office 365 ImmutableID token.
///
/// Accepts the canonical textual GUID form. The binary layout is the
/// standard GUID mixed-endian byte order, not a straight big-endian dump.
///
/// ```
/// # use saml2idp::codec::convert_guid_to_immutable_id;
/// let id = convert_guid_to_immutable_id("1f478d69-8585-4bee-89f6-a772287e6449").unwrap();
/// assert_eq!(id, "aY1HH4WF7kuJ9qdyKH5kSQ==");
/// ```
pub fn convert_guid_to_immutable_id(object_guid: &str) -> SamlResult<String> {
    let guid = Uuid::parse_str(object_guid)
        .map_err(|e| SamlError::InvalidArgument(format!("not a well-formed GUID: {e}")))?;
    Ok(immutable_id_from_uuid(&guid))
}

/// Converts an already-parsed GUID to its ImmutableID token.
#[must_use]
pub fn immutable_id_from_uuid(guid: &Uuid) -> String {
    STANDARD.encode(guid.to_bytes_le())
}
