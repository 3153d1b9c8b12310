//! Active Directory `objectGUID` formatting
//!
//! The server stores the identifier as 16 raw bytes. The first three fields
//! (4, 2 and 2 bytes) are little-endian, the last two (2 and 6 bytes) are in
//! stored order, which is exactly the layout `Uuid::from_bytes_le` expects.

use uuid::Uuid;

/// Render a raw `objectGUID` value as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
///
/// Returns an empty string for empty input, and for input that is not
/// 16 bytes long; callers treat an empty result as an absent identifier.
pub fn decode_guid(raw: &[u8]) -> String {
    match <[u8; 16]>::try_from(raw) {
        Ok(bytes) => Uuid::from_bytes_le(bytes).hyphenated().to_string(),
        Err(_) => {
            if !raw.is_empty() {
                tracing::debug!("Ignoring objectGUID of unexpected length {}", raw.len());
            }
            String::new()
        }
    }
}
