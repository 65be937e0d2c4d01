//! CRC32C integrity tags for payloads crossing the network boundary.
//!
//! Cloud KMS carries these as int64 values in JSON (rendered as decimal
//! strings). They detect transport corruption only; they are not a MAC.

/// CRC-32 (Castagnoli) of `data`.
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// The checksum widened to the int64 representation used on the wire.
pub fn crc32c_i64(data: &[u8]) -> i64 {
    i64::from(crc32c(data))
}

/// Recompute the checksum of `data` and compare it with the value the peer
/// claimed for it.
pub fn verify_crc32c(data: &[u8], claimed: i64) -> bool {
    crc32c_i64(data) == claimed
}
