//! Bluetooth UUID parsing
//!
//! Harnesses send full 128-bit UUID strings, but 16 and 32-bit SIG aliases
//! ("180f", "0x2a19") are accepted too and widened with the Bluetooth base UUID.

use uuid::Uuid;

use crate::GattError;

/// 00000000-0000-1000-8000-00805f9b34fb
pub const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

pub const fn from_u16(value: u16) -> Uuid {
    from_u32(value as u32)
}

pub const fn from_u32(value: u32) -> Uuid {
    Uuid::from_u128(((value as u128) << 96) | BASE_UUID)
}

pub fn parse_uuid(s: &str) -> Result<Uuid, GattError> {
    let trimmed = s.trim();
    let short = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    match short.len() {
        // from_str_radix alone would take a leading '+'
        4 | 8 if short.bytes().all(|b| b.is_ascii_hexdigit()) => u32::from_str_radix(short, 16)
            .map(from_u32)
            .map_err(|_| GattError::InvalidUuid(s.to_string())),
        _ => Uuid::parse_str(trimmed).map_err(|_| GattError::InvalidUuid(s.to_string())),
    }
}
