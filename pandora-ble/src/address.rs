use btleplug::api::BDAddr;

use crate::BleError;

/// Parse a connection cookie or SDP address into a device address.
///
/// Accepts the six raw address bytes (most significant first) or the text
/// form `AA:BB:CC:DD:EE:FF`.
pub fn parse_address(bytes: &[u8]) -> Result<BDAddr, BleError> {
    if let Ok(raw) = <[u8; 6]>::try_from(bytes) {
        return Ok(BDAddr::from(raw));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| BleError::InvalidAddress(data_encoding::HEXLOWER.encode(bytes)))?;
    text.trim()
        .parse::<BDAddr>()
        .map_err(|_| BleError::InvalidAddress(text.to_string()))
}
