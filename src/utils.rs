//! Utility functions for the nrf-monitor-ble crate.

/// Format raw bytes as an uppercase hexadecimal string, e.g. `"0A 1B FF"`.
///
/// # Example
///
/// ```
/// use nrf_monitor_ble::hex_string;
///
/// assert_eq!(hex_string(&[0x0A, 0x1B, 0xFF]), "0A 1B FF");
/// ```
pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a characteristic value for display.
///
/// Clean printable UTF-8 (trailing NULs stripped) is returned as text;
/// anything else falls back to the hexadecimal representation.
pub fn decode_value(data: &[u8]) -> String {
    let trimmed: &[u8] = match data.iter().rposition(|&b| b != 0) {
        Some(last) => &data[..=last],
        None => &[],
    };

    match std::str::from_utf8(trimmed) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => hex_string(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[]), "");
        assert_eq!(hex_string(&[0x00]), "00");
        assert_eq!(hex_string(&[0xDE, 0xAD, 0xBE, 0xEF]), "DE AD BE EF");
    }

    #[test]
    fn test_decode_value_utf8() {
        assert_eq!(decode_value(b"Acme"), "Acme");
        assert_eq!(decode_value(b"nRF52833 DK"), "nRF52833 DK");
    }

    #[test]
    fn test_decode_value_strips_trailing_nuls() {
        assert_eq!(decode_value(b"v1.0.0\0\0"), "v1.0.0");
    }

    #[test]
    fn test_decode_value_falls_back_to_hex() {
        // Invalid UTF-8
        assert_eq!(decode_value(&[0xFF, 0xFE]), "FF FE");
        // Valid UTF-8 but contains control characters
        assert_eq!(decode_value(&[0x01, 0x41]), "01 41");
        // All-NUL payloads have no text content
        assert_eq!(decode_value(&[0x00, 0x00]), "00 00");
    }

    #[test]
    fn test_decode_value_never_panics() {
        use proptest::prelude::*;

        proptest!(|(data: Vec<u8>)| {
            let _ = decode_value(&data);
        });
    }
}
