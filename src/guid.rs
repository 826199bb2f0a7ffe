//! Canonical GUID text rendering from a little-endian 16-byte layout.
//!
//! Windows GUIDs store their first three fields little-endian and the last
//! two big-endian; the canonical 8-4-4-4-12 text form always reads as if
//! big-endian, so the first three fields get byte-swapped on the way out.

pub fn format_guid_le(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    Some(format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[3], bytes[2], bytes[1], bytes[0],
        bytes[5], bytes[4],
        bytes[7], bytes[6],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_canonical_form() {
        let bytes: Vec<u8> = vec![
            0x67, 0x45, 0x23, 0x01, 0xAB, 0x89, 0xEF, 0xCD, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
            0xCD, 0xEF,
        ];
        assert_eq!(
            format_guid_le(&bytes).unwrap(),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(format_guid_le(&[0u8; 10]).is_none());
    }
}
