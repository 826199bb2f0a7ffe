//! Windows SID textual rendering (`S-<rev>-<authority>[-<subauth>]*`).

/// Converts a binary SID into its standard textual form. Inputs shorter than
/// 8 bytes (not enough for revision + sub-authority count + authority) fall
/// back to a lowercase hex dump.
pub fn format_sid(bytes: &[u8]) -> String {
    if bytes.len() < 8 {
        return hex(bytes);
    }

    let revision = bytes[0];
    let sub_authority_count = bytes[1] as usize;
    let mut authority_bytes = [0u8; 8];
    authority_bytes[2..8].copy_from_slice(&bytes[2..8]);
    let identifier_authority = u64::from_be_bytes(authority_bytes);

    let mut text = format!("S-{revision}-{identifier_authority}");
    for i in 0..sub_authority_count {
        let start = 8 + i * 4;
        let end = start + 4;
        if end > bytes.len() {
            break;
        }
        let sub_authority = u32::from_le_bytes(bytes[start..end].try_into().unwrap());
        text.push_str(&format!("-{sub_authority}"));
    }
    text
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
