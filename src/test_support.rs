//! Fixture builder for synthesising a minimal, well-formed snapshot file
//! in memory, so the decoder, entry, filter, and query modules can be
//! exercised without a real ADExplorer capture. Test-only.

/// 2024-01-15T10:00:00Z expressed as a Windows FILETIME.
pub const FILETIME_2024_01_15: u64 = 133_497_864_000_000_000;

fn utf16le_bytes(s: &str) -> Vec<u8> {
    let mut v = Vec::new();
    for unit in s.encode_utf16() {
        v.extend_from_slice(&unit.to_le_bytes());
    }
    v
}

fn write_wide_fixed(buf: &mut [u8], s: &str) {
    let mut pos = 0;
    for unit in s.encode_utf16() {
        let b = unit.to_le_bytes();
        buf[pos] = b[0];
        buf[pos + 1] = b[1];
        pos += 2;
    }
}

pub fn build_header(
    num_objects: u32,
    num_attributes: u32,
    mapping_offset: u64,
    filetime: u64,
    description: &str,
    server: &str,
) -> Vec<u8> {
    let mut h = Vec::with_capacity(1086);
    let mut signature = b"MS-SNAP\0\0\0".to_vec();
    signature.truncate(10);
    h.extend_from_slice(&signature);
    h.extend_from_slice(&0u32.to_le_bytes()); // marker, ignored
    h.extend_from_slice(&filetime.to_le_bytes());

    let mut desc_buf = vec![0u8; 520];
    write_wide_fixed(&mut desc_buf, description);
    h.extend_from_slice(&desc_buf);

    let mut server_buf = vec![0u8; 520];
    write_wide_fixed(&mut server_buf, server);
    h.extend_from_slice(&server_buf);

    h.extend_from_slice(&num_objects.to_le_bytes());
    h.extend_from_slice(&num_attributes.to_le_bytes());

    let low = (mapping_offset & 0xFFFF_FFFF) as u32;
    let high = (mapping_offset >> 32) as u32;
    h.extend_from_slice(&low.to_le_bytes());
    h.extend_from_slice(&high.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // mapping end, ignored
    h.extend_from_slice(&0u32.to_le_bytes()); // reserved, ignored

    assert_eq!(h.len(), 1086);
    h
}

pub fn build_schema(properties: &[(&str, u32, &str)]) -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&(properties.len() as u32).to_le_bytes());
    for (name, ads_type, dn) in properties {
        let name_bytes = utf16le_bytes(name);
        s.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        s.extend_from_slice(&name_bytes);
        s.extend_from_slice(&0u32.to_le_bytes()); // reserved
        s.extend_from_slice(&ads_type.to_le_bytes());
        let dn_bytes = utf16le_bytes(dn);
        s.extend_from_slice(&(dn_bytes.len() as u32).to_le_bytes());
        s.extend_from_slice(&dn_bytes);
        s.extend_from_slice(&[0u8; 16]); // schema GUID
        s.extend_from_slice(&[0u8; 16]); // attribute-security GUID
        s.extend_from_slice(&[0u8; 4]); // reserved
    }
    s
}

/// Offset-prefixed multi-valued wide string attribute (DN_STRING,
/// CASE_EXACT_STRING, CASE_IGNORE_STRING, PRINTABLE_STRING, NUMERIC_STRING,
/// OBJECT_CLASS).
pub fn build_string_attr(values: &[&str]) -> Vec<u8> {
    let header_len = 4 + 4 * values.len();
    let mut offsets = Vec::with_capacity(values.len());
    let mut payload = Vec::new();
    let mut cursor = header_len;
    for v in values {
        offsets.push(cursor as i32);
        let mut wide = utf16le_bytes(v);
        wide.extend_from_slice(&[0, 0]);
        cursor += wide.len();
        payload.extend_from_slice(&wide);
    }

    let mut blob = Vec::with_capacity(cursor);
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for off in offsets {
        blob.extend_from_slice(&off.to_le_bytes());
    }
    blob.extend_from_slice(&payload);
    blob
}

/// OCTET_STRING: lengths array up front, then concatenated data.
pub fn build_octet_string_attr(values: &[&[u8]]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&(v.len() as u32).to_le_bytes());
    }
    for v in values {
        blob.extend_from_slice(v);
    }
    blob
}

/// NT_SECURITY_DESCRIPTOR and any unrecognised type code: length and data
/// interleaved per value.
pub fn build_opaque_attr(values: &[&[u8]]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&(v.len() as u32).to_le_bytes());
        blob.extend_from_slice(v);
    }
    blob
}

pub fn build_integer_attr(values: &[u32]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

pub fn build_large_integer_attr(values: &[i64]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

pub fn build_boolean_attr(values: &[bool]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&(*v as u32).to_le_bytes());
    }
    blob
}

/// UTC_TIME: `(year, month, day_of_week, day, hour, minute, second, millis)`.
pub fn build_utc_time_attr(values: &[(u16, u16, u16, u16, u16, u16, u16, u16)]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for &(y, mo, dow, d, h, mi, s, ms) in values {
        for field in [y, mo, dow, d, h, mi, s, ms] {
            blob.extend_from_slice(&field.to_le_bytes());
        }
    }
    blob
}

pub fn build_object_record(attrs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let header_len = 4 + 4 + 8 * attrs.len();
    let mut cursor = header_len;
    let mut pairs = Vec::with_capacity(attrs.len());
    let mut payload = Vec::new();
    for (idx, blob) in attrs {
        pairs.push((*idx, cursor as i32));
        cursor += blob.len();
        payload.extend_from_slice(blob);
    }

    let mut record = Vec::with_capacity(cursor);
    record.extend_from_slice(&(cursor as u32).to_le_bytes());
    record.extend_from_slice(&(attrs.len() as u32).to_le_bytes());
    for (idx, rel) in pairs {
        record.extend_from_slice(&idx.to_le_bytes());
        record.extend_from_slice(&rel.to_le_bytes());
    }
    record.extend_from_slice(&payload);
    record
}

pub fn sample_sid_bytes() -> Vec<u8> {
    let mut b = vec![1u8, 5, 0, 0, 0, 0, 0, 5];
    for sub in [21u32, 1_004_336_348, 1_177_238_915, 682_003_330, 512] {
        b.extend_from_slice(&sub.to_le_bytes());
    }
    b
}

pub fn sample_guid_bytes() -> [u8; 16] {
    [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD,
        0xEF,
    ]
}

/// The schema property list used by [`sample_snapshot_bytes`], in index order.
pub const SAMPLE_PROPERTIES: &[(&str, u32, &str)] = &[
    ("cn", 3, "CN=cn"),
    ("objectClass", 12, "CN=objectClass"),
    ("userAccountControl", 7, "CN=userAccountControl"),
    ("objectGUID", 8, "CN=objectGUID"),
    ("objectSid", 8, "CN=objectSid"),
    ("whenCreated", 9, "CN=whenCreated"),
    ("isCriticalSystemObject", 6, "CN=isCriticalSystemObject"),
    ("nTSecurityDescriptor", 25, "CN=nTSecurityDescriptor"),
    ("distinguishedName", 1, "CN=distinguishedName"),
];

/// A single-entry snapshot: one `user` object, `CN=alice,OU=People,DC=x`,
/// matching the end-to-end scenarios described in the design notes.
pub fn sample_snapshot_bytes() -> Vec<u8> {
    let alice_record = build_object_record(&[
        (0, build_string_attr(&["alice"])),
        (1, build_string_attr(&["top", "person", "user"])),
        (2, build_integer_attr(&[514])),
        (3, build_octet_string_attr(&[&sample_guid_bytes()])),
        (4, build_octet_string_attr(&[&sample_sid_bytes()])),
        (5, build_utc_time_attr(&[(2024, 1, 0, 15, 10, 0, 0, 0)])),
        (6, build_boolean_attr(&[false])),
        (7, build_opaque_attr(&[&[0xDE, 0xAD, 0xBE, 0xEF]])),
        (8, build_string_attr(&["CN=alice,OU=People,DC=x"])),
    ]);

    let mapping_offset = 1086u64 + alice_record.len() as u64;
    let header = build_header(
        1,
        SAMPLE_PROPERTIES.len() as u32,
        mapping_offset,
        FILETIME_2024_01_15,
        "test snapshot",
        "dc01.x.test",
    );
    let schema = build_schema(SAMPLE_PROPERTIES);

    let mut out = Vec::with_capacity(header.len() + alice_record.len() + schema.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&alice_record);
    out.extend_from_slice(&schema);
    out
}

/// A three-entry snapshot (alice, bob, carol), all `user` objects with a
/// `cn`, used to exercise presence/substring matching across multiple
/// records.
pub fn sample_multi_entry_snapshot_bytes() -> Vec<u8> {
    let make_record = |name: &str, uac: u32| {
        build_object_record(&[
            (0, build_string_attr(&[name])),
            (1, build_string_attr(&["top", "person", "user"])),
            (2, build_integer_attr(&[uac])),
            (3, build_octet_string_attr(&[&sample_guid_bytes()])),
            (4, build_octet_string_attr(&[&sample_sid_bytes()])),
            (5, build_utc_time_attr(&[(2024, 1, 0, 15, 10, 0, 0, 0)])),
            (6, build_boolean_attr(&[false])),
            (7, build_opaque_attr(&[&[0xDE, 0xAD, 0xBE, 0xEF]])),
            (8, build_string_attr(&[&format!("CN={name},OU=People,DC=x")])),
        ])
    };

    let alice = make_record("alice", 514);
    let bob = make_record("bob", 512);
    let carol = make_record("carol", 66048);

    let total_object_bytes = alice.len() + bob.len() + carol.len();
    let mapping_offset = 1086u64 + total_object_bytes as u64;
    let header = build_header(
        3,
        SAMPLE_PROPERTIES.len() as u32,
        mapping_offset,
        FILETIME_2024_01_15,
        "test snapshot",
        "dc01.x.test",
    );
    let schema = build_schema(SAMPLE_PROPERTIES);

    let mut out = Vec::with_capacity(header.len() + total_object_bytes + schema.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&alice);
    out.extend_from_slice(&bob);
    out.extend_from_slice(&carol);
    out.extend_from_slice(&schema);
    out
}
