//! Exercises the full `open -> parse filter -> search -> materialise`
//! pipeline against a small synthesised snapshot, independent of the
//! library's internal unit-test fixtures.

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use adx_query::{parse_filter, AttributeValue, Decoder, QueryEngine};

fn utf16le(s: &str) -> Vec<u8> {
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

fn string_attr(values: &[&str]) -> Vec<u8> {
    let header_len = 4 + 4 * values.len();
    let mut offsets = Vec::with_capacity(values.len());
    let mut payload = Vec::new();
    let mut cursor = header_len;
    for v in values {
        offsets.push(cursor as i32);
        let mut wide = utf16le(v);
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

fn octet_attr(values: &[&[u8]]) -> Vec<u8> {
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

fn integer_attr(values: &[u32]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn object_record(attrs: &[(u32, Vec<u8>)]) -> Vec<u8> {
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

const PROPERTIES: &[(&str, u32, &str)] = &[
    ("cn", 3, "CN=cn"),
    ("objectClass", 12, "CN=objectClass"),
    ("userAccountControl", 7, "CN=userAccountControl"),
    ("objectGUID", 8, "CN=objectGUID"),
    ("distinguishedName", 1, "CN=distinguishedName"),
];

fn schema_bytes() -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&(PROPERTIES.len() as u32).to_le_bytes());
    for (name, ads_type, dn) in PROPERTIES {
        let name_bytes = utf16le(name);
        s.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        s.extend_from_slice(&name_bytes);
        s.extend_from_slice(&0u32.to_le_bytes());
        s.extend_from_slice(&ads_type.to_le_bytes());
        let dn_bytes = utf16le(dn);
        s.extend_from_slice(&(dn_bytes.len() as u32).to_le_bytes());
        s.extend_from_slice(&dn_bytes);
        s.extend_from_slice(&[0u8; 16]);
        s.extend_from_slice(&[0u8; 16]);
        s.extend_from_slice(&[0u8; 4]);
    }
    s
}

fn header_bytes(num_objects: u32, mapping_offset: u64) -> Vec<u8> {
    let mut h = Vec::with_capacity(1086);
    let mut signature = b"MS-SNAP\0\0\0".to_vec();
    signature.truncate(10);
    h.extend_from_slice(&signature);
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&133_497_864_000_000_000u64.to_le_bytes()); // 2024-01-15T10:00:00Z

    let mut desc_buf = vec![0u8; 520];
    write_wide_fixed(&mut desc_buf, "end-to-end fixture");
    h.extend_from_slice(&desc_buf);

    let mut server_buf = vec![0u8; 520];
    write_wide_fixed(&mut server_buf, "dc01.x.test");
    h.extend_from_slice(&server_buf);

    h.extend_from_slice(&num_objects.to_le_bytes());
    h.extend_from_slice(&(PROPERTIES.len() as u32).to_le_bytes());

    let low = (mapping_offset & 0xFFFF_FFFF) as u32;
    let high = (mapping_offset >> 32) as u32;
    h.extend_from_slice(&low.to_le_bytes());
    h.extend_from_slice(&high.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes());

    assert_eq!(h.len(), 1086);
    h
}

fn make_user_record(cn: &str, uac: u32) -> Vec<u8> {
    let guid = [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD,
        0xEF,
    ];
    object_record(&[
        (0, string_attr(&[cn])),
        (1, string_attr(&["top", "person", "user"])),
        (2, integer_attr(&[uac])),
        (3, octet_attr(&[&guid])),
        (4, string_attr(&[&format!("CN={cn},OU=People,DC=x")])),
    ])
}

fn write_snapshot(records: &[Vec<u8>]) -> PathBuf {
    let total: usize = records.iter().map(|r| r.len()).sum();
    let mapping_offset = 1086u64 + total as u64;
    let header = header_bytes(records.len() as u32, mapping_offset);
    let schema = schema_bytes();

    let mut bytes = Vec::with_capacity(header.len() + total + schema.len());
    bytes.extend_from_slice(&header);
    for r in records {
        bytes.extend_from_slice(r);
    }
    bytes.extend_from_slice(&schema);

    let path = std::env::temp_dir().join(format!(
        "adx-query-e2e-{}-{}.dat",
        std::process::id(),
        bytes.len()
    ));
    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    path
}

#[test]
fn single_match_on_object_class() {
    let path = write_snapshot(&[make_user_record("alice", 514)]);
    let decoder = Decoder::open(&path).unwrap();

    let filter = parse_filter("(objectClass=user)").unwrap();
    let engine = QueryEngine::new(&decoder, filter, false, None, None);
    let results = engine.search();

    assert_eq!(results.len(), 1);
    let record = engine.materialise(&results[0]);
    let cn = record.iter().find(|(name, _)| name == "cn").unwrap();
    assert_eq!(format!("{}", serde_json::to_value(&cn.1).unwrap()), "\"alice\"");

    std::fs::remove_file(&path).ok();
}

#[test]
fn conjunction_with_substring_narrows_and_widens_correctly() {
    let path = write_snapshot(&[make_user_record("alice", 514)]);
    let decoder = Decoder::open(&path).unwrap();

    let matches = parse_filter("(&(objectClass=user)(cn=al*))").unwrap();
    let engine = QueryEngine::new(&decoder, matches, false, None, None);
    assert_eq!(engine.search().len(), 1);

    let no_match = parse_filter("(&(objectClass=user)(cn=al*z))").unwrap();
    let engine = QueryEngine::new(&decoder, no_match, false, None, None);
    assert_eq!(engine.search().len(), 0);

    std::fs::remove_file(&path).ok();
}

#[test]
fn negation_excludes_only_the_named_value() {
    let path = write_snapshot(&[make_user_record("alice", 514)]);
    let decoder = Decoder::open(&path).unwrap();

    let filter = parse_filter("(!(cn=bob))").unwrap();
    let engine = QueryEngine::new(&decoder, filter, false, None, None);
    assert_eq!(engine.search().len(), 1);

    std::fs::remove_file(&path).ok();
}

#[test]
fn presence_matches_every_entry_regardless_of_value() {
    let path = write_snapshot(&[
        make_user_record("alice", 514),
        make_user_record("bob", 512),
        make_user_record("carol", 66048),
    ]);
    let decoder = Decoder::open(&path).unwrap();

    let filter = parse_filter("(cn=*)").unwrap();
    let engine = QueryEngine::new(&decoder, filter, false, None, None);
    assert_eq!(engine.search().len(), 3);

    std::fs::remove_file(&path).ok();
}

#[test]
fn integer_equality_accepts_a_hex_needle_equivalent_to_decimal() {
    let path = write_snapshot(&[make_user_record("alice", 514)]);
    let decoder = Decoder::open(&path).unwrap();

    for filter_text in ["(userAccountControl=514)", "(userAccountControl=0x202)"] {
        let filter = parse_filter(filter_text).unwrap();
        let engine = QueryEngine::new(&decoder, filter, false, None, None);
        assert_eq!(engine.search().len(), 1, "filter {filter_text} should match");
    }

    std::fs::remove_file(&path).ok();
}

#[test]
fn projection_renders_canonical_guid_string() {
    let path = write_snapshot(&[make_user_record("alice", 514)]);
    let decoder = Decoder::open(&path).unwrap();

    let filter = parse_filter("(cn=alice)").unwrap();
    let attrs = vec!["cn".to_string(), "objectGUID".to_string()];
    let engine = QueryEngine::new(&decoder, filter, false, Some(&attrs), None);
    let results = engine.search();
    let record = engine.materialise(&results[0]);

    assert_eq!(record[0].0, "cn");
    assert_eq!(record[1].0, "objectGUID");
    match &record[1].1 .0[0] {
        AttributeValue::Str(s) => assert_eq!(s, "67452301-ab89-efcd-0123-456789abcdef"),
        other => panic!("expected a GUID string, got {other:?}"),
    }

    std::fs::remove_file(&path).ok();
}
