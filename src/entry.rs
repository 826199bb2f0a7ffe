//! Lazy per-object entry view: attribute lookup, typed value decoding, and
//! the two per-entry caches (decoded and raw).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::error::{AdxError, Result};
use crate::guid::format_guid_le;
use crate::hex::to_hex;
use crate::sid::format_sid;
use crate::snapshot::{AdsType, Decoder, PropertyDefinition};

/// A single decoded attribute value. Multi-valued attributes decode to a
/// `Vec<AttributeValue>`; strings that are GUIDs, SIDs, or opaque blobs are
/// already rendered to their display form unless the caller asked for raw
/// bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Textual representation used by substring matching and by equality's
    /// string fallback; never fails, unlike a `TryInto<&str>`.
    pub fn to_display_string(&self) -> String {
        match self {
            AttributeValue::Str(s) => s.clone(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Bytes(b) => to_hex(b),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AttributeValue::Str(s) => serializer.serialize_str(s),
            AttributeValue::Int(i) => serializer.serialize_i64(*i),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Bytes(b) => serializer.serialize_str(&to_hex(b)),
        }
    }
}

/// A projected attribute's value list, with the collapse policy from
/// §4.2 baked into its `Serialize` impl: empty list, singleton scalar, or
/// the list as-is.
#[derive(Debug, Clone)]
pub struct AttributeValues(pub Vec<AttributeValue>);

impl Serialize for AttributeValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [] => serializer.collect_seq(std::iter::empty::<AttributeValue>()),
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }
}

/// A lazy view over one object record. Holds a non-owning reference back
/// to the decoder for schema and byte access; must not outlive it.
pub struct SnapshotEntry<'a> {
    decoder: &'a Decoder,
    offset: u64,
    size: u32,
    mapping: Vec<(u32, i32)>,
    cache: RefCell<HashMap<u32, Rc<Vec<AttributeValue>>>>,
    raw_cache: RefCell<HashMap<u32, Rc<Vec<AttributeValue>>>>,
}

impl<'a> SnapshotEntry<'a> {
    pub(crate) fn new(decoder: &'a Decoder, offset: u64) -> Result<Self> {
        let source = decoder.source();
        let size = source.read_u32_at(offset)?;
        let pair_count = source.read_u32_at(offset + 4)?;

        let mut mapping = Vec::with_capacity(pair_count as usize);
        let mut cursor = offset + 8;
        for _ in 0..pair_count {
            let property_index = source.read_u32_at(cursor)?;
            let relative_offset = source.read_i32_at(cursor + 4)?;
            mapping.push((property_index, relative_offset));
            cursor += 8;
        }

        Ok(SnapshotEntry {
            decoder,
            offset,
            size,
            mapping,
            cache: RefCell::new(HashMap::new()),
            raw_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mapping(&self) -> &[(u32, i32)] {
        &self.mapping
    }

    fn relative_offset_for(&self, property_index: u32) -> Option<i32> {
        self.mapping
            .iter()
            .find(|(idx, _)| *idx == property_index)
            .map(|(_, rel)| *rel)
    }

    /// Resolves `name` via the decoder's schema and returns its decoded
    /// value list, caching the result for the entry's lifetime. Returns
    /// `None` when the name doesn't resolve to a schema property, when this
    /// entry carries no pair for that property (§4.2's `AttributeAbsent`,
    /// which the evaluator treats as false rather than an error), or when
    /// the payload fails to decode (isolates a single corrupt attribute
    /// rather than failing the whole entry).
    pub fn get_attribute_values(&self, name: &str, raw: bool) -> Option<Rc<Vec<AttributeValue>>> {
        let prop = self.decoder.get_property(name)?;
        self.get_attribute_values_by_property(prop, raw)
    }

    pub(crate) fn get_attribute_values_by_property(
        &self,
        prop: &PropertyDefinition,
        raw: bool,
    ) -> Option<Rc<Vec<AttributeValue>>> {
        let cache = if raw { &self.raw_cache } else { &self.cache };
        if let Some(cached) = cache.borrow().get(&prop.index) {
            return Some(cached.clone());
        }

        let relative_offset = self.relative_offset_for(prop.index)?;
        let attr_start = (self.offset as i64 + relative_offset as i64) as u64;

        let values = match self.decode_values(prop, attr_start, raw) {
            Ok(values) => values,
            Err(err) => {
                log::warn!(
                    "skipping unreadable attribute '{}' on object at offset {}: {err}",
                    prop.name,
                    self.offset
                );
                return None;
            }
        };

        let rc = Rc::new(values);
        cache.borrow_mut().insert(prop.index, rc.clone());
        Some(rc)
    }

    fn decode_values(
        &self,
        prop: &PropertyDefinition,
        attr_start: u64,
        raw: bool,
    ) -> Result<Vec<AttributeValue>> {
        let source = self.decoder.source();
        let num_values = source.read_u32_at(attr_start)?;
        if num_values == 0 {
            return Ok(Vec::new());
        }

        if prop.ads_type.is_offset_prefixed_string() {
            let mut relative_offsets = Vec::with_capacity(num_values as usize);
            let mut cursor = attr_start + 4;
            for _ in 0..num_values {
                relative_offsets.push(source.read_i32_at(cursor)?);
                cursor += 4;
            }
            let mut values = Vec::with_capacity(num_values as usize);
            for rel in relative_offsets {
                let string_offset = (attr_start as i64 + rel as i64) as u64;
                values.push(AttributeValue::Str(
                    source.read_wide_nul_terminated_at(string_offset)?,
                ));
            }
            return Ok(values);
        }

        let mut values = Vec::with_capacity(num_values as usize);
        match prop.ads_type {
            AdsType::OctetString => {
                let mut lengths = Vec::with_capacity(num_values as usize);
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    lengths.push(source.read_u32_at(cursor)?);
                    cursor += 4;
                }
                for len in lengths {
                    let bytes = source.read_bytes_at(cursor, len as usize)?;
                    cursor += len as u64;
                    values.push(decode_octet_string(&prop.name, &bytes, raw));
                }
            }
            AdsType::Boolean => {
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    values.push(AttributeValue::Bool(source.read_u32_at(cursor)? != 0));
                    cursor += 4;
                }
            }
            AdsType::Integer => {
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    values.push(AttributeValue::Int(source.read_u32_at(cursor)? as i64));
                    cursor += 4;
                }
            }
            AdsType::LargeInteger => {
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    values.push(AttributeValue::Int(source.read_i64_at(cursor)?));
                    cursor += 8;
                }
            }
            AdsType::UtcTime => {
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    let year = source.read_u16_at(cursor)?;
                    let month = source.read_u16_at(cursor + 2)?;
                    let _day_of_week = source.read_u16_at(cursor + 4)?;
                    let day = source.read_u16_at(cursor + 6)?;
                    let hour = source.read_u16_at(cursor + 8)?;
                    let minute = source.read_u16_at(cursor + 10)?;
                    let second = source.read_u16_at(cursor + 12)?;
                    let _millis = source.read_u16_at(cursor + 14)?;
                    cursor += 16;
                    values.push(AttributeValue::Int(utc_fields_to_unix_seconds(
                        year, month, day, hour, minute, second,
                    )));
                }
            }
            AdsType::NtSecurityDescriptor | AdsType::Other(_) => {
                let mut cursor = attr_start + 4;
                for _ in 0..num_values {
                    let len = source.read_u32_at(cursor)?;
                    cursor += 4;
                    let bytes = source.read_bytes_at(cursor, len as usize)?;
                    cursor += len as u64;
                    values.push(if raw {
                        AttributeValue::Bytes(bytes)
                    } else {
                        AttributeValue::Str(to_hex(&bytes))
                    });
                }
            }
            _ => unreachable!("offset-prefixed string types are handled above"),
        }

        Ok(values)
    }

    /// Iterates this entry's attributes in storage (pair-table) order,
    /// resolving each property index back to its schema definition.
    pub fn iter_attributes(&self) -> impl Iterator<Item = (&str, Rc<Vec<AttributeValue>>)> + '_ {
        self.mapping.iter().filter_map(move |(prop_index, _)| {
            let prop = self.decoder.properties().get(*prop_index as usize)?;
            let values = self.get_attribute_values_by_property(prop, false)?;
            Some((prop.name.as_str(), values))
        })
    }

    /// Projects this entry to an ordered list of (name, values) pairs. With
    /// a selection, the selection's order is preserved and only attributes
    /// present on the entry are included; without one, attributes are
    /// returned in storage order.
    pub fn to_dict(&self, selection: Option<&[String]>) -> Vec<(String, AttributeValues)> {
        match selection {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let prop = self.decoder.get_property(name)?;
                    let values = self.get_attribute_values_by_property(prop, false)?;
                    Some((prop.name.clone(), AttributeValues((*values).clone())))
                })
                .collect(),
            None => self
                .iter_attributes()
                .map(|(name, values)| (name.to_string(), AttributeValues((*values).clone())))
                .collect(),
        }
    }
}

fn decode_octet_string(prop_name: &str, bytes: &[u8], raw: bool) -> AttributeValue {
    if raw {
        return AttributeValue::Bytes(bytes.to_vec());
    }

    let lower = prop_name.to_lowercase();
    if bytes.len() == 16 && (lower.ends_with("guid") || lower == "objectguid") {
        if let Some(guid) = format_guid_le(bytes) {
            return AttributeValue::Str(guid);
        }
    }
    if lower == "objectsid" {
        return AttributeValue::Str(format_sid(bytes));
    }
    AttributeValue::Str(to_hex(bytes))
}

fn utc_fields_to_unix_seconds(year: u16, month: u16, day: u16, hour: u16, minute: u16, second: u16) -> i64 {
    Utc.with_ymd_and_hms(year as i32, month as u32, day as u32, hour as u32, minute as u32, second as u32)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Decoder;
    use crate::test_support::sample_snapshot_bytes;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp(bytes: &[u8], suffix: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "adx-query-entry-test-{}-{}.dat",
            std::process::id(),
            suffix
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn decodes_multi_valued_string_attribute() {
        let path = write_temp(&sample_snapshot_bytes(), "objectclass");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let values = entry.get_attribute_values("objectClass", false).unwrap();
        let names: Vec<String> = values.iter().map(|v| v.to_display_string()).collect();
        assert_eq!(names, vec!["top", "person", "user"]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn decodes_guid_and_sid_octet_strings() {
        let path = write_temp(&sample_snapshot_bytes(), "guidsid");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let guid = entry.get_attribute_values("objectGUID", false).unwrap();
        match &guid[0] {
            AttributeValue::Str(s) => assert_eq!(s, "67452301-ab89-efcd-0123-456789abcdef"),
            other => panic!("expected guid string, got {other:?}"),
        }

        let sid = entry.get_attribute_values("objectSid", false).unwrap();
        match &sid[0] {
            AttributeValue::Str(s) => assert!(s.starts_with("S-1-5-")),
            other => panic!("expected sid string, got {other:?}"),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn raw_mode_returns_original_bytes() {
        let path = write_temp(&sample_snapshot_bytes(), "rawguid");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let guid_raw = entry.get_attribute_values("objectGUID", true).unwrap();
        match &guid_raw[0] {
            AttributeValue::Bytes(b) => assert_eq!(b.len(), 16),
            other => panic!("expected raw bytes, got {other:?}"),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn cache_is_idempotent_across_repeated_calls() {
        let path = write_temp(&sample_snapshot_bytes(), "cache");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let first = entry.get_attribute_values("cn", false).unwrap();
        let second = entry.get_attribute_values("cn", false).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unknown_attribute_is_none_not_an_error() {
        let path = write_temp(&sample_snapshot_bytes(), "unknown");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        assert!(entry.get_attribute_values("doesNotExist", false).is_none());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn utc_time_decodes_to_unix_seconds() {
        let path = write_temp(&sample_snapshot_bytes(), "utctime");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let when_created = entry.get_attribute_values("whenCreated", false).unwrap();
        match &when_created[0] {
            AttributeValue::Int(secs) => assert_eq!(*secs, 1_705_312_800),
            other => panic!("expected integer seconds, got {other:?}"),
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn projection_collapses_singleton_and_preserves_order() {
        let path = write_temp(&sample_snapshot_bytes(), "projection");
        let decoder = Decoder::open(&path).unwrap();
        let entry = decoder.entry_at(decoder.object_offsets()[0]).unwrap();

        let selection = vec!["cn".to_string(), "objectGUID".to_string()];
        let dict = entry.to_dict(Some(&selection));
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[0].0, "cn");
        assert_eq!(dict[1].0, "objectGUID");

        std::fs::remove_file(&path).ok();
    }
}
