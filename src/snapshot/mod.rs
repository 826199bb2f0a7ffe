//! Snapshot decoder: header, property schema, and object offset index.

pub mod header;
pub mod property;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::byte_reader::ByteSource;
use crate::entry::SnapshotEntry;
use crate::error::{AdxError, Result};
use crate::filetime::filetime_to_utc;

pub use header::{SnapshotHeader, FIRST_OBJECT_OFFSET};
pub use property::{AdsType, PropertyDefinition};

const DESCRIPTION_WIDE_CHARS: usize = 260;
const SERVER_WIDE_CHARS: usize = 260;

/// Decodes an ADExplorer snapshot file: the header, the property schema
/// table, and the object offset index, then exposes random access to
/// object records by offset and to properties by case-insensitive name.
///
/// Not `Send`/`Sync`: a decoder owns a single seek position on its
/// buffered fallback path and its random-access pattern corrupts results
/// under concurrent use without external mutual exclusion (see the
/// crate-level concurrency notes).
pub struct Decoder {
    path: PathBuf,
    source: ByteSource,
    header: SnapshotHeader,
    properties: Vec<PropertyDefinition>,
    property_by_name: HashMap<String, usize>,
    object_offsets: Vec<u64>,
}

impl Decoder {
    /// Opens `path`, memory-mapping it by default. Falls back to buffered
    /// positioned reads if the mapping cannot be established.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mmap(path, true)
    }

    /// Opens `path` without attempting a memory map, for byte sources
    /// mapping doesn't support (named pipes, some network filesystems).
    pub fn open_buffered(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mmap(path, false)
    }

    fn open_with_mmap(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|_| AdxError::NotFound(path.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(AdxError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        debug!("opened snapshot file: {}", path.display());

        let source = if use_mmap {
            match ByteSource::mapped(&file) {
                Ok(source) => source,
                Err(err) => {
                    warn!("memory map failed ({err}), falling back to buffered reads");
                    ByteSource::buffered(file)
                }
            }
        } else {
            ByteSource::buffered(file)
        };

        let header = Self::parse_header(&source)?;
        info!(
            "parsed header: {} objects, {} attributes, captured {}",
            header.num_objects, header.num_attributes, header.captured_at
        );

        let (properties, property_by_name) = Self::parse_properties(&source, &header)?;
        let object_offsets = Self::parse_object_offsets(&source, &header);

        Ok(Decoder {
            path: path.to_path_buf(),
            source,
            header,
            properties,
            property_by_name,
            object_offsets,
        })
    }

    fn parse_header(source: &ByteSource) -> Result<SnapshotHeader> {
        if source.len() < FIRST_OBJECT_OFFSET {
            return Err(AdxError::TruncatedFile(
                "file is shorter than the fixed header region".into(),
            ));
        }

        let signature_bytes = source.read_bytes_at(0, 10)?;
        let signature = String::from_utf8_lossy(&signature_bytes)
            .trim_end_matches('\u{0}')
            .to_string();
        // marker at offset 10 is read and ignored.
        let _marker = source.read_u32_at(10)?;
        let filetime = source.read_u64_at(14)?;
        let description = source.read_wide_fixed_at(22, DESCRIPTION_WIDE_CHARS)?;
        let server = source.read_wide_fixed_at(22 + 520, SERVER_WIDE_CHARS)?;
        let num_objects = source.read_u32_at(1062)?;
        let num_attributes = source.read_u32_at(1066)?;
        let mapping_offset_low = source.read_u32_at(1070)?;
        let mapping_offset_high = source.read_u32_at(1074)?;
        // mapping_end at 1078 and reserved at 1082 are read and ignored.

        let mapping_offset = ((mapping_offset_high as u64) << 32) | mapping_offset_low as u64;
        if mapping_offset >= source.len() {
            return Err(AdxError::MalformedHeader(format!(
                "mapping offset {mapping_offset} is outside the file (len {})",
                source.len()
            )));
        }

        Ok(SnapshotHeader {
            signature,
            captured_at: filetime_to_utc(filetime),
            description,
            server,
            num_objects,
            num_attributes,
            mapping_offset,
            file_size: source.len(),
        })
    }

    fn parse_properties(
        source: &ByteSource,
        header: &SnapshotHeader,
    ) -> Result<(Vec<PropertyDefinition>, HashMap<String, usize>)> {
        let mut cursor = header.mapping_offset;
        let declared_count = source.read_u32_at(cursor)?;
        cursor += 4;

        if declared_count != header.num_attributes {
            warn!(
                "schema/header attribute count mismatch: header says {}, schema table says {}; using the schema table value",
                header.num_attributes, declared_count
            );
        }

        let mut properties = Vec::with_capacity(declared_count as usize);
        let mut property_by_name = HashMap::with_capacity(declared_count as usize);

        for idx in 0..declared_count {
            let name_len = source.read_u32_at(cursor)? as usize;
            cursor += 4;
            let name = decode_utf16le(&source.read_bytes_at(cursor, name_len)?);
            cursor += name_len as u64;

            let _reserved = source.read_u32_at(cursor)?;
            cursor += 4;

            let ads_type = AdsType::from_code(source.read_u32_at(cursor)?);
            cursor += 4;

            let dn_len = source.read_u32_at(cursor)? as usize;
            cursor += 4;
            let distinguished_name = decode_utf16le(&source.read_bytes_at(cursor, dn_len)?);
            cursor += dn_len as u64;

            let schema_id_guid: [u8; 16] = source.read_bytes_at(cursor, 16)?.try_into().unwrap();
            cursor += 16;
            let attribute_security_guid: [u8; 16] =
                source.read_bytes_at(cursor, 16)?.try_into().unwrap();
            cursor += 16;
            let _reserved2 = source.read_bytes_at(cursor, 4)?;
            cursor += 4;

            property_by_name.insert(name.to_lowercase(), idx as usize);
            properties.push(PropertyDefinition {
                index: idx,
                name,
                ads_type,
                distinguished_name,
                schema_id_guid,
                attribute_security_guid,
            });
        }

        Ok((properties, property_by_name))
    }

    fn parse_object_offsets(source: &ByteSource, header: &SnapshotHeader) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(header.num_objects as usize);
        let mut pos = FIRST_OBJECT_OFFSET;

        for _ in 0..header.num_objects {
            let size = match source.read_u32_at(pos) {
                Ok(size) => size,
                Err(_) => {
                    warn!("object offset index truncated after {} entries", offsets.len());
                    break;
                }
            };
            offsets.push(pos);
            pos += size as u64;
            if pos > source.len() {
                warn!(
                    "object offset index truncated after {} entries (next record would start past end of file)",
                    offsets.len()
                );
                break;
            }
        }

        offsets
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    pub fn object_offsets(&self) -> &[u64] {
        &self.object_offsets
    }

    /// Looks up a property by name, case-insensitively. Returns `None` for
    /// an empty name or a name with no corresponding schema entry.
    pub fn get_property(&self, name: &str) -> Option<&PropertyDefinition> {
        if name.is_empty() {
            return None;
        }
        let idx = self.property_by_name.get(&name.to_lowercase())?;
        self.properties.get(*idx)
    }

    pub(crate) fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Builds a lazy view over the object record at `offset`.
    pub fn entry_at(&self, offset: u64) -> Result<SnapshotEntry<'_>> {
        SnapshotEntry::new(self, offset)
    }

    /// Iterates every object record in declaration order, skipping any
    /// record that fails to parse its own attribute-mapping table (a
    /// single corrupt record does not end the scan).
    pub fn iter_entries(&self) -> impl Iterator<Item = SnapshotEntry<'_>> + '_ {
        self.object_offsets.iter().filter_map(move |&offset| {
            match self.entry_at(offset) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("skipping unreadable object record at offset {offset}: {err}");
                    None
                }
            }
        })
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_snapshot_bytes;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("adx-query-test-{}.dat", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn opens_and_parses_fixture_snapshot() {
        let bytes = sample_snapshot_bytes();
        let path = write_temp(&bytes);
        let decoder = Decoder::open(&path).unwrap();

        assert_eq!(decoder.header().num_objects, 1);
        assert!(decoder.get_property("cn").is_some());
        assert!(decoder.get_property("CN").is_some());
        assert_eq!(decoder.object_offsets().len(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = Decoder::open("/nonexistent/path/to/snapshot.dat");
        assert!(matches!(result, Err(AdxError::NotFound(_))));
    }

    #[test]
    fn property_lookup_is_case_insensitive() {
        let bytes = sample_snapshot_bytes();
        let path = write_temp(&bytes);
        let decoder = Decoder::open(&path).unwrap();

        let lower = decoder.get_property("objectclass").unwrap();
        let mixed = decoder.get_property("ObjectClass").unwrap();
        assert_eq!(lower.index, mixed.index);

        std::fs::remove_file(&path).ok();
    }
}
