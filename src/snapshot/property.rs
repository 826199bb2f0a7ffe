//! Schema property definitions and ADSI type codes.

/// ADSI attribute type code, as stored in the schema table. Only the codes
/// the decoder gives distinct treatment to are named; everything else
/// decodes as a length-prefixed opaque blob (`Other`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsType {
    DnString,
    CaseExactString,
    CaseIgnoreString,
    PrintableString,
    NumericString,
    Boolean,
    Integer,
    OctetString,
    UtcTime,
    LargeInteger,
    ObjectClass,
    NtSecurityDescriptor,
    Other(u32),
}

impl AdsType {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => AdsType::DnString,
            2 => AdsType::CaseExactString,
            3 => AdsType::CaseIgnoreString,
            4 => AdsType::PrintableString,
            5 => AdsType::NumericString,
            6 => AdsType::Boolean,
            7 => AdsType::Integer,
            8 => AdsType::OctetString,
            9 => AdsType::UtcTime,
            10 => AdsType::LargeInteger,
            12 => AdsType::ObjectClass,
            25 => AdsType::NtSecurityDescriptor,
            other => AdsType::Other(other),
        }
    }

    pub fn is_offset_prefixed_string(&self) -> bool {
        matches!(
            self,
            AdsType::DnString
                | AdsType::CaseExactString
                | AdsType::CaseIgnoreString
                | AdsType::PrintableString
                | AdsType::NumericString
                | AdsType::ObjectClass
        )
    }
}

/// One schema entry: an attribute known to the snapshot.
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub index: u32,
    pub name: String,
    pub ads_type: AdsType,
    pub distinguished_name: String,
    pub schema_id_guid: [u8; 16],
    pub attribute_security_guid: [u8; 16],
}
