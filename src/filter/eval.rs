//! Filter tree evaluation against a single snapshot entry.

use super::{FilterTree, FilterValue};
use crate::entry::{AttributeValue, SnapshotEntry};
use crate::snapshot::Decoder;

/// Carries everything evaluation needs: the decoder (for schema lookups),
/// the entry under test, and the case-insensitivity flag.
///
/// `ignore_case` is accepted for forward compatibility but not observably
/// consulted: string comparisons are always case-folded regardless of its
/// value, matching the reference implementation's behaviour (see the
/// open question in the design notes).
pub struct EvalContext<'a, 'b> {
    pub decoder: &'a Decoder,
    pub entry: &'b SnapshotEntry<'a>,
    pub ignore_case: bool,
}

impl<'a, 'b> EvalContext<'a, 'b> {
    pub fn new(decoder: &'a Decoder, entry: &'b SnapshotEntry<'a>, ignore_case: bool) -> Self {
        EvalContext { decoder, entry, ignore_case }
    }
}

/// Walks `tree` against `ctx`, performing type-directed comparison.
/// Never fails: an attribute that doesn't resolve, or isn't present on
/// this entry, simply makes the enclosing node false.
pub fn evaluate(tree: &FilterTree, ctx: &EvalContext) -> bool {
    match tree {
        FilterTree::And(children) => children.iter().all(|child| evaluate(child, ctx)),
        FilterTree::Or(children) => children.iter().any(|child| evaluate(child, ctx)),
        FilterTree::Not(child) => !evaluate(child, ctx),
        FilterTree::Presence(attr) => evaluate_presence(attr, ctx),
        FilterTree::Equality(attr, value) => evaluate_equality(attr, value, ctx),
        FilterTree::Substring(attr, pattern) => evaluate_substring(attr, pattern, ctx),
    }
}

fn resolved_values(attr: &str, ctx: &EvalContext) -> Option<std::rc::Rc<Vec<AttributeValue>>> {
    let prop = ctx.decoder.get_property(attr)?;
    ctx.entry.get_attribute_values(&prop.name, false)
}

fn evaluate_presence(attr: &str, ctx: &EvalContext) -> bool {
    match resolved_values(attr, ctx) {
        Some(values) => !values.is_empty(),
        None => false,
    }
}

fn evaluate_equality(attr: &str, needle: &FilterValue, ctx: &EvalContext) -> bool {
    let Some(values) = resolved_values(attr, ctx) else {
        return false;
    };
    if values.is_empty() {
        return false;
    }

    let sample = &values[0];
    match sample {
        AttributeValue::Bool(_) => {
            let Some(parsed) = parse_bool_literal(&needle.as_str()) else {
                return false;
            };
            values.iter().any(|v| matches!(v, AttributeValue::Bool(b) if *b == parsed))
        }
        AttributeValue::Int(_) => {
            let Some(parsed) = parse_int_literal(&needle.as_str()) else {
                return false;
            };
            values.iter().any(|v| matches!(v, AttributeValue::Int(i) if *i == parsed))
        }
        AttributeValue::Bytes(_) => {
            let needle_bytes = needle.as_bytes();
            values
                .iter()
                .any(|v| matches!(v, AttributeValue::Bytes(b) if b.as_slice() == needle_bytes))
        }
        AttributeValue::Str(_) => {
            let needle_norm = needle.as_str().to_lowercase();
            values.iter().any(|v| string_equality_matches(v, &needle_norm))
        }
    }
}

fn string_equality_matches(value: &AttributeValue, needle_norm: &str) -> bool {
    let value_str = value.to_display_string();
    if value_str.to_lowercase() == needle_norm {
        return true;
    }
    if let Some(rdn) = extract_rdn_value(&value_str) {
        if rdn.to_lowercase() == needle_norm {
            return true;
        }
    }
    false
}

/// Extracts the text after the first `=` up to the first `,` from what
/// looks like a distinguished name (`CN=alice,OU=People,DC=x` -> `alice`).
fn extract_rdn_value(dn: &str) -> Option<String> {
    if !dn.contains('=') {
        return None;
    }
    let first_component = dn.split(',').next()?;
    let (_, value) = first_component.split_once('=')?;
    Some(value.trim().to_string())
}

fn parse_bool_literal(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return i64::from_str_radix(&trimmed[1..], 8).ok();
    }
    trimmed.parse::<i64>().ok()
}

fn evaluate_substring(attr: &str, pattern: &super::SubstringPattern, ctx: &EvalContext) -> bool {
    let Some(values) = resolved_values(attr, ctx) else {
        return false;
    };
    if values.is_empty() {
        return false;
    }

    values.iter().any(|value| {
        let candidate = value.to_display_string().to_lowercase();
        pattern.matches(&candidate)
    })
}
