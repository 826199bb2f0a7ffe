//! Query engine: drives snapshot iteration, invokes the evaluator,
//! projects attributes, enforces the result limit, and records stats.

use std::cell::Cell;
use std::time::Instant;

use log::debug;
use serde::Serialize;

use crate::entry::{AttributeValues, SnapshotEntry};
use crate::filter::{evaluate, EvalContext, FilterTree};
use crate::snapshot::Decoder;

/// Counters from the most recently completed `search()` call.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueryStats {
    pub entries_evaluated: u64,
    pub matches: u64,
    pub duration_seconds: f64,
}

/// Drives a filter over a decoder's entries in offset order.
pub struct QueryEngine<'a> {
    decoder: &'a Decoder,
    filter: FilterTree,
    ignore_case: bool,
    limit: Option<usize>,
    selected_attributes: Option<Vec<String>>,
    unknown_attributes: Vec<String>,
    stats: Cell<QueryStats>,
}

impl<'a> QueryEngine<'a> {
    /// Resolves `attributes` against the decoder's schema, splitting out
    /// unresolved names into `unknown_attributes`. If every requested
    /// attribute is unknown, the effective selection falls back to "all
    /// attributes" rather than projecting nothing.
    pub fn new(
        decoder: &'a Decoder,
        filter: FilterTree,
        ignore_case: bool,
        attributes: Option<&[String]>,
        limit: Option<usize>,
    ) -> Self {
        let (selected_attributes, unknown_attributes) = Self::normalise_attributes(decoder, attributes);

        QueryEngine {
            decoder,
            filter,
            ignore_case,
            limit,
            selected_attributes,
            unknown_attributes,
            stats: Cell::new(QueryStats::default()),
        }
    }

    fn normalise_attributes(
        decoder: &Decoder,
        attributes: Option<&[String]>,
    ) -> (Option<Vec<String>>, Vec<String>) {
        let Some(attributes) = attributes else {
            return (None, Vec::new());
        };
        if attributes.is_empty() {
            return (None, Vec::new());
        }

        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for attr in attributes {
            let attr = attr.trim();
            if attr.is_empty() {
                continue;
            }
            match decoder.get_property(attr) {
                Some(prop) => selected.push(prop.name.clone()),
                None => unknown.push(attr.to_string()),
            }
        }

        if selected.is_empty() {
            (None, unknown)
        } else {
            (Some(selected), unknown)
        }
    }

    pub fn selected_attributes(&self) -> Option<&[String]> {
        self.selected_attributes.as_deref()
    }

    pub fn unknown_attributes(&self) -> &[String] {
        &self.unknown_attributes
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.get()
    }

    /// Walks entries in the decoder's offset order, evaluating the filter
    /// against each and collecting matches until `limit` is reached (or
    /// the snapshot is exhausted). Updates `stats()` before returning.
    pub fn search(&self) -> Vec<SnapshotEntry<'a>> {
        let start = Instant::now();
        let mut evaluated = 0u64;
        let mut matches = Vec::new();

        for entry in self.decoder.iter_entries() {
            evaluated += 1;
            let ctx = EvalContext::new(self.decoder, &entry, self.ignore_case);
            if evaluate(&self.filter, &ctx) {
                matches.push(entry);
                if let Some(limit) = self.limit {
                    if matches.len() >= limit {
                        break;
                    }
                }
            }
        }

        let stats = QueryStats {
            entries_evaluated: evaluated,
            matches: matches.len() as u64,
            duration_seconds: start.elapsed().as_secs_f64(),
        };
        debug!(
            "search evaluated {} entries, {} matches in {:.3}s",
            stats.entries_evaluated, stats.matches, stats.duration_seconds
        );
        self.stats.set(stats);

        matches
    }

    /// Projects `entry` using the effective selection (or all attributes
    /// if none was resolved).
    pub fn materialise(&self, entry: &SnapshotEntry<'a>) -> Vec<(String, AttributeValues)> {
        entry.to_dict(self.selected_attributes.as_deref())
    }
}
