//! Output sinks for projected records. Binary-only: the library exposes
//! `QueryEngine::materialise`'s (name, values) pairs and stops there.

use std::io::Write;

use adx_query::AttributeValues;
use anyhow::Result;

pub type Record = Vec<(String, AttributeValues)>;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
    Ndjson,
}

pub fn write_records(format: OutputFormat, records: &[Record], out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(records, out),
        OutputFormat::Csv => write_csv(records, out),
        OutputFormat::Json => write_json(records, out),
        OutputFormat::Ndjson => write_ndjson(records, out),
    }
}

fn column_names(records: &[Record]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for (name, _) in record {
            if seen.insert(name.clone()) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

fn cell_text(record: &Record, column: &str) -> String {
    record
        .iter()
        .find(|(name, _)| name == column)
        .map(|(_, values)| serde_json::to_string(values).unwrap_or_default())
        .unwrap_or_default()
}

fn write_table(records: &[Record], out: &mut dyn Write) -> Result<()> {
    let columns = column_names(records);
    if columns.is_empty() {
        writeln!(out, "(no results)")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| cell_text(record, col))
                .collect::<Vec<_>>()
        })
        .collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c:width$}", width = widths[i]))
        .collect();
    writeln!(out, "{}", header.join("  "))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;

    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:width$}", width = widths[i]))
            .collect();
        writeln!(out, "{}", line.join("  "))?;
    }

    Ok(())
}

fn write_csv(records: &[Record], out: &mut dyn Write) -> Result<()> {
    let columns = column_names(records);
    writeln!(out, "{}", columns.iter().map(|c| csv_quote(c)).collect::<Vec<_>>().join(","))?;
    for record in records {
        let line: Vec<String> = columns.iter().map(|col| csv_quote(&cell_text(record, col))).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}

fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_json(records: &[Record], out: &mut dyn Write) -> Result<()> {
    let as_maps: Vec<serde_json::Map<String, serde_json::Value>> = records
        .iter()
        .map(|record| {
            let mut map = serde_json::Map::new();
            for (name, values) in record {
                map.insert(name.clone(), serde_json::to_value(values).unwrap_or(serde_json::Value::Null));
            }
            map
        })
        .collect();
    let json = serde_json::to_string_pretty(&as_maps)?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn write_ndjson(records: &[Record], out: &mut dyn Write) -> Result<()> {
    for record in records {
        let mut map = serde_json::Map::new();
        for (name, values) in record {
            map.insert(name.clone(), serde_json::to_value(values).unwrap_or(serde_json::Value::Null));
        }
        let json = serde_json::to_string(&map)?;
        writeln!(out, "{json}")?;
    }
    Ok(())
}
