//! File parsing: turns CSV, TSV and JSON files into rows, and writes rows
//! back out as CSV.
//!
//! Delimited files are read with headers; every header becomes a column and
//! empty cells become [`Value::Null`]. Input is decoded to UTF-8 with
//! `encoding_rs_io` before parsing, so a BOM or a legacy code page is handled
//! in one place for both formats.

use std::{
    borrow::Borrow,
    collections::HashSet,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use heck::ToTitleCase;
use log::debug;

use crate::value::{Row, Value};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// How a source file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited(u8),
    Json,
}

impl SourceFormat {
    /// `.json` is JSON; everything else is delimited text (tab for `.tsv`).
    /// An explicit delimiter forces delimited parsing.
    pub fn detect(path: &Path, delimiter: Option<u8>) -> Self {
        if let Some(delimiter) = delimiter {
            return SourceFormat::Delimited(delimiter);
        }
        match extension(path).as_deref() {
            Some("json") => SourceFormat::Json,
            Some("tsv") => SourceFormat::Delimited(DEFAULT_TSV_DELIMITER),
            _ => SourceFormat::Delimited(DEFAULT_CSV_DELIMITER),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

/// Title-cased file stem, used as the dataset name when none is given.
pub fn display_name_for(path: &Path) -> String {
    if is_dash(path) {
        return "Stdin".to_string();
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_title_case())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Dataset".to_string())
}

pub fn file_name_for(path: &Path) -> String {
    if is_dash(path) {
        return "-".to_string();
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn open_decoded(path: &Path, encoding: &'static Encoding) -> Result<Box<dyn Read>> {
    let raw: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(Box::new(
        DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .build(raw),
    ))
}

pub fn load_dataset_rows(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Vec<Row>> {
    let format = SourceFormat::detect(path, delimiter);
    let reader = open_decoded(path, encoding)?;
    let rows = match format {
        SourceFormat::Json => {
            read_json_rows(reader).with_context(|| format!("Parsing JSON from {path:?}"))?
        }
        SourceFormat::Delimited(delimiter) => read_delimited_rows(reader, delimiter)
            .with_context(|| format!("Parsing delimited text from {path:?}"))?,
    };
    debug!("Loaded {} row(s) from {:?} as {:?}", rows.len(), path, format);
    Ok(rows)
}

/// Reads a JSON array of objects.
pub fn read_json_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let rows: Vec<Row> =
        serde_json::from_reader(reader).context("Expected a JSON array of objects")?;
    Ok(rows)
}

/// Reads headered delimited text. Rows may be shorter or longer than the
/// header; extra fields are dropped and missing ones are simply absent.
pub fn read_delimited_rows<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader);
    let headers = unique_headers(reader.headers().context("Reading header row")?.iter());
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| {
                let value = if field.is_empty() {
                    Value::Null
                } else {
                    Value::from(field)
                };
                (header.clone(), value)
            })
            .collect::<Row>();
        rows.push(row);
    }
    Ok(rows)
}

/// Trims headers, names blank ones by position and suffixes duplicates so
/// every column stays addressable.
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.enumerate()
        .map(|(idx, header)| {
            let base = match header.trim() {
                "" => format!("column_{}", idx + 1),
                trimmed => trimmed.to_string(),
            };
            let mut candidate = base.clone();
            let mut counter = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{counter}");
                counter += 1;
            }
            candidate
        })
        .collect()
}

/// Union of the columns across all rows, in first-seen order.
pub fn union_columns<R: Borrow<Row>>(rows: &[R]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for column in row.borrow().columns() {
            if seen.insert(column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

/// Writes rows as CSV to `path`, or stdout when `path` is `None` or `-`.
/// The header is the union of all row columns; absent cells are left blank.
pub fn write_rows_csv<R: Borrow<Row>>(path: Option<&Path>, rows: &[R]) -> Result<()> {
    let delimiter = match path.and_then(extension).as_deref() {
        Some("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    };
    let sink: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(sink);

    let columns = union_columns(rows);
    writer
        .write_record(&columns)
        .context("Writing header row")?;
    for (idx, row) in rows.iter().enumerate() {
        let row = row.borrow();
        let record = columns
            .iter()
            .map(|column| row.get(column).map(Value::as_display).unwrap_or_default());
        writer
            .write_record(record)
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_follows_extension_unless_delimiter_given() {
        assert_eq!(
            SourceFormat::detect(Path::new("a.JSON"), None),
            SourceFormat::Json
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.tsv"), None),
            SourceFormat::Delimited(b'\t')
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.txt"), None),
            SourceFormat::Delimited(b',')
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.json"), Some(b';')),
            SourceFormat::Delimited(b';')
        );
    }

    #[test]
    fn display_names_are_title_cased_stems() {
        assert_eq!(display_name_for(&PathBuf::from("data/fom_sales.csv")), "Fom Sales");
        assert_eq!(display_name_for(Path::new("stock-levels.json")), "Stock Levels");
        assert_eq!(file_name_for(Path::new("data/fom_sales.csv")), "fom_sales.csv");
    }

    #[test]
    fn delimited_rows_map_empty_cells_to_null() {
        let input = "Date,Product,Price\n2024-01-01,Widget,10\n2024-01-02,,\n,,\n";
        let rows = read_delimited_rows(input.as_bytes(), b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Price"), Some(&Value::from("10")));
        assert_eq!(rows[1].get("Product"), Some(&Value::Null));
    }

    #[test]
    fn ragged_rows_and_duplicate_headers_are_tolerated() {
        let input = "Name,Name,\nA,B,C,D\nE\n";
        let rows = read_delimited_rows(input.as_bytes(), b',').unwrap();
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["Name", "Name_2", "column_3"]
        );
        assert_eq!(rows[1].len(), 1);
    }

    #[test]
    fn json_rows_keep_document_order_and_types() {
        let input = r#"[{"Region": "North", "Revenue": 12.5, "Paid": true, "Note": null}]"#;
        let rows = read_json_rows(input.as_bytes()).unwrap();
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["Region", "Revenue", "Paid", "Note"]
        );
        assert_eq!(rows[0].get("Revenue"), Some(&Value::Number(12.5)));
        assert_eq!(rows[0].get("Paid"), Some(&Value::from("true")));
        assert_eq!(rows[0].get("Note"), Some(&Value::Null));
        assert!(read_json_rows(r#"{"not": "an array"}"#.as_bytes()).is_err());
    }

    #[test]
    fn union_columns_cover_every_row() {
        let rows: Vec<Row> = vec![
            [("A", Value::from("1"))].into_iter().collect(),
            [("B", Value::from("2")), ("A", Value::from("3"))]
                .into_iter()
                .collect(),
        ];
        assert_eq!(union_columns(&rows), vec!["A", "B"]);
    }

    #[test]
    fn unknown_encoding_label_is_an_error() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("latin1")).unwrap().name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
