// CSV import/export for tables

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use saresp_recon::{Table, Value};

use crate::error::LoadError;

/// Read a CSV file into a table named after the file stem.
pub fn import(path: &Path) -> Result<Table, LoadError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_table(&name, &bytes)
}

/// Parse CSV bytes into a table.
///
/// The first record is the header. The delimiter is sniffed, a UTF-8 BOM is
/// stripped and non-UTF-8 input is decoded as Windows-1252. Rows wider or
/// narrower than the header are truncated or padded with nulls. Blank cells
/// are null and numeric-looking cells become numbers.
pub fn parse_table(name: &str, bytes: &[u8]) -> Result<Table, LoadError> {
    let content = decode_utf8(bytes);
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => dedupe_header(name, record?.iter().map(|h| h.trim().to_string()).collect()),
        None => return Err(LoadError::EmptyFile(name.to_string())),
    };
    if header.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptyFile(name.to_string()));
    }

    let width = header.len();
    let mut rows = Vec::new();
    let mut reshaped = 0usize;
    for record in records {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() != width {
            reshaped += 1;
        }
        let mut row: Vec<Value> = record
            .iter()
            .take(width)
            .map(|f| parse_cell(f, delimiter))
            .collect();
        row.resize(width, Value::Null);
        rows.push(row);
    }

    if reshaped > 0 {
        log::warn!(
            "{}: {} row(s) did not have {} field(s); padded or truncated",
            name,
            reshaped,
            width
        );
    }
    log::debug!(
        "{}: {} row(s), {} column(s), delimiter {:?}",
        name,
        rows.len(),
        width,
        delimiter as char
    );

    Ok(Table::from_rows(name, header, rows)?)
}

/// Write `table` as comma-separated CSV with a header row. Nulls are empty.
pub fn write_table<W: Write>(table: &Table, writer: W) -> Result<(), LoadError> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export(table: &Table, path: &Path) -> Result<(), LoadError> {
    let file = std::fs::File::create(path)?;
    write_table(table, std::io::BufWriter::new(file))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the header line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Higher field count breaks ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// UTF-8 with the BOM stripped, else Windows-1252 (common for Excel exports).
pub fn decode_utf8(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Blank → null; numeric → number; anything else → text as written.
fn parse_cell(field: &str, delimiter: u8) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Some(n) = parse_number(trimmed) {
        return Value::Number(n);
    }
    // "7,5" is a decimal in pt-BR exports, unless comma is the delimiter
    if delimiter != b',' && trimmed.matches(',').count() == 1 && !trimmed.contains('.') {
        if let Some(n) = parse_number(&trimmed.replace(',', ".")) {
            return Value::Number(n);
        }
    }
    Value::Text(field.to_string())
}

fn parse_number(s: &str) -> Option<f64> {
    // Rust accepts "inf"/"NaN"; those stay text
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Repeated header names get `.1`, `.2`, … suffixes so every column is addressable.
fn dedupe_header(name: &str, header: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(header.len());
    for col in header {
        let mut candidate = col.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{col}.{n}");
            n += 1;
        }
        if candidate != col {
            log::warn!("{}: duplicate header '{}' renamed to '{}'", name, col, candidate);
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Age,City\nAlice,30,Paris\nBob,25,London\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tAge\tCity\nAlice\t30\tParis\nBob\t25\tLondon\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Escola;Nota;Cidade\n\"Silva, Jose\";\"7,5\";Jundiai\nOutra;8;Sorocaba\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_parse_types_cells() {
        let table = parse_table("t", b"DE,Escola,Nota\n1,Escola A,7.5\n2,,\n").unwrap();
        assert_eq!(table.columns(), &["DE", "Escola", "Nota"]);
        assert_eq!(table.rows()[0], vec![Value::Number(1.0), Value::text("Escola A"), Value::Number(7.5)]);
        assert_eq!(table.rows()[1], vec![Value::Number(2.0), Value::Null, Value::Null]);
    }

    #[test]
    fn test_decimal_comma_with_semicolon_delimiter() {
        let table = parse_table("t", "Escola;Nota\nA;7,5\nB;1.234,5\n".as_bytes()).unwrap();
        assert_eq!(table.rows()[0][1], Value::Number(7.5));
        // thousands separators are left alone
        assert_eq!(table.rows()[1][1], Value::text("1.234,5"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let table = parse_table("t", b"\xEF\xBB\xBFESCOLA,DE\nA,1\n").unwrap();
        assert_eq!(table.columns()[0], "ESCOLA");
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "Série" with é encoded as 0xE9
        let table = parse_table("t", b"S\xE9rie,DE\n9,1\n").unwrap();
        assert_eq!(table.columns()[0], "Série");
    }

    #[test]
    fn test_ragged_rows_are_padded_and_truncated() {
        let table = parse_table("t", b"A,B,C\n1,2\n1,2,3,4\n").unwrap();
        assert_eq!(table.rows()[0], vec![Value::Number(1.0), Value::Number(2.0), Value::Null]);
        assert_eq!(table.rows()[1].len(), 3);
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let table = parse_table("t", b"Nota,Nota,Nota\n1,2,3\n").unwrap();
        assert_eq!(table.columns(), &["Nota", "Nota.1", "Nota.2"]);
    }

    #[test]
    fn test_nan_text_stays_text() {
        let table = parse_table("t", b"A,B\nNaN,inf\n").unwrap();
        assert_eq!(table.rows()[0], vec![Value::text("NaN"), Value::text("inf")]);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(parse_table("t", b""), Err(LoadError::EmptyFile(_))));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let table = parse_table("t", b"A,B\n1,2\n,\n3,4\n").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_import_and_export_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saresp_sul1.csv");
        fs::write(&path, "Escola;Nota SARESP\nA;250\nB;\n").unwrap();

        let table = import(&path).unwrap();
        assert_eq!(table.name(), "saresp_sul1");
        assert_eq!(table.len(), 2);

        let out = dir.path().join("out.csv");
        export(&table, &out).unwrap();
        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content, "Escola,Nota SARESP\nA,250\nB,\n");
    }
}
