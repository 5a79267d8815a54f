//! CSV and workbook decoding into [`RawTable`]s.
//!
//! CSV input gets encoding and delimiter auto-detection; workbooks
//! (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read with calamine. Cells are kept
//! as the file holds them: coercion is the normalizers' job.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::{Cell, RawTable};
use crate::normalize::dates::from_serial;

/// A decoded CSV with the settings that were detected.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub table: RawTable,
    pub encoding: String,
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> ParseResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => {
            let enc = encoding_rs::Encoding::for_label(other.as_bytes()).ok_or_else(|| {
                ParseError::Encoding(format!("unsupported encoding '{}'", other))
            })?;
            enc.decode(bytes).0.into_owned()
        }
    };
    Ok(text)
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// let table = parse_csv_str("Nom;Salaire (€)\nAlice;\"2 000,00 €\"", ';', "Salaires")?;
/// assert_eq!(table.len(), 1);
/// ```
pub fn parse_csv_str(content: &str, delimiter: char, name: &str) -> ParseResult<RawTable> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| ParseError::Csv {
        line: 1,
        message: format!("delimiter '{}' is not ASCII", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(&e, 1))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(&e, idx + 2))?;
        rows.push(record.iter().map(|v| Cell::from(v.trim())).collect());
    }

    Ok(RawTable::new(name, headers, rows))
}

fn csv_error(err: &csv::Error, fallback_line: usize) -> ParseError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback_line);
    ParseError::Csv {
        line,
        message: err.to_string(),
    }
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes_auto(bytes: &[u8], name: &str) -> ParseResult<ParsedCsv> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    // Valid UTF-8 is taken as is; chardet only arbitrates legacy encodings.
    let encoding = if std::str::from_utf8(bytes).is_ok() {
        "utf-8".to_string()
    } else {
        detect_encoding(bytes)
    };
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_csv_str(&content, delimiter, name)?;

    Ok(ParsedCsv {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection. The table is named after the file stem.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> ParseResult<ParsedCsv> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet");
    parse_csv_bytes_auto(&bytes, name)
}

/// Convert one calamine cell.
pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => from_serial(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => crate::normalize::parse_date_str(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.clone())),
        Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// First row of the range is the header row.
pub fn range_to_table(name: &str, range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .map(|c| cell_from_data(c).as_text().unwrap_or_default())
            .collect(),
        None => return RawTable::empty(name),
    };
    let body = rows.map(|r| r.iter().map(cell_from_data).collect()).collect();
    RawTable::new(name, headers, body)
}

/// Read workbook bytes. `sheet` selects a tab; the first tab otherwise.
pub fn parse_workbook_bytes(bytes: Vec<u8>, sheet: Option<&str>) -> ParseResult<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names().to_vec();
    let target = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.trim() == wanted.trim())
            .cloned()
            .ok_or_else(|| ParseError::Workbook(format!("no sheet named '{}'", wanted)))?,
        None => names.first().cloned().ok_or(ParseError::EmptyFile)?,
    };

    let range = workbook
        .worksheet_range(&target)
        .map_err(|e| ParseError::Workbook(e.to_string()))?;
    Ok(range_to_table(&target, &range))
}

/// Whether `file_name` has a workbook extension.
pub fn is_workbook_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    [".xlsx", ".xlsm", ".xlsb", ".xls", ".ods"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Decode an uploaded file into a table, by file extension.
///
/// `tab` picks the tab of a workbook upload (the first one otherwise) and
/// names a CSV upload's table. It is unrelated to where the table is saved.
pub fn parse_upload(bytes: Vec<u8>, file_name: &str, tab: Option<&str>) -> ParseResult<RawTable> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    if is_workbook_name(file_name) {
        parse_workbook_bytes(bytes, tab)
    } else {
        let name = tab.unwrap_or_else(|| {
            Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("upload")
        });
        Ok(parse_csv_bytes_auto(&bytes, name)?.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("Nom;Service\nAlice;RH\nBob;IT", ';', "t").unwrap();
        assert_eq!(table.headers, vec!["Nom", "Service"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "Service"), &Cell::text("IT"));
    }

    #[test]
    fn test_quoted_amounts_keep_commas() {
        let csv = "Nom,Salaire (€)\n\"Alice\",\"2 000,00 €\"";
        let table = parse_csv_str(csv, ',', "t").unwrap();
        assert_eq!(table.cell(0, "Salaire (€)"), &Cell::text("2 000,00 €"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a;b\n1;2\n\n;\n3;4\n", ';', "t").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_values() {
        let table = parse_csv_str("a;b;c\n1;;3", ';', "t").unwrap();
        assert_eq!(table.cell(0, "b"), &Cell::Empty);
        assert_eq!(table.cell(0, "c"), &Cell::text("3"));
    }

    #[test]
    fn test_short_and_long_rows() {
        let table = parse_csv_str("a;b\n1\n1;2;3;4", ';', "t").unwrap();
        assert_eq!(table.cell(0, "b"), &Cell::Empty);
        assert_eq!(table.cell(1, "b"), &Cell::text("2"));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv_str("", ';', "t"), Err(ParseError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_csv_bytes_auto(b"Nom;Age\nAlice;30\nBob;25", "t").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.headers, vec!["Nom", "Age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_bom_stripped() {
        let decoded = decode_content(b"\xEF\xBB\xBFNom", "utf-8").unwrap();
        assert_eq!(decoded, "Nom");
    }

    #[test]
    fn test_upload_routes_csv_by_extension() {
        let table = parse_upload(b"Nom;Service\nA;RH".to_vec(), "export.csv", None).unwrap();
        assert_eq!(table.name, "export");
        assert_eq!(table.len(), 1);

        let named = parse_upload(b"Nom;Service\nA;RH".to_vec(), "export.csv", Some("Salaires")).unwrap();
        assert_eq!(named.name, "Salaires");
    }

    #[test]
    fn test_upload_workbook_defaults_to_first_tab() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Nom").unwrap();
        sheet.write_string(1, 0, "A").unwrap();
        workbook.add_worksheet().write_string(0, 0, "Autre").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = parse_upload(bytes.clone(), "export.xlsx", None).unwrap();
        assert_eq!(table.name, "Sheet1");
        assert_eq!(table.cell(0, "Nom"), &Cell::text("A"));

        let second = parse_upload(bytes.clone(), "export.xlsx", Some("Sheet2")).unwrap();
        assert_eq!(second.headers, vec!["Autre"]);

        let err = parse_upload(bytes, "export.xlsx", Some("Salaires")).unwrap_err();
        assert!(matches!(err, ParseError::Workbook(_)));
    }

    #[test]
    fn test_upload_rejects_bad_workbook() {
        let err = parse_upload(b"not a zip".to_vec(), "book.xlsx", None).unwrap_err();
        assert!(matches!(err, ParseError::Workbook(_)));
    }

    #[test]
    fn test_calamine_cells() {
        assert_eq!(cell_from_data(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(cell_from_data(&Data::String(String::new())), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2024-01-09".into())),
            Cell::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 9).unwrap())
        );
    }
}
