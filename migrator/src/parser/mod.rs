//! CSV reading and writing with encoding and delimiter auto-detection.
//!
//! Produces raw records (header first) for the conversion engine and writes
//! converted tables back out. No schema logic here.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CsvError, CsvResult};

/// Delimiters considered by [`detect_delimiter`], in tie-break order.
const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// All records, header first
    pub records: Vec<Vec<String>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers (copy of the first record)
    pub headers: Vec<String>,
}

impl ParseResult {
    /// Number of records after the header.
    pub fn data_row_count(&self) -> usize {
        self.records.len().saturating_sub(1)
    }

    /// Re-encode the records as comma-delimited text.
    pub fn to_csv_string(&self) -> CsvResult<String> {
        records_to_csv_string(&self.records, ',')
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding label.
///
/// Unknown labels fall back to lossy UTF-8. A UTF-8 byte order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let label = match encoding.to_lowercase().as_str() {
        "ascii" | "utf8" => "utf-8".to_string(),
        "latin1" | "latin-1" => "iso-8859-15".to_string(),
        other => other.to_string(),
    };

    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes)
            .trim_start_matches('\u{feff}')
            .to_string(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Ties go to the earlier candidate; no candidate at all means `,`.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &CANDIDATE_DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn delimiter_byte(delimiter: char) -> CsvResult<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(CsvError::InvalidDelimiter(delimiter))
}

/// Parse delimited text into records.
///
/// Quoted fields and embedded delimiters are handled by the `csv` crate.
/// Rows may differ in length; field whitespace is trimmed; empty lines are
/// skipped.
///
/// # Example
/// ```
/// use csvmigrate::parser::parse_records;
///
/// let rows = parse_records("name;tags\nAlice;\"a;b\"", ';').unwrap();
/// assert_eq!(rows[1], vec!["Alice", "a;b"]);
/// ```
pub fn parse_records(content: &str, delimiter: char) -> CsvResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter_byte(delimiter)?)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn read_csv_file(path: impl AsRef<Path>) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let records = parse_records(content, delimiter)?;
    let headers = records.first().cloned().ok_or(CsvError::EmptyFile)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Require a header plus at least one data row (sample files for generation).
pub fn require_data_rows(result: &ParseResult) -> CsvResult<()> {
    if result.data_row_count() == 0 {
        Err(CsvError::NoDataRows)
    } else {
        Ok(())
    }
}

/// Encode records as delimited text.
pub fn records_to_csv_string<S: AsRef<str>>(records: &[Vec<S>], delimiter: char) -> CsvResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .flexible(true)
        .from_writer(Vec::new());

    for record in records {
        writer.write_record(record.iter().map(|f| f.as_ref()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Encoding(e.to_string()))
}

/// Write records to a comma-delimited file.
///
/// The content goes to a hidden sibling file first and is renamed into place,
/// so a failure never leaves a partial file at `path`.
pub fn write_csv<S: AsRef<str>>(path: impl AsRef<Path>, records: &[Vec<S>]) -> CsvResult<()> {
    let path = path.as_ref();
    let io_err = |source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let content = records_to_csv_string(records, ',')?;
    let tmp = temp_path(path);
    if let Err(source) = fs::write(&tmp, content).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let rows = parse_records("name,age\nAlice,30\nBob,25", ',').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["name", "age"]);
        assert_eq!(rows[2], vec!["Bob", "25"]);
    }

    #[test]
    fn test_quoted_values_with_delimiters() {
        let csv = "id,permissions\n1,\"read, write\"\n2,\"say \"\"hi\"\"\"";
        let rows = parse_records(csv, ',').unwrap();

        assert_eq!(rows[1], vec!["1", "read, write"]);
        assert_eq!(rows[2], vec!["2", "say \"hi\""]);
    }

    #[test]
    fn test_ragged_rows_and_trimming() {
        let rows = parse_records("a, b ,c\n 1 ,2\n1,2,3,4", ',').unwrap();

        assert_eq!(rows[0], vec!["a", "b", "c"]);
        assert_eq!(rows[1], vec!["1", "2"]);
        assert_eq!(rows[2].len(), 4);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let rows = parse_records("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_invalid_delimiter() {
        assert!(matches!(
            parse_records("a§b", '§'),
            Err(CsvError::InvalidDelimiter('§'))
        ));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_bytes_auto(b""), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes_auto(b"  \n"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_require_data_rows() {
        let header_only = parse_bytes_auto(b"a,b\n").unwrap();
        assert!(matches!(require_data_rows(&header_only), Err(CsvError::NoDataRows)));

        let with_data = parse_bytes_auto(b"a,b\n1,2\n").unwrap();
        assert!(require_data_rows(&with_data).is_ok());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
        assert_eq!(detect_delimiter("a,b;c"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.data_row_count(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_utf8_bom_dropped() {
        let result = parse_bytes_auto(b"\xEF\xBB\xBFid,name\n1,Ann").unwrap();
        assert_eq!(result.headers, vec!["id", "name"]);
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/converted_users.csv");
        let records = vec![
            vec!["is_active", "permissions"],
            vec!["true", "view, edit"],
            vec!["", ""],
        ];

        write_csv(&path, &records).unwrap();

        let parsed = read_csv_file(&path).unwrap();
        assert_eq!(parsed.records, records);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_single_blank_field_survives_roundtrip() {
        let records = vec![vec!["flag"], vec![""], vec!["Y"]];
        let text = records_to_csv_string(&records, ',').unwrap();
        assert_eq!(parse_records(&text, ',').unwrap(), records);
    }
}
