use crate::error::{AppError, AppResult};
use crate::table::{CellValue, RawTable, Row};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use std::path::Path;

/// Spreadsheet formats accepted for upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
}

impl SourceFormat {
    /// Detect the format from a file name's extension
    ///
    /// # Examples
    /// ```
    /// use artist_splitter::loader::SourceFormat;
    ///
    /// assert_eq!(SourceFormat::from_filename("Sales.CSV"), Some(SourceFormat::Csv));
    /// assert_eq!(SourceFormat::from_filename("sales.xlsx"), Some(SourceFormat::Excel));
    /// assert_eq!(SourceFormat::from_filename("sales.pdf"), None);
    /// ```
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Some(SourceFormat::Csv),
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                Some(SourceFormat::Excel)
            }
            _ => None,
        }
    }
}

/// Load a table from CSV bytes
///
/// Every field is read as text and records may have different lengths.
/// A UTF-8 byte order mark is ignored; any other invalid UTF-8 is an error.
///
/// # Examples
/// ```
/// use artist_splitter::loader::from_csv;
/// use artist_splitter::table::CellValue;
///
/// let table = from_csv(b"id,artist\n1,\"Earth, Wind & Fire\"\n2\n").unwrap();
/// assert_eq!(table.len(), 3);
/// assert_eq!(table[1][1], CellValue::text("Earth, Wind & Fire"));
/// assert_eq!(table[2].len(), 1);
/// ```
pub fn from_csv(bytes: &[u8]) -> AppResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut table = RawTable::new();
    for record in reader.records() {
        let record = record?;
        table.push(record.iter().map(CellValue::text).collect());
    }

    Ok(table)
}

/// Load the first worksheet of an Excel or OpenDocument workbook
///
/// Row and column indices match the sheet: if the used range starts below
/// or to the right of `A1` the table is padded with empty cells.
pub fn from_excel(bytes: Vec<u8>) -> AppResult<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(AppError::invalid_input("The workbook has no worksheets.")),
    };

    let (first_row, first_col) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Ok(RawTable::new()),
    };

    let mut table: RawTable = vec![Row::new(); first_row];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; first_col];
        cells.extend(row.iter().map(cell_from_data));
        table.push(cells);
    }

    Ok(table)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime {
            serial: dt.as_f64(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Decode an upload, choosing the reader by file name
pub fn load_table(filename: &str, bytes: Vec<u8>) -> AppResult<RawTable> {
    match SourceFormat::from_filename(filename) {
        Some(SourceFormat::Csv) => from_csv(&bytes),
        Some(SourceFormat::Excel) => from_excel(bytes),
        None => Err(AppError::invalid_input(
            "Unsupported file type. Please upload a .csv or Excel file.",
        )),
    }
}
