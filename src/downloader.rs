use crate::error::AppResult;
use crate::regroup::{MAX_SHEET_NAME_CHARS, SheetBlock};
use crate::table::CellValue;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Characters Excel does not allow in a worksheet name, besides slashes
const FORBIDDEN_SHEET_CHARS: [char; 5] = ['[', ']', ':', '*', '?'];

/// Longest text Excel accepts in one cell
pub const MAX_CELL_CHARS: usize = 32_767;

/// Number formats for date cells
struct DateFormats {
    date: Format,
    time: Format,
    datetime: Format,
}

impl DateFormats {
    fn new() -> Self {
        DateFormats {
            date: Format::new().set_num_format("yyyy-mm-dd"),
            time: Format::new().set_num_format("hh:mm:ss"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
        }
    }

    fn for_serial(&self, serial: f64) -> &Format {
        let has_date = serial.floor() > 0.0;
        let has_time = serial.fract().abs() > 0.0001;
        match (has_date, has_time) {
            (true, false) => &self.date,
            (false, true) => &self.time,
            _ => &self.datetime,
        }
    }
}

/// Convert named blocks to XLSX format
///
/// Each block becomes one worksheet, in order. Block names are passed
/// through [`worksheet_names`] first so that the workbook always opens in
/// Excel even when two groups share their first 31 characters.
///
/// # Arguments
/// * `blocks` - The worksheets to write
///
/// # Returns
/// * `AppResult<Vec<u8>>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use artist_splitter::downloader::to_xlsx;
/// use artist_splitter::regroup::SheetBlock;
/// use artist_splitter::table::table_from_strings;
///
/// let block = SheetBlock {
///     name: "Bob".to_string(),
///     rows: table_from_strings(vec![vec!["id", "artist"], vec!["1", "Bob"]]),
/// };
/// let xlsx = to_xlsx(&[block]).unwrap();
/// assert!(xlsx.starts_with(b"PK"));
/// ```
pub fn to_xlsx(blocks: &[SheetBlock]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let names = worksheet_names(blocks.iter().map(|b| b.name.as_str()));
    let formats = DateFormats::new();

    for (block, name) in blocks.iter().zip(names) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_rows(worksheet, &block.rows, &formats)?;
    }

    if blocks.is_empty() {
        workbook.add_worksheet();
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

fn write_rows(
    worksheet: &mut Worksheet,
    rows: &[Vec<CellValue>],
    formats: &DateFormats,
) -> AppResult<()> {
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) if s.chars().count() > MAX_CELL_CHARS => {
                    log::warn!(
                        "text in row {} column {} cut to {} characters",
                        r + 1,
                        c + 1,
                        MAX_CELL_CHARS
                    );
                    let cut: String = s.chars().take(MAX_CELL_CHARS).collect();
                    worksheet.write_string(r, c, cut)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                CellValue::DateTime { serial } => {
                    let format = formats.for_serial(*serial);
                    worksheet.write_number_with_format(r, c, *serial, format)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
    }
    Ok(())
}

/// Make a list of names usable as worksheet names in one workbook
///
/// Forbidden characters become `-`, surrounding apostrophes are dropped,
/// and names that clash case-insensitively get a numeric suffix.
///
/// # Examples
/// ```
/// use artist_splitter::downloader::worksheet_names;
///
/// let names = worksheet_names(["Bob", "BOB", "What?", "'quoted'"].into_iter());
/// assert_eq!(names, vec!["Bob", "BOB1", "What-", "quoted"]);
/// ```
pub fn worksheet_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();

    names
        .map(|name| {
            let legal = legal_sheet_name(name);
            let mut candidate = legal.clone();
            let mut n = 1;
            while taken.contains(&candidate.to_lowercase()) {
                let suffix = n.to_string();
                let base: String = legal
                    .chars()
                    .take(MAX_SHEET_NAME_CHARS - suffix.len())
                    .collect();
                candidate = format!("{}{}", base, suffix);
                n += 1;
            }
            taken.insert(candidate.to_lowercase());
            candidate
        })
        .collect()
}

/// Write `bytes` to `path` through a temporary file in the same directory
///
/// The target either keeps its old contents or receives all of `bytes`.
pub fn write_file_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

fn legal_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_SHEET_CHARS.contains(&c) || c == '/' || c == '\\' {
                '-'
            } else {
                c
            }
        })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();

    let trimmed = replaced.trim_matches('\'');
    if trimmed.is_empty() {
        "Sheet".to_string()
    } else {
        trimmed.to_string()
    }
}
