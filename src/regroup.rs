//! Header detection and row regrouping
//!
//! Uploaded sheets often carry a title block or notes above the real column
//! headings, so the header row is found by content rather than position: the
//! first cell within the first [`HEADER_SEARCH_ROWS`] rows whose text contains
//! the keyword fixes both the header row and the grouping column. Every row
//! below it is then filed under the trimmed value of that column.

use crate::error::{AppError, AppResult};
use crate::table::{RawTable, Row};
use std::collections::HashMap;

/// Number of leading rows searched for the header keyword
pub const HEADER_SEARCH_ROWS: usize = 10;

/// Excel refuses worksheet names longer than this
pub const MAX_SHEET_NAME_CHARS: usize = 31;

/// Where the keyword was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderLocation {
    pub row: usize,
    pub col: usize,
}

/// Rows below the header, filed by group key
#[derive(Clone, Debug, PartialEq)]
pub struct Grouping {
    /// The header row, re-emitted at the top of every group
    pub header: Row,

    /// Groups in order of first appearance
    pub groups: Vec<(String, Vec<Row>)>,

    /// Rows dropped because their key cell was missing or blank
    pub skipped: usize,
}

impl Grouping {
    pub fn grouped_rows(&self) -> usize {
        self.groups.iter().map(|(_, rows)| rows.len()).sum()
    }

    pub fn get(&self, key: &str) -> Option<&[Row]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rows)| rows.as_slice())
    }
}

/// A named block of rows, written out as one worksheet
#[derive(Clone, Debug, PartialEq)]
pub struct SheetBlock {
    pub name: String,
    pub rows: Vec<Row>,
}

/// Find the first cell in the first ten rows that contains `keyword`
///
/// Rows are scanned top to bottom and cells left to right; matching is a
/// case-insensitive substring test on the cell's string form. Scanning stops
/// at the first hit.
///
/// # Examples
/// ```
/// use artist_splitter::regroup::{locate_header, HeaderLocation};
/// use artist_splitter::table::table_from_strings;
///
/// let table = table_from_strings(vec![
///     vec!["Royalty report"],
///     vec!["id", "Track", "Main Artist"],
/// ]);
/// assert_eq!(locate_header(&table, "artist"), Some(HeaderLocation { row: 1, col: 2 }));
/// ```
pub fn locate_header(table: &RawTable, keyword: &str) -> Option<HeaderLocation> {
    let needle = keyword.to_lowercase();

    table
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .enumerate()
        .find_map(|(row, cells)| {
            cells
                .iter()
                .position(|cell| cell.to_string().to_lowercase().contains(&needle))
                .map(|col| HeaderLocation { row, col })
        })
}

/// File every row below the header under the trimmed value of the header column
///
/// Rows too short to reach the column, or whose cell is blank after trimming,
/// are counted in [`Grouping::skipped`] and otherwise ignored.
pub fn group_rows(table: &RawTable, location: HeaderLocation) -> Grouping {
    let header = table.get(location.row).cloned().unwrap_or_default();
    let mut groups: Vec<(String, Vec<Row>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for row in table.iter().skip(location.row + 1) {
        let key = match row.get(location.col) {
            Some(cell) => cell.to_string().trim().to_string(),
            None => String::new(),
        };

        if key.is_empty() {
            skipped += 1;
            continue;
        }

        match index.get(&key) {
            Some(&i) => groups[i].1.push(row.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row.clone()]));
            }
        }
    }

    Grouping {
        header,
        groups,
        skipped,
    }
}

/// Worksheet name for a group key
///
/// # Examples
/// ```
/// use artist_splitter::regroup::sheet_name;
///
/// assert_eq!(sheet_name("AC/DC"), "AC-DC");
/// assert_eq!(sheet_name(&"x".repeat(40)).chars().count(), 31);
/// ```
pub fn sheet_name(key: &str) -> String {
    key.chars()
        .take(MAX_SHEET_NAME_CHARS)
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect()
}

/// One block per group: the header row followed by the group's rows
pub fn emit_blocks(grouping: &Grouping) -> Vec<SheetBlock> {
    grouping
        .groups
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, rows)| {
            let mut block = Vec::with_capacity(rows.len() + 1);
            block.push(grouping.header.clone());
            block.extend(rows.iter().cloned());
            SheetBlock {
                name: sheet_name(key),
                rows: block,
            }
        })
        .collect()
}

/// Locate, group and emit in one step
///
/// Fails with `NotFound` when no header cell matches or when every data row
/// has a blank key, so callers never produce an empty workbook.
pub fn split_table(
    table: &RawTable,
    keyword: &str,
) -> AppResult<(HeaderLocation, Vec<SheetBlock>)> {
    if keyword.trim().is_empty() {
        return Err(AppError::invalid_input("The match keyword must not be empty."));
    }

    let location = locate_header(table, keyword).ok_or_else(|| {
        AppError::not_found(format!(
            "Could not find a row containing '{}' in the first {} rows.",
            keyword, HEADER_SEARCH_ROWS
        ))
    })?;

    let grouping = group_rows(table, location);
    log::debug!(
        "header at row {} col {}: {} groups, {} rows skipped",
        location.row,
        location.col,
        grouping.groups.len(),
        grouping.skipped
    );

    let blocks = emit_blocks(&grouping);
    if blocks.is_empty() {
        return Err(AppError::not_found(format!(
            "No rows with a value in the '{}' column were found below the header.",
            grouping
                .header
                .get(location.col)
                .map(|c| c.to_string())
                .unwrap_or_else(|| keyword.to_string())
        )));
    }

    Ok((location, blocks))
}
