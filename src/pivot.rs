use crate::error::{AppError, AppResult};
use crate::regroup::SheetBlock;
use crate::table::{CellValue, RawTable, Row};
use std::collections::BTreeMap;

/// Worksheet name used for pivot output
pub const PIVOT_SHEET_NAME: &str = "Pivot";

/// Sum `value_column` for each distinct `index_column` value
///
/// The first row of `table` is the header; both columns are looked up by
/// their trimmed header text. Output is the two-column header followed by
/// one row per index value, sorted by index value.
///
/// Blank index cells skip the row and blank value cells add nothing. A value
/// that is neither a number nor numeric text fails the whole aggregation.
///
/// # Examples
/// ```
/// use artist_splitter::pivot::pivot_sum;
/// use artist_splitter::table::{table_from_strings, CellValue};
///
/// let table = table_from_strings(vec![
///     vec!["artist", "plays"],
///     vec!["Bob", "3"],
///     vec!["Ann", "1"],
///     vec!["Bob", "4"],
/// ]);
/// let block = pivot_sum(&table, "artist", "plays").unwrap();
/// assert_eq!(block.rows[1], vec![CellValue::text("Ann"), CellValue::Number(1.0)]);
/// assert_eq!(block.rows[2], vec![CellValue::text("Bob"), CellValue::Number(7.0)]);
/// ```
pub fn pivot_sum(
    table: &RawTable,
    index_column: &str,
    value_column: &str,
) -> AppResult<SheetBlock> {
    let index_column = index_column.trim();
    let value_column = value_column.trim();
    if index_column.is_empty() || value_column.is_empty() {
        return Err(AppError::invalid_input(
            "Please provide both an index column and a value column.",
        ));
    }

    let header = table
        .first()
        .ok_or_else(|| AppError::not_found("The uploaded sheet has no header row."))?;
    let index_col = find_column(header, index_column)?;
    let value_col = find_column(header, value_column)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for (offset, row) in table.iter().enumerate().skip(1) {
        let key = match row.get(index_col) {
            Some(cell) => cell.to_string().trim().to_string(),
            None => continue,
        };
        if key.is_empty() {
            continue;
        }

        let total = totals.entry(key).or_insert(0.0);
        match row.get(value_col) {
            None | Some(CellValue::Empty) => {}
            Some(cell) if cell.to_string().trim().is_empty() => {}
            Some(cell) => match cell.as_number() {
                Some(n) => *total += n,
                None => {
                    return Err(AppError::invalid_input(format!(
                        "Column '{}' has a non-numeric value '{}' on row {}.",
                        value_column,
                        cell,
                        offset + 1
                    )));
                }
            },
        }
    }

    let mut rows: Vec<Row> = Vec::with_capacity(totals.len() + 1);
    rows.push(vec![
        CellValue::text(index_column),
        CellValue::text(value_column),
    ]);
    rows.extend(
        totals
            .into_iter()
            .map(|(key, total)| vec![CellValue::Text(key), CellValue::Number(total)]),
    );

    Ok(SheetBlock {
        name: PIVOT_SHEET_NAME.to_string(),
        rows,
    })
}

fn find_column(header: &Row, name: &str) -> AppResult<usize> {
    header
        .iter()
        .position(|cell| cell.to_string().trim() == name)
        .ok_or_else(|| {
            AppError::invalid_input(format!("Column '{}' not found in the header row.", name))
        })
}
