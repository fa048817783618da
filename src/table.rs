use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single spreadsheet cell as read from an uploaded file
///
/// CSV uploads only ever produce `Text` and `Empty`; Excel uploads keep
/// their native numbers, booleans and dates so they can be written back
/// unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),

    /// Excel date serial (1900 date system). In JSON: `{"serial": 45566.0}`
    DateTime { serial: f64 },
}

/// Rows of cells. Rows may have different lengths.
pub type Row = Vec<CellValue>;
pub type RawTable = Vec<Row>;

impl CellValue {
    /// Build a cell from text, mapping the empty string to `Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Numeric view of the cell
    ///
    /// Text is parsed after trimming so CSV columns of numbers aggregate
    /// the same way as native Excel numbers. Returns `None` for `Empty`,
    /// `Bool`, dates and text that is not a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime { serial } => f.write_str(&format_excel_date(*serial)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Format a number the way a spreadsheet shows it in a text cell
///
/// Whole numbers lose their fractional part (`3.0` becomes `"3"`), everything
/// else uses the shortest representation that round-trips.
///
/// # Examples
/// ```
/// use artist_splitter::table::format_number;
///
/// assert_eq!(format_number(3.0), "3");
/// assert_eq!(format_number(-12.0), "-12");
/// assert_eq!(format_number(2.5), "2.5");
/// ```
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Format an Excel date serial as ISO text
///
/// Whole serials print as a date, serials below one as a time of day and
/// everything else as both.
///
/// # Examples
/// ```
/// use artist_splitter::table::format_excel_date;
///
/// assert_eq!(format_excel_date(45566.0), "2024-10-01");
/// assert_eq!(format_excel_date(45566.5), "2024-10-01 12:00:00");
/// assert_eq!(format_excel_date(0.25), "06:00:00");
/// ```
pub fn format_excel_date(serial: f64) -> String {
    let millis = (serial * 86_400_000.0).round();
    let datetime = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .filter(|_| millis.is_finite() && millis.abs() < 1e15)
        .and_then(|epoch| epoch.checked_add_signed(Duration::milliseconds(millis as i64)));

    let datetime = match datetime {
        Some(datetime) => datetime,
        None => return format_number(serial),
    };

    let has_date = serial.floor() > 0.0;
    let has_time = (millis as i64) % 86_400_000 != 0;
    match (has_date, has_time) {
        (true, false) => datetime.format("%Y-%m-%d").to_string(),
        (false, true) => datetime.format("%H:%M:%S").to_string(),
        _ => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Build a table from string literals. Empty strings become `Empty` cells.
pub fn table_from_strings<R, C>(rows: R) -> RawTable
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    rows.into_iter()
        .map(|row| row.into_iter().map(|s| CellValue::text(s.as_ref())).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_coerces_every_variant() {
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Number(7.0).to_string(), "7");
        assert_eq!(CellValue::Number(0.25).to_string(), "0.25");
        assert_eq!(CellValue::text("Artist Name").to_string(), "Artist Name");
    }

    #[test]
    fn empty_text_is_empty_cell() {
        assert!(CellValue::text("").is_empty());
        assert!(!CellValue::text(" ").is_empty());
    }

    #[test]
    fn numeric_text_parses() {
        assert_eq!(CellValue::text(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(CellValue::text("twelve").as_number(), None);
        assert_eq!(CellValue::text("NaN").as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), None);
    }

    #[test]
    fn serializes_untagged() {
        let row: Row = vec![
            CellValue::Empty,
            CellValue::Number(1.5),
            CellValue::text("x"),
            CellValue::Bool(false),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,1.5,"x",false]"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn dates_display_as_iso_and_keep_their_type_in_json() {
        let date = CellValue::DateTime { serial: 45566.0 };
        assert_eq!(date.to_string(), "2024-10-01");
        assert_eq!(date.as_number(), None);

        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, r#"{"serial":45566.0}"#);
        assert_eq!(serde_json::from_str::<CellValue>(&json).unwrap(), date);
    }
}
