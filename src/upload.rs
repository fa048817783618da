use crate::downloader::{to_xlsx, write_file_atomic};
use crate::error::{AppError, AppResult};
use crate::loader::load_table;
use crate::pivot::pivot_sum;
use crate::regroup::split_table;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
}

pub const PIVOT_DISABLED_MESSAGE: &str =
    "Pivot table functionality temporarily disabled. Please use split by artist.";

/// What to do with an uploaded spreadsheet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadAction {
    Split,
    Pivot,
}

impl UploadAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "split" => Some(UploadAction::Split),
            "pivot" => Some(UploadAction::Pivot),
            _ => None,
        }
    }

    /// Suffix appended to the upload's base name
    pub fn output_suffix(&self) -> &'static str {
        match self {
            UploadAction::Split => "split_by_artist",
            UploadAction::Pivot => "pivot_table",
        }
    }
}

/// Fields of an upload request, as submitted
#[derive(Clone, Debug, Default)]
pub struct UploadJob {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
    pub action: Option<String>,
    pub index_column: Option<String>,
    pub value_column: Option<String>,
}

/// Knobs for [`process_upload`]
#[derive(Clone, Debug)]
pub struct ProcessSettings {
    pub keyword: String,
    pub enable_pivot: bool,

    /// Where to keep a copy of the upload, if anywhere
    pub upload_dir: Option<PathBuf>,

    /// Where to write the generated workbook, if anywhere
    pub output_dir: Option<PathBuf>,
}

/// A generated workbook ready to be sent back
#[derive(Clone, Debug)]
pub struct GeneratedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub sheets: usize,
}

/// Reduce a user-supplied file name to a safe ASCII name
///
/// Accented letters are decomposed and reduced to their ASCII base, path
/// separators and whitespace become `_`, anything outside `[A-Za-z0-9_.-]`
/// is removed and leading/trailing dots and underscores are stripped. An
/// empty result falls back to `uploaded_file`.
///
/// # Examples
/// ```
/// use artist_splitter::upload::secure_filename;
///
/// assert_eq!(secure_filename("My Royalties (Q3).xlsx"), "My_Royalties_Q3.xlsx");
/// assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
/// assert_eq!(secure_filename("???"), "uploaded_file");
/// assert_eq!(secure_filename("Björk.csv"), "Bjork.csv");
/// ```
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        "uploaded_file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{base}_{suffix}.xlsx` for an already secured file name
pub fn output_filename(filename: &str, action: UploadAction) -> String {
    let base = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);
    format!("{}_{}.xlsx", secure_filename(base), action.output_suffix())
}

/// Validate, decode and transform one upload
///
/// Nothing is written to `output_dir` unless the whole workbook was built.
pub fn process_upload(job: UploadJob, settings: &ProcessSettings) -> AppResult<GeneratedFile> {
    let original = job.filename.as_deref().map(str::trim).unwrap_or_default();
    let action = job.action.as_deref().map(str::trim).unwrap_or_default();
    if original.is_empty() || job.bytes.is_empty() || action.is_empty() {
        return Err(AppError::invalid_input("Missing file or action."));
    }

    let action = UploadAction::parse(action)
        .ok_or_else(|| AppError::invalid_input(format!("Unknown action '{}'.", action)))?;

    let columns = match action {
        UploadAction::Split => None,
        UploadAction::Pivot => {
            if !settings.enable_pivot {
                return Err(AppError::invalid_input(PIVOT_DISABLED_MESSAGE));
            }
            let index = job.index_column.as_deref().map(str::trim).unwrap_or_default();
            let value = job.value_column.as_deref().map(str::trim).unwrap_or_default();
            if index.is_empty() || value.is_empty() {
                return Err(AppError::invalid_input(
                    "Please provide both an index column and a value column.",
                ));
            }
            Some((index.to_string(), value.to_string()))
        }
    };

    let filename = secure_filename(original);
    if let Some(dir) = &settings.upload_dir {
        fs::write(dir.join(&filename), &job.bytes)?;
    }

    let table = load_table(&filename, job.bytes)?;
    let blocks = match &columns {
        None => {
            let (location, blocks) = split_table(&table, &settings.keyword)?;
            log::info!(
                "{}: '{}' header at row {} column {}, {} sheets",
                filename,
                settings.keyword,
                location.row + 1,
                location.col + 1,
                blocks.len()
            );
            blocks
        }
        Some((index, value)) => {
            let block = pivot_sum(&table, index, value)?;
            log::info!(
                "{}: pivot of '{}' by '{}', {} rows",
                filename,
                value,
                index,
                block.rows.len().saturating_sub(1)
            );
            vec![block]
        }
    };

    let bytes = to_xlsx(&blocks)?;
    let output_name = output_filename(&filename, action);
    if let Some(dir) = &settings.output_dir {
        write_file_atomic(&dir.join(&output_name), &bytes)?;
    }

    Ok(GeneratedFile {
        filename: output_name,
        bytes,
        sheets: blocks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn settings() -> ProcessSettings {
        ProcessSettings {
            keyword: "artist".to_string(),
            enable_pivot: false,
            upload_dir: None,
            output_dir: None,
        }
    }

    fn csv_job(action: &str) -> UploadJob {
        UploadJob {
            filename: Some("plays.csv".to_string()),
            bytes: b"id,artist,plays\n1,Bob,3\n2,Ann,4\n".to_vec(),
            action: Some(action.to_string()),
            ..UploadJob::default()
        }
    }

    #[test]
    fn output_names_follow_convention() {
        assert_eq!(
            output_filename("Q3 report.final.csv", UploadAction::Split),
            "Q3_report.final_split_by_artist.xlsx"
        );
        assert_eq!(
            output_filename("sales.xlsx", UploadAction::Pivot),
            "sales_pivot_table.xlsx"
        );
    }

    #[test]
    fn accented_names_keep_their_letters() {
        assert_eq!(secure_filename("Björk.csv"), "Bjork.csv");
        assert_eq!(secure_filename("Sigur Rós – Live.xlsx"), "Sigur_Ros_Live.xlsx");
        assert_eq!(
            output_filename("Beyoncé.csv", UploadAction::Split),
            "Beyonce_split_by_artist.xlsx"
        );
    }

    #[test]
    fn missing_file_or_action_is_rejected() {
        let mut job = csv_job("split");
        job.action = None;
        let err = process_upload(job, &settings()).unwrap_err();
        assert_eq!(err.to_string(), "Missing file or action.");

        let mut job = csv_job("split");
        job.bytes.clear();
        let err = process_upload(job, &settings()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = process_upload(csv_job("merge"), &settings()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown action 'merge'.");
    }

    #[test]
    fn split_produces_one_sheet_per_artist() {
        let file = process_upload(csv_job("split"), &settings()).unwrap();
        assert_eq!(file.filename, "plays_split_by_artist.xlsx");
        assert_eq!(file.sheets, 2);
        assert!(file.bytes.starts_with(b"PK"));
    }

    #[test]
    fn pivot_is_disabled_by_default() {
        let mut job = csv_job("pivot");
        job.index_column = Some("artist".to_string());
        job.value_column = Some("plays".to_string());
        let err = process_upload(job, &settings()).unwrap_err();
        assert_eq!(err.to_string(), PIVOT_DISABLED_MESSAGE);
    }

    #[test]
    fn pivot_requires_both_columns() {
        let mut settings = settings();
        settings.enable_pivot = true;
        let mut job = csv_job("pivot");
        job.index_column = Some("artist".to_string());
        let err = process_upload(job, &settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn failed_split_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProcessSettings {
            output_dir: Some(dir.path().to_path_buf()),
            ..settings()
        };
        let job = UploadJob {
            filename: Some("plays.csv".to_string()),
            bytes: b"id,title\n1,Song\n".to_vec(),
            action: Some("split".to_string()),
            ..UploadJob::default()
        };
        let err = process_upload(job, &settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
