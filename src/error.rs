use thiserror::Error;

/// Broad classification of a failed request
///
/// Every [`AppError`] carries one of these so that handlers can surface
/// failures uniformly, whether as a flash message on an HTML page or as an
/// HTTP status on the JSON API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Something the request asked for does not exist (header row, column, file)
    NotFound,

    /// The request itself is incomplete or malformed
    InvalidInput,

    /// Reading, decoding, writing or persisting a file failed
    IoFailure,
}

/// Application error type
///
/// The display text of `NotFound` and `InvalidInput` is shown to the user
/// verbatim. `IoFailure` carries the underlying cause.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    IoFailure(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn io_failure(message: impl Into<String>) -> Self {
        AppError::IoFailure(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::IoFailure(_) => ErrorKind::IoFailure,
        }
    }

    /// Message suitable for showing to the person who made the request
    ///
    /// # Examples
    /// ```
    /// use artist_splitter::error::AppError;
    ///
    /// let err = AppError::io_failure("zip archive is truncated");
    /// assert_eq!(err.user_message(), "Error processing file: zip archive is truncated");
    ///
    /// let err = AppError::invalid_input("Missing file or action.");
    /// assert_eq!(err.user_message(), "Missing file or action.");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::InvalidInput(msg) => msg.clone(),
            AppError::IoFailure(msg) => format!("Error processing file: {}", msg),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoFailure(e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::IoFailure(format!("could not read CSV: {}", e))
    }
}

impl From<calamine::Error> for AppError {
    fn from(e: calamine::Error) -> Self {
        AppError::IoFailure(format!("could not read workbook: {}", e))
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        AppError::IoFailure(format!("could not write workbook: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("invalid JSON: {}", e))
    }
}

impl From<tempfile::PersistError> for AppError {
    fn from(e: tempfile::PersistError) -> Self {
        AppError::IoFailure(e.error.to_string())
    }
}
