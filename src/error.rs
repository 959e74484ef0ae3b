//! Fatal application errors.
//!
//! Per-source and per-record problems never reach this type; they are recorded
//! in the collection report. An `AppError` ends the process with its exit code.

/// Arguments, sources file or profiles are unusable.
pub const EXIT_CONFIG: u8 = 2;
/// No source produced any product data.
pub const EXIT_ALL_SOURCES_FAILED: u8 = 3;
/// Output could not be rendered or written.
pub const EXIT_SINK: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn all_sources_failed(attempted: usize) -> Self {
        Self::new(
            EXIT_ALL_SOURCES_FAILED,
            format!("All {attempted} sources failed; no product data collected."),
        )
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::new(EXIT_SINK, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_carry_their_exit_codes() {
        assert_eq!(AppError::config("bad flag").exit_code(), 2);
        assert_eq!(AppError::sink("disk full").exit_code(), 4);

        let err = AppError::all_sources_failed(5);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "All 5 sources failed; no product data collected.");
    }
}
