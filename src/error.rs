use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("SVG error: {0}")]
    Svg(String),

    #[error("Tile width and height must be nonzero (got {width}x{height})")]
    InvalidTileGeometry { width: f64, height: f64 },

    #[error("Path '{path_id}' does not start with a move command")]
    MissingStartPoint { path_id: String },

    #[error("Path '{path_id}' contains an unsupported '{command}' command")]
    UnsupportedCommand {
        path_id: String,
        command: &'static str,
    },

    #[error("Group '{group_id}' has no [ISO ORIGIN] marker")]
    MissingOrigin { group_id: String },

    #[error("Group '{group_id}' is not inside a layer")]
    MissingLayer { group_id: String },

    #[error("No bounding box for '{group_id}'")]
    MissingBounds { group_id: String },

    #[error("Group '{group_id}' has a degenerate bounding box ({width}x{height})")]
    ZeroSizedBounds {
        group_id: String,
        width: f64,
        height: f64,
    },

    #[error("Image '{path}' was not produced: {reason}")]
    MissingImage { path: String, reason: String },

    #[error("Inkscape query output is malformed: {0}")]
    Query(String),

    #[error("'{program}' failed with {status}: {stderr}")]
    Process {
        program: String,
        status: String,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// A structural failure of a single path or group. The run carries on
/// without it.
#[derive(Debug)]
pub struct Diagnostic {
    pub subject: String,
    pub error: ExportError,
}

impl Diagnostic {
    pub fn new(subject: impl Into<String>, error: ExportError) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.error)
    }
}

/// Log every collected diagnostic at the end of a run.
pub fn report_diagnostics(kind: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    log::warn!(
        "{} export finished with {} problem(s):",
        kind,
        diagnostics.len()
    );
    for d in diagnostics {
        log::warn!("  {}", d);
    }
}
