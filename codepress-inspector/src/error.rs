use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single parser complaint, positioned in the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("{path}: unrecoverable syntax error ({} diagnostics){}", .diagnostics.len(), first_diagnostic(.diagnostics))]
    Syntax {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("{path}: unsupported file extension")]
    UnsupportedFile { path: String },

    #[error("expression fragment is not a single expression: {message}")]
    Fragment { message: String },
}

fn first_diagnostic(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| format!(", first at {d}"))
        .unwrap_or_default()
}

impl ParseError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ParseError::Syntax { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ParseError::UnsupportedFile { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    /// The `{code}` fragment did not parse; a placeholder literal was written instead.
    #[error("invalid code for '{name}': {message}")]
    InvalidCode {
        name: String,
        code: String,
        message: String,
    },

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error("'{0}' is not a valid JSX attribute name")]
    InvalidName(String),
}

#[derive(Error, Debug, Clone)]
pub enum MapGenerationError {
    #[error("{}: cannot derive a component name from the file name", .path.display())]
    NoFileStem { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum WatchSetupError {
    #[error("Failed to create watcher: {0}")]
    Create(#[from] notify::Error),

    #[error("Watch root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No such source file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum InspectorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Watch(#[from] WatchSetupError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No element with identifier '{0}'")]
    UnknownIdentifier(String),
}

pub type InspectorResult<T> = Result<T, InspectorError>;

/// A per-file failure collected during batch work, kept for display.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FileDiagnostic {
    pub path: PathBuf,
    pub message: String,
    pub positions: Vec<Diagnostic>,
}

impl FileDiagnostic {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            positions: vec![],
        }
    }

    pub fn from_parse(path: impl Into<PathBuf>, err: &ParseError) -> Self {
        Self {
            path: path.into(),
            message: err.to_string(),
            positions: err.diagnostics().to_vec(),
        }
    }
}
