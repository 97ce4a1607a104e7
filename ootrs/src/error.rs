use thiserror::Error;

#[derive(Debug, Error)]
pub enum OotrsError {
    #[error("archive is missing its {0} file")]
    MissingComponent(&'static str),
    #[error("archive contains more than one {0} file")]
    DuplicateComponent(&'static str),
    #[error("meta file line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("archive contains a folder ({0}); only top-level files are supported")]
    NestedEntry(String),
    #[error("malformed sound bank: {0}")]
    Malformed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl OotrsError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OotrsError>;
