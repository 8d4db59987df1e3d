use std::path::{Path, PathBuf};

pub type UpgradeResult<T> = Result<T, UpgradeError>;

#[derive(thiserror::Error, Debug)]
pub enum UpgradeError {
    /// The `planes` section exists but is not an array.
    #[error("malformed document: {reason}")]
    MalformedDocument { reason: String },

    /// An element of `planes` is not a JSON object.
    #[error("type confusion: planes[{index}] is {found}, expected an object")]
    TypeConfusion { index: usize, found: &'static str },

    #[error("storage error for '{}': {reason}", path.display())]
    Storage { path: PathBuf, reason: String },

    #[error("invalid rule table: rule #{index} has an empty 'from' pattern")]
    InvalidRule { index: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UpgradeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }

    pub fn type_confusion(index: usize, found: &'static str) -> Self {
        Self::TypeConfusion { index, found }
    }

    pub fn storage(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Storage {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the shape of a parsed document, as opposed to I/O.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument { .. } | Self::TypeConfusion { .. }
        )
    }
}
