//! Validation of uploaded source files
//!
//! Only single `.py` or `.c` files with non-empty UTF-8 content are accepted.
//! Everything else is rejected before the sandbox is involved.

use crate::config::Language;
use crate::{FdscopeError, Result};

/// Upload accepted for sandboxed execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUpload {
    pub filename: String,
    pub language: Language,
    pub source: String,
}

impl SourceUpload {
    pub fn validate(filename: &str, content: Vec<u8>) -> Result<Self> {
        if filename.is_empty() {
            return Err(FdscopeError::InvalidUpload("no filename provided".into()));
        }
        if filename.contains('/') {
            return Err(FdscopeError::InvalidUpload(format!(
                "{filename}: expected a bare file name"
            )));
        }

        let language = Language::from_filename(filename).ok_or_else(|| {
            FdscopeError::InvalidUpload(format!("{filename}: only .py and .c files are accepted"))
        })?;

        if content.is_empty() {
            return Err(FdscopeError::InvalidUpload(format!("{filename}: file is empty")));
        }

        let source = String::from_utf8(content)
            .map_err(|_| FdscopeError::InvalidUpload(format!("{filename}: file must be UTF-8 encoded")))?;

        Ok(Self {
            filename: filename.to_owned(),
            language,
            source,
        })
    }
}
