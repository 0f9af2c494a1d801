//! Path context for structure file I/O
//!
//! A bare `io::Error` does not say which structure file failed; these helpers
//! attach the file and what was being done with it.

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Lift a file system result into [`ApplicationError::OperationFailed`].
pub trait IoResultExt<T> {
    /// Name the failed step and the structure file, e.g.
    /// `"read structure: /work/report.json"`.
    fn with_path_context(self, operation: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, operation: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{operation}: {}", path.display()),
            source: Box::new(e),
        })
    }
}
