//! Process id file.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        info!(path = %path.display(), "Pid file written");
        Ok(Self { path: path.to_path_buf() })
    }

    /// Remove the file. Failures are logged only.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Could not remove pid file");
        }
    }
}
