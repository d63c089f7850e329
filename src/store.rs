// src/store.rs
// Artifact delivery seam. The pipeline hands the serialized calendar to a
// sink and logs the outcome; delivery failures never affect pipeline
// correctness. Cloud upload lives behind this trait, out of this repo.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub trait ArtifactSink {
    /// Write one named artifact, returning where it landed.
    fn write(&self, name: &str, contents: &str) -> Result<PathBuf>;
}

/// Writes artifacts into a directory, creating it on demand. The destination
/// is injected, never process-wide state.
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for FsSink {
    fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;
        let path = self.dir.join(name);
        fs::write(&path, contents)
            .with_context(|| format!("writing artifact {}", path.display()))?;
        info!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_into_a_fresh_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path().join("calendar_files"));
        let path = sink.write("wsc_events.ics", "BEGIN:VCALENDAR\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "BEGIN:VCALENDAR\n");
    }

    #[test]
    fn overwrites_previous_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(tmp.path());
        sink.write("a.ics", "one").unwrap();
        let path = sink.write("a.ics", "two").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "two");
    }
}
