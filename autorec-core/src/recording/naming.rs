//! Output file names and the session number counter.
//!
//! Session `N` is written to `<stem>.<N>.<ext>` and may later be renamed to
//! `<stem>.<N>.clipped.<ext>`. A number counts as taken when either name
//! exists, so a clipped take is never overwritten by a later plain one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::RecordingConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNaming {
    stem: PathBuf,
    extension: String,
}

impl SessionNaming {
    /// `base` may already carry the extension (`take.wav`); it is stripped.
    pub fn new(base: impl AsRef<Path>, extension: &str) -> Self {
        let base = base.as_ref();
        let extension = extension.trim_start_matches('.').to_string();
        let has_ext = base
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(&extension));
        let stem = if has_ext {
            base.with_extension("")
        } else {
            base.to_path_buf()
        };
        Self { stem, extension }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(&config.base_path, &config.extension)
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    pub fn plain(&self, number: u32) -> PathBuf {
        self.with_suffix(&format!(".{number}.{}", self.extension))
    }

    pub fn clipped(&self, number: u32) -> PathBuf {
        self.with_suffix(&format!(".{number}.clipped.{}", self.extension))
    }

    pub fn is_taken(&self, number: u32) -> bool {
        self.plain(number).exists() || self.clipped(number).exists()
    }

    /// Smallest number `>= from` with neither name on disk.
    pub fn first_free(&self, from: u32) -> u32 {
        let mut n = from.max(1);
        while self.is_taken(n) {
            n += 1;
        }
        n
    }

    // `with_extension` would eat dotted stems like `take.v2`; append instead.
    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.stem.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Session number allocator, owned by the writer thread.
#[derive(Debug, Clone)]
pub struct FileNumbering {
    naming: SessionNaming,
    next: u32,
}

impl FileNumbering {
    /// Start from the first free number on disk.
    pub fn scan(naming: SessionNaming) -> Self {
        let next = naming.first_free(1);
        Self { naming, next }
    }

    pub fn naming(&self) -> &SessionNaming {
        &self.naming
    }

    /// Number the next session would get if nothing changes on disk.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Pick the number for a new session. Files created by someone else since
    /// the last allocation are skipped. The counter does not move until
    /// [`commit`](Self::commit), so a discarded session's number is reused.
    pub fn allocate(&mut self) -> u32 {
        self.next = self.naming.first_free(self.next);
        self.next
    }

    /// Record that session `number` was kept.
    pub fn commit(&mut self, number: u32) {
        self.next = self.next.max(number + 1);
    }
}
