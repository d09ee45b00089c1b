//! Artifact file store.
//!
//! One file per function name and per trigger-owning table, and three
//! shared files for types, FTS configurations and aggregates, all under
//! a predictable root. The first emit for a path in a run truncates the
//! file; later emits append. This truncate-then-append policy is what
//! makes a second run overwrite stale content instead of accumulating
//! duplicates. Single writer only.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// Subdirectory for the three shared category files.
const OTHERS_DIR: &str = "others";
/// Subdirectory for per-function files.
const FUNCTIONS_DIR: &str = "functions";
/// Subdirectory for per-table trigger files.
const TRIGGERS_DIR: &str = "triggers";

/// Destination of one emitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Shared file for enum and composite types.
    Types,
    /// Shared file for text search configurations.
    FtsConfigurations,
    /// Shared file for aggregates.
    Aggregates,
    /// One file per function name.
    Function(String),
    /// One file per trigger-owning table.
    Trigger(String),
}

impl ArtifactKind {
    /// Path of the backing file, relative to the store root.
    pub fn relative_path(&self) -> PathBuf {
        match self {
            ArtifactKind::Types => Path::new(OTHERS_DIR).join("types.sql"),
            ArtifactKind::FtsConfigurations => Path::new(OTHERS_DIR).join("fts.sql"),
            ArtifactKind::Aggregates => Path::new(OTHERS_DIR).join("aggregates.sql"),
            ArtifactKind::Function(name) => Path::new(FUNCTIONS_DIR).join(format!("{name}.sql")),
            ArtifactKind::Trigger(table) => Path::new(TRIGGERS_DIR).join(format!("{table}.sql")),
        }
    }
}

/// Filesystem store for reconstructed SQL artifacts.
pub struct ArtifactStore {
    root: PathBuf,
    /// Paths already truncated in this run.
    initialized: HashSet<PathBuf>,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. No filesystem effect until the
    /// first emit.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: HashSet::new(),
        }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a kind's backing file.
    pub fn path_for(&self, kind: &ArtifactKind) -> PathBuf {
        self.root.join(kind.relative_path())
    }

    /// Write one formatted statement. Truncates the backing file on the
    /// first call for its path within this run, appends afterwards. Any
    /// I/O error is fatal to the run.
    pub fn emit(&mut self, kind: &ArtifactKind, formatted_sql: &str) -> Result<()> {
        let path = self.path_for(kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let truncate = self.initialized.insert(path.clone());
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(&path)?;

        writeln!(file, "{}", formatted_sql)?;
        writeln!(file)?;

        debug!("Emitted artifact to {:?}", path);
        Ok(())
    }

    /// Start a new run: forget which paths have been truncated, so every
    /// path truncates again on its next emit, and truncate the three
    /// shared category files up front so a category that became empty
    /// does not keep stale statements from a previous run.
    pub fn begin_run(&mut self) -> Result<()> {
        self.initialized.clear();
        for kind in [
            ArtifactKind::Types,
            ArtifactKind::FtsConfigurations,
            ArtifactKind::Aggregates,
        ] {
            let path = self.path_for(&kind);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, "")?;
            self.initialized.insert(path);
        }
        Ok(())
    }

    /// Wipe the triggers directory. Idempotent; recreates it empty.
    pub fn reset_triggers_root(&self) -> Result<()> {
        let dir = self.root.join(TRIGGERS_DIR);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        info!("Reset triggers directory {:?}", dir);
        Ok(())
    }

    /// Sorted file names of every `.sql` artifact in a multi-file
    /// category directory. Empty when the directory does not exist.
    pub fn sorted_files(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.root.join(dir);
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".sql") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
