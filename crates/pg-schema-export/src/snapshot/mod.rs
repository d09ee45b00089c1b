//! Schema-snapshot output stream and loader emission.
//!
//! The stream is the caller's snapshot artifact (typically a psql script
//! replayed with `psql -f`). The core only ever appends lines: loader
//! include directives for the artifact files, and for triggers the raw
//! reconstructed SQL itself.

use std::path::Path;

use tracing::debug;

use crate::artifact::{ArtifactKind, ArtifactStore};
use crate::error::Result;

/// Line-append abstraction over the caller's snapshot output.
///
/// Writes appear in call order; nothing here is ever read back.
pub trait SnapshotStream {
    fn append_line(&mut self, line: &str) -> Result<()>;
}

impl<W: std::io::Write> SnapshotStream for W {
    fn append_line(&mut self, line: &str) -> Result<()> {
        writeln!(self, "{}", line)?;
        Ok(())
    }
}

/// Emits replay instructions into the snapshot stream.
///
/// Category files get one include line each; multi-file categories get
/// one include line per artifact file, sorted lexicographically by file
/// name so replay order never depends on catalog iteration order.
pub struct LoaderEmitter;

impl LoaderEmitter {
    /// Include line for one shared category file.
    pub fn emit_category(
        store: &ArtifactStore,
        kind: &ArtifactKind,
        label: &str,
        stream: &mut dyn SnapshotStream,
    ) -> Result<()> {
        stream.append_line(&format!("-- {}", label))?;
        stream.append_line(&include_line(&store.path_for(kind)))?;
        debug!("Emitted loader line for {}", label);
        Ok(())
    }

    /// Include lines for every file in a multi-file category directory,
    /// sorted by file name.
    pub fn emit_directory(
        store: &ArtifactStore,
        dir: &str,
        label: &str,
        stream: &mut dyn SnapshotStream,
    ) -> Result<()> {
        let files = store.sorted_files(dir)?;
        if files.is_empty() {
            return Ok(());
        }

        stream.append_line(&format!("-- {} (sorted by file name)", label))?;
        for name in files {
            stream.append_line(&include_line(&store.root().join(dir).join(name)))?;
        }
        debug!("Emitted loader lines for {}", label);
        Ok(())
    }

    /// Raw reconstructed SQL, inline. Used for triggers, which replay
    /// from the snapshot itself after the caller's drop-all step.
    pub fn emit_inline_sql(sql: &str, stream: &mut dyn SnapshotStream) -> Result<()> {
        stream.append_line(sql)
    }
}

fn include_line(path: &Path) -> String {
    // psql accepts forward slashes on every platform
    format!("\\i {}", path.display().to_string().replace('\\', "/"))
}
