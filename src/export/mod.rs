//! Snapshot files: one stored snapshot written out as JSON.
//!
//! Files can be gzip compressed. Reading detects compression from the gzip
//! magic bytes, so the extension does not matter.

use crate::db::SnapshotStore;
use crate::types::{SnapshotMeta, SnapshotRecord, new_id};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Snapshot file format version (semver).
pub const FORMAT_VERSION: &str = "1.0.0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    #[error("invalid snapshot file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot file version {found}")]
    UnsupportedVersion { found: String },
}

impl ExportError {
    fn io(path: &Path, source: io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk representation of an exported snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// File format version (semver)
    pub format_version: String,

    /// RFC 3339 timestamp of export
    pub exported_at: String,

    /// Tool name and version that wrote the file
    pub exported_by: String,

    pub snapshot: SnapshotRecord,
}

impl SnapshotFile {
    pub fn new(snapshot: SnapshotRecord) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            exported_by: format!("tasknest v{}", env!("CARGO_PKG_VERSION")),
            snapshot,
        }
    }

    /// Files with the same major version can be read.
    pub fn is_compatible(&self) -> bool {
        major(&self.format_version) == major(FORMAT_VERSION)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a plain or gzip compressed snapshot file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExportError> {
        let mut reader = BufReader::new(reader);
        let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

        let file: SnapshotFile = if compressed {
            serde_json::from_reader(GzDecoder::new(reader))?
        } else {
            serde_json::from_reader(reader)?
        };

        if !file.is_compatible() {
            return Err(ExportError::UnsupportedVersion {
                found: file.format_version,
            });
        }
        Ok(file)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExportError> {
        let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_reader(file)
    }

    /// Write pretty JSON, optionally gzip compressed.
    pub fn write_to<W: Write>(&self, writer: W, gzip: bool) -> Result<(), ExportError> {
        let json = self.to_json_pretty()?;
        if gzip {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            let mut writer = writer;
            writer.write_all(json.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: &Path, gzip: bool) -> Result<(), ExportError> {
        let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
        self.write_to(BufWriter::new(file), gzip)
    }
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

/// Whether output should be compressed: explicit flag or a `.gz` file name.
pub fn should_compress(output: Option<&Path>, gzip: bool) -> bool {
    gzip || output.is_some_and(|path| path.extension().is_some_and(|ext| ext == "gz"))
}

/// Read a stored snapshot into an exportable file.
pub fn export_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    snapshot_id: &str,
) -> anyhow::Result<SnapshotFile> {
    Ok(SnapshotFile::new(store.get_snapshot(snapshot_id)?))
}

/// Store the payload of a snapshot file as a new snapshot.
///
/// The store assigns a fresh creation time. The file's id is reused only
/// with `keep_id`; otherwise a new id is generated.
pub fn import_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    file: &SnapshotFile,
    keep_id: bool,
) -> anyhow::Result<SnapshotMeta> {
    let id = if keep_id {
        file.snapshot.id.clone()
    } else {
        new_id()
    };
    let meta = store.create_snapshot(
        &id,
        file.snapshot.description.as_deref(),
        &file.snapshot.data,
    )?;
    info!(
        snapshot_id = %meta.id,
        source_id = %file.snapshot.id,
        projects = file.snapshot.data.len(),
        "Imported snapshot"
    );
    Ok(meta)
}
