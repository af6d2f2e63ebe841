//! Artatlas snapshot layer
//!
//! One snapshot = the complete, point-in-time table of artwork records,
//! persisted as a single columnar file:
//!
//! - [`ArtworkRecord`] is the canonical row (one painting held at one museum),
//! - [`Snapshot`] is the full record set plus fetch-time provenance,
//! - [`SnapshotStore`] reads/writes the columnar file with whole-file
//!   replacement semantics (write to temp, then rename).
//!
//! Refreshing never merges: the writer replaces the file wholesale, and
//! readers get an independent logical copy. Loading a file that is missing
//! is a distinct, actionable error ([`SnapshotError::NotFound`]) so callers
//! can tell the user to refresh instead of showing an I/O stack trace.

mod columnar;


use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub use columnar::REQUIRED_COLUMNS;

/// Sentinel used when the source provides no city/country for a museum.
pub const UNKNOWN_PLACE: &str = "Unknown";

// ============================================================================
// Core Types
// ============================================================================

/// One painting-held-at-museum fact.
///
/// `painter`, `painting` and `museum` are always non-empty human-readable
/// labels; rows with placeholder labels are dropped upstream at the
/// normalization boundary. Coordinates are either both present (within
/// -90..=90 / -180..=180) or both absent, never one-sided.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkRecord {
    pub painter: String,
    pub painting: String,
    pub museum: String,
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtworkRecord {
    /// `(lat, lon)` when the museum is geocoded.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// The complete persisted table of artwork records.
///
/// Order is storage order and carries no meaning; consumers treat the
/// snapshot as a set.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    records: Vec<ArtworkRecord>,
    fetched_at: Option<i64>,
}

impl Snapshot {
    pub fn new(records: Vec<ArtworkRecord>, fetched_at: Option<i64>) -> Self {
        Self {
            records,
            fetched_at,
        }
    }

    pub fn records(&self) -> &[ArtworkRecord] {
        &self.records
    }

    /// Unix seconds at which the refresh that produced this snapshot ran.
    pub fn fetched_at(&self) -> Option<i64> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn distinct_painters(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.painter.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn distinct_museums(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.museum.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of rows with a geocoded museum.
    pub fn with_coordinates(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.coordinates().is_some())
            .count()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot file does not exist yet. Remediation: run a refresh.
    #[error("no snapshot at {}: run `artatlas refresh` first", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is not a valid snapshot (bad header, undecodable
    /// body, missing column, ragged columns, one-sided coordinates).
    #[error("snapshot at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Snapshot Store
// ============================================================================

/// Reads and writes the columnar snapshot file at a fixed path.
///
/// `save` is single-writer whole-file replacement; `load` may be called
/// concurrently by any number of readers.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the snapshot file with `snapshot`.
    ///
    /// The bytes are staged in a temp file in the destination directory and
    /// renamed over the target, so a crash mid-write never leaves a partial
    /// snapshot behind.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let bytes = columnar::encode(snapshot)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(
            path = %self.path.display(),
            rows = snapshot.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot, validating the column layout.
    pub fn load(&self) -> Result<Snapshot, SnapshotError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = columnar::decode(&bytes, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            rows = snapshot.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}
