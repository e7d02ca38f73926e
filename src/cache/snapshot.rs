//! Versioned on-disk representation of the cache working set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::CacheError;
use crate::timeline::Timeline;

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// The whole working set, front (most recent insertion) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub timelines: Vec<Timeline>,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

impl CacheSnapshot {
    pub fn new(timelines: Vec<Timeline>, exported_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            exported_at,
            timelines,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec_pretty(self).map_err(CacheError::Encode)
    }

    /// Decode bytes, checking the format version before the payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let header: SnapshotHeader = serde_json::from_slice(bytes).map_err(CacheError::Decode)?;
        if header.version != SNAPSHOT_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: header.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        serde_json::from_slice(bytes).map_err(CacheError::Decode)
    }

    pub fn read_from(path: &Path) -> Result<Self, CacheError> {
        let bytes = std::fs::read(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), CacheError> {
        let bytes = self.encode()?;
        std::fs::write(path, bytes).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let json = br#"{"version": 9, "exported_at": "2026-02-10T08:00:00Z", "timelines": []}"#;
        match CacheSnapshot::decode(json) {
            Err(CacheError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 9);
                assert_eq!(expected, SNAPSHOT_FORMAT_VERSION);
            }
            other => panic!("Expected VersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_corrupt_bytes() {
        assert!(matches!(
            CacheSnapshot::decode(b"{not json"),
            Err(CacheError::Decode(_))
        ));
        // Right version, wrong payload shape
        let json = br#"{"version": 1, "timelines": 3}"#;
        assert!(matches!(
            CacheSnapshot::decode(json),
            Err(CacheError::Decode(_))
        ));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.json");
        let snapshot = CacheSnapshot::new(vec![fixtures::timeline("t1", "Move", at())], at());

        snapshot.write_to(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"version\": 1"));

        let loaded = CacheSnapshot::read_from(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        match CacheSnapshot::read_from(&path) {
            Err(CacheError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Io, got {:?}", other),
        }
    }
}
