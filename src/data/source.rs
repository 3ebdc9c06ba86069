//! Faction data service: where unit listings and full unit records come from.
//!
//! [FileFactionSource] reads the exporter's on-disk layout:
//! `<data_dir>/<faction>/index.json` and `<data_dir>/<faction>/units/<unit_id>[@<version>].json`.
//! [MemoryFactionSource] serves fixed records and counts fetches.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::data::refs::CacheKey;
use crate::data::unit::{FactionIndex, Unit};
use crate::error::{ResolveError, Result};

pub const INDEX_FILE_NAME: &str = "index.json";
pub const UNITS_DIR_NAME: &str = "units";

#[async_trait]
pub trait FactionDataSource: Send + Sync {
    async fn list_units(&self, faction_id: &str) -> Result<FactionIndex>;

    async fn fetch_unit(&self, key: &CacheKey) -> Result<Unit>;
}

#[derive(Debug, Clone)]
pub struct FileFactionSource {
    data_dir: PathBuf,
}

impl FileFactionSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn faction_dir(&self, faction_id: &str) -> Result<PathBuf> {
        if !is_plain_segment(faction_id) {
            return Err(ResolveError::FactionNotFound {
                faction_id: faction_id.to_string(),
            });
        }
        Ok(self.data_dir.join(faction_id))
    }

    /// Record path for `key`. Ids that are not plain file names never resolve.
    pub fn unit_path(&self, key: &CacheKey) -> Result<PathBuf> {
        let version_ok = key.version.as_deref().map_or(true, is_plain_segment);
        if !is_plain_segment(&key.unit_id) || !version_ok {
            return Err(ResolveError::NotFound {
                faction_id: key.faction_id.clone(),
                unit_id: key.unit_id.clone(),
            });
        }
        let file_name = match &key.version {
            Some(version) => format!("{}@{}.json", key.unit_id, version),
            None => format!("{}.json", key.unit_id),
        };
        Ok(self
            .faction_dir(&key.faction_id)?
            .join(UNITS_DIR_NAME)
            .join(file_name))
    }
}

/// A single path component with no separators or parent references.
fn is_plain_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && !value.contains("..")
        && !value.contains(['/', '\\', '\0'])
}

#[async_trait]
impl FactionDataSource for FileFactionSource {
    async fn list_units(&self, faction_id: &str) -> Result<FactionIndex> {
        let path = self.faction_dir(faction_id)?.join(INDEX_FILE_NAME);
        debug!("loading faction index {}", path.display());
        let raw = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ResolveError::FactionNotFound {
                    faction_id: faction_id.to_string(),
                }
            } else {
                ResolveError::transient(faction_id, err)
            }
        })?;
        serde_json::from_str(&raw).map_err(|err| ResolveError::malformed(faction_id, err))
    }

    async fn fetch_unit(&self, key: &CacheKey) -> Result<Unit> {
        let path = self.unit_path(key)?;
        debug!("loading unit record {}", path.display());
        let raw = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ResolveError::NotFound {
                    faction_id: key.faction_id.clone(),
                    unit_id: key.unit_id.clone(),
                }
            } else {
                ResolveError::transient(key.to_string(), err)
            }
        })?;
        let mut unit: Unit =
            serde_json::from_str(&raw).map_err(|err| ResolveError::malformed(key.to_string(), err))?;
        if unit.faction_id.is_empty() {
            unit.faction_id = key.faction_id.clone();
        }
        Ok(unit)
    }
}

/// In-memory source. Records are keyed by faction and unit id; versions are ignored
/// unless a record was registered under that exact version.
#[derive(Debug)]
struct ScriptedFailure {
    error: ResolveError,
    /// Failures left before fetches succeed; None fails forever.
    remaining: Option<AtomicUsize>,
}

impl ScriptedFailure {
    fn fires(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryFactionSource {
    units: HashMap<CacheKey, Unit>,
    failures: HashMap<CacheKey, ScriptedFailure>,
    indices: HashMap<String, FactionIndex>,
    delays: HashMap<CacheKey, Duration>,
    fetches: AtomicUsize,
}

impl MemoryFactionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit under its own faction/unit id and appends it to that faction's index.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        let key = CacheKey::new(unit.faction_id.clone(), unit.unit_id.clone());
        self.indices
            .entry(unit.faction_id.clone())
            .or_default()
            .units
            .push(unit.index_entry());
        self.units.insert(key, unit);
        self
    }

    pub fn with_versioned_unit(mut self, version: &str, unit: Unit) -> Self {
        let key = CacheKey::new(unit.faction_id.clone(), unit.unit_id.clone()).with_version(version);
        self.units.insert(key, unit);
        self
    }

    /// Makes every fetch of `key` fail with `error`.
    pub fn with_failure(mut self, key: CacheKey, error: ResolveError) -> Self {
        self.failures.insert(
            key,
            ScriptedFailure {
                error,
                remaining: None,
            },
        );
        self
    }

    /// Fails the first `times` fetches of `key`, then serves it normally.
    pub fn with_failures(mut self, key: CacheKey, error: ResolveError, times: usize) -> Self {
        self.failures.insert(
            key,
            ScriptedFailure {
                error,
                remaining: Some(AtomicUsize::new(times)),
            },
        );
        self
    }

    /// Delays fetches of `key`, for exercising completion ordering.
    pub fn with_delay(mut self, key: CacheKey, delay: Duration) -> Self {
        self.delays.insert(key, delay);
        self
    }

    /// Number of `fetch_unit` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactionDataSource for MemoryFactionSource {
    async fn list_units(&self, faction_id: &str) -> Result<FactionIndex> {
        self.indices
            .get(faction_id)
            .cloned()
            .ok_or_else(|| ResolveError::FactionNotFound {
                faction_id: faction_id.to_string(),
            })
    }

    async fn fetch_unit(&self, key: &CacheKey) -> Result<Unit> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(failure) = self.failures.get(key).filter(|f| f.fires()) {
            return Err(failure.error.clone());
        }
        let unversioned = CacheKey::new(key.faction_id.clone(), key.unit_id.clone());
        self.units
            .get(key)
            .or_else(|| self.units.get(&unversioned))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                faction_id: key.faction_id.clone(),
                unit_id: key.unit_id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_json(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().expect("fixture path has a parent"))
            .expect("fixture dir should be created");
        std::fs::write(path, body).expect("fixture should be written");
    }

    #[tokio::test]
    async fn file_source_reads_index_and_versioned_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_json(
            &dir.path().join("arm").join(INDEX_FILE_NAME),
            r#"{"data_version":"v1","units":[{"unit_id":"armcom","name":"Armada Commander","unit_types":["commander"]}]}"#,
        );
        write_json(
            &dir.path().join("arm").join(UNITS_DIR_NAME).join("armcom@v1.json"),
            r#"{"unit_id":"armcom","faction_id":"","name":"Armada Commander","combat":{"health":3700.0}}"#,
        );

        let source = FileFactionSource::new(dir.path());
        let index = source.list_units("arm").await.expect("index should load");
        assert_eq!(index.data_version.as_deref(), Some("v1"));
        assert_eq!(index.units.len(), 1);

        let key = CacheKey::new("arm", "armcom").with_version("v1");
        let unit = source.fetch_unit(&key).await.expect("record should load");
        assert_eq!(unit.faction_id, "arm");
        assert_eq!(unit.health(), 3700.0);
    }

    #[tokio::test]
    async fn file_source_maps_missing_and_malformed_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_json(
            &dir.path().join("cor").join(UNITS_DIR_NAME).join("corcom.json"),
            "{ not json",
        );
        let source = FileFactionSource::new(dir.path());

        let missing = source.fetch_unit(&CacheKey::new("cor", "corak")).await;
        assert!(matches!(missing, Err(ResolveError::NotFound { .. })));

        let malformed = source.fetch_unit(&CacheKey::new("cor", "corcom")).await;
        assert!(matches!(malformed, Err(ResolveError::MalformedRecord { .. })));

        let faction = source.list_units("leg").await;
        assert!(matches!(faction, Err(ResolveError::FactionNotFound { .. })));
    }

    #[tokio::test]
    async fn file_source_never_reads_outside_data_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let data_dir = root.path().join("factions");
        std::fs::create_dir_all(&data_dir).expect("data dir should be created");
        write_json(
            &root.path().join(INDEX_FILE_NAME),
            r#"{"units":[]}"#,
        );
        write_json(
            &root.path().join(UNITS_DIR_NAME).join("secret.json"),
            r#"{"unit_id":"secret","faction_id":"x","name":"Secret","combat":{"health":1.0}}"#,
        );
        let source = FileFactionSource::new(&data_dir);

        assert!(matches!(
            source.list_units("..").await,
            Err(ResolveError::FactionNotFound { .. })
        ));
        assert!(matches!(
            source.fetch_unit(&CacheKey::new("..", "secret")).await,
            Err(ResolveError::FactionNotFound { .. })
        ));
        assert!(matches!(
            source.fetch_unit(&CacheKey::new("arm", "../../units/secret")).await,
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            source
                .fetch_unit(&CacheKey::new("arm", "armcom").with_version("../x"))
                .await,
            Err(ResolveError::NotFound { .. })
        ));
        assert!(source.unit_path(&CacheKey::new("arm", "a/b")).is_err());
        assert!(source.unit_path(&CacheKey::new("arm", "armcom")).is_ok());
    }
}
