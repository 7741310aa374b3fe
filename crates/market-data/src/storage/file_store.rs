//! Directory-backed sink and source.
//!
//! Layout:
//! - `{root}/raw/{provider}/{symbol}/{kind}_{interval}/{timestamp}.json`
//! - `{root}/collection_log.json`
//! - `{root}/processed/consolidated_{timestamp}.json`
//!
//! Every file is written to `.tmp` first and renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Sink, Source};
use crate::errors::MarketDataError;
use crate::models::{
    dedup_sorted, CollectionLogRecord, ConsolidatedEntry, Interval, SeriesKey, TimeSeries,
};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// File-per-write store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory skeleton and return the store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MarketDataError> {
        let store = Self::new(root);
        fs::create_dir_all(store.root.join("raw"))?;
        fs::create_dir_all(store.root.join("processed"))?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/raw/{provider}/{symbol}/{kind}_{interval}`
    fn series_dir(&self, key: &SeriesKey) -> PathBuf {
        self.root
            .join("raw")
            .join(sanitize(&key.provider))
            .join(sanitize(&key.symbol))
            .join(sanitize(&format!("{}_{}", key.kind, key.interval)))
    }

    fn log_path(&self) -> PathBuf {
        self.root.join("collection_log.json")
    }

    /// Stored files for `key`, oldest first.
    fn series_files(&self, key: &SeriesKey) -> Result<Vec<PathBuf>, MarketDataError> {
        let dir = self.series_dir(key);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Keep a path component inside its parent directory.
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// A path under `dir` named `{stem}.json` that does not exist yet.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.json"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.json"));
        n += 1;
    }
    path
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), MarketDataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| MarketDataError::Storage(format!("serialize {}: {e}", path.display())))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        error!("Atomic rename to {} failed: {}", path.display(), e);
        MarketDataError::Io(e)
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MarketDataError> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw)
        .map_err(|e| MarketDataError::Storage(format!("parse {}: {e}", path.display())))
}

impl Sink for FileStore {
    fn write(
        &self,
        provider: &str,
        symbol: &str,
        interval: &Interval,
        series: &TimeSeries,
    ) -> Result<String, MarketDataError> {
        let key = SeriesKey {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
            kind: series.kind,
            interval: interval.clone(),
        };
        let dir = self.series_dir(&key);
        fs::create_dir_all(&dir)?;

        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let path = unique_path(&dir, &stamp);
        write_json_atomic(&path, series)?;

        debug!("Wrote {} rows to {}", series.len(), path.display());
        Ok(path.display().to_string())
    }

    fn write_collection_log(&self, records: &[CollectionLogRecord]) -> Result<String, MarketDataError> {
        let path = self.log_path();
        write_json_atomic(&path, records)?;
        Ok(path.display().to_string())
    }

    fn write_consolidated(&self, entries: &[ConsolidatedEntry]) -> Result<String, MarketDataError> {
        let dir = self.root.join("processed");
        fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let path = unique_path(&dir, &format!("consolidated_{stamp}"));
        write_json_atomic(&path, entries)?;
        Ok(path.display().to_string())
    }
}

impl Source for FileStore {
    fn load_series(&self, key: &SeriesKey, latest_only: bool) -> Result<TimeSeries, MarketDataError> {
        let files = self.series_files(key)?;
        let empty = || TimeSeries::empty(&key.provider, &key.symbol, key.interval.clone(), key.kind);

        if latest_only {
            return match files.last() {
                Some(path) => {
                    let stored: TimeSeries = read_json(path)?;
                    Ok(TimeSeries::from_rows(
                        &key.provider,
                        &key.symbol,
                        key.interval.clone(),
                        key.kind,
                        stored.into_candles(),
                    ))
                }
                None => Ok(empty()),
            };
        }

        // Newest first so the latest observation of a row survives the dedup.
        let mut rows = Vec::new();
        for path in files.iter().rev() {
            let stored: TimeSeries = read_json(path)?;
            rows.extend(stored.into_candles());
        }
        Ok(TimeSeries::from_rows(
            &key.provider,
            &key.symbol,
            key.interval.clone(),
            key.kind,
            dedup_sorted(rows),
        ))
    }

    fn load_collection_log(&self) -> Result<Vec<CollectionLogRecord>, MarketDataError> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }
}
