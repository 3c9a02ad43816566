//! Run catalog lookups
//!
//! Resolves a run number to where its raw data lives. Submissions look up
//! every run before anything is recorded.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Could not find run {run} for {instrument} in the data archive")]
    RunNotFound { instrument: String, run: i64 },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Location of a run's raw data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub path: PathBuf,
}

#[async_trait]
pub trait RunCatalog: Send + Sync {
    async fn lookup(&self, instrument: &str, run: i64) -> Result<DataLocation, CatalogError>;
}

/// Catalog backed by the instrument data archive directory layout
///
/// `<root>/NDX<INSTRUMENT>/Instrument/data/<INSTRUMENT><run:08>.nxs`
#[derive(Debug, Clone)]
pub struct ArchiveCatalog {
    root: PathBuf,
    verify_files: bool,
}

impl ArchiveCatalog {
    /// With `verify_files`, runs whose data file is absent are not found
    pub fn new(root: impl Into<PathBuf>, verify_files: bool) -> Self {
        Self {
            root: root.into(),
            verify_files,
        }
    }

    /// Archive path for a run, whether or not it exists
    pub fn data_path(&self, instrument: &str, run: i64) -> PathBuf {
        let instrument = instrument.to_ascii_uppercase();
        self.root
            .join(format!("NDX{}", instrument))
            .join("Instrument")
            .join("data")
            .join(format!("{}{:08}.nxs", instrument, run))
    }
}

#[async_trait]
impl RunCatalog for ArchiveCatalog {
    async fn lookup(&self, instrument: &str, run: i64) -> Result<DataLocation, CatalogError> {
        let path = self.data_path(instrument, run);

        if self.verify_files {
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| CatalogError::Unavailable(e.to_string()))?;
            if !exists {
                return Err(CatalogError::RunNotFound {
                    instrument: instrument.to_ascii_uppercase(),
                    run,
                });
            }
        }

        Ok(DataLocation { path })
    }
}
