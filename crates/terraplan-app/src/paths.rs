//! Filesystem path helpers for per-municipality artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const PLAN_FILE: &str = "plan.pdf";
const ENRICHED_FILE: &str = "municipality_enriched.csv";
const SUMMARY_FILE: &str = "specific_summary.txt";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid municipality name `{city}` (empty or contains path separators)")]
    InvalidCity { city: String },
}

/// Container providing filesystem paths for the application. In production this
/// is rooted at the configured storage directory; tests construct custom
/// instances over a temporary directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    /// Construct paths rooted under the provided directory, ensuring it exists.
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self, PathError> {
        let base = base.as_ref().to_path_buf();
        ensure_dir(&base)?;
        Ok(Self { base_dir: base })
    }

    /// Base data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// Master CSV with one row per municipality (`cleansed_data/municipalities.csv`).
    pub fn master_csv(&self) -> PathBuf {
        self.base_dir.join("cleansed_data").join("municipalities.csv")
    }

    /// CSV mapping municipality names to zoning-plan URLs.
    pub fn links_csv(&self) -> PathBuf {
        self.base_dir
            .join("cleansed_data")
            .join("municipalities_links.csv")
    }

    /// Root directory for per-municipality output folders.
    pub fn municipalities_dir(&self) -> PathBuf {
        self.base_dir.join("municipalities_data")
    }

    /// Output directory for a single municipality, created on demand.
    pub fn city_dir(&self, city: &str) -> Result<PathBuf, PathError> {
        let city = validate_city(city)?;
        ensure_dir(&self.municipalities_dir().join(city))
    }

    /// Downloaded zoning-plan document (`.../{city}/plan.pdf`).
    pub fn plan_pdf(&self, city: &str) -> Result<PathBuf, PathError> {
        Ok(self.city_dir(city)?.join(PLAN_FILE))
    }

    /// Single-row enriched CSV written by the structured analysis stage.
    pub fn enriched_csv(&self, city: &str) -> Result<PathBuf, PathError> {
        Ok(self.city_dir(city)?.join(ENRICHED_FILE))
    }

    /// Free-text narrative summary (`.../{city}/specific_summary.txt`).
    pub fn summary_txt(&self, city: &str) -> Result<PathBuf, PathError> {
        Ok(self.city_dir(city)?.join(SUMMARY_FILE))
    }

    /// Packaged archive path (`municipalities_data/{city}.zip`). Not created.
    pub fn zip_path(&self, city: &str) -> Result<PathBuf, PathError> {
        let city = validate_city(city)?;
        Ok(self.municipalities_dir().join(format!("{city}.zip")))
    }
}

fn validate_city(city: &str) -> Result<&str, PathError> {
    let trimmed = city.trim();
    if trimmed.is_empty()
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
        || trimmed.contains('\0')
    {
        return Err(PathError::InvalidCity {
            city: city.to_owned(),
        });
    }
    Ok(trimmed)
}

fn ensure_dir(path: &Path) -> Result<PathBuf, PathError> {
    if let Err(err) = fs::create_dir_all(path) {
        if err.kind() != io::ErrorKind::AlreadyExists {
            return Err(PathError::CreateDir {
                path: path.to_path_buf(),
                source: err,
            });
        }
    }
    Ok(path.to_path_buf())
}
