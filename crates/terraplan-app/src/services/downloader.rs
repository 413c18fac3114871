//! Zoning-plan document source: links CSV lookup plus HTTP fetch.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::paths::{AppPaths, PathError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to read links CSV {path}: {source}")]
    LinksCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("links CSV has no `{column}` column")]
    MissingColumn { column: &'static str },
    #[error("municipality `{city}` not found in links CSV")]
    CityNotFound { city: String },
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write plan to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Paths(#[from] PathError),
}

/// Collaborator resolving a municipality name to a local plan document.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<PathBuf, DownloadError>;
}

/// Production source: looks the city up in the links CSV (case-insensitive on
/// the `obec` column), downloads the plan URL, and stores it under the city
/// directory.
pub struct CsvLinkDownloader {
    paths: AppPaths,
    http: Client,
}

impl CsvLinkDownloader {
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            http: Client::new(),
        }
    }

    fn lookup_url(&self, city: &str) -> Result<String, DownloadError> {
        let links_path = self.paths.links_csv();
        let mut reader =
            csv::Reader::from_path(&links_path).map_err(|source| DownloadError::LinksCsv {
                path: links_path.clone(),
                source,
            })?;

        let headers = reader
            .headers()
            .map_err(|source| DownloadError::LinksCsv {
                path: links_path.clone(),
                source,
            })?
            .clone();
        let obec_idx = headers
            .iter()
            .position(|h| h == "obec")
            .ok_or(DownloadError::MissingColumn { column: "obec" })?;
        let url_idx = headers
            .iter()
            .position(|h| h == "url")
            .ok_or(DownloadError::MissingColumn { column: "url" })?;

        let wanted = city.to_lowercase();
        for record in reader.records() {
            let record = record.map_err(|source| DownloadError::LinksCsv {
                path: links_path.clone(),
                source,
            })?;
            if record
                .get(obec_idx)
                .is_some_and(|name| name.to_lowercase() == wanted)
            {
                // Scraped URLs occasionally arrive wrapped in braces.
                let url = record
                    .get(url_idx)
                    .unwrap_or("")
                    .trim()
                    .trim_matches(['{', '}']);
                return Ok(url.to_owned());
            }
        }

        Err(DownloadError::CityNotFound {
            city: city.to_owned(),
        })
    }
}

#[async_trait]
impl PlanSource for CsvLinkDownloader {
    async fn fetch(&self, city: &str) -> Result<PathBuf, DownloadError> {
        let url = self.lookup_url(city)?;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| DownloadError::Fetch {
                url: url.clone(),
                source,
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| DownloadError::Fetch {
                url: url.clone(),
                source,
            })?;

        let target = self.paths.plan_pdf(city)?;
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|source| DownloadError::Write {
                path: target.clone(),
                source,
            })?;

        info!(%city, path = %target.display(), "zoning plan downloaded");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn downloader_with_links(rows: &str) -> (TempDir, CsvLinkDownloader) {
        let temp = TempDir::new().expect("temp dir");
        let paths = AppPaths::new(temp.path()).expect("paths");
        let links = paths.links_csv();
        fs::create_dir_all(links.parent().expect("parent")).expect("mkdir");
        fs::write(&links, rows).expect("write links");
        (temp, CsvLinkDownloader::new(paths))
    }

    #[test]
    fn resolves_city_case_insensitively_and_strips_braces() {
        let (_temp, downloader) = downloader_with_links(
            "obec,url\nDubno,{https://example.cz/dubno.pdf}\nPříbram,https://example.cz/pribram.pdf\n",
        );

        let url = downloader.lookup_url("dubno").expect("url found");
        assert_eq!(url, "https://example.cz/dubno.pdf");
    }

    #[test]
    fn unknown_city_is_a_not_found_error() {
        let (_temp, downloader) =
            downloader_with_links("obec,url\nDubno,https://example.cz/dubno.pdf\n");

        let err = downloader.lookup_url("Unknown").expect_err("must fail");
        assert!(matches!(err, DownloadError::CityNotFound { .. }));
    }

    #[test]
    fn missing_links_file_is_reported() {
        let temp = TempDir::new().expect("temp dir");
        let paths = AppPaths::new(temp.path()).expect("paths");
        let downloader = CsvLinkDownloader::new(paths);

        let err = downloader.lookup_url("Dubno").expect_err("must fail");
        assert!(matches!(err, DownloadError::LinksCsv { .. }));
    }
}
