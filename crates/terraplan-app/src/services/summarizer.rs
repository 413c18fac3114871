//! Chunk analysis and aggregation summarisation stages.
//!
//! Per-chunk completion failures are tolerated and logged; the aggregate and
//! narrative completions are not. Output files are only written after their
//! completion call succeeded, so a failed stage never leaves partial
//! artifacts.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use csv::StringRecord;
use thiserror::Error;
use tracing::{info, warn};

use crate::paths::{AppPaths, PathError};
use crate::pdf::TextExtractor;
use crate::pipeline::analysis::{ANALYSIS_SLOTS, AnalysisResult, parse_structured_summary};
use crate::pipeline::chunker::{TokenCounter, split_into_chunks};
use crate::pipeline::prompts;
use crate::services::completion::{CompletionClient, CompletionError};

/// UTF-8 byte-order mark; downstream spreadsheet tooling expects it.
const UTF8_BOM: &str = "\u{feff}";
/// Narrative mode bounds its request to this many leading chunks.
const NARRATIVE_CHUNK_CAP: usize = 50;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("zoning plan not found at {path}")]
    PlanMissing { path: PathBuf },
    #[error("no text could be extracted from {path}")]
    Extraction { path: PathBuf },
    #[error("document produced no chunks")]
    NoChunks,
    #[error("every chunk analysis failed; nothing to summarize")]
    EmptyAggregate,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("failed to read master CSV {path}: {source}")]
    MasterCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("master CSV has no `{name}` column")]
    MissingColumn { name: String },
    #[error("municipality `{city}` not found in master CSV")]
    CityRowNotFound { city: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Paths(#[from] PathError),
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub chunk_model: String,
    pub summary_model: String,
    pub chunk_token_limit: usize,
}

/// Runs the chunk-analysis and summarisation stages for one municipality.
pub struct Summarizer {
    paths: AppPaths,
    extractor: Arc<dyn TextExtractor>,
    completions: Arc<dyn CompletionClient>,
    counter: Arc<dyn TokenCounter>,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(
        paths: AppPaths,
        extractor: Arc<dyn TextExtractor>,
        completions: Arc<dyn CompletionClient>,
        counter: Arc<dyn TokenCounter>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            paths,
            extractor,
            completions,
            counter,
            config,
        }
    }

    /// Structured mode: analyze every chunk, fold the aggregate into the fixed
    /// 5+5 result, and write it into the master CSV plus the per-city enriched
    /// CSV.
    pub async fn analyze_issues_and_trends(
        &self,
        city: &str,
    ) -> Result<AnalysisResult, SummarizeError> {
        let chunks = self.load_chunks(city)?;
        let aggregate = self.analyze_chunks(&chunks).await;
        if aggregate.is_empty() {
            return Err(SummarizeError::EmptyAggregate);
        }

        let prompt = prompts::with_excerpt(prompts::ANALYSIS_PROMPT, &aggregate);
        let summary = self
            .completions
            .complete(&self.config.summary_model, &prompt)
            .await?;

        let (problems, trends) = parse_structured_summary(&summary);
        let result = AnalysisResult::from_lists(problems, trends);

        self.write_enriched_rows(city, &result)?;
        info!(%city, "issues and trends analysis stored");
        Ok(result)
    }

    /// Narrative mode: one completion over the first chunks, written verbatim
    /// under a fixed header naming the municipality.
    pub async fn generate_summary(&self, city: &str) -> Result<PathBuf, SummarizeError> {
        let chunks = self.load_chunks(city)?;
        let input = chunks
            .iter()
            .take(NARRATIVE_CHUNK_CAP)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = prompts::with_excerpt(prompts::SUMMARY_PROMPT, &input);
        let summary = self
            .completions
            .complete(&self.config.summary_model, &prompt)
            .await?;

        let path = self.paths.summary_txt(city)?;
        let content = format!("Specifické shrnutí pro obec {city}\n\n{summary}");
        fs::write(&path, content).map_err(|source| SummarizeError::Write {
            path: path.clone(),
            source,
        })?;

        info!(%city, path = %path.display(), "narrative summary stored");
        Ok(path)
    }

    fn load_chunks(&self, city: &str) -> Result<Vec<String>, SummarizeError> {
        let plan_path = self.paths.plan_pdf(city)?;
        if !plan_path.exists() {
            return Err(SummarizeError::PlanMissing { path: plan_path });
        }

        let text = match self.extractor.extract(&plan_path) {
            Ok(text) => text,
            Err(err) => {
                warn!(%city, %err, "text extraction failed");
                String::new()
            }
        };
        if text.trim().is_empty() {
            return Err(SummarizeError::Extraction { path: plan_path });
        }

        let chunks = split_into_chunks(&text, self.config.chunk_token_limit, &*self.counter);
        if chunks.is_empty() {
            return Err(SummarizeError::NoChunks);
        }
        Ok(chunks)
    }

    /// One completion per chunk, issued in order. A failed call is logged and
    /// contributes nothing; survivors are joined with blank lines.
    async fn analyze_chunks(&self, chunks: &[String]) -> String {
        let mut responses = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let prompt = prompts::with_excerpt(prompts::CHUNK_PROMPT, chunk);
            match self
                .completions
                .complete(&self.config.chunk_model, &prompt)
                .await
            {
                Ok(response) if !response.is_empty() => responses.push(response),
                Ok(_) => {}
                Err(err) => {
                    warn!(chunk = index, %err, "chunk analysis call failed; skipping chunk");
                }
            }
        }

        responses.join("\n\n")
    }

    /// Write the ten analysis columns back into the master CSV and emit the
    /// single-row enriched CSV for the city.
    fn write_enriched_rows(&self, city: &str, result: &AnalysisResult) -> Result<(), SummarizeError> {
        let master_path = self.paths.master_csv();
        let mut reader =
            csv::Reader::from_path(&master_path).map_err(|source| SummarizeError::MasterCsv {
                path: master_path.clone(),
                source,
            })?;

        let headers = reader
            .headers()
            .map_err(|source| SummarizeError::MasterCsv {
                path: master_path.clone(),
                source,
            })?
            .clone();
        let obec_idx = headers
            .iter()
            .position(|h| header_is(h, "obec"))
            .ok_or_else(|| SummarizeError::MissingColumn {
                name: "obec".to_owned(),
            })?;

        let mut rows: Vec<StringRecord> = Vec::new();
        for record in reader.records() {
            rows.push(record.map_err(|source| SummarizeError::MasterCsv {
                path: master_path.clone(),
                source,
            })?);
        }

        let wanted = city.to_lowercase();
        let city_row = rows
            .iter_mut()
            .find(|row| {
                row.get(obec_idx)
                    .is_some_and(|name| name.to_lowercase() == wanted)
            })
            .ok_or_else(|| SummarizeError::CityRowNotFound {
                city: city.to_owned(),
            })?;

        let mut cells: Vec<String> = city_row.iter().map(str::to_owned).collect();
        for slot in 0..ANALYSIS_SLOTS {
            set_cell(
                &headers,
                &mut cells,
                &format!("problem_{}", slot + 1),
                &result.problems()[slot],
            )?;
            set_cell(
                &headers,
                &mut cells,
                &format!("trend_{}", slot + 1),
                &result.trends()[slot],
            )?;
        }
        *city_row = StringRecord::from(cells);

        let enriched = city_row.clone();
        write_csv_with_bom(&master_path, &headers, &rows)?;

        let enriched_path = self.paths.enriched_csv(city)?;
        write_csv_with_bom(&enriched_path, &headers, std::slice::from_ref(&enriched))?;
        Ok(())
    }
}

fn set_cell(
    headers: &StringRecord,
    cells: &mut [String],
    column: &str,
    value: &str,
) -> Result<(), SummarizeError> {
    let index = headers
        .iter()
        .position(|h| header_is(h, column))
        .ok_or_else(|| SummarizeError::MissingColumn {
            name: column.to_owned(),
        })?;
    cells[index] = value.to_owned();
    Ok(())
}

fn write_csv_with_bom(
    path: &PathBuf,
    headers: &StringRecord,
    rows: &[StringRecord],
) -> Result<(), SummarizeError> {
    let mut file = fs::File::create(path).map_err(|source| SummarizeError::Write {
        path: path.clone(),
        source,
    })?;
    file.write_all(UTF8_BOM.as_bytes())
        .map_err(|source| SummarizeError::Write {
            path: path.clone(),
            source,
        })?;

    let mut writer = csv::Writer::from_writer(file);
    let written = (|| -> Result<(), csv::Error> {
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    })();
    written.map_err(|source| SummarizeError::CsvWrite {
        path: path.clone(),
        source,
    })
}

/// Header comparison tolerant of a leading byte-order mark on the first
/// column, which our own rewrites introduce.
fn header_is(header: &str, name: &str) -> bool {
    header.trim_start_matches('\u{feff}') == name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::pdf::PdfTextError;
    use crate::services::completion::CompletionError;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    struct FixedExtractor(String);

    impl TextExtractor for FixedExtractor {
        fn extract(&self, _path: &Path) -> Result<String, PdfTextError> {
            Ok(self.0.clone())
        }
    }

    /// Replays canned responses per model and records every prompt it saw.
    struct ScriptedCompletions {
        chunk_reply: Result<String, ()>,
        summary_reply: Result<String, ()>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletions {
        async fn complete(
            &self,
            model: &str,
            _user_prompt: &str,
        ) -> Result<String, CompletionError> {
            self.calls.lock().expect("lock").push(model.to_owned());
            let reply = if model == "summary-model" {
                &self.summary_reply
            } else {
                &self.chunk_reply
            };
            reply
                .clone()
                .map_err(|()| CompletionError::EmptyResponse)
        }
    }

    fn summarizer(
        temp: &TempDir,
        extractor: FixedExtractor,
        completions: Arc<ScriptedCompletions>,
    ) -> Summarizer {
        let paths = AppPaths::new(temp.path()).expect("paths");
        Summarizer::new(
            paths,
            Arc::new(extractor),
            completions,
            Arc::new(WordCounter),
            SummarizerConfig {
                chunk_model: "chunk-model".to_owned(),
                summary_model: "summary-model".to_owned(),
                chunk_token_limit: 5,
            },
        )
    }

    fn seed_city_files(temp: &TempDir, city: &str) {
        let paths = AppPaths::new(temp.path()).expect("paths");
        fs::write(paths.plan_pdf(city).expect("plan path"), b"%PDF-stub").expect("plan");

        let master = paths.master_csv();
        fs::create_dir_all(master.parent().expect("parent")).expect("mkdir");
        let mut header = vec!["obec".to_owned()];
        for i in 1..=5 {
            header.push(format!("problem_{i}"));
            header.push(format!("trend_{i}"));
        }
        let blank = vec![""; 10].join(",");
        fs::write(
            &master,
            format!("{}\nDubno,{}\nOstrov,{}\n", header.join(","), blank, blank),
        )
        .expect("master csv");
    }

    #[tokio::test]
    async fn structured_mode_writes_master_and_enriched_csv() {
        let temp = TempDir::new().expect("temp dir");
        seed_city_files(&temp, "Dubno");

        let completions = Arc::new(ScriptedCompletions {
            chunk_reply: Ok("- dílčí problém".to_owned()),
            summary_reply: Ok(
                "Hlavní problémy:\n- chybí kanalizace\nHlavní trendy:\n- rozvoj bydlení".to_owned(),
            ),
            calls: Mutex::new(Vec::new()),
        });
        let s = summarizer(
            &temp,
            FixedExtractor("slovo ".repeat(12)),
            Arc::clone(&completions),
        );

        let result = s.analyze_issues_and_trends("Dubno").await.expect("analysis");
        assert_eq!(result.problems()[0], "chybí kanalizace");
        assert_eq!(result.trends()[0], "rozvoj bydlení");
        assert_eq!(result.problems()[4], "");

        let paths = AppPaths::new(temp.path()).expect("paths");
        let enriched =
            fs::read_to_string(paths.enriched_csv("Dubno").expect("path")).expect("enriched");
        assert!(enriched.starts_with(UTF8_BOM));
        assert!(enriched.contains("chybí kanalizace"));

        let master = fs::read_to_string(paths.master_csv()).expect("master");
        assert!(master.contains("rozvoj bydlení"));
        assert!(master.contains("Ostrov"));
    }

    #[tokio::test]
    async fn all_chunk_failures_abort_before_the_summary_call() {
        let temp = TempDir::new().expect("temp dir");
        seed_city_files(&temp, "Dubno");

        let completions = Arc::new(ScriptedCompletions {
            chunk_reply: Err(()),
            summary_reply: Ok("unused".to_owned()),
            calls: Mutex::new(Vec::new()),
        });
        let s = summarizer(
            &temp,
            FixedExtractor("slovo ".repeat(12)),
            Arc::clone(&completions),
        );

        let err = s
            .analyze_issues_and_trends("Dubno")
            .await
            .expect_err("aggregate is empty");
        assert!(matches!(err, SummarizeError::EmptyAggregate));

        let calls = completions.calls.lock().expect("lock");
        assert!(
            calls.iter().all(|model| model == "chunk-model"),
            "summary model must not be called on an empty aggregate: {calls:?}"
        );
    }

    #[tokio::test]
    async fn empty_document_is_an_extraction_failure() {
        let temp = TempDir::new().expect("temp dir");
        seed_city_files(&temp, "Dubno");

        let completions = Arc::new(ScriptedCompletions {
            chunk_reply: Ok("x".to_owned()),
            summary_reply: Ok("x".to_owned()),
            calls: Mutex::new(Vec::new()),
        });
        let s = summarizer(&temp, FixedExtractor(String::new()), Arc::clone(&completions));

        let err = s
            .analyze_issues_and_trends("Dubno")
            .await
            .expect_err("no text");
        assert!(matches!(err, SummarizeError::Extraction { .. }));
        assert!(completions.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn missing_plan_is_reported_before_any_call() {
        let temp = TempDir::new().expect("temp dir");
        let completions = Arc::new(ScriptedCompletions {
            chunk_reply: Ok("x".to_owned()),
            summary_reply: Ok("x".to_owned()),
            calls: Mutex::new(Vec::new()),
        });
        let s = summarizer(&temp, FixedExtractor("text".to_owned()), Arc::clone(&completions));

        let err = s.generate_summary("Dubno").await.expect_err("no plan");
        assert!(matches!(err, SummarizeError::PlanMissing { .. }));
    }

    #[tokio::test]
    async fn narrative_mode_writes_header_and_verbatim_summary() {
        let temp = TempDir::new().expect("temp dir");
        seed_city_files(&temp, "Dubno");

        let completions = Arc::new(ScriptedCompletions {
            chunk_reply: Ok("unused".to_owned()),
            summary_reply: Ok("Obec leží v údolí a plánuje rozvoj bydlení.".to_owned()),
            calls: Mutex::new(Vec::new()),
        });
        let s = summarizer(
            &temp,
            FixedExtractor("slovo ".repeat(12)),
            Arc::clone(&completions),
        );

        let path = s.generate_summary("Dubno").await.expect("summary written");
        let content = fs::read_to_string(path).expect("file");
        assert!(content.starts_with("Specifické shrnutí pro obec Dubno\n\n"));
        assert!(content.ends_with("rozvoj bydlení."));
    }
}
