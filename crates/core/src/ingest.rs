use crate::models::IngestReceipt;
use crate::pipeline::ResumeMatcher;
use crate::MatchError;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const RESUME_EXTENSIONS: [&str; 8] = ["pdf", "docx", "png", "jpg", "jpeg", "tiff", "bmp", "txt"];

fn has_resume_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            RESUME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Résumé files under `folder`, recursively, in path order.
pub fn discover_resume_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_resume_extension(path))
        .collect();

    files.sort_unstable();
    files
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub ingested: Vec<(PathBuf, IngestReceipt)>,
    pub skipped: Vec<SkippedDocument>,
}

async fn ingest_file(matcher: &ResumeMatcher, path: &Path) -> Result<IngestReceipt, MatchError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|error| MatchError::InvalidInput(format!("{}: {error}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string);
    matcher.ingest_resume(bytes, filename).await
}

/// Ingests every résumé under `folder`. Files that cannot be read or profiled
/// are reported as skipped; a collaborator outage aborts the run.
pub async fn ingest_folder_best_effort(
    matcher: &ResumeMatcher,
    folder: &Path,
) -> Result<IngestionReport, MatchError> {
    let files = discover_resume_files(folder);
    if files.is_empty() {
        return Err(MatchError::InvalidInput(format!(
            "no résumé files found in {}",
            folder.display()
        )));
    }

    let mut report = IngestionReport::default();
    for path in files {
        match ingest_file(matcher, &path).await {
            Ok(receipt) => report.ingested.push((path, receipt)),
            Err(error) if error.is_dependency_failure() => return Err(error),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping résumé");
                report.skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}
