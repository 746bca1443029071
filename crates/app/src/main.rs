use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use resume_match_core::{
    ingest_folder_best_effort, MatchRequest, MatchWeights, ResumeMatcher, Settings,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "resume-match", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection holding candidate vectors
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "resumes")]
    qdrant_collection: String,

    /// OpenSearch base URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,

    /// OpenSearch index for candidate profiles
    #[arg(long, env = "PROFILE_INDEX", default_value = "candidate_profiles")]
    profile_index: String,

    /// OpenSearch index for job descriptions
    #[arg(long, env = "JOB_INDEX", default_value = "job_descriptions")]
    job_index: String,

    /// OpenAI-compatible embedding endpoint. Offline n-gram vectors when unset.
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "all-MiniLM-L6-v2")]
    embedding_model: String,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// OCR service endpoint for scanned PDFs and images
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// OCR language hint
    #[arg(long, env = "OCR_LANG", default_value = "en")]
    ocr_lang: String,

    /// pdftoppm binary used to rasterize scanned pages
    #[arg(long, env = "PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// Apache Tika server for formats without a dedicated extractor
    #[arg(long, env = "TIKA_URL")]
    tika_url: Option<String>,

    /// JSON array of skill names; the built-in set is used when unset or unreadable
    #[arg(long, env = "SKILL_DICT_PATH")]
    skill_dict_path: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            qdrant_url: self.qdrant_url.clone(),
            qdrant_collection: self.qdrant_collection.clone(),
            opensearch_url: self.opensearch_url.clone(),
            profile_index: self.profile_index.clone(),
            job_index: self.job_index.clone(),
            embedding_url: self.embedding_url.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_api_key: self.embedding_api_key.clone(),
            ocr_endpoint: self.ocr_endpoint.clone(),
            ocr_api_key: self.ocr_api_key.clone(),
            ocr_language: self.ocr_lang.clone(),
            pdftoppm_path: self.pdftoppm.clone(),
            tika_url: self.tika_url.clone(),
            skill_dict_path: self.skill_dict_path.clone(),
        }
    }
}

/// Job description given inline or read from a file.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct JobText {
    /// Job description text
    #[arg(long)]
    text: Option<String>,

    /// File holding the job description
    #[arg(long)]
    file: Option<PathBuf>,
}

impl JobText {
    async fn read(self) -> anyhow::Result<String> {
        match (self.text, self.file) {
            (Some(text), _) => Ok(text),
            (None, Some(path)) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading job description {}", path.display())),
            (None, None) => anyhow::bail!("either --text or --file is required"),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a résumé file, or every résumé under a folder.
    Ingest {
        /// File or folder to ingest.
        path: PathBuf,
    },
    /// Print a stored candidate profile as JSON.
    Profile {
        candidate_id: String,
    },
    /// Register a job description.
    Jd {
        #[command(flatten)]
        job: JobText,
    },
    /// Rank stored candidates against a job description.
    Match {
        #[command(flatten)]
        job: JobText,
        /// Number of candidates to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
        #[arg(long, default_value_t = MatchWeights::default().skill)]
        skill_weight: f64,
        #[arg(long, default_value_t = MatchWeights::default().experience)]
        experience_weight: f64,
        #[arg(long, default_value_t = MatchWeights::default().embedding)]
        embedding_weight: f64,
    },
    /// Recompute a stored profile's embedding with the configured model.
    Reembed {
        candidate_id: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn ingest(matcher: &ResumeMatcher, path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        let report = ingest_folder_best_effort(matcher, path).await?;
        for skipped in &report.skipped {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped résumé");
        }
        info!(
            folder = %path.display(),
            ingested = report.ingested.len(),
            skipped = report.skipped.len(),
            "folder ingestion finished"
        );

        let ingested: Vec<_> = report
            .ingested
            .iter()
            .map(|(path, receipt)| {
                json!({
                    "path": path.display().to_string(),
                    "candidate_id": receipt.candidate_id,
                    "point_id": receipt.point_id,
                })
            })
            .collect();
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|skipped| json!({ "path": skipped.path.display().to_string(), "reason": skipped.reason }))
            .collect();
        return print_json(&json!({ "ingested": ingested, "skipped": skipped }));
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string);
    let receipt = matcher.ingest_resume(bytes, filename).await?;
    print_json(&receipt)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    settings.validate().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "resume-match boot"
    );
    let matcher = ResumeMatcher::connect(&settings)
        .await
        .context("connecting to backing services")?;

    match cli.command {
        Command::Ingest { path } => ingest(&matcher, &path).await?,
        Command::Profile { candidate_id } => {
            print_json(&matcher.get_profile(&candidate_id).await?)?;
        }
        Command::Jd { job } => {
            let text = job.read().await?;
            print_json(&matcher.submit_job_description(&text).await?)?;
        }
        Command::Match {
            job,
            top_k,
            skill_weight,
            experience_weight,
            embedding_weight,
        } => {
            let request = MatchRequest {
                jd_text: job.read().await?,
                top_k,
                weights: MatchWeights {
                    skill: skill_weight,
                    experience: experience_weight,
                    embedding: embedding_weight,
                },
            };
            print_json(&matcher.run_match(&request).await?)?;
        }
        Command::Reembed { candidate_id } => {
            print_json(&matcher.reembed_profile(&candidate_id).await?)?;
        }
    }

    Ok(())
}
