use crate::MatchError;
use std::path::PathBuf;
use url::Url;

/// Startup settings for every collaborator the pipeline talks to.
#[derive(Debug, Clone)]
pub struct Settings {
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub opensearch_url: String,
    pub profile_index: String,
    pub job_index: String,
    /// OpenAI-compatible embedding endpoint; the offline n-gram embedder is used when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    /// OCR service endpoint; scanned PDFs and images cannot be read when unset.
    pub ocr_endpoint: Option<String>,
    pub ocr_api_key: Option<String>,
    pub ocr_language: String,
    pub pdftoppm_path: PathBuf,
    pub tika_url: Option<String>,
    pub skill_dict_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "resumes".to_string(),
            opensearch_url: "http://localhost:9200".to_string(),
            profile_index: "candidate_profiles".to_string(),
            job_index: "job_descriptions".to_string(),
            embedding_url: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_api_key: None,
            ocr_endpoint: None,
            ocr_api_key: None,
            ocr_language: "en".to_string(),
            pdftoppm_path: PathBuf::from("pdftoppm"),
            tika_url: None,
            skill_dict_path: None,
        }
    }
}

fn check_endpoint(name: &str, value: &str) -> Result<(), MatchError> {
    let parsed = Url::parse(value)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(MatchError::Config(format!(
            "{name} must be an http(s) url, got scheme {scheme:?}"
        ))),
    }
}

fn check_name(name: &str, value: &str) -> Result<(), MatchError> {
    if value.trim().is_empty() {
        return Err(MatchError::Config(format!("{name} must not be empty")));
    }
    Ok(())
}

impl Settings {
    pub fn validate(&self) -> Result<(), MatchError> {
        check_endpoint("qdrant url", &self.qdrant_url)?;
        check_endpoint("opensearch url", &self.opensearch_url)?;
        for (name, value) in [
            ("embedding url", &self.embedding_url),
            ("ocr endpoint", &self.ocr_endpoint),
            ("tika url", &self.tika_url),
        ] {
            if let Some(value) = value {
                check_endpoint(name, value)?;
            }
        }

        check_name("qdrant collection", &self.qdrant_collection)?;
        check_name("profile index", &self.profile_index)?;
        check_name("job index", &self.job_index)?;
        check_name("embedding model", &self.embedding_model)?;
        check_name("ocr language", &self.ocr_language)?;
        Ok(())
    }
}
