use crate::models::{CandidateProfile, JobDescription, ProfileUpdate};
use crate::traits::ProfileStore;
use crate::MatchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

const BACKEND: &str = "opensearch";

/// Candidate profiles and job descriptions as OpenSearch documents keyed by id.
pub struct OpenSearchProfileStore {
    client: Arc<Client>,
    endpoint: String,
    profile_index: String,
    job_index: String,
}

impl OpenSearchProfileStore {
    pub fn new(
        endpoint: impl Into<String>,
        profile_index: impl Into<String>,
        job_index: impl Into<String>,
    ) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            profile_index: profile_index.into(),
            job_index: job_index.into(),
        }
    }

    pub async fn ensure_indices(&self) -> Result<(), MatchError> {
        self.ensure_index(&self.profile_index, profile_mappings()).await?;
        self.ensure_index(&self.job_index, job_mappings()).await
    }

    async fn ensure_index(&self, index: &str, mappings: Value) -> Result<(), MatchError> {
        let response = self
            .client
            .head(format!("{}/{}", self.endpoint, index))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if !response.status().is_client_error() {
            return Err(MatchError::unavailable(BACKEND, response.status()));
        }

        let response = self
            .client
            .put(format!("{}/{}", self.endpoint, index))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": mappings
            }))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("index setup for {index} failed with {}", response.status()),
            ));
        }

        info!(index, "created document index");
        Ok(())
    }

    async fn create_document<T: Serialize + Sync>(
        &self,
        index: &str,
        id: &str,
        document: &T,
    ) -> Result<String, MatchError> {
        let response = self
            .client
            .put(format!(
                "{}/{}/_create/{}?refresh=wait_for",
                self.endpoint, index, id
            ))
            .json(document)
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("create {index}/{id} returned {}", response.status()),
            ));
        }

        debug!(index, id, "stored document");
        Ok(id.to_string())
    }
}

fn profile_mappings() -> Value {
    json!({
        "properties": {
            "candidate_id": {"type": "keyword"},
            "raw_text": {"type": "text"},
            "normalized_text": {"type": "text"},
            "sections": {"type": "object", "enabled": false},
            "skills": {"type": "keyword"},
            "experience_years": {"type": "float"},
            "embedding": {"type": "float", "index": false},
            "point_id": {"type": "keyword"},
            "mime": {"type": "keyword"},
            "filename": {"type": "keyword"},
            "checksum": {"type": "keyword"},
            "ingested_at": {"type": "date"}
        }
    })
}

fn job_mappings() -> Value {
    json!({
        "properties": {
            "jd_id": {"type": "keyword"},
            "raw_text": {"type": "text"},
            "skills": {"type": "keyword"},
            "min_experience": {"type": "float"},
            "seniority": {"type": "keyword"},
            "embedding": {"type": "float", "index": false},
            "created_at": {"type": "date"}
        }
    })
}

/// The `_source` of a `GET /{index}/_doc/{id}` reply, if the document exists.
fn found_source(reply: Value) -> Option<Value> {
    if reply.pointer("/found").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    reply.get("_source").cloned()
}

#[async_trait]
impl ProfileStore for OpenSearchProfileStore {
    async fn insert_profile(&self, profile: &CandidateProfile) -> Result<String, MatchError> {
        self.create_document(&self.profile_index, &profile.candidate_id, profile)
            .await
    }

    async fn get_profile(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CandidateProfile>, MatchError> {
        let response = self
            .client
            .get(format!(
                "{}/{}/_doc/{}",
                self.endpoint, self.profile_index, candidate_id
            ))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MatchError::unavailable(BACKEND, response.status()));
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;
        match found_source(reply) {
            Some(source) => Ok(Some(serde_json::from_value(source)?)),
            None => Ok(None),
        }
    }

    async fn update_profile(
        &self,
        candidate_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), MatchError> {
        if update.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(format!(
                "{}/{}/_update/{}?refresh=wait_for",
                self.endpoint, self.profile_index, candidate_id
            ))
            .json(&json!({ "doc": update }))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MatchError::NotFound(format!("candidate {candidate_id}")));
        }
        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("update of {candidate_id} returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn insert_job(&self, job: &JobDescription) -> Result<String, MatchError> {
        self.create_document(&self.job_index, &job.jd_id, job).await
    }
}
