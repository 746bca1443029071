use crate::models::{PointPayload, VectorHit};
use crate::traits::VectorIndex;
use crate::MatchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

const BACKEND: &str = "qdrant";

/// Candidate vectors in a Qdrant collection, addressed by candidate UUID.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    async fn create_collection(&self, dimensions: usize) -> Result<(), MatchError> {
        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": dimensions,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("collection setup failed with {}", response.status()),
            ));
        }

        info!(collection = %self.collection, dimensions, "created vector collection");
        Ok(())
    }
}

/// Vector size of an existing collection, from `GET /collections/{name}`.
fn configured_size(collection_info: &Value) -> Option<u64> {
    let vectors = collection_info.pointer("/result/config/params/vectors")?;
    vectors
        .pointer("/size")
        .and_then(Value::as_u64)
        .or_else(|| {
            // Named vectors: a single entry is all this index ever creates.
            vectors
                .as_object()?
                .values()
                .find_map(|named| named.pointer("/size").and_then(Value::as_u64))
        })
}

fn parse_hits(response: &Value) -> Vec<VectorHit> {
    let hits = response
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::with_capacity(hits.len());
    for hit in hits {
        let point_id = match hit.pointer("/id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => continue,
        };
        let candidate_id = hit
            .pointer("/payload/candidate_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| point_id.clone());
        let Some(score) = hit.pointer("/score").and_then(Value::as_f64) else {
            continue;
        };

        result.push(VectorHit {
            point_id,
            candidate_id,
            score,
        });
    }
    result
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), MatchError> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return self.create_collection(dimensions).await;
        }
        if !response.status().is_success() {
            return Err(MatchError::unavailable(BACKEND, response.status()));
        }

        let info: Value = response
            .json()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;
        match configured_size(&info) {
            Some(size) if size as usize != dimensions => Err(MatchError::unavailable(
                BACKEND,
                format!(
                    "collection {} holds {size}-dimensional vectors, embedder produces {dimensions}",
                    self.collection
                ),
            )),
            _ => Ok(()),
        }
    }

    async fn upsert(
        &self,
        point_id: &str,
        vector: &[f32],
        payload: &PointPayload,
    ) -> Result<(), MatchError> {
        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({
                "points": [{
                    "id": point_id,
                    "vector": vector,
                    "payload": payload,
                }]
            }))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("upsert of {point_id} returned {}", response.status()),
            ));
        }

        debug!(point_id, dimensions = vector.len(), "upserted candidate vector");
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>, MatchError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;

        if !response.status().is_success() {
            return Err(MatchError::unavailable(
                BACKEND,
                format!("search returned {}", response.status()),
            ));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|error| MatchError::unavailable(BACKEND, error))?;
        Ok(parse_hits(&parsed))
    }
}
