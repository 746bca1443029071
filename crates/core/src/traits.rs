use crate::models::{CandidateProfile, JobDescription, PointPayload, ProfileUpdate, VectorHit};
use crate::MatchError;
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection for `dimensions`-wide vectors if it is missing.
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), MatchError>;

    async fn upsert(
        &self,
        point_id: &str,
        vector: &[f32],
        payload: &PointPayload,
    ) -> Result<(), MatchError>;

    /// Nearest neighbours, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>, MatchError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn insert_profile(&self, profile: &CandidateProfile) -> Result<String, MatchError>;

    async fn get_profile(&self, candidate_id: &str)
        -> Result<Option<CandidateProfile>, MatchError>;

    async fn update_profile(
        &self,
        candidate_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), MatchError>;

    async fn insert_job(&self, job: &JobDescription) -> Result<String, MatchError>;
}
