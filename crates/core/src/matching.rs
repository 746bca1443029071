use crate::models::{CandidateProfile, JobDescription, MatchResult, MatchWeights, VectorHit};
use crate::skills::display_case;
use crate::traits::{ProfileStore, VectorIndex};
use crate::MatchError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillOverlap {
    pub score: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

/// Fraction of required skills the candidate lists, compared case-insensitively.
/// Zero when nothing is required.
pub fn skill_overlap(required: &[String], candidate: &[String]) -> SkillOverlap {
    let required: BTreeSet<String> = required.iter().map(|skill| skill.to_lowercase()).collect();
    let candidate: BTreeSet<String> = candidate.iter().map(|skill| skill.to_lowercase()).collect();

    let matched: Vec<String> = required
        .intersection(&candidate)
        .map(|skill| display_case(skill))
        .collect();
    let missing: Vec<String> = required
        .difference(&candidate)
        .map(|skill| display_case(skill))
        .collect();

    let score = if required.is_empty() {
        0.0
    } else {
        matched.len() as f64 / required.len() as f64
    };

    SkillOverlap {
        score,
        matched: sorted(matched),
        missing: sorted(missing),
    }
}

fn sorted(mut skills: Vec<String>) -> Vec<String> {
    skills.sort();
    skills
}

pub fn experience_score(years: f64, min_years: f64) -> f64 {
    if min_years <= 0.0 {
        return 0.0;
    }
    (years / min_years).min(1.0)
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn score_candidate(
    job: &JobDescription,
    profile: &CandidateProfile,
    embedding_score: f64,
    weights: &MatchWeights,
    summary_chars: usize,
) -> MatchResult {
    let overlap = skill_overlap(&job.skills, &profile.skills);
    let experience = experience_score(profile.experience_years, job.min_experience);

    let total = weights.skill * overlap.score
        + weights.experience * experience
        + weights.embedding * embedding_score;

    MatchResult {
        candidate_id: profile.candidate_id.clone(),
        final_score: round4(total),
        embedding_score: round4(embedding_score),
        skill_score: round4(overlap.score),
        experience_score: round4(experience),
        matched_skills: overlap.matched,
        missing_skills: overlap.missing,
        experience_years: profile.experience_years,
        summary: excerpt(profile.summary(), summary_chars),
    }
}

/// Best final score first. Ties keep their incoming order.
pub fn rank(mut results: Vec<MatchResult>, top_k: usize) -> Vec<MatchResult> {
    results.sort_by(|left, right| right.final_score.total_cmp(&left.final_score));
    results.truncate(top_k);
    results
}

pub struct MatchEngine {
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ProfileStore>,
    overfetch_factor: usize,
    summary_chars: usize,
}

impl MatchEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ProfileStore>,
        overfetch_factor: usize,
        summary_chars: usize,
    ) -> Self {
        Self {
            index,
            store,
            overfetch_factor: overfetch_factor.max(1),
            summary_chars,
        }
    }

    async fn resolve(&self, hit: &VectorHit) -> Result<Option<CandidateProfile>, MatchError> {
        let profile = self.store.get_profile(&hit.candidate_id).await?;
        if profile.is_none() {
            debug!(
                point_id = %hit.point_id,
                candidate_id = %hit.candidate_id,
                "vector hit has no stored profile, dropping"
            );
        }
        Ok(profile)
    }

    pub async fn run(
        &self,
        job: &JobDescription,
        top_k: usize,
        weights: &MatchWeights,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let limit = top_k.saturating_mul(self.overfetch_factor);
        let hits = self.index.search(&job.embedding, limit).await?;
        debug!(hits = hits.len(), limit, "vector search finished");

        let mut results = Vec::with_capacity(hits.len());
        for hit in &hits {
            let Some(profile) = self.resolve(hit).await? else {
                continue;
            };
            results.push(score_candidate(
                job,
                &profile,
                hit.score,
                weights,
                self.summary_chars,
            ));
        }

        Ok(rank(results, top_k))
    }
}
