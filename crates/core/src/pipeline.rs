use crate::config::Settings;
use crate::dispatcher::FormatDispatcher;
use crate::embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder};
use crate::experience::{estimate_years, min_experience, seniority};
use crate::matching::MatchEngine;
use crate::models::{
    CandidateProfile, IngestReceipt, JobDescription, JobDescriptionSummary, MatchRequest,
    MatchResult, PipelineOptions, PointPayload, ProfileUpdate, SectionMap,
};
use crate::normalizer::normalize;
use crate::ocr::{HttpOcrEngine, OcrEndpointConfig, PdftoppmRasterizer};
use crate::sections::classify_sections;
use crate::skills::SkillVocabulary;
use crate::stores::{OpenSearchProfileStore, QdrantStore};
use crate::traits::{ProfileStore, VectorIndex};
use crate::MatchError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything derived from a résumé before any collaborator is called.
struct ResumeAnalysis {
    raw_text: String,
    mime: String,
    normalized_text: String,
    sections: SectionMap,
    skills: Vec<String>,
    experience_years: f64,
    checksum: String,
}

fn analyze_resume(
    dispatcher: &FormatDispatcher,
    vocabulary: &SkillVocabulary,
    bytes: &[u8],
) -> Result<ResumeAnalysis, MatchError> {
    let extracted = dispatcher.extract(bytes)?;
    let normalized_text = normalize(&extracted.text);
    if normalized_text.is_empty() {
        return Err(MatchError::ExtractionFailed {
            mime: extracted.mime,
        });
    }

    Ok(ResumeAnalysis {
        sections: classify_sections(&normalized_text),
        skills: vocabulary.extract(&normalized_text),
        experience_years: estimate_years(&normalized_text),
        checksum: format!("{:x}", Sha256::digest(bytes)),
        normalized_text,
        raw_text: extracted.text,
        mime: extracted.mime,
    })
}

/// Ingestion and matching service. Built once at startup and shared.
pub struct ResumeMatcher {
    dispatcher: Arc<FormatDispatcher>,
    vocabulary: Arc<SkillVocabulary>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ProfileStore>,
    engine: MatchEngine,
}

impl ResumeMatcher {
    pub fn new(
        dispatcher: FormatDispatcher,
        vocabulary: SkillVocabulary,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ProfileStore>,
        options: PipelineOptions,
    ) -> Self {
        let engine = MatchEngine::new(
            Arc::clone(&index),
            Arc::clone(&store),
            options.overfetch_factor,
            options.summary_chars,
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            vocabulary: Arc::new(vocabulary),
            embedder,
            index,
            store,
            engine,
        }
    }

    /// Builds every collaborator from validated settings and prepares the
    /// vector collection and document indices.
    pub async fn connect(settings: &Settings) -> Result<Self, MatchError> {
        settings.validate()?;
        let options = PipelineOptions::default();

        let vocabulary = SkillVocabulary::load(settings.skill_dict_path.as_deref());

        let embedder: Arc<dyn Embedder> = match &settings.embedding_url {
            Some(url) => Arc::new(
                HttpEmbedder::connect(
                    url,
                    settings.embedding_model.clone(),
                    settings.embedding_api_key.clone(),
                )
                .await?,
            ),
            None => {
                warn!("no embedding service configured, using character n-gram embedder");
                Arc::new(CharacterNgramEmbedder::default())
            }
        };

        let mut dispatcher = FormatDispatcher::new(options.ocr_min_chars);
        if let Some(endpoint) = &settings.ocr_endpoint {
            let engine = HttpOcrEngine::new(OcrEndpointConfig {
                endpoint: endpoint.clone(),
                api_key: settings.ocr_api_key.clone(),
                language: settings.ocr_language.clone(),
            });
            info!(endpoint = %endpoint, language = engine.language(), "OCR enabled");
            dispatcher = dispatcher.with_ocr(
                Arc::new(PdftoppmRasterizer::with_binary(&settings.pdftoppm_path)),
                Arc::new(engine),
                options.ocr_min_chars,
                options.ocr_dpi,
            );
        }
        if let Some(tika_url) = &settings.tika_url {
            dispatcher = dispatcher.with_content_service(tika_url.clone());
        }

        let store = OpenSearchProfileStore::new(
            &settings.opensearch_url,
            &settings.profile_index,
            &settings.job_index,
        );
        store.ensure_indices().await?;
        let index = QdrantStore::new(&settings.qdrant_url, &settings.qdrant_collection);

        let matcher = Self::new(
            dispatcher,
            vocabulary,
            embedder,
            Arc::new(index),
            Arc::new(store),
            options,
        );
        matcher.initialize().await?;
        Ok(matcher)
    }

    pub async fn initialize(&self) -> Result<(), MatchError> {
        self.index.ensure_collection(self.embedder.dimensions()).await
    }

    /// Extracts, profiles, embeds and stores one résumé.
    pub async fn ingest_resume(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<IngestReceipt, MatchError> {
        if bytes.is_empty() {
            return Err(MatchError::InvalidInput("résumé file is empty".to_string()));
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let vocabulary = Arc::clone(&self.vocabulary);
        let analysis =
            tokio::task::spawn_blocking(move || analyze_resume(&dispatcher, &vocabulary, &bytes))
                .await??;

        let candidate_id = Uuid::new_v4().to_string();
        let embedding = self.embedder.embed(&analysis.normalized_text).await?;
        let payload = PointPayload {
            candidate_id: candidate_id.clone(),
            skills: analysis.skills.clone(),
            experience_years: analysis.experience_years,
        };
        self.index.upsert(&candidate_id, &embedding, &payload).await?;

        let profile = CandidateProfile {
            candidate_id: candidate_id.clone(),
            raw_text: analysis.raw_text,
            normalized_text: analysis.normalized_text,
            sections: analysis.sections,
            skills: analysis.skills,
            experience_years: analysis.experience_years,
            embedding: Some(embedding),
            point_id: Some(candidate_id.clone()),
            mime: analysis.mime,
            filename,
            checksum: analysis.checksum,
            ingested_at: Utc::now(),
        };

        self.store.insert_profile(&profile).await?;

        info!(
            candidate_id = %candidate_id,
            mime = %profile.mime,
            skills = profile.skills.len(),
            experience_years = profile.experience_years,
            "ingested résumé"
        );

        Ok(IngestReceipt {
            point_id: candidate_id.clone(),
            candidate_id,
        })
    }

    pub async fn get_profile(&self, candidate_id: &str) -> Result<CandidateProfile, MatchError> {
        self.store
            .get_profile(candidate_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("candidate {candidate_id}")))
    }

    async fn describe_job(&self, jd_text: &str) -> Result<JobDescription, MatchError> {
        let text = jd_text.trim();
        if text.is_empty() {
            return Err(MatchError::InvalidInput(
                "job description text is empty".to_string(),
            ));
        }

        Ok(JobDescription {
            jd_id: Uuid::new_v4().to_string(),
            raw_text: text.to_string(),
            skills: self.vocabulary.extract(text),
            min_experience: min_experience(text),
            seniority: seniority(text),
            embedding: self.embedder.embed(text).await?,
            created_at: Utc::now(),
        })
    }

    pub async fn submit_job_description(
        &self,
        jd_text: &str,
    ) -> Result<JobDescriptionSummary, MatchError> {
        let job = self.describe_job(jd_text).await?;
        self.store.insert_job(&job).await?;
        info!(
            jd_id = %job.jd_id,
            skills = job.skills.len(),
            min_experience = job.min_experience,
            seniority = %job.seniority,
            "registered job description"
        );
        Ok(JobDescriptionSummary::from(&job))
    }

    pub async fn run_match(&self, request: &MatchRequest) -> Result<Vec<MatchResult>, MatchError> {
        if request.top_k == 0 {
            return Err(MatchError::InvalidInput("top_k must be at least 1".to_string()));
        }
        let weights = &request.weights;
        for (name, value) in [
            ("skill", weights.skill),
            ("experience", weights.experience),
            ("embedding", weights.embedding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidInput(format!(
                    "{name} weight must be a non-negative number, got {value}"
                )));
            }
        }

        let job = self.describe_job(&request.jd_text).await?;
        let results = self.engine.run(&job, request.top_k, weights).await?;
        info!(top_k = request.top_k, results = results.len(), "match finished");
        Ok(results)
    }

    /// Recomputes a stored profile's vector with the current embedder and
    /// writes it back under the same point id.
    pub async fn reembed_profile(&self, candidate_id: &str) -> Result<IngestReceipt, MatchError> {
        let profile = self.get_profile(candidate_id).await?;
        let point_id = profile
            .point_id
            .clone()
            .unwrap_or_else(|| profile.candidate_id.clone());

        let embedding = self.embedder.embed(&profile.normalized_text).await?;
        self.index
            .upsert(&point_id, &embedding, &PointPayload::from(&profile))
            .await?;
        self.store
            .update_profile(
                candidate_id,
                &ProfileUpdate {
                    embedding: Some(embedding),
                    point_id: Some(point_id.clone()),
                },
            )
            .await?;

        info!(candidate_id, point_id = %point_id, "re-embedded profile");
        Ok(IngestReceipt {
            candidate_id: candidate_id.to_string(),
            point_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchWeights, Section, VectorHit};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const RESUME: &str = "Jane Doe\nSUMMARY\nBackend engineer with 5 years of experience.\n\
        SKILLS\nPython, SQL, Docker\nEDUCATION\nBS Computer Science\nPage 1 of 1";

    #[derive(Default)]
    struct MemoryIndex {
        points: Mutex<Vec<(String, Vec<f32>, PointPayload)>>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        async fn ensure_collection(&self, _dimensions: usize) -> Result<(), MatchError> {
            Ok(())
        }

        async fn upsert(
            &self,
            point_id: &str,
            vector: &[f32],
            payload: &PointPayload,
        ) -> Result<(), MatchError> {
            let mut points = self.points.lock().unwrap();
            points.retain(|(id, _, _)| id != point_id);
            points.push((point_id.to_string(), vector.to_vec(), payload.clone()));
            Ok(())
        }

        async fn search(&self, _vector: &[f32], limit: usize) -> Result<Vec<VectorHit>, MatchError> {
            Ok(self
                .points
                .lock()
                .unwrap()
                .iter()
                .take(limit)
                .map(|(id, _, payload)| VectorHit {
                    point_id: id.clone(),
                    candidate_id: payload.candidate_id.clone(),
                    score: 0.5,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        profiles: Mutex<HashMap<String, CandidateProfile>>,
        jobs: Mutex<Vec<JobDescription>>,
    }

    #[async_trait]
    impl ProfileStore for MemoryStore {
        async fn insert_profile(&self, profile: &CandidateProfile) -> Result<String, MatchError> {
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.candidate_id.clone(), profile.clone());
            Ok(profile.candidate_id.clone())
        }

        async fn get_profile(&self, candidate_id: &str) -> Result<Option<CandidateProfile>, MatchError> {
            Ok(self.profiles.lock().unwrap().get(candidate_id).cloned())
        }

        async fn update_profile(&self, candidate_id: &str, update: &ProfileUpdate) -> Result<(), MatchError> {
            let mut profiles = self.profiles.lock().unwrap();
            let profile = profiles
                .get_mut(candidate_id)
                .ok_or_else(|| MatchError::NotFound(candidate_id.to_string()))?;
            update.clone().apply(profile);
            Ok(())
        }

        async fn insert_job(&self, job: &JobDescription) -> Result<String, MatchError> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job.jd_id.clone())
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, MatchError> {
            Err(MatchError::unavailable("embedding service", "connection refused"))
        }
    }

    fn matcher_with(
        embedder: Arc<dyn Embedder>,
    ) -> (ResumeMatcher, Arc<MemoryIndex>, Arc<MemoryStore>) {
        let index = Arc::new(MemoryIndex::default());
        let store = Arc::new(MemoryStore::default());
        let matcher = ResumeMatcher::new(
            FormatDispatcher::default(),
            SkillVocabulary::default(),
            embedder,
            index.clone(),
            store.clone(),
            PipelineOptions::default(),
        );
        (matcher, index, store)
    }

    fn matcher() -> (ResumeMatcher, Arc<MemoryIndex>, Arc<MemoryStore>) {
        matcher_with(Arc::new(CharacterNgramEmbedder { dimensions: 64 }))
    }

    #[tokio::test]
    async fn ingest_builds_and_stores_profile() {
        let (matcher, index, _store) = matcher();

        let receipt = matcher
            .ingest_resume(RESUME.as_bytes().to_vec(), Some("jane.txt".to_string()))
            .await
            .expect("ingest should succeed");
        assert_eq!(receipt.point_id, receipt.candidate_id);

        let profile = matcher.get_profile(&receipt.candidate_id).await.unwrap();
        assert_eq!(profile.skills, vec!["Docker", "Python", "Sql"]);
        assert_eq!(profile.experience_years, 5.0);
        assert_eq!(profile.sections.get(Section::Skills), Some("Python, SQL, Docker"));
        assert!(!profile.normalized_text.contains("Page 1 of 1"));
        assert_eq!(profile.embedding.as_ref().map(Vec::len), Some(64));
        assert_eq!(profile.checksum.len(), 64);
        assert_eq!(profile.filename.as_deref(), Some("jane.txt"));

        let points = index.points.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].2, PointPayload::from(&profile));
        assert_eq!(profile.embedding.as_deref(), Some(points[0].1.as_slice()));
    }

    #[tokio::test]
    async fn empty_and_unreadable_uploads_are_rejected() {
        let (matcher, _index, store) = matcher();

        let error = matcher.ingest_resume(Vec::new(), None).await.unwrap_err();
        assert!(matches!(error, MatchError::InvalidInput(_)));

        let error = matcher
            .ingest_resume(vec![0x00, 0x01, 0x02, 0xFF], None)
            .await
            .unwrap_err();
        assert!(matches!(error, MatchError::ExtractionFailed { .. }));

        let error = matcher
            .ingest_resume(b"  \xE2\x80\xA2  12 \n".to_vec(), None)
            .await
            .unwrap_err();
        assert!(matches!(error, MatchError::ExtractionFailed { .. }));

        assert!(store.profiles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_outage_is_reported_and_nothing_is_stored() {
        let (matcher, index, store) = matcher_with(Arc::new(DownEmbedder));

        let error = matcher
            .ingest_resume(RESUME.as_bytes().to_vec(), None)
            .await
            .unwrap_err();

        assert!(error.is_dependency_failure());
        assert!(index.points.lock().unwrap().is_empty());
        assert!(store.profiles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let (matcher, _index, _store) = matcher();
        let error = matcher.get_profile("missing").await.unwrap_err();
        assert!(matches!(error, MatchError::NotFound(_)));
        let error = matcher.reembed_profile("missing").await.unwrap_err();
        assert!(matches!(error, MatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn job_descriptions_are_summarized_and_persisted() {
        let (matcher, _index, store) = matcher();

        let summary = matcher
            .submit_job_description("Senior engineer, minimum 4 years. Python, AWS and Kubernetes.")
            .await
            .unwrap();

        assert_eq!(summary.skills, vec!["Aws", "Kubernetes", "Python"]);
        assert_eq!(summary.min_experience, 4.0);
        assert_eq!(summary.embedding_dim, 64);
        let jobs = store.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].seniority, "senior");

        assert!(matches!(
            matcher.submit_job_description("   ").await,
            Err(MatchError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn match_requests_are_validated() {
        let (matcher, _index, _store) = matcher();

        let mut request = MatchRequest::new("Python developer");
        request.top_k = 0;
        assert!(matches!(
            matcher.run_match(&request).await,
            Err(MatchError::InvalidInput(_))
        ));

        let mut request = MatchRequest::new("Python developer");
        request.weights = MatchWeights {
            skill: -1.0,
            ..MatchWeights::default()
        };
        assert!(matches!(
            matcher.run_match(&request).await,
            Err(MatchError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn match_scores_stored_candidates() {
        let (matcher, _index, _store) = matcher();
        let receipt = matcher
            .ingest_resume(RESUME.as_bytes().to_vec(), None)
            .await
            .unwrap();

        let results = matcher
            .run_match(&MatchRequest::new(
                "Backend role. At least 10 years with Python and AWS.",
            ))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let top = &results[0];
        assert_eq!(top.candidate_id, receipt.candidate_id);
        assert_eq!(top.matched_skills, vec!["Python"]);
        assert_eq!(top.missing_skills, vec!["Aws"]);
        assert_eq!(top.skill_score, 0.5);
        assert_eq!(top.experience_score, 0.5);
        assert_eq!(top.embedding_score, 0.5);
        // 0.4 * 0.5 + 0.2 * 0.5 + 0.4 * 0.5
        assert_eq!(top.final_score, 0.5);
        assert_eq!(top.summary, "Backend engineer with 5 years of experience.");
    }

    #[tokio::test]
    async fn reembedding_keeps_the_point_id() {
        let (matcher, index, store) = matcher();
        let receipt = matcher
            .ingest_resume(RESUME.as_bytes().to_vec(), None)
            .await
            .unwrap();
        store
            .profiles
            .lock()
            .unwrap()
            .get_mut(&receipt.candidate_id)
            .unwrap()
            .embedding = None;

        let reembedded = matcher.reembed_profile(&receipt.candidate_id).await.unwrap();

        assert_eq!(reembedded, receipt);
        assert_eq!(index.points.lock().unwrap().len(), 1);
        let profile = matcher.get_profile(&receipt.candidate_id).await.unwrap();
        assert_eq!(profile.embedding.as_ref().map(Vec::len), Some(64));
    }

    #[tokio::test]
    async fn ocr_outage_is_reported_and_nothing_is_stored() {
        let index = Arc::new(MemoryIndex::default());
        let store = Arc::new(MemoryStore::default());
        let dispatcher = FormatDispatcher::default().with_ocr(
            Arc::new(crate::ocr::tests::RecordingRasterizer::default()),
            Arc::new(crate::ocr::tests::DownOcr),
            100,
            300,
        );
        let matcher = ResumeMatcher::new(
            dispatcher,
            SkillVocabulary::default(),
            Arc::new(CharacterNgramEmbedder { dimensions: 8 }),
            index.clone(),
            store.clone(),
            PipelineOptions::default(),
        );

        let error = matcher
            .ingest_resume(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec(), None)
            .await
            .unwrap_err();

        assert!(error.is_dependency_failure());
        assert!(index.points.lock().unwrap().is_empty());
        assert!(store.profiles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_with_remote_extractors_reports_unreachable_store() {
        let settings = Settings {
            opensearch_url: "http://127.0.0.1:9".to_string(),
            qdrant_url: "http://127.0.0.1:9".to_string(),
            ocr_endpoint: Some("http://127.0.0.1:9/ocr".to_string()),
            tika_url: Some("http://127.0.0.1:9".to_string()),
            ..Settings::default()
        };

        let error = match ResumeMatcher::connect(&settings).await {
            Ok(_) => panic!("nothing listens on the discard port"),
            Err(error) => error,
        };
        assert!(error.is_dependency_failure());
    }
}
