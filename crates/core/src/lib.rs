pub mod config;
pub mod dispatcher;
pub mod embeddings;
pub mod error;
pub mod experience;
pub mod extractor;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod normalizer;
pub mod ocr;
pub mod pipeline;
pub mod sections;
pub mod skills;
pub mod stores;
pub mod traits;

pub use config::Settings;
pub use dispatcher::{sniff_mime, DocumentKind, FormatDispatcher};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ExtractError, MatchError, Result};
pub use experience::{estimate_years, min_experience, seniority};
pub use extractor::TextExtractor;
pub use ingest::{discover_resume_files, ingest_folder_best_effort, IngestionReport, SkippedDocument};
pub use matching::{experience_score, rank, skill_overlap, MatchEngine, SkillOverlap};
pub use models::{
    CandidateProfile, ExtractedDocument, IngestReceipt, JobDescription, JobDescriptionSummary,
    MatchRequest, MatchResult, MatchWeights, PipelineOptions, PointPayload, ProfileUpdate,
    Section, SectionMap, VectorHit,
};
pub use normalizer::normalize;
pub use ocr::{HttpOcrEngine, OcrEndpointConfig, OcrEngine, PageRasterizer, PdftoppmRasterizer};
pub use pipeline::ResumeMatcher;
pub use sections::classify_sections;
pub use skills::SkillVocabulary;
pub use stores::{OpenSearchProfileStore, QdrantStore};
pub use traits::{ProfileStore, VectorIndex};
