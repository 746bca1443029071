use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Map};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Skills,
    Experience,
    Projects,
    Education,
    Summary,
    Certifications,
    Contact,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Skills,
        Section::Experience,
        Section::Projects,
        Section::Education,
        Section::Summary,
        Section::Certifications,
        Section::Contact,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Skills => "skills",
            Section::Experience => "experience",
            Section::Projects => "projects",
            Section::Education => "education",
            Section::Summary => "summary",
            Section::Certifications => "certifications",
            Section::Contact => "contact",
        }
    }

    /// Header phrases that open this section, matched as lower-case prefixes.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Section::Skills => &["skills", "technical skills", "core competencies"],
            Section::Experience => &[
                "experience",
                "work history",
                "employment",
                "professional experience",
            ],
            Section::Projects => &["projects", "project work"],
            Section::Education => &["education", "academic"],
            Section::Summary => &["summary", "professional summary", "profile", "overview"],
            Section::Certifications => &["certifications", "certification", "licenses"],
            Section::Contact => &["contact", "contact information", "personal details"],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Section name to section body, in order of first appearance in the document.
/// Sections that never received a line are absent.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionMap {
    #[serde_as(as = "Map<_, _>")]
    entries: Vec<(Section, String)>,
}

impl SectionMap {
    pub fn get(&self, section: Section) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains(&self, section: Section) -> bool {
        self.get(section).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        self.entries.iter().map(|(name, text)| (*name, text.as_str()))
    }

    /// Empty bodies are ignored so the map never holds a blank section.
    pub(crate) fn push(&mut self, section: Section, text: String) {
        if text.is_empty() || self.contains(section) {
            return;
        }
        self.entries.push((section, text));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_id: String,
    pub raw_text: String,
    pub normalized_text: String,
    pub sections: SectionMap,
    pub skills: Vec<String>,
    pub experience_years: f64,
    pub embedding: Option<Vec<f32>>,
    pub point_id: Option<String>,
    pub mime: String,
    pub filename: Option<String>,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

impl CandidateProfile {
    pub fn summary(&self) -> &str {
        self.sections.get(Section::Summary).unwrap_or_default()
    }
}

/// Typed field set accepted by `ProfileStore::update_profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_id: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.embedding.is_none() && self.point_id.is_none()
    }

    pub fn apply(self, profile: &mut CandidateProfile) {
        if let Some(embedding) = self.embedding {
            profile.embedding = Some(embedding);
        }
        if let Some(point_id) = self.point_id {
            profile.point_id = Some(point_id);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub jd_id: String,
    pub raw_text: String,
    pub skills: Vec<String>,
    pub min_experience: f64,
    pub seniority: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDescriptionSummary {
    pub jd_id: String,
    pub skills: Vec<String>,
    pub min_experience: f64,
    pub embedding_dim: usize,
}

impl From<&JobDescription> for JobDescriptionSummary {
    fn from(value: &JobDescription) -> Self {
        Self {
            jd_id: value.jd_id.clone(),
            skills: value.skills.clone(),
            min_experience: value.min_experience,
            embedding_dim: value.embedding.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReceipt {
    pub candidate_id: String,
    pub point_id: String,
}

/// Text pulled out of a document together with the sniffed mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub mime: String,
}

/// Payload stored next to each candidate vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    pub candidate_id: String,
    pub skills: Vec<String>,
    pub experience_years: f64,
}

impl From<&CandidateProfile> for PointPayload {
    fn from(value: &CandidateProfile) -> Self {
        Self {
            candidate_id: value.candidate_id.clone(),
            skills: value.skills.clone(),
            experience_years: value.experience_years,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub point_id: String,
    pub candidate_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MatchWeights {
    pub skill: f64,
    pub experience: f64,
    pub embedding: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            skill: 0.4,
            experience: 0.2,
            embedding: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRequest {
    pub jd_text: String,
    pub top_k: usize,
    pub weights: MatchWeights,
}

impl MatchRequest {
    pub fn new(jd_text: impl Into<String>) -> Self {
        Self {
            jd_text: jd_text.into(),
            top_k: 5,
            weights: MatchWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub candidate_id: String,
    pub final_score: f64,
    pub embedding_score: f64,
    pub skill_score: f64,
    pub experience_score: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub experience_years: f64,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Text-layer output shorter than this marks a PDF as scanned.
    pub ocr_min_chars: usize,
    pub ocr_dpi: u32,
    pub summary_chars: usize,
    pub overfetch_factor: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ocr_min_chars: 100,
            ocr_dpi: 300,
            summary_chars: 500,
            overfetch_factor: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_map_serializes_as_ordered_object() {
        let mut sections = SectionMap::default();
        sections.push(Section::Skills, "Python, SQL".to_string());
        sections.push(Section::Education, "BS CS".to_string());
        sections.push(Section::Summary, String::new());

        let json = serde_json::to_string(&sections).unwrap();
        assert_eq!(json, r#"{"skills":"Python, SQL","education":"BS CS"}"#);

        let parsed: SectionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sections);
        assert!(!parsed.contains(Section::Summary));
    }

    #[test]
    fn profile_update_only_touches_provided_fields() {
        let update = ProfileUpdate {
            embedding: Some(vec![0.5, 0.5]),
            point_id: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "embedding": [0.5, 0.5] }));
        assert!(ProfileUpdate::default().is_empty());
    }
}
