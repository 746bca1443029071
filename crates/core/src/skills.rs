use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const DEFAULT_SKILLS: [&str; 6] = ["python", "aws", "react", "sql", "docker", "kubernetes"];

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z+.#]*").expect("word pattern is valid"))
}

/// Upper-cases the first character and lower-cases the rest ("c++" -> "C++",
/// "NODE.JS" -> "Node.js").
pub fn display_case(skill: &str) -> String {
    let mut chars = skill.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Lower-cased token set. A token carrying sentence punctuation ("SQL.") also
/// contributes its bare form.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for found in word_re().find_iter(text) {
        let token = found.as_str().to_lowercase();
        let bare = token.trim_end_matches('.');
        if !bare.is_empty() && bare.len() != token.len() {
            tokens.insert(bare.to_string());
        }
        tokens.insert(token);
    }
    tokens
}

/// Controlled skill vocabulary, stored lower-cased and ordered so extraction
/// never depends on load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillVocabulary {
    skills: BTreeSet<String>,
}

impl Default for SkillVocabulary {
    fn default() -> Self {
        Self::from_skills(DEFAULT_SKILLS)
    }
}

impl SkillVocabulary {
    pub fn from_skills<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let skills = skills
            .into_iter()
            .map(|skill| skill.as_ref().trim().to_lowercase())
            .filter(|skill| !skill.is_empty())
            .collect();
        Self { skills }
    }

    /// Parses a JSON array of skill names.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let skills: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::from_skills(skills))
    }

    /// Loads the dictionary file, falling back to the built-in set when the file
    /// is absent, unreadable or malformed.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!(skills = DEFAULT_SKILLS.len(), "no skill dictionary configured, using built-in set");
            return Self::default();
        };

        let loaded = std::fs::read_to_string(path)
            .map_err(|error| error.to_string())
            .and_then(|raw| Self::from_json_str(&raw).map_err(|error| error.to_string()));

        match loaded {
            Ok(vocabulary) if !vocabulary.is_empty() => {
                info!(path = %path.display(), skills = vocabulary.len(), "loaded skill dictionary");
                vocabulary
            }
            Ok(_) => {
                warn!(path = %path.display(), "skill dictionary is empty, using built-in set");
                Self::default()
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skill dictionary unavailable, using built-in set");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.skills.contains(&skill.to_lowercase())
    }

    /// Sorted, de-duplicated, display-cased skills whose lower-cased form
    /// appears as a whole token in `text`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        let found: BTreeSet<String> = self
            .skills
            .iter()
            .filter(|skill| tokens.contains(skill.as_str()))
            .map(|skill| display_case(skill))
            .collect();
        found.into_iter().collect()
    }
}
