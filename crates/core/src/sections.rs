//! Header-driven segmentation of normalized résumé text.

use crate::models::{Section, SectionMap};

const MAX_HEADER_CHARS: usize = 60;

fn is_all_caps(line: &str) -> bool {
    line.chars().any(char::is_alphabetic) && !line.chars().any(char::is_lowercase)
}

fn is_known_header_phrase(lowered: &str) -> bool {
    Section::ALL
        .iter()
        .any(|section| section.keywords().contains(&lowered))
}

/// Short line that is either shouted or exactly a known header phrase.
fn is_candidate_header(line: &str) -> bool {
    if line.is_empty() || line.chars().count() >= MAX_HEADER_CHARS {
        return false;
    }
    is_all_caps(line) || is_known_header_phrase(&line.to_lowercase())
}

/// First section (in declaration order) owning a keyword the header starts with.
pub fn match_section(header: &str) -> Option<Section> {
    let lowered = header.trim().to_lowercase();
    Section::ALL.into_iter().find(|section| {
        section
            .keywords()
            .iter()
            .any(|keyword| lowered.starts_with(keyword))
    })
}

pub fn classify_sections(text: &str) -> SectionMap {
    let mut buckets: Vec<(Section, Vec<&str>)> = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_candidate_header(trimmed) {
            if let Some(section) = match_section(trimmed) {
                current = Some(section);
                continue;
            }
        }

        let Some(section) = current else {
            continue;
        };

        match buckets.iter_mut().find(|(name, _)| *name == section) {
            Some((_, lines)) => lines.push(line),
            None => buckets.push((section, vec![line])),
        }
    }

    let mut sections = SectionMap::default();
    for (section, lines) in buckets {
        sections.push(section, lines.join("\n").trim_end().to_string());
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_headers_split_sections() {
        let text = "SKILLS\nPython, SQL\nEDUCATION\nBS CS";
        let sections = classify_sections(text);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections.get(Section::Skills), Some("Python, SQL"));
        assert_eq!(sections.get(Section::Education), Some("BS CS"));
        let serialized = serde_json::to_value(&sections).unwrap();
        assert_eq!(
            serialized,
            serde_json::json!({ "skills": "Python, SQL", "education": "BS CS" })
        );
    }

    #[test]
    fn lines_before_first_header_are_dropped() {
        let text = "Jane Doe\njane@example.com\nSummary\nBackend engineer.";
        let sections = classify_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections.get(Section::Summary), Some("Backend engineer."));
    }

    #[test]
    fn header_prefix_match_and_document_order() {
        let text = "PROFESSIONAL EXPERIENCE\nAcme Corp\n  Built APIs\nTECHNICAL SKILLS & TOOLS\nRust\nExperience\nGlobex";
        let sections = classify_sections(text);

        let order: Vec<_> = sections.sections().collect();
        assert_eq!(order, vec![Section::Experience, Section::Skills]);
        assert_eq!(
            sections.get(Section::Experience),
            Some("Acme Corp\n  Built APIs\nGlobex")
        );
        assert_eq!(sections.get(Section::Skills), Some("Rust"));
    }

    #[test]
    fn unmatched_caps_lines_are_body_text() {
        let text = "CONTACT\nJANE DOE\nBerlin";
        let sections = classify_sections(text);
        assert_eq!(sections.get(Section::Contact), Some("JANE DOE\nBerlin"));
    }

    #[test]
    fn mixed_case_lines_are_not_headers_unless_exact_phrase() {
        let text = "SKILLS\nSkills include Rust and Go\nEducation history below";
        let sections = classify_sections(text);
        assert_eq!(
            sections.get(Section::Skills),
            Some("Skills include Rust and Go\nEducation history below")
        );
        assert!(!sections.contains(Section::Education));
    }

    #[test]
    fn long_caps_lines_are_not_headers() {
        let long = "EXPERIENCE ".repeat(6);
        let text = format!("SUMMARY\n{long}\nDetail");
        let sections = classify_sections(&text);
        assert_eq!(sections.len(), 1);
        assert!(sections.get(Section::Summary).unwrap().ends_with("Detail"));
    }

    #[test]
    fn header_without_body_is_absent() {
        let sections = classify_sections("SKILLS\n\nEDUCATION\nMIT");
        assert!(!sections.contains(Section::Skills));
        assert_eq!(sections.get(Section::Education), Some("MIT"));
    }
}
