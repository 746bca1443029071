use regex::Regex;
use std::sync::OnceLock;

fn page_boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?imR)^[ \t]*page[ \t]+\d+(?:[ \t]+of[ \t]+\d+|[ \t]*$)")
            .expect("page boilerplate pattern is valid")
    })
}

fn page_number_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mR)^[ \t]*\d{1,3}[ \t]*$").expect("page number pattern is valid")
    })
}

fn glyph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[•●◦▪▫■□▶►▸➢➤→⇒★☆✦✧✓✔❖◆◇·]+").expect("glyph pattern is valid")
    })
}

fn dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[–—]").expect("dash pattern is valid"))
}

fn horizontal_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("space pattern is valid"))
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"))
}

/// Drops "Page N of M" running headers/footers and lone "Page N" lines.
pub fn remove_headers_footers(text: &str) -> String {
    page_boilerplate_re().replace_all(text, "").into_owned()
}

/// Drops lines holding nothing but a one to three digit number.
pub fn remove_page_numbers(text: &str) -> String {
    page_number_line_re().replace_all(text, "").into_owned()
}

pub fn remove_symbols(text: &str) -> String {
    let without_glyphs = glyph_re().replace_all(text, " ");
    dash_re().replace_all(&without_glyphs, "-").into_owned()
}

pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace('\u{a0}', " ");
    let text = horizontal_space_re().replace_all(&text, " ");
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    blank_run_re().replace_all(&text, "\n\n").trim().to_string()
}

fn normalize_pass(raw: &str) -> String {
    let text = remove_headers_footers(raw);
    let text = remove_page_numbers(&text);
    let text = remove_symbols(&text);
    normalize_whitespace(&text)
}

/// Canonical text form used by every downstream extractor.
///
/// A single pass can expose new boilerplate (a glyph stripped from in front of
/// a page number, for instance), so passes repeat until the text stops
/// changing. No pass introduces characters the earlier steps would remove, so
/// the loop terminates.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_pass(raw);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
