use crate::error::ExtractError;
use crate::ocr::{OcrEngine, OcrFallback};
use lopdf::Document;
use regex::Regex;
use reqwest::blocking::Client;
use std::io::{Cursor, Read};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use zip::ZipArchive;

/// One way of turning document bytes into text.
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Reads the PDF text layer and OCRs the pages when the layer is too thin to be
/// a real text PDF.
pub struct PdfExtractor {
    ocr: Option<OcrFallback>,
    min_chars: usize,
}

impl PdfExtractor {
    pub fn new(ocr: Option<OcrFallback>, min_chars: usize) -> Self {
        Self { ocr, min_chars }
    }
}

fn text_layer(document: &Document, pages: &[u32]) -> String {
    let mut parts = Vec::with_capacity(pages.len());
    for &page in pages {
        match document.extract_text(&[page]) {
            Ok(text) if !text.trim().is_empty() => parts.push(text),
            Ok(_) => {}
            Err(error) => debug!(page, %error, "pdf page has no readable text layer"),
        }
    }
    parts.join("\n").trim().to_string()
}

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        let text = text_layer(&document, &pages);

        if text.chars().count() >= self.min_chars {
            return Ok(text);
        }

        let Some(ocr) = &self.ocr else {
            debug!(chars = text.len(), "thin pdf text layer and no OCR configured");
            return Ok(text);
        };

        debug!(pages = pages.len(), chars = text.len(), "pdf looks scanned, running OCR");
        match ocr.recognize_pages(bytes, &pages) {
            Ok(recognized) if !recognized.trim().is_empty() => Ok(recognized),
            Ok(_) => Ok(text),
            Err(error) if text.is_empty() => Err(error),
            Err(error) => {
                warn!(%error, "OCR of scanned pdf failed, keeping thin text layer");
                Ok(text)
            }
        }
    }
}

fn docx_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>")
            .expect("docx token pattern is valid")
    })
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Paragraph text of a WordprocessingML body, one paragraph per line.
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for captures in docx_token_re().captures_iter(xml) {
        if let Some(run) = captures.get(1) {
            current.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match captures.get(0).map(|tag| tag.as_str()) {
            Some(tag) if tag.starts_with("<w:tab") => current.push('\t'),
            Some(tag) if tag.starts_with("<w:br") => current.push('\n'),
            _ => paragraphs.push(std::mem::take(&mut current)),
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")?
            .read_to_string(&mut xml)
            .map_err(|error| ExtractError::Docx(error.to_string()))?;
        Ok(docx_xml_to_text(&xml).trim().to_string())
    }
}

/// OCR of a raster image submitted directly.
pub struct ImageOcrExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl ImageOcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }
}

impl TextExtractor for ImageOcrExtractor {
    fn name(&self) -> &'static str {
        "image-ocr"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(self.engine.recognize(bytes)?.join(" ").trim().to_string())
    }
}

/// Generic content extraction through an Apache Tika server. Like the OCR
/// engine, the blocking client lives only for the duration of a call.
pub struct TikaExtractor {
    endpoint: String,
}

const CONTENT_SERVICE: &str = "content service";

impl TikaExtractor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl TextExtractor for TikaExtractor {
    fn name(&self) -> &'static str {
        "tika"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let url = format!("{}/tika", self.endpoint.trim_end_matches('/'));
        let response = Client::new()
            .put(&url)
            .header("accept", "text/plain")
            .body(bytes.to_vec())
            .send()
            .map_err(|error| ExtractError::unavailable(CONTENT_SERVICE, error))?;

        if !response.status().is_success() {
            return Err(ExtractError::unavailable(
                CONTENT_SERVICE,
                format!("{url} returned {}", response.status()),
            ));
        }

        let text = response
            .text()
            .map_err(|error| ExtractError::unavailable(CONTENT_SERVICE, error))?;
        Ok(text.trim().to_string())
    }
}

/// Accepts bytes that already are UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|error| ExtractError::NotText(error.to_string()))?;
        if text.contains('\0') {
            return Err(ExtractError::NotText("contains NUL bytes".to_string()));
        }
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ocr::tests::{CannedOcr, RecordingRasterizer};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Single-page PDF whose text layer holds `text`.
    pub(crate) fn pdf_bytes(text: &str) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>SKILLS</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Python, </w:t></w:r><w:r><w:t>SQL &amp; AWS</w:t></w:r></w:p>
            <w:p><w:r><w:t>Acme</w:t><w:tab/><w:t>2019</w:t></w:r></w:p>
            <w:tbl/></w:body></w:document>"#;
        assert_eq!(docx_xml_to_text(xml), "SKILLS\nPython, SQL & AWS\nAcme\t2019");
    }

    #[test]
    fn docx_extractor_reads_document_part() {
        let bytes = docx_bytes("<w:p><w:r><w:t>EDUCATION</w:t></w:r></w:p><w:p><w:r><w:t>BS CS</w:t></w:r></w:p>");
        assert_eq!(DocxExtractor.extract(&bytes).unwrap(), "EDUCATION\nBS CS");
    }

    #[test]
    fn docx_extractor_rejects_other_archives() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("notes.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(matches!(DocxExtractor.extract(&bytes), Err(ExtractError::Zip(_))));
    }

    #[test]
    fn thin_pdf_text_layer_triggers_page_ocr() {
        let rasterizer = Arc::new(RecordingRasterizer::default());
        let engine = Arc::new(CannedOcr {
            pages: vec![(b"1".to_vec(), vec!["SKILLS".to_string(), "Rust".to_string()])],
        });
        let extractor = PdfExtractor::new(Some(OcrFallback::new(rasterizer.clone(), engine, 300)), 100);

        let text = extractor.extract(&pdf_bytes("x")).unwrap();

        assert_eq!(text, "SKILLS Rust");
        assert_eq!(*rasterizer.pages.lock().unwrap(), vec![1]);
    }

    #[test]
    fn broken_pdf_is_a_parse_error() {
        let extractor = PdfExtractor::new(None, 100);
        assert!(matches!(
            extractor.extract(b"%PDF-1.4\n%broken"),
            Err(ExtractError::PdfParse(_))
        ));
    }

    #[test]
    fn plain_text_rejects_binary() {
        assert_eq!(PlainTextExtractor.extract(b"\xEF\xBB\xBF  hello\n").unwrap(), "hello");
        assert!(PlainTextExtractor.extract(&[0xff, 0xfe, 0x00]).is_err());
        assert!(PlainTextExtractor.extract(b"a\0b").is_err());
    }

    #[tokio::test]
    async fn content_service_is_built_and_dropped_inside_runtime() {
        let extractor = TikaExtractor::new("http://127.0.0.1:9/");
        assert_eq!(extractor.name(), "tika");
        drop(extractor);
    }

    #[test]
    fn unreachable_content_service_is_an_outage() {
        let error = TikaExtractor::new("http://127.0.0.1:9")
            .extract(b"%PDF-1.4")
            .unwrap_err();
        assert!(matches!(
            error,
            ExtractError::ServiceUnavailable { service: CONTENT_SERVICE, .. }
        ));
    }
}
