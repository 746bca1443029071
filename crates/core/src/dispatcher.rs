use crate::error::{ExtractError, MatchError};
use crate::extractor::{
    DocxExtractor, ImageOcrExtractor, PdfExtractor, PlainTextExtractor, TextExtractor,
    TikaExtractor,
};
use crate::models::ExtractedDocument;
use crate::ocr::{OcrEngine, OcrFallback, PageRasterizer};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MSWORD_MIME: &str = "application/msword";
pub const ZIP_MIME: &str = "application/zip";
pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const TIFF_MIME: &str = "image/tiff";
pub const BMP_MIME: &str = "image/bmp";
pub const GIF_MIME: &str = "image/gif";
pub const TEXT_MIME: &str = "text/plain";
pub const BINARY_MIME: &str = "application/octet-stream";

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const SNIFF_WINDOW: usize = 1024;

/// A PDF starts with its signature; only leading ASCII whitespace may precede
/// it. Text that merely mentions the marker stays text.
fn has_pdf_signature(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PDF_SIGNATURE)
}

/// Detects the mime type from magic bytes. ZIP containers are opened to tell a
/// Word document from any other archive.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    let head = &bytes[..bytes.len().min(SNIFF_WINDOW)];

    if has_pdf_signature(head) {
        return PDF_MIME;
    }
    if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        if let Ok(mut archive) = zip::ZipArchive::new(Cursor::new(bytes)) {
            if archive.by_name("word/document.xml").is_ok() {
                return DOCX_MIME;
            }
        }
        return ZIP_MIME;
    }
    if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return MSWORD_MIME;
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return PNG_MIME;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return JPEG_MIME;
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return TIFF_MIME;
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return GIF_MIME;
    }
    if bytes.starts_with(b"BM") && bytes.len() > 14 {
        return BMP_MIME;
    }
    if !bytes.is_empty() && !head.contains(&0) && std::str::from_utf8(bytes).is_ok() {
        return TEXT_MIME;
    }
    BINARY_MIME
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Image,
    Other,
}

impl DocumentKind {
    /// The byte signature wins over a disagreeing mime guess for PDFs.
    pub fn route(mime: &str, bytes: &[u8]) -> Self {
        match mime {
            PDF_MIME => DocumentKind::Pdf,
            DOCX_MIME => DocumentKind::Word,
            PNG_MIME | JPEG_MIME | TIFF_MIME | BMP_MIME => DocumentKind::Image,
            _ if has_pdf_signature(bytes) => DocumentKind::Pdf,
            _ => DocumentKind::Other,
        }
    }
}

/// Routes documents to extraction strategies in priority order.
pub struct FormatDispatcher {
    pdf: PdfExtractor,
    docx: DocxExtractor,
    image: Option<ImageOcrExtractor>,
    generic: Option<Arc<dyn TextExtractor>>,
    plain: PlainTextExtractor,
}

impl FormatDispatcher {
    pub fn new(min_text_chars: usize) -> Self {
        Self {
            pdf: PdfExtractor::new(None, min_text_chars),
            docx: DocxExtractor,
            image: None,
            generic: None,
            plain: PlainTextExtractor,
        }
    }

    /// Enables OCR for scanned PDFs and raster images.
    pub fn with_ocr(
        mut self,
        rasterizer: Arc<dyn PageRasterizer>,
        engine: Arc<dyn OcrEngine>,
        min_text_chars: usize,
        dpi: u32,
    ) -> Self {
        self.pdf = PdfExtractor::new(
            Some(OcrFallback::new(rasterizer, Arc::clone(&engine), dpi)),
            min_text_chars,
        );
        self.image = Some(ImageOcrExtractor::new(engine));
        self
    }

    /// Format-agnostic extractor tried after the specialized one.
    pub fn with_generic(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.generic = Some(extractor);
        self
    }

    pub fn with_content_service(self, endpoint: impl Into<String>) -> Self {
        self.with_generic(Arc::new(TikaExtractor::new(endpoint)))
    }

    fn strategies(&self, kind: DocumentKind, mime: &str) -> Vec<&dyn TextExtractor> {
        let mut strategies: Vec<&dyn TextExtractor> = Vec::new();
        match kind {
            DocumentKind::Pdf => strategies.push(&self.pdf),
            DocumentKind::Word => strategies.push(&self.docx),
            DocumentKind::Image => {
                if let Some(image) = &self.image {
                    strategies.push(image);
                }
            }
            DocumentKind::Other => {}
        }
        if let Some(generic) = &self.generic {
            strategies.push(generic.as_ref());
        }
        if mime == TEXT_MIME {
            strategies.push(&self.plain);
        }
        strategies
    }

    /// Tries each strategy for the sniffed kind until one yields text. When
    /// none does and a backing service failed along the way, the outage is
    /// reported instead of a content failure.
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument, MatchError> {
        let mime = sniff_mime(bytes);
        let kind = DocumentKind::route(mime, bytes);
        debug!(mime, ?kind, bytes = bytes.len(), "dispatching document");

        let mut outage = None;
        for strategy in self.strategies(kind, mime) {
            match strategy.extract(bytes) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(strategy = strategy.name(), chars = text.len(), "extracted text");
                    return Ok(ExtractedDocument {
                        text: text.trim().to_string(),
                        mime: mime.to_string(),
                    });
                }
                Ok(_) => debug!(strategy = strategy.name(), "strategy produced no text"),
                Err(ExtractError::ServiceUnavailable { service, details }) => {
                    warn!(strategy = strategy.name(), service, %details, "extraction service unavailable");
                    outage.get_or_insert((service, details));
                }
                Err(error) => warn!(strategy = strategy.name(), %error, "extraction strategy failed"),
            }
        }

        if let Some((service, details)) = outage {
            return Err(MatchError::unavailable(service, details));
        }
        Err(MatchError::ExtractionFailed {
            mime: mime.to_string(),
        })
    }
}

impl Default for FormatDispatcher {
    fn default() -> Self {
        Self::new(crate::models::PipelineOptions::default().ocr_min_chars)
    }
}
