use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Recognizes text in a single raster image, returning lines in reading order.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Renders one page (1-based) of a PDF on disk to PNG bytes.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<Vec<u8>, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest<'a> {
    image_base64: String,
    language: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Option<Vec<OcrLine>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OcrLine {
    Plain(String),
    Scored { text: String },
}

impl OcrLine {
    fn into_text(self) -> String {
        match self {
            OcrLine::Plain(text) | OcrLine::Scored { text } => text,
        }
    }
}

/// OCR service reached over HTTP. The service receives a base64 image and the
/// configured language and answers with recognized lines.
///
/// The blocking client is created per call, on the blocking thread that runs
/// extraction, so the engine can be built and dropped inside a tokio runtime.
pub struct HttpOcrEngine {
    config: OcrEndpointConfig,
}

const OCR_SERVICE: &str = "ocr service";

impl HttpOcrEngine {
    pub fn new(config: OcrEndpointConfig) -> Self {
        Self { config }
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }
}

impl OcrEngine for HttpOcrEngine {
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>, ExtractError> {
        let payload = OcrRequest {
            image_base64: STANDARD.encode(image),
            language: &self.config.language,
        };

        let mut request = Client::new()
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .map_err(|error| ExtractError::unavailable(OCR_SERVICE, error))?;
        if !response.status().is_success() {
            return Err(ExtractError::unavailable(
                OCR_SERVICE,
                format!("{} returned {}", self.config.endpoint, response.status()),
            ));
        }

        let payload: OcrResponse = response
            .json()
            .map_err(|error| ExtractError::unavailable(OCR_SERVICE, error))?;
        Ok(response_lines(payload))
    }
}

fn response_lines(payload: OcrResponse) -> Vec<String> {
    if let Some(lines) = payload.lines {
        return lines
            .into_iter()
            .map(OcrLine::into_text)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
    }

    payload
        .text
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shells out to poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("pdftoppm"),
        }
    }
}

impl PdftoppmRasterizer {
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<Vec<u8>, ExtractError> {
        let out_dir = tempfile::tempdir()?;
        let out_root = out_dir.path().join("page");
        let page_arg = page.to_string();

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-singlefile")
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page_arg, "-l", &page_arg])
            .arg(pdf_path)
            .arg(&out_root)
            .output()
            .map_err(|error| {
                ExtractError::Rasterize(format!("failed to run {}: {error}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Rasterize(format!(
                "{} exited with {} on page {page}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(std::fs::read(out_root.with_extension("png"))?)
    }
}

/// Page-by-page OCR of a scanned PDF.
#[derive(Clone)]
pub struct OcrFallback {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
    dpi: u32,
}

impl OcrFallback {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, engine: Arc<dyn OcrEngine>, dpi: u32) -> Self {
        Self {
            rasterizer,
            engine,
            dpi,
        }
    }

    /// OCRs exactly the listed pages. Lines of a page are joined with a space,
    /// pages with a newline; a page with no recognized lines yields "".
    pub fn recognize_pages(&self, pdf: &[u8], pages: &[u32]) -> Result<String, ExtractError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(pdf)?;
        file.flush()?;

        let mut texts = Vec::with_capacity(pages.len());
        for &page in pages {
            let image = self.rasterizer.rasterize(file.path(), page, self.dpi)?;
            let lines = self.engine.recognize(&image)?;
            debug!(page, lines = lines.len(), "ocr page recognized");
            texts.push(lines.join(" "));
        }

        Ok(texts.join("\n"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requested pages and returns the page number as the "image".
    #[derive(Default)]
    pub(crate) struct RecordingRasterizer {
        pub pages: Mutex<Vec<u32>>,
    }

    impl PageRasterizer for RecordingRasterizer {
        fn rasterize(&self, pdf_path: &Path, page: u32, _dpi: u32) -> Result<Vec<u8>, ExtractError> {
            assert!(pdf_path.exists());
            self.pages.lock().unwrap().push(page);
            Ok(page.to_string().into_bytes())
        }
    }

    /// An OCR service that refuses every request.
    pub(crate) struct DownOcr;

    impl OcrEngine for DownOcr {
        fn recognize(&self, _image: &[u8]) -> Result<Vec<String>, ExtractError> {
            Err(ExtractError::unavailable(OCR_SERVICE, "connection refused"))
        }
    }

    /// Answers with canned lines keyed by the image bytes.
    pub(crate) struct CannedOcr {
        pub pages: Vec<(Vec<u8>, Vec<String>)>,
    }

    impl OcrEngine for CannedOcr {
        fn recognize(&self, image: &[u8]) -> Result<Vec<String>, ExtractError> {
            Ok(self
                .pages
                .iter()
                .find(|(key, _)| key.as_slice() == image)
                .map(|(_, lines)| lines.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn pages_are_joined_and_empty_pages_kept() {
        let rasterizer = Arc::new(RecordingRasterizer::default());
        let engine = Arc::new(CannedOcr {
            pages: vec![
                (b"1".to_vec(), vec!["JANE DOE".to_string(), "Engineer".to_string()]),
                (b"3".to_vec(), vec!["SKILLS".to_string()]),
            ],
        });
        let fallback = OcrFallback::new(rasterizer.clone(), engine, 300);

        let text = fallback.recognize_pages(b"%PDF-1.4", &[1, 2, 3]).unwrap();

        assert_eq!(text, "JANE DOE Engineer\n\nSKILLS");
        assert_eq!(*rasterizer.pages.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn engine_is_built_and_dropped_inside_runtime() {
        let engine = HttpOcrEngine::new(OcrEndpointConfig {
            endpoint: "http://127.0.0.1:9/ocr".to_string(),
            api_key: None,
            language: "en".to_string(),
        });
        assert_eq!(engine.language(), "en");
        drop(engine);
    }

    #[test]
    fn unreachable_service_is_an_outage() {
        let engine = HttpOcrEngine::new(OcrEndpointConfig {
            endpoint: "http://127.0.0.1:9/ocr".to_string(),
            api_key: Some("secret".to_string()),
            language: "en".to_string(),
        });
        let error = engine.recognize(b"png").unwrap_err();
        assert!(matches!(
            error,
            ExtractError::ServiceUnavailable { service: OCR_SERVICE, .. }
        ));
    }

    #[test]
    fn response_lines_accept_plain_and_scored_shapes() {
        let plain: OcrResponse =
            serde_json::from_str(r#"{"lines": ["  first ", "", "second"]}"#).unwrap();
        assert_eq!(response_lines(plain), vec!["first", "second"]);

        let scored: OcrResponse =
            serde_json::from_str(r#"{"lines": [{"text": "Python", "confidence": 0.98}]}"#).unwrap();
        assert_eq!(response_lines(scored), vec!["Python"]);

        let text: OcrResponse = serde_json::from_str(r#"{"text": "a\n\n b \n"}"#).unwrap();
        assert_eq!(response_lines(text), vec!["a", "b"]);
    }
}
