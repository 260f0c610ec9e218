use crate::digest::text_digest;
use docdiff_common::{ContentDigest, DocDiffError, FileKind};
use std::collections::HashMap;
use std::path::Path;
#[cfg(feature = "pdf")]
use tracing::debug;

/// Extraction strategy for one file kind.
///
/// Implementations normalize a document down to its text so that
/// format-level and metadata-level differences hash identically.
pub trait TextExtractor: Send + Sync {
    /// Extract normalized text from the file.
    fn extract(&self, path: &Path) -> Result<String, DocDiffError>;

    /// Whether this extractor can parse the given file. Kinds cover several
    /// extensions; legacy payloads the strategy cannot parse (e.g. binary
    /// `.doc` under the word-document kind) are reported unsupported rather
    /// than failing extraction.
    fn supports(&self, _path: &Path) -> bool {
        true
    }
}

/// Dispatch table mapping file kinds to extraction strategies.
///
/// New formats are added by registering an implementation; the classifier
/// never changes.
pub struct ExtractorRegistry {
    extractors: HashMap<FileKind, Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with no strategies; every kind reports `Unsupported`.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with every extraction backend enabled at build time.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "office")]
        {
            registry.register(FileKind::WordDocument, Box::new(WordExtractor));
            registry.register(FileKind::Presentation, Box::new(PresentationExtractor));
            registry.register(FileKind::Spreadsheet, Box::new(SpreadsheetExtractor));
        }

        #[cfg(feature = "pdf")]
        {
            registry.register(FileKind::Pdf, Box::new(PdfExtractor));
        }

        registry
    }

    pub fn register(&mut self, kind: FileKind, extractor: Box<dyn TextExtractor>) {
        self.extractors.insert(kind, extractor);
    }

    pub fn get(&self, kind: FileKind) -> Option<&dyn TextExtractor> {
        self.extractors.get(&kind).map(|e| e.as_ref())
    }

    /// Compose extraction with the digest primitive. `Unsupported` is a
    /// non-error outcome: no strategy is registered for the kind, or the
    /// strategy cannot parse this particular file. Extraction failures on
    /// a declared-parseable file surface as `Extraction` errors.
    pub fn content_digest(
        &self,
        path: &Path,
        kind: FileKind,
    ) -> Result<ContentDigest, DocDiffError> {
        let Some(extractor) = self.get(kind) else {
            return Ok(ContentDigest::Unsupported);
        };
        if !extractor.supports(path) {
            return Ok(ContentDigest::Unsupported);
        }
        let text = extractor.extract(path)?;
        Ok(ContentDigest::Digest(text_digest(&text)))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(any(feature = "office", feature = "pdf"))]
fn extraction_error(path: &Path, reason: impl std::fmt::Display) -> DocDiffError {
    DocDiffError::Extraction {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(feature = "office")]
fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Collect the text runs of an OOXML part: the character content of every
/// `text_tag` element, with a newline at the close of every `para_tag`.
#[cfg(feature = "office")]
fn ooxml_run_text(
    path: &Path,
    xml: &str,
    text_tag: &[u8],
    para_tag: &[u8],
) -> Result<String, DocDiffError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|e| extraction_error(path, e))? {
            Event::Start(e) if e.name().as_ref() == text_tag => in_text = true,
            Event::End(e) if e.name().as_ref() == text_tag => in_text = false,
            Event::End(e) if e.name().as_ref() == para_tag => out.push('\n'),
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| extraction_error(path, e))?;
                out.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(feature = "office")]
fn read_zip_part(
    archive: &mut zip::ZipArchive<std::fs::File>,
    path: &Path,
    name: &str,
) -> Result<String, DocDiffError> {
    use std::io::Read;

    let mut part = archive
        .by_name(name)
        .map_err(|e| extraction_error(path, format!("missing part {}: {}", name, e)))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| extraction_error(path, e))?;
    Ok(xml)
}

#[cfg(feature = "office")]
fn open_ooxml_container(path: &Path) -> Result<zip::ZipArchive<std::fs::File>, DocDiffError> {
    let file = std::fs::File::open(path)?;
    zip::ZipArchive::new(file).map_err(|e| extraction_error(path, e))
}

/// Word document (.docx) extraction: paragraph text from the main
/// document part
#[cfg(feature = "office")]
pub struct WordExtractor;

#[cfg(feature = "office")]
impl TextExtractor for WordExtractor {
    fn extract(&self, path: &Path) -> Result<String, DocDiffError> {
        let mut archive = open_ooxml_container(path)?;
        let xml = read_zip_part(&mut archive, path, "word/document.xml")?;
        ooxml_run_text(path, &xml, b"w:t", b"w:p")
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "docx")
    }
}

/// Presentation (.pptx) extraction: text runs of every slide, in slide order
#[cfg(feature = "office")]
pub struct PresentationExtractor;

#[cfg(feature = "office")]
impl TextExtractor for PresentationExtractor {
    fn extract(&self, path: &Path) -> Result<String, DocDiffError> {
        let mut archive = open_ooxml_container(path)?;

        let mut slides: Vec<(usize, String)> = archive
            .file_names()
            .filter_map(|name| {
                let index = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse::<usize>()
                    .ok()?;
                Some((index, name.to_string()))
            })
            .collect();
        slides.sort();

        let mut text = String::new();
        for (_, name) in slides {
            let xml = read_zip_part(&mut archive, path, &name)?;
            text.push_str(&ooxml_run_text(path, &xml, b"a:t", b"a:p")?);
        }
        Ok(text)
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "pptx")
    }
}

/// Spreadsheet (.xlsx) extraction: every sheet rendered as a `Sheet:` header
/// followed by rows of tab-separated cell values
#[cfg(feature = "office")]
pub struct SpreadsheetExtractor;

#[cfg(feature = "office")]
impl TextExtractor for SpreadsheetExtractor {
    fn extract(&self, path: &Path) -> Result<String, DocDiffError> {
        use calamine::{open_workbook_auto, Reader};

        let mut workbook = open_workbook_auto(path).map_err(|e| extraction_error(path, e))?;
        let sheet_names = workbook.sheet_names().to_vec();

        let mut text = String::new();
        for name in sheet_names {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| extraction_error(path, e))?;

            text.push_str("Sheet: ");
            text.push_str(&name);
            text.push('\n');

            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
                text.push_str(&cells.join("\t"));
                text.push('\n');
            }
        }
        Ok(text)
    }
}

/// PDF extraction with a two-tier fallback: a full-fidelity extractor
/// first, then a simpler text-stream scan, and only then an error.
#[cfg(feature = "pdf")]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, DocDiffError> {
        match pdf_extract::extract_text(path) {
            Ok(text) => Ok(text),
            Err(primary) => {
                debug!(
                    "Primary PDF extraction failed for {:?} ({}), trying fallback",
                    path, primary
                );
                match lopdf_text(path) {
                    Ok(text) => Ok(text),
                    Err(fallback) => Err(extraction_error(
                        path,
                        format!("primary: {}; fallback: {}", primary, fallback),
                    )),
                }
            }
        }
    }
}

#[cfg(feature = "pdf")]
fn lopdf_text(path: &Path) -> Result<String, lopdf::Error> {
    let doc = lopdf::Document::load(path)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
}
