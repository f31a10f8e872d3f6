use crate::chunking::normalize_whitespace;
use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Source of per-page text for one PDF. Implementations return
/// whitespace-normalized text and leave out pages with nothing on them.
pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

/// Reads each page's text layer with lopdf. A page that fails to decode is
/// skipped; the file is only rejected when no page yields text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
        let page_numbers: Vec<u32> = document.get_pages().into_keys().collect();

        let pages: Vec<PageText> = page_numbers
            .iter()
            .filter_map(|&number| page_text(&document, number))
            .collect();

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "no readable text in {} page(s) of {}",
                page_numbers.len(),
                path.display()
            )));
        }
        if pages.len() < page_numbers.len() {
            debug!(
                file = %path.display(),
                readable = pages.len(),
                total = page_numbers.len(),
                "some pages have no text layer"
            );
        }

        Ok(pages)
    }
}

fn page_text(document: &Document, number: u32) -> Option<PageText> {
    match document.extract_text(&[number]) {
        Ok(raw) => {
            let text = normalize_whitespace(&raw);
            (!text.trim().is_empty()).then_some(PageText { number, text })
        }
        Err(error) => {
            debug!(page = number, %error, "skipping page without extractable text");
            None
        }
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(path)
}

#[cfg(test)]
mod tests {
    use super::extract_page_texts;
    use crate::IngestError;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_pdf(path: &Path, page_lines: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in page_lines {
            let operations = if line.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(extract_page_texts(&path), Err(IngestError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn blank_pages_are_left_out_and_text_is_normalized() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("patent.pdf");
        write_pdf(&path, &["Claim   one covers a widget.", "", "Claim two."])?;

        let pages = extract_page_texts(&path)?;

        let numbers: Vec<u32> = pages.iter().map(|page| page.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(pages[0].text.contains("Claim one covers a widget."));
        assert!(pages.iter().all(|page| !page.text.contains("  ")));
        Ok(())
    }

    #[test]
    fn pdf_without_any_text_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("scanned.pdf");
        write_pdf(&path, &["", ""])?;

        match extract_page_texts(&path) {
            Err(IngestError::PdfParse(details)) => assert!(details.contains("2 page(s)")),
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }
}
