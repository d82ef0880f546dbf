//! Multi-format text extraction for uploaded documents.
//!
//! Given a file's raw bytes and its declared MIME type, produces plain UTF-8
//! text for chunking and embedding. PDF extraction uses `pdf-extract`; OOXML
//! formats (DOCX, XLSX) are read as ZIP archives with streaming XML parsing.
//! Presentations and images are degraded modes: they return a fixed
//! placeholder string rather than failing, so the document still completes.

use std::io::Read;

/// Supported MIME types.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Placeholder stored for presentation files (no PPTX text extraction).
pub const PRESENTATION_PLACEHOLDER: &str =
    "[Presentation content - text extraction not available]";
/// Placeholder stored for image files (no OCR).
pub const IMAGE_PLACEHOLDER: &str = "[Image content - text extraction not available]";

/// Maximum worksheets read from one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells read per worksheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. Converts into the pipeline taxonomy via
/// [`PipelineError`](crate::error::PipelineError).
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text from a file's bytes based on its declared MIME type.
///
/// Presentation and `image/*` types never touch the bytes: they return their
/// fixed placeholder regardless of content. Any other unregistered type is an
/// error naming the offending MIME string.
pub fn extract_text(bytes: &[u8], file_type: &str) -> Result<String, ExtractError> {
    match file_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_XLSX => extract_xlsx(bytes),
        MIME_PPTX => Ok(PRESENTATION_PLACEHOLDER.to_string()),
        t if t.starts_with("image/") => Ok(IMAGE_PLACEHOLDER.to_string()),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

// ============ DOCX ============

/// Raw text from `word/document.xml`: `w:t` runs concatenated, with a
/// newline at every paragraph end. Formatting is discarded.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    // Paragraph newlines can leave a dangling trailing one.
    while out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

// ============ XLSX ============

/// Textual rendering of every worksheet: a `Sheet: {name}` header followed by
/// rows of tab-separated cell values, one sheet per blank-line-separated
/// block.
fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = read_workbook_sheet_names(&mut archive)?;
    let sheet_files = list_worksheet_files(&mut archive);

    let mut blocks = Vec::new();
    for (idx, file) in sheet_files.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let name = sheet_names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| worksheet_file_stem(&file));
        let xml = read_zip_entry_bounded(&mut archive, &file, MAX_XML_ENTRY_BYTES)?;
        let table = render_worksheet(&xml, &shared_strings)?;
        if table.is_empty() {
            blocks.push(format!("Sheet: {}", name));
        } else {
            blocks.push(format!("Sheet: {}\n{}", name, table));
        }
    }
    Ok(blocks.join("\n\n"))
}

/// Shared string table (`xl/sharedStrings.xml`). Missing table means the
/// workbook simply has no shared strings.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Sheet names from `xl/workbook.xml`, in workbook order. Workbook order
/// matches the `sheetN.xml` numbering produced by common writers; a missing
/// name falls back to the worksheet file stem.
fn read_workbook_sheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    if archive.by_name("xl/workbook.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;

    let mut names = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            names.push(String::from_utf8_lossy(attr.value.as_ref()).into_owned());
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

fn list_worksheet_files(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut files: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    files.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    files
}

fn worksheet_file_stem(file: &str) -> String {
    file.trim_start_matches("xl/worksheets/")
        .trim_end_matches(".xml")
        .to_string()
}

/// How a cell's `<v>` (or inline `<t>`) content should be interpreted,
/// from the cell's `t` attribute.
#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    /// Index into the shared string table (`t="s"`).
    Shared,
    /// Inline string (`t="inlineStr"`, value inside `<is><t>`).
    Inline,
    /// Number, boolean, or formula string — rendered verbatim.
    Direct,
}

/// Render one worksheet as rows of tab-separated cell values.
fn render_worksheet(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cell_kind = CellKind::Direct;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    cell_kind = CellKind::Direct;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            cell_kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Direct,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if cell_kind == CellKind::Inline => in_inline_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_value || in_inline_text => {
                let raw = te.unescape().unwrap_or_default();
                let value = raw.trim();
                if !value.is_empty() {
                    let rendered = match cell_kind {
                        CellKind::Shared => value
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                            .cloned(),
                        CellKind::Inline | CellKind::Direct => Some(value.to_string()),
                    };
                    if let Some(text) = rendered {
                        current_row.push(text);
                        cell_count += 1;
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"row" => {
                    if !current_row.is_empty() {
                        rows.push(current_row.join("\t"));
                        current_row.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        build_zip(&[("word/document.xml", &xml)])
    }

    #[test]
    fn unregistered_content_type_is_an_error() {
        let err = extract_text(b"foo", "application/zip").unwrap_err();
        match err {
            ExtractError::UnsupportedContentType(ct) => assert_eq!(ct, "application/zip"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn presentation_returns_placeholder_regardless_of_content() {
        let text = extract_text(b"\x00garbage\xff", MIME_PPTX).unwrap();
        assert_eq!(text, PRESENTATION_PLACEHOLDER);
    }

    #[test]
    fn images_return_placeholder_regardless_of_content() {
        for mime in ["image/png", "image/jpeg", "image/webp"] {
            let text = extract_text(b"\x89PNG or not", mime).unwrap();
            assert_eq!(text, IMAGE_PLACEHOLDER);
        }
    }

    #[test]
    fn docx_extracts_paragraph_text() {
        let bytes = docx_with_paragraphs(&["First paragraph.", "Second paragraph."]);
        let text = extract_text(&bytes, MIME_DOCX).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn docx_without_document_xml_is_an_error() {
        let bytes = build_zip(&[("word/other.xml", "<x/>")]);
        assert!(matches!(
            extract_text(&bytes, MIME_DOCX).unwrap_err(),
            ExtractError::Ooxml(_)
        ));
    }

    #[test]
    fn docx_unescapes_entities() {
        let bytes = docx_with_paragraphs(&["Fish &amp; chips"]);
        let text = extract_text(&bytes, MIME_DOCX).unwrap();
        assert_eq!(text, "Fish & chips");
    }

    #[test]
    fn xlsx_renders_sheets_with_headers() {
        let workbook = r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheets><sheet name="Budget" sheetId="1"/><sheet name="Notes" sheetId="2"/></sheets></workbook>"#;
        let shared = r#"<?xml version="1.0"?><sst><si><t>Revenue</t></si><si><t>Cost</t></si></sst>"#;
        let sheet1 = r#"<?xml version="1.0"?><worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1200</v></c></row><row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>340</v></c></row></sheetData></worksheet>"#;
        let sheet2 = r#"<?xml version="1.0"?><worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Q3 planning notes</t></is></c></row></sheetData></worksheet>"#;
        let bytes = build_zip(&[
            ("xl/workbook.xml", workbook),
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet1),
            ("xl/worksheets/sheet2.xml", sheet2),
        ]);

        let text = extract_text(&bytes, MIME_XLSX).unwrap();
        assert_eq!(
            text,
            "Sheet: Budget\nRevenue\t1200\nCost\t340\n\nSheet: Notes\nQ3 planning notes"
        );
    }

    #[test]
    fn xlsx_without_shared_strings_still_extracts_numbers() {
        let sheet = r#"<worksheet><sheetData><row><c><v>42</v></c><c><v>7</v></c></row></sheetData></worksheet>"#;
        let bytes = build_zip(&[("xl/worksheets/sheet1.xml", sheet)]);
        let text = extract_text(&bytes, MIME_XLSX).unwrap();
        assert_eq!(text, "Sheet: sheet1\n42\t7");
    }
}
