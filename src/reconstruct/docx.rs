use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::document::{OutputDocument, OutputParagraph};
use crate::error::ReconstructionError;

use super::UNAVAILABLE_PREFIX;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

type XmlWriter = Writer<Vec<u8>>;

/// Writes a minimal WordprocessingML package: one block per paragraph,
/// a next-page section break between pages.
pub fn write(document: &OutputDocument) -> Result<Vec<u8>, ReconstructionError> {
    let body = document_xml(document)?;

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", body.as_slice()),
    ] {
        writer
            .start_file(name, options)
            .map_err(|err| serialization(format!("failed to write zip entry {}: {}", name, err)))?;
        writer
            .write_all(content)
            .map_err(|err| serialization(format!("failed to write zip content {}: {}", name, err)))?;
    }
    let bytes = writer
        .finish()
        .map_err(|err| serialization(format!("failed to finalize zip output: {}", err)))?
        .into_inner();
    Ok(bytes)
}

fn document_xml(document: &OutputDocument) -> Result<Vec<u8>, ReconstructionError> {
    let mut writer = Writer::new(Vec::new());
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("w:document").with_attributes([("xmlns:w", WORD_NS)])),
    )?;
    emit(&mut writer, Event::Start(BytesStart::new("w:body")))?;

    let last = document.pages.len().saturating_sub(1);
    for (position, page) in document.pages.iter().enumerate() {
        if page.paragraphs.is_empty() {
            emit(&mut writer, Event::Empty(BytesStart::new("w:p")))?;
        }
        for paragraph in &page.paragraphs {
            write_paragraph(&mut writer, paragraph)?;
        }
        if position < last {
            write_section_break(&mut writer)?;
        }
    }

    write_section_properties(&mut writer)?;
    emit(&mut writer, Event::End(BytesEnd::new("w:body")))?;
    emit(&mut writer, Event::End(BytesEnd::new("w:document")))?;
    Ok(writer.into_inner())
}

fn write_paragraph(writer: &mut XmlWriter, paragraph: &OutputParagraph) -> Result<(), ReconstructionError> {
    emit(writer, Event::Start(BytesStart::new("w:p")))?;
    emit(writer, Event::Start(BytesStart::new("w:r")))?;
    if paragraph.unavailable {
        emit(writer, Event::Start(BytesStart::new("w:rPr")))?;
        emit(writer, Event::Empty(BytesStart::new("w:i")))?;
        emit(writer, Event::End(BytesEnd::new("w:rPr")))?;
    }

    let text = if paragraph.unavailable {
        format!("{}{}", UNAVAILABLE_PREFIX, paragraph.text)
    } else {
        paragraph.text.clone()
    };
    for (index, line) in xml_safe(&text).split('\n').enumerate() {
        if index > 0 {
            emit(writer, Event::Empty(BytesStart::new("w:br")))?;
        }
        emit(
            writer,
            Event::Start(BytesStart::new("w:t").with_attributes([("xml:space", "preserve")])),
        )?;
        emit(writer, Event::Text(BytesText::new(line)))?;
        emit(writer, Event::End(BytesEnd::new("w:t")))?;
    }

    emit(writer, Event::End(BytesEnd::new("w:r")))?;
    emit(writer, Event::End(BytesEnd::new("w:p")))
}

/// Drops characters XML 1.0 cannot carry, such as C0 controls other than tab and line breaks.
fn xml_safe(text: &str) -> Cow<'_, str> {
    fn allowed(ch: char) -> bool {
        matches!(ch, '\t' | '\n' | '\r') || (ch >= ' ' && !matches!(ch, '\u{FFFE}' | '\u{FFFF}'))
    }
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&ch| allowed(ch)).collect())
    }
}

fn write_section_break(writer: &mut XmlWriter) -> Result<(), ReconstructionError> {
    emit(writer, Event::Start(BytesStart::new("w:p")))?;
    emit(writer, Event::Start(BytesStart::new("w:pPr")))?;
    emit(writer, Event::Start(BytesStart::new("w:sectPr")))?;
    emit(
        writer,
        Event::Empty(BytesStart::new("w:type").with_attributes([("w:val", "nextPage")])),
    )?;
    emit(writer, Event::End(BytesEnd::new("w:sectPr")))?;
    emit(writer, Event::End(BytesEnd::new("w:pPr")))?;
    emit(writer, Event::End(BytesEnd::new("w:p")))
}

/// A4 with one-inch margins.
fn write_section_properties(writer: &mut XmlWriter) -> Result<(), ReconstructionError> {
    emit(writer, Event::Start(BytesStart::new("w:sectPr")))?;
    emit(
        writer,
        Event::Empty(BytesStart::new("w:pgSz").with_attributes([("w:w", "11906"), ("w:h", "16838")])),
    )?;
    emit(
        writer,
        Event::Empty(BytesStart::new("w:pgMar").with_attributes([
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
        ])),
    )?;
    emit(writer, Event::End(BytesEnd::new("w:sectPr")))
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), ReconstructionError> {
    writer
        .write_event(event)
        .map_err(|err| serialization(format!("failed to write xml: {}", err)))
}

fn serialization(message: String) -> ReconstructionError {
    ReconstructionError::SerializationFailed(message)
}
