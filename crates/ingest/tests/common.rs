#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Write a ZIP container holding the given `(part name, contents)` entries.
pub fn write_zip(path: &Path, parts: &[(&str, String)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, contents) in parts {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn w_paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

/// Minimal word document: paragraphs, then one table.
pub fn write_docx(path: &Path, paragraphs: &[&str], table: &[&[&str]]) {
    let mut body: String = paragraphs.iter().map(|p| w_paragraph(p)).collect();
    if !table.is_empty() {
        body.push_str("<w:tbl><w:tblPr/>");
        for row in table {
            body.push_str("<w:tr>");
            for cell in row.iter() {
                body.push_str(&format!("<w:tc><w:tcPr/>{}</w:tc>", w_paragraph(cell)));
            }
            body.push_str("</w:tr>");
        }
        body.push_str("</w:tbl>");
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );
    write_zip(
        path,
        &[
            ("[Content_Types].xml", "<Types/>".to_string()),
            ("word/document.xml", document),
        ],
    );
}

/// Minimal presentation; each slide is a list of text frames.
pub fn write_pptx(path: &Path, slides: &[&[&str]]) {
    let mut parts = vec![("[Content_Types].xml", "<Types/>".to_string())];
    let names: Vec<String> = (1..=slides.len())
        .map(|i| format!("ppt/slides/slide{}.xml", i))
        .collect();
    for (name, frames) in names.iter().zip(slides.iter()) {
        let shapes: String = frames
            .iter()
            .map(|text| {
                format!(
                    r#"<p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                    text
                )
            })
            .collect();
        let xml = format!(
            r#"<?xml version="1.0"?><p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
            shapes
        );
        parts.push((name.as_str(), xml));
    }
    write_zip(path, &parts);
}

/// Minimal workbook with one sheet of shared-string rows.
pub fn write_xlsx(path: &Path, sheet_name: &str, rows: &[&[&str]]) {
    let mut strings = Vec::new();
    let mut sheet_rows = String::new();
    for (r, row) in rows.iter().enumerate() {
        sheet_rows.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let column = (b'A' + c as u8) as char;
            sheet_rows.push_str(&format!(
                r#"<c r="{}{}" t="s"><v>{}</v></c>"#,
                column,
                r + 1,
                strings.len()
            ));
            strings.push(value.to_string());
        }
        sheet_rows.push_str("</row>");
    }
    let shared: String = strings
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", s))
        .collect();

    write_zip(
        path,
        &[
            ("[Content_Types].xml", "<Types/>".to_string()),
            (
                "xl/workbook.xml",
                format!(
                    r#"<workbook xmlns:r="r"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    sheet_name
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/sharedStrings.xml",
                format!(r#"<sst count="{}">{}</sst>"#, strings.len(), shared),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(r#"<worksheet><sheetData>{}</sheetData></worksheet>"#, sheet_rows),
            ),
        ],
    );
}
