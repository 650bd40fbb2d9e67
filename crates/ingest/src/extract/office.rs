//! Readers for Office Open XML containers (docx, pptx, xlsx).
//!
//! The documents are ZIP archives of XML parts. Each part is walked as an
//! event stream and only the text-bearing elements are kept; layout is
//! ignored.

use super::ReadError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ReadError> {
    Ok(ZipArchive::new(File::open(path)?)?)
}

/// Read a part of the archive, `None` when it does not exist.
fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, ReadError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(super::decode_lossy(&bytes)))
}

fn require_part(archive: &mut ZipArchive<File>, name: &str) -> Result<String, ReadError> {
    read_part(archive, name)?.ok_or_else(|| ReadError::MissingPart(name.to_string()))
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReadError> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// docx

#[derive(Default)]
struct Table {
    rows: Vec<String>,
    cells: Vec<String>,
    lines: Vec<String>,
}

/// Paragraph and table state while walking `word/document.xml`.
#[derive(Default)]
struct DocxText {
    body: Vec<String>,
    table_rows: Vec<String>,
    tables: Vec<Table>,
    // Paragraphs being read, innermost last. Text boxes nest a paragraph
    // inside a run of another.
    open: Vec<String>,
    nested: Vec<String>,
    runs: usize,
    in_text: bool,
}

impl DocxText {
    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.open.last_mut() {
            paragraph.push_str(text);
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(text) = self.open.pop() else {
            return;
        };
        if !self.open.is_empty() {
            self.nested.push(text);
            return;
        }
        self.place(text);
        for text in std::mem::take(&mut self.nested) {
            self.place(text);
        }
    }

    fn place(&mut self, text: String) {
        match self.tables.last_mut() {
            Some(table) => table.lines.push(text),
            None if !text.is_empty() => self.body.push(text),
            None => {}
        }
    }

    fn finish_table(&mut self) {
        let Some(table) = self.tables.pop() else {
            return;
        };
        match self.tables.last_mut() {
            Some(outer) => outer.lines.extend(table.rows),
            None => self.table_rows.extend(table.rows),
        }
    }

    fn start(&mut self, name: &[u8]) {
        match name {
            b"w:p" => self.open.push(String::new()),
            b"w:r" => self.runs += 1,
            b"w:t" => self.in_text = true,
            b"w:tbl" => self.tables.push(Table::default()),
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.cells.clear();
                }
            }
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.lines.clear();
                }
            }
            _ => {}
        }
    }

    fn empty(&mut self, name: &[u8]) {
        match name {
            b"w:p" => {
                self.open.push(String::new());
                self.finish_paragraph();
            }
            b"w:tab" if self.runs > 0 => self.push_text("\t"),
            b"w:br" | b"w:cr" if self.runs > 0 => self.push_text("\n"),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:p" => self.finish_paragraph(),
            b"w:r" => self.runs = self.runs.saturating_sub(1),
            b"w:t" => self.in_text = false,
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    let cell = std::mem::take(&mut table.lines).join("\n");
                    table.cells.push(cell);
                }
            }
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    let row = std::mem::take(&mut table.cells).join("\t");
                    table.rows.push(row);
                }
            }
            b"w:tbl" => self.finish_table(),
            _ => {}
        }
    }
}

/// Non-empty body paragraphs, then the rows of every top-level table.
/// Rows of a nested table become lines of the cell holding it.
fn docx_text(xml: &str) -> Result<Vec<String>, ReadError> {
    let mut state = DocxText::default();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => state.start(e.name().as_ref()),
            Event::Empty(e) => state.empty(e.name().as_ref()),
            Event::End(e) => state.end(e.name().as_ref()),
            Event::Text(t) if state.in_text => state.push_text(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    let mut lines = state.body;
    lines.extend(state.table_rows);
    Ok(lines)
}

pub(crate) fn read_docx(path: &Path) -> Result<String, ReadError> {
    let mut archive = open_archive(path)?;
    let xml = require_part(&mut archive, "word/document.xml")?;
    Ok(docx_text(&xml)?.join("\n") + "\n")
}

// ---------------------------------------------------------------------------
// pptx

fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Text of each `<p:txBody>` on a slide, paragraphs joined by newlines.
fn slide_frames(xml: &str) -> Result<Vec<String>, ReadError> {
    let mut frames = Vec::new();
    let mut frame: Option<Vec<String>> = None;
    let mut paragraph: Option<String> = None;
    let mut in_text = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"p:txBody" => frame = Some(Vec::new()),
                b"a:p" if frame.is_some() => paragraph = Some(String::new()),
                b"a:t" => in_text = true,
                b"a:br" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"a:p" => {
                    if let Some(f) = frame.as_mut() {
                        f.push(String::new());
                    }
                }
                b"a:br" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    if let (Some(f), Some(p)) = (frame.as_mut(), paragraph.take()) {
                        f.push(p);
                    }
                }
                b"p:txBody" => {
                    let text = frame.take().unwrap_or_default().join("\n");
                    if !text.is_empty() {
                        frames.push(text);
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(frames)
}

/// `# Slide <n>` headers followed by the non-empty text frames of each slide.
pub(crate) fn read_pptx(path: &Path) -> Result<String, ReadError> {
    let mut archive = open_archive(path)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort();

    let mut lines = Vec::new();
    for (idx, (_, name)) in slides.iter().enumerate() {
        lines.push(format!("# Slide {}", idx + 1));
        let xml = require_part(&mut archive, name)?;
        lines.extend(slide_frames(&xml)?);
    }

    Ok(lines.join("\n") + "\n")
}

// ---------------------------------------------------------------------------
// xlsx

/// Zero-based column index of a cell reference such as `AB12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(n - 1)
}

fn row_number(reference: &str) -> Option<usize> {
    reference
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

/// Entries of `xl/sharedStrings.xml`; phonetic runs are skipped.
fn shared_strings(xml: &str) -> Result<Vec<String>, ReadError> {
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Sheet names in workbook order, paired with their part path in the archive.
fn workbook_sheets(workbook: &str, rels: &str) -> Result<Vec<(String, String)>, ReadError> {
    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut sheets = Vec::new();
    let mut reader = Reader::from_str(workbook);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                let (Some(name), Some(rel)) = (attribute(&e, b"name")?, attribute(&e, b"r:id")?)
                else {
                    continue;
                };
                let Some(target) = targets.get(&rel) else {
                    continue;
                };
                let part = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                };
                sheets.push((name, part));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// One `<c>` element while it is being read.
#[derive(Default)]
struct Cell {
    kind: Option<String>,
    value: Option<String>,
    inline: String,
}

impl Cell {
    fn render(self, strings: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .and_then(|v| v.trim().parse::<usize>().ok())
                .and_then(|i| strings.get(i).cloned())
                .unwrap_or_default(),
            Some("inlineStr") => self.inline,
            Some("b") => match self.value.as_deref() {
                Some("1") => "True".to_string(),
                Some("0") => "False".to_string(),
                _ => String::new(),
            },
            _ => self.value.unwrap_or_default(),
        }
    }
}

/// Rows of one worksheet; gaps between referenced cells and rows are filled
/// with empty values.
fn sheet_rows(xml: &str, strings: &[String]) -> Result<Vec<Vec<String>>, ReadError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell: Option<Cell> = None;
    let mut in_value = false;
    let mut in_text = false;

    let mut reader = Reader::from_str(xml);
    loop {
        let event = reader.read_event()?;
        let empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    if let Some(r) = attribute(&e, b"r")?.and_then(|r| r.parse::<usize>().ok()) {
                        while rows.len() + 1 < r {
                            rows.push(Vec::new());
                        }
                    }
                    cells = Vec::new();
                    if empty {
                        rows.push(std::mem::take(&mut cells));
                    }
                }
                b"c" => {
                    let position = attribute(&e, b"r")?
                        .filter(|r| row_number(r).is_some())
                        .and_then(|r| column_index(&r))
                        .unwrap_or(cells.len());
                    while cells.len() < position {
                        cells.push(String::new());
                    }
                    let started = Cell {
                        kind: attribute(&e, b"t")?,
                        ..Default::default()
                    };
                    if empty {
                        cells.push(started.render(strings));
                    } else {
                        cell = Some(started);
                    }
                }
                b"v" => in_value = !empty,
                b"t" => in_text = !empty,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"row" => rows.push(std::mem::take(&mut cells)),
                b"c" => {
                    if let Some(done) = cell.take() {
                        cells.push(done.render(strings));
                    }
                }
                b"v" => in_value = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_value || in_text => {
                if let Some(c) = cell.as_mut() {
                    let text = t.unescape()?;
                    if in_value {
                        c.value.get_or_insert_with(String::new).push_str(&text);
                    } else {
                        c.inline.push_str(&text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

/// A `# Sheet: <name>` header per worksheet, then tab-joined rows.
pub(crate) fn read_xlsx(path: &Path) -> Result<String, ReadError> {
    let mut archive = open_archive(path)?;
    let workbook = require_part(&mut archive, "xl/workbook.xml")?;
    let rels = require_part(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let strings = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut out = String::new();
    for (name, part) in workbook_sheets(&workbook, &rels)? {
        out.push_str(&format!("# Sheet: {}\n", name));
        let xml = require_part(&mut archive, &part)?;
        for row in sheet_rows(&xml, &strings)? {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(inner: &str) -> String {
        format!(r#"<w:document xmlns:w="w"><w:body>{}</w:body></w:document>"#, inner)
    }

    fn cell(text: &str) -> String {
        format!("<w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc>", text)
    }

    #[test]
    fn column_references() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("C7"), Some(2));
        assert_eq!(column_index("AA3"), Some(26));
        assert_eq!(column_index("12"), None);
        assert_eq!(row_number("AB12"), Some(12));
    }

    #[test]
    fn docx_runs_tabs_breaks_and_entities() {
        let xml = body(
            r#"<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> world</w:t><w:br/><w:t>&amp; more &#65;</w:t></w:r></w:p>"#,
        );
        assert_eq!(docx_text(&xml).unwrap(), vec!["Hello\t world\n& more A"]);
    }

    #[test]
    fn docx_paragraph_properties_are_not_text() {
        let xml = body(
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Title</w:t></w:r></w:p><w:p/><w:p w:rsidR="1"><w:r><w:t>Body</w:t></w:r></w:p>"#,
        );
        assert_eq!(docx_text(&xml).unwrap(), vec!["Title", "Body"]);
    }

    #[test]
    fn docx_nested_table_stays_in_its_cell() {
        let inner = format!("<w:tbl><w:tr>{}{}</w:tr></w:tbl>", cell("x"), cell("y"));
        let xml = body(&format!(
            "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
             <w:tbl><w:tr>{}<w:tc>{}</w:tc></w:tr><w:tr>{}{}</w:tr></w:tbl>\
             <w:p><w:r><w:t>Outro</w:t></w:r></w:p>",
            cell("a"),
            inner,
            cell("c"),
            cell("d"),
        ));
        assert_eq!(
            docx_text(&xml).unwrap(),
            vec!["Intro", "Outro", "a\tx\ty", "c\td"]
        );
    }

    #[test]
    fn docx_text_box_keeps_the_outer_paragraph_whole() {
        let xml = body(
            r#"<w:p><w:r><w:t>Before </w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t>after</w:t></w:r></w:p>"#,
        );
        assert_eq!(docx_text(&xml).unwrap(), vec!["Before after", "Boxed"]);
    }

    #[test]
    fn pptx_frames_join_paragraphs() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>Ownership</a:t></a:r></a:p><a:p><a:r><a:t>Borrowing</a:t></a:r><a:br><a:rPr/></a:br><a:r><a:t>rules</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:txBody><a:p/></p:txBody></p:sp></p:sld>"#;
        assert_eq!(slide_frames(xml).unwrap(), vec!["Ownership\nBorrowing\nrules"]);
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide1.xml.rels"), None);
    }

    #[test]
    fn xlsx_cells_fill_gaps_and_resolve_types() {
        let strings = vec!["Term".to_string(), "Lifetime".to_string()];
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
            <row r="3"><c r="A3"><v>42</v></c><c r="B3" t="b"><v>1</v></c><c r="C3" t="inlineStr"><is><t>inline &amp; more</t></is></c><c r="D3"/></row>
        </sheetData></worksheet>"#;
        let rows = sheet_rows(xml, &strings).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Term".to_string(), String::new(), "Lifetime".to_string()],
                Vec::<String>::new(),
                vec![
                    "42".to_string(),
                    "True".to_string(),
                    "inline & more".to_string(),
                    String::new(),
                ],
            ]
        );
    }

    #[test]
    fn shared_strings_skip_phonetic_runs() {
        let xml = r#"<sst><si><t>plain</t></si><si><r><t>rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si><si/></sst>"#;
        assert_eq!(shared_strings(xml).unwrap(), vec!["plain", "rich text", ""]);
    }

    #[test]
    fn workbook_sheets_follow_relationships() {
        let workbook = r#"<workbook><sheets><sheet name="Week 1" sheetId="1" r:id="rId2"/><sheet r:id="rId1" name="Notes &amp; Terms" sheetId="2"/></sheets></workbook>"#;
        let rels = r#"<Relationships><Relationship Id="rId1" Type="t" Target="worksheets/sheet2.xml"/><Relationship Target="/xl/worksheets/sheet1.xml" Id="rId2" Type="t"/></Relationships>"#;
        assert_eq!(
            workbook_sheets(workbook, rels).unwrap(),
            vec![
                ("Week 1".to_string(), "xl/worksheets/sheet1.xml".to_string()),
                ("Notes & Terms".to_string(), "xl/worksheets/sheet2.xml".to_string()),
            ]
        );
    }
}
