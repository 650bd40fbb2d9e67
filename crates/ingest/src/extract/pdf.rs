use super::ReadError;
use lopdf::Document;
use std::path::Path;

/// Text of every page in page order, pages separated by a newline.
pub(crate) fn read_pdf(path: &Path) -> Result<String, ReadError> {
    let doc = Document::load(path)?;
    let pages = doc
        .get_pages()
        .into_keys()
        .map(|page| doc.extract_text(&[page]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pages.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// One page per entry, each page showing its text in Courier.
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
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
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn pages_are_read_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.pdf");
        write_pdf(&path, &["Week one", "Week two", "Week three"]);

        let text = read_pdf(&path).unwrap();
        let one = text.find("Week one").unwrap();
        let two = text.find("Week two").unwrap();
        let three = text.find("Week three").unwrap();
        assert!(one < two && two < three, "{}", text);
    }

    #[test]
    fn garbage_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(read_pdf(&path).is_err());
    }
}
