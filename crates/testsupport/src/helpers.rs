use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use study_models::Config;
use zip::ZipWriter;

/// A minimal `.docx` archive whose body holds one `<w:p>` per paragraph.
pub fn docx_bytes(paragraphs: &[&str]) -> Result<Vec<u8>> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}</w:body></w:document>"
        ),
        body
    );

    let mut data = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut data));
        zip.start_file("word/document.xml", zip::write::FileOptions::default())?;
        zip.write_all(document.as_bytes())?;
        zip.finish()?;
    }
    Ok(data)
}

/// Serialises `config` to `<dir>/studyforge.toml`.
pub fn write_config(dir: &Path, config: &Config) -> Result<PathBuf> {
    let path = dir.join("studyforge.toml");
    std::fs::write(&path, toml::to_string(config)?)?;
    Ok(path)
}

/// Poll until a condition is met or timeout
pub async fn poll_until<F, Fut>(
    description: &str,
    timeout_duration: Duration,
    mut condition: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let start = std::time::Instant::now();
    let poll_interval = Duration::from_millis(25);

    loop {
        if start.elapsed() >= timeout_duration {
            anyhow::bail!("Timeout waiting for: {}", description);
        }

        if condition().await? {
            return Ok(());
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn docx_contains_document_part() {
        let bytes = docx_bytes(&["Ownership", "Borrowing"]).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("<w:t>Borrowing</w:t>"));
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let err = poll_until("never", Duration::from_millis(60), || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("never"));
    }
}
