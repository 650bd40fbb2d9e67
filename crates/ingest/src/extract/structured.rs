use super::{read_text_lossy, ReadError};
use std::path::Path;

/// One line per record, fields joined with tabs.
pub(crate) fn read_delimited(path: &Path, delimiter: u8) -> Result<String, ReadError> {
    let text = read_text_lossy(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut out = String::new();
    for record in reader.records() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    Ok(out)
}

/// Re-serialise as pretty JSON, keeping key order and non-ASCII text.
pub(crate) fn read_json(path: &Path) -> Result<String, ReadError> {
    let text = read_text_lossy(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

pub(crate) fn read_yaml(path: &Path) -> Result<String, ReadError> {
    let text = read_text_lossy(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
    Ok(serde_yaml::to_string(&value)?)
}
