use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Metrics {
    pub counters: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramData>,
}

impl Metrics {
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
pub struct HistogramData {
    pub buckets: HashMap<String, f64>,
    pub sum: f64,
    pub count: f64,
}

/// Parse Prometheus text exposition into counters and histograms.
pub fn prom_parse(text: &str) -> Result<Metrics> {
    let mut metrics = Metrics::default();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((series, value)) = line.rsplit_once(' ') else {
            anyhow::bail!("malformed sample: {}", line);
        };
        let value: f64 = value.parse()?;
        let (name, labels) = match series.split_once('{') {
            Some((name, rest)) => (name, Some(rest.trim_end_matches('}'))),
            None => (series, None),
        };

        if let Some(base) = name.strip_suffix("_bucket") {
            let le = labels.and_then(label_le).unwrap_or("unknown").to_string();
            metrics.histograms.entry(base.to_string()).or_default().buckets.insert(le, value);
        } else if let Some(base) = histogram_base(&metrics, name, "_sum") {
            metrics.histograms.entry(base).or_default().sum = value;
        } else if let Some(base) = histogram_base(&metrics, name, "_count") {
            metrics.histograms.entry(base).or_default().count = value;
        } else {
            metrics.counters.insert(name.to_string(), value);
        }
    }

    Ok(metrics)
}

// Buckets precede `_sum` and `_count` in the exposition format.
fn histogram_base(metrics: &Metrics, name: &str, suffix: &str) -> Option<String> {
    let base = name.strip_suffix(suffix)?;
    metrics.histograms.contains_key(base).then(|| base.to_string())
}

fn label_le(labels: &str) -> Option<&str> {
    let start = labels.find("le=\"")? + 4;
    let end = labels[start..].find('"')?;
    Some(&labels[start..start + end])
}
