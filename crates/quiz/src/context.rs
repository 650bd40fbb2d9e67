use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use study_models::ChunkMeta;

/// Per-chunk overhead charged against the budget for the citation header.
const CHUNK_OVERHEAD: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedChunk {
    pub text: String,
    pub source: String,
    pub chunk: i64,
}

/// Select chunks for the prompt, spreading the budget across sources.
///
/// Chunks are grouped by source in first-seen order and shuffled within each
/// group, then taken round-robin. Each chunk costs its character length plus
/// a fixed overhead; packing stops at the first chunk that does not fit.
pub fn pack_context(
    docs: &[String],
    metas: &[ChunkMeta],
    char_budget: usize,
    seed: Option<u64>,
) -> Vec<PackedChunk> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<(&str, &ChunkMeta)>> = HashMap::new();
    for (text, meta) in docs.iter().zip(metas) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let source = meta.source.as_str();
        grouped
            .entry(source)
            .or_insert_with(|| {
                order.push(source);
                Vec::new()
            })
            .push((text, meta));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    for source in &order {
        if let Some(group) = grouped.get_mut(source) {
            group.shuffle(&mut rng);
        }
    }

    let mut packed = Vec::new();
    let mut used = 0;
    let mut cursor: HashMap<&str, usize> = order.iter().map(|s| (*s, 0)).collect();
    let mut active = order;

    while used < char_budget && !active.is_empty() {
        let mut still_active = Vec::with_capacity(active.len());
        for source in active {
            let group = &grouped[source];
            let idx = cursor[source];
            if idx >= group.len() {
                continue;
            }
            let (text, meta) = group[idx];
            cursor.insert(source, idx + 1);

            let cost = text.chars().count() + CHUNK_OVERHEAD;
            if used + cost > char_budget {
                return packed;
            }
            packed.push(PackedChunk {
                text: text.to_string(),
                source: meta.source.clone(),
                chunk: meta.chunk,
            });
            used += cost;
            still_active.push(source);
        }
        active = still_active;
    }
    packed
}
