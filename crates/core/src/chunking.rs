use crate::error::IngestError;
use crate::models::ChunkingConfig;

/// Split-point priority: paragraph breaks, then line breaks, then spaces,
/// then raw character boundaries. Earlier separators give semantically
/// meaningful cuts; the empty separator is the last resort.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// One "small-to-big" record: the child span is what gets embedded, the
/// parent text is the retrieval-time context payload, and `parent_index` is
/// a back-reference into the parent sequence of the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalChunk {
    pub child_text: String,
    pub parent_text: String,
    pub parent_index: usize,
}

/// Recursive separator-priority splitter over character counts.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    split_with(text, &SEPARATORS, chunk_size, overlap)
}

/// Parent/child chunking. Parents are cut first at the large geometry, then
/// each parent is re-cut at the small geometry. Empty input produces zero
/// chunks and a warning, never an error; a document shorter than one child
/// yields exactly one parent/child pair equal to the whole text.
pub fn chunk_parent_child(
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<HierarchicalChunk>, IngestError> {
    validate(config)?;

    if text.trim().is_empty() {
        tracing::warn!("document text is empty, no chunks produced");
        return Ok(Vec::new());
    }

    let parents = split_text(text, config.parent_size, config.parent_overlap);
    let mut chunks = Vec::new();

    for (parent_index, parent_text) in parents.iter().enumerate() {
        for child_text in split_text(parent_text, config.child_size, config.child_overlap) {
            chunks.push(HierarchicalChunk {
                child_text,
                parent_text: parent_text.clone(),
                parent_index,
            });
        }
    }

    tracing::debug!(
        parents = parents.len(),
        children = chunks.len(),
        "hierarchical chunking complete"
    );

    Ok(chunks)
}

fn validate(config: &ChunkingConfig) -> Result<(), IngestError> {
    if config.parent_size == 0 || config.child_size == 0 {
        return Err(IngestError::InvalidChunkConfig(
            "chunk sizes must be non-zero".to_string(),
        ));
    }
    if config.parent_overlap >= config.parent_size || config.child_overlap >= config.child_size {
        return Err(IngestError::InvalidChunkConfig(
            "overlap must be smaller than the chunk size".to_string(),
        ));
    }
    Ok(())
}

fn split_with(text: &str, separators: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let chosen = separators
        .iter()
        .position(|sep| !sep.is_empty() && text.contains(sep));

    let (sep, rest) = match chosen {
        Some(index) => (separators[index], &separators[index + 1..]),
        None => return char_windows(text, chunk_size, overlap),
    };

    let mut chunks = Vec::new();
    let mut mergeable: Vec<&str> = Vec::new();

    for split in text.split(sep) {
        if split.chars().count() <= chunk_size {
            mergeable.push(split);
            continue;
        }

        if !mergeable.is_empty() {
            chunks.extend(merge_splits(&mergeable, sep, chunk_size, overlap));
            mergeable.clear();
        }

        chunks.extend(split_with(split, rest, chunk_size, overlap));
    }

    if !mergeable.is_empty() {
        chunks.extend(merge_splits(&mergeable, sep, chunk_size, overlap));
    }

    chunks
}

/// Greedily joins consecutive splits back with their separator up to the
/// target size, carrying a tail of splits from one chunk into the next so
/// adjacent chunks share up to `overlap` characters. Rejoining with the same
/// separator keeps every chunk an exact substring of the input.
fn merge_splits(splits: &[&str], sep: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = sep.chars().count();
    let joined_len = |parts: &[&str]| -> usize {
        if parts.is_empty() {
            0
        } else {
            parts.iter().map(|part| part.chars().count()).sum::<usize>()
                + sep_len * (parts.len() - 1)
        }
    };

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for &split in splits {
        let split_len = split.chars().count();

        if !current.is_empty() && joined_len(&current) + sep_len + split_len > chunk_size {
            chunks.push(current.join(sep));

            while !current.is_empty()
                && (joined_len(&current) > overlap
                    || joined_len(&current) + sep_len + split_len > chunk_size)
            {
                current.remove(0);
            }
        }

        current.push(split);
    }

    if !current.is_empty() {
        chunks.push(current.join(sep));
    }

    chunks
}

fn char_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(parent: usize, parent_overlap: usize, child: usize, child_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            parent_size: parent,
            parent_overlap,
            child_size: child,
            child_overlap,
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunks = chunk_parent_child("   \n\n  ", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_yields_one_parent_child_pair() {
        let text = "El Modelo 036 es la declaración censal de alta.";
        let chunks = chunk_parent_child(text, &ChunkingConfig::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].child_text, text);
        assert_eq!(chunks[0].parent_text, text);
        assert_eq!(chunks[0].parent_index, 0);
    }

    #[test]
    fn every_chunk_is_a_substring_of_its_origin() {
        let text = "alfa bravo charlie delta echo\n\nfoxtrot golf hotel india juliett\n\nkilo lima mike november oscar papa quebec";
        let chunks = chunk_parent_child(text, &config(40, 10, 15, 4)).unwrap();

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                text.contains(&chunk.parent_text),
                "parent not a substring: {:?}",
                chunk.parent_text
            );
            assert!(
                chunk.parent_text.contains(&chunk.child_text),
                "child not inside its parent: {:?}",
                chunk.child_text
            );
        }
    }

    #[test]
    fn parent_indices_are_dense_and_in_range() {
        let text = "alfa bravo charlie delta echo foxtrot golf hotel india juliett kilo lima mike november";
        let chunks = chunk_parent_child(text, &config(30, 8, 12, 3)).unwrap();

        let max_index = chunks.iter().map(|c| c.parent_index).max().unwrap();
        for index in 0..=max_index {
            assert!(
                chunks.iter().any(|c| c.parent_index == index),
                "no child references parent {index}"
            );
        }
    }

    #[test]
    fn parents_cover_the_whole_text_with_overlap() {
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez once doce trece catorce quince";
        let parents = split_text(text, 30, 8);

        let mut covered_to = 0;
        for parent in &parents {
            let start = text
                .find(parent.as_str())
                .expect("parent must occur in source text");
            assert!(start <= covered_to, "gap before {parent:?}");
            covered_to = covered_to.max(start + parent.len());
        }
        assert_eq!(covered_to, text.len(), "parents do not reach the end");
    }

    #[test]
    fn unbroken_text_falls_back_to_character_windows() {
        let text = "x".repeat(95);
        let pieces = split_text(&text, 40, 10);

        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.chars().count() <= 40);
        }
        // step is 30 chars (size minus overlap): windows at 0, 30, and 60.
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn paragraph_breaks_win_over_mid_sentence_cuts() {
        let text = "primer párrafo corto\n\nsegundo párrafo algo más largo que el primero";
        let pieces = split_text(text, 40, 5);

        assert!(pieces.iter().any(|p| p == "primer párrafo corto"));
    }

    #[test]
    fn overlap_larger_than_size_is_rejected() {
        let result = chunk_parent_child("texto", &config(10, 10, 4, 1));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
