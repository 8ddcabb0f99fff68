//! Plain-text extraction
//!
//! Content is taken as-is (lossy UTF-8), with line-preserving chunking as
//! the only structural breakdown.

use super::{StructureRecord, StructureType};
use crate::errors::ExtractError;
use text_splitter::{ChunkConfig, TextSplitter};

/// Extract text content and chunk structures from plain-text bytes
pub(super) fn extract(
    bytes: &[u8],
    chunk_size: usize,
) -> Result<(String, Vec<StructureRecord>), ExtractError> {
    let content = String::from_utf8_lossy(bytes).replace("\r\n", "\n");

    if content.trim().is_empty() {
        return Err(ExtractError::Unreadable(
            "no text content in file".to_string(),
        ));
    }

    let splitter = TextSplitter::new(ChunkConfig::new(chunk_size.max(1)));
    let structures = splitter
        .chunks(&content)
        .enumerate()
        .map(|(index, chunk)| {
            StructureRecord::new(StructureType::Chunk, chunk.to_string(), index as i64)
        })
        .collect();

    Ok((content, structures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preserved_and_chunked() {
        let text = "line one\nline two\nline three\n";
        let (content, structures) = extract(text.as_bytes(), 10).unwrap();

        assert_eq!(content, text);
        assert!(structures.len() > 1);
        assert!(structures
            .iter()
            .all(|s| s.structure_type == StructureType::Chunk));
        // Chunk positions are sequential
        for (i, s) in structures.iter().enumerate() {
            assert_eq!(s.position, i as i64);
        }
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let bytes = b"hello \xF0\x28\x8C\x28 world";
        let (content, _) = extract(bytes, 100).unwrap();
        assert!(content.contains("hello"));
        assert!(content.contains("world"));
    }

    #[test]
    fn test_whitespace_only_is_unreadable() {
        assert!(extract(b"   \n \t ", 100).is_err());
    }
}
