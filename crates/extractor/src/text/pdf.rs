//! PDF text extraction
//!
//! Walks each page's content stream and pulls text out of the BT/ET text
//! blocks (Tj, TJ, ' and " operators). Page boundaries become `page`
//! structures; runs of column-aligned lines become `table` structures.

use super::{StructureRecord, StructureType};
use crate::errors::ExtractError;
use tracing::{debug, warn};

/// Extract text content and structures from PDF bytes
pub(super) fn extract(bytes: &[u8]) -> Result<(String, Vec<StructureRecord>), ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Unreadable(format!("failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    let mut structures = Vec::new();

    debug!(page_count = doc.get_pages().len(), "Extracting text from PDF");

    for (index, page_id) in doc.page_iter().enumerate() {
        let page_number = (index + 1) as i64;

        let mut lines = match doc.get_page_content(page_id) {
            Ok(content) => extract_lines_from_content(&content),
            Err(e) => {
                warn!(page = page_number, error = %e, "Failed to read page content, skipping");
                Vec::new()
            }
        };

        // The operator walk handles uncompressed text streams; fall back to
        // lopdf's own extractor for anything it could not decode.
        if lines.iter().all(|l| l.trim().is_empty()) {
            if let Ok(text) = doc.extract_text(&[page_number as u32]) {
                lines = text.lines().map(clean_line).collect();
            }
        }

        let page_text = lines
            .iter()
            .map(|l| l.as_str())
            .filter(|l| !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if page_text.is_empty() {
            continue;
        }

        for table in detect_tables(&lines) {
            let columns = table.iter().map(|row| row.len()).max().unwrap_or(0);
            let serialized = table
                .iter()
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n");

            let mut record =
                StructureRecord::new(StructureType::Table, serialized, page_number);
            record.metadata = serde_json::json!({
                "rows": table.len(),
                "columns": columns,
                "page": page_number,
            });
            structures.push(record);
        }

        structures.push(StructureRecord::new(
            StructureType::Page,
            page_text.clone(),
            page_number,
        ));
        pages.push(page_text);
    }

    if pages.is_empty() {
        return Err(ExtractError::Unreadable(
            "no text content extracted from PDF".to_string(),
        ));
    }

    let content = pages.join("\n\n");
    debug!(
        pages = pages.len(),
        content_len = content.len(),
        "PDF text extraction complete"
    );

    Ok((content, structures))
}

/// Extract text lines from a PDF content stream
fn extract_lines_from_content(content: &[u8]) -> Vec<String> {
    let content_str = String::from_utf8_lossy(content);
    let mut lines = Vec::new();
    let mut in_text_block = false;
    let mut current_line = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_line.is_empty() {
                lines.push(clean_line(&current_line));
                current_line.clear();
            }
            continue;
        }

        if in_text_block {
            // Text showing operators: Tj, TJ, ', "
            if let Some(text) = extract_text_from_operator(trimmed) {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(&text);
            }

            // Td/TD/T* move to a new line within the block
            if (trimmed.ends_with("Td") || trimmed.ends_with("TD") || trimmed == "T*")
                && !current_line.is_empty()
            {
                lines.push(clean_line(&current_line));
                current_line.clear();
            }
        }
    }

    if !current_line.is_empty() {
        lines.push(clean_line(&current_line));
    }

    lines
}

/// Extract text from a PDF text operator
fn extract_text_from_operator(line: &str) -> Option<String> {
    // Handle (text) Tj operator
    if line.ends_with("Tj") || line.ends_with("'") || line.ends_with("\"") {
        if let Some(start) = line.find('(') {
            if let Some(end) = line.rfind(')') {
                if start < end {
                    let text = &line[start + 1..end];
                    return Some(decode_pdf_string(text));
                }
            }
        }
    }

    // Handle [(text) num (text) num] TJ operator (array of text)
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => {
                    in_paren = true;
                }
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => {
                    current.push(ch);
                }
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Normalize whitespace within a line, keeping 2+-space gaps as cell breaks
fn clean_line(line: &str) -> String {
    let mut cleaned = String::with_capacity(line.len());
    let mut spaces = 0usize;

    for ch in line.trim().chars() {
        if ch == ' ' || ch == '\t' {
            spaces += 1;
            continue;
        }
        if spaces > 0 {
            cleaned.push_str(if spaces >= 2 { "  " } else { " " });
            spaces = 0;
        }
        cleaned.push(ch);
    }

    cleaned
}

/// Split a line into table cells on tab or 2+-space gaps
fn split_cells(line: &str) -> Vec<String> {
    line.split(['\t'])
        .flat_map(|part| part.split("  "))
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect()
}

/// Best-effort table detection: two or more consecutive lines that split
/// into two or more cells are treated as one table.
fn detect_tables(lines: &[String]) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in lines {
        let cells = split_cells(line);
        if cells.len() >= 2 {
            current.push(cells);
        } else {
            if current.len() >= 2 {
                tables.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }

    if current.len() >= 2 {
        tables.push(current);
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_extract_tj_operator() {
        assert_eq!(
            extract_text_from_operator("(Hello World) Tj").as_deref(),
            Some("Hello World")
        );
        assert_eq!(
            extract_text_from_operator("[(Hel) -20 (lo)] TJ").as_deref(),
            Some("Hello")
        );
        assert_eq!(extract_text_from_operator("100 700 Td"), None);
    }

    #[test]
    fn test_extract_lines_from_stream() {
        let stream = b"BT\n/F1 12 Tf\n100 700 Td\n(Safety Manual) Tj\nET\nBT\n(Page one text) Tj\nET\n";
        let lines = extract_lines_from_content(stream);
        assert_eq!(lines, vec!["Safety Manual", "Page one text"]);
    }

    #[test]
    fn test_corrupt_bytes_are_unreadable() {
        let err = extract(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, ExtractError::Unreadable(_)));
    }

    #[test]
    fn test_detect_tables() {
        let lines: Vec<String> = vec![
            "Intro paragraph".into(),
            "Part  Qty  Price".into(),
            "Valve  2  40".into(),
            "Pump  1  900".into(),
            "Closing remark".into(),
        ];

        let tables = detect_tables(&lines);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][0], vec!["Part", "Qty", "Price"]);
    }

    #[test]
    fn test_single_aligned_line_is_not_a_table() {
        let lines: Vec<String> = vec!["Part  Qty".into(), "prose".into()];
        assert!(detect_tables(&lines).is_empty());
    }
}
