//! DOCX text extraction
//!
//! Walks the document body in order: paragraph text, heading styles, and
//! tables serialized row per line with ` | ` between cells.

use super::{StructureRecord, StructureType};
use crate::errors::ExtractError;
use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent,
    TableChild, TableRowChild,
};
use tracing::debug;

/// Extract text content and structures from DOCX bytes
pub(super) fn extract(bytes: &[u8]) -> Result<(String, Vec<StructureRecord>), ExtractError> {
    let docx = read_docx(bytes)
        .map_err(|e| ExtractError::Unreadable(format!("failed to parse DOCX: {}", e)))?;

    let mut parts: Vec<String> = Vec::new();
    let mut structures = Vec::new();
    let mut position: i64 = 0;

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if text.trim().is_empty() {
                    continue;
                }

                position += 1;
                if let Some(level) = heading_level(paragraph) {
                    let mut record =
                        StructureRecord::new(StructureType::Heading, text.clone(), position);
                    record.level = Some(level);
                    structures.push(record);
                } else {
                    structures.push(StructureRecord::new(
                        StructureType::Paragraph,
                        text.clone(),
                        position,
                    ));
                }
                parts.push(text);
            }
            DocumentChild::Table(table) => {
                let rows = table_rows(table);
                if rows.is_empty() {
                    continue;
                }

                position += 1;
                let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
                let serialized = rows
                    .iter()
                    .map(|row| row.join(" | "))
                    .collect::<Vec<_>>()
                    .join("\n");

                let mut record =
                    StructureRecord::new(StructureType::Table, serialized.clone(), position);
                record.metadata = serde_json::json!({
                    "rows": rows.len(),
                    "columns": columns,
                });
                structures.push(record);
                parts.push(serialized);
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        return Err(ExtractError::Unreadable(
            "no text content extracted from DOCX".to_string(),
        ));
    }

    let content = parts.join("\n");
    debug!(
        units = structures.len(),
        content_len = content.len(),
        "DOCX text extraction complete"
    );

    Ok((content, structures))
}

/// Concatenate the run text of a paragraph
fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();

    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    RunChild::Break(_) => text.push('\n'),
                    _ => {}
                }
            }
        }
    }

    text
}

/// Heading level from the paragraph style (Heading1, Heading2, ...)
fn heading_level(paragraph: &Paragraph) -> Option<i64> {
    let style = paragraph.property.style.as_ref()?;
    let digits = style.val.strip_prefix("Heading")?;
    digits.parse::<i64>().ok().filter(|l| (1..=9).contains(l))
}

/// Collect cell text of a table, row by row
fn table_rows(table: &Table) -> Vec<Vec<String>> {
    let mut rows = Vec::new();

    for row_child in &table.rows {
        let TableChild::TableRow(row) = row_child;
        let mut cells = Vec::new();

        for cell_child in &row.cells {
            let TableRowChild::TableCell(cell) = cell_child;
            let mut cell_text = String::new();

            for content in &cell.children {
                if let TableCellContent::Paragraph(paragraph) = content {
                    let text = paragraph_text(paragraph);
                    if !text.trim().is_empty() {
                        if !cell_text.is_empty() {
                            cell_text.push(' ');
                        }
                        cell_text.push_str(text.trim());
                    }
                }
            }

            cells.push(cell_text);
        }

        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells);
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run};
    use std::io::Cursor;

    fn docx_bytes(mut docx: Docx) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_paragraphs_and_headings_in_order() {
        let docx = Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Pump Maintenance"))
                    .style("Heading1"),
            )
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Check the valve daily.")));

        let (content, structures) = extract(&docx_bytes(docx)).unwrap();

        assert!(content.starts_with("Pump Maintenance"));
        assert!(content.contains("Check the valve daily."));

        let heading = structures
            .iter()
            .find(|s| s.structure_type == StructureType::Heading)
            .expect("heading structure");
        assert_eq!(heading.level, Some(1));
        assert_eq!(heading.content, "Pump Maintenance");
    }

    #[test]
    fn test_table_serialization() {
        use docx_rs::{TableCell, TableRow};

        let table = Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(
                Paragraph::new().add_run(Run::new().add_text("Part")),
            ),
            TableCell::new().add_paragraph(
                Paragraph::new().add_run(Run::new().add_text("Qty")),
            ),
        ])]);

        let docx = Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Inventory")))
            .add_table(table);

        let (content, structures) = extract(&docx_bytes(docx)).unwrap();

        assert!(content.contains("Part | Qty"));
        assert!(structures
            .iter()
            .any(|s| s.structure_type == StructureType::Table));
    }

    #[test]
    fn test_corrupt_bytes_are_unreadable() {
        let err = extract(b"definitely not a zip container").unwrap_err();
        assert!(matches!(err, ExtractError::Unreadable(_)));
    }
}
