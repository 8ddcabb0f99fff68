//! OCR engine abstraction
//!
//! `OcrEngine` is the seam the pipeline extracts image text through. The
//! production implementation drives the tesseract binary in TSV mode, which
//! yields per-word confidences and bounding boxes in one pass. Empty
//! recognized text is a valid outcome, not an error.

use crate::errors::ExtractError;
use async_trait::async_trait;
use quarry_common::config::OcrConfig;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// One recognized word with its bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRegion {
    pub text: String,
    /// Word confidence in [0, 1]
    pub confidence: f64,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// Result of an OCR pass over one image
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    /// Recognized text, line structure preserved
    pub text: String,
    /// Mean word confidence in [0, 1]; zero when nothing was recognized
    pub confidence: f64,
    pub regions: Vec<OcrRegion>,
}

/// Capability of recognizing text in a stored image file
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<OcrOutcome, ExtractError>;
}

/// OCR engine shelling out to the tesseract binary
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            language: config.language.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(skip(self), fields(image = %image.display()))]
    async fn recognize(&self, image: &Path) -> Result<OcrOutcome, ExtractError> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.language, "--psm", "3", "tsv"])
            .output()
            .await
            .map_err(|e| ExtractError::Tool {
                tool: "tesseract",
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            return Err(ExtractError::Unreadable(format!(
                "tesseract could not read the image: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let outcome = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(
            chars = outcome.text.len(),
            words = outcome.regions.len(),
            confidence = outcome.confidence,
            "OCR complete"
        );

        Ok(outcome)
    }
}

/// Parse tesseract TSV output into text, confidence, and word regions.
///
/// Columns: level page block par line word left top width height conf text.
/// Word rows have level 5 and a non-negative confidence.
pub fn parse_tsv(tsv: &str) -> OcrOutcome {
    let mut regions = Vec::new();
    let mut lines_out: Vec<String> = Vec::new();
    let mut current_key = None;
    let mut current_line = String::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level = cols[0].parse::<i64>().unwrap_or(-1);
        let conf = cols[10].parse::<f64>().unwrap_or(-1.0);
        let word = cols[11].trim();

        if level != 5 || conf < 0.0 || word.is_empty() {
            continue;
        }

        // (block, paragraph, line) identifies the text line a word is on
        let key = (
            cols[2].parse::<i64>().unwrap_or(0),
            cols[3].parse::<i64>().unwrap_or(0),
            cols[4].parse::<i64>().unwrap_or(0),
        );

        if current_key != Some(key) {
            if !current_line.is_empty() {
                lines_out.push(std::mem::take(&mut current_line));
            }
            current_key = Some(key);
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);

        regions.push(OcrRegion {
            text: word.to_string(),
            confidence: conf / 100.0,
            left: cols[6].parse().unwrap_or(0),
            top: cols[7].parse().unwrap_or(0),
            width: cols[8].parse().unwrap_or(0),
            height: cols[9].parse().unwrap_or(0),
        });
    }

    if !current_line.is_empty() {
        lines_out.push(current_line);
    }

    let confidence = if regions.is_empty() {
        0.0
    } else {
        regions.iter().map(|r| r.confidence).sum::<f64>() / regions.len() as f64
    };

    OcrOutcome {
        text: lines_out.join("\n"),
        confidence,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: i64, line: i64, word: i64, conf: f64, text: &str) -> String {
        format!(
            "5\t1\t{}\t1\t{}\t{}\t{}\t10\t50\t20\t{}\t{}",
            block,
            line,
            word,
            word * 60,
            conf,
            text
        )
    }

    #[test]
    fn test_parse_tsv_words_and_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t".to_string(),
            word_row(1, 1, 1, 96.0, "HAZARD:"),
            word_row(1, 1, 2, 91.0, "WEAR"),
            word_row(1, 1, 3, 93.0, "PPE"),
            word_row(1, 2, 1, 88.0, "Authorized"),
            word_row(1, 2, 2, 90.0, "personnel"),
        ]
        .join("\n");

        let outcome = parse_tsv(&tsv);
        assert_eq!(outcome.text, "HAZARD: WEAR PPE\nAuthorized personnel");
        assert_eq!(outcome.regions.len(), 5);
        assert!((outcome.confidence - 0.916).abs() < 0.001);
        assert_eq!(outcome.regions[0].text, "HAZARD:");
        assert!(outcome.regions[0].confidence > 0.95);
    }

    #[test]
    fn test_parse_tsv_empty_image() {
        let outcome = parse_tsv(HEADER);
        assert!(outcome.text.is_empty());
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.regions.is_empty());
    }

    #[test]
    fn test_low_level_rows_are_ignored() {
        let tsv = format!("{}\n4\t1\t1\t1\t1\t0\t0\t0\t100\t20\t-1\t\n", HEADER);
        let outcome = parse_tsv(&tsv);
        assert!(outcome.regions.is_empty());
    }
}
