//! Quarry extraction pipeline
//!
//! Turns stored uploads into extracted text, video frames, and structured
//! knowledge records:
//! - `intake`: file-kind detection and upload validation rules
//! - `text`: PDF / DOCX / plain-text extraction with structural breakdown
//! - `ocr`: OCR engine abstraction over the tesseract binary
//! - `video`: frame sampling through ffmpeg
//! - `knowledge`: entity / relationship / category / key-phrase extraction
//! - `pipeline` + `worker`: the asynchronous processing machinery

pub mod errors;
pub mod intake;
pub mod knowledge;
pub mod ocr;
pub mod pipeline;
pub mod text;
pub mod video;
pub mod worker;

pub use errors::ExtractError;
pub use pipeline::{ExtractionPipeline, JobOutcome};
pub use worker::{ExtractionJob, ExtractionPool, JobQueue};
