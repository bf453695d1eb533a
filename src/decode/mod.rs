//! Source decoder module
//!
//! Supports: single JSON document, JSON array, JSON Lines
//!
//! # Overview
//!
//! Raw files are decoded into JSON values first and into typed records
//! second. A line or element that fails either step is skipped and counted
//! instead of failing the file.

mod decoders;
mod types;

pub use decoders::{AutoDecoder, JsonDecoder, JsonlDecoder};
pub use types::{Decoded, DecoderFormat, RecordDecoder};

/// Build the decoder for a format
pub fn decoder_for(format: DecoderFormat) -> Box<dyn RecordDecoder> {
    match format {
        DecoderFormat::Auto => Box::new(AutoDecoder::new()),
        DecoderFormat::Json => Box::new(JsonDecoder::new()),
        DecoderFormat::Jsonl => Box::new(JsonlDecoder::new()),
    }
}
