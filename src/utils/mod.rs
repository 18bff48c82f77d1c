//! Shared utility functions for vyvchai.

pub mod json_extraction;

pub use json_extraction::{
    extract_json_from_response, extract_json_value, find_matching_close,
    try_extract_json_from_response, JsonExtractionError, JsonExtractionResult,
};
