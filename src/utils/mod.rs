//! Shared utilities.
//!
//! Includes:
//! - Date/time helpers (lenient parsing of extraction-supplied timestamps)
//! - String normalization helpers
//! - Vector similarity (cosine, L2 normalization, top-k selection)

pub mod datetime;
pub mod similarity;
pub mod text;

pub use datetime::parse_flexible_datetime;
pub use similarity::{cosine_similarity, normalize_l2, top_k_by_cosine};
pub use text::{extract_json_from_response, normalize_whitespace, truncate_with_ellipsis};
