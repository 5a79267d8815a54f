//! Cell and header normalization.
//!
//! - [`number`]: locale currency text to `f64`, fail-to-zero
//! - [`dates`]: day-first date parsing and the save format
//! - [`columns`]: header trimming and synonym rewrites

pub mod columns;
pub mod dates;
pub mod number;

pub use columns::{canonical, canonical_header, normalize_headers, ALIASES};
pub use dates::{format_date, parse_date, parse_date_str};
pub use number::{coerce_number, parse_amount, to_number, Coerced};
