//! Conversion between the internal annotation model and exchange formats.
//!
//! Two directions, both free of store access:
//! - [`export`]: the canonical nested payload consumed by third-party NLU
//!   trainers.
//! - [`import`]: delimited text (CSV with a header row) into ordered row
//!   records.

pub mod export;
pub mod import;

pub use export::{to_exchange_format, ExchangeAnnotation, ExchangeEntity, ExchangePayload, ExchangeSample};
pub use import::{parse_delimited, ImportRow, ParsedRow, RowParseError, INTENT_COLUMN, NONE_INTENT, TEXT_COLUMN};
