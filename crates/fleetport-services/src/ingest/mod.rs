//! Import side: parse, normalize, persist, summarize.

mod import;
mod normalizer;
mod parser;

pub use import::{summary_message, ImportPipeline, RowOutcome};
pub use normalizer::{normalize, parse_date, RowRejection};
pub use parser::{normalize_header, parse_file, ParseError, RawRow, TabularFormat};
