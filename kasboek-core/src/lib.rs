//! kasboek-core: value types shared by the extractor, the archive, and the CLI

pub mod months;
pub mod record;
pub mod time;

pub use months::MonthTable;
pub use record::{DateResolution, ExtractionRecord};
pub use time::{FallbackTimestamp, parse_timezone};
