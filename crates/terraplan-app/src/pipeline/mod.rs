//! Pure pipeline transformations that operate on document data.
//!
//! Modules under this namespace must remain free of IO and external side
//! effects so they can be reused across orchestrators and test harnesses.

pub mod analysis;
pub mod chunker;
pub mod prompts;
pub mod row;

pub use analysis::{ANALYSIS_SLOTS, AnalysisResult, parse_structured_summary};
pub use chunker::{Cl100kCounter, TokenCounter, split_into_chunks};
pub use row::{ColumnKind, ColumnValue, KEY_COLUMN, MunicipalityRow, RowError, columns};
