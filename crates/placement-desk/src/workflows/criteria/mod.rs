//! Free-form criteria text to flat attribute mappings.

mod normalizer;
mod parser;

pub use parser::{parse_criteria, CriteriaMapping};
