//! Composite-index coverage validation.

mod validator;

pub use validator::{IndexCoverageValidator, IndexField, IndexOrder, IndexReport, IndexSpec};
