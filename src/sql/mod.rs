//! SQL text sent to osquery.
//!
//! - [`qualifier`] - predicate translation into a `WHERE` fragment
//! - [`select`] - row, metadata and table-list queries

pub mod qualifier;
pub mod select;

#[cfg(test)]
pub mod test_utils;

pub use qualifier::{
    translate_equality, QualValue, Qualifier, QualifierError, QualifierInput, QualifierSet,
    ValueRendering,
};
pub use select::{build_select, is_identifier, table_info, LIST_TABLES};
