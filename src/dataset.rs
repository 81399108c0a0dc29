//! Dataset loading and the typed table model.
//!
//! - [`loader`]: bytes → [`Table`], with encoding and delimiter handling
//! - [`table`]: the immutable column-oriented table and its preview helpers

pub mod loader;
pub mod table;

pub use loader::{LoadOptions, load_table};
pub use table::{Column, ColumnKind, ColumnValues, FieldSuggestions, Table, format_number};
