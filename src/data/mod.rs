//! Data ingestion
//!
//! CSV loading, the column-oriented table and the Burn dataset of encoded rows.

pub mod dataset;
pub mod loader;
pub mod table;

pub use dataset::OutcomeDataset;
pub use loader::{load_table, read_table};
pub use table::{Column, Table};
