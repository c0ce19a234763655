//! Column schema types: model family tags and categorical codebooks.

mod column;
mod table;
mod types;

pub use column::{Codebook, ColumnSchema};
pub use table::TableSchema;
pub use types::ModelFamily;
