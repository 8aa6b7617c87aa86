//! Input tables and the validated allocation data built from them
pub mod allocation_data;
pub mod error;
pub mod table;

pub use allocation_data::AllocationData;
pub use error::DataIntegrityError;
pub use table::{InputTables, RawTable};
