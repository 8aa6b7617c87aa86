//! Core of runalloc, a crate for allocating full size runs of SKUs to store doors.
//!
//! Input tables are validated into an [`data::AllocationData`] snapshot, translated into
//! an integer program maximizing the tier/heat score of shipped runs, solved with one of
//! the backends in [`optimize::solvers`], and read back into allocation and constraint
//! slack rows.

pub mod allocation;
pub mod configuration;
pub mod data;
pub mod error;
pub mod io;
pub mod optimize;

pub use allocation::{run_allocation, AllocationReport};
pub use configuration::Configuration;
pub use error::AllocationError;
