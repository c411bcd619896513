//! # Mapper
//!
//! Schema-aware CRUD on top of a pluggable storage driver.
//!
//! ## Flow
//!
//! - `insert`: Inputer (full) → `Driver::insert`
//! - `find`: `Driver::find` with readable columns and join descriptors →
//!   Outputer (full) under the caller's projection
//! - `update`: Inputer (partial) → `Driver::update`
//! - `delete`: straight to the driver
//!
//! Schema violations are counted and logged as rejections before anything
//! reaches the driver.

mod crud;
mod driver;
mod errors;
mod memory;

pub use crud::Mapper;
pub use driver::{Driver, Select, Target};
pub use errors::{DriverError, DriverResult, MapperError, MapperResult};
pub use memory::MemoryDriver;
