//! Splits long-form topic articles into anchored sections and pairs them with
//! illustrations, backed by a small SQLite content catalog.

pub mod db;
pub mod illustrations;
pub mod import;
pub mod parser;

pub use parser::{partition, Partition, Section};
