//! Bundled data source implementations

mod fixture;
mod memory;

pub use fixture::{FixtureDocument, FixtureSource};
pub use memory::MemorySource;
