// Dataset Module
// Dataset node definitions and their registry

pub mod node;
pub mod registry;

pub use node::{DatasetNode, DatasetSpec};
pub use registry::DatasetRegistry;
