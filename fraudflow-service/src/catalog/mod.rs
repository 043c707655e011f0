// Catalog Module
// Built-in dataset pipelines

pub mod fraud;

pub use fraud::{fraud_detection, FRAUD_DETECTION_DATASETS};
