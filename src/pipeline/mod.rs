// Data processing pipeline: processing, storage, and run orchestration

pub mod pipeline;
pub mod processing;
pub mod storage;

pub use pipeline::{Pipeline, RunReport, Stage, TableFailure};
