//! Runnable pipelines.
pub mod nlp;
mod pipeline;

pub use nlp::NlpPipeline;
pub use pipeline::Pipeline;
