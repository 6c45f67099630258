pub mod alert;
pub mod config;
pub mod error;
pub mod extractors;
pub mod io;
pub mod lang;
pub mod nlp;
pub mod pipelines;
