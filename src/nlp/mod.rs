/*! NLP models

A [Language] is a loaded model package: a tokenizer followed by named [pipes::Pipe]s.
Packages live under a models directory and are resolved per language by the [ModelRegistry].

Processed documents ([Doc]) serialize to bytes, so they can be stored next to their
source row and reloaded without recomputation.
!*/
mod doc;
mod language;
pub mod pipes;
mod registry;
mod vocab;

pub use doc::{Doc, Pos, Token};
pub use language::{Language, LanguageBuilder, ModelMeta};
pub use registry::ModelRegistry;
pub use vocab::Vocab;
