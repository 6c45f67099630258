//! Vocabulary: strings seen by a model, with their frequencies.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Doc;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vocab {
    lang: String,
    strings: BTreeMap<String, u64>,
}

impl Vocab {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
            strings: BTreeMap::new(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn count(&self, s: &str) -> u64 {
        self.strings.get(s).copied().unwrap_or(0)
    }

    pub fn add(&mut self, s: &str) {
        *self.strings.entry(s.to_string()).or_insert(0) += 1;
    }

    /// Add token texts and lemmas of `doc`. Whitespace tokens are not added.
    pub fn add_doc(&mut self, doc: &Doc) {
        for token in doc.tokens().iter().filter(|t| !t.is_space()) {
            self.add(&token.text);
            if let Some(lemma) = &token.lemma {
                if lemma != &token.text {
                    self.add(lemma);
                }
            }
        }
    }

    pub fn to_disk(&self, path: &Path) -> Result<(), Error> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    pub fn from_disk(path: &Path) -> Result<Self, Error> {
        let r = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(r)?)
    }
}
