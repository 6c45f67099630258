/*! Loaded NLP pipelines.

A model package is a directory holding:

- `meta.json`: language, name, version and the ordered list of pipes,
- `lemma_lookup.json` (optional): lowercased form → lemma table used by the lemmatizer.

```json
{"lang": "de", "name": "core_news_lg", "version": "3.2.0", "pipeline": ["tagger", "lemmatizer", "senter"]}
```
!*/
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use super::pipes::{Lemmatizer, Pipe, Senter, Tagger};
use super::{Doc, Vocab};
use crate::error::Error;

const META_FILE: &str = "meta.json";
const LEMMA_LOOKUP_FILE: &str = "lemma_lookup.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub lang: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub pipeline: Vec<String>,
}

impl ModelMeta {
    pub fn from_dir(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(META_FILE);
        let f = File::open(&path)
            .map_err(|e| Error::ModelMeta(format!("could not open {:?}: {}", path, e)))?;
        serde_json::from_reader(BufReader::new(f))
            .map_err(|e| Error::ModelMeta(format!("invalid {:?}: {}", path, e)))
    }
}

type BoxedPipe = Box<dyn Pipe + Send + Sync>;

/// A loaded pipeline for one language.
pub struct Language {
    meta: ModelMeta,
    pipes: Vec<BoxedPipe>,
    vocab: Vocab,
    max_length: usize,
    pool: ThreadPool,
}

impl Language {
    pub fn lang(&self) -> &str {
        &self.meta.lang
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Names of the enabled pipes, in processing order.
    pub fn pipe_names(&self) -> Vec<&'static str> {
        self.pipes.iter().map(|p| p.name()).collect()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Continue from the vocabulary saved at `path` by a previous run, if any.
    pub fn load_vocab(&mut self, path: &Path) -> Result<(), Error> {
        if !path.exists() {
            return Ok(());
        }
        let vocab = Vocab::from_disk(path)?;
        if vocab.lang() != self.lang() {
            return Err(Error::ModelMeta(format!(
                "vocabulary {:?} is for language {}, expected {}",
                path,
                vocab.lang(),
                self.lang()
            )));
        }
        debug!("[{}] loaded {} strings from {:?}", self.lang(), vocab.len(), path);
        self.vocab = vocab;
        Ok(())
    }

    /// Tokenize `text` and run it through every enabled pipe.
    ///
    /// Does not update the vocabulary, see [Language::pipe].
    pub fn process(&self, text: &str) -> Result<Doc, Error> {
        if text.len() > self.max_length {
            return Err(Error::TextTooLong {
                length: text.len(),
                max_length: self.max_length,
            });
        }
        let mut doc = Doc::tokenize(text);
        for pipe in &self.pipes {
            pipe.process(&mut doc);
        }
        Ok(doc)
    }

    /// Process `texts` on the model's worker pool, keeping input order.
    ///
    /// `batch_size` is the minimum number of texts handed to a worker at once.
    /// Strings of the processed documents are added to the vocabulary.
    pub fn pipe(&mut self, texts: &[&str], batch_size: usize) -> Result<Vec<Doc>, Error> {
        let docs: Vec<Doc> = {
            let this = &*self;
            this.pool.install(|| {
                texts
                    .par_iter()
                    .with_min_len(batch_size.max(1))
                    .map(|text| this.process(text))
                    .collect::<Result<Vec<_>, Error>>()
            })?
        };

        for doc in &docs {
            self.vocab.add_doc(doc);
        }
        Ok(docs)
    }
}

/// [Language] builder.
pub struct LanguageBuilder {
    path: Option<PathBuf>,
    disable: Vec<String>,
    max_length: usize,
    n_process: usize,
}

impl Default for LanguageBuilder {
    fn default() -> Self {
        Self {
            path: None,
            disable: Vec::new(),
            max_length: 1_000_000,
            n_process: 0,
        }
    }
}

impl LanguageBuilder {
    /// Model package directory.
    pub fn path(&mut self, path: &Path) -> &mut LanguageBuilder {
        self.path = Some(path.to_path_buf());
        self
    }

    /// Pipes to leave out. Names that are not in the model are ignored.
    pub fn disable(&mut self, pipes: &[String]) -> &mut LanguageBuilder {
        self.disable = pipes.to_vec();
        self
    }

    pub fn max_length(&mut self, max_length: usize) -> &mut LanguageBuilder {
        self.max_length = max_length;
        self
    }

    /// Worker threads for [Language::pipe]. 0 means one per core.
    pub fn n_process(&mut self, n_process: usize) -> &mut LanguageBuilder {
        self.n_process = n_process;
        self
    }

    fn make_pipe(name: &str, dir: &Path) -> Result<BoxedPipe, Error> {
        match name {
            "tagger" => Ok(Box::new(Tagger)),
            "senter" => Ok(Box::new(Senter)),
            "lemmatizer" => {
                let path = dir.join(LEMMA_LOOKUP_FILE);
                let lookup: HashMap<String, String> = if path.exists() {
                    serde_json::from_reader(BufReader::new(File::open(&path)?))?
                } else {
                    debug!("no lemma lookup table at {:?}", path);
                    HashMap::new()
                };
                Ok(Box::new(Lemmatizer::new(lookup)))
            }
            other => Err(Error::ModelMeta(format!(
                "unsupported pipe {:?} in {:?}",
                other, dir
            ))),
        }
    }

    pub fn build(&self) -> Result<Language, Error> {
        let dir = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Custom("No model path provided".to_string()))?;
        let meta = ModelMeta::from_dir(dir)?;

        for name in &self.disable {
            if !meta.pipeline.contains(name) {
                debug!("[{}] pipe {} is not part of {}", meta.lang, name, meta.name);
            }
        }

        let pipes = meta
            .pipeline
            .iter()
            .filter(|name| !self.disable.contains(*name))
            .map(|name| Self::make_pipe(name, dir))
            .collect::<Result<Vec<_>, Error>>()?;

        if pipes.is_empty() {
            warn!("[{}] every pipe of {} is disabled", meta.lang, meta.name);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.n_process)
            .build()?;

        let language = Language {
            vocab: Vocab::new(&meta.lang),
            pipes,
            max_length: self.max_length,
            pool,
            meta,
        };

        info!(
            "[{}] loaded {} {} with pipes {:?}",
            language.lang(),
            language.meta.name,
            language.meta.version,
            language.pipe_names()
        );
        Ok(language)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::nlp::Pos;

    fn model_dir(pipeline: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        let meta = ModelMeta {
            lang: "fr".to_string(),
            name: "core_news_lg".to_string(),
            version: "3.2.0".to_string(),
            pipeline: pipeline.iter().map(|p| p.to_string()).collect(),
        };
        std::fs::write(
            dir.path().join(META_FILE),
            serde_json::to_vec(&meta).unwrap(),
        )
        .unwrap();
        dir
    }

    #[test]
    fn disabled_pipes_are_not_run() {
        let dir = model_dir(&["tagger", "lemmatizer", "senter"]);
        let model = LanguageBuilder::default()
            .path(dir.path())
            .disable(&["senter".to_string(), "ner".to_string()])
            .build()
            .unwrap();

        assert_eq!(model.pipe_names(), vec!["tagger", "lemmatizer"]);

        let doc = model.process("Le recours est admis.").unwrap();
        let first = &doc.tokens()[0];
        assert_eq!(first.pos, Some(Pos::Word));
        assert_eq!(first.lemma.as_deref(), Some("le"));
        assert_eq!(first.sent_start, None);
    }

    #[test]
    fn lemma_lookup_is_loaded() {
        let dir = model_dir(&["lemmatizer"]);
        std::fs::write(
            dir.path().join(LEMMA_LOOKUP_FILE),
            r#"{"recours": "recourir"}"#,
        )
        .unwrap();
        let model = LanguageBuilder::default()
            .path(dir.path())
            .build()
            .unwrap();

        let doc = model.process("Recours").unwrap();
        assert_eq!(doc.tokens()[0].lemma.as_deref(), Some("recourir"));
    }

    #[test]
    fn unsupported_pipe_fails_loading() {
        let dir = model_dir(&["tagger", "parser"]);
        let res = LanguageBuilder::default().path(dir.path()).build();
        assert!(matches!(res, Err(Error::ModelMeta(_))));
    }

    #[test]
    fn missing_meta_fails_loading() {
        let dir = tempdir().unwrap();
        let res = LanguageBuilder::default().path(dir.path()).build();
        assert!(matches!(res, Err(Error::ModelMeta(_))));
    }

    #[test]
    fn pipe_keeps_order_and_fills_vocab() {
        let dir = model_dir(&["tagger"]);
        let mut model = LanguageBuilder::default()
            .path(dir.path())
            .n_process(2)
            .build()
            .unwrap();

        let texts: Vec<String> = (0..50).map(|i| format!("arrêt {}", i)).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let docs = model.pipe(&texts, 4).unwrap();

        assert_eq!(docs.len(), 50);
        for (doc, text) in docs.iter().zip(&texts) {
            assert_eq!(&doc.text(), text);
        }
        assert_eq!(model.vocab().count("arrêt"), 50);
    }

    #[test]
    fn too_long_text_is_an_error() {
        let dir = model_dir(&["tagger"]);
        let mut model = LanguageBuilder::default()
            .path(dir.path())
            .max_length(5)
            .build()
            .unwrap();

        let res = model.pipe(&["short", "much too long"], 1);
        assert!(matches!(
            res,
            Err(Error::TextTooLong {
                length: 13,
                max_length: 5
            })
        ));
    }

    #[test]
    fn saved_vocab_is_continued() {
        let dir = model_dir(&["tagger"]);
        let mut model = LanguageBuilder::default()
            .path(dir.path())
            .build()
            .unwrap();
        let path = dir.path().join("_vocab_fr.spacy");

        model.load_vocab(&path).unwrap();
        assert!(model.vocab().is_empty());

        let mut saved = Vocab::new("fr");
        saved.add("arrêt");
        saved.to_disk(&path).unwrap();

        model.load_vocab(&path).unwrap();
        model.pipe(&["arrêt"], 1).unwrap();
        assert_eq!(model.vocab().count("arrêt"), 2);

        Vocab::new("de").to_disk(&path).unwrap();
        assert!(matches!(model.load_vocab(&path), Err(Error::ModelMeta(_))));
    }
}
