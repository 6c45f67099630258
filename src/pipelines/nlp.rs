//! NLP enrichment pipeline
//!
//! Runs the language models over every chamber partition and stores the processed documents
//! next to their source rows, so that later analyses can use them without recomputation.
//!
//! # Layout
//!
//! ```text
//! <split_dir>/<lang>/<chamber>.parquet            input partitions
//! <spacy_dir>/<lang>/<chamber>/<chunk>.parquet    input rows + `spacy_doc_bytes`
//! <spacy_dir>/<lang>/chambers_processed.txt       ledger
//! <spacy_dir>/<lang>/_vocab_<lang>.spacy          vocabulary snapshot
//! ```
//!
//! # Processing
//! 1. For each language, the model is loaded (without the disabled pipes).
//! 1. Chambers listed in the ledger are skipped.
//! 1. Each remaining chamber is streamed in chunks of `chunk_size` rows. Each chunk is enriched and written
//!    before the next one is read, which bounds memory: processed documents are much larger than their text.
//! 1. A chamber is added to the ledger once all its chunks are written.
//! 1. Once a language is done, its vocabulary is saved and the model is dropped.
//!
//! A chamber is considered already processed when its chunk 0 exists (unless `override` is set).
//! With [ResumeMode::EveryChunk], each chunk is checked individually instead.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{AsArray, BinaryArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use itertools::Itertools;
use log::{debug, info};

use crate::config::{NlpSettings, ResumeMode, Settings};
use crate::error::Error;
use crate::io::store::{append_column, list_partitions, open_batches, partition_path};
use crate::io::{ChunkStore, Chunks, Ledger};
use crate::nlp::{Doc, Language, LanguageBuilder, ModelRegistry};
use crate::pipelines::Pipeline;

/// Column holding the source text.
pub const TEXT_COLUMN: &str = "text";
/// Column holding the serialized processed documents.
pub const DOC_BYTES_COLUMN: &str = "spacy_doc_bytes";

const LEDGER_FILE: &str = "chambers_processed.txt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChamberOutcome {
    pub chunks_written: usize,
    pub chunks_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageSummary {
    pub lang: String,
    pub chambers_found: usize,
    /// chambers skipped because they are in the ledger
    pub chambers_in_ledger: usize,
    pub chambers_processed: usize,
    pub chunks_written: usize,
    pub chunks_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub languages: Vec<LanguageSummary>,
}

impl RunSummary {
    pub fn chunks_written(&self) -> usize {
        self.languages.iter().map(|l| l.chunks_written).sum()
    }

    pub fn get(&self, lang: &str) -> Option<&LanguageSummary> {
        self.languages.iter().find(|l| l.lang == lang)
    }
}

pub struct NlpPipeline {
    languages: Vec<String>,
    split_dir: PathBuf,
    spacy_dir: PathBuf,
    registry: ModelRegistry,
    options: NlpSettings,
}

impl NlpPipeline {
    pub fn new(settings: &Settings) -> Self {
        Self {
            languages: settings.languages(),
            split_dir: settings.split_dir(),
            spacy_dir: settings.spacy_dir(),
            registry: ModelRegistry::new(&settings.dir.models_dir, settings.models.clone()),
            options: settings.nlp.clone(),
        }
    }

    pub fn ledger_path(&self, lang: &str) -> PathBuf {
        self.spacy_dir.join(lang).join(LEDGER_FILE)
    }

    pub fn vocab_path(&self, lang: &str) -> PathBuf {
        self.spacy_dir.join(lang).join(format!("_vocab_{}.spacy", lang))
    }

    pub fn store(&self, lang: &str) -> ChunkStore {
        ChunkStore::new(&self.spacy_dir.join(lang))
    }

    fn load_model(&self, lang: &str) -> Result<Language, Error> {
        let mut builder = LanguageBuilder::default();
        builder
            .disable(&self.options.disable_pipes())
            .max_length(self.options.max_length)
            .n_process(self.options.n_process);
        self.registry.load(lang, &mut builder)
    }

    /// Process every chamber of `lang` that is not in the ledger yet.
    fn run_language(&self, lang: &str) -> Result<LanguageSummary, Error> {
        info!("[{}] processing language", lang);
        let mut model = self.load_model(lang)?;
        let vocab_path = self.vocab_path(lang);
        model.load_vocab(&vocab_path)?;

        let in_dir = self.split_dir.join(lang);
        let out_dir = self.spacy_dir.join(lang);
        std::fs::create_dir_all(&out_dir)?;

        let chambers = list_partitions(&in_dir)?;
        info!("[{}] found {} chambers in total", lang, chambers.len());

        let mut ledger = Ledger::open(&self.ledger_path(lang))?;
        info!(
            "[{}] found {} chamber(s) already processed",
            lang,
            ledger.len()
        );

        let pending = ledger.pending(chambers.iter().cloned());
        info!(
            "[{}] still {} chamber(s) remaining to process: {}",
            lang,
            pending.len(),
            pending.iter().join(", ")
        );

        let mut summary = LanguageSummary {
            lang: lang.to_string(),
            chambers_found: chambers.len(),
            chambers_in_ledger: chambers.len() - pending.len(),
            ..Default::default()
        };

        let store = self.store(lang);
        self.process_chambers(&mut model, &pending, &mut ledger, &in_dir, &store, &mut summary)?;

        model.vocab().to_disk(&vocab_path)?;
        debug!(
            "[{}] saved vocabulary of {} strings to {:?}",
            lang,
            model.vocab().len(),
            vocab_path
        );

        Ok(summary)
    }

    /// Process `chambers` one after the other, recording each one once it is done.
    fn process_chambers(
        &self,
        model: &mut Language,
        chambers: &HashSet<String>,
        ledger: &mut Ledger,
        in_dir: &Path,
        store: &ChunkStore,
        summary: &mut LanguageSummary,
    ) -> Result<(), Error> {
        for chamber in chambers {
            let input = partition_path(in_dir, chamber);
            let outcome = self.process_chamber(model, &input, chamber, store)?;

            ledger.record(chamber)?;

            summary.chambers_processed += 1;
            summary.chunks_written += outcome.chunks_written;
            summary.chunks_skipped += outcome.chunks_skipped;
        }
        Ok(())
    }

    /// Create and save the processed documents of a chamber, chunk by chunk.
    pub fn process_chamber(
        &self,
        model: &mut Language,
        input: &Path,
        chamber: &str,
        store: &ChunkStore,
    ) -> Result<ChamberOutcome, Error> {
        let lang = model.lang().to_string();
        let override_chunks = self.options.override_chunks;
        let first_chunk_path = store.chunk_path(chamber, 0);

        if !override_chunks
            && self.options.resume == ResumeMode::FirstChunk
            && first_chunk_path.exists()
        {
            info!(
                "[{}] processed docs already exist at {:?}. To calculate again set 'override' to true.",
                lang, first_chunk_path
            );
            return Ok(ChamberOutcome {
                chunks_written: 0,
                chunks_skipped: store.nb_chunks(chamber),
            });
        }

        let chunk_size = self.options.chunk_size;
        let (nb_rows, reader) = open_batches(input, chunk_size)?;
        info!(
            "[{}] processing the {} decisions from chamber {}",
            lang, nb_rows, chamber
        );

        let schema = reader.schema();
        if schema.index_of(TEXT_COLUMN).is_err() {
            return Err(Error::MissingColumn {
                column: TEXT_COLUMN.to_string(),
                path: Some(input.to_path_buf()),
            });
        }

        if override_chunks {
            store.clear(chamber)?;
        }

        let mut outcome = ChamberOutcome::default();
        for (chunk_num, chunk) in Chunks::new(reader, schema, chunk_size)?.enumerate() {
            let chunk = chunk?;

            if !override_chunks
                && self.options.resume == ResumeMode::EveryChunk
                && store.exists(chamber, chunk_num)
            {
                debug!("[{}] {} chunk {} already exists", lang, chamber, chunk_num);
                outcome.chunks_skipped += 1;
                continue;
            }

            info!(
                "[{}] processing chunk {} and saving it to {:?}",
                lang,
                chunk_num,
                store.chunk_path(chamber, chunk_num)
            );
            let enriched = enrich_chunk(model, &chunk, self.options.batch_size)?;
            store.write_chunk(chamber, chunk_num, &enriched)?;
            outcome.chunks_written += 1;
        }

        Ok(outcome)
    }
}

/// Run `model` on the text column of `chunk` and append the serialized documents.
///
/// Null texts are processed as empty texts. An existing document column is replaced.
pub fn enrich_chunk(
    model: &mut Language,
    chunk: &RecordBatch,
    batch_size: usize,
) -> Result<RecordBatch, Error> {
    let texts = chunk
        .column_by_name(TEXT_COLUMN)
        .ok_or_else(|| Error::MissingColumn {
            column: TEXT_COLUMN.to_string(),
            path: None,
        })?;
    let texts = cast(texts, &DataType::Utf8)?;
    let texts = texts
        .as_string_opt::<i32>()
        .ok_or_else(|| Error::Custom("text column is not a string column".to_string()))?;
    let texts: Vec<&str> = texts.iter().map(|t| t.unwrap_or_default()).collect();

    let doc_bytes = model
        .pipe(&texts, batch_size)?
        .iter()
        .map(Doc::to_bytes)
        .collect::<Result<Vec<_>, Error>>()?;

    append_column(
        chunk,
        Field::new(DOC_BYTES_COLUMN, DataType::Binary, false),
        Arc::new(BinaryArray::from_iter_values(doc_bytes)),
    )
}

impl Pipeline<RunSummary> for NlpPipeline {
    fn version() -> &'static str {
        "1.0.0"
    }

    fn run(&self) -> Result<RunSummary, Error> {
        info!(
            "started running nlp pipeline {} on the texts of {:?}",
            Self::version(),
            self.languages
        );

        let mut summary = RunSummary::default();
        for lang in &self.languages {
            summary.languages.push(self.run_language(lang)?);
        }

        info!(
            "finished running nlp pipeline on the texts ({} chunks written)",
            summary.chunks_written()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::Schema;
    use tempfile::tempdir;

    use super::*;

    fn model() -> (tempfile::TempDir, Language) {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("meta.json"),
            r#"{"lang": "de", "name": "core_news_lg", "pipeline": ["tagger", "lemmatizer"]}"#,
        )
        .unwrap();
        let model = LanguageBuilder::default()
            .path(dir.path())
            .n_process(1)
            .build()
            .unwrap();
        (dir, model)
    }

    fn chunk(texts: Vec<Option<&str>>) -> RecordBatch {
        let ids: Vec<i64> = (0..texts.len() as i64).collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new(TEXT_COLUMN, DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(texts)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn enrich_appends_doc_column() {
        let (_dir, mut model) = model();
        let input = chunk(vec![Some("Die Beschwerde wird abgewiesen."), None]);

        let enriched = enrich_chunk(&mut model, &input, 1).unwrap();
        assert_eq!(enriched.num_columns(), 3);
        assert_eq!(enriched.num_rows(), 2);
        assert_eq!(enriched.column(0).as_ref(), input.column(0).as_ref());

        let bytes = enriched
            .column_by_name(DOC_BYTES_COLUMN)
            .unwrap()
            .as_binary::<i32>();
        let doc = Doc::from_bytes(bytes.value(0)).unwrap();
        assert_eq!(doc.text(), "Die Beschwerde wird abgewiesen.");
        assert_eq!(doc.tokens()[1].lemma.as_deref(), Some("beschwerde"));

        let empty = Doc::from_bytes(bytes.value(1)).unwrap();
        assert!(empty.is_empty());
        assert!(!bytes.is_null(1));
    }

    #[test]
    fn enrich_replaces_existing_doc_column() {
        let (_dir, mut model) = model();
        let once = enrich_chunk(&mut model, &chunk(vec![Some("Urteil")]), 1).unwrap();
        let twice = enrich_chunk(&mut model, &once, 1).unwrap();

        assert_eq!(twice.num_columns(), 3);
        assert_eq!(twice.schema().index_of(DOC_BYTES_COLUMN).unwrap(), 2);
    }

    #[test]
    fn enrich_without_text_column() {
        let (_dir, mut model) = model();
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1i64]))]).unwrap();

        assert!(matches!(
            enrich_chunk(&mut model, &batch, 1),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn paths() {
        let mut settings = Settings::default();
        settings.dir.data_dir = PathBuf::from("/data");
        let pipeline = NlpPipeline::new(&settings);

        assert_eq!(
            pipeline.ledger_path("fr"),
            PathBuf::from("/data/spacy/fr/chambers_processed.txt")
        );
        assert_eq!(
            pipeline.vocab_path("fr"),
            PathBuf::from("/data/spacy/fr/_vocab_fr.spacy")
        );
    }
}
