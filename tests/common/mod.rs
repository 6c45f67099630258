//! Scratch corpus helpers shared by the integration tests.
#![allow(dead_code)]
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use scrc::config::Settings;
use scrc::io::store::write_batches;

/// Settings rooted at `root`, for `languages` only.
pub fn settings(root: &Path, languages: &str) -> Settings {
    let mut settings = Settings::default();
    settings.dir.data_dir = root.join("data");
    settings.dir.progress_dir = root.join("progress");
    settings.dir.models_dir = root.join("models");
    settings.dataset_construction.languages = languages.to_string();
    settings.nlp.n_process = 1;
    settings
}

/// Install a model package for `lang` under the name `settings` expects.
pub fn install_model(settings: &Settings, lang: &str) {
    let dir = settings.dir.models_dir.join(&settings.models[lang]);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("meta.json"),
        format!(
            r#"{{"lang": "{}", "name": "core_news_lg", "version": "3.2.0", "pipeline": ["tagger", "lemmatizer", "senter"]}}"#,
            lang
        ),
    )
    .unwrap();
}

/// Chamber partition of `nb_rows` decisions with an `id` and a `text` column.
pub fn write_chamber(settings: &Settings, lang: &str, chamber: &str, nb_rows: usize) {
    let ids: Vec<i64> = (0..nb_rows as i64).collect();
    let texts: Vec<String> = ids
        .iter()
        .map(|id| format!("Entscheid {}. Die Beschwerde wird abgewiesen.", id))
        .collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("text", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(texts)),
        ],
    )
    .unwrap();
    write_partition(settings, lang, chamber, &batch);
}

pub fn write_partition(settings: &Settings, lang: &str, name: &str, batch: &RecordBatch) {
    let dir = settings.split_dir().join(lang);
    std::fs::create_dir_all(&dir).unwrap();
    write_batches(&dir.join(format!("{}.parquet", name)), &[batch.clone()]).unwrap();
}

/// Non blank lines of a ledger file.
pub fn ledger_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}
