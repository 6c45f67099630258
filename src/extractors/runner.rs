/*! Generic extraction loop.

For each spider that is not in the extractor's ledger, and for each language:

1. select the rows of the spider,
2. run the spider's extraction function on the rows that pass the extractor's gate,
3. write the selected rows with the (JSON encoded) result column.

A spider is recorded in the ledger once every language is written.
!*/
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{debug, info};

use super::extractor::{ExtractionContext, ExtractionFn, ExtractionFunctions, Extractor, Row};
use super::source::DecisionSource;
use crate::config::Settings;
use crate::error::Error;
use crate::io::store::append_column;
use crate::io::Ledger;
use crate::pipelines::Pipeline;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpiderSummary {
    pub spider: String,
    pub rows_selected: usize,
    pub values_found: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub spiders_found: usize,
    pub spiders_in_ledger: usize,
    /// Spiders without an extraction function.
    pub skipped: Vec<String>,
    pub spiders: Vec<SpiderSummary>,
}

impl ExtractionSummary {
    pub fn get(&self, spider: &str) -> Option<&SpiderSummary> {
        self.spiders.iter().find(|s| s.spider == spider)
    }
}

pub struct ExtractorRunner<E: Extractor> {
    extractor: E,
    functions: ExtractionFunctions,
    source: DecisionSource,
    languages: Vec<String>,
    progress_dir: PathBuf,
    strict: bool,
}

impl<E: Extractor> ExtractorRunner<E> {
    pub fn new(extractor: E, functions: ExtractionFunctions, settings: &Settings) -> Self {
        Self {
            extractor,
            functions,
            source: DecisionSource::new(&settings.split_dir(), &settings.extracted_dir()),
            languages: settings.languages(),
            progress_dir: settings.dir.progress_dir.clone(),
            strict: settings.extractors.strict,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.progress_dir.join(self.extractor.ledger_name())
    }

    pub fn source(&self) -> &DecisionSource {
        &self.source
    }

    /// Run `f` on each row of `batch` and append the results as the extractor's column.
    ///
    /// Also returns the number of rows for which a value was found.
    pub fn extract(
        &self,
        f: ExtractionFn,
        ctx: &ExtractionContext,
        batch: &RecordBatch,
    ) -> Result<(RecordBatch, usize), Error> {
        let values = (0..batch.num_rows())
            .map(|idx| {
                let row = Row::new(batch, idx);
                let data = self.extractor.required_data(&row);
                if !self
                    .extractor
                    .check_condition_before_process(ctx.spider, data, ctx)
                {
                    debug!("[{}] row {} does not pass the condition", ctx.spider, idx);
                    return Ok(None);
                }
                data.and_then(|data| f(data, ctx))
                    .map(|value| serde_json::to_string(&value))
                    .transpose()
            })
            .collect::<Result<Vec<Option<String>>, serde_json::Error>>()?;

        let found = values.iter().filter(|v| v.is_some()).count();
        let batch = append_column(
            batch,
            Field::new(self.extractor.col_name(), DataType::Utf8, true),
            Arc::new(StringArray::from(values)),
        )?;
        Ok((batch, found))
    }

    fn run_spider(&self, spider: &str, f: ExtractionFn) -> Result<SpiderSummary, Error> {
        let col = self.extractor.col_name();
        let mut summary = SpiderSummary {
            spider: spider.to_string(),
            ..Default::default()
        };

        for lang in &self.languages {
            let ctx = ExtractionContext { spider, lang };
            let selection = self.extractor.selection(spider, lang);

            let mut extracted = Vec::new();
            for batch in self.source.select(lang, &selection)? {
                let (batch, found) = self.extract(f, &ctx, &batch)?;
                summary.rows_selected += batch.num_rows();
                summary.values_found += found;
                extracted.push(batch);
            }

            if extracted.is_empty() {
                debug!("[{}] no {} decision to extract {} from", spider, lang, col);
                continue;
            }
            let path = self.source.write(col, lang, spider, &extracted)?;
            info!("[{}] saved {} of {} decisions to {:?}", spider, col, lang, path);
        }

        Ok(summary)
    }
}

impl<E: Extractor> Pipeline<ExtractionSummary> for ExtractorRunner<E> {
    fn version() -> &'static str {
        "1.0.0"
    }

    fn run(&self) -> Result<ExtractionSummary, Error> {
        let col = self.extractor.col_name();
        info!("started extracting {} from {:?}", col, self.languages);

        let spiders = self.source.spiders(&self.languages)?;
        let (planned, skipped) = self.functions.validate(&spiders, self.strict)?;

        std::fs::create_dir_all(&self.progress_dir)?;
        let mut ledger = Ledger::open(&self.ledger_path())?;

        let pending: Vec<String> = planned
            .into_iter()
            .filter(|spider| !ledger.contains(spider))
            .collect();
        info!(
            "still {} spider(s) remaining to extract {} from: {}",
            pending.len(),
            col,
            pending.iter().join(", ")
        );

        let mut summary = ExtractionSummary {
            spiders_found: spiders.len(),
            spiders_in_ledger: spiders.iter().filter(|s| ledger.contains(s)).count(),
            skipped,
            spiders: Vec::new(),
        };

        for spider in &pending {
            // validated above
            let f = match self.functions.get(spider) {
                Some(f) => f,
                None => continue,
            };
            summary.spiders.push(self.run_spider(spider, f)?);
            ledger.record(spider)?;
        }

        info!("finished extracting {} ({} spiders)", col, summary.spiders.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::Schema;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::*;
    use crate::extractors::{Selection, SPIDER_COLUMN};

    struct Headers;

    impl Extractor for Headers {
        fn col_name(&self) -> &str {
            "title"
        }

        fn selection(&self, spider: &str, _lang: &str) -> Selection {
            Selection::new(spider)
        }

        fn required_data<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
            row.str("header")
        }

        fn check_condition_before_process(
            &self,
            _spider: &str,
            data: Option<&str>,
            _ctx: &ExtractionContext,
        ) -> bool {
            data.map_or(false, |d| !d.starts_with('#'))
        }
    }

    fn first_word(data: &str, _ctx: &ExtractionContext) -> Option<Value> {
        data.split_whitespace().next().map(|w| json!(w))
    }

    #[test]
    fn extract_gates_rows() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.dir.data_dir = dir.path().to_path_buf();
        let runner = ExtractorRunner::new(Headers, ExtractionFunctions::new(), &settings);

        let schema = Arc::new(Schema::new(vec![
            Field::new(SPIDER_COLUMN, DataType::Utf8, true),
            Field::new("header", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["CH_BGer"; 4])),
                Arc::new(StringArray::from(vec![
                    Some("Urteil vom"),
                    Some("# ignored"),
                    None,
                    Some("  "),
                ])),
            ],
        )
        .unwrap();

        let ctx = ExtractionContext {
            spider: "CH_BGer",
            lang: "de",
        };
        let (out, found) = runner.extract(first_word, &ctx, &batch).unwrap();
        assert_eq!(found, 1);
        assert_eq!(out.num_columns(), 3);

        let titles = out.column_by_name("title").unwrap().as_string::<i32>();
        assert_eq!(titles.value(0), "\"Urteil\"");
        assert!(titles.is_null(1));
        assert!(titles.is_null(2));
        assert!(titles.is_null(3));
    }
}
