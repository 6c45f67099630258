//! Extractor trait and the values it is parameterized with.
use std::collections::HashMap;

use arrow::array::{Array, AsArray, BooleanArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::info;
use serde_json::Value;

use crate::error::Error;

/// Column identifying the source (court) a decision was scraped from.
pub const SPIDER_COLUMN: &str = "spider";

/// What an extraction function knows about the row it processes.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub spider: &'a str,
    pub lang: &'a str,
}

/// Extraction function: required data of a row → extracted value, if any.
pub type ExtractionFn = fn(&str, &ExtractionContext) -> Option<Value>;

/// Explicit spider → extraction function mapping.
#[derive(Clone, Default)]
pub struct ExtractionFunctions {
    functions: HashMap<String, ExtractionFn>,
}

impl std::fmt::Debug for ExtractionFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl ExtractionFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spider: &str, f: ExtractionFn) -> Self {
        self.insert(spider, f);
        self
    }

    pub fn insert(&mut self, spider: &str, f: ExtractionFn) {
        self.functions.insert(spider.to_string(), f);
    }

    pub fn get(&self, spider: &str) -> Option<ExtractionFn> {
        self.functions.get(spider).copied()
    }

    pub fn contains(&self, spider: &str) -> bool {
        self.functions.contains_key(spider)
    }

    /// Split `spiders` into the ones that have a function and the ones that don't.
    ///
    /// Spiders without a function are reported once here rather than per row.
    /// In `strict` mode they are an error.
    pub fn validate<'a, I>(&self, spiders: I, strict: bool) -> Result<(Vec<String>, Vec<String>), Error>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let (planned, missing): (Vec<String>, Vec<String>) = spiders
            .into_iter()
            .cloned()
            .partition(|spider| self.contains(spider));

        if !missing.is_empty() {
            if strict {
                return Err(Error::MissingExtractionFunction(missing));
            }
            for spider in &missing {
                info!("[{}] no extraction function, skipping its rows", spider);
            }
        }

        Ok((planned, missing))
    }
}

/// Row filter: `spider = '<spider>' AND <col> IS NOT NULL AND <col> <> '' ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub spider: String,
    pub non_empty: Vec<String>,
}

impl Selection {
    pub fn new(spider: &str) -> Self {
        Self {
            spider: spider.to_string(),
            non_empty: Vec::new(),
        }
    }

    /// Also require `column` to be non-null and non-empty.
    pub fn non_empty(mut self, column: &str) -> Self {
        self.non_empty.push(column.to_string());
        self
    }

    /// Columns the selection needs to be evaluated.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(SPIDER_COLUMN)
            .chain(self.non_empty.iter().map(String::as_str))
            .collect()
    }

    /// Evaluate the selection on `batch`.
    pub fn mask(&self, batch: &RecordBatch) -> Result<BooleanArray, Error> {
        let spiders = string_column(batch, SPIDER_COLUMN)?;
        let mut mask: Vec<bool> = spiders
            .iter()
            .map(|s| s == Some(self.spider.as_str()))
            .collect();

        for column in &self.non_empty {
            let values = string_column(batch, column)?;
            for (keep, value) in mask.iter_mut().zip(values.iter()) {
                *keep = *keep && matches!(value, Some(v) if !v.is_empty());
            }
        }

        Ok(BooleanArray::from(mask))
    }
}

/// `column` of `batch` as a Utf8 array.
fn string_column(batch: &RecordBatch, column: &str) -> Result<StringArray, Error> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| Error::MissingColumn {
            column: column.to_string(),
            path: None,
        })?;
    let array = cast(array, &DataType::Utf8)?;
    array
        .as_string_opt::<i32>()
        .cloned()
        .ok_or_else(|| Error::Custom(format!("column {} is not a string column", column)))
}

/// Read access to one row of a batch.
pub struct Row<'a> {
    batch: &'a RecordBatch,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn new(batch: &'a RecordBatch, index: usize) -> Self {
        Self { batch, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of a Utf8 column, [None] if the column is missing, not Utf8 or null.
    ///
    /// Batches coming from [super::DecisionSource::select] have Utf8 string columns.
    pub fn str(&self, column: &str) -> Option<&'a str> {
        let array = self.batch.column_by_name(column)?;
        let array = array.as_any().downcast_ref::<StringArray>()?;
        if array.is_null(self.index) {
            None
        } else {
            Some(array.value(self.index))
        }
    }
}

/// Field specific part of an extractor.
///
/// The generic select / extract / write loop lives in [super::ExtractorRunner].
pub trait Extractor {
    /// Output column, also used to name the output directory and ledger.
    fn col_name(&self) -> &str;

    /// Ledger file name, relative to the progress directory.
    fn ledger_name(&self) -> String {
        format!("spiders_{}_extracted.txt", self.col_name())
    }

    /// Rows of `spider` in language `lang` to process.
    fn selection(&self, spider: &str, lang: &str) -> Selection;

    /// Data handed to the extraction function.
    fn required_data<'a>(&self, row: &Row<'a>) -> Option<&'a str>;

    /// Gate applied before calling the extraction function.
    fn check_condition_before_process(
        &self,
        _spider: &str,
        _data: Option<&str>,
        _ctx: &ExtractionContext,
    ) -> bool {
        true
    }
}
