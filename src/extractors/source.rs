/*! Decision rows for extractors.

Reads the language partitions (`<split_dir>/<lang>/<partition>.parquet`) and writes extraction
results to `<out_dir>/<col>/<lang>/<spider>.parquet`.
!*/
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::AsArray;
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use super::extractor::{Selection, SPIDER_COLUMN};
use crate::error::Error;
use crate::io::store::{list_partitions, open_batches, partition_path, write_batches};

const READ_BATCH_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct DecisionSource {
    split_dir: PathBuf,
    out_dir: PathBuf,
}

impl DecisionSource {
    pub fn new(split_dir: &Path, out_dir: &Path) -> Self {
        Self {
            split_dir: split_dir.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
        }
    }

    fn partitions(&self, lang: &str) -> Result<Vec<PathBuf>, Error> {
        let dir = self.split_dir.join(lang);
        Ok(list_partitions(&dir)?
            .iter()
            .map(|name| partition_path(&dir, name))
            .collect())
    }

    /// Distinct spiders found in the partitions of `languages`.
    ///
    /// Only the spider column is read.
    pub fn spiders(&self, languages: &[String]) -> Result<BTreeSet<String>, Error> {
        let mut spiders = BTreeSet::new();
        for lang in languages {
            for path in self.partitions(lang)? {
                let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?;
                let idx = builder
                    .schema()
                    .index_of(SPIDER_COLUMN)
                    .map_err(|_| Error::MissingColumn {
                        column: SPIDER_COLUMN.to_string(),
                        path: Some(path.clone()),
                    })?;
                let mask = ProjectionMask::roots(builder.parquet_schema(), [idx]);
                let reader = builder
                    .with_projection(mask)
                    .with_batch_size(READ_BATCH_SIZE)
                    .build()?;

                for batch in reader {
                    let column = cast(batch?.column(0), &DataType::Utf8)?;
                    if let Some(values) = column.as_string_opt::<i32>() {
                        spiders.extend(values.iter().flatten().map(String::from));
                    }
                }
            }
        }
        Ok(spiders)
    }

    /// Rows of `lang` matching `selection`. Batches without a match are dropped.
    ///
    /// String columns of the selected rows are returned as Utf8, whatever their encoding in
    /// the partition.
    pub fn select(&self, lang: &str, selection: &Selection) -> Result<Vec<RecordBatch>, Error> {
        let mut selected = Vec::new();
        for path in self.partitions(lang)? {
            let (_, reader) = open_batches(&path, READ_BATCH_SIZE)?;
            for batch in reader {
                let batch = batch?;
                let mask = selection.mask(&batch).map_err(|e| match e {
                    Error::MissingColumn { column, .. } => Error::MissingColumn {
                        column,
                        path: Some(path.clone()),
                    },
                    e => e,
                })?;
                let batch = filter_record_batch(&batch, &mask)?;
                if batch.num_rows() > 0 {
                    selected.push(utf8_strings(&batch)?);
                }
            }
        }
        debug!(
            "[{}] selected {} rows for {}",
            lang,
            selected.iter().map(RecordBatch::num_rows).sum::<usize>(),
            selection.spider
        );
        Ok(selected)
    }

    /// `<out_dir>/<col>/<lang>/<spider>.parquet`
    pub fn output_path(&self, col: &str, lang: &str, spider: &str) -> PathBuf {
        partition_path(&self.out_dir.join(col).join(lang), spider)
    }

    /// Write extraction results, replacing any previous output.
    pub fn write(
        &self,
        col: &str,
        lang: &str,
        spider: &str,
        batches: &[RecordBatch],
    ) -> Result<PathBuf, Error> {
        let path = self.output_path(col, lang, spider);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_batches(&path, batches)?;
        Ok(path)
    }
}

fn is_string(data_type: &DataType) -> bool {
    match data_type {
        DataType::LargeUtf8 | DataType::Utf8View => true,
        DataType::Dictionary(_, values) => matches!(
            values.as_ref(),
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
        ),
        _ => false,
    }
}

/// `batch` with its large, view and dictionary encoded string columns cast to Utf8.
fn utf8_strings(batch: &RecordBatch) -> Result<RecordBatch, Error> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if is_string(field.data_type()) {
            fields.push(Arc::new(
                field.as_ref().clone().with_data_type(DataType::Utf8),
            ));
            columns.push(cast(column, &DataType::Utf8)?);
        } else {
            fields.push(field.clone());
            columns.push(column.clone());
        }
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}
