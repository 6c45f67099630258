/*! Chunked parquet store.

Layout:

```text
<base_dir>/<chamber>/0.parquet
<base_dir>/<chamber>/1.parquet
...
```

Chunk files are written to a temporary sibling and renamed into place,
so a chunk file that exists is always complete.
!*/
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::array::ArrayRef;
use arrow::compute::concat_batches;
use arrow::datatypes::{Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Error;

const EXTENSION: &str = "parquet";

/// List partitions (file stems of `*.parquet` files) in `dir`.
///
/// A missing directory has no partition.
pub fn list_partitions(dir: &Path) -> Result<Vec<String>, Error> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = dir.join(format!("*.{}", EXTENSION));
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::Custom(format!("invalid partition directory: {:?}", dir)))?;

    let mut partitions = Vec::new();
    for path in glob::glob(pattern)? {
        let path = path?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            partitions.push(stem.to_string());
        }
    }
    partitions.sort();
    Ok(partitions)
}

/// Path of partition `name` in `dir`.
pub fn partition_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, EXTENSION))
}

/// Open a parquet file as a stream of batches of (at most) `batch_size` rows.
///
/// Also returns the number of rows announced by the file metadata.
pub fn open_batches(path: &Path, batch_size: usize) -> Result<(i64, ParquetRecordBatchReader), Error> {
    let f = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(f)?;
    let nb_rows = builder.metadata().file_metadata().num_rows();
    let reader = builder.with_batch_size(batch_size).build()?;
    Ok((nb_rows, reader))
}

/// Read a whole parquet file into a single batch.
pub fn read_all(path: &Path) -> Result<RecordBatch, Error> {
    let f = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(f)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Write `batches` to `path`, going through a temporary file.
///
/// All batches have to share the schema of the first one.
pub fn write_batches(path: &Path, batches: &[RecordBatch]) -> Result<(), Error> {
    let schema = match batches.first() {
        Some(batch) => batch.schema(),
        None => return Err(Error::Custom(format!("nothing to write to {:?}", path))),
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let f = File::create(&tmp)?;
    let mut writer = ArrowWriter::try_new(f, schema, Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    std::fs::rename(&tmp, path)?;
    debug!("wrote {:?}", path);
    Ok(())
}

/// `batch` with `column` appended as `field`.
///
/// A column with the same name is removed first.
pub fn append_column(batch: &RecordBatch, field: Field, column: ArrayRef) -> Result<RecordBatch, Error> {
    let mut batch = batch.clone();
    if let Ok(idx) = batch.schema().index_of(field.name()) {
        batch.remove_column(idx);
    }

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(field));
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

    let mut columns = batch.columns().to_vec();
    columns.push(column);
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Per chamber, per chunk parquet files.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    base_dir: PathBuf,
}

impl ChunkStore {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn chamber_dir(&self, chamber: &str) -> PathBuf {
        self.base_dir.join(chamber)
    }

    /// `<base_dir>/<chamber>/<chunk_num>.parquet`
    pub fn chunk_path(&self, chamber: &str, chunk_num: usize) -> PathBuf {
        self.chamber_dir(chamber)
            .join(format!("{}.{}", chunk_num, EXTENSION))
    }

    pub fn exists(&self, chamber: &str, chunk_num: usize) -> bool {
        self.chunk_path(chamber, chunk_num).exists()
    }

    /// Write (or overwrite) a chunk, creating the chamber directory if needed.
    pub fn write_chunk(
        &self,
        chamber: &str,
        chunk_num: usize,
        chunk: &RecordBatch,
    ) -> Result<PathBuf, Error> {
        std::fs::create_dir_all(self.chamber_dir(chamber))?;
        let path = self.chunk_path(chamber, chunk_num);
        write_batches(&path, std::slice::from_ref(chunk))?;
        Ok(path)
    }

    pub fn read_chunk(&self, chamber: &str, chunk_num: usize) -> Result<RecordBatch, Error> {
        read_all(&self.chunk_path(chamber, chunk_num))
    }

    /// Remove every chunk of `chamber`.
    pub fn clear(&self, chamber: &str) -> Result<(), Error> {
        let dir = self.chamber_dir(chamber);
        if dir.is_dir() {
            debug!("removing {:?}", dir);
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Number of consecutive chunks present for `chamber`, starting at 0.
    pub fn nb_chunks(&self, chamber: &str) -> usize {
        (0..).take_while(|n| self.exists(chamber, *n)).count()
    }
}
