/*! Fixed size chunking of record batch streams.

Parquet readers yield batches whose boundaries depend on row groups and reader settings.
[Chunks] regroups them so that every chunk has exactly `size` rows, except the last one.
!*/
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::error::Error;

pub struct Chunks<I> {
    inner: I,
    schema: SchemaRef,
    size: usize,
    buffered: Vec<RecordBatch>,
    buffered_rows: usize,
}

impl<I> Chunks<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    /// Regroup `inner` into chunks of `size` rows.
    pub fn new(inner: I, schema: SchemaRef, size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::Custom("chunk size must be at least 1".to_string()));
        }
        Ok(Self {
            inner,
            schema,
            size,
            buffered: Vec::new(),
            buffered_rows: 0,
        })
    }

    /// Take the first `n` buffered rows, keeping the rest buffered.
    fn take(&mut self, n: usize) -> Result<RecordBatch, Error> {
        let all = concat_batches(&self.schema, &self.buffered)?;
        self.buffered.clear();

        let rest = all.num_rows() - n;
        if rest > 0 {
            self.buffered.push(all.slice(n, rest));
        }
        self.buffered_rows = rest;

        Ok(all.slice(0, n))
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    type Item = Result<RecordBatch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.buffered_rows >= self.size {
                return Some(self.take(self.size));
            }

            match self.inner.next() {
                Some(Ok(batch)) => {
                    if batch.num_rows() > 0 {
                        self.buffered_rows += batch.num_rows();
                        self.buffered.push(batch);
                    }
                }
                Some(Err(e)) => return Some(Err(e.into())),
                None if self.buffered_rows > 0 => return Some(self.take(self.buffered_rows)),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn batches(sizes: &[usize]) -> (SchemaRef, Vec<Result<RecordBatch, ArrowError>>) {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let mut next_id = 0i64;
        let batches = sizes
            .iter()
            .map(|size| {
                let ids: Vec<i64> = (next_id..next_id + *size as i64).collect();
                next_id += *size as i64;
                RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(ids))])
            })
            .collect();
        (schema, batches)
    }

    fn ids(batch: &RecordBatch) -> Vec<i64> {
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        (0..col.len()).map(|i| col.value(i)).collect()
    }

    #[test]
    fn regroups_uneven_batches() {
        let (schema, input) = batches(&[700, 0, 1300, 500]);
        let chunks: Vec<RecordBatch> = Chunks::new(input.into_iter(), schema, 1000)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let sizes: Vec<usize> = chunks.iter().map(RecordBatch::num_rows).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);

        // order and content are preserved
        let all: Vec<i64> = chunks.iter().flat_map(ids).collect();
        assert_eq!(all, (0..2500).collect::<Vec<i64>>());
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let (schema, input) = batches(&[2000]);
        let count = Chunks::new(input.into_iter(), schema, 1000)
            .unwrap()
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn empty_input_has_no_chunk() {
        let (schema, input) = batches(&[]);
        let mut chunks = Chunks::new(input.into_iter(), schema, 10).unwrap();
        assert!(chunks.next().is_none());
    }

    #[test]
    fn zero_size_is_rejected() {
        let (schema, input) = batches(&[3]);
        assert!(Chunks::new(input.into_iter(), schema, 0).is_err());
    }
}
