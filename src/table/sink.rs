use std::io::Write;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Result;

pub trait RowSink {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()>;
}

/// Parquet encoder over any writer. Snappy by default.
pub struct ParquetSink<W: Write + Send> {
    writer: ArrowWriter<W>,
}

impl ParquetSink<Vec<u8>> {
    pub fn in_memory(schema: SchemaRef) -> Result<Self> {
        Self::from_writer(Vec::new(), schema, None)
    }
}

impl<W: Write + Send> ParquetSink<W> {
    pub fn from_writer(
        writer: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        let props = props.unwrap_or_else(|| {
            WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build()
        });
        let writer = ArrowWriter::try_new(writer, Arc::clone(&schema), Some(props))?;
        Ok(Self { writer })
    }

    /// Close the file footer and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.writer.into_inner()?)
    }
}

impl<W: Write + Send> RowSink for ParquetSink<W> {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        Ok(())
    }
}
