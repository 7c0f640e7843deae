//! Arrow IPC chunk decoding
//!
//! Decoded batches are widened to the handful of Arrow types the staging
//! table is declared with, so the appender never has to narrow or reinterpret
//! a column.

use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, IntervalUnit, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::ipc::reader::{FileReader, StreamReader};
use arrow::record_batch::RecordBatch;
use std::io::Cursor;
use std::sync::Arc;

/// Leading magic of the Arrow IPC file format
const FILE_MAGIC: &[u8] = b"ARROW1";

/// A fully decoded chunk, already in staging types
#[derive(Debug, Clone)]
pub struct DecodedPayload {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl DecodedPayload {
    /// Decode an Arrow IPC payload in either stream or file format
    pub fn decode(bytes: &[u8]) -> Result<Self, ArrowError> {
        let (schema, batches) = if bytes.starts_with(FILE_MAGIC) {
            let reader = FileReader::try_new(Cursor::new(bytes), None)?;
            let schema = reader.schema();
            (schema, reader.collect::<Result<Vec<_>, _>>()?)
        } else {
            let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
            let schema = reader.schema();
            (schema, reader.collect::<Result<Vec<_>, _>>()?)
        };

        let staged = staged_schema(&schema);
        let batches = batches
            .iter()
            .map(|batch| stage_batch(batch, &staged))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            schema: staged,
            batches,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// Arrow type a column is widened to before it is appended.
///
/// Types without a staging counterpart are returned unchanged and rejected
/// later when the staging table is declared.
pub fn staged_data_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => DataType::Int64,
        DataType::Float32 => DataType::Float64,
        DataType::LargeUtf8 | DataType::Null => DataType::Utf8,
        DataType::Timestamp(_, tz) => DataType::Timestamp(TimeUnit::Microsecond, tz.clone()),
        DataType::Duration(_) => DataType::Interval(IntervalUnit::MonthDayNano),
        other => other.clone(),
    }
}

fn staged_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_data_type(staged_data_type(f.data_type())))
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

fn stage_batch(batch: &RecordBatch, staged: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let columns = batch
        .columns()
        .iter()
        .zip(staged.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                cast(column, field.data_type())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(staged.clone(), columns)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arrow::array::{
        ArrayRef, AsArray, DurationSecondArray, Int32Array, StringArray,
        TimestampMillisecondArray,
    };
    use arrow::datatypes::{Int64Type, IntervalMonthDayNanoType, TimestampMicrosecondType};
    use arrow::ipc::writer::{FileWriter, StreamWriter};

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("job_id", DataType::Utf8, true),
            Field::new("node_count", DataType::Int32, true),
            Field::new("elapsed", DataType::Duration(TimeUnit::Second), true),
            Field::new("time", DataType::Timestamp(TimeUnit::Millisecond, None), true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![Some("j1"), None])),
            Arc::new(Int32Array::from(vec![4, 8])),
            Arc::new(DurationSecondArray::from(vec![90, 3600])),
            Arc::new(TimestampMillisecondArray::from(vec![1_000, 2_500])),
        ];
        RecordBatch::try_new(schema, columns).unwrap()
    }

    #[test]
    fn test_decode_stream_format_widens_columns() {
        let batch = batch();
        let mut buf = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buf, &batch.schema()).unwrap();
            writer.write(&batch).unwrap();
            writer.finish().unwrap();
        }

        let decoded = DecodedPayload::decode(&buf).unwrap();
        assert_eq!(decoded.num_rows(), 2);
        assert_eq!(decoded.schema.fields().len(), 4);
        assert_eq!(decoded.schema.field(1).data_type(), &DataType::Int64);

        let staged = &decoded.batches[0];
        assert!(staged.column(0).is_null(1));
        assert_eq!(staged.column(1).as_primitive::<Int64Type>().value(1), 8);

        let elapsed = staged
            .column(2)
            .as_primitive::<IntervalMonthDayNanoType>()
            .value(0);
        assert_eq!(elapsed.months, 0);
        assert_eq!(elapsed.days, 0);
        assert_eq!(elapsed.nanoseconds, 90_000_000_000);

        let time = staged.column(3).as_primitive::<TimestampMicrosecondType>();
        assert_eq!(time.value(1), 2_500_000);
    }

    #[test]
    fn test_decode_file_format() {
        let batch = batch();
        let mut buf = Vec::new();
        {
            let mut writer = FileWriter::try_new(&mut buf, &batch.schema()).unwrap();
            writer.write(&batch).unwrap();
            writer.finish().unwrap();
        }

        assert!(buf.starts_with(FILE_MAGIC));
        let decoded = DecodedPayload::decode(&buf).unwrap();
        assert_eq!(decoded.num_rows(), 2);
    }

    #[test]
    fn test_unsupported_types_pass_through() {
        assert_eq!(staged_data_type(&DataType::Binary), DataType::Binary);
        assert_eq!(staged_data_type(&DataType::UInt64), DataType::UInt64);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DecodedPayload::decode(b"definitely not arrow").is_err());
        assert!(DecodedPayload::decode(&[]).is_err());
    }
}
