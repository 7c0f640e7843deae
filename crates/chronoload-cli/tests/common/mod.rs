//! Shared fixtures for integration tests
//!
//! Builds Arrow IPC payloads shaped like the chunks the query API serves.

#![allow(dead_code)]

use arrow::array::{
    ArrayRef, DurationSecondArray, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

const TEXT_COLUMNS: [&str; 10] = [
    "job_id",
    "cluster",
    "partition",
    "account",
    "user_name",
    "job_name",
    "qos",
    "state",
    "exit_code",
    "node_list",
];

const FLOAT_COLUMNS: [&str; 6] = [
    "cpu_hours",
    "gpu_hours",
    "mem_used_gb",
    "mem_requested_gb",
    "energy_kwh",
    "charge_units",
];

const TIMESTAMP_COLUMNS: [&str; 4] = ["time", "submit_time", "start_time", "end_time"];

/// 2023-02-01T00:00:00Z in microseconds
const BASE_MICROS: i64 = 1_675_209_600_000_000;

pub fn encode(batch: &RecordBatch) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batch.schema()).unwrap();
        writer.write(batch).unwrap();
        writer.finish().unwrap();
    }
    buf
}

/// A well-formed chunk of `rows` usage records with natively typed columns
pub fn usage_payload(rows: usize, seed: i64) -> Vec<u8> {
    encode(&usage_batch(rows, seed, |_, _| None))
}

/// Same as [`usage_payload`] but with `node_count` sent as text, one value of
/// which cannot be cast to an integer
pub fn uncastable_payload(rows: usize) -> Vec<u8> {
    encode(&usage_batch(rows, 0, |name, n| {
        (name == "node_count").then(|| {
            let values: Vec<String> = (0..n)
                .map(|i| if i == n - 1 { "many".to_string() } else { i.to_string() })
                .collect();
            Arc::new(StringArray::from(values)) as ArrayRef
        })
    }))
}

/// A chunk whose timestamps arrive as ISO strings; the cast parses them
pub fn string_timestamp_payload(rows: usize) -> Vec<u8> {
    encode(&usage_batch(rows, 0, |name, n| {
        TIMESTAMP_COLUMNS.contains(&name).then(|| {
            let values: Vec<String> = (0..n)
                .map(|i| format!("2023-02-01 {:02}:00:00", i % 24))
                .collect();
            Arc::new(StringArray::from(values)) as ArrayRef
        })
    }))
}

/// A chunk carrying only some of the canonical columns
pub fn partial_payload(rows: usize) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("job_id", DataType::Utf8, true),
        Field::new("cpu_hours", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            (0..rows).map(|i| format!("job-{}", i)).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(vec![1.5; rows])),
    ];
    encode(&RecordBatch::try_new(schema, columns).unwrap())
}

/// Build a 23-column batch; `override_column` may replace any column's array
fn usage_batch(
    rows: usize,
    seed: i64,
    override_column: impl Fn(&str, usize) -> Option<ArrayRef>,
) -> RecordBatch {
    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();

    let mut push = |name: &str, default: ArrayRef| {
        let array = override_column(name, rows).unwrap_or(default);
        fields.push(Field::new(name, array.data_type().clone(), true));
        columns.push(array);
    };

    for (offset, name) in TIMESTAMP_COLUMNS.iter().enumerate() {
        let values: Vec<i64> = (0..rows as i64)
            .map(|i| BASE_MICROS + (seed * 1000 + i) * 3_600_000_000 + offset as i64 * 60_000_000)
            .collect();
        push(name, Arc::new(TimestampMicrosecondArray::from(values)));
    }

    push(
        "elapsed",
        Arc::new(DurationSecondArray::from(
            (0..rows as i64).map(|i| 60 * (i + 1)).collect::<Vec<_>>(),
        )),
    );
    push(
        "node_count",
        Arc::new(Int32Array::from(
            (0..rows as i32).map(|i| i % 8 + 1).collect::<Vec<_>>(),
        )),
    );
    push(
        "cpu_count",
        Arc::new(Int64Array::from(
            (0..rows as i64).map(|i| (i % 8 + 1) * 32).collect::<Vec<_>>(),
        )),
    );

    for name in TEXT_COLUMNS {
        let values: Vec<String> = (0..rows).map(|i| format!("{}-{}-{}", name, seed, i)).collect();
        push(name, Arc::new(StringArray::from(values)));
    }

    for name in FLOAT_COLUMNS {
        let values: Vec<f64> = (0..rows).map(|i| i as f64 * 0.25 + seed as f64).collect();
        push(name, Arc::new(Float64Array::from(values)));
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, columns).unwrap()
}

/// Query API response listing `urls` as chunks
pub fn query_response(urls: &[String]) -> serde_json::Value {
    let body = serde_json::json!({
        "transfer_id": "tx-test",
        "metadata": {
            "total_partitions": 1,
            "estimated_size": 1024,
            "chunk_count": urls.len()
        },
        "chunks": urls.iter().map(|u| serde_json::json!({"url": u})).collect::<Vec<_>>()
    });
    serde_json::json!({"statusCode": 200, "body": body.to_string()})
}
