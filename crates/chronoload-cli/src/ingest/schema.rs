//! Canonical schema of the analytical table and the SQL built from it

use arrow::datatypes::{DataType, Schema};

/// Table every successful chunk is appended to
pub const CANONICAL_TABLE: &str = "usage_records";

/// Scratch table holding one chunk between decode and cast
pub const STAGING_TABLE: &str = "staging_chunk";

/// Engine types used by the canonical table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Timestamp,
    Interval,
    BigInt,
    Varchar,
    Double,
}

impl ColumnType {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Timestamp => "TIMESTAMP",
            Self::Interval => "INTERVAL",
            Self::BigInt => "BIGINT",
            Self::Varchar => "VARCHAR",
            Self::Double => "DOUBLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// Canonical columns, in table order
pub const CANONICAL_COLUMNS: [Column; 23] = [
    col("time", ColumnType::Timestamp),
    col("submit_time", ColumnType::Timestamp),
    col("start_time", ColumnType::Timestamp),
    col("end_time", ColumnType::Timestamp),
    col("elapsed", ColumnType::Interval),
    col("node_count", ColumnType::BigInt),
    col("cpu_count", ColumnType::BigInt),
    col("job_id", ColumnType::Varchar),
    col("cluster", ColumnType::Varchar),
    col("partition", ColumnType::Varchar),
    col("account", ColumnType::Varchar),
    col("user_name", ColumnType::Varchar),
    col("job_name", ColumnType::Varchar),
    col("qos", ColumnType::Varchar),
    col("state", ColumnType::Varchar),
    col("exit_code", ColumnType::Varchar),
    col("node_list", ColumnType::Varchar),
    col("cpu_hours", ColumnType::Double),
    col("gpu_hours", ColumnType::Double),
    col("mem_used_gb", ColumnType::Double),
    col("mem_requested_gb", ColumnType::Double),
    col("energy_kwh", ColumnType::Double),
    col("charge_units", ColumnType::Double),
];

/// Quote an identifier; several canonical names are SQL keywords
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for the canonical table
pub fn create_canonical_sql() -> String {
    let columns = CANONICAL_COLUMNS
        .iter()
        .map(|c| format!("{} {}", quote_ident(c.name), c.ty.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", CANONICAL_TABLE, columns)
}

/// Single statement casting every staging column into the canonical table.
///
/// A column missing from staging fails the whole statement at bind time, so
/// either all rows of a chunk land or none do.
pub fn casted_insert_sql() -> String {
    let targets = CANONICAL_COLUMNS
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let casts = CANONICAL_COLUMNS
        .iter()
        .map(|c| {
            let ident = quote_ident(c.name);
            format!("CAST({} AS {}) AS {}", ident, c.ty.as_sql(), ident)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        CANONICAL_TABLE, targets, casts, STAGING_TABLE
    )
}

pub fn drop_staging_sql() -> String {
    format!("DROP TABLE IF EXISTS {}", STAGING_TABLE)
}

/// Engine type used to stage an Arrow column before the cast
pub fn staging_type(data_type: &DataType) -> Option<&'static str> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Null => Some("VARCHAR"),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => Some("BIGINT"),
        DataType::UInt64 => Some("UBIGINT"),
        DataType::Float32 | DataType::Float64 => Some("DOUBLE"),
        DataType::Boolean => Some("BOOLEAN"),
        DataType::Timestamp(_, _) => Some("TIMESTAMP"),
        DataType::Date32 => Some("DATE"),
        DataType::Duration(_) | DataType::Interval(_) => Some("INTERVAL"),
        _ => None,
    }
}

/// `CREATE TABLE` for the staging table, mirroring the payload schema
pub fn create_staging_sql(schema: &Schema) -> Result<String, String> {
    if schema.fields().is_empty() {
        return Err("payload has no columns".to_string());
    }

    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let ty = staging_type(field.data_type()).ok_or_else(|| {
            format!(
                "column '{}' has unsupported type {}",
                field.name(),
                field.data_type()
            )
        })?;
        columns.push(format!("{} {}", quote_ident(field.name()), ty));
    }

    Ok(format!("CREATE TABLE {} ({})", STAGING_TABLE, columns.join(", ")))
}
