use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::Row;

use crate::results::ResultSet;
use crate::types::RowValues;

/// Read column `idx` of `row` as a [`RowValues`], chosen by the column's type name.
///
/// `timestamptz` is normalised to UTC and `date` to midnight. Types without a dedicated
/// mapping are read as text.
///
/// # Errors
/// Returns the driver error if the column cannot be decoded.
pub fn extract_value(row: &Row, idx: usize) -> Result<RowValues, tokio_postgres::Error> {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| RowValues::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
        "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };

    Ok(value.unwrap_or(RowValues::Null))
}

/// Convert driver rows into a [`ResultSet`], keeping row order.
///
/// # Errors
/// Returns the driver error of the first column that cannot be decoded.
pub fn build_result_set(rows: &[Row]) -> Result<ResultSet, tokio_postgres::Error> {
    let column_names: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut result_set = ResultSet::with_columns(column_names, rows.len());
    for row in rows {
        let values = (0..row.len())
            .map(|idx| extract_value(row, idx))
            .collect::<Result<Vec<_>, _>>()?;
        result_set.push_values(values);
    }

    Ok(result_set)
}
