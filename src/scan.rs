//! Mapping result rows onto Rust values.
//!
//! [`FromValue`] converts a single column, [`FromRow`] a whole row. Records implement
//! `FromRow` through the [`from_row!`](crate::from_row) macro, which binds each field to a
//! column by name:
//!
//! ```rust
//! use pg_middleware::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Thing {
//!     id: i64,
//!     name: String,
//!     quantity: Option<i64>,
//! }
//!
//! pg_middleware::from_row!(Thing { id, name = "thing_name", quantity });
//!
//! let rs = ResultSet::from_rows(
//!     &["id", "thing_name", "quantity"],
//!     vec![vec![RowValues::Int(1), RowValues::Text("bolt".into()), RowValues::Null]],
//! );
//! let thing = Thing::from_row(&rs.rows()[0]).unwrap();
//! assert_eq!(thing, Thing { id: 1, name: "bolt".into(), quantity: None });
//! ```

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::PgMiddlewareError;
use crate::results::DbRow;
use crate::types::RowValues;

/// Conversion from one column value.
pub trait FromValue: Sized {
    /// # Errors
    /// Returns a description of the mismatch when `value` cannot become `Self`.
    fn from_value(value: &RowValues) -> Result<Self, String>;
}

/// Conversion from a whole row.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `PgMiddlewareError::Scan` when a column is missing or has the wrong type.
    fn from_row(row: &DbRow) -> Result<Self, PgMiddlewareError>;
}

/// Read the named column of `row` as `T`.
///
/// # Errors
/// Returns `PgMiddlewareError::Scan` when the column is missing or cannot convert to `T`.
pub fn column<T: FromValue>(row: &DbRow, name: &str) -> Result<T, PgMiddlewareError> {
    let value = row
        .get(name)
        .ok_or_else(|| PgMiddlewareError::Scan(format!("missing column \"{name}\"")))?;
    T::from_value(value)
        .map_err(|e| PgMiddlewareError::Scan(format!("column \"{name}\": {e}")))
}

fn mismatch(expected: &str, value: &RowValues) -> String {
    format!("cannot scan {} into {expected}", value.type_name())
}

impl FromValue for RowValues {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        value.as_int().ok_or_else(|| mismatch("i64", value))
    }
}

macro_rules! impl_narrow_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &RowValues) -> Result<Self, String> {
                    let wide = value.as_int().ok_or_else(|| mismatch(stringify!($ty), value))?;
                    <$ty>::try_from(wide)
                        .map_err(|_| format!("{wide} out of range for {}", stringify!($ty)))
                }
            }
        )*
    };
}

impl_narrow_int!(i32, i16, u64, u32);

impl FromValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: &RowValues) -> Result<Self, String> {
        if let Some(f) = value.as_float() {
            return Ok(f);
        }
        value
            .as_int()
            .map(|i| i as f64)
            .ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &RowValues) -> Result<Self, String> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        value
            .as_text()
            .map(ToString::to_string)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        value
            .as_timestamp()
            .ok_or_else(|| mismatch("NaiveDateTime", value))
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        if let Some(v) = value.as_json() {
            return Ok(v.clone());
        }
        match value {
            RowValues::Null => Ok(JsonValue::Null),
            RowValues::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => Err(mismatch("JSON", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("Vec<u8>", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &RowValues) -> Result<Self, String> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

fn single_column(row: &DbRow) -> Result<&RowValues, PgMiddlewareError> {
    match row.values() {
        [value] => Ok(value),
        values => Err(PgMiddlewareError::Scan(format!(
            "scalar destination needs exactly one column, got {}",
            values.len()
        ))),
    }
}

// Scalars scan from single-column rows, e.g. `SELECT count(*) FROM things`.
macro_rules! impl_scalar_from_row {
    ($($ty:ty),*) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &DbRow) -> Result<Self, PgMiddlewareError> {
                    <$ty as FromValue>::from_value(single_column(row)?)
                        .map_err(PgMiddlewareError::Scan)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(row: &DbRow) -> Result<Self, PgMiddlewareError> {
                    <Option<$ty> as FromValue>::from_value(single_column(row)?)
                        .map_err(PgMiddlewareError::Scan)
                }
            }
        )*
    };
}

impl_scalar_from_row!(
    i64,
    i32,
    i16,
    u64,
    u32,
    f64,
    f32,
    bool,
    String,
    NaiveDateTime,
    JsonValue,
    Vec<u8>
);

impl FromRow for DbRow {
    fn from_row(row: &DbRow) -> Result<Self, PgMiddlewareError> {
        Ok(row.clone())
    }
}

/// Implement [`FromRow`] for a struct by naming each field's column.
///
/// A bare field name reads the column of the same name; `field = "column"` reads another one.
#[macro_export]
macro_rules! from_row {
    (@col $field:ident) => {
        stringify!($field)
    };
    (@col $field:ident $col:literal) => {
        $col
    };
    ($ty:ident { $($field:ident $(= $col:literal)?),* $(,)? }) => {
        impl $crate::scan::FromRow for $ty {
            fn from_row(
                row: &$crate::results::DbRow,
            ) -> ::std::result::Result<Self, $crate::PgMiddlewareError> {
                Ok(Self {
                    $($field: $crate::scan::column(row, $crate::from_row!(@col $field $($col)?))?,)*
                })
            }
        }
    };
}
