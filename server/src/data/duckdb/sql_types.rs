//! SQL type conversions for DuckDB
//!
//! Binds `ParamValue` into statements and turns DuckDB values into `CellValue`.
//! Streamed results arrive as Arrow batches; `value_at` reads one cell back
//! into a DuckDB `Value`.

use duckdb::ToSql;
use duckdb::arrow::array::{Array, ArrayRef, AsArray};
use duckdb::arrow::datatypes::{
    DataType, Date32Type, Decimal128Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, TimeUnit as ArrowTimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::types::{TimeUnit, ToSqlOutput, Value};

use crate::data::types::{CellValue, ParamValue};
use crate::utils::time::{date_to_days, days_to_date, micros_to_naive};

impl ToSql for ParamValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            // DATE compares against TIMESTAMP columns as midnight of that day
            ParamValue::Date(d) => date_to_days(d)
                .map(|days| ToSqlOutput::Owned(Value::Date32(days)))
                .ok_or_else(|| {
                    duckdb::Error::ToSqlConversionFailure(
                        format!("date out of range: {}", d).into(),
                    )
                }),
            ParamValue::Text(s) => s.to_sql(),
            ParamValue::Int(n) => Ok(ToSqlOutput::Owned(Value::BigInt(*n))),
        }
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Read row `row` of an Arrow column as an owned DuckDB value
pub fn value_at(column: &ArrayRef, row: usize) -> Value {
    if column.is_null(row) {
        return Value::Null;
    }
    match column.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Boolean(column.as_boolean().value(row)),
        DataType::Int8 => Value::TinyInt(column.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::SmallInt(column.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::Int(column.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::BigInt(column.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::UTinyInt(column.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::USmallInt(column.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::UInt(column.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => Value::UBigInt(column.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => Value::Float(column.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Double(column.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(column.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(column.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::Text(column.as_string_view().value(row).to_string()),
        DataType::Date32 => Value::Date32(column.as_primitive::<Date32Type>().value(row)),
        DataType::Timestamp(unit, _) => match unit {
            ArrowTimeUnit::Second => Value::Timestamp(
                TimeUnit::Second,
                column.as_primitive::<TimestampSecondType>().value(row),
            ),
            ArrowTimeUnit::Millisecond => Value::Timestamp(
                TimeUnit::Millisecond,
                column.as_primitive::<TimestampMillisecondType>().value(row),
            ),
            ArrowTimeUnit::Microsecond => Value::Timestamp(
                TimeUnit::Microsecond,
                column.as_primitive::<TimestampMicrosecondType>().value(row),
            ),
            ArrowTimeUnit::Nanosecond => Value::Timestamp(
                TimeUnit::Nanosecond,
                column.as_primitive::<TimestampNanosecondType>().value(row),
            ),
        },
        // HUGEINT arrives as DECIMAL(38, 0)
        DataType::Decimal128(_, 0) => {
            Value::HugeInt(column.as_primitive::<Decimal128Type>().value(row))
        }
        DataType::Decimal128(_, scale) => {
            let raw = column.as_primitive::<Decimal128Type>().value(row);
            Value::Double(raw as f64 / 10f64.powi(i32::from(*scale)))
        }
        _ => ArrayFormatter::try_new(column.as_ref(), &FormatOptions::default())
            .map(|formatter| Value::Text(formatter.value(row).to_string()))
            .unwrap_or(Value::Null),
    }
}

/// Convert an owned DuckDB value into a cell
pub fn cell_from_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Boolean(b) => CellValue::Bool(b),
        Value::TinyInt(n) => CellValue::Int(n.into()),
        Value::SmallInt(n) => CellValue::Int(n.into()),
        Value::Int(n) => CellValue::Int(n.into()),
        Value::BigInt(n) => CellValue::Int(n),
        Value::UTinyInt(n) => CellValue::Int(n.into()),
        Value::USmallInt(n) => CellValue::Int(n.into()),
        Value::UInt(n) => CellValue::Int(n.into()),
        Value::UBigInt(n) => i64::try_from(n)
            .map(CellValue::Int)
            .unwrap_or_else(|_| CellValue::Text(n.to_string())),
        Value::HugeInt(n) => i64::try_from(n)
            .map(CellValue::Int)
            .unwrap_or_else(|_| CellValue::Text(n.to_string())),
        Value::Float(f) => CellValue::Float(f.into()),
        Value::Double(f) => CellValue::Float(f),
        Value::Text(s) => CellValue::Text(s),
        Value::Timestamp(unit, v) => micros_to_naive(to_micros(unit, v))
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        Value::Date32(days) => days_to_date(days)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Null),
        other => CellValue::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_integer_values() {
        assert_eq!(cell_from_value(Value::Int(5)), CellValue::Int(5));
        assert_eq!(cell_from_value(Value::BigInt(-5)), CellValue::Int(-5));
        assert_eq!(
            cell_from_value(Value::UBigInt(u64::MAX)),
            CellValue::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_timestamp_value() {
        let cell = cell_from_value(Value::Timestamp(
            TimeUnit::Microsecond,
            1_704_067_200_000_000,
        ));
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell, CellValue::Timestamp(expected));
    }

    #[test]
    fn test_date_value() {
        assert_eq!(
            cell_from_value(Value::Date32(19723)),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_arrow_cells() {
        use duckdb::arrow::array::{
            Decimal128Array, Int64Array, StringArray, TimestampMicrosecondArray,
        };
        use std::sync::Arc;

        let ints: ArrayRef = Arc::new(Int64Array::from(vec![Some(7), None]));
        assert_eq!(cell_from_value(value_at(&ints, 0)), CellValue::Int(7));
        assert!(cell_from_value(value_at(&ints, 1)).is_null());

        let text: ArrayRef = Arc::new(StringArray::from(vec!["WO1"]));
        assert_eq!(
            cell_from_value(value_at(&text, 0)),
            CellValue::Text("WO1".into())
        );

        let stamps: ArrayRef = Arc::new(TimestampMicrosecondArray::from(vec![
            1_704_067_200_000_000,
        ]));
        assert_eq!(
            cell_from_value(value_at(&stamps, 0)),
            CellValue::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );

        let decimals: ArrayRef = Arc::new(
            Decimal128Array::from(vec![12_345])
                .with_precision_and_scale(10, 2)
                .unwrap(),
        );
        assert_eq!(cell_from_value(value_at(&decimals, 0)), CellValue::Float(123.45));
    }

    #[test]
    fn test_null_value() {
        assert!(cell_from_value(Value::Null).is_null());
    }
}
