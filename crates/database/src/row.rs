use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use events::Record;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use uuid::Uuid;

/// Converts a result row into a record, keeping the column order.
pub fn row_to_record(row: &PgRow) -> Record {
    row.columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn column_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let typed = match type_name {
        "BOOL" => decode::<bool>(row, idx).map(Value::Bool),
        "INT2" => decode::<i16>(row, idx).map(Value::from),
        "INT4" => decode::<i32>(row, idx).map(Value::from),
        "INT8" => decode::<i64>(row, idx).map(Value::from),
        "FLOAT4" => decode::<f32>(row, idx).map(|v| float(f64::from(v))),
        "FLOAT8" => decode::<f64>(row, idx).map(float),
        // Rendered as a string so no precision is lost on the way out.
        "NUMERIC" => decode::<Decimal>(row, idx).map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => decode::<Value>(row, idx),
        "UUID" => decode::<Uuid>(row, idx).map(|v| Value::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, idx).map(|v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, idx).map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, idx)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
        _ => None,
    };

    typed.or_else(|| text(row, idx)).unwrap_or(Value::Null)
}

fn decode<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<T, _>(idx).ok()
}

// Everything else (text, arrays, enums, intervals...) is passed through in
// its text representation.
fn text(row: &PgRow, idx: usize) -> Option<Value> {
    row.try_get_unchecked::<String, _>(idx).ok().map(Value::String)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_floats_become_numbers() {
        assert_eq!(float(1.5), serde_json::json!(1.5));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(float(f64::NAN), Value::Null);
        assert_eq!(float(f64::INFINITY), Value::Null);
    }
}
