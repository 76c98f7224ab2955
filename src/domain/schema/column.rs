use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// Normalized column type, independent of the dialect it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Real,
    Double,
    Text,
    Varchar,
    Char,
    Bytea,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Json,
    Jsonb,
    Uuid,
    Array(Box<SqlType>),
}

impl SqlType {
    pub fn name(&self) -> String {
        match self {
            SqlType::SmallInt => "smallint".into(),
            SqlType::Integer => "integer".into(),
            SqlType::BigInt => "bigint".into(),
            SqlType::Numeric => "numeric".into(),
            SqlType::Real => "real".into(),
            SqlType::Double => "double precision".into(),
            SqlType::Text => "text".into(),
            SqlType::Varchar => "varchar".into(),
            SqlType::Char => "char".into(),
            SqlType::Bytea => "bytea".into(),
            SqlType::Boolean => "boolean".into(),
            SqlType::Date => "date".into(),
            SqlType::Time => "time".into(),
            SqlType::Timestamp => "timestamp".into(),
            SqlType::TimestampTz => "timestamptz".into(),
            SqlType::Interval => "interval".into(),
            SqlType::Json => "json".into(),
            SqlType::Jsonb => "jsonb".into(),
            SqlType::Uuid => "uuid".into(),
            SqlType::Array(inner) => format!("{}[]", inner.name()),
        }
    }

    /// Postgres cast applied to a bound placeholder targeting this type.
    pub fn pg_cast(&self) -> String {
        match self {
            SqlType::SmallInt => "int2".into(),
            SqlType::Integer => "int4".into(),
            SqlType::BigInt => "int8".into(),
            SqlType::Numeric => "numeric".into(),
            SqlType::Real => "float4".into(),
            SqlType::Double => "float8".into(),
            SqlType::Text | SqlType::Varchar | SqlType::Char => "text".into(),
            SqlType::Bytea => "bytea".into(),
            SqlType::Boolean => "bool".into(),
            SqlType::Date => "date".into(),
            SqlType::Time => "time".into(),
            SqlType::Timestamp => "timestamp".into(),
            SqlType::TimestampTz => "timestamptz".into(),
            SqlType::Interval => "interval".into(),
            SqlType::Json => "json".into(),
            SqlType::Jsonb => "jsonb".into(),
            SqlType::Uuid => "uuid".into(),
            SqlType::Array(inner) => format!("{}[]", inner.pg_cast()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, SqlType::Numeric | SqlType::Real | SqlType::Double)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, SqlType::Text | SqlType::Varchar | SqlType::Char)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SqlType::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, SqlType::Json | SqlType::Jsonb)
    }

    /// Coerces an incoming JSON value to the representation bound for this type.
    ///
    /// Numbers arriving as strings become numbers; timestamps, dates and uuids are
    /// checked for shape but kept as strings so the database performs the cast.
    pub fn coerce(&self, v: &JsonValue) -> Result<JsonValue, String> {
        if v.is_null() {
            return Ok(JsonValue::Null);
        }
        match self {
            SqlType::SmallInt => coerce_int(v, i16::MIN as i64, i16::MAX as i64, "smallint"),
            SqlType::Integer => coerce_int(v, i32::MIN as i64, i32::MAX as i64, "integer"),
            SqlType::BigInt => coerce_int(v, i64::MIN, i64::MAX, "bigint"),
            SqlType::Numeric => {
                if v.is_number() {
                    return Ok(v.clone());
                }
                if let Some(s) = v.as_str() {
                    let t = s.trim();
                    t.parse::<f64>().map_err(|_| "expected numeric".to_string())?;
                    // keep the decimal text; ::numeric preserves precision
                    return Ok(JsonValue::from(t));
                }
                Err("expected numeric".to_string())
            }
            SqlType::Real | SqlType::Double => {
                if let Some(f) = v.as_f64() {
                    return Ok(JsonValue::from(f));
                }
                if let Some(s) = v.as_str() {
                    let f = s
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| "expected float".to_string())?;
                    return Ok(JsonValue::from(f));
                }
                Err("expected float".to_string())
            }
            SqlType::Boolean => {
                if let Some(b) = v.as_bool() {
                    return Ok(JsonValue::from(b));
                }
                if let Some(n) = v.as_i64() {
                    return match n {
                        0 => Ok(JsonValue::from(false)),
                        1 => Ok(JsonValue::from(true)),
                        _ => Err("expected bool".to_string()),
                    };
                }
                if let Some(s) = v.as_str() {
                    let lc = s.trim().to_lowercase();
                    return match lc.as_str() {
                        "true" | "t" | "1" => Ok(JsonValue::from(true)),
                        "false" | "f" | "0" => Ok(JsonValue::from(false)),
                        _ => Err("expected bool".to_string()),
                    };
                }
                Err("expected bool".to_string())
            }
            SqlType::Uuid => {
                let s = v.as_str().ok_or_else(|| "expected uuid string".to_string())?;
                let id = uuid::Uuid::parse_str(s.trim()).map_err(|_| "expected uuid".to_string())?;
                Ok(JsonValue::from(id.hyphenated().to_string()))
            }
            SqlType::Timestamp | SqlType::TimestampTz => {
                let s = v
                    .as_str()
                    .ok_or_else(|| "expected timestamp string".to_string())?
                    .trim();
                if is_timestamp(s) {
                    Ok(JsonValue::from(s))
                } else {
                    Err("expected RFC3339 timestamp".to_string())
                }
            }
            SqlType::Date => {
                let s = v
                    .as_str()
                    .ok_or_else(|| "expected date string".to_string())?
                    .trim();
                if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || is_timestamp(s) {
                    Ok(JsonValue::from(s))
                } else {
                    Err("expected YYYY-MM-DD date".to_string())
                }
            }
            SqlType::Time => {
                let s = v
                    .as_str()
                    .ok_or_else(|| "expected time string".to_string())?
                    .trim();
                if NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
                    || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
                {
                    Ok(JsonValue::from(s))
                } else {
                    Err("expected HH:MM[:SS] time".to_string())
                }
            }
            // bound as JSON text; the placeholder cast parses it
            SqlType::Json | SqlType::Jsonb => Ok(JsonValue::from(v.to_string())),
            SqlType::Text | SqlType::Varchar | SqlType::Char => {
                if let Some(s) = v.as_str() {
                    return Ok(JsonValue::from(s));
                }
                if v.is_object() || v.is_array() {
                    return Err("expected string".to_string());
                }
                // numbers and bools stringify for text columns
                Ok(JsonValue::from(v.to_string()))
            }
            SqlType::Bytea | SqlType::Interval => v
                .as_str()
                .map(JsonValue::from)
                .ok_or_else(|| "expected string".to_string()),
            SqlType::Array(inner) => {
                let items = v.as_array().ok_or_else(|| "expected array".to_string())?;
                let coerced = items
                    .iter()
                    .map(|item| inner.coerce(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(JsonValue::Array(coerced))
            }
        }
    }
}

fn coerce_int(v: &JsonValue, min: i64, max: i64, label: &str) -> Result<JsonValue, String> {
    let n = if let Some(n) = v.as_i64() {
        n
    } else if let Some(f) = v.as_f64() {
        if f.fract() != 0.0 {
            return Err(format!("expected {}", label));
        }
        f as i64
    } else if let Some(s) = v.as_str() {
        s.trim()
            .parse::<i64>()
            .map_err(|_| format!("expected {}", label))?
    } else {
        return Err(format!("expected {}", label));
    };
    if n < min || n > max {
        return Err(format!("out of range for {}: {}", label, n));
    }
    Ok(JsonValue::from(n))
}

fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for SqlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// One column of a table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            length: None,
            precision: None,
            scale: None,
            not_null: false,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default_value: None,
            comment: None,
        }
    }

    /// Full type label, e.g. `varchar(50)` or `numeric(10,2)`.
    pub fn type_label(&self) -> String {
        match (&self.sql_type, self.length, self.precision, self.scale) {
            (_, Some(len), _, _) => format!("{}({})", self.sql_type, len),
            (_, None, Some(p), Some(s)) => format!("{}({},{})", self.sql_type, p, s),
            (_, None, Some(p), None) => format!("{}({})", self.sql_type, p),
            _ => self.sql_type.name(),
        }
    }

    /// Coerces `v` to this column's type, also enforcing declared character length.
    pub fn coerce(&self, v: &JsonValue) -> Result<JsonValue, String> {
        let out = self.sql_type.coerce(v)?;
        if let (Some(len), Some(s)) = (self.length, out.as_str()) {
            if self.sql_type.is_textual() && s.chars().count() > len as usize {
                return Err(format!("exceeds column length {}", len));
            }
        }
        Ok(out)
    }
}

/// Ordered columns of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_keys(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
