//! XML Schema typed attribute values.
//!
//! Subject properties arrive as loosely typed [`PropertyValue`]s. Release
//! converts them to the canonical lexical form of the descriptor's
//! [`XsType`]; a list converts element-wise into repeated values.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value could not be represented in the requested XML Schema type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {value} to xs:{xs_type}: {reason}")]
pub struct ConversionError {
    /// Target type.
    pub xs_type: XsType,
    /// Short rendering of the offending value.
    pub value: String,
    /// Why the conversion failed.
    pub reason: String,
}

/// XML Schema built-in types usable as attribute value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum XsType {
    /// `xs:string`.
    #[default]
    String,
    /// `xs:anyURI`.
    #[serde(rename = "anyURI")]
    AnyUri,
    /// `xs:boolean`.
    Boolean,
    /// `xs:integer`.
    Integer,
    /// `xs:long`.
    Long,
    /// `xs:int`.
    Int,
    /// `xs:short`.
    Short,
    /// `xs:decimal`.
    Decimal,
    /// `xs:float`.
    Float,
    /// `xs:double`.
    Double,
    /// `xs:date`.
    Date,
    /// `xs:dateTime`.
    DateTime,
    /// `xs:time`.
    Time,
    /// `xs:base64Binary`.
    Base64Binary,
    /// `xs:hexBinary`.
    HexBinary,
}

impl XsType {
    /// Returns the local type name, e.g. `dateTime`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::AnyUri => "anyURI",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Int => "int",
            Self::Short => "short",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Double => "double",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Base64Binary => "base64Binary",
            Self::HexBinary => "hexBinary",
        }
    }

    /// Returns the prefixed name used in `xsi:type`, e.g. `xs:string`.
    #[must_use]
    pub fn qualified_name(self) -> String {
        format!("xs:{}", self.name())
    }

    /// Converts `value` to one canonical lexical value per scalar.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if any scalar cannot be represented.
    pub fn convert(self, value: &PropertyValue) -> Result<Vec<String>, ConversionError> {
        let mut out = Vec::new();
        self.convert_into(value, &mut out)?;
        Ok(out)
    }

    fn convert_into(self, value: &PropertyValue, out: &mut Vec<String>) -> Result<(), ConversionError> {
        if let PropertyValue::List(items) = value {
            for item in items {
                self.convert_into(item, out)?;
            }
            return Ok(());
        }
        out.push(self.convert_scalar(value)?);
        Ok(())
    }

    fn convert_scalar(self, value: &PropertyValue) -> Result<String, ConversionError> {
        use PropertyValue as V;

        let fail = |reason: &str| ConversionError {
            xs_type: self,
            value: value.summary(),
            reason: reason.to_string(),
        };

        match (self, value) {
            (_, V::List(_)) => Err(fail("nested list")),

            (Self::String | Self::AnyUri, V::Text(s)) => Ok(s.clone()),
            (Self::String | Self::AnyUri, V::Bytes(_)) => Err(fail("undecoded bytes")),
            (Self::String, other) => Ok(other.lexical()),
            (Self::AnyUri, _) => Err(fail("not a URI")),

            (Self::Boolean, V::Boolean(b)) => Ok(b.to_string()),
            (Self::Boolean, V::Integer(0)) => Ok("false".to_string()),
            (Self::Boolean, V::Integer(1)) => Ok("true".to_string()),
            (Self::Boolean, V::Text(s)) => match s.trim() {
                "true" | "1" => Ok("true".to_string()),
                "false" | "0" => Ok("false".to_string()),
                _ => Err(fail("not a boolean literal")),
            },
            (Self::Boolean, _) => Err(fail("not a boolean")),

            (Self::Integer | Self::Long | Self::Int | Self::Short, _) => {
                let n = match value {
                    V::Integer(n) => *n,
                    V::Boolean(b) => i64::from(*b),
                    V::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                        i64::from_str(&format!("{f:.0}")).map_err(|_| fail("out of range"))?
                    }
                    V::Text(s) => s.trim().parse().map_err(|_| fail("not an integer literal"))?,
                    _ => return Err(fail("not an integer")),
                };
                self.check_range(n).ok_or_else(|| fail("out of range"))
            }

            (Self::Decimal, V::Integer(n)) => Ok(n.to_string()),
            (Self::Decimal, V::Float(f)) if f.is_finite() => Ok(decimal(*f)),
            (Self::Decimal, V::Text(s)) => {
                let s = s.trim();
                if is_decimal_literal(s) {
                    Ok(s.to_string())
                } else {
                    Err(fail("not a decimal literal"))
                }
            }
            (Self::Decimal, _) => Err(fail("not a decimal")),

            #[allow(clippy::cast_precision_loss)]
            (Self::Float | Self::Double, V::Integer(n)) => Ok(floating(*n as f64)),
            (Self::Float | Self::Double, V::Float(f)) => Ok(floating(*f)),
            (Self::Float | Self::Double, V::Text(s)) => match s.trim() {
                "INF" => Ok("INF".to_string()),
                "-INF" => Ok("-INF".to_string()),
                "NaN" => Ok("NaN".to_string()),
                t => t
                    .parse::<f64>()
                    .map(floating)
                    .map_err(|_| fail("not a floating point literal")),
            },
            (Self::Float | Self::Double, _) => Err(fail("not a number")),

            (Self::Date, V::Date(d)) => Ok(d.format("%Y-%m-%d").to_string()),
            (Self::Date, V::DateTime(dt)) => Ok(dt.date_naive().format("%Y-%m-%d").to_string()),
            (Self::Date, V::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .map_err(|_| fail("not a date literal")),
            (Self::Date, _) => Err(fail("not a date")),

            (Self::DateTime, V::DateTime(dt)) => Ok(date_time(dt)),
            (Self::DateTime, V::Date(d)) => Ok(date_time(&d.and_time(NaiveTime::MIN).and_utc())),
            (Self::DateTime, V::Text(s)) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| date_time(&dt.with_timezone(&Utc)))
                .map_err(|_| fail("not a dateTime literal")),
            (Self::DateTime, _) => Err(fail("not a dateTime")),

            (Self::Time, V::DateTime(dt)) => Ok(dt.format("%H:%M:%SZ").to_string()),
            (Self::Time, V::Text(s)) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                .map(|t| t.format("%H:%M:%S").to_string())
                .map_err(|_| fail("not a time literal")),
            (Self::Time, _) => Err(fail("not a time")),

            (Self::Base64Binary, V::Bytes(b)) => Ok(base64::engine::general_purpose::STANDARD.encode(b)),
            (Self::Base64Binary, V::Text(s)) => {
                Ok(base64::engine::general_purpose::STANDARD.encode(s.as_bytes()))
            }
            (Self::Base64Binary, _) => Err(fail("not binary")),

            (Self::HexBinary, V::Bytes(b)) => Ok(hex(b)),
            (Self::HexBinary, V::Text(s)) => Ok(hex(s.as_bytes())),
            (Self::HexBinary, _) => Err(fail("not binary")),
        }
    }

    fn check_range(self, n: i64) -> Option<String> {
        let fits = match self {
            Self::Int => i32::try_from(n).is_ok(),
            Self::Short => i16::try_from(n).is_ok(),
            _ => true,
        };
        fits.then(|| n.to_string())
    }
}

impl fmt::Display for XsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for XsType {
    type Err = String;

    /// Parses `string`, `xs:string` or `xsd:string` style names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let local = s.rsplit(':').next().unwrap_or(s);
        [
            Self::String,
            Self::AnyUri,
            Self::Boolean,
            Self::Integer,
            Self::Long,
            Self::Int,
            Self::Short,
            Self::Decimal,
            Self::Float,
            Self::Double,
            Self::Date,
            Self::DateTime,
            Self::Time,
            Self::Base64Binary,
            Self::HexBinary,
        ]
        .into_iter()
        .find(|t| t.name() == local)
        .ok_or_else(|| format!("unknown XML Schema type: {s}"))
    }
}

/// A raw subject property value, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Text.
    Text(String),
    /// Raw bytes; text stored by a legacy backend arrives this way.
    Bytes(Vec<u8>),
    /// Integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Instant.
    DateTime(DateTime<Utc>),
    /// Multiple values; released as repeated `AttributeValue`s.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Creates a list value.
    #[must_use]
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns a short rendering for log and error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
            Self::List(items) => format!("<list of {}>", items.len()),
            other => {
                let text = other.lexical();
                if text.chars().count() > 32 {
                    format!("{:?}...", text.chars().take(32).collect::<String>())
                } else {
                    format!("{text:?}")
                }
            }
        }
    }

    fn lexical(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) => floating(*f),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => date_time(dt),
            Self::List(items) => items.iter().map(Self::lexical).collect::<Vec<_>>().join(" "),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDate> for PropertyValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

fn date_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn floating(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "INF" } else { "-INF" }).to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn decimal(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// `[+-]? digits ('.' digits?)? | [+-]? '.' digits`, no exponent.
fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    !(int.is_empty() && frac.is_empty()) && all_digits(int) && all_digits(frac)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
