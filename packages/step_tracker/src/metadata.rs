use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Descriptive information about a tracking session, such as the name of the script being run.
///
/// Keys are kept in ascending order so that reports list them deterministically.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value attached to a [`Session`](crate::Session).
///
/// Values are converted from common Rust types via `From`:
///
/// ```
/// use step_tracker::MetadataValue;
///
/// assert_eq!(MetadataValue::from("etl"), MetadataValue::Text("etl".to_string()));
/// assert_eq!(MetadataValue::from(3), MetadataValue::Integer(3));
/// assert_eq!(
///     MetadataValue::from(vec!["a", "b"]),
///     MetadataValue::List(vec!["a".into(), "b".into()])
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum MetadataValue {
    /// Free-form text.
    Text(String),

    /// A whole number.
    Integer(i64),

    /// A floating point number.
    Float(f64),

    /// A flag.
    Bool(bool),

    /// An ordered list of values.
    List(Vec<MetadataValue>),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::List(values) => {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "{value}")?;
                }

                Ok(())
            }
        }
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T> From<Vec<T>> for MetadataValue
where
    T: Into<Self>,
{
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}
