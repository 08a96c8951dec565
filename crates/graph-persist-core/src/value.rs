//! Codec-neutral values and the `Scalar` conversion trait.
//!
//! Scalars are fields without identity: primitives, strings, times,
//! durations, ids, enums (by ordinal) and plain value structs. They are
//! compared by value during merges and stored inline by the codec.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodecError;

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    I128(i128),
    U128(u128),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Uuid([u8; 16]),
    /// UTC instant as seconds since the Unix epoch plus sub-second nanos.
    Timestamp { secs: i64, nanos: u32 },
    /// Unsigned span (`std::time::Duration`).
    Duration { secs: u64, nanos: u32 },
    /// Signed span (`chrono::TimeDelta`).
    TimeDelta { secs: i64, nanos: i32 },
    /// Enumeration passed through as its discriminant.
    Enum(i64),
    /// Value struct, fields by name.
    Struct(Vec<(String, Value)>),
    List(Vec<Value>),
    /// Reference to a tracked node in the image's node table.
    Ref(u32),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::I128(_) => "i128",
            Value::U128(_) => "u128",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::Timestamp { .. } => "timestamp",
            Value::Duration { .. } => "duration",
            Value::TimeDelta { .. } => "time delta",
            Value::Enum(_) => "enum",
            Value::Struct(_) => "struct",
            Value::List(_) => "list",
            Value::Ref(_) => "reference",
        }
    }

    /// Looks up a member of a `Value::Struct`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Builds the error for a value of the wrong kind.
    pub fn unexpected(&self, expected: &'static str) -> CodecError {
        CodecError::UnexpectedValue {
            expected,
            found: self.kind(),
        }
    }

    /// Reads member `name` of a value struct, failing when it is absent.
    pub fn member<S: Scalar>(&self, name: &'static str) -> Result<S, CodecError> {
        match self {
            Value::Struct(_) => S::from_value(self.field(name).unwrap_or(&Value::Null)),
            other => Err(other.unexpected("struct")),
        }
    }
}

/// A field type without identity, stored inline and compared by value.
///
/// Implemented for the built-in primitive-like types. Enumerations use
/// `ordinal_scalar!`; value structs implement it by hand through
/// `Value::Struct`.
pub trait Scalar: Clone + PartialEq + Send + Sync + 'static {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> Result<Self, CodecError>;

    /// Whether a merge may leave `self` in place of `other`.
    ///
    /// Floats compare bit patterns, so a NaN equals itself. Value structs
    /// holding floats should override this the same way.
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

macro_rules! signed_scalar {
    ($($ty:ty),+) => {$(
        impl Scalar for $ty {
            fn to_value(&self) -> Value {
                Value::I64(i64::from(*self))
            }

            fn from_value(value: &Value) -> Result<Self, CodecError> {
                match value {
                    Value::I64(v) => {
                        <$ty>::try_from(*v).map_err(|_| CodecError::OutOfRange(stringify!($ty)))
                    }
                    other => Err(other.unexpected("i64")),
                }
            }
        }
    )+};
}

macro_rules! unsigned_scalar {
    ($($ty:ty),+) => {$(
        impl Scalar for $ty {
            fn to_value(&self) -> Value {
                Value::U64(u64::from(*self))
            }

            fn from_value(value: &Value) -> Result<Self, CodecError> {
                match value {
                    Value::U64(v) => {
                        <$ty>::try_from(*v).map_err(|_| CodecError::OutOfRange(stringify!($ty)))
                    }
                    other => Err(other.unexpected("u64")),
                }
            }
        }
    )+};
}

signed_scalar!(i8, i16, i32, i64);
unsigned_scalar!(u8, u16, u32, u64);

/// Implements `Scalar` for a type stored as exactly one `Value` variant.
macro_rules! direct_scalar {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl Scalar for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: &Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => Err(other.unexpected($kind)),
                }
            }
        }
    };
}

direct_scalar!(bool, Bool, "bool");
direct_scalar!(i128, I128, "i128");
direct_scalar!(u128, U128, "u128");
direct_scalar!(char, Char, "char");
direct_scalar!(String, Str, "string");

macro_rules! float_scalar {
    ($($ty:ty, $variant:ident, $kind:literal);+) => {$(
        impl Scalar for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn from_value(value: &Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(other.unexpected($kind)),
                }
            }

            fn same_value(&self, other: &Self) -> bool {
                self.to_bits() == other.to_bits()
            }
        }
    )+};
}

float_scalar!(f32, F32, "f32"; f64, F64, "f64");

impl Scalar for isize {
    fn to_value(&self) -> Value {
        Value::I64(*self as i64)
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::I64(v) => isize::try_from(*v).map_err(|_| CodecError::OutOfRange("isize")),
            other => Err(other.unexpected("i64")),
        }
    }
}

impl Scalar for usize {
    fn to_value(&self) -> Value {
        Value::U64(*self as u64)
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::U64(v) => usize::try_from(*v).map_err(|_| CodecError::OutOfRange("usize")),
            other => Err(other.unexpected("u64")),
        }
    }
}

impl Scalar for Uuid {
    fn to_value(&self) -> Value {
        Value::Uuid(*self.as_bytes())
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Uuid(bytes) => Ok(Uuid::from_bytes(*bytes)),
            other => Err(other.unexpected("uuid")),
        }
    }
}

impl Scalar for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp {
            secs: self.timestamp(),
            nanos: self.timestamp_subsec_nanos(),
        }
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Timestamp { secs, nanos } => DateTime::from_timestamp(*secs, *nanos)
                .ok_or(CodecError::OutOfRange("DateTime<Utc>")),
            other => Err(other.unexpected("timestamp")),
        }
    }
}

impl Scalar for NaiveDateTime {
    fn to_value(&self) -> Value {
        self.and_utc().to_value()
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        DateTime::<Utc>::from_value(value).map(|dt| dt.naive_utc())
    }
}

impl Scalar for Duration {
    fn to_value(&self) -> Value {
        Value::Duration {
            secs: self.as_secs(),
            nanos: self.subsec_nanos(),
        }
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Duration { secs, nanos } if *nanos < 1_000_000_000 => {
                Ok(Duration::new(*secs, *nanos))
            }
            Value::Duration { .. } => Err(CodecError::OutOfRange("Duration")),
            other => Err(other.unexpected("duration")),
        }
    }
}

impl Scalar for TimeDelta {
    fn to_value(&self) -> Value {
        Value::TimeDelta {
            secs: self.num_seconds(),
            nanos: self.subsec_nanos(),
        }
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::TimeDelta { secs, nanos } => TimeDelta::try_seconds(*secs)
                .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(i64::from(*nanos))))
                .ok_or(CodecError::OutOfRange("TimeDelta")),
            other => Err(other.unexpected("time delta")),
        }
    }
}

impl<S: Scalar> Scalar for Option<S> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => S::from_value(other).map(Some),
        }
    }

    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Implements `Scalar` for a fieldless enum, stored as its discriminant.
///
/// ```
/// use graph_persist_core::ordinal_scalar;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Default)]
/// enum Level {
///     #[default]
///     Low,
///     High = 10,
/// }
///
/// ordinal_scalar!(Level { Low, High });
/// ```
#[macro_export]
macro_rules! ordinal_scalar {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::Scalar for $ty {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Enum(self.clone() as i64)
            }

            fn from_value(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::CodecError> {
                match value {
                    $crate::Value::Enum(ordinal) => {
                        $(
                            if *ordinal == $ty::$variant as i64 {
                                return Ok($ty::$variant);
                            }
                        )+
                        Err($crate::CodecError::OutOfRange(stringify!($ty)))
                    }
                    other => Err(other.unexpected("enum")),
                }
            }
        }
    };
}
