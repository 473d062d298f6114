use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::Error;

/// The tagged union of supported value types (§3). Kept as a real `enum`
/// rather than erased to a catch-all so `Ref`-vs-`Long` and
/// `Instant`-vs-`Long` stay distinguishable at the type level (§9).
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Double(f64),
    /// Milliseconds since the Unix epoch, UTC.
    Instant(i64),
    Keyword(String),
    Long(i64),
    /// Entity id of a referenced entity.
    Ref(i64),
    Str(String),
    /// Lowercase canonical UUID string.
    Uuid(String),
    /// RFC3986 URI string.
    Uri(String),
}

impl Value {
    pub fn keyword(ident: impl Into<String>) -> Self {
        Value::Keyword(ident.into())
    }

    pub fn long(value: i64) -> Self {
        Value::Long(value)
    }

    pub fn reference(entity: i64) -> Self {
        Value::Ref(entity)
    }

    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    pub fn uuid(value: impl Into<String>) -> Self {
        Value::Uuid(value.into())
    }

    pub fn uri(value: impl Into<String>) -> Self {
        Value::Uri(value.into())
    }

    pub fn instant(millis_since_epoch: i64) -> Self {
        Value::Instant(millis_since_epoch)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Double(_) => ValueType::Double,
            Value::Instant(_) => ValueType::Instant,
            Value::Keyword(_) => ValueType::Keyword,
            Value::Long(_) => ValueType::Long,
            Value::Ref(_) => ValueType::Ref,
            Value::Str(_) => ValueType::Str,
            Value::Uuid(_) => ValueType::Uuid,
            Value::Uri(_) => ValueType::Uri,
        }
    }

    /// Semantic validation beyond shape (§4.B): well-formed keyword,
    /// lowercase canonical UUID, parseable RFC3986 URI.
    pub fn validate_semantics(&self) -> Result<(), Error> {
        match self {
            Value::Keyword(ident) => validate_keyword(ident),
            Value::Uuid(value) => validate_uuid(value),
            Value::Uri(value) => validate_uri(value),
            _ => Ok(()),
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ref_entity(&self) -> Option<i64> {
        match self {
            Value::Ref(e) => Some(*e),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Instant(v) => write!(f, "{v}"),
            Value::Keyword(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Ref(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Uri(v) => write!(f, "{v}"),
        }
    }
}

// `Value` is used as a hash map / hash set key (the by-attribute-value
// indices in `LocalDatoms` and `Database`). `f64` only implements
// `PartialEq`, so equality and hashing for `Double` are defined over the
// IEEE-754 bit pattern rather than numeric equality: this makes `NaN`
// equal to itself and distinguishes `+0.0`/`-0.0`, trading strict IEEE-754
// semantics for the reflexivity `Eq`/`Hash` require.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Instant(a), Value::Instant(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Uri(a), Value::Uri(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Boolean(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Instant(v) => v.hash(state),
            Value::Keyword(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Ref(v) => v.hash(state),
            Value::Str(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Uri(v) => v.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// Value types supported by attributes (§3). Each variant corresponds to a
/// `db.type/*` keyword used as the stored `db/valueType` of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Double,
    Instant,
    Keyword,
    Long,
    Ref,
    Str,
    Uuid,
    Uri,
}

impl ValueType {
    pub const ALL: [ValueType; 9] = [
        ValueType::Boolean,
        ValueType::Double,
        ValueType::Instant,
        ValueType::Keyword,
        ValueType::Long,
        ValueType::Ref,
        ValueType::Str,
        ValueType::Uuid,
        ValueType::Uri,
    ];

    pub fn ident(self) -> &'static str {
        match self {
            ValueType::Boolean => "db.type/boolean",
            ValueType::Double => "db.type/double",
            ValueType::Instant => "db.type/instant",
            ValueType::Keyword => "db.type/keyword",
            ValueType::Long => "db.type/long",
            ValueType::Ref => "db.type/ref",
            ValueType::Str => "db.type/string",
            ValueType::Uuid => "db.type/uuid",
            ValueType::Uri => "db.type/uri",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        ValueType::ALL.into_iter().find(|vt| vt.ident() == ident)
    }

    pub fn matches(self, value: &Value) -> bool {
        value.value_type() == self
    }
}

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9_-]*(?:\.[A-Za-z][A-Za-z0-9_-]*)*/)?[A-Za-z][A-Za-z0-9_-]*$")
            .expect("keyword regex is valid")
    })
}

/// `((ident)(\.ident)*/)?ident` where `ident = [A-Za-z][A-Za-z0-9_-]*` (§3).
pub fn validate_keyword(value: &str) -> Result<(), Error> {
    if keyword_regex().is_match(value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "the value {value:?} is not a valid keyword value"
        )))
    }
}

pub fn validate_uuid(value: &str) -> Result<(), Error> {
    let is_lowercase = value.chars().all(|c| !c.is_ascii_uppercase());
    if is_lowercase && Uuid::parse_str(value).is_ok() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "the value {value:?} is not a valid lowercase UUID"
        )))
    }
}

pub fn validate_uri(value: &str) -> Result<(), Error> {
    if url::Url::parse(value).is_ok() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "the value {value:?} is not a valid URI"
        )))
    }
}

/// Backend wire representation (§6): the shape a concrete document-store
/// driver would actually marshal a `Value` into. Decoding needs the
/// attribute's `ValueType` alongside the wire form, since e.g. `Long` and
/// `Ref` share the same int64 wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Boolean(bool),
    Double(f64),
    /// Native timestamp, UTC.
    Timestamp(time::OffsetDateTime),
    Int64(i64),
    Str(String),
}

impl Value {
    pub fn to_wire(&self) -> WireValue {
        match self {
            Value::Boolean(v) => WireValue::Boolean(*v),
            Value::Double(v) => WireValue::Double(*v),
            Value::Instant(millis) => WireValue::Timestamp(crate::clock::millis_to_offset_date_time(*millis)),
            Value::Long(v) | Value::Ref(v) => WireValue::Int64(*v),
            Value::Keyword(v) | Value::Str(v) | Value::Uuid(v) | Value::Uri(v) => {
                WireValue::Str(v.clone())
            }
        }
    }

    pub fn from_wire(value_type: ValueType, wire: WireValue) -> Result<Value, Error> {
        match (value_type, wire) {
            (ValueType::Boolean, WireValue::Boolean(v)) => Ok(Value::Boolean(v)),
            (ValueType::Double, WireValue::Double(v)) => Ok(Value::Double(v)),
            (ValueType::Instant, WireValue::Timestamp(v)) => {
                Ok(Value::Instant(crate::clock::offset_date_time_to_millis(v)))
            }
            (ValueType::Long, WireValue::Int64(v)) => Ok(Value::Long(v)),
            (ValueType::Ref, WireValue::Int64(v)) => Ok(Value::Ref(v)),
            (ValueType::Keyword, WireValue::Str(v)) => Ok(Value::Keyword(v)),
            (ValueType::Str, WireValue::Str(v)) => Ok(Value::Str(v)),
            (ValueType::Uuid, WireValue::Str(v)) => Ok(Value::Uuid(v)),
            (ValueType::Uri, WireValue::Str(v)) => Ok(Value::Uri(v)),
            (value_type, wire) => Err(Error::validation(format!(
                "wire value {wire:?} does not match value type {:?}",
                value_type.ident()
            ))),
        }
    }
}
