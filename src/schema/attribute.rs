use std::collections::HashMap;
use std::collections::HashSet;

use crate::datom::Op;
use crate::db::{Database, EntityValue};
use crate::error::Error;
use crate::schema::{Cardinality, Unique, DB_CARDINALITY, DB_DOC, DB_IDENT, DB_UNIQUE, DB_VALUE_TYPE};
use crate::storage::Backend;
use crate::value::{Value, ValueType};

/// An attribute's schema definition (§3): a `db/valueType`, `db/cardinality`
/// and optional `db/unique`/`db/doc`, stored as an ordinary entity except
/// for the hard-coded builtins (`schema::default`).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub ident: String,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub unique: Option<Unique>,
    pub doc: String,
    /// Restricts the attribute's values to a fixed keyword vocabulary.
    /// Only ever set on the handful of builtin meta-attributes (§3);
    /// user-defined attributes can't express this.
    pub restricted_values: Option<HashSet<String>>,
}

impl Attribute {
    pub fn new(ident: impl Into<String>, value_type: ValueType, cardinality: Cardinality) -> Self {
        Attribute {
            ident: ident.into(),
            value_type,
            cardinality,
            unique: None,
            doc: String::new(),
            restricted_values: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn with_unique(mut self, unique: Unique) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn with_restricted_values(mut self, values: HashSet<String>) -> Self {
        self.restricted_values = Some(values);
        self
    }

    pub fn is_unique(&self) -> bool {
        self.unique.is_some()
    }

    /// Reconstructs an attribute definition from its own entity's folded
    /// facts (§4.C step 0). `db/ident`, `db/valueType` and `db/cardinality`
    /// are required; `db/unique`/`db/doc` are optional.
    pub fn from_entity_map(map: &HashMap<String, EntityValue>) -> Result<Attribute, Error> {
        let ident = Self::require_keyword(map, DB_IDENT)?;
        let value_type_ident = Self::require_keyword(map, DB_VALUE_TYPE)?;
        let value_type = ValueType::from_ident(&value_type_ident).ok_or_else(|| {
            Error::schema(format!(
                "attribute {ident:?} has unknown value type {value_type_ident:?}"
            ))
        })?;
        let cardinality_ident = Self::require_keyword(map, DB_CARDINALITY)?;
        let cardinality = Cardinality::from_ident(&cardinality_ident).ok_or_else(|| {
            Error::schema(format!(
                "attribute {ident:?} has unknown cardinality {cardinality_ident:?}"
            ))
        })?;
        let unique = match map.get(DB_UNIQUE) {
            Some(EntityValue::One(Value::Keyword(k))) => Some(Unique::from_ident(k).ok_or_else(|| {
                Error::schema(format!("attribute {ident:?} has unknown uniqueness {k:?}"))
            })?),
            _ => None,
        };
        let doc = match map.get(DB_DOC) {
            Some(EntityValue::One(Value::Str(s))) => s.clone(),
            _ => String::new(),
        };
        if unique.is_some() && cardinality != Cardinality::One {
            return Err(Error::schema(format!(
                "attribute {ident:?} cannot be unique with cardinality many"
            )));
        }
        Ok(Attribute {
            ident,
            value_type,
            cardinality,
            unique,
            doc,
            restricted_values: None,
        })
    }

    fn require_keyword(map: &HashMap<String, EntityValue>, key: &str) -> Result<String, Error> {
        match map.get(key) {
            Some(EntityValue::One(Value::Keyword(s))) => Ok(s.clone()),
            _ => Err(Error::schema(format!(
                "required attribute {key:?} is missing or malformed"
            ))),
        }
    }

    /// Step 1: value type matches, shape/semantics are valid, and (if set)
    /// the value is one of `restricted_values`.
    pub fn validate_value(&self, value: &Value) -> Result<(), Error> {
        if value.value_type() != self.value_type {
            return Err(Error::validation(format!(
                "attribute {:?} expects a value of type {:?}, got {:?}",
                self.ident,
                self.value_type.ident(),
                value.value_type().ident()
            )));
        }
        value.validate_semantics()?;
        self.validate_restricted_values(value)
    }

    fn validate_restricted_values(&self, value: &Value) -> Result<(), Error> {
        match (&self.restricted_values, value) {
            (Some(allowed), Value::Keyword(k)) if !allowed.contains(k) => Err(Error::validation(format!(
                "attribute {:?} does not accept the value {:?}",
                self.ident, k
            ))),
            _ => Ok(()),
        }
    }

    /// Step 2: for `Ref`-typed attributes only, the referenced entity must
    /// already exist (§4.C).
    pub fn validate_ref<B: Backend>(&self, value: &Value, db: &Database<B>) -> Result<(), Error> {
        if self.value_type != ValueType::Ref {
            return Ok(());
        }
        let Some(entity) = value.as_ref_entity() else {
            return Ok(());
        };
        if db.get(entity)?.is_empty() {
            return Err(Error::validation(format!(
                "attribute {:?} references entity {entity}, which does not exist",
                self.ident
            )));
        }
        Ok(())
    }

    /// Step 3: the four cardinality x op branches (§4.C).
    pub fn validate_cardinality(
        &self,
        entity: i64,
        value: &Value,
        op: Op,
        existing: Option<&EntityValue>,
    ) -> Result<(), Error> {
        match (op, self.cardinality) {
            (Op::Assert, Cardinality::One) => {
                if existing.is_some() {
                    return Err(Error::validation(format!(
                        "cannot add attribute {:?} of entity {entity}: a value is already set (cardinality is one, retract it first)",
                        self.ident
                    )));
                }
                Ok(())
            }
            (Op::Assert, Cardinality::Many) => {
                if let Some(EntityValue::Many(values)) = existing {
                    if values.contains(value) {
                        return Err(Error::validation(format!(
                            "entity {entity} already has the value {value} for attribute {:?}",
                            self.ident
                        )));
                    }
                }
                Ok(())
            }
            (Op::Retract, Cardinality::One) => match existing {
                Some(EntityValue::One(v)) if v == value => Ok(()),
                _ => Err(Error::validation(format!(
                    "cannot retract attribute {:?} of entity {entity}: no matching value is set",
                    self.ident
                ))),
            },
            (Op::Retract, Cardinality::Many) => match existing {
                Some(EntityValue::Many(values)) if values.contains(value) => Ok(()),
                _ => Err(Error::validation(format!(
                    "cannot retract attribute {:?} of entity {entity}: no matching value is set",
                    self.ident
                ))),
            },
        }
    }

    /// Step 4: for unique attributes, asserting a value already held by
    /// another entity is a conflict (§4.C).
    pub fn validate_uniqueness<B: Backend>(&self, value: &Value, op: Op, db: &Database<B>) -> Result<(), Error> {
        if op != Op::Assert || self.unique.is_none() {
            return Ok(());
        }
        match db.lookup(&self.ident, value) {
            Ok(entity) => Err(Error::UniquenessViolation {
                attribute: self.ident.clone(),
                value: value.to_string(),
                entity,
            }),
            Err(err) if err.is_entity_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
