use std::collections::HashMap;
use std::sync::OnceLock;

use crate::schema::attribute::Attribute;
use crate::schema::{Cardinality, Unique, DB_CARDINALITY, DB_DOC, DB_IDENT, DB_TX_INSTANT, DB_UNIQUE, DB_VALUE_TYPE};
use crate::value::ValueType;

/// The builtin attributes describing the schema system itself (§3).
/// Unlike user-defined attributes, these are never stored as datoms —
/// they're fixed constants every `Database` already knows about, so
/// schema bootstraps without a chicken-and-egg transaction.
pub fn builtin_attributes() -> &'static HashMap<String, Attribute> {
    static BUILTIN: OnceLock<HashMap<String, Attribute>> = OnceLock::new();
    BUILTIN.get_or_init(|| {
        let attrs = vec![
            Attribute::new(DB_TX_INSTANT, ValueType::Instant, Cardinality::One)
                .with_doc("Transaction's wall-clock time"),
            Attribute::new(DB_IDENT, ValueType::Keyword, Cardinality::One)
                .with_unique(Unique::Identity)
                .with_doc("Attribute's unique name"),
            Attribute::new(DB_VALUE_TYPE, ValueType::Keyword, Cardinality::One)
                .with_restricted_values(ValueType::ALL.iter().map(|vt| vt.ident().to_string()).collect())
                .with_doc("Attribute's value type"),
            Attribute::new(DB_CARDINALITY, ValueType::Keyword, Cardinality::One)
                .with_restricted_values(Cardinality::values().iter().map(|s| s.to_string()).collect())
                .with_doc("Attribute's cardinality"),
            Attribute::new(DB_UNIQUE, ValueType::Keyword, Cardinality::One)
                .with_restricted_values(Unique::values().iter().map(|s| s.to_string()).collect())
                .with_doc("Attribute's uniqueness constraint"),
            Attribute::new(DB_DOC, ValueType::Str, Cardinality::One).with_doc("Attribute's documentation"),
        ];
        attrs.into_iter().map(|attr| (attr.ident.clone(), attr)).collect()
    })
}
