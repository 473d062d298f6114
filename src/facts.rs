use uuid::Uuid;

use crate::datom::Op;
use crate::value::Value;

/// How a fact tuple's entity position should be resolved into a concrete
/// entity id during `transaction_data` (§4.A, §4.F.1).
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRef {
    /// Mint a brand-new entity, independent of any other operation in the
    /// same transaction.
    New,
    /// An entity id already assigned in a prior transaction (or earlier in
    /// this one).
    Id(i64),
    /// A placeholder shared by every operation using the same name within
    /// one `Facts` buffer; resolves to the same entity id everywhere.
    TempId(String),
    /// Resolves via a unique attribute's current value, e.g. `("product/pid", "A2651")`.
    LookupRef(String, Value),
}

impl EntityRef {
    pub fn temp_id(name: impl Into<String>) -> Self {
        EntityRef::TempId(name.into())
    }

    pub fn lookup(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        EntityRef::LookupRef(attribute.into(), value.into())
    }
}

impl From<i64> for EntityRef {
    fn from(id: i64) -> Self {
        EntityRef::Id(id)
    }
}

impl From<&str> for EntityRef {
    fn from(name: &str) -> Self {
        EntityRef::TempId(name.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(name: String) -> Self {
        EntityRef::TempId(name)
    }
}

pub type FactTuple = (EntityRef, String, Value, Op);

/// A staging buffer of (entity-ref, attribute, value, op) operations (§4.A),
/// handed to `Connection::transact` or `Database::as_if` as one atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    operations: Vec<FactTuple>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactTuple> {
        self.operations.iter()
    }

    pub fn add(
        &mut self,
        entity: impl Into<EntityRef>,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.operations
            .push((entity.into(), attribute.into(), value.into(), Op::Assert));
        self
    }

    pub fn remove(
        &mut self,
        entity: impl Into<EntityRef>,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.operations
            .push((entity.into(), attribute.into(), value.into(), Op::Retract));
        self
    }

    /// Retracts `old_value` and asserts `new_value` as one pair of ops —
    /// the idiom a cardinality-one attribute's value must go through,
    /// since asserting over an existing value is itself an error (§4.C).
    pub fn replace(
        &mut self,
        entity: impl Into<EntityRef>,
        attribute: impl Into<String>,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> &mut Self {
        let entity = entity.into();
        let attribute = attribute.into();
        self.operations
            .push((entity.clone(), attribute.clone(), old_value.into(), Op::Retract));
        self.operations.push((entity, attribute, new_value.into(), Op::Assert));
        self
    }

    /// Asserts every (attribute, value) pair against one entity. An
    /// `EntityRef::New` is materialized into a single anonymous temp-id
    /// (§4.A) before the pairs are added, so they all land on the same
    /// freshly-minted entity instead of each getting their own.
    pub fn add_set(
        &mut self,
        entity: impl Into<EntityRef>,
        pairs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> &mut Self {
        let entity = match entity.into() {
            EntityRef::New => Facts::anonymous(),
            other => other,
        };
        for (attribute, value) in pairs {
            self.operations.push((entity.clone(), attribute.to_string(), value, Op::Assert));
        }
        self
    }

    /// A fresh anonymous temp-id backed by a UUID (§4.A).
    pub fn anonymous() -> EntityRef {
        EntityRef::TempId(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_set_shares_one_materialized_entity_across_pairs() {
        let mut facts = Facts::new();
        facts.add_set(
            EntityRef::New,
            [("db/ident", Value::keyword("a")), ("db/doc", Value::str("doc"))],
        );
        let ops: Vec<_> = facts.iter().collect();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].0, ops[1].0);
    }

    #[test]
    fn two_new_entity_refs_are_never_the_same() {
        let a = Facts::anonymous();
        let b = Facts::anonymous();
        assert_ne!(a, b);
    }

    #[test]
    fn replace_emits_retract_then_assert() {
        let mut facts = Facts::new();
        facts.replace(1, "product/name", "old", "new");
        let ops: Vec<_> = facts.iter().collect();
        assert_eq!(ops[0].3, Op::Retract);
        assert_eq!(ops[1].3, Op::Assert);
    }
}
