pub mod memory;

use std::error::Error as StdError;
use std::rc::Rc;

use crate::datom::Datom;
use crate::value::Value;

/// Errors from the concrete backend driver are erased to this boxed form
/// at the trait seam (§1: the wire protocol and driver are out of scope).
pub type StorageError = Box<dyn StdError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxRestrict {
    #[default]
    Any,
    AtMost(i64),
}

impl TxRestrict {
    fn matches(self, tx: i64) -> bool {
        match self {
            TxRestrict::Any => true,
            TxRestrict::AtMost(max) => tx <= max,
        }
    }
}

/// Filter descriptor for `ReadStorage::find` (§6). Every field is an `AND`
/// restriction; `None`/absent means unconstrained.
#[derive(Debug, Clone, Default)]
pub struct Restricts {
    pub entity: Option<i64>,
    pub entities: Option<Vec<i64>>,
    pub attribute: Option<String>,
    pub value: Option<Value>,
    pub tx: TxRestrict,
}

impl Restricts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: i64) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_entities(mut self, entities: Vec<i64>) -> Self {
        self.entities = Some(entities);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_tx_at_most(mut self, tx: i64) -> Self {
        self.tx = TxRestrict::AtMost(tx);
        self
    }

    pub fn matches(&self, datom: &Datom) -> bool {
        self.entity.map_or(true, |e| datom.e == e)
            && self
                .entities
                .as_ref()
                .map_or(true, |es| es.contains(&datom.e))
            && self.attribute.as_deref().map_or(true, |a| datom.a == a)
            && self.value.as_ref().map_or(true, |v| v == &datom.v)
            && self.tx.matches(datom.tx)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SortKey {
    Id,
    Entity,
    Tx,
}

impl SortKey {
    fn key(self, datom: &Datom) -> i64 {
        match self {
            SortKey::Id => datom.id,
            SortKey::Entity => datom.e,
            SortKey::Tx => datom.tx,
        }
    }
}

/// Read side of the backend contract (§6): filter-and-sort over one
/// database's `datoms` collection. Returns every matching datom regardless
/// of `op` — retraction semantics are interpreted by `Database`, not here.
pub trait ReadStorage {
    fn find(&self, restricts: &Restricts) -> Result<Vec<Datom>, StorageError>;

    fn find_sorted(
        &self,
        restricts: &Restricts,
        sort: SortKey,
        descending: bool,
    ) -> Result<Vec<Datom>, StorageError> {
        let mut datoms = self.find(restricts)?;
        datoms.sort_by_key(|d| sort.key(d));
        if descending {
            datoms.reverse();
        }
        Ok(datoms)
    }

    fn find_one_sorted(
        &self,
        restricts: &Restricts,
        sort: SortKey,
        descending: bool,
    ) -> Result<Option<Datom>, StorageError> {
        Ok(self.find_sorted(restricts, sort, descending)?.into_iter().next())
    }
}

/// Write side of the backend contract: bulk insert, the only write path
/// (§4.F.2, §5).
pub trait WriteStorage {
    fn save(&self, datoms: &[Datom]) -> Result<(), StorageError>;
}

pub trait DatomStore: ReadStorage + WriteStorage {}
impl<T: ReadStorage + WriteStorage> DatomStore for T {}

/// The backend itself (§4.G, §6): lifecycle of named databases, each
/// backed by a `DatomStore`.
pub trait Backend {
    type Db: DatomStore;

    fn create_database(&self, name: &str) -> Result<(), StorageError>;
    fn delete_database(&self, name: &str) -> Result<(), StorageError>;
    fn list_databases(&self) -> Result<Vec<String>, StorageError>;
    fn open(&self, name: &str) -> Result<Rc<Self::Db>, StorageError>;
}
