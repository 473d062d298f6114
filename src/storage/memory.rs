use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::datom::Datom;
use crate::storage::{Backend, ReadStorage, Restricts, StorageError, WriteStorage};
use crate::value::Value;

/// A reference implementation of the backend contract (§6), standing in
/// for the concrete document-store driver this spec leaves out of scope
/// (§1): a named collection of `InMemoryDatoms` collections, one per
/// database, each indexed the way the real driver's secondary indices
/// would be (`e`, `a`, `tx`, `(a, v)`).
#[derive(Default)]
pub struct InMemoryStorage {
    databases: RefCell<HashMap<String, Rc<InMemoryDatoms>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for InMemoryStorage {
    type Db = InMemoryDatoms;

    fn create_database(&self, name: &str) -> Result<(), StorageError> {
        let mut databases = self.databases.borrow_mut();
        if databases.contains_key(name) {
            return Err(format!("database {name:?} already exists").into());
        }
        databases.insert(name.to_string(), Rc::new(InMemoryDatoms::new()));
        Ok(())
    }

    fn delete_database(&self, name: &str) -> Result<(), StorageError> {
        let mut databases = self.databases.borrow_mut();
        if databases.remove(name).is_none() {
            return Err(format!("database {name:?} does not exist").into());
        }
        Ok(())
    }

    fn list_databases(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.databases.borrow().keys().cloned().collect())
    }

    fn open(&self, name: &str) -> Result<Rc<InMemoryDatoms>, StorageError> {
        self.databases
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| format!("database {name:?} does not exist").into())
    }
}

/// One database's `datoms` collection (§6), held as a flat append-only
/// `Vec` plus secondary index maps from key to position.
#[derive(Default)]
pub struct InMemoryDatoms {
    docs: RefCell<Vec<Datom>>,
    by_entity: RefCell<HashMap<i64, Vec<usize>>>,
    by_attribute: RefCell<HashMap<String, Vec<usize>>>,
    by_attribute_value: RefCell<HashMap<(String, Value), Vec<usize>>>,
}

impl InMemoryDatoms {
    pub fn new() -> Self {
        Self::default()
    }

    fn candidate_indices(&self, restricts: &Restricts) -> Option<Vec<usize>> {
        if let (Some(a), Some(v)) = (&restricts.attribute, &restricts.value) {
            return Some(
                self.by_attribute_value
                    .borrow()
                    .get(&(a.clone(), v.clone()))
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        if let Some(e) = restricts.entity {
            return Some(self.by_entity.borrow().get(&e).cloned().unwrap_or_default());
        }
        if let Some(a) = &restricts.attribute {
            return Some(self.by_attribute.borrow().get(a).cloned().unwrap_or_default());
        }
        None
    }
}

impl ReadStorage for InMemoryDatoms {
    fn find(&self, restricts: &Restricts) -> Result<Vec<Datom>, StorageError> {
        let docs = self.docs.borrow();
        let datoms = match self.candidate_indices(restricts) {
            Some(indices) => indices
                .into_iter()
                .filter_map(|i| docs.get(i).cloned())
                .filter(|d| restricts.matches(d))
                .collect(),
            None => docs.iter().filter(|d| restricts.matches(d)).cloned().collect(),
        };
        Ok(datoms)
    }
}

impl WriteStorage for InMemoryDatoms {
    /// Round-trips each datom's value through the wire codec (§4.F.2 step
    /// 7) before appending, the way a real document-store driver would
    /// encode a value on its way into the write batch.
    fn save(&self, datoms: &[Datom]) -> Result<(), StorageError> {
        let mut docs = self.docs.borrow_mut();
        let mut by_entity = self.by_entity.borrow_mut();
        let mut by_attribute = self.by_attribute.borrow_mut();
        let mut by_attribute_value = self.by_attribute_value.borrow_mut();
        for datom in datoms {
            let value = Value::from_wire(datom.v.value_type(), datom.v.to_wire())?;
            let datom = Datom { v: value, ..datom.clone() };
            let index = docs.len();
            by_entity.entry(datom.e).or_default().push(index);
            by_attribute.entry(datom.a.clone()).or_default().push(index);
            by_attribute_value
                .entry((datom.a.clone(), datom.v.clone()))
                .or_default()
                .push(index);
            docs.push(datom);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SortKey;

    #[test]
    fn create_and_list_databases() {
        let storage = InMemoryStorage::new();
        storage.create_database("test").unwrap();
        assert_eq!(storage.list_databases().unwrap(), vec!["test".to_string()]);
        assert!(storage.create_database("test").is_err());
    }

    #[test]
    fn delete_database_removes_it() {
        let storage = InMemoryStorage::new();
        storage.create_database("test").unwrap();
        storage.delete_database("test").unwrap();
        assert!(storage.list_databases().unwrap().is_empty());
        assert!(storage.delete_database("test").is_err());
    }

    #[test]
    fn find_uses_secondary_indices() {
        let datoms = InMemoryDatoms::new();
        datoms
            .save(&[
                Datom::assert(1, 10, "person/name", "alice", 1),
                Datom::assert(2, 11, "person/name", "bob", 1),
                Datom::assert(3, 10, "person/age", 30i64, 1),
            ])
            .unwrap();

        let by_entity = datoms.find(&Restricts::new().with_entity(10)).unwrap();
        assert_eq!(by_entity.len(), 2);

        let by_av = datoms
            .find(&Restricts::new().with_attribute("person/name").with_value(Value::str("bob")))
            .unwrap();
        assert_eq!(by_av.len(), 1);
        assert_eq!(by_av[0].e, 11);

        let sorted = datoms
            .find_sorted(&Restricts::new(), SortKey::Entity, true)
            .unwrap();
        assert_eq!(sorted[0].e, 11);
    }
}
