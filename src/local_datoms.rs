use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::datom::Datom;
use crate::value::Value;

/// The overlay of not-yet-remote datoms layered on top of a backend
/// snapshot (§4.D): everything transacted since the `Connection` last
/// re-read the remote, plus every speculative datom added by `as_if`.
///
/// Caches are lazily built and, like `Database`'s own caches, are mutated
/// through shared references — `Database`'s read methods only ever need
/// `&self`.
#[derive(Debug, Default)]
pub struct LocalDatoms {
    datoms: RefCell<Vec<Datom>>,
    max_entity: Cell<Option<i64>>,
    max_id: Cell<Option<i64>>,
    max_tx: Cell<Option<i64>>,
    by_attribute: RefCell<Option<HashMap<String, Vec<Datom>>>>,
    by_attribute_value: RefCell<Option<HashMap<(String, Value), Vec<Datom>>>>,
    by_entity: RefCell<Option<HashMap<i64, Vec<Datom>>>>,
}

impl LocalDatoms {
    pub fn new(datoms: Vec<Datom>) -> Self {
        LocalDatoms {
            datoms: RefCell::new(datoms),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.datoms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Datom> {
        self.datoms.borrow().clone()
    }

    pub fn by_attribute(&self, attribute: &str) -> Vec<Datom> {
        self.ensure_attribute_index();
        self.by_attribute
            .borrow()
            .as_ref()
            .unwrap()
            .get(attribute)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_attribute_index(&self) {
        if self.by_attribute.borrow().is_some() {
            return;
        }
        let mut index: HashMap<String, Vec<Datom>> = HashMap::new();
        for datom in self.datoms.borrow().iter() {
            index.entry(datom.a.clone()).or_default().push(datom.clone());
        }
        *self.by_attribute.borrow_mut() = Some(index);
    }

    pub fn by_attribute_value(&self, attribute: &str, value: &Value) -> Vec<Datom> {
        self.ensure_attribute_value_index();
        self.by_attribute_value
            .borrow()
            .as_ref()
            .unwrap()
            .get(&(attribute.to_string(), value.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_attribute_value_index(&self) {
        if self.by_attribute_value.borrow().is_some() {
            return;
        }
        let mut index: HashMap<(String, Value), Vec<Datom>> = HashMap::new();
        for datom in self.datoms.borrow().iter() {
            index
                .entry((datom.a.clone(), datom.v.clone()))
                .or_default()
                .push(datom.clone());
        }
        *self.by_attribute_value.borrow_mut() = Some(index);
    }

    pub fn by_entity(&self, entity: i64) -> Vec<Datom> {
        self.ensure_entity_index();
        self.by_entity
            .borrow()
            .as_ref()
            .unwrap()
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_entity_index(&self) {
        if self.by_entity.borrow().is_some() {
            return;
        }
        let mut index: HashMap<i64, Vec<Datom>> = HashMap::new();
        for datom in self.datoms.borrow().iter() {
            index.entry(datom.e).or_default().push(datom.clone());
        }
        *self.by_entity.borrow_mut() = Some(index);
    }

    pub fn max_entity(&self) -> i64 {
        if let Some(v) = self.max_entity.get() {
            return v;
        }
        let v = self.datoms.borrow().iter().map(|d| d.e).max().unwrap_or(-1);
        self.max_entity.set(Some(v));
        v
    }

    pub fn max_id(&self) -> i64 {
        if let Some(v) = self.max_id.get() {
            return v;
        }
        let v = self.datoms.borrow().iter().map(|d| d.id).max().unwrap_or(-1);
        self.max_id.set(Some(v));
        v
    }

    pub fn max_tx(&self) -> i64 {
        if let Some(v) = self.max_tx.get() {
            return v;
        }
        let v = self.datoms.borrow().iter().map(|d| d.tx).max().unwrap_or(-1);
        self.max_tx.set(Some(v));
        v
    }

    /// Immutable append: returns a new overlay with fresh caches, leaving
    /// `self` untouched. Used by `as_if` to branch without mutating the
    /// database value it was called on.
    pub fn append(&self, datoms: Vec<Datom>) -> LocalDatoms {
        let mut all = self.datoms.borrow().clone();
        all.extend(datoms);
        LocalDatoms::new(all)
    }

    /// In-place append: mutates the buffer and incrementally patches
    /// already-built caches, instead of invalidating them. Used exclusively
    /// by the validator's applicative copy, which needs O(1) state
    /// advancement per datom rather than an O(n) rebuild (§4.D, §9).
    pub fn append_fact(&self, datom: Datom) {
        if let Some(max) = self.max_tx.get() {
            if datom.tx > max {
                self.max_tx.set(Some(datom.tx));
            }
        }
        if let Some(max) = self.max_entity.get() {
            if datom.e > max {
                self.max_entity.set(Some(datom.e));
            }
        }
        if let Some(max) = self.max_id.get() {
            if datom.id > max {
                self.max_id.set(Some(datom.id));
            }
        }
        if let Some(index) = self.by_attribute.borrow_mut().as_mut() {
            index.entry(datom.a.clone()).or_default().push(datom.clone());
        }
        if let Some(index) = self.by_attribute_value.borrow_mut().as_mut() {
            index
                .entry((datom.a.clone(), datom.v.clone()))
                .or_default()
                .push(datom.clone());
        }
        if let Some(index) = self.by_entity.borrow_mut().as_mut() {
            index.entry(datom.e).or_default().push(datom.clone());
        }
        self.datoms.borrow_mut().push(datom);
    }

    pub fn as_of(&self, tx_id: i64) -> LocalDatoms {
        LocalDatoms::new(self.datoms.borrow().iter().filter(|d| d.tx <= tx_id).cloned().collect())
    }
}
