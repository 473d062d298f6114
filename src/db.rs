use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::clock::Clock;
use crate::datom::{Datom, Op};
use crate::error::Error;
use crate::facts::Facts;
use crate::local_datoms::LocalDatoms;
use crate::schema::attribute::Attribute;
use crate::schema::{default, Cardinality, DB_IDENT, DB_TX_INSTANT};
use crate::storage::{Backend, ReadStorage, Restricts, SortKey};
use crate::tx::transactor::Transactor;
use crate::tx::validator::Validator;
use crate::value::Value;

/// An entity's folded value for one attribute (§4.E `get`): a scalar for
/// cardinality-one attributes, a set of values for cardinality-many ones.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    One(Value),
    Many(Vec<Value>),
}

fn entity_value_equals(existing: &EntityValue, value: &Value) -> bool {
    match existing {
        EntityValue::One(v) => v == value,
        EntityValue::Many(_) => false,
    }
}

#[derive(Debug, Clone, Copy)]
enum MaxKey {
    Entity,
    Id,
}

/// A snapshot of the backend, bounded by the highest transaction this
/// `Database` value has seen (§4.E).
pub struct RemoteDatabase<B: Backend> {
    store: Rc<B::Db>,
    tx_max: i64,
    e_max: i64,
}

impl<B: Backend> RemoteDatabase<B> {
    pub(crate) fn new(store: Rc<B::Db>, tx_max: i64) -> Result<Self, Error> {
        let restricts = Restricts::new().with_tx_at_most(tx_max);
        let e_max = store
            .find_one_sorted(&restricts, SortKey::Entity, true)?
            .map(|d| d.e)
            .unwrap_or(-1);
        Ok(RemoteDatabase { store, tx_max, e_max })
    }
}

impl<B: Backend> Clone for RemoteDatabase<B> {
    fn clone(&self) -> Self {
        RemoteDatabase {
            store: Rc::clone(&self.store),
            tx_max: self.tx_max,
            e_max: self.e_max,
        }
    }
}

impl<B: Backend> std::fmt::Debug for RemoteDatabase<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDatabase")
            .field("tx_max", &self.tx_max)
            .field("e_max", &self.e_max)
            .finish()
    }
}

/// Either a committed entity id, or a lookup ref resolved lazily against
/// a unique attribute's current value (§4.E).
pub enum EntityArg<'a> {
    Id(i64),
    Lookup(&'a str, &'a Value),
}

impl<'a> From<i64> for EntityArg<'a> {
    fn from(id: i64) -> Self {
        EntityArg::Id(id)
    }
}

impl<'a> From<(&'a str, &'a Value)> for EntityArg<'a> {
    fn from((attribute, value): (&'a str, &'a Value)) -> Self {
        EntityArg::Lookup(attribute, value)
    }
}

/// An immutable handle on database state at some point in time (§4.E):
/// `remote` (a backend snapshot bounded by `tx_max`), `tx_min` (an
/// exclusive lower bound used by `since`), an overlay of not-yet-remote
/// datoms, and a `full_history` flag. Every read method takes `&self` —
/// the per-instance caches are interior-mutable, so callers never see
/// `Database` as anything but a plain immutable value.
pub struct Database<B: Backend> {
    remote: Option<RemoteDatabase<B>>,
    #[allow(dead_code)]
    tx_min: i64,
    with_datoms: LocalDatoms,
    #[allow(dead_code)]
    full_history: bool,
    attr_def_cache: RefCell<HashMap<String, (i64, Attribute)>>,
    attr_index: RefCell<HashMap<String, Vec<Datom>>>,
    attr_val_index: RefCell<HashMap<(String, Value), Vec<Datom>>>,
    attr_val_index_complete: RefCell<HashSet<String>>,
    entity_index: RefCell<HashMap<i64, Vec<Datom>>>,
}

impl<B: Backend> std::fmt::Debug for Database<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("remote", &self.remote)
            .field("tx_min", &self.tx_min)
            .field("full_history", &self.full_history)
            .finish()
    }
}

impl<B: Backend> Database<B> {
    pub(crate) fn new(
        remote: Option<RemoteDatabase<B>>,
        tx_min: i64,
        with_datoms: LocalDatoms,
        full_history: bool,
    ) -> Self {
        Database {
            remote,
            tx_min,
            with_datoms,
            full_history,
            attr_def_cache: RefCell::new(HashMap::new()),
            attr_index: RefCell::new(HashMap::new()),
            attr_val_index: RefCell::new(HashMap::new()),
            attr_val_index_complete: RefCell::new(HashSet::new()),
            entity_index: RefCell::new(HashMap::new()),
        }
    }

    pub fn empty() -> Self {
        Database::new(None, -1, LocalDatoms::empty(), false)
    }

    fn with_datoms_copy(&self) -> LocalDatoms {
        self.with_datoms.append(Vec::new())
    }

    fn remote_tx_max(&self) -> i64 {
        self.remote.as_ref().map(|r| r.tx_max).unwrap_or(-1)
    }

    fn tx_max(&self) -> i64 {
        if !self.with_datoms.is_empty() {
            self.with_datoms.max_tx()
        } else {
            self.remote_tx_max()
        }
    }

    pub(crate) fn max_entity_id(&self) -> Result<i64, Error> {
        self.max_key(MaxKey::Entity)
    }

    pub(crate) fn max_id(&self) -> Result<i64, Error> {
        self.max_key(MaxKey::Id)
    }

    fn max_key(&self, key: MaxKey) -> Result<i64, Error> {
        let remote_value = match &self.remote {
            None => -1,
            Some(remote) => {
                let restricts = Restricts::new().with_tx_at_most(remote.tx_max);
                let sort = match key {
                    MaxKey::Entity => SortKey::Entity,
                    MaxKey::Id => SortKey::Id,
                };
                remote
                    .store
                    .find_one_sorted(&restricts, sort, true)?
                    .map(|d| match key {
                        MaxKey::Entity => d.e,
                        MaxKey::Id => d.id,
                    })
                    .unwrap_or(-1)
            }
        };
        let local_value = match key {
            MaxKey::Entity => self.with_datoms.max_entity(),
            MaxKey::Id => self.with_datoms.max_id(),
        };
        Ok(remote_value.max(local_value))
    }

    /// The half-open range of entity ids this database has ever assigned
    /// (§4.E). Entities are virtual — most of this range has no facts.
    pub fn entities(&self) -> Result<RangeInclusive<i64>, Error> {
        Ok(0..=self.max_entity_id()?)
    }

    fn resolve_entity_arg(&self, entity: EntityArg<'_>) -> Result<i64, Error> {
        match entity {
            EntityArg::Id(id) => Ok(id),
            EntityArg::Lookup(attribute, value) => self.lookup(attribute, value),
        }
    }

    /// All datoms ever recorded against `entity`, across remote + overlay,
    /// id-ordered, regardless of op (§4.E `facts`).
    pub fn facts<'a>(&self, entity: impl Into<EntityArg<'a>>) -> Result<Vec<Datom>, Error> {
        let entity = self.resolve_entity_arg(entity.into())?;
        if entity < 0 {
            return Ok(Vec::new());
        }
        let mut facts = self.facts_by_entity(entity)?;
        facts.sort_by_key(|d| d.id);
        Ok(facts)
    }

    fn facts_by_entity(&self, entity: i64) -> Result<Vec<Datom>, Error> {
        if let Some(cached) = self.entity_index.borrow().get(&entity) {
            return Ok(cached.clone());
        }
        let mut datoms = Vec::new();
        if let Some(remote) = &self.remote {
            if entity <= remote.e_max {
                let restricts = Restricts::new().with_entity(entity).with_tx_at_most(remote.tx_max);
                datoms.extend(remote.store.find(&restricts)?);
            }
        }
        datoms.extend(self.with_datoms.by_entity(entity));
        self.entity_index.borrow_mut().insert(entity, datoms.clone());
        Ok(datoms)
    }

    fn active_facts(facts: &[Datom]) -> Vec<(String, Value)> {
        let mut active: Vec<(String, Value)> = Vec::new();
        for fact in facts {
            match fact.op {
                Op::Assert => active.push((fact.a.clone(), fact.v.clone())),
                Op::Retract => {
                    if let Some(pos) = active.iter().position(|(a, v)| a == &fact.a && v == &fact.v) {
                        active.remove(pos);
                    }
                }
            }
        }
        active
    }

    fn active_facts_to_map(&self, active: &[(String, Value)]) -> Result<HashMap<String, EntityValue>, Error> {
        let mut result: HashMap<String, EntityValue> = HashMap::new();
        for (a, v) in active {
            let attr = self.get_attr_def(a)?;
            match attr.cardinality {
                Cardinality::One => {
                    result.insert(a.clone(), EntityValue::One(v.clone()));
                }
                Cardinality::Many => match result.entry(a.clone()) {
                    Entry::Occupied(mut e) => {
                        if let EntityValue::Many(values) = e.get_mut() {
                            values.push(v.clone());
                        }
                    }
                    Entry::Vacant(e) => {
                        e.insert(EntityValue::Many(vec![v.clone()]));
                    }
                },
            }
        }
        Ok(result)
    }

    /// Folds an entity's facts (replaying assert/retract in id order) into
    /// its current active state (§4.E `get`).
    pub fn get<'a>(&self, entity: impl Into<EntityArg<'a>>) -> Result<HashMap<String, EntityValue>, Error> {
        let facts = self.facts(entity)?;
        let active = Self::active_facts(&facts);
        self.active_facts_to_map(&active)
    }

    /// Every state an entity has ever had, keyed by the transaction that
    /// produced it (§4.E `states`). Never emits an entry for a synthetic
    /// "before the first transaction" bucket (§9).
    pub fn states<'a>(
        &self,
        entity: impl Into<EntityArg<'a>>,
    ) -> Result<HashMap<i64, HashMap<String, EntityValue>>, Error> {
        let facts = self.facts(entity)?;
        let mut states = HashMap::new();
        let mut active: Vec<(String, Value)> = Vec::new();
        let mut tx_current: i64 = -1;
        for fact in &facts {
            if fact.tx != tx_current {
                if tx_current != -1 {
                    states.insert(tx_current, self.active_facts_to_map(&active)?);
                }
                tx_current = fact.tx;
            }
            match fact.op {
                Op::Assert => active.push((fact.a.clone(), fact.v.clone())),
                Op::Retract => {
                    if let Some(pos) = active.iter().position(|(a, v)| a == &fact.a && v == &fact.v) {
                        active.remove(pos);
                    }
                }
            }
        }
        if tx_current != -1 {
            states.insert(tx_current, self.active_facts_to_map(&active)?);
        }
        Ok(states)
    }

    /// Every currently-active fact in the database (§4.E `all_facts`).
    pub fn all_facts(&self) -> Result<Vec<Datom>, Error> {
        let mut all = Vec::new();
        for e in self.entities()? {
            all.extend(self.facts_by_entity(e)?);
        }
        all.sort_by_key(|d| d.id);
        Ok(all)
    }

    fn find_attribute_value(&self, attribute: &str, value: Option<&Value>) -> Result<Vec<Datom>, Error> {
        match value {
            None => {
                if !self.attr_index.borrow().contains_key(attribute) {
                    let datoms = self.get_attr_index(attribute, None)?;
                    let mut by_value: HashMap<Value, Vec<Datom>> = HashMap::new();
                    for d in &datoms {
                        by_value.entry(d.v.clone()).or_default().push(d.clone());
                    }
                    for (v, ds) in by_value {
                        self.attr_val_index.borrow_mut().insert((attribute.to_string(), v), ds);
                    }
                    self.attr_val_index_complete.borrow_mut().insert(attribute.to_string());
                    self.attr_index.borrow_mut().insert(attribute.to_string(), datoms);
                }
                Ok(self.attr_index.borrow().get(attribute).cloned().unwrap_or_default())
            }
            Some(value) => {
                let key = (attribute.to_string(), value.clone());
                let complete = self.attr_val_index_complete.borrow().contains(attribute);
                if !self.attr_val_index.borrow().contains_key(&key) && !complete {
                    let datoms = self.get_attr_index(attribute, Some(value))?;
                    self.attr_val_index.borrow_mut().insert(key.clone(), datoms);
                }
                Ok(self.attr_val_index.borrow().get(&key).cloned().unwrap_or_default())
            }
        }
    }

    fn get_attr_index(&self, attribute: &str, value: Option<&Value>) -> Result<Vec<Datom>, Error> {
        let mut datoms = Vec::new();
        if let Some(remote) = &self.remote {
            let mut restricts = Restricts::new().with_attribute(attribute).with_tx_at_most(remote.tx_max);
            if let Some(v) = value {
                restricts = restricts.with_value(v.clone());
            }
            datoms.extend(remote.store.find(&restricts)?);
        }
        match value {
            None => datoms.extend(self.with_datoms.by_attribute(attribute)),
            Some(v) => datoms.extend(self.with_datoms.by_attribute_value(attribute, v)),
        }
        Ok(datoms)
    }

    /// Resolves a unique attribute's value to the one entity holding it
    /// (§4.E `lookup`).
    pub fn lookup(&self, attribute: &str, value: &Value) -> Result<i64, Error> {
        let attr_def = self.get_attr_def(attribute)?;
        if !attr_def.is_unique() {
            return Err(Error::validation(format!(
                "lookup failed: attribute {attribute:?} is not unique"
            )));
        }
        let candidates = self.find_attribute_value(attribute, Some(value))?;
        for datom in candidates {
            let map = self.get(datom.e)?;
            if let Some(existing) = map.get(attribute) {
                if entity_value_equals(existing, value) {
                    return Ok(datom.e);
                }
            }
        }
        Err(Error::entity_not_found(format!(
            "no entity found with {attribute:?} = {value}"
        )))
    }

    /// Entities matching every (attribute, value-or-wildcard) criterion
    /// (§4.E `find`). An empty criteria map scans every entity.
    pub fn find(
        &self,
        criteria: &HashMap<String, Option<Value>>,
    ) -> Result<HashMap<i64, HashMap<String, EntityValue>>, Error> {
        if criteria.is_empty() {
            let mut results = HashMap::new();
            for e in self.entities()? {
                let map = self.get(e)?;
                if !map.is_empty() {
                    results.insert(e, map);
                }
            }
            return Ok(results);
        }
        let mut iter = criteria.iter();
        let (attribute, value) = iter.next().expect("checked non-empty above");
        let mut results = self.find_candidates(attribute, value.as_ref())?;
        for (attribute, value) in iter {
            results.retain(|_, map| match map.get(attribute) {
                Some(existing) => value.as_ref().map_or(true, |v| entity_value_equals(existing, v)),
                None => false,
            });
        }
        Ok(results)
    }

    fn find_candidates(
        &self,
        attribute: &str,
        value: Option<&Value>,
    ) -> Result<HashMap<i64, HashMap<String, EntityValue>>, Error> {
        let candidate_datoms = self.find_attribute_value(attribute, value)?;
        let candidate_entities: HashSet<i64> = candidate_datoms.iter().map(|d| d.e).collect();
        let mut results = HashMap::new();
        for e in candidate_entities {
            let map = self.get(e)?;
            if !map.is_empty() {
                results.insert(e, map);
            }
        }
        Ok(results)
    }

    /// Reconstructs an attribute's schema definition, preferring the
    /// builtins, then a per-instance cache bulk-populated on first miss
    /// (§4.E `get_attr_def`). Invalidated selectively by `apply_datom` when
    /// a transaction redefines an attribute in flight (§9).
    pub fn get_attr_def(&self, ident: &str) -> Result<Attribute, Error> {
        if let Some(builtin) = default::builtin_attributes().get(ident) {
            return Ok(builtin.clone());
        }
        if self.attr_def_cache.borrow().is_empty() {
            let criteria = HashMap::from([(DB_IDENT.to_string(), None)]);
            let all = self.find(&criteria)?;
            for (entity, map) in all {
                if let Some(EntityValue::One(Value::Keyword(defined_ident))) = map.get(DB_IDENT) {
                    let attr = Attribute::from_entity_map(&map)?;
                    self.attr_def_cache
                        .borrow_mut()
                        .insert(defined_ident.clone(), (entity, attr));
                }
            }
        }
        if let Some((_, attr)) = self.attr_def_cache.borrow().get(ident) {
            return Ok(attr.clone());
        }
        let entity = self
            .lookup(DB_IDENT, &Value::Keyword(ident.to_string()))
            .map_err(|_| Error::schema(format!("attribute {ident:?} is not defined")))?;
        let map = self.get(entity)?;
        let attr = Attribute::from_entity_map(&map)?;
        self.attr_def_cache
            .borrow_mut()
            .insert(ident.to_string(), (entity, attr.clone()));
        Ok(attr)
    }

    /// The latest transaction whose `db/txInstant` is at or before `time`
    /// (§4.E `transaction_at`); `-1` if none.
    pub fn transaction_at(&self, time: i64) -> Result<i64, Error> {
        let facts = self.find_attribute_value(DB_TX_INSTANT, None)?;
        let mut tx_id = -1;
        for fact in facts {
            if let Value::Instant(t) = fact.v {
                if t <= time && fact.tx > tx_id {
                    tx_id = fact.tx;
                }
            }
        }
        Ok(tx_id)
    }

    /// A database value as of `tx_id`: everything transacted after it is
    /// hidden (§4.E `as_of`).
    pub fn as_of(&self, tx_id: i64) -> Result<Database<B>, Error> {
        let tx_max = self.tx_max();
        if tx_id > tx_max {
            return Err(Error::validation("cannot travel into the future"));
        }
        if tx_id > self.remote_tx_max() {
            Ok(Database::new(self.remote.clone(), -1, self.with_datoms.as_of(tx_id), false))
        } else {
            let remote = match &self.remote {
                Some(r) => Some(RemoteDatabase::new(Rc::clone(&r.store), tx_id)?),
                None => None,
            };
            Ok(Database::new(remote, -1, LocalDatoms::empty(), false))
        }
    }

    /// A database value that only shows datoms transacted after `tx_id`
    /// (§4.E `since`). Documented no-op in the current engine (§9): every
    /// read method still walks the full overlay, since none of them
    /// consult `tx_min`.
    pub fn since(&self, tx_id: i64) -> Database<B> {
        Database::new(self.remote.clone(), tx_id, self.with_datoms_copy(), false)
    }

    /// A database value that surfaces retracted facts alongside active
    /// ones (§4.E `history`). Documented no-op in the current engine (§9):
    /// `full_history` is recorded but unused — every read method already
    /// walks every datom and folds them to derive active state.
    pub fn history(&self) -> Database<B> {
        Database::new(self.remote.clone(), self.tx_min, self.with_datoms_copy(), true)
    }

    /// Speculatively transacts `facts` without persisting anything,
    /// returning (before, after, tx_data, temp_ids) just like a real
    /// transact (§4.E `as_if`).
    pub fn as_if(
        &self,
        clock: &dyn Clock,
        facts: &Facts,
    ) -> Result<(Database<B>, Database<B>, Vec<Datom>, HashMap<String, i64>), Error> {
        let db_before = Database::new(self.remote.clone(), -1, self.with_datoms_copy(), false);
        let (tx_data, temp_ids) = Transactor::new().transaction_data(&db_before, clock, facts)?;
        Validator::new().validate_transaction(&db_before, &tx_data)?;
        let with_datoms = self.with_datoms.append(tx_data.clone());
        let db_after = Database::new(self.remote.clone(), -1, with_datoms, false);
        Ok((db_before, db_after, tx_data, temp_ids))
    }

    pub(crate) fn applicative_copy(&self) -> Database<B> {
        Database::new(self.remote.clone(), -1, self.with_datoms_copy(), false)
    }

    /// Applies one validated datom to this (private, owned-by-the-validator)
    /// copy: appends it to the overlay, patches already-built caches
    /// incrementally, and evicts the attribute-definition cache entry for
    /// whichever attribute's defining entity this datom just touched, so a
    /// same-transaction schema redefinition is visible to later datoms in
    /// the same batch (§4.F.2, §9).
    pub(crate) fn apply_datom(&self, datom: Datom) {
        self.with_datoms.append_fact(datom.clone());

        let evict_ident = self
            .attr_def_cache
            .borrow()
            .iter()
            .find(|(_, (e, _))| *e == datom.e)
            .map(|(ident, _)| ident.clone());
        if let Some(ident) = evict_ident {
            self.attr_def_cache.borrow_mut().remove(&ident);
        }

        if let Some(index) = self.attr_index.borrow_mut().get_mut(&datom.a) {
            index.push(datom.clone());
        }
        let av_key = (datom.a.clone(), datom.v.clone());
        if self.attr_val_index.borrow().contains_key(&av_key) {
            self.attr_val_index.borrow_mut().get_mut(&av_key).unwrap().push(datom.clone());
        } else if self.attr_val_index_complete.borrow().contains(&datom.a) {
            self.attr_val_index.borrow_mut().insert(av_key, vec![datom.clone()]);
        }
        if let Some(index) = self.entity_index.borrow_mut().get_mut(&datom.e) {
            index.push(datom.clone());
        }
    }
}
