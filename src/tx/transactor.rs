use std::collections::HashMap;

use crate::clock::Clock;
use crate::datom::{Datom, Op};
use crate::db::Database;
use crate::error::Error;
use crate::facts::{EntityRef, Facts};
use crate::schema::DB_TX_INSTANT;
use crate::storage::Backend;
use crate::value::Value;

/// Turns a `Facts` buffer into the batch of datoms one transaction commits
/// (§4.F.1): assigns the synthetic tx entity, stamps `db/txInstant`, mints
/// ids for every new entity and temp-id, and resolves lookup refs against
/// the database as it stood before this transaction.
#[derive(Debug, Default)]
pub struct Transactor;

impl Transactor {
    pub fn new() -> Self {
        Transactor
    }

    /// Returns the ordered tx-data (`db/txInstant` first) and the concrete
    /// entity every temp-id in `facts` resolved to.
    pub fn transaction_data<B: Backend>(
        &self,
        db: &Database<B>,
        clock: &dyn Clock,
        facts: &Facts,
    ) -> Result<(Vec<Datom>, HashMap<String, i64>), Error> {
        let mut next_entity = db.max_entity_id()? + 1;
        let mut next_id = db.max_id()? + 1;
        let tx = next_entity;
        next_entity += 1;

        let mut temp_ids: HashMap<String, i64> = HashMap::from([("datomic.tx".to_string(), tx)]);
        let mut datoms = Vec::with_capacity(facts.len() + 1);

        datoms.push(Datom::assert(
            next_id,
            tx,
            DB_TX_INSTANT,
            Value::Instant(clock.now().0),
            tx,
        ));
        next_id += 1;

        for (entity_ref, attribute, value, op) in facts.iter() {
            let entity = self.resolve_entity(db, entity_ref, &mut temp_ids, &mut next_entity)?;
            let datom = match op {
                Op::Assert => Datom::assert(next_id, entity, attribute.clone(), value.clone(), tx),
                Op::Retract => Datom::retract(next_id, entity, attribute.clone(), value.clone(), tx),
            };
            next_id += 1;
            datoms.push(datom);
        }

        Ok((datoms, temp_ids))
    }

    fn resolve_entity<B: Backend>(
        &self,
        db: &Database<B>,
        entity_ref: &EntityRef,
        temp_ids: &mut HashMap<String, i64>,
        next_entity: &mut i64,
    ) -> Result<i64, Error> {
        match entity_ref {
            EntityRef::New => {
                let id = *next_entity;
                *next_entity += 1;
                Ok(id)
            }
            EntityRef::Id(id) => Ok(*id),
            EntityRef::TempId(name) => {
                if let Some(id) = temp_ids.get(name) {
                    Ok(*id)
                } else {
                    let id = *next_entity;
                    *next_entity += 1;
                    temp_ids.insert(name.clone(), id);
                    Ok(id)
                }
            }
            EntityRef::LookupRef(attribute, value) => db.lookup(attribute, value),
        }
    }
}
