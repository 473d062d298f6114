use std::collections::HashMap;
use std::rc::Rc;

use crate::clock::Clock;
use crate::datom::Datom;
use crate::db::{Database, RemoteDatabase};
use crate::error::Error;
use crate::facts::Facts;
use crate::local_datoms::LocalDatoms;
use crate::storage::{Backend, ReadStorage, Restricts, SortKey, WriteStorage};
use crate::tx::transactor::Transactor;
use crate::tx::validator::Validator;

/// Names the backend handle a `Client` talks to (§4.G). The wire protocol
/// and connection pooling of a real document-store driver are out of
/// scope (§1) — this just carries whatever `Backend` implementation the
/// caller constructed.
pub struct ClientConfig<B: Backend> {
    pub backend: B,
}

impl<B: Backend> ClientConfig<B> {
    pub fn new(backend: B) -> Self {
        ClientConfig { backend }
    }
}

/// Manages database lifecycle on the backend (§4.G): creation, deletion,
/// listing, and handing out `Connection`s.
pub struct Client<B: Backend> {
    backend: Rc<B>,
}

impl<B: Backend> Client<B> {
    pub fn new(config: ClientConfig<B>) -> Self {
        Client {
            backend: Rc::new(config.backend),
        }
    }

    pub fn create_database(&self, name: &str) -> Result<(), Error> {
        tracing::debug!(database = name, "creating database");
        Ok(self.backend.create_database(name)?)
    }

    pub fn delete_database(&self, name: &str) -> Result<(), Error> {
        tracing::debug!(database = name, "deleting database");
        Ok(self.backend.delete_database(name)?)
    }

    pub fn list_databases(&self) -> Result<Vec<String>, Error> {
        Ok(self.backend.list_databases()?)
    }

    pub fn connect(&self, name: &str) -> Result<Connection<B>, Error> {
        let store = self.backend.open(name)?;
        Ok(Connection {
            store,
            name: name.to_string(),
        })
    }

    /// No backend resources to release beyond dropping the handle; kept as
    /// an explicit lifecycle step mirroring `create_database`/`connect`.
    pub fn close(self) {}
}

/// One open database handle (§4.G). `db()` builds a fresh, immutable
/// `Database` value bounded by the backend's current `tx_max`; `transact`
/// is the only write path.
pub struct Connection<B: Backend> {
    store: Rc<B::Db>,
    name: String,
}

impl<B: Backend> Connection<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current database value: a backend snapshot bounded by the
    /// highest transaction seen so far, with an empty overlay.
    pub fn db(&self) -> Result<Database<B>, Error> {
        let tx_max = self
            .store
            .find_one_sorted(&Restricts::new(), SortKey::Tx, true)?
            .map(|d| d.tx)
            .unwrap_or(-1);
        let remote = RemoteDatabase::new(Rc::clone(&self.store), tx_max)?;
        Ok(Database::new(Some(remote), -1, LocalDatoms::empty(), false))
    }

    /// Stages, validates and commits `facts` as one transaction (§4.F):
    /// assigns ids and resolves temp-ids (`Transactor`), validates the
    /// resulting datoms against a private applicative copy of the current
    /// database (`Validator`), then bulk-inserts them. Nothing is written
    /// if validation fails.
    pub fn transact(
        &self,
        clock: &dyn Clock,
        facts: &Facts,
    ) -> Result<(Database<B>, Database<B>, Vec<Datom>, HashMap<String, i64>), Error> {
        let span = tracing::info_span!("transact", database = %self.name, operations = facts.len());
        let _guard = span.enter();

        let db_before = self.db()?;
        let (tx_data, temp_ids) = Transactor::new().transaction_data(&db_before, clock, facts)?;

        if let Err(err) = Validator::new().validate_transaction(&db_before, &tx_data) {
            tracing::warn!(error = %err, "transaction failed validation");
            return Err(err);
        }

        self.store.save(&tx_data)?;
        let db_after = self.db()?;
        Ok((db_before, db_after, tx_data, temp_ids))
    }
}
