use crate::datom::Datom;
use crate::db::Database;
use crate::error::Error;
use crate::storage::Backend;

/// Walks a transaction's tx-data in order against a private applicative
/// copy of the database, validating each datom against the state produced
/// by every datom before it in the same batch, then applying it before
/// moving on (§4.F.2). This is what makes e.g. asserting and then
/// retracting the same attribute in one transaction legal, and asserting
/// the same cardinality-one attribute twice illegal.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Validator
    }

    pub fn validate_transaction<B: Backend>(&self, db: &Database<B>, tx_data: &[Datom]) -> Result<(), Error> {
        let applicative = db.applicative_copy();
        for datom in tx_data {
            self.validate_datom(&applicative, datom)?;
            applicative.apply_datom(datom.clone());
        }
        Ok(())
    }

    fn validate_datom<B: Backend>(&self, db: &Database<B>, datom: &Datom) -> Result<(), Error> {
        let attr = db.get_attr_def(&datom.a)?;
        attr.validate_value(&datom.v)?;
        attr.validate_ref(&datom.v, db)?;
        let existing = db.get(datom.e)?;
        attr.validate_cardinality(datom.e, &datom.v, datom.op, existing.get(&datom.a))?;
        attr.validate_uniqueness(&datom.v, datom.op, db)?;
        Ok(())
    }
}
