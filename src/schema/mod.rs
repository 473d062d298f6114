pub mod attribute;
pub mod default;

pub const DB_IDENT: &str = "db/ident";
pub const DB_VALUE_TYPE: &str = "db/valueType";
pub const DB_CARDINALITY: &str = "db/cardinality";
pub const DB_UNIQUE: &str = "db/unique";
pub const DB_DOC: &str = "db/doc";
pub const DB_TX_INSTANT: &str = "db/txInstant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn ident(self) -> &'static str {
        match self {
            Cardinality::One => "db.cardinality/one",
            Cardinality::Many => "db.cardinality/many",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "db.cardinality/one" => Some(Cardinality::One),
            "db.cardinality/many" => Some(Cardinality::Many),
            _ => None,
        }
    }

    pub fn values() -> [&'static str; 2] {
        ["db.cardinality/one", "db.cardinality/many"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unique {
    Identity,
    Value,
}

impl Unique {
    pub fn ident(self) -> &'static str {
        match self {
            Unique::Identity => "db.unique/identity",
            Unique::Value => "db.unique/value",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "db.unique/identity" => Some(Unique::Identity),
            "db.unique/value" => Some(Unique::Value),
            _ => None,
        }
    }

    pub fn values() -> [&'static str; 2] {
        ["db.unique/identity", "db.unique/value"]
    }
}
