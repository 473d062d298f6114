pub mod clock;
pub mod connection;
pub mod datom;
pub mod db;
pub mod error;
pub mod facts;
pub mod local_datoms;
pub mod schema;
pub mod storage;
pub mod tx;
pub mod value;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::clock::FixedClock;
    use crate::connection::{Client, ClientConfig};
    use crate::datom::Op;
    use crate::db::EntityValue;
    use crate::error::Error;
    use crate::facts::{EntityRef, Facts};
    use crate::schema::{Cardinality, Unique, DB_CARDINALITY, DB_IDENT, DB_UNIQUE, DB_VALUE_TYPE};
    use crate::storage::memory::InMemoryStorage;
    use crate::value::{Value, ValueType};

    fn connect() -> crate::connection::Connection<InMemoryStorage> {
        let client = Client::new(ClientConfig::new(InMemoryStorage::new()));
        client.create_database("test").unwrap();
        client.connect("test").unwrap()
    }

    fn define_attribute(
        facts: &mut Facts,
        ident: &'static str,
        value_type: ValueType,
        cardinality: Cardinality,
        unique: Option<Unique>,
    ) {
        let mut pairs = vec![
            (DB_IDENT, Value::keyword(ident)),
            (DB_VALUE_TYPE, Value::keyword(value_type.ident())),
            (DB_CARDINALITY, Value::keyword(cardinality.ident())),
        ];
        if let Some(u) = unique {
            pairs.push((DB_UNIQUE, Value::keyword(u.ident())));
        }
        facts.add_set(EntityRef::New, pairs);
    }

    #[test]
    fn s1_schema_insert_and_lookup() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "provider/id", ValueType::Str, Cardinality::One, Some(Unique::Value));
        define_attribute(&mut schema, "provider/name", ValueType::Str, Cardinality::One, None);
        let (_, _, tx1, _) = conn.transact(&clock, &schema).unwrap();
        assert!(tx1.iter().any(|d| d.a == DB_IDENT && d.v == Value::keyword("provider/id")));

        let mut insert = Facts::new();
        insert.add_set(
            "apple",
            [
                ("provider/id", Value::str("AAPL")),
                ("provider/name", Value::str("Apple")),
            ],
        );
        let (_, db_after, _, temp_ids) = conn.transact(&clock, &insert).unwrap();
        let apple = *temp_ids.get("apple").unwrap();

        let lookup_entity = db_after.lookup("provider/id", &Value::str("AAPL")).unwrap();
        assert_eq!(lookup_entity, apple);

        let map = db_after.get(apple).unwrap();
        assert_eq!(map.get("provider/id"), Some(&EntityValue::One(Value::str("AAPL"))));
        assert_eq!(map.get("provider/name"), Some(&EntityValue::One(Value::str("Apple"))));
    }

    #[test]
    fn s2_replace_emits_retract_then_assert_in_order() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "provider/id", ValueType::Str, Cardinality::One, Some(Unique::Value));
        define_attribute(&mut schema, "provider/name", ValueType::Str, Cardinality::One, None);
        conn.transact(&clock, &schema).unwrap();

        let mut insert = Facts::new();
        insert.add_set(
            "apple",
            [
                ("provider/id", Value::str("AAPL")),
                ("provider/name", Value::str("Apple")),
            ],
        );
        conn.transact(&clock, &insert).unwrap();

        let mut replace = Facts::new();
        replace.replace(
            EntityRef::lookup("provider/id", Value::str("AAPL")),
            "provider/name",
            Value::str("Apple"),
            Value::str("Apple Inc."),
        );
        let (_, db_after, _, _) = conn.transact(&clock, &replace).unwrap();

        let apple = db_after.lookup("provider/id", &Value::str("AAPL")).unwrap();
        let map = db_after.get(apple).unwrap();
        assert_eq!(map.get("provider/name"), Some(&EntityValue::One(Value::str("Apple Inc."))));

        let facts: Vec<_> = db_after
            .facts(apple)
            .unwrap()
            .into_iter()
            .filter(|d| d.a == "provider/name")
            .collect();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].op, Op::Assert);
        assert_eq!(facts[1].op, Op::Retract);
        assert_eq!(facts[2].op, Op::Assert);
    }

    #[test]
    fn s3_uniqueness_violation_writes_nothing() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "provider/id", ValueType::Str, Cardinality::One, Some(Unique::Value));
        conn.transact(&clock, &schema).unwrap();

        let mut first = Facts::new();
        first.add(EntityRef::New, "provider/id", Value::str("AAPL"));
        conn.transact(&clock, &first).unwrap();

        let before = conn.db().unwrap().all_facts().unwrap();

        let mut second = Facts::new();
        second.add(EntityRef::New, "provider/id", Value::str("AAPL"));
        let err = conn.transact(&clock, &second).unwrap_err();
        assert!(matches!(err, Error::UniquenessViolation { .. }));

        let after = conn.db().unwrap().all_facts().unwrap();
        assert_eq!(before.len(), after.len());
    }

    #[test]
    fn s4_cardinality_many_retract_and_reject_duplicate() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "test/number", ValueType::Double, Cardinality::Many, None);
        conn.transact(&clock, &schema).unwrap();

        let mut insert = Facts::new();
        insert
            .add("e", "test/number", 3.14)
            .add("e", "test/number", 3.2)
            .add("e", "test/number", 3.3);
        let (_, _, _, temp_ids) = conn.transact(&clock, &insert).unwrap();
        let e = *temp_ids.get("e").unwrap();

        let mut retract = Facts::new();
        retract.remove(e, "test/number", 3.2);
        let (_, db_after, _, _) = conn.transact(&clock, &retract).unwrap();

        let map = db_after.get(e).unwrap();
        let EntityValue::Many(values) = map.get("test/number").unwrap() else {
            panic!("expected a cardinality-many value");
        };
        let mut found: Vec<f64> = values
            .iter()
            .map(|v| match v {
                Value::Double(d) => *d,
                other => panic!("expected a double, got {other:?}"),
            })
            .collect();
        found.sort_by(f64::total_cmp);
        assert_eq!(found, vec![3.14, 3.3]);

        let mut duplicate = Facts::new();
        duplicate.add(e, "test/number", 3.3);
        let err = conn.transact(&clock, &duplicate).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn s5_as_if_branches_are_isolated() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "tag/name", ValueType::Str, Cardinality::Many, None);
        conn.transact(&clock, &schema).unwrap();

        let mut insert = Facts::new();
        insert.add("e", "tag/name", Value::str("seed"));
        let (_, _, _, temp_ids) = conn.transact(&clock, &insert).unwrap();
        let e = *temp_ids.get("e").unwrap();

        let db = conn.db().unwrap();

        let mut facts_a = Facts::new();
        facts_a.add(e, "tag/name", Value::str("a"));
        let (_, db1, _, _) = db.as_if(&clock, &facts_a).unwrap();

        let mut facts_b = Facts::new();
        facts_b.add(e, "tag/name", Value::str("b"));
        let (_, db2, _, _) = db.as_if(&clock, &facts_b).unwrap();

        let names = |map: &HashMap<String, EntityValue>| -> Vec<Value> {
            match map.get("tag/name").unwrap() {
                EntityValue::Many(values) => values.clone(),
                EntityValue::One(v) => vec![v.clone()],
            }
        };

        assert!(names(&db1.get(e).unwrap()).contains(&Value::str("a")));
        assert!(!names(&db1.get(e).unwrap()).contains(&Value::str("b")));
        assert!(names(&db2.get(e).unwrap()).contains(&Value::str("b")));
        assert!(!names(&db2.get(e).unwrap()).contains(&Value::str("a")));

        let fresh = conn.db().unwrap();
        let fresh_names = names(&fresh.get(e).unwrap());
        assert!(!fresh_names.contains(&Value::str("a")));
        assert!(!fresh_names.contains(&Value::str("b")));
    }

    #[test]
    fn s6_as_of_boundary() {
        let conn = connect();
        let clock = FixedClock::new(0);

        let mut schema = Facts::new();
        define_attribute(&mut schema, "counter/value", ValueType::Long, Cardinality::One, None);
        let (_, _, tx1, _) = conn.transact(&clock, &schema).unwrap();
        let tx1_id = tx1[0].tx;

        let mut insert = Facts::new();
        insert.add(EntityRef::New, "counter/value", 1i64);
        let (_, _, tx2, _) = conn.transact(&clock, &insert).unwrap();
        let tx2_id = tx2[0].tx;

        let db = conn.db().unwrap();
        let as_of_last = db.as_of(tx2_id).unwrap();
        assert_eq!(as_of_last.all_facts().unwrap().len(), db.all_facts().unwrap().len());

        let as_of_first = db.as_of(tx1_id).unwrap();
        assert!(as_of_first.all_facts().unwrap().len() < db.all_facts().unwrap().len());

        let err = db.as_of(tx2_id + 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
