use factdb::clock::FixedClock;
use factdb::connection::{Client, ClientConfig};
use factdb::db::EntityValue;
use factdb::facts::{EntityRef, Facts};
use factdb::schema::{Cardinality, DB_CARDINALITY, DB_IDENT, DB_VALUE_TYPE};
use factdb::storage::memory::InMemoryStorage;
use factdb::value::{Value, ValueType};
use quickcheck_macros::quickcheck;

fn connect_with_schema() -> factdb::connection::Connection<InMemoryStorage> {
    let client = Client::new(ClientConfig::new(InMemoryStorage::new()));
    client.create_database("props").unwrap();
    let conn = client.connect("props").unwrap();

    let mut schema = Facts::new();
    schema.add_set(
        EntityRef::New,
        [
            (DB_IDENT, Value::keyword("item/tag")),
            (DB_VALUE_TYPE, Value::keyword(ValueType::Str.ident())),
            (DB_CARDINALITY, Value::keyword(Cardinality::Many.ident())),
        ],
    );
    conn.transact(&FixedClock::new(0), &schema).unwrap();
    conn
}

/// Invariant 3: a freshly minted entity is always greater than every
/// entity id assigned before it.
#[quickcheck]
fn entity_freshness(count: u8) -> bool {
    let conn = connect_with_schema();
    let clock = FixedClock::new(0);
    let mut max_seen = -1i64;

    for _ in 0..count.min(20) {
        let mut facts = Facts::new();
        facts.add(EntityRef::New, "item/tag", Value::str("x"));
        let (_, _, tx_data, _) = conn.transact(&clock, &facts).unwrap();
        let entity = tx_data
            .iter()
            .find(|d| d.a == "item/tag")
            .expect("exactly one item/tag datom")
            .e;
        if entity <= max_seen {
            return false;
        }
        max_seen = entity;
    }
    true
}

/// Invariant 4: the same named temp-id used multiple times within one
/// `Facts` buffer resolves to a single entity; distinct names resolve to
/// distinct entities.
#[quickcheck]
fn temp_id_stability(a: u8, b: u8) -> bool {
    let conn = connect_with_schema();
    let clock = FixedClock::new(0);

    let name_a = format!("t{a}");
    let name_b = format!("t{b}");

    let mut facts = Facts::new();
    facts
        .add(name_a.as_str(), "item/tag", Value::str("one"))
        .add(name_a.as_str(), "item/tag", Value::str("two"))
        .add(name_b.as_str(), "item/tag", Value::str("three"));
    let (_, _, _, temp_ids) = conn.transact(&clock, &facts).unwrap();

    let entity_a = *temp_ids.get(&name_a).unwrap();
    let entity_b = *temp_ids.get(&name_b).unwrap();

    if name_a == name_b {
        entity_a == entity_b
    } else {
        entity_a != entity_b
    }
}

/// Invariant 2: ids are contiguous within a transaction and strictly
/// increasing across transactions in commit order.
#[quickcheck]
fn id_monotonicity_and_contiguity(batch_sizes: Vec<u8>) -> bool {
    let conn = connect_with_schema();
    let clock = FixedClock::new(0);
    let mut last_max_id = -1i64;

    for size in batch_sizes.into_iter().take(10) {
        let mut facts = Facts::new();
        for _ in 0..size.min(5) {
            facts.add(EntityRef::New, "item/tag", Value::str("v"));
        }
        let (_, _, tx_data, _) = conn.transact(&clock, &facts).unwrap();

        let ids: Vec<i64> = tx_data.iter().map(|d| d.id).collect();
        for window in ids.windows(2) {
            if window[1] != window[0] + 1 {
                return false;
            }
        }
        if ids[0] <= last_max_id {
            return false;
        }
        last_max_id = *ids.last().unwrap();
    }
    true
}

/// Invariant 6: add-then-remove of the same value on a cardinality-many
/// attribute leaves `get(e)` exactly as it was before the add.
#[quickcheck]
fn retract_round_trip_on_cardinality_many(value: u16) -> bool {
    let conn = connect_with_schema();
    let clock = FixedClock::new(0);

    let mut seed = Facts::new();
    seed.add(EntityRef::New, "item/tag", Value::str("seed"));
    let (_, _, _, temp_ids) = conn.transact(&clock, &seed).unwrap();
    let e = *temp_ids.values().next().unwrap();

    let before = conn.db().unwrap().get(e).unwrap();

    let tag = format!("v{value}");
    let mut add = Facts::new();
    add.add(e, "item/tag", Value::str(tag.clone()));
    conn.transact(&clock, &add).unwrap();

    let mut remove = Facts::new();
    remove.remove(e, "item/tag", Value::str(tag));
    let (_, db_after, _, _) = conn.transact(&clock, &remove).unwrap();

    db_after.get(e).unwrap() == before
}

/// Invariant 1: `all_facts()` only ever grows across successful
/// transactions — the backend's history is a monotonic append log.
#[quickcheck]
fn all_facts_only_grows(count: u8) -> bool {
    let conn = connect_with_schema();
    let clock = FixedClock::new(0);
    let mut previous_len = conn.db().unwrap().all_facts().unwrap().len();

    for _ in 0..count.min(10) {
        let mut facts = Facts::new();
        facts.add(EntityRef::New, "item/tag", Value::str("x"));
        conn.transact(&clock, &facts).unwrap();

        let len = conn.db().unwrap().all_facts().unwrap().len();
        if len <= previous_len {
            return false;
        }
        previous_len = len;
    }
    true
}

#[test]
fn entity_value_equality_ignores_source_allocation() {
    assert_eq!(
        EntityValue::One(Value::str("a")),
        EntityValue::One(Value::Str("a".to_string()))
    );
}
