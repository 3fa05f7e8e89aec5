//! Property-based test generators using proptest.
//!
//! Strategies generate data that exercises the database's invariants:
//! master values with case collisions, customers with optional contact
//! fields, and table names both known and unknown.

use proptest::prelude::*;
use tilldb_core::{Customer, Master, MasterKind, Table};

/// Strategy for generating a master taxonomy.
pub fn master_kind_strategy() -> impl Strategy<Value = MasterKind> {
    prop::sample::select(MasterKind::ALL.to_vec())
}

/// Strategy for generating master values.
///
/// Values are drawn from a small alphabet with mixed casing, so a batch of
/// them is likely to contain case-folded duplicates for dedup tests.
pub fn master_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z ]{0,14}")
        .expect("valid regex")
        .prop_filter("value must not be blank", |s| !s.trim().is_empty())
}

/// Strategy for generating display orders.
pub fn display_order_strategy() -> impl Strategy<Value = i64> {
    1i64..1000
}

/// Strategy for generating master records of one taxonomy.
pub fn master_strategy(kind: MasterKind) -> impl Strategy<Value = Master> {
    (master_value_strategy(), display_order_strategy())
        .prop_map(move |(value, order)| Master::new(kind, value, order))
}

/// Strategy for generating customers with optional contact details.
pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        prop::string::string_regex("[A-Z][a-z]{1,11}( [A-Z][a-z]{1,11})?").expect("valid regex"),
        prop::option::of(prop::string::string_regex("[0-9]{10}").expect("valid regex")),
        prop::option::of(
            prop::string::string_regex("[a-z]{1,8}@[a-z]{1,8}\\.test").expect("valid regex"),
        ),
    )
        .prop_map(|(name, phone, email)| {
            let mut customer = Customer::new(name);
            customer.phone = phone;
            customer.email = email;
            customer
        })
}

/// Strategy for generating known table identifiers.
pub fn table_strategy() -> impl Strategy<Value = Table> {
    prop::sample::select(Table::ALL.to_vec())
}

/// Strategy for generating table names that parse to no known table.
pub fn unknown_table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{3,12}")
        .expect("valid regex")
        .prop_filter("must not collide with a declared table", |name| {
            name.parse::<Table>().is_err()
        })
}
