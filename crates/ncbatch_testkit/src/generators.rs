//! Property-based test generators using proptest.

use proptest::prelude::*;

use crate::fixtures::group_write;

/// Strategy for apply-group names as a device accepts them.
pub fn group_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for a single configuration statement with XML-safe text.
pub fn statement_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["description", "host-name", "mtu", "unit"]),
        prop::string::string_regex("[a-zA-Z0-9 ./]{1,12}").expect("Invalid regex"),
    )
        .prop_map(|(element, text)| format!("<{element}>{text}</{element}>"))
}

/// Strategy for a sequence of staged writes to one group, as
/// `(group, fragments)`.
pub fn group_writes_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        group_name_strategy(),
        prop::collection::vec(statement_strategy(), 1..8),
    )
        .prop_map(|(group, statements)| {
            let fragments = statements
                .iter()
                .map(|statement| group_write(&group, statement))
                .collect();
            (group, fragments)
        })
}
