//! Documents shaped like the ones a device exchanges.

use ncbatch_protocol::{COMMIT_CHECK_SUCCESS, OPERATION_FAILED};

/// A staged write for `group`: the group definition with `body` inside,
/// followed by its apply-groups reference, in a configuration wrapper.
pub fn group_write(group: &str, body: &str) -> String {
    format!(
        "<configuration><groups><name>{group}</name>{body}</groups><apply-groups>{group}</apply-groups></configuration>"
    )
}

/// The `<groups>` element a device returns for `group`.
pub fn group_definition(group: &str, body: &str) -> String {
    format!("<groups><name>{group}</name>{body}</groups>")
}

/// A group listing reply holding the given `(name, body)` definitions.
pub fn device_snapshot(groups: &[(&str, &str)]) -> String {
    let definitions: String = groups
        .iter()
        .map(|(name, body)| group_definition(name, body))
        .collect();
    format!(
        "<rpc-reply xmlns:junos=\"http://xml.juniper.net/junos/\"><configuration junos:changed-seconds=\"1700000000\">{definitions}</configuration></rpc-reply>"
    )
}

/// A reply rejecting the request with `message`.
pub fn operation_failed_reply(message: &str) -> String {
    format!(
        "<rpc-error><error-type>protocol</error-type><error-tag>{OPERATION_FAILED}</error-tag><error-severity>error</error-severity><error-message>{message}</error-message></rpc-error>"
    )
}

/// A validation reply reporting success.
pub fn commit_check_success_reply() -> String {
    format!(
        "<commit-results><routing-engine><name>re0</name><{COMMIT_CHECK_SUCCESS}/></routing-engine></commit-results>"
    )
}

/// A validation reply reporting an error without the success marker.
pub fn commit_check_failure_reply(message: &str) -> String {
    format!(
        "<commit-results><rpc-error><error-severity>error</error-severity><error-message>{message}</error-message></rpc-error></commit-results>"
    )
}
