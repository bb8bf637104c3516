//! Request envelopes sent to the device.
//!
//! The exact byte layout of these documents is what the device accepts, so
//! they are kept as single-line templates without indentation.

use xml::escape::escape_str_pcdata;

/// Validates the candidate configuration without applying it.
pub const VALIDATE_CANDIDATE: &str = "<validate><source><candidate/></source></validate>";

/// Promotes the candidate configuration to the running configuration.
pub const COMMIT: &str = "<commit/>";

/// Requests every apply-group provisioned on the device.
pub const GET_GROUPS: &str =
    "<get-configuration><configuration><groups></groups></configuration></get-configuration>";

const CONFIGURATION_OPEN: &str = "<configuration>";
const CONFIGURATION_CLOSE: &str = "</configuration>";

/// Wraps aggregated group fragments in a merge load request.
pub fn load_configuration(writes: &str) -> String {
    format!(
        "<load-configuration action=\"merge\" format=\"xml\">{CONFIGURATION_OPEN}{writes}{CONFIGURATION_CLOSE}</load-configuration>"
    )
}

/// Wraps aggregated delete directives in an edit-config request against the
/// candidate store.
pub fn edit_config_delete(deletes: &str) -> String {
    format!(
        "<edit-config><target><candidate/></target><default-operation>none</default-operation><config>{CONFIGURATION_OPEN}{deletes}{CONFIGURATION_CLOSE}</config></edit-config>"
    )
}

/// Builds the directives removing a group definition and its apply-groups
/// reference. The name is escaped as element text.
pub fn group_delete_fragment(group: &str) -> String {
    let group = escape_str_pcdata(group);
    format!(
        "<groups operation=\"delete\"><name>{group}</name></groups><apply-groups operation=\"delete\">{group}</apply-groups>"
    )
}

/// Wraps a cached group fragment so it reads as a configuration document.
pub fn read_wrapper(fragment: &str) -> String {
    format!("{CONFIGURATION_OPEN}{fragment}{CONFIGURATION_CLOSE}")
}

/// Removes every `<configuration>` wrapper tag so the fragment can be
/// concatenated into a larger envelope.
pub fn strip_configuration(fragment: &str) -> String {
    fragment
        .replace(CONFIGURATION_OPEN, "")
        .replace(CONFIGURATION_CLOSE, "")
}
