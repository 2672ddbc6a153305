//! JID formatting and canonicalization helpers.
//!
//! A JID is the protocol's addressable identifier for a user
//! (`<digits>@s.whatsapp.net`), a group (`<digits>-<digits>@g.us`), or a
//! linked identity (`<digits>@lid`).

/// Domain suffix for user JIDs.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";
/// Domain suffix for group JIDs.
pub const GROUP_SUFFIX: &str = "@g.us";
/// Domain suffix for linked-identity JIDs.
pub const LID_SUFFIX: &str = "@lid";

/// Returns true if the JID addresses a group conversation.
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Formats a phone number as a user JID.
///
/// Passes fully-formed user JIDs through unchanged; anything else is
/// reduced to its digits and suffixed.
pub fn format_phone(phone: &str) -> String {
    if phone.ends_with(USER_SUFFIX) {
        return phone.to_string();
    }

    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits}{USER_SUFFIX}")
}

/// Formats a group id as a group JID.
///
/// Group ids may contain a `-` separator between the creator number and
/// the creation timestamp.
pub fn format_group(group: &str) -> String {
    if group.ends_with(GROUP_SUFFIX) {
        return group.to_string();
    }

    let kept: String = group
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    format!("{kept}{GROUP_SUFFIX}")
}

/// Reduces a JID to the canonical digits-only identifier used for
/// authorization checks and API calls.
///
/// Strips a known domain suffix when present, then drops every remaining
/// non-digit character.
pub fn canonical_user(jid: &str) -> String {
    let bare = [USER_SUFFIX, GROUP_SUFFIX, LID_SUFFIX]
        .iter()
        .find_map(|suffix| jid.strip_suffix(suffix))
        .unwrap_or(jid);

    bare.chars().filter(|c| c.is_ascii_digit()).collect()
}
