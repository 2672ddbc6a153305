//! Informal class-name aliases.

/// Alias rules: when every fragment matches, the input maps to the
/// canonical label.
const ALIAS_RULES: &[(&[&str], &str)] = &[
    (&["olim", "mtk"], "Olimpiade - MTK"),
    (&["olim", "ipa"], "Olimpiade - IPA"),
];

/// Maps an informal class name to its canonical label.
///
/// Input that matches no alias rule passes through unchanged.
pub fn canonical_class(input: &str) -> String {
    let lower = input.to_lowercase();
    for (fragments, canonical) in ALIAS_RULES {
        if fragments.iter().all(|fragment| lower.contains(fragment)) {
            return (*canonical).to_string();
        }
    }
    input.to_string()
}
