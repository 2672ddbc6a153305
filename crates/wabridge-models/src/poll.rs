//! Poll messages and vote tallying.

use serde::{Deserialize, Serialize};

/// Body of a poll-creation message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollContent {
    /// The poll question.
    pub name: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable_options_count: Option<u32>,
}

/// One selectable poll option.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub option_name: String,
}

/// A single voter's (re)vote carried by a message receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdate {
    /// JID of the voter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter: Option<String>,
    /// Option names the voter currently selects.
    #[serde(default)]
    pub selected_options: Vec<String>,
    /// Aggregated per-option tallies, attached by the event router once
    /// the original poll has been resolved from the message store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vec<PollTally>>,
}

/// Aggregated vote count for one poll option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTally {
    pub name: String,
    pub voters: u32,
}

/// Counts votes per poll option across a batch of vote updates.
///
/// Options never voted for are reported with a zero count; selections
/// that do not match any option on the poll are ignored.
pub fn aggregate_poll_votes(poll: &PollContent, updates: &[PollUpdate]) -> Vec<PollTally> {
    poll.options
        .iter()
        .map(|option| {
            let voters = updates
                .iter()
                .filter(|u| {
                    u.selected_options
                        .iter()
                        .any(|sel| sel == &option.option_name)
                })
                .count() as u32;
            PollTally {
                name: option.option_name.clone(),
                voters,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(options: &[&str]) -> PollContent {
        PollContent {
            name: "Lunch?".to_string(),
            options: options
                .iter()
                .map(|o| PollOption {
                    option_name: o.to_string(),
                })
                .collect(),
            selectable_options_count: Some(1),
        }
    }

    fn vote(voter: &str, selected: &[&str]) -> PollUpdate {
        PollUpdate {
            voter: Some(voter.to_string()),
            selected_options: selected.iter().map(|s| s.to_string()).collect(),
            vote: None,
        }
    }

    #[test]
    fn test_aggregate_counts_per_option() {
        let poll = poll(&["Nasi", "Soto"]);
        let updates = vec![
            vote("a@s.whatsapp.net", &["Nasi"]),
            vote("b@s.whatsapp.net", &["Nasi"]),
            vote("c@s.whatsapp.net", &["Soto"]),
        ];

        let tallies = aggregate_poll_votes(&poll, &updates);
        assert_eq!(
            tallies,
            vec![
                PollTally {
                    name: "Nasi".to_string(),
                    voters: 2
                },
                PollTally {
                    name: "Soto".to_string(),
                    voters: 1
                },
            ]
        );
    }

    #[test]
    fn test_aggregate_reports_zero_votes() {
        let poll = poll(&["Yes", "No"]);
        let tallies = aggregate_poll_votes(&poll, &[]);
        assert!(tallies.iter().all(|t| t.voters == 0));
        assert_eq!(tallies.len(), 2);
    }

    #[test]
    fn test_aggregate_ignores_unknown_selection() {
        let poll = poll(&["Yes"]);
        let updates = vec![vote("a@s.whatsapp.net", &["Maybe"])];
        let tallies = aggregate_poll_votes(&poll, &updates);
        assert_eq!(tallies[0].voters, 0);
    }
}
