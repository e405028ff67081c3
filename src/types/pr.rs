use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Derive the display state from the REST `state` string and `merged` flag.
    pub fn from_rest(state: &str, merged: bool) -> Self {
        if merged {
            Self::Merged
        } else if state.eq_ignore_ascii_case("open") {
            Self::Open
        } else {
            Self::Closed
        }
    }
}

/// Auxiliary status attached to a pull-request notification by enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrStatus {
    pub state: PrState,
    /// Whether the current user has an `APPROVED` review on the PR.
    pub approved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_wins_over_closed_state() {
        assert_eq!(PrState::from_rest("closed", true), PrState::Merged);
        assert_eq!(PrState::from_rest("closed", false), PrState::Closed);
        assert_eq!(PrState::from_rest("open", false), PrState::Open);
    }
}
