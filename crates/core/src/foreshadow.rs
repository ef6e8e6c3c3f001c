use serde::{Deserialize, Serialize};

/// Lifecycle of a foreshadowing hint.
///
/// Transitions are monotonic: `planned -> planted -> paid_off`, or `abandoned`
/// from either of the first two.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HintStatus {
    Planned,
    Planted,
    PaidOff,
    Abandoned,
}

impl HintStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Planned => "planned",
            Self::Planted => "planted",
            Self::PaidOff => "paid_off",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(*self, Self::PaidOff | Self::Abandoned)
    }

    /// Position in the lifecycle; transitions never decrease it.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match *self {
            Self::Planned => 0,
            Self::Planted => 1,
            Self::PaidOff | Self::Abandoned => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeshadowingHint {
    pub id: String,
    pub project_id: String,
    pub text: String,
    pub plant_chapter: u32,
    pub payoff_chapter: u32,
    pub status: HintStatus,
    /// Chapter at which the last status transition happened.
    pub status_chapter: Option<u32>,
}
