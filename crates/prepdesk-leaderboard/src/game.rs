use crate::errors::{LeaderboardError, LeaderboardResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Math,
    Vocab,
    Accounting,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Math, GameKind::Vocab, GameKind::Accounting];

    pub fn parse(raw: &str) -> LeaderboardResult<Self> {
        match raw {
            "math" => Ok(Self::Math),
            "vocab" => Ok(Self::Vocab),
            "accounting" => Ok(Self::Accounting),
            other => Err(LeaderboardError::UnknownGame(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Math => "math",
            Self::Vocab => "vocab",
            Self::Accounting => "accounting",
        }
    }

    /// Accounting scores are time-weighted and named `dynamicScore` on the wire.
    pub fn uses_dynamic_score(&self) -> bool {
        matches!(self, Self::Accounting)
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardView {
    #[default]
    Best,
    Cumulative,
}

impl LeaderboardView {
    pub fn parse(raw: &str) -> LeaderboardResult<Self> {
        match raw {
            "best" => Ok(Self::Best),
            "cumulative" => Ok(Self::Cumulative),
            other => Err(LeaderboardError::UnknownView(other.to_string())),
        }
    }
}
