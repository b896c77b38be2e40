// ============================================================
// Layer 3: Network Choice
// ============================================================
// Downstream stages (feature extraction, DCC) either run the
// trained autoencoder loaded from a pretraining checkpoint, or
// the identity network that returns its input as both encoding
// and reconstruction. The choice is an explicit value handed to
// each stage.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which network the downstream stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// `x -> (x, x)`; clustering runs directly on the data
    Identity,
    /// Autoencoder restored from `checkpoint_<checkpoint_index>`
    Trained { checkpoint_index: usize },
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Identity => write!(f, "identity"),
            Network::Trained { checkpoint_index } => write!(f, "checkpoint_{checkpoint_index}"),
        }
    }
}

/// How a run obtains its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// Run the pretrainer and use what it returns
    #[default]
    Pretrain,
    /// Skip pretraining, use the identity network
    Identity,
    /// Skip pretraining, use the final checkpoint already on disk
    LatestCheckpoint,
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pretrain"          => Ok(NetworkMode::Pretrain),
            "identity"          => Ok(NetworkMode::Identity),
            "latest_checkpoint" => Ok(NetworkMode::LatestCheckpoint),
            other => Err(format!(
                "unknown network mode '{other}' (expected pretrain, identity or latest-checkpoint)"
            )),
        }
    }
}
