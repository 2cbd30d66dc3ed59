//! Error types shared by the aggregation core.

use strum::{AsRefStr, Display};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The phase of an aggregation that an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Group construction or listener lifecycle, before any exchange.
    Setup,
    /// The all-to-one count gather.
    Handshake,
    /// Point-to-point record transfer.
    Transfer,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The process group is not usable (bad size, missing participant,
    /// illegal lifecycle transition).
    #[error("setup error on rank {rank} during {stage}: {details}")]
    Setup {
        rank: usize,
        stage: Stage,
        details: String,
    },

    /// A peer sent something that cannot be a well-formed record stream.
    #[error("protocol error on rank {rank} during {stage}: {details}")]
    Protocol {
        rank: usize,
        stage: Stage,
        details: String,
    },

    #[error("failed to write report output")]
    Render(#[from] std::io::Error),
}

impl Error {
    pub fn setup(rank: usize, stage: Stage, details: impl Into<String>) -> Self {
        Self::Setup {
            rank,
            stage,
            details: details.into(),
        }
    }

    pub fn protocol(rank: usize, stage: Stage, details: impl Into<String>) -> Self {
        Self::Protocol {
            rank,
            stage,
            details: details.into(),
        }
    }

    /// The stage the failure happened in, if it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Setup { stage, .. } | Self::Protocol { stage, .. } => Some(*stage),
            Self::Render(_) => None,
        }
    }
}
