use thiserror::Error;

use crate::core::types::{ArmyId, CastleId, FactionId, OrderId, Position};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No route from {from} to {to}")]
    Unreachable { from: Position, to: Position },

    #[error("Insufficient resources for {faction}: need {needed}, have {available}")]
    InsufficientResources {
        faction: FactionId,
        needed: u32,
        available: u32,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// An entity referenced data the static catalog does not contain
    #[error("Corrupt catalog: {0}")]
    Catalog(String),

    #[error("Army not found: {0}")]
    ArmyNotFound(ArmyId),

    #[error("Castle not found: {0}")]
    CastleNotFound(CastleId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl SimError {
    /// Every failure except a corrupt catalog is local to one command and
    /// leaves the simulation running.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimError::Catalog(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
