use serde::{Deserialize, Serialize};

use crate::{PieceKind, RotationPolicy};

use super::piece_source::PieceSeed;

/// Engine parameters that the opcode protocol leaves open.
///
/// # Example
///
/// ```
/// use plate_engine::{EngineConfig, PieceKind, RotationPolicy, engine::PieceSelection};
///
/// let config = EngineConfig::from_json_str(
///     r#"{ "piece-selection": { "kind": "sequence", "pieces": ["I", "O"] },
///          "rotation": "simple-kick" }"#,
/// )?;
/// assert_eq!(config.rotation, RotationPolicy::SimpleKick);
/// assert_eq!(
///     config.piece_selection,
///     PieceSelection::Sequence { pieces: vec![PieceKind::I, PieceKind::O] }
/// );
/// # Ok::<(), plate_engine::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    pub piece_selection: PieceSelection,
    pub rotation: RotationPolicy,
}

/// How `NewPiece` picks the next kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PieceSelection {
    /// Shuffled 7-bag. Without a seed, one is drawn when the engine is built.
    SevenBag {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<PieceSeed>,
    },
    /// Repeats `pieces` in order.
    Sequence { pieces: Vec<PieceKind> },
}

impl Default for PieceSelection {
    fn default() -> Self {
        PieceSelection::SevenBag { seed: None }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ConfigError {
    #[display("invalid engine configuration: {_0}")]
    Json(serde_json::Error),
    #[display("piece sequence must not be empty")]
    #[from(ignore)]
    EmptySequence,
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.piece_selection {
            PieceSelection::Sequence { pieces } if pieces.is_empty() => {
                Err(ConfigError::EmptySequence)
            }
            _ => Ok(()),
        }
    }

    /// Configuration with a fixed cyclic piece sequence.
    #[must_use]
    pub fn with_sequence(pieces: impl IntoIterator<Item = PieceKind>) -> Self {
        Self {
            piece_selection: PieceSelection::Sequence {
                pieces: pieces.into_iter().collect(),
            },
            ..Self::default()
        }
    }

    /// Configuration with a seeded 7-bag.
    #[must_use]
    pub fn with_seed(seed: PieceSeed) -> Self {
        Self {
            piece_selection: PieceSelection::SevenBag { seed: Some(seed) },
            ..Self::default()
        }
    }
}
