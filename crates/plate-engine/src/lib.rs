//! A clocked Tetris playfield engine.
//!
//! The engine accepts one gameplay [`Command`] at a time over a valid/done
//! handshake and exposes the 16×32 playfield through a two-plane render query.
//! See [`PlateController`] for the clocked interface and [`engine::PlateField`] for
//! direct, unclocked command execution.

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("piece colliding with the board")]
pub struct PieceCollisionError;

/// Why a command left the engine unchanged.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    derive_more::Display,
    derive_more::Error,
    derive_more::From,
    derive_more::IsVariant,
)]
pub enum RejectReason {
    #[display("movement or rotation blocked")]
    Blocked(PieceCollisionError),
    #[display("no active piece")]
    #[from(ignore)]
    NoActivePiece,
    #[display("spawn area blocked")]
    #[from(ignore)]
    SpawnBlocked,
    #[display("game over")]
    #[from(ignore)]
    GameOver,
}
