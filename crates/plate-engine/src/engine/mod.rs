//! Command processing and the clocked handshake around it.
//!
//! - [`PlateField`] - board, active piece and game-over flag; executes commands
//! - [`PlateController`] - reset/valid/done handshake driving a [`PlateField`]
//! - [`Command`] - the eight opcodes
//! - [`EngineConfig`] - piece selection and rotation policies
//! - [`PieceSource`] - 7-bag or fixed-sequence piece generation
//!
//! # Command Flow
//!
//! 1. Caller puts an opcode on the bus and raises `valid`
//! 2. The controller latches the opcode on the next tick
//! 3. The command runs: one tick for most, one per scanned row for `Check`
//! 4. `done` is asserted until the caller drops `valid`
//!
//! Rejected commands still complete; the reason is only visible through
//! [`PlateController::last_outcome`].

pub use self::{command::*, config::*, controller::*, piece_source::*, plate_field::*};

mod command;
mod config;
mod controller;
mod piece_source;
mod plate_field;
