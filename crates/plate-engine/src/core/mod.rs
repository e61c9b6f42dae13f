//! Board geometry, tetromino tables and the read-only render projection.
//!
//! - [`Playfield`] - committed cells as a sentinel-bordered bit board
//! - [`Piece`] / [`PieceKind`] - tetromino shapes, rotation and movement
//! - [`RenderCell`] / [`RenderBoard`] - two-plane classification of grid cells

pub use self::{piece::*, playfield::*, render::*};

pub(crate) mod piece;
pub(crate) mod playfield;
pub(crate) mod render;

/// Number of columns in the visible grid.
pub const GRID_WIDTH: usize = 16;
/// Number of rows in the visible grid.
pub const GRID_HEIGHT: usize = 32;

// Two sentinel cells on every side, wide enough for a vertical I-piece in its
// 4x4 box to reach the outermost columns.
pub(crate) const SENTINEL_MARGIN_LEFT: usize = 2;
pub(crate) const SENTINEL_MARGIN_RIGHT: usize = 2;
pub(crate) const SENTINEL_MARGIN_TOP: usize = 2;
pub(crate) const SENTINEL_MARGIN_BOTTOM: usize = 2;

pub(crate) const TOTAL_WIDTH: usize = SENTINEL_MARGIN_LEFT + GRID_WIDTH + SENTINEL_MARGIN_RIGHT;
pub(crate) const TOTAL_HEIGHT: usize = SENTINEL_MARGIN_TOP + GRID_HEIGHT + SENTINEL_MARGIN_BOTTOM;
