use super::{GRID_HEIGHT, GRID_WIDTH, SENTINEL_MARGIN_LEFT, piece::Piece, playfield::Playfield};

/// Classification of one grid cell.
///
/// The active piece wins over committed cells; the two never overlap while the
/// engine invariants hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::IsVariant)]
#[repr(u8)]
pub enum RenderCell {
    #[default]
    Empty,
    ActivePiece,
    Committed,
}

impl RenderCell {
    /// Classifies grid cell `(x, y)`.
    ///
    /// Returns an error when the coordinates are outside the grid.
    pub fn classify(
        board: &Playfield,
        active: Option<&Piece>,
        x: usize,
        y: usize,
    ) -> Result<Self, CellOutOfBoundsError> {
        if x >= GRID_WIDTH || y >= GRID_HEIGHT {
            return Err(CellOutOfBoundsError { x, y });
        }
        if active.is_some_and(|piece| piece.covers(x, y)) {
            return Ok(RenderCell::ActivePiece);
        }
        if board.grid_row(y).is_cell_occupied(x + SENTINEL_MARGIN_LEFT) {
            return Ok(RenderCell::Committed);
        }
        Ok(RenderCell::Empty)
    }

    /// Splits the cell into the two output planes.
    #[must_use]
    pub fn planes(self) -> Planes {
        Planes {
            moving: self == RenderCell::ActivePiece,
            committed: self == RenderCell::Committed,
        }
    }
}

/// The two display outputs for a queried cell.
///
/// `moving` is set for active-piece cells and `committed` for locked cells. At most
/// one of them is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Planes {
    pub moving: bool,
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("cell ({x}, {y}) is outside the 16x32 grid")]
pub struct CellOutOfBoundsError {
    x: usize,
    y: usize,
}

/// Snapshot of the whole grid as [`RenderCell`]s.
///
/// # Example
///
/// ```
/// use plate_engine::{Piece, PieceKind, Playfield, RenderBoard, RenderCell};
///
/// let piece = Piece::new(PieceKind::O);
/// let board = RenderBoard::new(&Playfield::INITIAL, Some(&piece));
/// assert_eq!(board.cell(6, 0), RenderCell::ActivePiece);
/// assert_eq!(board.cell(5, 0), RenderCell::Empty);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBoard {
    rows: [[RenderCell; GRID_WIDTH]; GRID_HEIGHT],
}

impl Default for RenderBoard {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl RenderBoard {
    pub const INITIAL: Self = Self {
        rows: [[RenderCell::Empty; GRID_WIDTH]; GRID_HEIGHT],
    };

    #[must_use]
    pub fn new(board: &Playfield, active: Option<&Piece>) -> Self {
        let mut this = Self::INITIAL;
        for (row, bits) in this.rows.iter_mut().zip(board.grid_rows()) {
            for (cell, committed) in row.iter_mut().zip(bits.iter_grid_cells()) {
                if committed {
                    *cell = RenderCell::Committed;
                }
            }
        }
        if let Some(piece) = active {
            this.fill_piece_as(piece, RenderCell::ActivePiece);
        }
        this
    }

    fn fill_piece_as(&mut self, piece: &Piece, cell: RenderCell) {
        for (x, y) in piece.grid_cells() {
            self.rows[y][x] = cell;
        }
    }

    /// Returns the cell at grid position `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the grid.
    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> RenderCell {
        self.rows[y][x]
    }

    /// Iterates over the grid rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[RenderCell; GRID_WIDTH]> {
        self.rows.iter()
    }

    /// Counts cells of each kind as `(active, committed)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        self.rows
            .iter()
            .flatten()
            .fold((0, 0), |(active, committed), cell| match cell {
                RenderCell::ActivePiece => (active + 1, committed),
                RenderCell::Committed => (active, committed + 1),
                RenderCell::Empty => (active, committed),
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::core::PieceKind;

    use super::*;

    #[test]
    fn test_classify_priorities() {
        let board = Playfield::from_ascii(
            r"
            ################
            ",
        );
        let piece = Piece::new(PieceKind::T);

        assert_eq!(
            RenderCell::classify(&board, Some(&piece), 7, 0),
            Ok(RenderCell::ActivePiece)
        );
        assert_eq!(
            RenderCell::classify(&board, Some(&piece), 0, 31),
            Ok(RenderCell::Committed)
        );
        assert_eq!(
            RenderCell::classify(&board, Some(&piece), 0, 0),
            Ok(RenderCell::Empty)
        );
        assert_eq!(
            RenderCell::classify(&board, None, 7, 0),
            Ok(RenderCell::Empty)
        );
    }

    #[test]
    fn test_classify_out_of_bounds() {
        let board = Playfield::INITIAL;
        assert!(RenderCell::classify(&board, None, GRID_WIDTH, 0).is_err());
        assert!(RenderCell::classify(&board, None, 0, GRID_HEIGHT).is_err());
    }

    #[test]
    fn test_planes_are_exclusive() {
        assert_eq!(RenderCell::Empty.planes(), Planes::default());
        assert_eq!(
            RenderCell::ActivePiece.planes(),
            Planes {
                moving: true,
                committed: false
            }
        );
        assert_eq!(
            RenderCell::Committed.planes(),
            Planes {
                moving: false,
                committed: true
            }
        );
    }

    #[test]
    fn test_render_board_matches_classify() {
        let board = Playfield::from_ascii(
            r"
            #.......#.......
            ##.####.########
            ",
        );
        let piece = Piece::new(PieceKind::I);
        let render = RenderBoard::new(&board, Some(&piece));
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH {
                assert_eq!(
                    Ok(render.cell(x, y)),
                    RenderCell::classify(&board, Some(&piece), x, y)
                );
            }
        }
        assert_eq!(render.counts(), (4, 16));
    }
}
