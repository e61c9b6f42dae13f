use std::fmt::Write as _;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::{
    GRID_HEIGHT, GRID_WIDTH, SENTINEL_MARGIN_BOTTOM, SENTINEL_MARGIN_LEFT, SENTINEL_MARGIN_TOP,
    TOTAL_HEIGHT, TOTAL_WIDTH, piece::Piece,
};

// Left sentinel: bits 0-1
const LEFT_SENTINEL_MASK: u32 = 0b11;
// Right sentinel: bits 18-19
const RIGHT_SENTINEL_MASK: u32 = 0b11 << (SENTINEL_MARGIN_LEFT + GRID_WIDTH);
const SENTINEL_MASK: u32 = LEFT_SENTINEL_MASK | RIGHT_SENTINEL_MASK;
const FULL_ROW_MASK: u32 = (1 << TOTAL_WIDTH) - 1;
const GRID_MASK: u32 = FULL_ROW_MASK & !SENTINEL_MASK;

/// One board row as a bitmask, bit N is board column N.
///
/// # Bit Layout (LSB to MSB)
///
/// - Bits 0-1: left sentinel
/// - Bits 2-17: grid columns 0-15
/// - Bits 18-19: right sentinel
/// - Bits 20-31: unused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRow {
    bits: u32,
}

impl BitRow {
    pub const EMPTY: Self = Self {
        bits: SENTINEL_MASK,
    };
    pub const FULL_SENTINEL: Self = Self {
        bits: FULL_ROW_MASK,
    };

    /// Checks if all 16 grid columns are committed.
    #[inline]
    #[must_use]
    pub fn is_grid_filled(self) -> bool {
        (self.bits & GRID_MASK) == GRID_MASK
    }

    #[inline]
    #[must_use]
    pub fn is_grid_empty(self) -> bool {
        (self.bits & GRID_MASK) == 0
    }

    /// Checks if the cell at board column `x` is occupied.
    #[inline]
    #[must_use]
    pub fn is_cell_occupied(self, x: usize) -> bool {
        (self.bits & (1 << x)) != 0
    }

    #[inline]
    fn is_any_cell_occupied(self, x0: usize, mask: u16) -> bool {
        (self.bits & (u32::from(mask) << x0)) != 0
    }

    #[inline]
    fn occupy_cells(&mut self, x0: usize, mask: u16) {
        self.bits |= u32::from(mask) << x0;
    }

    /// Iterates over the 16 grid cells of the row.
    pub fn iter_grid_cells(self) -> impl Iterator<Item = bool> {
        (SENTINEL_MARGIN_LEFT..SENTINEL_MARGIN_LEFT + GRID_WIDTH)
            .map(move |x| self.is_cell_occupied(x))
    }
}

/// The Playfield Store: committed cells of the 16×32 grid.
///
/// Each row is a `u32` bitmask. Two sentinel columns on each side and two sentinel
/// rows above and below the grid are permanently occupied, so a piece leaving the
/// grid collides exactly like a piece hitting a committed cell.
///
/// ```text
///              0 1 2 ............. 17 18 19
///   rows 0-1   W W W W W W W W W W W  W  W    top sentinel
///   rows 2-33  W W . . . grid . . .   W  W    grid rows 0-31
///   rows 34-35 W W W W W W W W W W W  W  W    bottom sentinel
/// ```
///
/// # Example
///
/// ```
/// use plate_engine::Playfield;
///
/// let board = Playfield::INITIAL;
/// assert!(!board.is_committed(0, 31));
/// assert!(board.is_committed(-1, 0));
/// assert!(board.is_committed(16, 0));
/// assert!(board.is_committed(0, 32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playfield {
    rows: [BitRow; TOTAL_HEIGHT],
}

impl Serialize for Playfield {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Grid rows only, top to bottom: "0000,0000,...,ffff"
        let mut hex_string = String::with_capacity(GRID_HEIGHT * 5);
        for (i, row) in self.grid_rows().enumerate() {
            if i > 0 {
                hex_string.push(',');
            }
            let bits = (row.bits & GRID_MASK) >> SENTINEL_MARGIN_LEFT;
            write!(&mut hex_string, "{bits:04x}").map_err(serde::ser::Error::custom)?;
        }
        serializer.serialize_str(&hex_string)
    }
}

impl<'de> Deserialize<'de> for Playfield {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != GRID_HEIGHT {
            return Err(serde::de::Error::custom(format!(
                "expected {GRID_HEIGHT} comma-separated hex rows, got {}",
                parts.len()
            )));
        }

        let mut board = Playfield::INITIAL;
        for (y, hex_str) in parts.iter().enumerate() {
            let bits = u16::from_str_radix(hex_str, 16).map_err(|e| {
                serde::de::Error::custom(format!("invalid hex at row {y}: {hex_str} ({e})"))
            })?;
            board.rows[y + SENTINEL_MARGIN_TOP].occupy_cells(SENTINEL_MARGIN_LEFT, bits);
        }
        Ok(board)
    }
}

impl Default for Playfield {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl Playfield {
    pub const WIDTH: usize = GRID_WIDTH;
    pub const HEIGHT: usize = GRID_HEIGHT;

    pub const INITIAL: Self = {
        let mut rows = [BitRow::EMPTY; TOTAL_HEIGHT];
        let mut y = 0;
        while y < SENTINEL_MARGIN_TOP {
            rows[y] = BitRow::FULL_SENTINEL;
            y += 1;
        }
        let mut y = TOTAL_HEIGHT - SENTINEL_MARGIN_BOTTOM;
        while y < TOTAL_HEIGHT {
            rows[y] = BitRow::FULL_SENTINEL;
            y += 1;
        }
        Self { rows }
    };

    /// Returns grid row `y`.
    #[must_use]
    pub fn grid_row(&self, y: usize) -> BitRow {
        self.rows[y + SENTINEL_MARGIN_TOP]
    }

    /// Iterates over the 32 grid rows, top to bottom.
    pub fn grid_rows(&self) -> impl Iterator<Item = BitRow> + '_ {
        self.rows[SENTINEL_MARGIN_TOP..][..GRID_HEIGHT].iter().copied()
    }

    /// Returns whether grid cell `(x, y)` is committed.
    ///
    /// Anything outside the grid counts as committed.
    #[must_use]
    pub fn is_committed(&self, x: isize, y: isize) -> bool {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return true;
        };
        if x >= GRID_WIDTH || y >= GRID_HEIGHT {
            return true;
        }
        self.grid_row(y).is_cell_occupied(x + SENTINEL_MARGIN_LEFT)
    }

    /// Checks if the piece overlaps a committed cell or a sentinel.
    #[must_use]
    pub fn is_colliding(&self, piece: Piece) -> bool {
        let x0 = piece.position().x();
        let y0 = piece.position().y();
        // Rows past the bottom sentinel act as fully occupied.
        piece
            .mask()
            .into_iter()
            .enumerate()
            .any(|(dy, mask)| match self.rows.get(y0 + dy) {
                Some(row) => row.is_any_cell_occupied(x0, mask),
                None => mask != 0,
            })
    }

    /// Commits every cell of `piece`.
    ///
    /// # Panics
    ///
    /// Panics if any cell of the piece is already committed or outside the grid.
    /// Callers only commit pieces that passed [`Self::is_colliding`], so this is an
    /// engine invariant violation.
    pub fn commit_piece(&mut self, piece: Piece) {
        assert!(
            !self.is_colliding(piece),
            "committing {piece} would overwrite occupied cells"
        );
        let x0 = piece.position().x();
        let y0 = piece.position().y();
        for (mask, row) in piece.mask().into_iter().zip(&mut self.rows[y0..]) {
            row.occupy_cells(x0, mask);
        }
    }

    /// Returns the indices of all full grid rows, top to bottom.
    #[must_use]
    pub fn full_rows(&self) -> ArrayVec<usize, GRID_HEIGHT> {
        self.grid_rows()
            .enumerate()
            .filter(|(_, row)| row.is_grid_filled())
            .map(|(y, _)| y)
            .collect()
    }

    /// Removes grid row `y` and shifts every row above it down by one.
    ///
    /// An empty row is introduced at the top of the grid.
    pub fn remove_row(&mut self, y: usize) {
        assert!(y < GRID_HEIGHT, "row {y} is outside the grid");
        let grid_rows = &mut self.rows[SENTINEL_MARGIN_TOP..][..GRID_HEIGHT];
        grid_rows.copy_within(0..y, 1);
        grid_rows[0] = BitRow::EMPTY;
    }

    /// Removes every full row in one top-to-bottom pass and returns how many were
    /// removed.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut count = 0;
        let mut y = 0;
        while y < GRID_HEIGHT {
            if self.grid_row(y).is_grid_filled() {
                self.remove_row(y);
                count += 1;
                // The row shifted into `y` has not been tested yet.
                continue;
            }
            y += 1;
        }
        count
    }

    /// Number of committed grid cells.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.grid_rows()
            .map(|row| (row.bits & GRID_MASK).count_ones() as usize)
            .sum()
    }

    /// Builds a playfield from ASCII art, `#` committed and `.` empty.
    ///
    /// Rows are 16 cells wide and given top to bottom. Fewer than 32 rows are
    /// aligned to the bottom of the grid; the missing top rows are empty.
    ///
    /// # Panics
    ///
    /// Panics on a row that is not 16 cells wide or on more than 32 rows.
    #[must_use]
    pub fn from_ascii(art: &str) -> Self {
        let lines: Vec<&str> = art.lines().filter(|line| !line.trim().is_empty()).collect();
        assert!(
            lines.len() <= GRID_HEIGHT,
            "at most {GRID_HEIGHT} rows, got {}",
            lines.len()
        );

        let mut board = Self::INITIAL;
        let top = GRID_HEIGHT - lines.len();
        for (i, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line.chars().filter(|c| *c == '#' || *c == '.').collect();
            assert_eq!(
                chars.len(),
                GRID_WIDTH,
                "each row must have exactly {GRID_WIDTH} cells, got {} at row {i}",
                chars.len(),
            );
            let row = &mut board.rows[top + i + SENTINEL_MARGIN_TOP];
            for (x, _) in chars.iter().enumerate().filter(|(_, c)| **c == '#') {
                row.occupy_cells(x + SENTINEL_MARGIN_LEFT, 0b1);
            }
        }
        board
    }

    /// Renders the grid as ASCII art in the [`Self::from_ascii`] format.
    #[must_use]
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(GRID_HEIGHT * (GRID_WIDTH + 1));
        for row in self.grid_rows() {
            out.extend(row.iter_grid_cells().map(|c| if c { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}
