use std::{fmt, str::FromStr};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::{
    GRID_HEIGHT, GRID_WIDTH, SENTINEL_MARGIN_LEFT, SENTINEL_MARGIN_TOP, TOTAL_HEIGHT, TOTAL_WIDTH,
    playfield::Playfield,
};

/// Grid column of the spawn anchor (left edge of the 4×4 bounding box).
pub const SPAWN_GRID_X: usize = 6;
/// Grid row of the spawn anchor (top edge of the 4×4 bounding box).
pub const SPAWN_GRID_Y: usize = 0;

/// A tetromino with position, rotation and kind.
///
/// Pieces are immutable values: movement and rotation return new `Piece`s and leave
/// collision checks to the caller (or to [`Piece::rotated_with`]).
///
/// # Coordinate System
///
/// The position is the top-left corner of the piece's 4×4 bounding box, expressed in
/// board coordinates, which include the sentinel margins around the 16×32 grid. Use
/// [`Piece::grid_cells`] to get the occupied cells in grid coordinates.
///
/// # Example
///
/// ```
/// use plate_engine::{Piece, PieceKind};
///
/// let piece = Piece::new(PieceKind::T);
/// let moved = piece.right().unwrap();
/// let rotated = moved.rotated();
/// assert_eq!(rotated.rotation().index(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    position: PiecePosition,
    rotation: PieceRotation,
    kind: PieceKind,
}

impl Piece {
    /// Creates a piece at the spawn anchor with rotation index 0.
    #[must_use]
    pub fn new(kind: PieceKind) -> Self {
        Self {
            position: PiecePosition::SPAWN_POSITION,
            rotation: PieceRotation::default(),
            kind,
        }
    }

    /// Creates a piece at an explicit board position and rotation.
    ///
    /// Returns `None` when the rotation index is not valid for `kind`.
    #[must_use]
    pub fn with_placement(
        kind: PieceKind,
        rotation: PieceRotation,
        position: PiecePosition,
    ) -> Option<Self> {
        (rotation.index() < kind.orientation_count()).then_some(Self {
            position,
            rotation,
            kind,
        })
    }

    #[must_use]
    pub fn position(&self) -> PiecePosition {
        self.position
    }

    #[must_use]
    pub fn rotation(&self) -> PieceRotation {
        self.rotation
    }

    #[must_use]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    #[must_use]
    pub(crate) fn mask(&self) -> PieceMask {
        self.kind.mask(self.rotation)
    }

    /// Occupied cells in board coordinates (sentinel margins included).
    #[must_use]
    pub fn occupied_positions(&self) -> ArrayVec<(usize, usize), 4> {
        self.kind
            .cell_offsets(self.rotation)
            .into_iter()
            .map(|(dx, dy)| (self.position.x() + dx, self.position.y() + dy))
            .collect()
    }

    /// Occupied cells in grid coordinates.
    ///
    /// Cells that fall outside the 16×32 grid are skipped, so a placed piece always
    /// yields four cells.
    #[must_use]
    pub fn grid_cells(&self) -> ArrayVec<(usize, usize), 4> {
        self.occupied_positions()
            .into_iter()
            .filter_map(|(x, y)| {
                let gx = x.checked_sub(SENTINEL_MARGIN_LEFT)?;
                let gy = y.checked_sub(SENTINEL_MARGIN_TOP)?;
                (gx < GRID_WIDTH && gy < GRID_HEIGHT).then_some((gx, gy))
            })
            .collect()
    }

    /// Returns `true` if the piece has a cell at grid position `(x, y)`.
    #[must_use]
    pub fn covers(&self, x: usize, y: usize) -> bool {
        self.grid_cells().contains(&(x, y))
    }

    #[must_use]
    pub fn left(&self) -> Option<Self> {
        self.position.left().map(|position| self.moved_to(position))
    }

    #[must_use]
    pub fn right(&self) -> Option<Self> {
        self.position.right().map(|position| self.moved_to(position))
    }

    #[must_use]
    pub fn up(&self) -> Option<Self> {
        self.position.up().map(|position| self.moved_to(position))
    }

    #[must_use]
    pub fn down(&self) -> Option<Self> {
        self.position.down().map(|position| self.moved_to(position))
    }

    fn moved_to(&self, position: PiecePosition) -> Self {
        Self { position, ..*self }
    }

    /// Returns the piece at the next rotation index, without any collision test.
    #[must_use]
    pub fn rotated(&self) -> Self {
        Self {
            rotation: self.rotation.next(self.kind.orientation_count()),
            ..*self
        }
    }

    /// Rotates the piece on `board` following `policy`.
    ///
    /// Returns `None` when every candidate allowed by the policy collides.
    #[must_use]
    pub fn rotated_with(&self, board: &Playfield, policy: RotationPolicy) -> Option<Self> {
        let piece = self.rotated();
        if !board.is_colliding(piece) {
            return Some(piece);
        }
        match policy {
            RotationPolicy::InPlace => None,
            RotationPolicy::SimpleKick => kick_rotation(board, piece),
        }
    }
}

/// Tries the simple kick offsets after a blocked rotation.
///
/// Only four single-cell offsets are tried, in order: up, right, down, left. The
/// first collision-free one wins. There are no per-kind or per-state kick tables.
fn kick_rotation(board: &Playfield, piece: Piece) -> Option<Piece> {
    [piece.up(), piece.right(), piece.down(), piece.left()]
        .into_iter()
        .flatten()
        .find(|piece| !board.is_colliding(*piece))
}

/// How a blocked rotation is resolved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Rotate around the current anchor only; a blocked rotation is rejected.
    #[default]
    InPlace,
    /// Retry a blocked rotation one cell up, right, down and left.
    SimpleKick,
}

impl fmt::Display for Piece {
    /// Formats as `kind#rotation@x,y` in board coordinates, e.g. `S#1@4,18`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}@{},{}",
            self.kind.as_char(),
            self.rotation.0,
            self.position.x,
            self.position.y
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid piece `{input}`: {reason}")]
pub struct ParsePieceError {
    input: String,
    reason: &'static str,
}

impl FromStr for Piece {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParsePieceError {
            input: s.to_owned(),
            reason,
        };

        let (kind, rest) = s.split_once('#').ok_or_else(|| err("missing '#'"))?;
        let (rotation, position) = rest.split_once('@').ok_or_else(|| err("missing '@'"))?;
        let (x, y) = position.split_once(',').ok_or_else(|| err("missing ','"))?;

        let mut chars = kind.chars();
        let kind = match (chars.next(), chars.next()) {
            (Some(c), None) => PieceKind::from_char(c).ok_or_else(|| err("unknown piece kind"))?,
            _ => return Err(err("piece kind must be a single character")),
        };
        let rotation = rotation
            .parse::<u8>()
            .map(PieceRotation)
            .map_err(|_| err("invalid rotation"))?;
        let x = x.parse::<u8>().map_err(|_| err("invalid x position"))?;
        let y = y.parse::<u8>().map_err(|_| err("invalid y position"))?;
        let position = PiecePosition::try_new(x, y).ok_or_else(|| err("position out of range"))?;

        Piece::with_placement(kind, rotation, position)
            .ok_or_else(|| err("rotation out of range for piece kind"))
    }
}

impl Serialize for Piece {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Piece {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Anchor of a piece's 4×4 bounding box in board coordinates.
///
/// # Coordinate System
///
/// - (0, 0) is the top-left sentinel cell
/// - X increases rightward (columns), Y increases downward (rows)
/// - Grid cell `(gx, gy)` is board cell `(gx + 2, gy + 2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PiecePosition {
    x: u8,
    y: u8,
}

impl PiecePosition {
    #[expect(clippy::cast_possible_truncation)]
    pub const SPAWN_POSITION: Self = Self::new(
        (SPAWN_GRID_X + SENTINEL_MARGIN_LEFT) as u8,
        (SPAWN_GRID_Y + SENTINEL_MARGIN_TOP) as u8,
    );

    #[must_use]
    pub const fn new(x: u8, y: u8) -> Self {
        assert!((x as usize) < TOTAL_WIDTH);
        assert!((y as usize) < TOTAL_HEIGHT);
        Self { x, y }
    }

    #[must_use]
    pub const fn try_new(x: u8, y: u8) -> Option<Self> {
        if (x as usize) < TOTAL_WIDTH && (y as usize) < TOTAL_HEIGHT {
            Some(Self { x, y })
        } else {
            None
        }
    }

    #[must_use]
    pub fn x(self) -> usize {
        usize::from(self.x)
    }

    #[must_use]
    pub fn y(self) -> usize {
        usize::from(self.y)
    }

    #[must_use]
    pub const fn left(&self) -> Option<Self> {
        if self.x == 0 {
            None
        } else {
            Some(Self::new(self.x - 1, self.y))
        }
    }

    #[must_use]
    pub const fn right(&self) -> Option<Self> {
        if self.x as usize >= TOTAL_WIDTH - 1 {
            None
        } else {
            Some(Self::new(self.x + 1, self.y))
        }
    }

    #[must_use]
    pub const fn up(&self) -> Option<Self> {
        if self.y == 0 {
            None
        } else {
            Some(Self::new(self.x, self.y - 1))
        }
    }

    #[must_use]
    pub const fn down(&self) -> Option<Self> {
        if self.y as usize >= TOTAL_HEIGHT - 1 {
            None
        } else {
            Some(Self::new(self.x, self.y + 1))
        }
    }
}

/// Rotation index of a piece.
///
/// Index 0 is the spawn orientation and each step is 90° clockwise. The index wraps
/// at the kind's orientation count, so an O-piece always stays at 0 and I/S/Z
/// alternate between 0 and 1.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PieceRotation(u8);

impl PieceRotation {
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    #[expect(clippy::cast_possible_truncation)]
    fn next(self, orientations: usize) -> Self {
        PieceRotation(((self.index() + 1) % orientations) as u8)
    }
}

/// The seven tetromino kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[repr(u8)]
pub enum PieceKind {
    I = 0,
    O = 1,
    S = 2,
    Z = 3,
    J = 4,
    L = 5,
    T = 6,
}

impl PieceKind {
    /// Number of piece kinds (7).
    pub const LEN: usize = 7;

    pub const ALL: [PieceKind; Self::LEN] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
        PieceKind::T,
    ];

    /// Number of distinguishable orientations.
    ///
    /// ```
    /// use plate_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::O.orientation_count(), 1);
    /// assert_eq!(PieceKind::S.orientation_count(), 2);
    /// assert_eq!(PieceKind::T.orientation_count(), 4);
    /// ```
    #[must_use]
    pub const fn orientation_count(self) -> usize {
        match self {
            PieceKind::O => 1,
            PieceKind::I | PieceKind::S | PieceKind::Z => 2,
            PieceKind::J | PieceKind::L | PieceKind::T => 4,
        }
    }

    pub(crate) fn mask(self, rotation: PieceRotation) -> PieceMask {
        PIECE_MASKS[self as usize][rotation.index()]
    }

    /// Cell offsets inside the 4×4 bounding box for the given rotation.
    #[must_use]
    pub fn cell_offsets(self, rotation: PieceRotation) -> ArrayVec<(usize, usize), 4> {
        let mask = self.mask(rotation);
        (0..4)
            .flat_map(|dy| (0..4).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| mask[dy] & (1 << dx) != 0)
            .collect()
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            PieceKind::I => 'I',
            PieceKind::O => 'O',
            PieceKind::S => 'S',
            PieceKind::Z => 'Z',
            PieceKind::J => 'J',
            PieceKind::L => 'L',
            PieceKind::T => 'T',
        }
    }

    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(PieceKind::I),
            'O' => Some(PieceKind::O),
            'S' => Some(PieceKind::S),
            'Z' => Some(PieceKind::Z),
            'J' => Some(PieceKind::J),
            'L' => Some(PieceKind::L),
            'T' => Some(PieceKind::T),
            _ => None,
        }
    }
}

/// A piece within its 4×4 bounding box: one 4-bit row mask per box row, bit N is
/// box column N.
pub(crate) type PieceMask = [u16; 4];

/// Generates the 4 rotation states of a mask by rotating 90° clockwise inside the
/// top-left `size`×`size` square.
const fn mask_rotations(size: usize, mask: PieceMask) -> [PieceMask; 4] {
    let mut rotates = [mask; 4];
    let mut i = 1;
    while i < 4 {
        let mut new_mask = [0; 4];
        let mut y = 0;
        while y < size {
            let mut x = 0;
            while x < size {
                if (rotates[i - 1][size - 1 - x] & (1 << y)) != 0 {
                    new_mask[y] |= 1 << x;
                }
                x += 1;
            }
            y += 1;
        }
        rotates[i] = new_mask;
        i += 1;
    }
    rotates
}

const PIECE_MASKS: [[PieceMask; 4]; PieceKind::LEN] = {
    const fn m(bits: [bool; 4]) -> u16 {
        let mut mask = 0;
        let mut i = 0;
        while i < 4 {
            if bits[i] {
                mask |= 1 << i;
            }
            i += 1;
        }
        mask
    }

    const C: bool = true;
    const E: bool = false;
    const EEEE: u16 = m([E; 4]);

    [
        mask_rotations(4, [EEEE, m([C, C, C, C]), EEEE, EEEE]),
        mask_rotations(2, [m([C, C, E, E]), m([C, C, E, E]), EEEE, EEEE]),
        mask_rotations(3, [m([E, C, C, E]), m([C, C, E, E]), EEEE, EEEE]),
        mask_rotations(3, [m([C, C, E, E]), m([E, C, C, E]), EEEE, EEEE]),
        mask_rotations(3, [m([C, E, E, E]), m([C, C, C, E]), EEEE, EEEE]),
        mask_rotations(3, [m([E, E, C, E]), m([C, C, C, E]), EEEE, EEEE]),
        mask_rotations(3, [m([E, C, E, E]), m([C, C, C, E]), EEEE, EEEE]),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut cells: ArrayVec<(usize, usize), 4>) -> Vec<(usize, usize)> {
        cells.sort_unstable();
        cells.to_vec()
    }

    #[test]
    fn test_every_orientation_has_four_cells() {
        for kind in PieceKind::ALL {
            for r in 0..kind.orientation_count() {
                let rotation = PieceRotation(u8::try_from(r).unwrap());
                assert_eq!(
                    kind.cell_offsets(rotation).len(),
                    4,
                    "{kind:?} rotation {r} should have 4 cells"
                );
            }
        }
    }

    #[test]
    fn test_distinct_orientations_differ() {
        for kind in PieceKind::ALL {
            let shapes: Vec<_> = (0..kind.orientation_count())
                .map(|r| sorted(kind.cell_offsets(PieceRotation(u8::try_from(r).unwrap()))))
                .collect();
            for (i, a) in shapes.iter().enumerate() {
                for b in &shapes[i + 1..] {
                    assert_ne!(a, b, "{kind:?} has duplicate orientations");
                }
            }
        }
    }

    #[test]
    fn test_spawn_cells() {
        let t = Piece::new(PieceKind::T);
        assert_eq!(sorted(t.grid_cells()), vec![(6, 1), (7, 0), (7, 1), (8, 1)]);

        let i = Piece::new(PieceKind::I);
        assert_eq!(sorted(i.grid_cells()), vec![(6, 1), (7, 1), (8, 1), (9, 1)]);

        let o = Piece::new(PieceKind::O);
        assert_eq!(sorted(o.grid_cells()), vec![(6, 0), (6, 1), (7, 0), (7, 1)]);
    }

    #[test]
    fn test_rotation_wraps_at_orientation_count() {
        let o = Piece::new(PieceKind::O);
        assert_eq!(o.rotated(), o);

        let s = Piece::new(PieceKind::S);
        assert_eq!(s.rotated().rotation().index(), 1);
        assert_eq!(s.rotated().rotated(), s);

        let mut t = Piece::new(PieceKind::T);
        for expected in [1, 2, 3, 0] {
            t = t.rotated();
            assert_eq!(t.rotation().index(), expected);
        }
    }

    #[test]
    fn test_rotation_in_place_blocked_by_wall() {
        let board = Playfield::INITIAL;
        // Vertical I in grid column 1: its cells sit in box column 2.
        let vertical = Piece::with_placement(
            PieceKind::I,
            PieceRotation(1),
            PiecePosition::new(1, 10),
        )
        .unwrap();
        assert!(!board.is_colliding(vertical));
        assert_eq!(sorted(vertical.grid_cells())[0], (1, 8));

        // Horizontal I would need grid columns -1..=2.
        assert_eq!(vertical.rotated_with(&board, RotationPolicy::InPlace), None);
        let kicked = vertical
            .rotated_with(&board, RotationPolicy::SimpleKick)
            .unwrap();
        assert!(!board.is_colliding(kicked));
        assert_eq!(kicked.rotation().index(), 0);
        assert_eq!(kicked.position(), PiecePosition::new(2, 10));
    }

    #[test]
    fn test_piece_text_format() {
        let piece =
            Piece::with_placement(PieceKind::S, PieceRotation(1), PiecePosition::new(4, 18))
                .unwrap();
        assert_eq!(piece.to_string(), "S#1@4,18");
        assert_eq!("S#1@4,18".parse::<Piece>().unwrap(), piece);

        let serialized = serde_json::to_string(&piece).unwrap();
        assert_eq!(serialized, "\"S#1@4,18\"");
        let deserialized: Piece = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, piece);
    }

    #[test]
    fn test_piece_parse_errors() {
        assert!("S1@4,18".parse::<Piece>().is_err());
        assert!("S#1#4,18".parse::<Piece>().is_err());
        assert!("S#1@4".parse::<Piece>().is_err());
        assert!("X#1@4,18".parse::<Piece>().is_err());
        assert!("SS#1@4,18".parse::<Piece>().is_err());
        // S-pieces only have two orientations.
        assert!("S#2@4,18".parse::<Piece>().is_err());
        assert!("T#1@abc,18".parse::<Piece>().is_err());
        assert!("T#1@4,99".parse::<Piece>().is_err());
    }

    #[test]
    fn test_piece_kind_char_conversion() {
        for kind in PieceKind::ALL {
            assert_eq!(PieceKind::from_char(kind.as_char()), Some(kind));
        }
        assert_eq!(PieceKind::from_char('X'), None);
        assert_eq!(PieceKind::from_char('t'), None);
    }
}
