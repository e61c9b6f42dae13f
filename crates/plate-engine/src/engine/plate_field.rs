use tracing::info;

use crate::{
    Command, PieceCollisionError, RejectReason,
    core::{GRID_HEIGHT, Piece, PieceKind, Playfield, RenderBoard, RenderCell, RotationPolicy},
};

use super::{ConfigError, EngineConfig, piece_source::PieceSource};

/// Result of one completed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum Outcome {
    /// The command changed (or, for `Nop`, deliberately kept) the engine state.
    Applied,
    /// The command was refused and left the state untouched.
    Rejected(RejectReason),
    /// `Check` finished and removed this many rows.
    LinesCleared(usize),
}

impl From<Result<(), RejectReason>> for Outcome {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Outcome::Applied,
            Err(reason) => Outcome::Rejected(reason),
        }
    }
}

/// The Command Processor state: committed cells, active piece and game-over flag.
///
/// Every operation either applies completely or returns the [`RejectReason`] and
/// leaves the field untouched. A blocked spawn is the one rejection with a side
/// effect: it tops the game out.
///
/// # Example
///
/// ```
/// use plate_engine::{EngineConfig, PieceKind, engine::PlateField};
///
/// let mut field = PlateField::new(&EngineConfig::with_sequence([PieceKind::O]))?;
/// field.new_piece()?;
/// while field.move_down().is_ok() {}
/// field.commit()?;
/// assert_eq!(field.board().committed_count(), 4);
/// assert_eq!(field.clear_lines()?, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct PlateField {
    board: Playfield,
    active: Option<Piece>,
    source: PieceSource,
    rotation: RotationPolicy,
    game_over: bool,
}

impl PlateField {
    /// Builds an empty field, rejecting configurations the engine cannot run with.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = PieceSource::from_selection(&config.piece_selection)?;
        Ok(Self::with_source(source, config.rotation))
    }

    pub(crate) fn with_source(source: PieceSource, rotation: RotationPolicy) -> Self {
        Self {
            board: Playfield::INITIAL,
            active: None,
            source,
            rotation,
            game_over: false,
        }
    }

    /// Empties the board and rewinds the piece source.
    pub fn reset(&mut self) {
        self.board = Playfield::INITIAL;
        self.active = None;
        self.game_over = false;
        self.source.restart();
    }

    #[must_use]
    pub fn board(&self) -> &Playfield {
        &self.board
    }

    #[must_use]
    pub fn active_piece(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Kind the next `NewPiece` will spawn.
    #[must_use]
    pub fn next_piece(&self) -> PieceKind {
        self.source.peek_next()
    }

    #[must_use]
    pub fn render_board(&self) -> RenderBoard {
        RenderBoard::new(&self.board, self.active.as_ref())
    }

    pub(crate) fn classify(
        &self,
        x: usize,
        y: usize,
    ) -> Result<RenderCell, crate::CellOutOfBoundsError> {
        RenderCell::classify(&self.board, self.active.as_ref(), x, y)
    }

    #[cfg(test)]
    pub(crate) fn replace_board(&mut self, board: Playfield) {
        self.board = board;
    }

    fn ensure_playing(&self) -> Result<(), RejectReason> {
        if self.game_over {
            return Err(RejectReason::GameOver);
        }
        Ok(())
    }

    fn current_piece(&self) -> Result<Piece, RejectReason> {
        self.ensure_playing()?;
        self.active.ok_or(RejectReason::NoActivePiece)
    }

    fn set_active_piece(&mut self, piece: Piece) -> Result<(), PieceCollisionError> {
        if self.board.is_colliding(piece) {
            return Err(PieceCollisionError);
        }
        self.active = Some(piece);
        Ok(())
    }

    /// Spawns the next piece at the spawn anchor, replacing any active piece.
    ///
    /// A blocked spawn area tops the game out.
    pub fn new_piece(&mut self) -> Result<(), RejectReason> {
        self.ensure_playing()?;
        let piece = Piece::new(self.source.pop_next());
        if self.board.is_colliding(piece) {
            info!(%piece, "spawn area blocked, game over");
            self.active = None;
            self.game_over = true;
            return Err(RejectReason::SpawnBlocked);
        }
        self.active = Some(piece);
        Ok(())
    }

    pub fn move_left(&mut self) -> Result<(), RejectReason> {
        let piece = self.current_piece()?.left().ok_or(PieceCollisionError)?;
        Ok(self.set_active_piece(piece)?)
    }

    pub fn move_right(&mut self) -> Result<(), RejectReason> {
        let piece = self.current_piece()?.right().ok_or(PieceCollisionError)?;
        Ok(self.set_active_piece(piece)?)
    }

    /// Moves the piece down one row. A rejection means the piece has landed; it is
    /// not committed until [`Self::commit`].
    pub fn move_down(&mut self) -> Result<(), RejectReason> {
        let piece = self.current_piece()?.down().ok_or(PieceCollisionError)?;
        Ok(self.set_active_piece(piece)?)
    }

    pub fn rotate(&mut self) -> Result<(), RejectReason> {
        let piece = self
            .current_piece()?
            .rotated_with(&self.board, self.rotation)
            .ok_or(PieceCollisionError)?;
        self.active = Some(piece);
        Ok(())
    }

    /// Locks the active piece into the board.
    pub fn commit(&mut self) -> Result<(), RejectReason> {
        let piece = self.current_piece()?;
        self.board.commit_piece(piece);
        self.active = None;
        Ok(())
    }

    /// Starts a line-clear scan over a copy of the current state.
    pub fn begin_line_clear(&self) -> Result<LineClearScan, RejectReason> {
        self.ensure_playing()?;
        Ok(LineClearScan {
            board: self.board.clone(),
            piece: self.active,
            row: 0,
            cleared: 0,
        })
    }

    /// Publishes a finished scan and returns the number of cleared rows.
    pub fn finish_line_clear(&mut self, scan: LineClearScan) -> usize {
        debug_assert!(scan.is_finished(), "publishing an unfinished line-clear scan");
        self.board = scan.board;
        self.active = scan.piece;
        scan.cleared
    }

    /// Runs a complete line clear in one call.
    pub fn clear_lines(&mut self) -> Result<usize, RejectReason> {
        let mut scan = self.begin_line_clear()?;
        while !scan.step() {}
        Ok(self.finish_line_clear(scan))
    }

    /// Executes one command to completion.
    pub fn apply(&mut self, command: Command) -> Outcome {
        match command {
            Command::Nop => Outcome::Applied,
            Command::NewPiece => self.new_piece().into(),
            Command::MoveDown => self.move_down().into(),
            Command::MoveLeft => self.move_left().into(),
            Command::MoveRight => self.move_right().into(),
            Command::Rotate => self.rotate().into(),
            Command::Commit => self.commit().into(),
            Command::Check => match self.clear_lines() {
                Ok(cleared) => Outcome::LinesCleared(cleared),
                Err(reason) => Outcome::Rejected(reason),
            },
        }
    }
}

/// An in-progress `Check`, one row per [`step`](Self::step).
///
/// The scan walks the grid top to bottom. A full row is removed and the same index
/// is tested again, since the row above has just moved into it.
///
/// An active piece lying entirely above a removed row moves down with the rows
/// above it. No piece cell can sit inside a full row, so the piece never ends up
/// overlapping committed cells.
#[derive(Debug, Clone)]
pub struct LineClearScan {
    board: Playfield,
    piece: Option<Piece>,
    row: usize,
    cleared: usize,
}

impl LineClearScan {
    /// Performs one scan step and returns `true` once the whole grid is scanned.
    pub fn step(&mut self) -> bool {
        if self.row >= GRID_HEIGHT {
            return true;
        }
        if self.board.grid_row(self.row).is_grid_filled() {
            self.board.remove_row(self.row);
            self.cleared += 1;
            if let Some(piece) = self.piece {
                let row = self.row;
                if piece.grid_cells().iter().all(|&(_, y)| y < row) {
                    self.piece = piece.down();
                    debug_assert!(
                        self.piece.is_some_and(|p| !self.board.is_colliding(p)),
                        "active piece overlaps the board after a row shift"
                    );
                }
            }
        } else {
            self.row += 1;
        }
        self.is_finished()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.row >= GRID_HEIGHT
    }

    /// Rows removed so far.
    #[must_use]
    pub fn cleared(&self) -> usize {
        self.cleared
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{PiecePosition, PieceRotation};

    use super::*;

    fn field_with(kinds: &[PieceKind]) -> PlateField {
        PlateField::new(&EngineConfig::with_sequence(kinds.iter().copied())).unwrap()
    }

    fn drop_and_commit(field: &mut PlateField) {
        while field.move_down().is_ok() {}
        field.commit().unwrap();
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let result = PlateField::new(&EngineConfig::with_sequence([]));
        assert!(matches!(result, Err(ConfigError::EmptySequence)));
    }

    #[test]
    fn test_new_piece_spawns_at_anchor() {
        let mut field = field_with(&[PieceKind::T]);
        field.new_piece().unwrap();
        assert_eq!(field.active_piece(), Some(&Piece::new(PieceKind::T)));
    }

    #[test]
    fn test_new_piece_replaces_active_piece() {
        let mut field = field_with(&[PieceKind::T, PieceKind::O]);
        field.new_piece().unwrap();
        field.move_down().unwrap();
        field.new_piece().unwrap();
        assert_eq!(field.active_piece(), Some(&Piece::new(PieceKind::O)));
    }

    #[test]
    fn test_commands_without_piece_are_rejected() {
        let mut field = field_with(&[PieceKind::T]);
        for result in [
            field.move_down(),
            field.move_left(),
            field.move_right(),
            field.rotate(),
            field.commit(),
        ] {
            assert_eq!(result, Err(RejectReason::NoActivePiece));
        }
        assert_eq!(field.board(), &Playfield::INITIAL);
    }

    #[test]
    fn test_walls_stop_horizontal_moves() {
        let mut field = field_with(&[PieceKind::I]);
        field.new_piece().unwrap();
        let mut moves = 0;
        while field.move_left().is_ok() {
            moves += 1;
        }
        // Horizontal I spawns in columns 6-9.
        assert_eq!(moves, 6);
        assert_eq!(
            field.move_left(),
            Err(RejectReason::Blocked(PieceCollisionError))
        );
        let cols: Vec<_> = field.active_piece().unwrap().grid_cells().iter().map(|c| c.0).collect();
        assert_eq!(cols, [0, 1, 2, 3]);

        while field.move_right().is_ok() {}
        let cols: Vec<_> = field.active_piece().unwrap().grid_cells().iter().map(|c| c.0).collect();
        assert_eq!(cols, [12, 13, 14, 15]);
    }

    #[test]
    fn test_move_down_stops_on_floor_without_commit() {
        let mut field = field_with(&[PieceKind::O]);
        field.new_piece().unwrap();
        let mut drops = 0;
        while field.move_down().is_ok() {
            drops += 1;
        }
        assert_eq!(drops, 30);
        assert!(field.active_piece().is_some());
        assert_eq!(field.board().committed_count(), 0);
    }

    #[test]
    fn test_pieces_stack() {
        let mut field = field_with(&[PieceKind::O]);
        for _ in 0..3 {
            field.new_piece().unwrap();
            drop_and_commit(&mut field);
        }
        assert_eq!(
            field.board().to_ascii().lines().rev().take(7).collect::<Vec<_>>(),
            [
                "......##........",
                "......##........",
                "......##........",
                "......##........",
                "......##........",
                "......##........",
                "................",
            ]
        );
    }

    #[test]
    fn test_rotation_blocked_in_place_is_rejected() {
        let mut field = field_with(&[PieceKind::I]);
        field.new_piece().unwrap();
        field.rotate().unwrap();
        while field.move_left().is_ok() {}
        let before = *field.active_piece().unwrap();
        assert_eq!(before.grid_cells()[0].0, 0);
        assert_eq!(
            field.rotate(),
            Err(RejectReason::Blocked(PieceCollisionError))
        );
        assert_eq!(field.active_piece(), Some(&before));
    }

    #[test]
    fn test_rotation_with_simple_kick() {
        let config = EngineConfig {
            rotation: RotationPolicy::SimpleKick,
            ..EngineConfig::with_sequence([PieceKind::I])
        };
        let mut field = PlateField::new(&config).unwrap();
        field.new_piece().unwrap();
        field.rotate().unwrap();
        while field.move_left().is_ok() {}
        field.move_right().unwrap();
        // Vertical I in column 1: in place the bar needs column -1, a kick right fits.
        field.rotate().unwrap();
        let piece = field.active_piece().unwrap();
        assert_eq!(piece.rotation().index(), 0);
        assert!(!field.board().is_colliding(*piece));
    }

    #[test]
    fn test_spawn_blocked_tops_out() {
        let mut field = field_with(&[PieceKind::O]);
        let mut spawned = 0;
        while field.new_piece().is_ok() {
            drop_and_commit(&mut field);
            spawned += 1;
        }
        // 32 rows hold 16 O-pieces in one column.
        assert_eq!(spawned, 16);
        assert!(field.is_game_over());
        assert_eq!(field.active_piece(), None);

        for command in Command::ALL.into_iter().filter(|c| c.is_gameplay()) {
            assert_eq!(
                field.apply(command),
                Outcome::Rejected(RejectReason::GameOver),
                "{command:?}"
            );
        }
        assert_eq!(field.apply(Command::Nop), Outcome::Applied);

        field.reset();
        assert!(!field.is_game_over());
        assert_eq!(field.board(), &Playfield::INITIAL);
        field.new_piece().unwrap();
    }

    #[test]
    fn test_clear_lines_moves_piece_above_cleared_row() {
        let mut field = field_with(&[PieceKind::T]);
        field.board = Playfield::from_ascii(
            r"
            ################
            ",
        );
        field.new_piece().unwrap();
        let before = *field.active_piece().unwrap();
        assert_eq!(field.clear_lines(), Ok(1));
        assert_eq!(field.board(), &Playfield::INITIAL);
        assert_eq!(field.active_piece(), before.down().as_ref());
    }

    #[test]
    fn test_clear_lines_keeps_piece_below_cleared_row() {
        let mut field = field_with(&[PieceKind::O]);
        field.board = Playfield::from_ascii(
            r"
            ################
            ................
            ................
            ................
            ",
        );
        let piece = Piece::with_placement(
            PieceKind::O,
            PieceRotation::default(),
            PiecePosition::new(8, 32),
        )
        .unwrap();
        field.active = Some(piece);
        assert_eq!(field.clear_lines(), Ok(1));
        assert_eq!(field.board().committed_count(), 0);
        assert_eq!(field.active_piece(), Some(&piece));
    }

    #[test]
    fn test_line_clear_scan_is_stepwise() {
        let mut field = field_with(&[PieceKind::O]);
        field.board = Playfield::from_ascii(
            r"
            ################
            #...............
            ################
            ",
        );
        let mut scan = field.begin_line_clear().unwrap();
        let mut steps = 1;
        while !scan.step() {
            steps += 1;
        }
        // 32 row advances plus 2 removals.
        assert_eq!(steps, GRID_HEIGHT + 2);
        assert_eq!(scan.cleared(), 2);
        // Nothing is visible until the scan is published.
        assert_eq!(field.board().full_rows().len(), 2);
        assert_eq!(field.finish_line_clear(scan), 2);
        assert_eq!(
            field.board(),
            &Playfield::from_ascii(
                r"
                #...............
                "
            )
        );
    }
}
