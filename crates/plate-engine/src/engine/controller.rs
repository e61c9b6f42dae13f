use tracing::{debug, info, trace};

use crate::{
    CellOutOfBoundsError, Command, ConfigError, Piece, PieceKind, Planes, Playfield, RenderBoard,
    RenderCell, RotationPolicy, core::GRID_HEIGHT,
};

use super::{
    EngineConfig,
    piece_source::PieceSource,
    plate_field::{LineClearScan, Outcome, PlateField},
};

/// Upper bound on ticks from raising `valid` until `done` is asserted.
///
/// One tick latches the opcode and one starts it. A `Check` then needs at most
/// one tick per row advance and one per removed row.
pub const MAX_COMMAND_TICKS: usize = 2 + 2 * GRID_HEIGHT;

/// Handshake state visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum ControllerState {
    /// Ready to latch a command.
    Idle,
    /// A command is in progress.
    Executing,
    /// `done` is asserted and stays asserted until `valid` is dropped.
    Done,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Latched(Command),
    Clearing(LineClearScan),
    Done,
}

/// Clocked front end of the engine.
///
/// The caller drives it the way a test bench drives the hardware block: put an
/// opcode on the bus, raise `valid`, [`tick`](Self::tick) until
/// [`is_done`](Self::is_done), tick once more, drop `valid` and tick again. The
/// [`execute`](Self::execute) helper runs that whole sequence.
///
/// Render queries read the last published state. A `Check` in progress works on a
/// private copy, so queries never see a half-cleared board.
///
/// # Example
///
/// ```
/// use plate_engine::{Command, EngineConfig, PieceKind, PlateController, RenderCell};
///
/// let mut engine = PlateController::new(EngineConfig::with_sequence([PieceKind::O]))?;
/// engine.execute(Command::NewPiece);
/// assert_eq!(engine.render_cell(6, 0), RenderCell::ActivePiece);
///
/// while engine.execute(Command::MoveDown).is_applied() {}
/// engine.execute(Command::Commit);
/// assert_eq!(engine.render_cell(6, 31), RenderCell::Committed);
/// # Ok::<(), plate_engine::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PlateController {
    field: PlateField,
    opcode: u8,
    valid: bool,
    phase: Phase,
    last_outcome: Option<Outcome>,
    cycle: u64,
}

impl Default for PlateController {
    fn default() -> Self {
        Self::from_field(PlateField::with_source(
            PieceSource::seven_bag(None),
            RotationPolicy::default(),
        ))
    }
}

impl PlateController {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_field(PlateField::new(&config)?))
    }

    fn from_field(field: PlateField) -> Self {
        Self {
            field,
            opcode: 0,
            valid: false,
            phase: Phase::Idle,
            last_outcome: None,
            cycle: 0,
        }
    }

    /// Synchronous reset: empty board, no piece, idle, inputs and `done` cleared.
    pub fn reset(&mut self) {
        info!(cycle = self.cycle, "engine reset");
        self.field.reset();
        self.opcode = 0;
        self.valid = false;
        self.phase = Phase::Idle;
        self.last_outcome = None;
    }

    /// Drives the opcode bus with a raw value. Unknown values execute as `Nop`.
    pub fn set_opcode(&mut self, raw: u8) {
        self.opcode = raw;
    }

    pub fn set_command(&mut self, command: Command) {
        self.opcode = command.as_raw();
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        match self.phase {
            Phase::Idle => ControllerState::Idle,
            Phase::Latched(_) | Phase::Clearing(_) => ControllerState::Executing,
            Phase::Done => ControllerState::Done,
        }
    }

    /// Outcome of the most recently completed command.
    #[must_use]
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Number of ticks since construction.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advances the controller by one clock cycle.
    pub fn tick(&mut self) {
        self.cycle += 1;
        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle if self.valid => {
                let command = Command::from_raw(self.opcode);
                trace!(cycle = self.cycle, ?command, raw = self.opcode, "command latched");
                Phase::Latched(command)
            }
            Phase::Idle => Phase::Idle,
            Phase::Latched(Command::Check) => match self.field.begin_line_clear() {
                Ok(scan) => Phase::Clearing(scan),
                Err(reason) => self.complete(Command::Check, Outcome::Rejected(reason)),
            },
            Phase::Latched(command) => {
                let outcome = self.field.apply(command);
                self.complete(command, outcome)
            }
            Phase::Clearing(mut scan) => {
                if scan.step() {
                    let cleared = self.field.finish_line_clear(scan);
                    self.complete(Command::Check, Outcome::LinesCleared(cleared))
                } else {
                    Phase::Clearing(scan)
                }
            }
            Phase::Done if self.valid => Phase::Done,
            Phase::Done => Phase::Idle,
        };
    }

    fn complete(&mut self, command: Command, outcome: Outcome) -> Phase {
        match outcome {
            Outcome::Rejected(reason) => {
                debug!(cycle = self.cycle, ?command, %reason, "command rejected");
            }
            Outcome::Applied | Outcome::LinesCleared(_) => {
                debug!(cycle = self.cycle, ?command, ?outcome, "command completed");
            }
        }
        self.last_outcome = Some(outcome);
        Phase::Done
    }

    /// Runs one full handshake for `command` and returns its outcome.
    ///
    /// An unfinished handshake is driven to completion first.
    ///
    /// # Panics
    ///
    /// Panics if the command does not complete within [`MAX_COMMAND_TICKS`].
    pub fn execute(&mut self, command: Command) -> Outcome {
        self.settle();

        self.set_command(command);
        self.set_valid(true);
        self.tick();
        let mut ticks = 1;
        while !self.is_done() {
            assert!(
                ticks <= MAX_COMMAND_TICKS,
                "{command:?} did not complete within {MAX_COMMAND_TICKS} ticks"
            );
            self.tick();
            ticks += 1;
        }
        self.tick();
        self.set_valid(false);
        self.tick();

        self.last_outcome
            .expect("a completed command always records its outcome")
    }

    /// Runs every command in order and returns their outcomes.
    pub fn execute_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Vec<Outcome> {
        commands
            .into_iter()
            .map(|command| self.execute(command))
            .collect()
    }

    fn settle(&mut self) {
        if matches!(self.phase, Phase::Latched(_) | Phase::Clearing(_)) {
            while !self.is_done() {
                self.tick();
            }
        }
        if self.is_done() {
            self.set_valid(false);
            self.tick();
        }
    }

    #[must_use]
    pub fn playfield(&self) -> &Playfield {
        self.field.board()
    }

    #[must_use]
    pub fn active_piece(&self) -> Option<&Piece> {
        self.field.active_piece()
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.field.is_game_over()
    }

    #[must_use]
    pub fn next_piece(&self) -> PieceKind {
        self.field.next_piece()
    }

    pub fn try_render_cell(&self, x: usize, y: usize) -> Result<RenderCell, CellOutOfBoundsError> {
        self.field.classify(x, y)
    }

    /// Classifies grid cell `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when `(x, y)` is outside the 16×32 grid. The render bus has no way to
    /// report a bad query.
    #[must_use]
    pub fn render_cell(&self, x: usize, y: usize) -> RenderCell {
        self.try_render_cell(x, y)
            .unwrap_or_else(|err| panic!("invalid render query: {err}"))
    }

    /// The two display outputs for grid cell `(x, y)`.
    #[must_use]
    pub fn planes(&self, x: usize, y: usize) -> Planes {
        self.render_cell(x, y).planes()
    }

    #[must_use]
    pub fn render_board(&self) -> RenderBoard {
        self.field.render_board()
    }
}
