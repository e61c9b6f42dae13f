/// The eight gameplay opcodes.
///
/// Raw values follow declaration order. Unknown raw values decode to
/// [`Command::Nop`].
///
/// ```
/// use plate_engine::Command;
///
/// assert_eq!(Command::from_raw(2), Command::MoveDown);
/// assert_eq!(Command::from_raw(0xff), Command::Nop);
/// assert_eq!(Command::Check.as_raw(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::IsVariant)]
#[repr(u8)]
pub enum Command {
    #[default]
    Nop = 0,
    NewPiece = 1,
    MoveDown = 2,
    MoveLeft = 3,
    MoveRight = 4,
    Rotate = 5,
    Commit = 6,
    Check = 7,
}

impl Command {
    pub const ALL: [Command; 8] = [
        Command::Nop,
        Command::NewPiece,
        Command::MoveDown,
        Command::MoveLeft,
        Command::MoveRight,
        Command::Rotate,
        Command::Commit,
        Command::Check,
    ];

    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .unwrap_or(Command::Nop)
    }

    #[must_use]
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Whether the command acts on the game and is therefore refused after a top-out.
    #[must_use]
    pub const fn is_gameplay(self) -> bool {
        !matches!(self, Command::Nop)
    }
}

impl From<u8> for Command {
    fn from(raw: u8) -> Self {
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_follow_declaration_order() {
        for (raw, command) in Command::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(command.as_raw()), raw);
            assert_eq!(Command::from_raw(command.as_raw()), command);
        }
    }

    #[test]
    fn test_unknown_raw_is_nop() {
        for raw in 8..=u8::MAX {
            assert_eq!(Command::from(raw), Command::Nop);
        }
    }
}
