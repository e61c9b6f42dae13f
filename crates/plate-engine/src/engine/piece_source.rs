use std::{collections::VecDeque, fmt::Write as _};

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
    seq::SliceRandom,
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PieceKind;

use super::config::{ConfigError, PieceSelection};

/// Seed for deterministic piece generation.
///
/// A 128-bit seed for the bag shuffler's [`Pcg32`]. The same seed always yields the
/// same piece sequence, which is what makes [`reset`](crate::PlateController::reset)
/// reproducible. Serialises as a 32-character hex string.
///
/// # Example
///
/// ```
/// use plate_engine::engine::{PieceSeed, SevenBag};
/// use rand::Rng as _;
///
/// let seed: PieceSeed = rand::rng().random();
/// let mut a = SevenBag::with_seed(seed);
/// let mut b = SevenBag::with_seed(seed);
/// assert_eq!(a.pop_next(), b.pop_next());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSeed([u8; 16]);

impl PieceSeed {
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = u128::from_be_bytes(self.0);
        let mut hex_str = String::with_capacity(2 * self.0.len());
        write!(&mut hex_str, "{num:032x}").map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex_str)
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self::from_u128(num))
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

/// 7-bag randomiser.
///
/// Every run of seven draws (aligned to the bag boundary) contains each kind exactly
/// once. The bag is shuffled with a seeded [`Pcg32`].
#[derive(Debug, Clone)]
pub struct SevenBag {
    seed: PieceSeed,
    rng: Pcg32,
    bag: VecDeque<PieceKind>,
}

impl SevenBag {
    #[must_use]
    pub fn with_seed(seed: PieceSeed) -> Self {
        let mut this = Self {
            seed,
            rng: Pcg32::from_seed(seed.0),
            bag: VecDeque::with_capacity(PieceKind::LEN),
        };
        this.fill_bag();
        this
    }

    #[must_use]
    pub fn seed(&self) -> PieceSeed {
        self.seed
    }

    fn fill_bag(&mut self) {
        if self.bag.is_empty() {
            let mut new_bag = PieceKind::ALL;
            new_bag.shuffle(&mut self.rng);
            self.bag.extend(new_bag);
        }
    }

    /// Draws the next piece, refilling the bag when it runs out.
    ///
    /// # Panics
    ///
    /// Panics if the bag is empty, which the refill logic never allows.
    pub fn pop_next(&mut self) -> PieceKind {
        self.fill_bag();
        let next = self
            .bag
            .pop_front()
            .expect("piece bag should never be empty");
        self.fill_bag();
        next
    }

    /// Kind that the next [`Self::pop_next`] will return.
    ///
    /// # Panics
    ///
    /// Panics if the bag is empty, which the refill logic never allows.
    #[must_use]
    pub fn peek_next(&self) -> PieceKind {
        *self.bag.front().expect("piece bag should never be empty")
    }

    /// Pieces remaining in the current bag, in draw order.
    pub fn next_pieces(&self) -> impl Iterator<Item = PieceKind> + '_ {
        self.bag.iter().copied()
    }
}

/// Fixed cyclic piece sequence. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSequence {
    pieces: Vec<PieceKind>,
    next: usize,
}

impl PieceSequence {
    pub fn new(pieces: Vec<PieceKind>) -> Result<Self, ConfigError> {
        if pieces.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        Ok(Self { pieces, next: 0 })
    }

    pub fn pop_next(&mut self) -> PieceKind {
        let kind = self.pieces[self.next];
        self.next = (self.next + 1) % self.pieces.len();
        kind
    }

    #[must_use]
    pub fn peek_next(&self) -> PieceKind {
        self.pieces[self.next]
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }
}

/// Where `NewPiece` gets its next kind from.
#[derive(Debug, Clone)]
pub enum PieceSource {
    /// Shuffled 7-bag.
    SevenBag(SevenBag),
    /// Fixed cyclic sequence.
    Sequence(PieceSequence),
}

impl PieceSource {
    /// Builds the source described by `selection`.
    ///
    /// A bag without a configured seed draws one from the thread RNG here; the drawn
    /// seed is kept so that [`Self::restart`] replays the same sequence.
    pub fn from_selection(selection: &PieceSelection) -> Result<Self, ConfigError> {
        match selection {
            PieceSelection::SevenBag { seed } => Ok(Self::seven_bag(*seed)),
            PieceSelection::Sequence { pieces } => {
                Ok(PieceSource::Sequence(PieceSequence::new(pieces.clone())?))
            }
        }
    }

    /// A 7-bag source, seeded from the thread RNG when `seed` is `None`.
    #[must_use]
    pub fn seven_bag(seed: Option<PieceSeed>) -> Self {
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        PieceSource::SevenBag(SevenBag::with_seed(seed))
    }

    /// Draws the next piece kind.
    pub fn pop_next(&mut self) -> PieceKind {
        match self {
            PieceSource::SevenBag(bag) => bag.pop_next(),
            PieceSource::Sequence(sequence) => sequence.pop_next(),
        }
    }

    /// Kind that the next [`Self::pop_next`] will return.
    #[must_use]
    pub fn peek_next(&self) -> PieceKind {
        match self {
            PieceSource::SevenBag(bag) => bag.peek_next(),
            PieceSource::Sequence(sequence) => sequence.peek_next(),
        }
    }

    /// Rewinds to the start of the sequence.
    pub fn restart(&mut self) {
        match self {
            PieceSource::SevenBag(bag) => *bag = SevenBag::with_seed(bag.seed()),
            PieceSource::Sequence(sequence) => sequence.restart(),
        }
    }
}
