//! Core types for the intersection simulation
//!
//! Lane identifiers, light colours and the per-side containers shared by
//! every other module.

use std::fmt;

/// Minimum spacing between two cars released from the same entrance lane
pub const RELEASE_SPACING: f64 = 2.0;

/// One side of the rectangular intersection
///
/// Sides are listed clockwise starting at the top. Cars arriving from the
/// left or right travel horizontally, cars from the top or bottom vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// All sides in the fixed evaluation order
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn index(self) -> usize {
        match self {
            Side::Top => 0,
            Side::Right => 1,
            Side::Bottom => 2,
            Side::Left => 3,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    pub fn opposite(self) -> Side {
        Side::ALL[(self.index() + 2) % 4]
    }

    /// Side a car arriving from `self` leaves through when turning right
    pub fn right_turn(self) -> Side {
        Side::ALL[(self.index() + 3) % 4]
    }

    /// Side a car arriving from `self` leaves through when turning left
    pub fn left_turn(self) -> Side {
        Side::ALL[(self.index() + 1) % 4]
    }

    pub fn letter(self) -> char {
        match self {
            Side::Top => 'T',
            Side::Right => 'R',
            Side::Bottom => 'B',
            Side::Left => 'L',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Stable identifier of a lane: its side and its position on that side
///
/// Entrance and exit lanes use separate id spaces; whether an id names an
/// entrance or an exit follows from where it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId {
    pub side: Side,
    pub index: usize,
}

impl LaneId {
    pub fn new(side: Side, index: usize) -> Self {
        Self { side, index }
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side, self.index)
    }
}

/// Colour shown to an approach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

impl LightColor {
    pub fn letter(self) -> char {
        match self {
            LightColor::Red => 'R',
            LightColor::Yellow => 'Y',
            LightColor::Green => 'G',
        }
    }
}

/// Which movement direction currently holds green
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    HorizontalGreen,
    VerticalGreen,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::HorizontalGreen => Phase::VerticalGreen,
            Phase::VerticalGreen => Phase::HorizontalGreen,
        }
    }

    /// The per-side colours shown during this phase
    pub fn mapping(self) -> LightMapping {
        let (horizontal, vertical) = match self {
            Phase::HorizontalGreen => (LightColor::Green, LightColor::Red),
            Phase::VerticalGreen => (LightColor::Red, LightColor::Green),
        };
        let mut colors = [LightColor::Red; 4];
        for side in Side::ALL {
            colors[side.index()] = if side.is_horizontal() {
                horizontal
            } else {
                vertical
            };
        }
        LightMapping { colors }
    }
}

/// Light colour for every side, as broadcast on a phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightMapping {
    colors: [LightColor; 4],
}

impl LightMapping {
    pub fn color(&self, side: Side) -> LightColor {
        self.colors[side.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, LightColor)> + '_ {
        Side::ALL.into_iter().map(|side| (side, self.color(side)))
    }
}

impl fmt::Display for LightMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (side, color)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", side, color.letter())?;
        }
        Ok(())
    }
}

/// A car waiting on an entrance lane or crossing into an exit lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Car {
    pub destination: LaneId,
    /// Simulated seconds the car occupies its exit lane
    pub crossing_duration: f64,
}

impl Car {
    pub fn new(destination: LaneId, crossing_duration: f64) -> Self {
        Self {
            destination,
            crossing_duration,
        }
    }
}

/// Queue lengths seen by the light, split by movement direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueuePressure {
    pub horizontal: usize,
    pub vertical: usize,
}

/// Lanes of one kind, grouped by side and ordered by index
#[derive(Debug, Clone)]
pub struct LaneSet<T> {
    sides: [Vec<T>; 4],
}

impl<T> LaneSet<T> {
    /// Build a set with `count(side)` lanes per side, created by `make`
    pub fn build(count: impl Fn(Side) -> usize, mut make: impl FnMut(LaneId) -> T) -> Self {
        let sides = Side::ALL.map(|side| {
            (0..count(side))
                .map(|index| make(LaneId::new(side, index)))
                .collect()
        });
        Self { sides }
    }

    pub fn get(&self, id: LaneId) -> Option<&T> {
        self.sides[id.side.index()].get(id.index)
    }

    pub fn get_mut(&mut self, id: LaneId) -> Option<&mut T> {
        self.sides[id.side.index()].get_mut(id.index)
    }

    pub fn side(&self, side: Side) -> &[T] {
        &self.sides[side.index()]
    }

    pub fn ids(&self, side: Side) -> Vec<LaneId> {
        (0..self.sides[side.index()].len())
            .map(|index| LaneId::new(side, index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sides.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate in side order, then index order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.sides.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.sides.iter_mut().flatten()
    }
}
