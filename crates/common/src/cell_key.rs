use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::MapRect;

/// Deepest zoom accepted when parsing keys or converting from XYZ coordinates.
pub const MAX_ZOOM: usize = 32;

/// One step down the quadtree.
///
/// The discriminant doubles as the quadkey digit: bit 0 selects the column,
/// bit 1 selects the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn digit(self) -> u8 {
        self as u8
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Quadrant::TopLeft),
            1 => Some(Quadrant::TopRight),
            2 => Some(Quadrant::BottomLeft),
            3 => Some(Quadrant::BottomRight),
            _ => None,
        }
    }

    fn column(self) -> u64 {
        (self.digit() & 1) as u64
    }

    fn row(self) -> u64 {
        (self.digit() >> 1) as u64
    }
}

/// Errors from parsing or constructing cell keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellKeyError {
    #[error("invalid quadrant digit {ch:?} at position {position}")]
    InvalidDigit { ch: char, position: usize },
    #[error("zoom {zoom} exceeds maximum {MAX_ZOOM}")]
    ZoomTooDeep { zoom: usize },
    #[error("tile ({x}, {y}) is outside the {zoom}-level grid")]
    OutOfRange { x: u64, y: u64, zoom: usize },
}

/// Column/row/zoom address of a cell in the slippy-map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileXyz {
    pub x: u64,
    pub y: u64,
    pub z: usize,
}

/// Quadtree path from the root cell. Its length is the zoom depth.
///
/// Ordering is lexicographic over the path, so an ancestor always sorts
/// before its descendants.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellKey(Vec<Quadrant>);

impl CellKey {
    /// The whole map. Also the "full area" path inside a composite.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_quadrants(quadrants: impl IntoIterator<Item = Quadrant>) -> Self {
        Self(quadrants.into_iter().collect())
    }

    pub fn quadrants(&self) -> &[Quadrant] {
        &self.0
    }

    pub fn zoom(&self) -> usize {
        self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `other` is a prefix of this key (an ancestor, or the key itself).
    pub fn starts_with(&self, other: &CellKey) -> bool {
        self.0.starts_with(&other.0)
    }

    /// True when this key is a prefix of `other`.
    pub fn is_ancestor_of(&self, other: &CellKey) -> bool {
        other.starts_with(self)
    }

    /// The path left after removing `ancestor` from the front of this key.
    ///
    /// Returns `None` when `ancestor` is not a prefix.
    pub fn sub_key(&self, ancestor: &CellKey) -> Option<CellKey> {
        self.0
            .strip_prefix(ancestor.0.as_slice())
            .map(|rest| CellKey(rest.to_vec()))
    }

    /// Concatenate `suffix` below this key.
    pub fn join(&self, suffix: &CellKey) -> CellKey {
        let mut path = Vec::with_capacity(self.0.len() + suffix.0.len());
        path.extend_from_slice(&self.0);
        path.extend_from_slice(&suffix.0);
        CellKey(path)
    }

    pub fn child(&self, quadrant: Quadrant) -> CellKey {
        let mut path = self.0.clone();
        path.push(quadrant);
        CellKey(path)
    }

    pub fn children(&self) -> [CellKey; 4] {
        Quadrant::ALL.map(|q| self.child(q))
    }

    pub fn parent(&self) -> Option<CellKey> {
        self.0
            .split_last()
            .map(|(_, rest)| CellKey(rest.to_vec()))
    }

    /// Bing-style quadkey string, identical to the `Display` form.
    pub fn quadkey(&self) -> String {
        self.to_string()
    }

    /// Column, row and zoom of this cell.
    pub fn to_xyz(&self) -> TileXyz {
        let (x, y) = self.0.iter().fold((0u64, 0u64), |(x, y), q| {
            ((x << 1) | q.column(), (y << 1) | q.row())
        });
        TileXyz {
            x,
            y,
            z: self.zoom(),
        }
    }

    pub fn from_xyz(x: u64, y: u64, zoom: usize) -> Result<CellKey, CellKeyError> {
        if zoom > MAX_ZOOM {
            return Err(CellKeyError::ZoomTooDeep { zoom });
        }
        let side = 1u64 << zoom;
        if x >= side || y >= side {
            return Err(CellKeyError::OutOfRange { x, y, zoom });
        }
        let path = (0..zoom)
            .rev()
            .map(|bit| {
                let digit = (((y >> bit) & 1) << 1) | ((x >> bit) & 1);
                Quadrant::ALL[digit as usize]
            })
            .collect();
        Ok(CellKey(path))
    }

    /// Sub-rectangle of `map_rect` covered by this cell.
    pub fn tile_rect(&self, map_rect: MapRect) -> MapRect {
        self.0.iter().fold(map_rect, |rect, q| {
            let half = rect.dimension * 0.5;
            let offset = glam::DVec2::new(
                half.x * q.column() as f64,
                half.y * q.row() as f64,
            );
            MapRect::new(rect.origin + offset, half)
        })
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in &self.0 {
            write!(f, "{}", q.digit())?;
        }
        Ok(())
    }
}

impl fmt::Debug for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellKey(\"{self}\")")
    }
}

impl FromStr for CellKey {
    type Err = CellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s
            .chars()
            .enumerate()
            .map(|(position, ch)| {
                ch.to_digit(4)
                    .and_then(|d| Quadrant::from_digit(d as u8))
                    .ok_or(CellKeyError::InvalidDigit { ch, position })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if path.len() > MAX_ZOOM {
            return Err(CellKeyError::ZoomTooDeep { zoom: path.len() });
        }
        Ok(CellKey(path))
    }
}

impl TryFrom<String> for CellKey {
    type Error = CellKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellKey> for String {
    fn from(key: CellKey) -> Self {
        key.to_string()
    }
}
