//! Geometric types for screen regions and desktop coordinates

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A point in absolute (multi-monitor) desktop coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangular area of the desktop.
///
/// Regions produced by selection are never mutated; a new selection replaces
/// the stored value wholesale. Serialized as `[left, top, width, height]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(i32, i32, i32, i32)", into = "(i32, i32, i32, i32)")]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// Create a new region from its top-left corner and size
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Normalized bounding box of two corner points, whatever the drag direction
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Whether both sides reach `min` pixels
    pub fn is_at_least(&self, min: i32) -> bool {
        self.width >= min && self.height >= min
    }

    /// Calculate the intersection of two regions
    pub fn intersect(&self, other: Region) -> Option<Region> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left < right && top < bottom {
            Some(Region::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }

    /// Smallest region containing both
    pub fn union(&self, other: Region) -> Region {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Region::new(left, top, right - left, bottom - top)
    }

    /// Translate the region by the given offset
    pub fn translate(&self, x: i32, y: i32) -> Region {
        Region {
            left: self.left + x,
            top: self.top + y,
            ..*self
        }
    }

    /// Convert to dimensions (NonZeroU32 width and height)
    pub fn dimensions(self) -> Option<RectDimension> {
        let width = NonZeroU32::new(u32::try_from(self.width).ok()?)?;
        let height = NonZeroU32::new(u32::try_from(self.height).ok()?)?;
        Some(RectDimension { width, height })
    }
}

/// Stored and typed regions must cover at least one pixel
impl TryFrom<(i32, i32, i32, i32)> for Region {
    type Error = ParseRegionError;

    fn try_from((left, top, width, height): (i32, i32, i32, i32)) -> Result<Self, Self::Error> {
        if width > 0 && height > 0 {
            Ok(Region::new(left, top, width, height))
        } else {
            Err(ParseRegionError(format!("{left},{top},{width},{height}")))
        }
    }
}

impl From<Region> for (i32, i32, i32, i32) {
    fn from(r: Region) -> Self {
        (r.left, r.top, r.width, r.height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected LEFT,TOP,WIDTH,HEIGHT with positive size, got {0:?}")]
pub struct ParseRegionError(String);

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRegionError(s.to_string());
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;
        match parts.as_slice() {
            &[left, top, width, height] => {
                Region::try_from((left, top, width, height)).map_err(|_| err())
            }
            _ => Err(err()),
        }
    }
}

/// Non-zero dimensions of a region
#[derive(Clone, Copy, Debug)]
pub struct RectDimension {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

impl RectDimension {
    /// Get the width as u32
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    /// Get the height as u32
    pub fn height(&self) -> u32 {
        self.height.get()
    }
}

/// Bounding box of every connected display.
///
/// Monitors left or above the primary have negative origins, so the result
/// can start at negative coordinates.
pub fn virtual_desktop(monitors: &[Region]) -> Option<Region> {
    let (first, rest) = monitors.split_first()?;
    Some(rest.iter().fold(*first, |acc, m| acc.union(*m)))
}
