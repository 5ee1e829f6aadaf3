//! Hex coordinate system for the battlefield.
//!
//! Uses axial `(q, r)` coordinates. The third cube axis is implied as
//! `s = -q - r`, which is what makes the distance formula below work.

use serde::{Deserialize, Serialize};

/// Axial offsets of the six neighbours, clockwise from east.
/// Axial coordinate on the hex grid.
///
/// Used directly as the key of the battle registry, so two battles can
/// never be anchored on the same hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct HexCoord {
    /// Column axis
    pub q: i32,
    /// Row axis
    pub r: i32,
}

impl PartialOrd for HexCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HexCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Row-major ordering for deterministic iteration
        (self.r, self.q).cmp(&(other.r, other.q))
    }
}

impl HexCoord {
    /// Create a new hex coordinate.
    #[inline]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Distance to another hex in hex steps.
    ///
    /// `(|q1-q2| + |q1+r1-q2-r2| + |r1-r2|) / 2`
    pub fn distance(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dqr = (self.q + self.r - other.q - other.r).abs();
        let dr = (self.r - other.r).abs();
        ((dq + dqr + dr) / 2) as u32
    }

    /// Every hex at most `radius` steps away, including this one.
    pub fn hexes_in_radius(&self, radius: u32) -> Vec<HexCoord> {
        let r = radius as i32;
        let mut result = Vec::new();

        for dq in -r..=r {
            let lo = (-r).max(-dq - r);
            let hi = r.min(-dq + r);
            for dr in lo..=hi {
                result.push(HexCoord::new(self.q + dq, self.r + dr));
            }
        }

        result
    }

    /// String key `"q,r"`, used as the id of the battle anchored here.
    pub fn key(&self) -> String {
        format!("{},{}", self.q, self.r)
    }
}

impl From<(i32, i32)> for HexCoord {
    fn from((q, r): (i32, i32)) -> Self {
        Self::new(q, r)
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}
