//! Lock modes and their compatibility matrix.
//!
//! ```text
//!  granted \ requested │ NL  IS  IX  S   SIX X
//! ─────────────────────┼────────────────────────
//!          NL          │ ✓   ✓   ✓   ✓   ✓   ✗
//!          IS          │ ✓   ✓   ✗   ✓   ✗   ✗
//!          IX          │ ✓   ✗   ✗   ✗   ✗   ✗
//!          S           │ ✓   ✓   ✗   ✓   ✗   ✗
//!          SIX         │ ✓   ✗   ✗   ✗   ✗   ✗
//!          X           │ ✗   ✗   ✗   ✗   ✗   ✗
//! ```
//!
//! The matrix is keyed by (granted, requested) and is not symmetric.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity/intent level of a resource lock, from no-lock to exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LockMode {
    /// No lock.
    NL = 0,
    /// Intention shared.
    IS = 1,
    /// Intention exclusive.
    IX = 2,
    /// Shared.
    S = 3,
    /// Shared with intention exclusive.
    SIX = 4,
    /// Exclusive.
    X = 5,
}

#[rustfmt::skip]
const COMPATIBILITY: [[bool; 6]; 6] = [
    //  NL     IS     IX     S      SIX    X
    [true,  true,  true,  true,  true,  false], // NL
    [true,  true,  false, true,  false, false], // IS
    [true,  false, false, false, false, false], // IX
    [true,  true,  false, true,  false, false], // S
    [true,  false, false, false, false, false], // SIX
    [false, false, false, false, false, false], // X
];

impl LockMode {
    /// All modes in ascending order.
    pub const ALL: [LockMode; 6] = [
        LockMode::NL,
        LockMode::IS,
        LockMode::IX,
        LockMode::S,
        LockMode::SIX,
        LockMode::X,
    ];

    /// Returns true if `requested` may be granted while `self` is held.
    #[must_use]
    pub const fn permits(self, requested: LockMode) -> bool {
        COMPATIBILITY[self as usize][requested as usize]
    }

    /// Returns the short name used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LockMode::NL => "NL",
            LockMode::IS => "IS",
            LockMode::IX => "IX",
            LockMode::S => "S",
            LockMode::SIX => "SIX",
            LockMode::X => "X",
        }
    }

    /// Returns the mode for a discriminant, if it is in range.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LockMode::NL),
            1 => Some(LockMode::IS),
            2 => Some(LockMode::IX),
            3 => Some(LockMode::S),
            4 => Some(LockMode::SIX),
            5 => Some(LockMode::X),
            _ => None,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown lock mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lock mode: {0}")]
pub struct ParseLockModeError(pub String);

impl FromStr for LockMode {
    type Err = ParseLockModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseLockModeError(s.to_string()))
    }
}
