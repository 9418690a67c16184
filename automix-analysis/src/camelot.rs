//! Camelot wheel notation for harmonic mixing
//!
//! Keys are written 1A-12B: the number is the position on the wheel,
//! 'A' marks minor and 'B' major. Relative major/minor share a number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a Camelot code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Camelot code is empty")]
    Empty,
    #[error("Camelot code must end in A or B: {0:?}")]
    BadLetter(String),
    #[error("Camelot number must be 1-12: {0:?}")]
    BadNumber(String),
}

/// Camelot wheel key (1A-12B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CamelotKey {
    /// Position on the wheel (1-12)
    number: u8,
    /// true = B (major), false = A (minor)
    is_major: bool,
}

impl CamelotKey {
    /// Create a key; `None` if `number` is outside 1-12
    pub fn new(number: u8, is_major: bool) -> Option<Self> {
        (1..=12)
            .contains(&number)
            .then_some(Self { number, is_major })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn is_major(&self) -> bool {
        self.is_major
    }

    /// Letter on the wheel: 'A' (minor) or 'B' (major)
    pub fn letter(&self) -> char {
        if self.is_major {
            'B'
        } else {
            'A'
        }
    }

    /// Check if two keys mix harmonically
    ///
    /// Adjacent means one of:
    /// 1. Same key (8A - 8A)
    /// 2. Same number, other letter, i.e. relative major/minor (8A - 8B)
    /// 3. Number one step around the wheel, same letter (8A - 9A, 12A - 1A)
    pub fn is_adjacent(&self, other: &CamelotKey) -> bool {
        if self.number == other.number {
            return true;
        }
        self.is_major == other.is_major && self.steps_to(other) == 1
    }

    /// Distance around the wheel, counting a letter change as one step
    pub fn wheel_distance(&self, other: &CamelotKey) -> u8 {
        let mode = u8::from(self.is_major != other.is_major);
        self.steps_to(other) + mode
    }

    /// Shortest number distance around the 12-position wheel
    fn steps_to(&self, other: &CamelotKey) -> u8 {
        let d = self.number.abs_diff(other.number);
        d.min(12 - d)
    }
}

impl FromStr for CamelotKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let last = s.chars().last().ok_or(KeyParseError::Empty)?;
        let is_major = match last.to_ascii_uppercase() {
            'B' => true,
            'A' => false,
            _ => return Err(KeyParseError::BadLetter(s.to_string())),
        };

        let number: u8 = s[..s.len() - last.len_utf8()]
            .parse()
            .map_err(|_| KeyParseError::BadNumber(s.to_string()))?;

        Self::new(number, is_major).ok_or_else(|| KeyParseError::BadNumber(s.to_string()))
    }
}

impl TryFrom<String> for CamelotKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CamelotKey> for String {
    fn from(key: CamelotKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter())
    }
}

/// Parse-and-compare helper for codes held as strings.
///
/// Unparseable codes are never adjacent.
pub fn adjacent(a: &str, b: &str) -> bool {
    match (a.parse::<CamelotKey>(), b.parse::<CamelotKey>()) {
        (Ok(a), Ok(b)) => a.is_adjacent(&b),
        _ => false,
    }
}
