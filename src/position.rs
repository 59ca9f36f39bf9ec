//! # Stream Positions
//!
//! Resumable offsets within upstream binlog streams, and the safety margin
//! applied to them before they are persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Offset units a persisted position is moved back by.
pub const SAFETY_MARGIN: i64 = 5000;

/// Per-stream resume positions keyed by node/stream id.
pub type Positions = BTreeMap<String, Position>;

/// Identifies the segment an offset is relative to
///
/// Historical checkpoints store a numeric segment index; named segments are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Suffix {
    Index(u32),
    Name(String),
}

impl Default for Suffix {
    fn default() -> Self {
        Suffix::Index(0)
    }
}

impl From<u32> for Suffix {
    fn from(index: u32) -> Self {
        Suffix::Index(index)
    }
}

impl From<&str> for Suffix {
    fn from(name: &str) -> Self {
        Suffix::Name(name.to_string())
    }
}

impl From<String> for Suffix {
    fn from(name: String) -> Self {
        Suffix::Name(name)
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suffix::Index(index) => write!(f, "{index}"),
            Suffix::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A resumable offset within one upstream stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "Suffix", alias = "suffix", default)]
    pub suffix: Suffix,
    #[serde(rename = "Offset", alias = "offset", default)]
    pub offset: i64,
}

impl Position {
    pub fn new(suffix: impl Into<Suffix>, offset: i64) -> Self {
        Self {
            suffix: suffix.into(),
            offset,
        }
    }

    /// Move the offset back by [`SAFETY_MARGIN`], flooring at the segment start.
    ///
    /// Replaying from slightly behind the certified point re-applies a few
    /// events after a crash but never skips one.
    pub fn with_safety_margin(&self) -> Self {
        let offset = if self.offset > SAFETY_MARGIN {
            self.offset - SAFETY_MARGIN
        } else {
            0
        };

        Self {
            suffix: self.suffix.clone(),
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.suffix, self.offset)
    }
}

/// Apply the safety margin to every stream in `positions`.
pub fn apply_safety_margin(positions: &Positions) -> Positions {
    positions
        .iter()
        .map(|(node_id, pos)| (node_id.clone(), pos.with_safety_margin()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_margin_above_threshold() {
        let pos = Position::new("a", 7000).with_safety_margin();
        assert_eq!(pos, Position::new("a", 2000));
    }

    #[test]
    fn test_margin_at_and_below_threshold() {
        assert_eq!(Position::new("a", 5000).with_safety_margin().offset, 0);
        assert_eq!(Position::new("a", 4999).with_safety_margin().offset, 0);
        assert_eq!(Position::new("a", 100).with_safety_margin().offset, 0);
        assert_eq!(Position::new(3u32, 0).with_safety_margin(), Position::new(3u32, 0));
    }

    #[test]
    fn test_margin_keeps_suffix_when_floored() {
        let pos = Position::new(7u32, 12).with_safety_margin();
        assert_eq!(pos.suffix, Suffix::Index(7));
    }

    #[test]
    fn test_apply_safety_margin_to_all_streams() {
        let mut positions = Positions::new();
        positions.insert("n1".to_string(), Position::new("a", 100));
        positions.insert("n2".to_string(), Position::new("b", 10_000));

        let adjusted = apply_safety_margin(&positions);
        assert_eq!(adjusted["n1"], Position::new("a", 0));
        assert_eq!(adjusted["n2"], Position::new("b", 5000));
        assert_eq!(adjusted.len(), 2);
    }

    #[test]
    fn test_position_json_shape() {
        let value = serde_json::to_value(Position::new(2u32, 42)).unwrap();
        assert_eq!(value, json!({"Suffix": 2, "Offset": 42}));

        let value = serde_json::to_value(Position::new("binlog-0001", 7)).unwrap();
        assert_eq!(value, json!({"Suffix": "binlog-0001", "Offset": 7}));
    }

    #[test]
    fn test_position_accepts_lowercase_fields() {
        let pos: Position = serde_json::from_str(r#"{"suffix": 4, "offset": 99}"#).unwrap();
        assert_eq!(pos, Position::new(4u32, 99));
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new("a", 10).to_string(), "a:10");
        assert_eq!(Position::new(1u32, 0).to_string(), "1:0");
    }

    proptest! {
        #[test]
        fn prop_margin_never_ahead_and_never_negative(offset in 0i64..i64::MAX, suffix in 0u32..64) {
            let adjusted = Position::new(suffix, offset).with_safety_margin();
            prop_assert!(adjusted.offset >= 0);
            prop_assert!(adjusted.offset <= offset);
            prop_assert!(offset - adjusted.offset <= SAFETY_MARGIN);
            prop_assert_eq!(adjusted.suffix, Suffix::Index(suffix));
        }
    }
}
