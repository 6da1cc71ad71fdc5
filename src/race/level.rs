//! Level Table
//!
//! Each difficulty fixes the lap count and the time limit of a race.
//! The table can be loaded from JSON so the game can ship it as data.

use std::time::Duration;
use serde::{Serialize, Deserialize};

/// Track difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
#[derive(Default)]
pub enum LevelType {
    /// Short race, generous clock.
    #[default]
    Easy = 0,
    /// Medium race.
    Medium = 1,
    /// Long race, tight clock.
    Hard = 2,
}

impl LevelType {
    /// All levels in table order.
    pub const ALL: [LevelType; 3] = [LevelType::Easy, LevelType::Medium, LevelType::Hard];

    /// Built-in details for this level.
    pub fn details(self) -> LevelDetails {
        match self {
            LevelType::Easy => LevelDetails { laps: 3, time_secs: 90 },
            LevelType::Medium => LevelDetails { laps: 4, time_secs: 100 },
            LevelType::Hard => LevelDetails { laps: 5, time_secs: 110 },
        }
    }
}

/// Race parameters for one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDetails {
    /// Laps to win.
    pub laps: u32,
    /// Seconds on the clock.
    #[serde(rename = "time")]
    pub time_secs: u32,
}

impl LevelDetails {
    /// Time limit as a `Duration`.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_secs as u64)
    }
}

/// Level details indexed by [`LevelType`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelTable {
    levels: Vec<LevelDetails>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            levels: LevelType::ALL.iter().map(|level| level.details()).collect(),
        }
    }
}

impl LevelTable {
    /// Parse a JSON array of `{"laps": .., "time": ..}` objects.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Details for a level; missing entries fall back to the built-in table.
    pub fn get(&self, level: LevelType) -> LevelDetails {
        self.levels
            .get(level as usize)
            .copied()
            .unwrap_or_else(|| level.details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_levels_get_harder() {
        let easy = LevelType::Easy.details();
        let hard = LevelType::Hard.details();
        assert!(hard.laps > easy.laps);
        assert_eq!(easy.time_limit(), Duration::from_secs(90));
    }

    #[test]
    fn test_table_from_json() {
        let table = LevelTable::from_json(r#"[{"laps": 2, "time": 45}, {"laps": 6, "time": 200}]"#).unwrap();
        assert_eq!(table.get(LevelType::Easy), LevelDetails { laps: 2, time_secs: 45 });
        assert_eq!(table.get(LevelType::Medium).laps, 6);
        // Not in the file
        assert_eq!(table.get(LevelType::Hard), LevelType::Hard.details());
    }

    #[test]
    fn test_default_table_json_roundtrip() {
        let table = LevelTable::default();
        let json = table.to_json().unwrap();
        assert!(json.contains("\"time\":90"));
        assert_eq!(LevelTable::from_json(&json).unwrap(), table);
    }

    #[test]
    fn test_level_type_names() {
        let json = serde_json::to_string(&LevelType::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
