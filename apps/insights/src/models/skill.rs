use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Programming,
    Frontend,
    Backend,
    Database,
    Devops,
    Soft,
    Other,
}

/// A user's standing on one skill. `level`, `target_level` and `progress` are 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecord {
    pub name: String,
    pub level: u8,
    pub target_level: u8,
    pub category: SkillCategory,
    pub last_practiced: Option<DateTime<Utc>>,
    pub progress: u8,
}

impl SkillRecord {
    /// `target_level - level`, zero when the target is already met.
    pub fn gap(&self) -> u8 {
        self.target_level.saturating_sub(self.level)
    }
}
