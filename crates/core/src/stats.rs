//! Character attributes and partial updates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Value every attribute starts at.
pub const BASE_STAT: i32 = 10;

/// Highest value an attribute can be set to.
pub const MAX_STAT: i32 = 999;

/// Combat and personality attributes of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterStats {
    pub str: i32,
    pub dex: i32,
    pub int: i32,
    pub vit: i32,
    pub agi: i32,
    pub luk: i32,
    pub playfulness: i32,
    pub curiosity: i32,
    pub sensitivity: i32,
    pub awareness: i32,
    pub meddling: i32,
    pub pragmatism: i32,
    pub appetite: i32,
    pub anger_control: i32,
    pub clumsiness: i32,
}

impl Default for CharacterStats {
    fn default() -> Self {
        Self {
            str: BASE_STAT,
            dex: BASE_STAT,
            int: BASE_STAT,
            vit: BASE_STAT,
            agi: BASE_STAT,
            luk: BASE_STAT,
            playfulness: BASE_STAT,
            curiosity: BASE_STAT,
            sensitivity: BASE_STAT,
            awareness: BASE_STAT,
            meddling: BASE_STAT,
            pragmatism: BASE_STAT,
            appetite: BASE_STAT,
            anger_control: BASE_STAT,
            clumsiness: BASE_STAT,
        }
    }
}

/// Identifies one attribute, used by evolution requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Str,
    Dex,
    Int,
    Vit,
    Agi,
    Luk,
    Curiosity,
    Sensitivity,
    Awareness,
    Meddling,
    Pragmatism,
    Appetite,
}

impl Stat {
    pub fn name(self) -> &'static str {
        match self {
            Stat::Str => "str",
            Stat::Dex => "dex",
            Stat::Int => "int",
            Stat::Vit => "vit",
            Stat::Agi => "agi",
            Stat::Luk => "luk",
            Stat::Curiosity => "curiosity",
            Stat::Sensitivity => "sensitivity",
            Stat::Awareness => "awareness",
            Stat::Meddling => "meddling",
            Stat::Pragmatism => "pragmatism",
            Stat::Appetite => "appetite",
        }
    }
}

impl CharacterStats {
    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Str => self.str,
            Stat::Dex => self.dex,
            Stat::Int => self.int,
            Stat::Vit => self.vit,
            Stat::Agi => self.agi,
            Stat::Luk => self.luk,
            Stat::Curiosity => self.curiosity,
            Stat::Sensitivity => self.sensitivity,
            Stat::Awareness => self.awareness,
            Stat::Meddling => self.meddling,
            Stat::Pragmatism => self.pragmatism,
            Stat::Appetite => self.appetite,
        }
    }

    /// Overwrite every attribute present in `update`.
    pub fn merged(mut self, update: &StatsUpdate) -> Self {
        let fields = [
            (&mut self.str, update.str),
            (&mut self.dex, update.dex),
            (&mut self.int, update.int),
            (&mut self.vit, update.vit),
            (&mut self.agi, update.agi),
            (&mut self.luk, update.luk),
            (&mut self.playfulness, update.playfulness),
            (&mut self.curiosity, update.curiosity),
            (&mut self.sensitivity, update.sensitivity),
            (&mut self.awareness, update.awareness),
            (&mut self.meddling, update.meddling),
            (&mut self.pragmatism, update.pragmatism),
            (&mut self.appetite, update.appetite),
            (&mut self.anger_control, update.anger_control),
            (&mut self.clumsiness, update.clumsiness),
        ];
        for (slot, value) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        self
    }
}

/// Partial attribute update; absent fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StatsUpdate {
    #[validate(range(min = 0, max = 999))]
    pub str: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub dex: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub int: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub vit: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub agi: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub luk: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub playfulness: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub curiosity: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub sensitivity: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub awareness: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub meddling: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub pragmatism: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub appetite: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub anger_control: Option<i32>,
    #[validate(range(min = 0, max = 999))]
    pub clumsiness: Option<i32>,
}

impl StatsUpdate {
    pub fn checked(self) -> Result<Self, CoreError> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .into_keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            CoreError::Validation(format!(
                "Stats must be between 0 and {MAX_STAT}: {}",
                fields.join(", ")
            ))
        })?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn every_stat_starts_at_ten() {
        let stats = CharacterStats::default();
        let json = serde_json::to_value(stats).unwrap();
        let values = json.as_object().unwrap();
        assert_eq!(values.len(), 15);
        assert!(values.values().all(|v| v == BASE_STAT));
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let update: StatsUpdate =
            serde_json::from_value(serde_json::json!({ "agi": 15, "anger_control": 3 })).unwrap();
        let merged = CharacterStats::default().merged(&update.checked().unwrap());
        assert_eq!(merged.agi, 15);
        assert_eq!(merged.anger_control, 3);
        assert_eq!(merged.dex, BASE_STAT);
        assert_eq!(merged.get(Stat::Agi), 15);
    }

    #[test]
    fn out_of_range_and_unknown_fields_are_rejected() {
        let update = StatsUpdate {
            luk: Some(-1),
            int: Some(1000),
            ..StatsUpdate::default()
        };
        let err = update.checked().unwrap_err();
        assert_matches!(&err, CoreError::Validation(msg) if msg.ends_with("int, luk"));

        let unknown =
            serde_json::from_value::<StatsUpdate>(serde_json::json!({ "charisma": 12 }));
        assert!(unknown.is_err());
    }

    #[test]
    fn missing_fields_in_stored_json_fall_back_to_base() {
        let stats: CharacterStats =
            serde_json::from_value(serde_json::json!({ "str": 30 })).unwrap();
        assert_eq!(stats.str, 30);
        assert_eq!(stats.clumsiness, BASE_STAT);
    }
}
