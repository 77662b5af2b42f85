//! Characters (the pets) and creation input validation.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::CoreError;
use crate::leveling::ProgressionState;
use crate::stats::CharacterStats;
use crate::types::{DbId, Timestamp};

pub const SPECIES: &[&str] = &[
    "cat", "dog", "rabbit", "hamster", "bird", "fish", "turtle", "fox",
];

pub const JOBS: &[&str] = &[
    "warrior", "mage", "archer", "thief", "cleric", "bard", "scholar", "merchant",
];

pub const EMOTIONS: &[&str] = &[
    "happy", "sad", "angry", "excited", "tired", "curious", "playful", "calm", "confused",
    "proud",
];

pub const DEFAULT_EMOTION: &str = "happy";

/// Coins a new character starts with.
pub const STARTING_COINS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: DbId,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub species: String,
    pub job: String,
    pub emotion: String,
    pub experience: i64,
    pub level: i32,
    pub coins: i64,
    pub food_eaten: i64,
    pub stats: CharacterStats,
    /// Index into the species' evolution line.
    pub evolution_stage: i32,
    pub created_at: Timestamp,
    pub last_played_at: Timestamp,
}

impl Character {
    pub fn progression(&self) -> ProgressionState {
        ProgressionState {
            character_id: self.id,
            experience: self.experience,
            level: self.level,
            coins: self.coins,
        }
    }
}

/// Client input for creating a character.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCharacter {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[validate(custom(function = "validate_species"))]
    pub species: String,
    #[validate(custom(function = "validate_job"))]
    pub job: String,
}

impl NewCharacter {
    /// Run field validation, trimming the name first.
    pub fn checked(mut self) -> Result<Self, CoreError> {
        self.name = self.name.trim().to_string();
        self.validate().map_err(validation_error)?;
        Ok(self)
    }
}

fn validate_species(species: &str) -> Result<(), ValidationError> {
    one_of(species, SPECIES, "species")
}

fn validate_job(job: &str) -> Result<(), ValidationError> {
    one_of(job, JOBS, "job")
}

fn validate_emotion(emotion: &str) -> Result<(), ValidationError> {
    one_of(emotion, EMOTIONS, "emotion")
}

/// Client input for changing a character's mood.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmotionUpdate {
    #[validate(custom(function = "validate_emotion"))]
    pub emotion: String,
}

impl EmotionUpdate {
    pub fn checked(mut self) -> Result<Self, CoreError> {
        self.emotion = self.emotion.trim().to_string();
        self.validate().map_err(validation_error)?;
        Ok(self)
    }
}

fn one_of(value: &str, allowed: &[&str], code: &'static str) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new(code);
        err.message = Some(
            format!(
                "Unknown {code} '{value}'. Must be one of: {}",
                allowed.join(", ")
            )
            .into(),
        );
        Err(err)
    }
}

/// Flatten `validator` errors into a single `CoreError::Validation`.
fn validation_error(errors: ValidationErrors) -> CoreError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    CoreError::Validation(messages.join("; "))
}

/// Validated character insert handed to the store. The password is already
/// hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharacterRecord {
    pub name: String,
    pub password_hash: String,
    pub species: String,
    pub job: String,
    pub emotion: String,
    pub coins: i64,
    pub created_at: Timestamp,
}

/// Leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub character_id: DbId,
    pub name: String,
    pub species: String,
    pub level: i32,
    pub experience: i64,
}
