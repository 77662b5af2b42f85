//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods take any `PgExecutor` as the first argument so the same query runs
//! against the pool or inside a transaction (`&mut *tx`).

pub mod accrual_repo;
pub mod achievement_repo;
pub mod bonus_box_repo;
pub mod character_repo;
pub mod event_repo;
pub mod food_unit_repo;
pub mod quest_definition_repo;
pub mod quest_repo;

pub use accrual_repo::AccrualRepo;
pub use achievement_repo::AchievementRepo;
pub use bonus_box_repo::BonusBoxRepo;
pub use character_repo::CharacterRepo;
pub use event_repo::EventRepo;
pub use food_unit_repo::FoodUnitRepo;
pub use quest_definition_repo::QuestDefinitionRepo;
pub use quest_repo::QuestRepo;
