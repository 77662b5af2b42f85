//! Species evolution lines and job advancements.
//!
//! Every species has three stages. A character moves up one stage at a time,
//! once it reaches the next stage's level and attribute minimums. The stored
//! `evolution_stage` only ever grows.

use serde::Serialize;

use crate::character::Character;
use crate::stats::{CharacterStats, Stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatRequirement {
    pub stat: Stat,
    pub min: i32,
}

const fn req(stat: Stat, min: i32) -> StatRequirement {
    StatRequirement { stat, min }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvolutionStage {
    pub stage: i32,
    pub name: &'static str,
    pub description: &'static str,
    pub level_requirement: i32,
    pub stat_requirements: &'static [StatRequirement],
    pub unlocks: &'static [&'static str],
}

const fn stage(
    stage: i32,
    name: &'static str,
    description: &'static str,
    level_requirement: i32,
    stat_requirements: &'static [StatRequirement],
    unlocks: &'static [&'static str],
) -> EvolutionStage {
    EvolutionStage {
        stage,
        name,
        description,
        level_requirement,
        stat_requirements,
        unlocks,
    }
}

const CAT: &[EvolutionStage] = &[
    stage(
        0,
        "Kitten",
        "A playful young kitten full of curiosity",
        1,
        &[],
        &["basic_meow", "scratch"],
    ),
    stage(
        1,
        "Adult Cat",
        "A mature cat with developed hunting instincts",
        10,
        &[req(Stat::Agi, 15), req(Stat::Dex, 15)],
        &["stealth", "pounce", "night_vision"],
    ),
    stage(
        2,
        "Elder Cat",
        "A wise elder cat with mystical powers",
        25,
        &[req(Stat::Int, 20), req(Stat::Awareness, 25)],
        &["wisdom", "feline_grace", "mystical_purr"],
    ),
];

const DOG: &[EvolutionStage] = &[
    stage(
        0,
        "Puppy",
        "An energetic puppy eager to please",
        1,
        &[],
        &["bark", "fetch"],
    ),
    stage(
        1,
        "Adult Dog",
        "A loyal companion with strong protective instincts",
        10,
        &[req(Stat::Str, 15), req(Stat::Vit, 15)],
        &["guard", "loyalty_boost", "pack_leader"],
    ),
    stage(
        2,
        "Alpha Dog",
        "A legendary pack leader with unshakeable loyalty",
        25,
        &[req(Stat::Str, 20), req(Stat::Vit, 20)],
        &["alpha_howl", "protector", "legendary_loyalty"],
    ),
];

const RABBIT: &[EvolutionStage] = &[
    stage(
        0,
        "Bunny",
        "A cute little bunny with boundless energy",
        1,
        &[],
        &["hop", "nibble"],
    ),
    stage(
        1,
        "Swift Rabbit",
        "An incredibly fast rabbit with keen senses",
        10,
        &[req(Stat::Agi, 20), req(Stat::Awareness, 15)],
        &["speed_burst", "danger_sense", "lucky_foot"],
    ),
    stage(
        2,
        "Moon Rabbit",
        "A mystical rabbit blessed by lunar magic",
        25,
        &[req(Stat::Luk, 25), req(Stat::Int, 15)],
        &["moon_blessing", "fortune_sight", "lunar_jump"],
    ),
];

const HAMSTER: &[EvolutionStage] = &[
    stage(
        0,
        "Baby Hamster",
        "A tiny hamster with chubby cheeks",
        1,
        &[],
        &["cheek_stuff", "tiny_bite"],
    ),
    stage(
        1,
        "Hoarder Hamster",
        "An expert collector with amazing storage skills",
        10,
        &[req(Stat::Appetite, 20), req(Stat::Pragmatism, 15)],
        &["mega_hoard", "storage_master", "treasure_sense"],
    ),
    stage(
        2,
        "Golden Hamster",
        "A legendary hamster with the power to create wealth",
        25,
        &[req(Stat::Luk, 20), req(Stat::Pragmatism, 25)],
        &["golden_touch", "wealth_creation", "prosperity_aura"],
    ),
];

const BIRD: &[EvolutionStage] = &[
    stage(
        0,
        "Chick",
        "A fluffy chick learning to fly",
        1,
        &[],
        &["chirp", "flutter"],
    ),
    stage(
        1,
        "Soaring Bird",
        "A graceful bird master of the skies",
        10,
        &[req(Stat::Agi, 18), req(Stat::Curiosity, 15)],
        &["aerial_mastery", "wind_reading", "sky_song"],
    ),
    stage(
        2,
        "Phoenix",
        "A mythical phoenix with power over renewal",
        25,
        &[req(Stat::Int, 20), req(Stat::Sensitivity, 20)],
        &["rebirth", "healing_flame", "eternal_song"],
    ),
];

const FISH: &[EvolutionStage] = &[
    stage(
        0,
        "Fry",
        "A tiny fish exploring the waters",
        1,
        &[],
        &["bubble", "dart"],
    ),
    stage(
        1,
        "Deep Fish",
        "A mysterious fish of the deep waters",
        10,
        &[req(Stat::Int, 15), req(Stat::Awareness, 18)],
        &["deep_sight", "pressure_resist", "current_reading"],
    ),
    stage(
        2,
        "Leviathan",
        "A legendary sea creature of immense wisdom",
        25,
        &[req(Stat::Int, 25), req(Stat::Vit, 20)],
        &["tidal_power", "ancient_wisdom", "ocean_command"],
    ),
];

const TURTLE: &[EvolutionStage] = &[
    stage(
        0,
        "Hatchling",
        "A small turtle beginning its long journey",
        1,
        &[],
        &["shell_hide", "slow_walk"],
    ),
    stage(
        1,
        "Ancient Turtle",
        "A wise turtle that has seen many seasons",
        10,
        &[req(Stat::Vit, 20), req(Stat::Pragmatism, 15)],
        &["shell_fortress", "ancient_memory", "steady_wisdom"],
    ),
    stage(
        2,
        "World Turtle",
        "A legendary turtle carrying worlds on its shell",
        25,
        &[req(Stat::Vit, 25), req(Stat::Int, 20)],
        &["world_support", "cosmic_patience", "eternal_shell"],
    ),
];

const FOX: &[EvolutionStage] = &[
    stage(
        0,
        "Fox Kit",
        "A clever young fox with mischievous eyes",
        1,
        &[],
        &["cunning", "quick_step"],
    ),
    stage(
        1,
        "Clever Fox",
        "A crafty fox master of tricks and illusions",
        10,
        &[req(Stat::Int, 18), req(Stat::Meddling, 15)],
        &["illusion", "trickster", "clever_escape"],
    ),
    stage(
        2,
        "Nine-Tail Fox",
        "A mystical fox with nine tails and ancient magic",
        25,
        &[req(Stat::Int, 25), req(Stat::Sensitivity, 20)],
        &["nine_tails", "spirit_magic", "shape_shift"],
    ),
];

/// Evolution line of `species`; empty for unknown species.
pub fn stages(species: &str) -> &'static [EvolutionStage] {
    match species {
        "cat" => CAT,
        "dog" => DOG,
        "rabbit" => RABBIT,
        "hamster" => HAMSTER,
        "bird" => BIRD,
        "fish" => FISH,
        "turtle" => TURTLE,
        "fox" => FOX,
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobAdvancement {
    pub from: &'static str,
    pub to: &'static str,
    pub level_requirement: i32,
    pub stat_requirements: &'static [StatRequirement],
    pub description: &'static str,
}

pub const JOB_ADVANCEMENTS: &[JobAdvancement] = &[
    JobAdvancement {
        from: "warrior",
        to: "knight",
        level_requirement: 15,
        stat_requirements: &[req(Stat::Str, 20), req(Stat::Vit, 18)],
        description: "Advance from Warrior to Noble Knight",
    },
    JobAdvancement {
        from: "mage",
        to: "archmage",
        level_requirement: 15,
        stat_requirements: &[req(Stat::Int, 25), req(Stat::Sensitivity, 15)],
        description: "Ascend from Mage to Powerful Archmage",
    },
    JobAdvancement {
        from: "thief",
        to: "assassin",
        level_requirement: 15,
        stat_requirements: &[req(Stat::Dex, 22), req(Stat::Agi, 20)],
        description: "Evolve from Thief to Silent Assassin",
    },
];

/// Unmet requirements, formatted for display. Empty means eligible.
fn unmet(
    level: i32,
    stats: &CharacterStats,
    level_requirement: i32,
    stat_requirements: &[StatRequirement],
) -> Vec<String> {
    let mut missing = Vec::new();
    if level < level_requirement {
        missing.push(format!("level {level_requirement} (currently {level})"));
    }
    for r in stat_requirements {
        let have = stats.get(r.stat);
        if have < r.min {
            missing.push(format!("{} {} (currently {have})", r.stat.name(), r.min));
        }
    }
    missing
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobAdvancementStatus {
    pub advancement: JobAdvancement,
    pub eligible: bool,
    pub missing: Vec<String>,
}

/// Where a character stands on its evolution line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionStatus {
    pub stage: i32,
    pub current: Option<EvolutionStage>,
    pub next: Option<EvolutionStage>,
    pub can_evolve: bool,
    /// Requirements of `next` the character does not meet yet.
    pub missing: Vec<String>,
    /// Abilities unlocked by every stage reached so far.
    pub unlocks: Vec<&'static str>,
    pub job_advancements: Vec<JobAdvancementStatus>,
}

pub fn status(character: &Character) -> EvolutionStatus {
    let line = stages(&character.species);
    let reached = usize::try_from(character.evolution_stage).unwrap_or(0);
    let current = line.get(reached).copied();
    let next = line.get(reached + 1).copied();

    let missing = match &next {
        Some(next) => unmet(
            character.level,
            &character.stats,
            next.level_requirement,
            next.stat_requirements,
        ),
        None => Vec::new(),
    };
    let unlocks = line
        .iter()
        .take(reached + 1)
        .flat_map(|s| s.unlocks.iter().copied())
        .collect();
    let job_advancements = JOB_ADVANCEMENTS
        .iter()
        .filter(|a| a.from == character.job)
        .map(|a| {
            let missing = unmet(
                character.level,
                &character.stats,
                a.level_requirement,
                a.stat_requirements,
            );
            JobAdvancementStatus {
                advancement: *a,
                eligible: missing.is_empty(),
                missing,
            }
        })
        .collect();

    EvolutionStatus {
        stage: character.evolution_stage,
        can_evolve: next.is_some() && missing.is_empty(),
        current,
        next,
        missing,
        unlocks,
        job_advancements,
    }
}
