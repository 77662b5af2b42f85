use crate::accrual::{AccrualState, CapPolicy, DEFAULT_CAP, DEFAULT_INTERVAL_SECS, INITIAL_UNITS};
use crate::resource::TierCounts;
use crate::rewards::CurrencyPolicy;
use crate::types::Timestamp;

/// Game rule tuning loaded from environment variables.
///
/// Defaults reproduce the standard game; tests usually build this with
/// `EngineConfig::default()` and override single fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Seconds between accrued food units (default: `1800`).
    pub food_interval_secs: i64,
    /// Storage cap (default: `100`).
    pub food_cap: i64,
    /// What counts against the cap (default: low-tier units only).
    pub cap_policy: CapPolicy,
    /// Food units seeded on character creation (default: `9`).
    pub initial_food: i64,
    /// Coin roll policy (default: rolled on every feeding action).
    pub currency_policy: CurrencyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            food_interval_secs: DEFAULT_INTERVAL_SECS,
            food_cap: DEFAULT_CAP,
            cap_policy: CapPolicy::default(),
            initial_food: INITIAL_UNITS,
            currency_policy: CurrencyPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                     |
    /// |----------------------|-----------------------------|
    /// | `FOOD_INTERVAL_SECS` | `1800`                      |
    /// | `FOOD_CAP`           | `100`                       |
    /// | `FOOD_CAP_POLICY`    | `low_tier` (or `stock`)     |
    /// | `INITIAL_FOOD`       | `9`                         |
    /// | `CURRENCY_GATE`      | unset (coins always rolled) |
    pub fn from_env() -> Self {
        let food_interval_secs: i64 = std::env::var("FOOD_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_INTERVAL_SECS.to_string())
            .parse()
            .expect("FOOD_INTERVAL_SECS must be a valid i64");

        let food_cap: i64 = std::env::var("FOOD_CAP")
            .unwrap_or_else(|_| DEFAULT_CAP.to_string())
            .parse()
            .expect("FOOD_CAP must be a valid i64");

        let cap_policy = std::env::var("FOOD_CAP_POLICY")
            .map(|name| {
                CapPolicy::from_name(name.trim())
                    .expect("FOOD_CAP_POLICY must be low_tier or stock")
            })
            .unwrap_or_default();

        let initial_food: i64 = std::env::var("INITIAL_FOOD")
            .unwrap_or_else(|_| INITIAL_UNITS.to_string())
            .parse()
            .expect("INITIAL_FOOD must be a valid i64");

        let currency_policy = match std::env::var("CURRENCY_GATE") {
            Ok(raw) if !raw.trim().is_empty() => {
                let p: f64 = raw.trim().parse().expect("CURRENCY_GATE must be a number");
                CurrencyPolicy::gated(p).expect("CURRENCY_GATE must be within [0, 1]")
            }
            _ => CurrencyPolicy::Always,
        };

        assert!(food_interval_secs > 0, "FOOD_INTERVAL_SECS must be positive");
        assert!(food_cap > 0, "FOOD_CAP must be positive");
        assert!(initial_food >= 0, "INITIAL_FOOD must not be negative");

        Self {
            food_interval_secs,
            food_cap,
            cap_policy,
            initial_food,
            currency_policy,
        }
    }

    /// Accrual clock for a character under this configuration.
    pub fn accrual_state(&self, last_generated_at: Timestamp, counts: TierCounts) -> AccrualState {
        AccrualState {
            last_generated_at,
            counts,
            interval_secs: self.food_interval_secs,
            cap: self.food_cap,
            cap_policy: self.cap_policy,
        }
    }
}
