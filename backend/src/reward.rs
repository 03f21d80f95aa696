//! Probabilistic reward grants.

use quantum_types::RewardGrant;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_BASE_REWARD: u64 = 50;
pub const DEFAULT_BONUS_REWARD: u64 = 100;
pub const DEFAULT_BONUS_CHANCE: f64 = 0.05;
pub const DEFAULT_COLLECTIBLE_CHANCE: f64 = 0.10;
pub const DEFAULT_MINING_COLLECTIBLE_CHANCE: f64 = 0.10;

pub fn default_collectibles() -> Vec<String> {
    [
        "Galaxy Map",
        "Spaceship Fragment",
        "Quantum Probe",
        "Rare Engine Part",
        "Orbital Code Fragment",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub base_reward: u64,
    pub bonus_reward: u64,
    pub bonus_chance: f64,
    pub collectible_chance: f64,
    pub mining_collectible_chance: f64,
    pub collectibles: Vec<String>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_reward: DEFAULT_BASE_REWARD,
            bonus_reward: DEFAULT_BONUS_REWARD,
            bonus_chance: DEFAULT_BONUS_CHANCE,
            collectible_chance: DEFAULT_COLLECTIBLE_CHANCE,
            mining_collectible_chance: DEFAULT_MINING_COLLECTIBLE_CHANCE,
            collectibles: default_collectibles(),
        }
    }
}

/// Draw with probability `p`; out-of-range values saturate and NaN never hits.
fn roll<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    p > 0.0 && rng.gen_bool(p.min(1.0))
}

fn draw_collectible<R: Rng + ?Sized>(rng: &mut R, p: f64, catalog: &[String]) -> Option<String> {
    if !roll(rng, p) {
        return None;
    }
    catalog.choose(rng).cloned()
}

/// Compute a claim reward. The bonus and the collectible use separate draws.
pub fn compute_claim_reward<R: Rng + ?Sized>(config: &RewardConfig, rng: &mut R) -> RewardGrant {
    let bonus = if roll(rng, config.bonus_chance) {
        config.bonus_reward
    } else {
        0
    };
    let collectible = draw_collectible(rng, config.collectible_chance, &config.collectibles);
    RewardGrant::new(config.base_reward, bonus, collectible)
}

/// Reward computation over an injected random source.
pub struct RewardEngine<R> {
    config: RewardConfig,
    rng: Mutex<R>,
}

impl RewardEngine<ChaCha20Rng> {
    /// Engine over ChaCha20, seeded from `seed` when given, from the OS otherwise.
    pub fn with_seed(config: RewardConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        Self::new(config, rng)
    }
}

impl<R: Rng + Send> RewardEngine<R> {
    pub fn new(config: RewardConfig, rng: R) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    pub fn compute_claim_reward(&self) -> RewardGrant {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        compute_claim_reward(&self.config, &mut *rng)
    }

    /// Collectible dropped alongside a successful mining attempt, if any.
    pub fn mining_collectible(&self) -> Option<String> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw_collectible(
            &mut *rng,
            self.config.mining_collectible_chance,
            &self.config.collectibles,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn forced_neither() {
        let engine = RewardEngine::new(RewardConfig::default(), never());
        let grant = engine.compute_claim_reward();
        assert_eq!(grant.base_amount(), DEFAULT_BASE_REWARD);
        assert_eq!(grant.bonus_amount(), 0);
        assert_eq!(grant.total_amount(), DEFAULT_BASE_REWARD);
        assert!(!grant.collectible_won());
        assert_eq!(grant.collectible_name(), None);
        assert_eq!(engine.mining_collectible(), None);
    }

    #[test]
    fn forced_bonus_and_collectible() {
        let engine = RewardEngine::new(RewardConfig::default(), always());
        let grant = engine.compute_claim_reward();
        assert_eq!(grant.bonus_amount(), DEFAULT_BONUS_REWARD);
        assert_eq!(grant.total_amount(), DEFAULT_BASE_REWARD + DEFAULT_BONUS_REWARD);
        assert!(grant.collectible_won());
        assert_eq!(grant.collectible_name(), Some("Galaxy Map"));
        assert_eq!(engine.mining_collectible().as_deref(), Some("Galaxy Map"));
    }

    #[test]
    fn draws_are_independent() {
        // First sample (0) hits the bonus, second (2^63) misses the collectible.
        let mut rng = StepRng::new(0, 1 << 63);
        let grant = compute_claim_reward(&RewardConfig::default(), &mut rng);
        assert_eq!(grant.bonus_amount(), DEFAULT_BONUS_REWARD);
        assert!(!grant.collectible_won());
    }

    #[test]
    fn zero_chances_never_award() {
        let config = RewardConfig {
            bonus_chance: 0.0,
            collectible_chance: 0.0,
            mining_collectible_chance: 0.0,
            ..RewardConfig::default()
        };
        let engine = RewardEngine::new(config, always());
        for _ in 0..100 {
            let grant = engine.compute_claim_reward();
            assert_eq!(grant.total_amount(), DEFAULT_BASE_REWARD);
            assert!(!grant.collectible_won());
        }
    }

    #[test]
    fn oversized_bonus_does_not_panic() {
        let config = RewardConfig {
            base_reward: u64::MAX,
            bonus_reward: 1,
            bonus_chance: 1.0,
            ..RewardConfig::default()
        };
        let grant = RewardEngine::new(config, always()).compute_claim_reward();
        assert_eq!(grant.bonus_amount(), 1);
        assert_eq!(grant.total_amount(), u64::MAX);
    }

    #[test]
    fn empty_catalog_awards_nothing() {
        let config = RewardConfig {
            collectibles: Vec::new(),
            ..RewardConfig::default()
        };
        let grant = compute_claim_reward(&config, &mut always());
        assert!(!grant.collectible_won());
        assert_eq!(grant.collectible_name(), None);
    }

    #[test]
    fn seeded_engines_agree() {
        let a = RewardEngine::with_seed(RewardConfig::default(), Some(7));
        let b = RewardEngine::with_seed(RewardConfig::default(), Some(7));
        for _ in 0..256 {
            assert_eq!(a.compute_claim_reward(), b.compute_claim_reward());
        }
    }

    #[test]
    fn frequencies_track_configured_chances() {
        let engine = RewardEngine::with_seed(RewardConfig::default(), Some(42));
        let rounds = 20_000;
        let mut bonuses = 0;
        let mut collectibles = 0;
        for _ in 0..rounds {
            let grant = engine.compute_claim_reward();
            if grant.bonus_amount() > 0 {
                bonuses += 1;
            }
            if grant.collectible_won() {
                collectibles += 1;
            }
        }
        let bonus_rate = bonuses as f64 / rounds as f64;
        let collectible_rate = collectibles as f64 / rounds as f64;
        assert!((0.03..0.07).contains(&bonus_rate), "bonus rate {bonus_rate}");
        assert!(
            (0.08..0.12).contains(&collectible_rate),
            "collectible rate {collectible_rate}"
        );
    }

    proptest! {
        #[test]
        fn grants_hold_invariants(seed in any::<u64>()) {
            let config = RewardConfig::default();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let grant = compute_claim_reward(&config, &mut rng);
            prop_assert_eq!(grant.total_amount(), grant.base_amount() + grant.bonus_amount());
            prop_assert_eq!(grant.collectible_won(), grant.collectible_name().is_some());
            prop_assert!(grant.bonus_amount() == 0 || grant.bonus_amount() == config.bonus_reward);
            if let Some(name) = grant.collectible_name() {
                prop_assert!(config.collectibles.iter().any(|c| c == name));
            }
        }
    }
}
