//! all the knobs of the simulation.
//!
//! everything lives in one [`Config`] value that gets handed to [`crate::app::App::new`].
//! every section has sensible defaults, a json file only needs to contain what it wants to
//! change.

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub world: WorldConfig,
    pub population: PopulationConfig,
    pub food: FoodConfig,
    pub terrain: TerrainConfig,
    pub physics: PhysicsConfig,
    pub metabolism: MetabolismConfig,
    pub behavior: BehaviorConfig,
    pub mutation: MutationConfig,
    pub interaction: InteractionConfig,
    pub ticks: TickConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
    /// edge length of a critter grid cell, should not be smaller than the biggest sense radius
    pub critter_cell: f64,
    pub food_cell: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1600.,
            height: 1000.,
            critter_cell: 100.,
            food_cell: 100.,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub initial: usize,
    pub max: usize,
    /// share of the founders that start out as carnivores
    pub carnivore_share: f64,
    /// critters older than this (in ticks) die
    pub max_age: u64,
    /// parent keeps this share of its energy on reproduction
    pub parent_share: f64,
    /// offspring starts with this share of the parent's energy
    pub offspring_share: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial: 150,
            max: 1500,
            carnivore_share: 0.25,
            max_age: 6000,
            parent_share: 0.5,
            offspring_share: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodConfig {
    pub max: usize,
    pub initial: usize,
    /// ambient spawns per tick while under the cap
    pub spawn_quota: usize,
    /// how many existing items get sampled as parents each tick
    pub spread_parents: usize,
    /// global multiplier on the per-biome growth chance
    pub spread_rate: f64,
    pub energy: f64,
    pub energy_jitter: f64,
    /// items older than this rot away in the cleanup pass
    pub max_age: u64,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            max: 2500,
            initial: 600,
            spawn_quota: 2,
            spread_parents: 12,
            spread_rate: 0.1,
            energy: 25.,
            energy_jitter: 5.,
            max_age: 4000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub octaves: u32,
    /// world units per noise unit of the lowest octave
    pub scale: f64,
    /// resolution of the cached biome lookup in world units
    pub cache_cell: f64,
    pub deep_ocean: f64,
    pub ocean: f64,
    pub beach: f64,
    pub mountain: f64,
    /// moisture below this is plains
    pub dry: f64,
    /// moisture above this is jungle
    pub wet: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            octaves: 5,
            scale: 450.,
            cache_cell: 4.,
            deep_ocean: 0.36,
            ocean: 0.43,
            beach: 0.46,
            mountain: 0.64,
            dry: 0.46,
            wet: 0.56,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// max speed bonus per limb and unit of limb length
    pub limb_speed: f64,
    /// speed is divided by 1 + size * size_drag
    pub size_drag: f64,
    /// fully armoured critters lose this share of their speed
    pub armor_drag: f64,
    /// lower bound on habitat suitability so stranded critters can crawl back
    pub min_suitability: f64,
    /// acceleration per tick as a share of the max speed
    pub thrust: f64,
    /// turn rate in radians per tick before modifiers
    pub base_agility: f64,
    pub limb_agility: f64,
    pub size_agility: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            limb_speed: 0.04,
            size_drag: 0.03,
            armor_drag: 0.4,
            min_suitability: 0.1,
            thrust: 0.25,
            base_agility: 0.15,
            limb_agility: 0.02,
            size_agility: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolismConfig {
    pub existence: f64,
    pub per_limb: f64,
    pub mouth: f64,
    pub size_sq: f64,
    pub defense: f64,
    pub movement: f64,
    /// habitat mismatch below this costs nothing
    pub suffocation_dead_zone: f64,
    pub suffocation: f64,
    /// cost multiplier while resting
    pub rest_discount: f64,
}

impl Default for MetabolismConfig {
    fn default() -> Self {
        Self {
            existence: 0.02,
            per_limb: 0.003,
            mouth: 0.004,
            size_sq: 0.0006,
            defense: 0.02,
            movement: 0.004,
            suffocation_dead_zone: 0.35,
            suffocation: 0.15,
            rest_discount: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// ticks between two think ticks
    pub think_interval: u64,
    /// random extra ticks added to the think interval
    pub think_jitter: u64,
    pub flee_fear: f64,
    pub seek_hunger: f64,
    pub rest_fatigue: f64,
    /// fatigue reported when energy is below the exhaustion share of the repro threshold
    pub fatigue: f64,
    pub exhaustion: f64,
    /// predators need to be at least this share of the observer's size
    pub predator_size: f64,
    /// max random heading change per tick while wandering
    pub wander_jitter: f64,
    pub wander_throttle: f64,
    /// added to the prey energy on a kill, per unit of prey size
    pub predation_size_bonus: f64,
    /// food items are treated as discs of this radius
    pub food_radius: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            think_interval: 10,
            think_jitter: 10,
            flee_fear: 0.6,
            seek_hunger: 0.4,
            rest_fatigue: 0.5,
            fatigue: 0.8,
            exhaustion: 0.3,
            predator_size: 0.8,
            wander_jitter: 0.3,
            wander_throttle: 0.5,
            predation_size_bonus: 1.5,
            food_radius: 2.,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationRate {
    /// chance to mutate on each reproduction
    pub rate: f64,
    /// relative change is drawn from (-variance, variance)
    pub variance: f64,
}

impl MutationRate {
    pub const fn new(rate: f64, variance: f64) -> Self {
        Self { rate, variance }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub speed: MutationRate,
    pub size: MutationRate,
    pub sense_radius: MutationRate,
    pub repro_threshold: MutationRate,
    pub diet: MutationRate,
    pub amphibious: MutationRate,
    pub defense: MutationRate,
    pub limb_length: MutationRate,
    pub mouth_size: MutationRate,
    /// chance of gaining or losing a limb
    pub limb_count: f64,
    /// magnitude added per limb gained or lost
    pub limb_magnitude: f64,
    /// weights for the ecologically significant traits
    pub diet_weight: f64,
    pub amphibious_weight: f64,
    pub defense_weight: f64,
    /// hue random walk per reproduction in degrees
    pub hue_drift: f64,
    /// offspring with a larger accumulated magnitude found a new species
    pub speciation_threshold: f64,
    /// extra hue shift in degrees for a new species
    pub speciation_hue_jump: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            speed: MutationRate::new(0.2, 0.1),
            size: MutationRate::new(0.2, 0.1),
            sense_radius: MutationRate::new(0.15, 0.1),
            repro_threshold: MutationRate::new(0.15, 0.1),
            diet: MutationRate::new(0.1, 0.15),
            amphibious: MutationRate::new(0.1, 0.15),
            defense: MutationRate::new(0.1, 0.2),
            limb_length: MutationRate::new(0.15, 0.1),
            mouth_size: MutationRate::new(0.15, 0.1),
            limb_count: 0.05,
            limb_magnitude: 0.1,
            diet_weight: 3.,
            amphibious_weight: 2.,
            defense_weight: 2.,
            hue_drift: 3.,
            speciation_threshold: 12.,
            speciation_hue_jump: 40.,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// radius around the cursor for inspect, grows with critter size
    pub inspect_radius: f64,
    pub feed_batch: usize,
    pub feed_jitter: f64,
    pub damage_radius: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            inspect_radius: 20.,
            feed_batch: 12,
            feed_jitter: 25.,
            damage_radius: 60.,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// STATS_UPDATE every n ticks
    pub stats_interval: u64,
    /// eaten and rotten food is dropped every n ticks
    pub cleanup_interval: u64,
    /// a report is logged every n ticks, 0 disables it
    pub report_interval: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            stats_interval: 30,
            cleanup_interval: 60,
            report_interval: 0,
        }
    }
}

impl Config {
    /// missing fields keep their defaults
    pub fn from_json<R: std::io::Read>(r: R) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_reader(r)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;
        if !(w.width.is_finite() && w.width > 0.) {
            return Err(invalid("world.width", "must be positive"));
        }
        if !(w.height.is_finite() && w.height > 0.) {
            return Err(invalid("world.height", "must be positive"));
        }
        if !(w.critter_cell.is_finite() && w.critter_cell > 0.) {
            return Err(invalid("world.critter_cell", "must be positive"));
        }
        if !(w.food_cell.is_finite() && w.food_cell > 0.) {
            return Err(invalid("world.food_cell", "must be positive"));
        }
        let p = &self.population;
        if p.max == 0 {
            return Err(invalid("population.max", "must be at least 1"));
        }
        if p.initial > p.max {
            return Err(invalid("population.initial", "exceeds population.max"));
        }
        if !(0.0..=1.).contains(&p.carnivore_share) {
            return Err(invalid("population.carnivore_share", "must be in 0..=1"));
        }
        if !(p.parent_share >= 0. && p.offspring_share >= 0.)
            || p.parent_share + p.offspring_share > 1.
        {
            return Err(invalid(
                "population.offspring_share",
                "parent and offspring shares can not exceed the parent's energy",
            ));
        }
        let f = &self.food;
        let grows = f.spawn_quota > 0 || f.spread_parents > 0 || f.initial > 0;
        if f.max == 0 && grows {
            return Err(invalid("food.max", "must be at least 1 when food grows"));
        }
        if !(f.energy.is_finite() && f.energy_jitter.is_finite() && f.spread_rate.is_finite()) {
            return Err(invalid("food.energy", "must be finite"));
        }
        let t = &self.terrain;
        if !(t.scale.is_finite() && t.scale > 0.) {
            return Err(invalid("terrain.scale", "must be positive"));
        }
        if !(t.cache_cell.is_finite() && t.cache_cell > 0.) {
            return Err(invalid("terrain.cache_cell", "must be positive"));
        }
        if !(t.deep_ocean <= t.ocean && t.ocean <= t.beach && t.beach <= t.mountain) {
            return Err(invalid("terrain", "elevation thresholds must be ascending"));
        }
        let m = &self.metabolism;
        if !(m.existence.is_finite() && m.existence > 0.) {
            return Err(invalid("metabolism.existence", "must be positive"));
        }
        // with existence > 0 these keep every tick cost positive
        let costs = [
            ("metabolism.per_limb", m.per_limb),
            ("metabolism.mouth", m.mouth),
            ("metabolism.size_sq", m.size_sq),
            ("metabolism.defense", m.defense),
            ("metabolism.movement", m.movement),
            ("metabolism.suffocation", m.suffocation),
            ("metabolism.suffocation_dead_zone", m.suffocation_dead_zone),
        ];
        for (field, v) in costs {
            if !(v.is_finite() && v >= 0.) {
                return Err(invalid(field, "must be finite and not negative"));
            }
        }
        if !(m.rest_discount > 0. && m.rest_discount <= 1.) {
            return Err(invalid("metabolism.rest_discount", "must be in (0, 1]"));
        }
        let t = &self.mutation;
        let rates = [
            ("mutation.speed", t.speed),
            ("mutation.size", t.size),
            ("mutation.sense_radius", t.sense_radius),
            ("mutation.repro_threshold", t.repro_threshold),
            ("mutation.diet", t.diet),
            ("mutation.amphibious", t.amphibious),
            ("mutation.defense", t.defense),
            ("mutation.limb_length", t.limb_length),
            ("mutation.mouth_size", t.mouth_size),
        ];
        for (field, r) in rates {
            if !(0.0..=1.).contains(&r.rate) {
                return Err(invalid(field, "rate must be in 0..=1"));
            }
            if !(r.variance.is_finite() && r.variance >= 0.) {
                return Err(invalid(field, "variance must be finite and not negative"));
            }
        }
        if !(0.0..=1.).contains(&t.limb_count) {
            return Err(invalid("mutation.limb_count", "must be in 0..=1"));
        }
        let finite = [
            ("mutation.limb_magnitude", t.limb_magnitude),
            ("mutation.diet_weight", t.diet_weight),
            ("mutation.amphibious_weight", t.amphibious_weight),
            ("mutation.defense_weight", t.defense_weight),
            ("mutation.hue_drift", t.hue_drift),
            ("mutation.speciation_hue_jump", t.speciation_hue_jump),
        ];
        for (field, v) in finite {
            if !v.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        // infinity is allowed and turns speciation off
        if t.speciation_threshold.is_nan() {
            return Err(invalid("mutation.speciation_threshold", "must be a number"));
        }
        if self.ticks.stats_interval == 0 || self.ticks.cleanup_interval == 0 {
            return Err(invalid("ticks", "intervals must be at least 1"));
        }
        Ok(())
    }
}

#[test]
fn default_is_valid() {
    Config::default().validate().unwrap();
}

#[test]
fn partial_json_keeps_defaults() {
    let json = r#"{ "world": { "width": 800.0 }, "population": { "initial": 10 } }"#;
    let config = Config::from_json(json.as_bytes()).unwrap();
    assert_eq!(config.world.width, 800.);
    assert_eq!(config.world.height, WorldConfig::default().height);
    assert_eq!(config.population.initial, 10);
    assert_eq!(config.mutation, MutationConfig::default());
}

#[test]
fn rejects_bad_values() {
    let mut config = Config::default();
    config.population.initial = config.population.max + 1;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid {
            field: "population.initial",
            ..
        })
    ));

    let mut config = Config::default();
    config.world.critter_cell = 0.;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.metabolism.size_sq = -1.;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid {
            field: "metabolism.size_sq",
            ..
        })
    ));

    let mut config = Config::default();
    config.metabolism.rest_discount = 0.;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.mutation.diet.rate = f64::NAN;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid {
            field: "mutation.diet",
            ..
        })
    ));

    let mut config = Config::default();
    config.mutation.speed.rate = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.mutation.hue_drift = f64::INFINITY;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.mutation.speciation_threshold = f64::NAN;
    assert!(config.validate().is_err());

    // turning speciation off is fine
    let mut config = Config::default();
    config.mutation.speciation_threshold = f64::INFINITY;
    assert!(config.validate().is_ok());

    assert!(matches!(
        Config::from_json("{ nope".as_bytes()),
        Err(ConfigError::Json(_))
    ));
}
