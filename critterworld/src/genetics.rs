use crate::config::{MutationConfig, MutationRate};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// lower bounds for the scaled traits, mutations never go below these
pub mod floor {
    pub const SPEED: f64 = 0.2;
    pub const SIZE: f64 = 3.;
    pub const SENSE_RADIUS: f64 = 10.;
    pub const REPRO_THRESHOLD: f64 = 20.;
    pub const LIMB_LENGTH: f64 = 0.5;
    pub const MOUTH_SIZE: f64 = 0.5;
    /// the unit traits (diet, amphibious, defense) stay off 0 so the
    /// multiplicative mutation can always move them again
    pub const UNIT: f64 = 0.01;
    pub const MAX_LIMBS: u8 = 8;
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    /// degrees, [0, 360)
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub fn shift_hue(&mut self, degrees: f64) {
        self.h = (self.h + degrees).rem_euclid(360.);
    }
}

/// the heritable traits of a critter. copied on reproduction, never shared.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub speed: f64,
    pub size: f64,
    pub sense_radius: f64,
    pub repro_threshold: f64,
    pub color: Hsl,
    /// 0: herbivore, 1: carnivore
    pub diet: f64,
    /// 0: water specialist, 1: land specialist
    pub amphibious: f64,
    pub defense: f64,
    pub limb_count: u8,
    pub limb_length: f64,
    pub mouth_size: f64,
}

impl Genome {
    /// a founder genome, fit for a biome of the given landness
    pub fn random<R: Rng>(rng: &mut R, landness: f64, carnivore: bool) -> Self {
        let diet = if carnivore {
            rng.random_range(0.7..0.95)
        } else {
            rng.random_range(0.05..0.3)
        };
        Self {
            speed: rng.random_range(1.0..2.0),
            size: rng.random_range(4.0..8.),
            sense_radius: rng.random_range(50.0..90.),
            repro_threshold: rng.random_range(80.0..140.),
            color: Hsl {
                h: rng.random_range(0.0..360.),
                s: rng.random_range(50.0..80.),
                l: rng.random_range(40.0..60.),
            },
            diet,
            amphibious: (landness + rng.random_range(-0.1..0.1)).clamp(floor::UNIT, 1.),
            defense: rng.random_range(0.0..0.3_f64).max(floor::UNIT),
            limb_count: rng.random_range(2..=6),
            limb_length: rng.random_range(2.0..5.),
            mouth_size: rng.random_range(1.0..3.),
        }
    }

    pub fn is_carnivore(&self) -> bool {
        self.diet > 0.5
    }
}

/// a mutated child genome and how far it moved from its parent
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mutation {
    pub genome: Genome,
    pub magnitude: f64,
}

impl Mutation {
    /// offspring past the threshold found a new species
    pub fn speciates(&self, threshold: f64) -> bool {
        self.magnitude > threshold
    }
}

/// relative mutation of a trait, returns the absolute change
fn scaled<R: Rng>(rng: &mut R, rate: MutationRate, val: &mut f64, min: f64, max: f64) -> f64 {
    if !(rate.variance > 0.) || !rng.random_bool(rate.rate.clamp(0., 1.)) {
        return 0.;
    }
    let old = *val;
    let factor = 1. + rng.random_range(-rate.variance..rate.variance);
    *val = (old * factor).clamp(min, max);
    (*val - old).abs()
}

/// every trait rolls for mutation on its own.
///
/// the magnitude adds up the absolute change of every trait, diet, amphibious and defense
/// weighted, plus a flat amount per limb gained or lost.
/// traits with big values like the reproduction threshold move the most.
/// the hue always drifts a little and does not count.
#[must_use]
pub fn mutate<R: Rng>(parent: &Genome, table: &MutationConfig, rng: &mut R) -> Mutation {
    let mut g = *parent;
    let mut magnitude = 0.;
    let inf = f64::INFINITY;

    magnitude += scaled(rng, table.speed, &mut g.speed, floor::SPEED, inf);
    magnitude += scaled(rng, table.size, &mut g.size, floor::SIZE, inf);
    magnitude += scaled(
        rng,
        table.sense_radius,
        &mut g.sense_radius,
        floor::SENSE_RADIUS,
        inf,
    );
    magnitude += scaled(
        rng,
        table.repro_threshold,
        &mut g.repro_threshold,
        floor::REPRO_THRESHOLD,
        inf,
    );
    magnitude += scaled(
        rng,
        table.limb_length,
        &mut g.limb_length,
        floor::LIMB_LENGTH,
        inf,
    );
    magnitude += scaled(rng, table.mouth_size, &mut g.mouth_size, floor::MOUTH_SIZE, inf);

    magnitude += scaled(rng, table.diet, &mut g.diet, floor::UNIT, 1.) * table.diet_weight;
    magnitude += scaled(rng, table.amphibious, &mut g.amphibious, floor::UNIT, 1.)
        * table.amphibious_weight;
    magnitude +=
        scaled(rng, table.defense, &mut g.defense, floor::UNIT, 1.) * table.defense_weight;

    if rng.random_bool(table.limb_count.clamp(0., 1.)) {
        let limbs = if rng.random_bool(0.5) {
            g.limb_count.saturating_add(1).min(floor::MAX_LIMBS)
        } else {
            g.limb_count.saturating_sub(1)
        };
        if limbs != g.limb_count {
            g.limb_count = limbs;
            magnitude += table.limb_magnitude;
        }
    }

    if table.hue_drift > 0. {
        g.color
            .shift_hue(rng.random_range(-table.hue_drift..table.hue_drift));
    }

    Mutation {
        genome: g,
        magnitude,
    }
}

#[cfg(test)]
use rand::SeedableRng;

#[cfg(test)]
fn test_genome() -> Genome {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(9);
    Genome::random(&mut rng, 1., false)
}

#[cfg(test)]
fn quiet_table() -> MutationConfig {
    let off = MutationRate::new(0., 0.1);
    MutationConfig {
        speed: off,
        size: off,
        sense_radius: off,
        repro_threshold: off,
        diet: off,
        amphibious: off,
        defense: off,
        limb_length: off,
        mouth_size: off,
        limb_count: 0.,
        hue_drift: 0.,
        ..MutationConfig::default()
    }
}

#[test]
fn no_rates_no_change() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(1);
    let parent = test_genome();
    for _ in 0..100 {
        let m = mutate(&parent, &quiet_table(), &mut rng);
        assert_eq!(m.genome, parent);
        assert_eq!(m.magnitude, 0.);
        assert!(!m.speciates(MutationConfig::default().speciation_threshold));
    }
}

#[test]
fn hue_drifts_without_magnitude() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(2);
    let parent = test_genome();
    let table = MutationConfig {
        hue_drift: 5.,
        ..quiet_table()
    };
    let m = mutate(&parent, &table, &mut rng);
    assert_eq!(m.magnitude, 0.);
    let diff = (m.genome.color.h - parent.color.h).rem_euclid(360.);
    assert!(diff < 5. || diff > 355.);
}

#[test]
fn floors_hold_under_heavy_mutation() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(3);
    let always = MutationRate::new(1., 0.95);
    let table = MutationConfig {
        speed: always,
        size: always,
        sense_radius: always,
        repro_threshold: always,
        diet: always,
        amphibious: always,
        defense: always,
        limb_length: always,
        mouth_size: always,
        limb_count: 1.,
        ..MutationConfig::default()
    };
    let mut g = test_genome();
    for _ in 0..2000 {
        g = mutate(&g, &table, &mut rng).genome;
        assert!(g.speed >= floor::SPEED);
        assert!(g.size >= floor::SIZE);
        assert!(g.sense_radius >= floor::SENSE_RADIUS);
        assert!(g.repro_threshold >= floor::REPRO_THRESHOLD);
        assert!(g.limb_length >= floor::LIMB_LENGTH);
        assert!(g.mouth_size >= floor::MOUTH_SIZE);
        for unit in [g.diet, g.amphibious, g.defense] {
            assert!((floor::UNIT..=1.).contains(&unit));
        }
        assert!(g.limb_count <= floor::MAX_LIMBS);
        assert!((0.0..360.).contains(&g.color.h));
    }
}

#[test]
fn diet_changes_are_weighted() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(4);
    let table = MutationConfig {
        diet: MutationRate::new(1., 0.5),
        ..quiet_table()
    };
    let parent = test_genome();
    for _ in 0..50 {
        let m = mutate(&parent, &table, &mut rng);
        let expected = (m.genome.diet - parent.diet).abs() * table.diet_weight;
        assert!((m.magnitude - expected).abs() < 1e-12);
    }
}

#[test]
fn limb_change_adds_flat_magnitude() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(5);
    let table = MutationConfig {
        limb_count: 1.,
        ..quiet_table()
    };
    let parent = test_genome();
    let m = mutate(&parent, &table, &mut rng);
    assert_eq!(m.genome.limb_count.abs_diff(parent.limb_count), 1);
    assert_eq!(m.magnitude, table.limb_magnitude);
}

#[test]
fn scaled_traits_count_absolute_change() {
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(6);
    let table = MutationConfig {
        sense_radius: MutationRate::new(1., 0.2),
        ..quiet_table()
    };
    let parent = test_genome();
    let mut moved = false;
    for _ in 0..50 {
        let m = mutate(&parent, &table, &mut rng);
        let delta = (m.genome.sense_radius - parent.sense_radius).abs();
        assert!((m.magnitude - delta).abs() < 1e-12);
        assert_eq!(m.genome.speed, parent.speed);
        moved |= delta > 1.;
    }
    // a sense radius in the 50s moves by whole pixels, not by fractions of its value
    assert!(moved);
}
