use crate::behavior::State;
use crate::config::{MetabolismConfig, PhysicsConfig};
use crate::food::FoodId;
use crate::genetics::Genome;
use crate::species::SpeciesId;
use crate::terrain::Biome;
use crate::vecmath::{self, Vector};
use cell_grid::CellGrid;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct CritterId;
}

pub type CritterGrid = CellGrid<CritterId>;

/// what a critter is currently after
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// hunted or fled from, position is the last one seen
    Critter { id: CritterId, last_pos: Vector },
    Food { id: FoodId, pos: Vector },
}


/// a physics primitive to apply for one tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Steering {
    Seek(Vector),
    Flee(Vector),
    Wander,
    Rest,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Critter {
    pub species: SpeciesId,
    pub pos: Vector,
    pub vel: Vector,
    /// radians
    pub heading: f64,
    /// dies at <= 0
    pub energy: f64,
    /// in ticks
    pub age: u64,
    pub genome: Genome,
    pub state: State,
    pub target: Option<Target>,
    /// tick at which behaviour is re-evaluated
    pub next_think: u64,
    /// grid cell cache, kept in sync with pos by [`Critter::integrate`]
    pub cell: usize,
    pub generation: u32,
    pub children: u32,
}

impl Critter {
    /// 0 if the amphibious gene fits the biome perfectly, 1 for a fish on a mountain
    pub fn habitat_mismatch(&self, biome: Biome) -> f64 {
        (self.genome.amphibious - biome.landness()).abs()
    }

    /// how well the critter gets around in the biome, drops off sharply with mismatch
    pub fn suitability(&self, biome: Biome, cfg: &PhysicsConfig) -> f64 {
        let fit = 1. - self.habitat_mismatch(biome);
        (fit * fit).max(cfg.min_suitability)
    }

    pub fn max_speed(&self, biome: Biome, cfg: &PhysicsConfig) -> f64 {
        let g = &self.genome;
        let base = g.speed + g.limb_count as f64 * g.limb_length * cfg.limb_speed;
        let body = 1. + g.size * cfg.size_drag;
        let armor = (1. - g.defense * cfg.armor_drag).max(0.);
        base * self.suitability(biome, cfg) * armor / body
    }

    /// max turn per tick in radians
    pub fn agility(&self, biome: Biome, cfg: &PhysicsConfig) -> f64 {
        let g = &self.genome;
        let limbs = cfg.base_agility + g.limb_count as f64 * cfg.limb_agility;
        limbs * self.suitability(biome, cfg) / (1. + g.size * cfg.size_agility)
    }

    /// turns towards the target heading along the shorter side, at most `agility` radians
    pub fn turn_towards(&mut self, target: f64, agility: f64) {
        let delta = vecmath::angle_delta(self.heading, target);
        let step = delta.clamp(-agility, agility);
        self.heading = vecmath::rad_norm(self.heading + step);
    }

    /// accelerates along the current heading
    pub fn thrust(&mut self, throttle: f64, biome: Biome, cfg: &PhysicsConfig) {
        let accel = self.max_speed(biome, cfg) * cfg.thrust * throttle.clamp(0., 1.);
        let push = vecmath::scale(vecmath::from_heading(self.heading), accel);
        self.vel = vecmath::add(self.vel, push);
    }

    pub fn clamp_to_max_speed(&mut self, biome: Biome, cfg: &PhysicsConfig) {
        let max = self.max_speed(biome, cfg);
        let speed = vecmath::len(self.vel);
        if speed > max {
            self.vel = vecmath::scale(self.vel, max / speed);
        }
    }

    /// turns and accelerates according to the steering primitive
    pub fn steer<R: Rng>(
        &mut self,
        steering: Steering,
        wander_jitter: f64,
        wander_throttle: f64,
        biome: Biome,
        cfg: &PhysicsConfig,
        rng: &mut R,
    ) {
        let agility = self.agility(biome, cfg);
        match steering {
            Steering::Seek(goal) => {
                let to = vecmath::sub(goal, self.pos);
                if vecmath::len2(to) > 0. {
                    self.turn_towards(vecmath::heading(to), agility);
                }
                self.thrust(1., biome, cfg);
            }
            Steering::Flee(threat) => {
                let away = vecmath::sub(self.pos, threat);
                let target = if vecmath::len2(away) > 0. {
                    vecmath::heading(away)
                } else {
                    // right on top of it, any direction will do
                    self.heading + std::f64::consts::PI
                };
                self.turn_towards(target, agility);
                self.thrust(1., biome, cfg);
            }
            Steering::Wander => {
                if wander_jitter > 0. {
                    let target = self.heading + rng.random_range(-wander_jitter..wander_jitter);
                    self.turn_towards(target, agility);
                }
                self.thrust(wander_throttle, biome, cfg);
            }
            // friction does the braking
            Steering::Rest => {}
        }
    }

    /// applies friction, moves, bounces off the world edges and updates the grid cell
    pub fn integrate(
        &mut self,
        id: CritterId,
        biome: Biome,
        bounds: Vector,
        grid: &mut CritterGrid,
    ) {
        self.vel = vecmath::scale(self.vel, biome.friction());
        self.pos = vecmath::add(self.pos, self.vel);
        self.bounce(bounds);
        self.cell = grid.relocate(id, self.cell, &self.pos);
    }

    /// reflects off the world edges and points the heading back inside
    fn bounce(&mut self, bounds: Vector) {
        let mut normal = [0., 0.];
        for axis in 0..2 {
            if self.pos[axis] < 0. {
                self.pos[axis] = 0.;
                self.vel[axis] = self.vel[axis].abs();
                normal[axis] = 1.;
            } else if self.pos[axis] > bounds[axis] {
                self.pos[axis] = bounds[axis];
                self.vel[axis] = -self.vel[axis].abs();
                normal[axis] = -1.;
            }
        }
        if normal != [0., 0.] {
            self.heading = if vecmath::len2(self.vel) > 0. {
                vecmath::heading(self.vel)
            } else {
                vecmath::heading(normal)
            };
        }
    }

    /// the energy cost of this tick, always positive
    pub fn tick_cost(&self, biome: Biome, physics: &PhysicsConfig, cfg: &MetabolismConfig) -> f64 {
        let g = &self.genome;
        let efficiency = self.suitability(biome, physics);
        let movement = vecmath::len(self.vel) * g.size * cfg.movement / efficiency;
        let mismatch = self.habitat_mismatch(biome);
        let suffocation = (mismatch - cfg.suffocation_dead_zone).max(0.) * cfg.suffocation;
        let cost = cfg.existence
            + g.limb_count as f64 * cfg.per_limb
            + g.mouth_size * cfg.mouth
            + g.size * g.size * cfg.size_sq
            + g.defense * cfg.defense
            + movement
            + suffocation;
        if self.state == State::Resting {
            cost * cfg.rest_discount
        } else {
            cost
        }
    }

    /// deducts the tick cost from the energy and returns it
    pub fn metabolize(&mut self, biome: Biome, physics: &PhysicsConfig, cfg: &MetabolismConfig) -> f64 {
        let cost = self.tick_cost(biome, physics, cfg);
        debug_assert!(cost > 0., "metabolism turned net positive: {}", cost);
        self.energy -= cost;
        cost
    }

    /// reach for biting prey
    pub fn attack_range(&self, prey: &Critter) -> f64 {
        self.genome.size + self.genome.mouth_size + prey.genome.size
    }

    /// reach for eating food
    pub fn eat_range(&self, food_radius: f64) -> f64 {
        self.genome.size + self.genome.mouth_size + food_radius
    }
}

#[cfg(test)]
use crate::genetics::Hsl;

#[cfg(test)]
pub(crate) fn test_critter(pos: Vector) -> Critter {
    Critter {
        species: SpeciesId(0),
        pos,
        vel: [0., 0.],
        heading: 0.,
        energy: 50.,
        age: 0,
        genome: Genome {
            speed: 1.5,
            size: 5.,
            sense_radius: 60.,
            repro_threshold: 100.,
            color: Hsl {
                h: 0.,
                s: 50.,
                l: 50.,
            },
            diet: 0.1,
            amphibious: 1.,
            defense: 0.1,
            limb_count: 4,
            limb_length: 3.,
            mouth_size: 2.,
        },
        state: State::Wandering,
        target: None,
        next_think: 0,
        cell: 0,
        generation: 0,
        children: 0,
    }
}

#[test]
fn turning_is_rate_limited_and_takes_the_short_way() {
    use std::f64::consts::PI;
    let mut c = test_critter([0., 0.]);
    c.heading = 0.9 * PI;
    c.turn_towards(-0.9 * PI, 0.1);
    // crossing the +-pi seam instead of turning the long way round
    assert!((c.heading - (0.9 * PI + 0.1)).abs() < 1e-9);
    c.turn_towards(-0.9 * PI, 10.);
    assert!((c.heading + 0.9 * PI).abs() < 1e-9);
}

#[test]
fn habitat_mismatch_slows_down() {
    let cfg = PhysicsConfig::default();
    let land = test_critter([0., 0.]);
    let on_land = land.max_speed(Biome::Plains, &cfg);
    let in_water = land.max_speed(Biome::Ocean, &cfg);
    assert!(in_water < on_land * 0.2);

    let mut armored = test_critter([0., 0.]);
    armored.genome.defense = 1.;
    assert!(armored.max_speed(Biome::Plains, &cfg) < on_land);
    let mut big = test_critter([0., 0.]);
    big.genome.size = 20.;
    assert!(big.max_speed(Biome::Plains, &cfg) < on_land);
}

#[test]
fn thrust_is_capped() {
    let cfg = PhysicsConfig::default();
    let mut c = test_critter([0., 0.]);
    for _ in 0..100 {
        c.thrust(1., Biome::Plains, &cfg);
        c.clamp_to_max_speed(Biome::Plains, &cfg);
    }
    let max = c.max_speed(Biome::Plains, &cfg);
    assert!((vecmath::len(c.vel) - max).abs() < 1e-9);
    // heading 0 thrusts along +x
    assert!(c.vel[1].abs() < 1e-9 && c.vel[0] > 0.);
}

#[test]
fn bounces_off_walls() {
    let mut grid = CritterGrid::new(100., 100., 10.);
    let mut ids: slotmap::SlotMap<CritterId, ()> = slotmap::SlotMap::with_key();
    let id = ids.insert(());
    let mut c = test_critter([1., 50.]);
    c.cell = grid.insert(id, &c.pos);
    c.vel = [-5., 0.];
    c.heading = std::f64::consts::PI;
    c.integrate(id, Biome::Plains, [100., 100.], &mut grid);
    assert_eq!(c.pos[0], 0.);
    assert!(c.vel[0] > 0.);
    assert!(c.heading.abs() < 1e-9);
    assert_eq!(grid.cell(c.cell), &[id]);
}

#[test]
fn metabolism_always_costs() {
    let physics = PhysicsConfig::default();
    let cfg = MetabolismConfig::default();
    let mut c = test_critter([0., 0.]);
    let idle = c.tick_cost(Biome::Plains, &physics, &cfg);
    assert!(idle > 0.);
    c.vel = [1., 0.];
    let moving = c.tick_cost(Biome::Plains, &physics, &cfg);
    assert!(moving > idle);
    let drowning = c.tick_cost(Biome::DeepOcean, &physics, &cfg);
    assert!(drowning > moving);
    c.state = State::Resting;
    let resting = c.tick_cost(Biome::Plains, &physics, &cfg);
    assert!((resting - moving * cfg.rest_discount).abs() < 1e-12);

    let before = c.energy;
    let cost = c.metabolize(Biome::Plains, &physics, &cfg);
    assert_eq!(c.energy, before - cost);
}
