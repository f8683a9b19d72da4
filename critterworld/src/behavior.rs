//! utility based behaviour arbitration.
//!
//! on a think tick a critter looks around its 3×3 grid neighbourhood, turns what it sees into
//! three drives (fear, hunger, fatigue) and picks a [`State`] and target from them.
//! the first matching rule wins:
//!
//! 1. fear over `flee_fear`: flee from the nearest predator
//! 2. hunger over `seek_hunger`: hunt prey (carnivores) or seek food (herbivores), if any is in sight
//! 3. fatigue over `rest_fatigue` with no predator around: rest
//! 4. wander
//!
//! between think ticks the decision stands, only the steering towards the target is updated.

use crate::config::BehaviorConfig;
use crate::critter::{Critter, CritterGrid, CritterId, Target};
use crate::food::{FoodGrid, FoodId, FoodMap};
use crate::vecmath::{self, Vector};
use serde_derive::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    #[default]
    Wandering,
    SeekingFood,
    Fleeing,
    Hunting,
    Resting,
}

/// something seen, with its distance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sighting<K> {
    pub id: K,
    pub pos: Vector,
    pub dist: f64,
}

/// the nearest things of interest within the sense radius
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Senses {
    pub predator: Option<Sighting<CritterId>>,
    pub prey: Option<Sighting<CritterId>>,
    pub food: Option<Sighting<FoodId>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Drives {
    pub fear: f64,
    pub hunger: f64,
    pub fatigue: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub state: State,
    pub target: Option<Target>,
}

/// a carnivore at least `predator_size` times the observer's size
pub fn is_threat(other: &Critter, observer: &Critter, cfg: &BehaviorConfig) -> bool {
    other.genome.is_carnivore() && other.genome.size >= observer.genome.size * cfg.predator_size
}

/// size plus twice the mouth has to beat the defender's size inflated by its armour.
/// own species is never prey.
pub fn can_overpower(attacker: &Critter, defender: &Critter) -> bool {
    let attack = attacker.genome.size + 2. * attacker.genome.mouth_size;
    let guard = defender.genome.size * (1. + defender.genome.defense);
    attack > guard && attacker.species != defender.species
}

fn closer<K>(best: &mut Option<Sighting<K>>, candidate: Sighting<K>) {
    if best.as_ref().is_none_or(|b| candidate.dist < b.dist) {
        *best = Some(candidate);
    }
}

/// scans the grid neighbourhood of the observer
pub fn sense(
    id: CritterId,
    me: &Critter,
    critters: &SlotMap<CritterId, Critter>,
    grid: &CritterGrid,
    foods: &FoodMap,
    food_grid: &FoodGrid,
    cfg: &BehaviorConfig,
) -> Senses {
    let mut senses = Senses::default();
    let range2 = me.genome.sense_radius * me.genome.sense_radius;
    let carnivore = me.genome.is_carnivore();

    for &other_id in grid.query_cell(me.cell) {
        if other_id == id {
            continue;
        }
        let Some(other) = critters.get(other_id) else {
            debug_assert!(false, "grid holds a dead critter");
            continue;
        };
        let d2 = vecmath::dist2(me.pos, other.pos);
        if d2 > range2 {
            continue;
        }
        let sighting = Sighting {
            id: other_id,
            pos: other.pos,
            dist: d2.sqrt(),
        };
        if is_threat(other, me, cfg) {
            closer(&mut senses.predator, sighting);
        }
        if carnivore && can_overpower(me, other) {
            closer(&mut senses.prey, sighting);
        }
    }

    if !carnivore {
        for &food_id in food_grid.query_point(&me.pos) {
            let Some(food) = foods.get(food_id) else {
                continue;
            };
            if food.energy <= 0. {
                continue;
            }
            let d2 = vecmath::dist2(me.pos, food.pos);
            if d2 <= range2 {
                closer(
                    &mut senses.food,
                    Sighting {
                        id: food_id,
                        pos: food.pos,
                        dist: d2.sqrt(),
                    },
                );
            }
        }
    }
    senses
}

impl Drives {
    pub fn of(me: &Critter, senses: &Senses, cfg: &BehaviorConfig) -> Self {
        let fear = senses
            .predator
            .map(|p| (1. - p.dist / me.genome.sense_radius).max(0.))
            .unwrap_or(0.);
        let hunger = (1. - me.energy / me.genome.repro_threshold).max(0.);
        let exhausted = me.energy < cfg.exhaustion * me.genome.repro_threshold;
        let fatigue = if exhausted && senses.predator.is_none() {
            cfg.fatigue
        } else {
            0.
        };
        Self {
            fear,
            hunger,
            fatigue,
        }
    }
}

pub fn arbitrate(me: &Critter, senses: &Senses, drives: &Drives, cfg: &BehaviorConfig) -> Decision {
    if drives.fear > cfg.flee_fear {
        if let Some(p) = senses.predator {
            return Decision {
                state: State::Fleeing,
                target: Some(Target::Critter {
                    id: p.id,
                    last_pos: p.pos,
                }),
            };
        }
    }
    if drives.hunger > cfg.seek_hunger {
        if me.genome.is_carnivore() {
            if let Some(p) = senses.prey {
                return Decision {
                    state: State::Hunting,
                    target: Some(Target::Critter {
                        id: p.id,
                        last_pos: p.pos,
                    }),
                };
            }
        } else if let Some(f) = senses.food {
            return Decision {
                state: State::SeekingFood,
                target: Some(Target::Food {
                    id: f.id,
                    pos: f.pos,
                }),
            };
        }
    }
    if drives.fatigue > cfg.rest_fatigue && senses.predator.is_none() {
        return Decision {
            state: State::Resting,
            target: None,
        };
    }
    Decision {
        state: State::Wandering,
        target: None,
    }
}

/// sense, weigh and decide in one go
pub fn think(
    id: CritterId,
    me: &Critter,
    critters: &SlotMap<CritterId, Critter>,
    grid: &CritterGrid,
    foods: &FoodMap,
    food_grid: &FoodGrid,
    cfg: &BehaviorConfig,
) -> Decision {
    let senses = sense(id, me, critters, grid, foods, food_grid, cfg);
    let drives = Drives::of(me, &senses, cfg);
    arbitrate(me, &senses, &drives, cfg)
}

#[cfg(test)]
use crate::critter::test_critter;
#[cfg(test)]
use crate::species::SpeciesId;

#[cfg(test)]
struct Scene {
    critters: SlotMap<CritterId, Critter>,
    grid: CritterGrid,
    foods: FoodMap,
    food_grid: FoodGrid,
}

#[cfg(test)]
impl Scene {
    fn new() -> Self {
        Self {
            critters: SlotMap::with_key(),
            grid: CritterGrid::new(500., 500., 100.),
            foods: SlotMap::with_key(),
            food_grid: FoodGrid::new(500., 500., 100.),
        }
    }
    fn add(&mut self, c: Critter) -> CritterId {
        let pos = c.pos;
        let id = self.critters.insert(c);
        self.critters[id].cell = self.grid.insert(id, &pos);
        id
    }
    fn food(&mut self, pos: Vector, energy: f64) -> FoodId {
        crate::food::spawn(&mut self.foods, &mut self.food_grid, pos, energy, 100).unwrap()
    }
    fn think(&self, id: CritterId) -> Decision {
        let cfg = BehaviorConfig::default();
        think(
            id,
            &self.critters[id],
            &self.critters,
            &self.grid,
            &self.foods,
            &self.food_grid,
            &cfg,
        )
    }
}

#[cfg(test)]
fn carnivore(pos: Vector, species: u32) -> Critter {
    let mut c = test_critter(pos);
    c.genome.diet = 0.9;
    c.genome.size = 8.;
    c.species = SpeciesId(species);
    c
}

#[test]
fn nothing_around_means_wandering() {
    let mut scene = Scene::new();
    let mut me = test_critter([250., 250.]);
    me.energy = 90.;
    let id = scene.add(me);
    assert_eq!(scene.think(id).state, State::Wandering);
}

#[test]
fn close_predator_makes_flee() {
    let mut scene = Scene::new();
    let me = scene.add(test_critter([250., 250.]));
    let predator = scene.add(carnivore([255., 250.], 1));
    let d = scene.think(me);
    assert_eq!(d.state, State::Fleeing);
    assert!(matches!(d.target, Some(Target::Critter { id, .. }) if id == predator));
}

#[test]
fn distant_predator_is_ignored_by_fear() {
    let mut scene = Scene::new();
    let mut me = test_critter([250., 250.]);
    me.energy = 90.;
    let me = scene.add(me);
    // 50 of 60 sense radius away, fear is 1/6
    scene.add(carnivore([300., 250.], 1));
    assert_eq!(scene.think(me).state, State::Wandering);
}

#[test]
fn small_carnivores_are_no_threat() {
    let mut scene = Scene::new();
    let mut me = test_critter([250., 250.]);
    me.energy = 90.;
    let me = scene.add(me);
    let mut tiny = carnivore([252., 250.], 1);
    tiny.genome.size = 3.;
    scene.add(tiny);
    assert_eq!(scene.think(me).state, State::Wandering);
}

#[test]
fn hungry_herbivore_seeks_nearest_food() {
    let mut scene = Scene::new();
    let mut me = test_critter([250., 250.]);
    me.energy = 30.;
    let me = scene.add(me);
    scene.food([280., 250.], 10.);
    let near = scene.food([260., 250.], 10.);
    let eaten = scene.food([255., 250.], 10.);
    scene.foods[eaten].energy = 0.;
    let d = scene.think(me);
    assert_eq!(d.state, State::SeekingFood);
    assert!(matches!(d.target, Some(Target::Food { id, .. }) if id == near));
}

#[test]
fn hungry_carnivore_hunts_other_species_only() {
    let mut scene = Scene::new();
    let mut hunter = carnivore([250., 250.], 1);
    hunter.energy = 30.;
    let hunter = scene.add(hunter);
    let mut sibling = test_critter([255., 250.]);
    sibling.species = SpeciesId(1);
    scene.add(sibling);
    assert_eq!(scene.think(hunter).state, State::Wandering);

    let prey = scene.add(test_critter([270., 250.]));
    let d = scene.think(hunter);
    assert_eq!(d.state, State::Hunting);
    assert!(matches!(d.target, Some(Target::Critter { id, .. }) if id == prey));
}

#[test]
fn armour_protects() {
    let hunter = carnivore([0., 0.], 1);
    let mut prey = test_critter([0., 0.]);
    assert!(can_overpower(&hunter, &prey));
    prey.genome.size = 8.;
    prey.genome.defense = 1.;
    assert!(!can_overpower(&hunter, &prey));
}

#[test]
fn exhausted_critters_rest() {
    let mut scene = Scene::new();
    let mut me = test_critter([250., 250.]);
    me.energy = 10.;
    let me = scene.add(me);
    assert_eq!(scene.think(me).state, State::Resting);
}
