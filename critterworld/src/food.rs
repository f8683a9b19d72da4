//! food and how it grows.
//!
//! food is either sprinkled randomly over the whole world or grows from existing food nearby.
//! the second channel makes food cluster along biome lines: offspring that would land in a
//! biome too different from its parent's is discarded.

use crate::config::FoodConfig;
use crate::terrain::Terrain;
use crate::vecmath::{self, Vector};
use cell_grid::CellGrid;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_derive::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    pub struct FoodId;
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub pos: Vector,
    /// 0 means eaten, the item is gone from the grid and waits for the cleanup pass
    pub energy: f64,
    pub age: u64,
    pub cell: usize,
}

pub type FoodMap = SlotMap<FoodId, Food>;
pub type FoodGrid = CellGrid<FoodId>;

/// adds a food item unless the cap is reached
pub fn spawn(
    foods: &mut FoodMap,
    grid: &mut FoodGrid,
    pos: Vector,
    energy: f64,
    max: usize,
) -> Option<FoodId> {
    if foods.len() >= max || !(energy > 0.) {
        return None;
    }
    let id = foods.insert(Food {
        pos,
        energy,
        age: 0,
        cell: 0,
    });
    foods[id].cell = grid.insert(id, &pos);
    Some(id)
}

/// configured energy with a bit of jitter
pub fn fresh_energy<R: Rng>(cfg: &FoodConfig, rng: &mut R) -> f64 {
    let jitter = if cfg.energy_jitter > 0. {
        rng.random_range(-cfg.energy_jitter..cfg.energy_jitter)
    } else {
        0.
    };
    (cfg.energy + jitter).max(1.)
}

/// one tick of food growth, returns how many items were added
pub fn update<R: Rng>(
    foods: &mut FoodMap,
    grid: &mut FoodGrid,
    terrain: &Terrain,
    cfg: &FoodConfig,
    rng: &mut R,
) -> usize {
    for f in foods.values_mut() {
        f.age += 1;
    }
    let ambient = sprinkle(foods, grid, terrain, cfg, cfg.spawn_quota, rng);
    ambient + spread(foods, grid, terrain, cfg, rng)
}

/// uniform random spawns anywhere in the world
pub fn sprinkle<R: Rng>(
    foods: &mut FoodMap,
    grid: &mut FoodGrid,
    terrain: &Terrain,
    cfg: &FoodConfig,
    n: usize,
    rng: &mut R,
) -> usize {
    let mut spawned = 0;
    for _ in 0..n {
        if foods.len() >= cfg.max {
            break;
        }
        let pos = [
            rng.random_range(0.0..terrain.width()),
            rng.random_range(0.0..terrain.height()),
        ];
        let energy = fresh_energy(cfg, rng);
        if spawn(foods, grid, pos, energy, cfg.max).is_some() {
            spawned += 1;
        }
    }
    spawned
}

/// clustered growth around a random sample of existing food
fn spread<R: Rng>(
    foods: &mut FoodMap,
    grid: &mut FoodGrid,
    terrain: &Terrain,
    cfg: &FoodConfig,
    rng: &mut R,
) -> usize {
    if cfg.spread_parents == 0 || foods.len() >= cfg.max {
        return 0;
    }
    let keys: Vec<FoodId> = foods
        .iter()
        .filter(|(_, f)| f.energy > 0.)
        .map(|(k, _)| k)
        .collect();
    let parents: Vec<Vector> = keys
        .choose_multiple(rng, cfg.spread_parents)
        .map(|k| foods[*k].pos)
        .collect();

    let mut spawned = 0;
    for parent in parents {
        let biome = terrain.biome_at(parent[0], parent[1]);
        let chance = (biome.growth_chance() * cfg.spread_rate).max(0.);
        // the integer part is guaranteed, the rest is a coin flip
        let mut n = chance.floor() as usize;
        if rng.random_bool(chance.fract()) {
            n += 1;
        }
        for _ in 0..n {
            if foods.len() >= cfg.max {
                return spawned;
            }
            let angle = rng.random_range(-std::f64::consts::PI..std::f64::consts::PI);
            let r = rng.random_range(0.0..biome.spread_radius());
            let pos = vecmath::add(parent, vecmath::scale(vecmath::from_heading(angle), r));
            if !(0.0..=terrain.width()).contains(&pos[0])
                || !(0.0..=terrain.height()).contains(&pos[1])
            {
                continue;
            }
            if !biome.is_similar(terrain.biome_at(pos[0], pos[1])) {
                continue;
            }
            let energy = fresh_energy(cfg, rng);
            if spawn(foods, grid, pos, energy, cfg.max).is_some() {
                spawned += 1;
            }
        }
    }
    spawned
}

/// drops eaten items and items older than max_age
/// returns the number of removed items
pub fn cleanup(foods: &mut FoodMap, grid: &mut FoodGrid, max_age: u64) -> usize {
    let before = foods.len();
    foods.retain(|id, f| {
        if f.energy <= 0. {
            // eaten food already left the grid
            false
        } else if f.age > max_age {
            grid.remove(id, f.cell);
            false
        } else {
            true
        }
    });
    before - foods.len()
}

#[cfg(test)]
use crate::config::TerrainConfig;
#[cfg(test)]
use rand::SeedableRng;

#[cfg(test)]
fn setup() -> (FoodMap, FoodGrid, Terrain) {
    let terrain = Terrain::generate(5, 600., 400., &TerrainConfig::default());
    (SlotMap::with_key(), CellGrid::new(600., 400., 50.), terrain)
}

#[test]
fn never_exceeds_the_cap() {
    let cfg = FoodConfig {
        max: 300,
        spawn_quota: 25,
        spread_parents: 100,
        spread_rate: 3.,
        ..FoodConfig::default()
    };
    let (mut foods, mut grid, terrain) = setup();
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(1);
    for _ in 0..200 {
        update(&mut foods, &mut grid, &terrain, &cfg, &mut rng);
        assert!(foods.len() <= cfg.max);
        assert_eq!(grid.len(), foods.len());
    }
    assert_eq!(foods.len(), cfg.max);
}

#[test]
fn offspring_stays_in_similar_biomes() {
    let cfg = FoodConfig {
        max: 5000,
        spawn_quota: 0,
        spread_parents: 50,
        spread_rate: 2.,
        ..FoodConfig::default()
    };
    let (mut foods, mut grid, terrain) = setup();
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(2);
    let seeds = sprinkle(&mut foods, &mut grid, &terrain, &cfg, 40, &mut rng);
    assert_eq!(seeds, 40);
    let originals: Vec<Vector> = foods.values().map(|f| f.pos).collect();
    let before: Vec<FoodId> = foods.keys().collect();
    update(&mut foods, &mut grid, &terrain, &cfg, &mut rng);
    for (id, f) in foods.iter() {
        if before.contains(&id) {
            continue;
        }
        let child = terrain.biome_at(f.pos[0], f.pos[1]);
        // some original within spread range has a similar biome
        assert!(originals.iter().any(|p| {
            let parent = terrain.biome_at(p[0], p[1]);
            vecmath::dist2(*p, f.pos) <= parent.spread_radius().powi(2) && parent.is_similar(child)
        }));
    }
}

#[test]
fn cleanup_drops_eaten_and_rotten() {
    let (mut foods, mut grid, _) = setup();
    let fresh = spawn(&mut foods, &mut grid, [10., 10.], 5., 10).unwrap();
    let eaten = spawn(&mut foods, &mut grid, [20., 10.], 5., 10).unwrap();
    let rotten = spawn(&mut foods, &mut grid, [30., 10.], 5., 10).unwrap();
    // eating takes the item out of the grid right away
    foods[eaten].energy = 0.;
    assert!(grid.remove(eaten, foods[eaten].cell));
    foods[rotten].age = 1000;

    assert_eq!(cleanup(&mut foods, &mut grid, 500), 2);
    assert!(foods.contains_key(fresh));
    assert_eq!(foods.len(), 1);
    assert_eq!(grid.len(), 1);
}

#[test]
fn spawn_respects_cap_and_energy() {
    let (mut foods, mut grid, _) = setup();
    assert!(spawn(&mut foods, &mut grid, [1., 1.], 0., 10).is_none());
    assert!(spawn(&mut foods, &mut grid, [1., 1.], 1., 1).is_some());
    assert!(spawn(&mut foods, &mut grid, [1., 1.], 1., 1).is_none());
}
