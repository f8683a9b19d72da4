//! procedural terrain.
//!
//! two independent layered gradient noise fields, elevation and moisture, both in [0, 1].
//! elevation picks the band (deep ocean, ocean, beach, land, mountain), moisture splits the land
//! band into plains, forest and jungle.
//!
//! classification is pure and deterministic for a seed. since the simulation asks for biomes
//! all the time the generator also bakes a lookup grid at `cache_cell` resolution.

use crate::config::TerrainConfig;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg64Mcg as DetRng;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    DeepOcean,
    Ocean,
    Beach,
    Plains,
    Forest,
    Jungle,
    Mountain,
}

impl Biome {
    pub const ALL: [Biome; 7] = [
        Biome::DeepOcean,
        Biome::Ocean,
        Biome::Beach,
        Biome::Plains,
        Biome::Forest,
        Biome::Jungle,
        Biome::Mountain,
    ];

    pub fn is_water(self) -> bool {
        matches!(self, Biome::DeepOcean | Biome::Ocean)
    }

    /// 0 for open water, 1 for dry land, the beach sits inbetween.
    /// compared against the amphibious gene.
    pub fn landness(self) -> f64 {
        match self {
            Biome::DeepOcean | Biome::Ocean => 0.,
            Biome::Beach => 0.5,
            Biome::Plains | Biome::Forest | Biome::Jungle | Biome::Mountain => 1.,
        }
    }

    /// velocity is multiplied by this every tick
    pub fn friction(self) -> f64 {
        match self {
            Biome::DeepOcean => 0.92,
            Biome::Ocean => 0.9,
            Biome::Beach => 0.88,
            Biome::Plains => 0.9,
            Biome::Forest => 0.86,
            Biome::Jungle => 0.82,
            Biome::Mountain => 0.78,
        }
    }

    /// expected offspring per food parent and tick, before the global spread rate
    pub fn growth_chance(self) -> f64 {
        match self {
            Biome::DeepOcean => 0.1,
            Biome::Ocean => 0.5,
            Biome::Beach => 0.2,
            Biome::Plains => 1.,
            Biome::Forest => 1.6,
            Biome::Jungle => 2.4,
            Biome::Mountain => 0.15,
        }
    }

    /// how far offspring food lands from its parent
    pub fn spread_radius(self) -> f64 {
        match self {
            Biome::DeepOcean => 40.,
            Biome::Ocean => 30.,
            Biome::Beach => 20.,
            Biome::Plains => 35.,
            Biome::Forest => 22.,
            Biome::Jungle => 15.,
            Biome::Mountain => 25.,
        }
    }

    // elevation band, plains/forest/jungle share one
    fn band(self) -> u8 {
        match self {
            Biome::DeepOcean => 0,
            Biome::Ocean => 1,
            Biome::Beach => 2,
            Biome::Plains | Biome::Forest | Biome::Jungle => 3,
            Biome::Mountain => 4,
        }
    }

    /// whether food may spread from self into other.
    /// needs the same water/land category and at most one elevation band apart.
    pub fn is_similar(self, other: Biome) -> bool {
        self == other
            || (self.is_water() == other.is_water() && self.band().abs_diff(other.band()) <= 1)
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            Biome::DeepOcean => [18, 40, 92],
            Biome::Ocean => [34, 78, 150],
            Biome::Beach => [214, 200, 140],
            Biome::Plains => [128, 178, 82],
            Biome::Forest => [52, 120, 56],
            Biome::Jungle => [24, 88, 40],
            Biome::Mountain => [124, 116, 108],
        }
    }
}

/// 2d gradient noise over a shuffled permutation table
#[derive(Clone)]
struct Noise {
    perm: [u8; 512],
}

impl std::fmt::Debug for Noise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Noise").field("perm", &&self.perm[..8]).finish()
    }
}

impl Noise {
    fn new(seed: u64) -> Self {
        let mut rng = DetRng::seed_from_u64(seed);
        let mut p: Vec<u8> = (0..=255).collect();
        p.shuffle(&mut rng);
        let mut perm = [0; 512];
        for (i, v) in perm.iter_mut().enumerate() {
            *v = p[i & 255];
        }
        Self { perm }
    }

    /// roughly [-1, 1]
    fn sample(&self, x: f64, y: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let x = x - xf;
        let y = y - yf;
        let u = fade(x);
        let v = fade(y);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let b = p[xi + 1] as usize + yi;

        let aa = grad(p[a], x, y);
        let ba = grad(p[b], x - 1., y);
        let ab = grad(p[a + 1], x, y - 1.);
        let bb = grad(p[b + 1], x - 1., y - 1.);
        lerp(v, lerp(u, aa, ba), lerp(u, ab, bb))
    }

    /// summed octaves at doubling frequency and halving amplitude, normalized to [0, 1]
    fn fbm(&self, x: f64, y: f64, octaves: u32) -> f64 {
        let mut sum = 0.;
        let mut total = 0.;
        let mut amp = 1.;
        let mut freq = 1.;
        for _ in 0..octaves.max(1) {
            sum += self.sample(x * freq, y * freq) * amp;
            total += amp;
            amp *= 0.5;
            freq *= 2.;
        }
        ((sum / total) * 0.5 + 0.5).clamp(0., 1.)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6. - 15.) + 10.)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    match hash & 7 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x,
        5 => -x,
        6 => y,
        _ => -y,
    }
}

// keeps the two fields decorrelated for the same world seed
const MOISTURE_SALT: u64 = 0x6d6f_6973_7475_7265;

#[derive(Clone, Debug)]
pub struct Terrain {
    config: TerrainConfig,
    elevation: Noise,
    moisture: Noise,
    width: f64,
    height: f64,
    columns: usize,
    rows: usize,
    cache: Vec<Biome>,
}

impl Terrain {
    /// builds both noise fields and then the biome cache.
    ///
    /// the cache is filled from [`Terrain::classify`], which only reads the noise fields, so
    /// the noise is always complete before the first biome is asked for.
    pub fn generate(seed: u64, width: f64, height: f64, config: &TerrainConfig) -> Self {
        let columns = ((width / config.cache_cell).ceil() as usize).max(1);
        let rows = ((height / config.cache_cell).ceil() as usize).max(1);
        let mut terrain = Terrain {
            config: config.clone(),
            elevation: Noise::new(seed),
            moisture: Noise::new(seed ^ MOISTURE_SALT),
            width,
            height,
            columns,
            rows,
            cache: Vec::new(),
        };

        let mut cache = vec![Biome::DeepOcean; columns * rows];
        let cell = config.cache_cell;
        let t = &terrain;
        cache
            .par_chunks_mut(columns)
            .enumerate()
            .for_each(|(row, line)| {
                let y = (row as f64 + 0.5) * cell;
                for (col, slot) in line.iter_mut().enumerate() {
                    let x = (col as f64 + 0.5) * cell;
                    *slot = t.classify(x, y);
                }
            });
        terrain.cache = cache;
        terrain
    }

    pub fn width(&self) -> f64 {
        self.width
    }
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn elevation_at(&self, x: f64, y: f64) -> f64 {
        self.elevation
            .fbm(x / self.config.scale, y / self.config.scale, self.config.octaves)
    }

    pub fn moisture_at(&self, x: f64, y: f64) -> f64 {
        // moisture blobs are a bit smaller than the continents
        let scale = self.config.scale * 0.7;
        self.moisture.fbm(x / scale, y / scale, self.config.octaves)
    }

    /// uncached biome classification
    pub fn classify(&self, x: f64, y: f64) -> Biome {
        let c = &self.config;
        let e = self.elevation_at(x, y);
        if e < c.deep_ocean {
            Biome::DeepOcean
        } else if e < c.ocean {
            Biome::Ocean
        } else if e < c.beach {
            Biome::Beach
        } else if e >= c.mountain {
            Biome::Mountain
        } else {
            let m = self.moisture_at(x, y);
            if m < c.dry {
                Biome::Plains
            } else if m < c.wet {
                Biome::Forest
            } else {
                Biome::Jungle
            }
        }
    }

    /// cached lookup, coordinates outside the world use the nearest border cell
    pub fn biome_at(&self, x: f64, y: f64) -> Biome {
        if self.cache.is_empty() {
            return self.classify(x, y);
        }
        let col = cache_axis(x, self.config.cache_cell, self.columns);
        let row = cache_axis(y, self.config.cache_cell, self.rows);
        self.cache[col + row * self.columns]
    }

    /// the biome cache as rgb pixels, row major.
    /// returns (columns, rows, pixels), one pixel per cache cell.
    pub fn bitmap(&self) -> (usize, usize, Vec<[u8; 3]>) {
        let pixels = self.cache.iter().map(|b| b.color()).collect();
        (self.columns, self.rows, pixels)
    }

    /// share of the world covered by each biome, in [`Biome::ALL`] order
    pub fn coverage(&self) -> [f64; 7] {
        let mut counts = [0usize; 7];
        for b in &self.cache {
            counts[*b as usize] += 1;
        }
        let total = self.cache.len().max(1) as f64;
        counts.map(|c| c as f64 / total)
    }
}

fn cache_axis(v: f64, cell: f64, n: usize) -> usize {
    let c = (v / cell).floor();
    if !(c >= 0.) {
        0
    } else {
        (c as usize).min(n - 1)
    }
}

#[cfg(test)]
fn test_terrain(seed: u64) -> Terrain {
    Terrain::generate(seed, 800., 500., &TerrainConfig::default())
}

#[test]
fn same_seed_same_world() {
    let a = test_terrain(42);
    let b = test_terrain(42);
    for (x, y) in [(0., 0.), (123.4, 77.7), (799., 499.), (400., 250.)] {
        assert_eq!(a.elevation_at(x, y), b.elevation_at(x, y));
        assert_eq!(a.biome_at(x, y), b.biome_at(x, y));
    }
    assert_eq!(a.bitmap(), b.bitmap());
}

#[test]
fn fields_are_normalized() {
    let t = test_terrain(7);
    for i in 0..200 {
        let x = i as f64 * 13.7;
        let y = i as f64 * 7.3;
        let e = t.elevation_at(x, y);
        let m = t.moisture_at(x, y);
        assert!((0.0..=1.).contains(&e));
        assert!((0.0..=1.).contains(&m));
    }
}

#[test]
fn cache_agrees_with_classification_at_cell_centers() {
    let t = test_terrain(3);
    let cell = TerrainConfig::default().cache_cell;
    for (col, row) in [(0, 0), (10, 20), (150, 90), (199, 124)] {
        let x = (col as f64 + 0.5) * cell;
        let y = (row as f64 + 0.5) * cell;
        assert_eq!(t.biome_at(x, y), t.classify(x, y));
    }
    // out of bounds does not panic
    let _ = t.biome_at(-100., 1e9);
    let _ = t.biome_at(f64::NAN, f64::NAN);
}

#[test]
fn thresholds_order_the_bands() {
    let mut config = TerrainConfig::default();
    // everything is land with a mountain threshold above the max elevation
    config.deep_ocean = 0.;
    config.ocean = 0.;
    config.beach = 0.;
    config.mountain = 2.;
    let t = Terrain::generate(1, 200., 200., &config);
    let (_, _, pixels) = t.bitmap();
    assert!(pixels.iter().all(|p| {
        [Biome::Plains, Biome::Forest, Biome::Jungle]
            .iter()
            .any(|b| b.color() == *p)
    }));
}

#[test]
fn biome_similarity() {
    assert!(Biome::Plains.is_similar(Biome::Forest));
    assert!(Biome::Forest.is_similar(Biome::Mountain));
    assert!(Biome::DeepOcean.is_similar(Biome::Ocean));
    assert!(!Biome::Ocean.is_similar(Biome::Beach));
    assert!(!Biome::Beach.is_similar(Biome::Mountain));
}

#[test]
fn coverage_adds_up() {
    let shares = test_terrain(5).coverage();
    assert!((shares.iter().sum::<f64>() - 1.).abs() < 1e-9);

    let mut config = TerrainConfig::default();
    config.deep_ocean = 0.;
    config.ocean = 0.;
    config.beach = 0.;
    config.mountain = 2.;
    let land = Terrain::generate(1, 200., 200., &config).coverage();
    for (biome, share) in Biome::ALL.iter().zip(land) {
        if !matches!(biome, Biome::Plains | Biome::Forest | Biome::Jungle) {
            assert_eq!(share, 0.);
        }
    }
}
