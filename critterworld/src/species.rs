//! the species registry.
//!
//! critters only hold a [`SpeciesId`], the registry owns the records. a species is founded with
//! a count of 0, gains members as they are spawned and goes extinct exactly once, the first time
//! its count drops back to 0.

use crate::genetics::Hsl;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    /// None only for the founding lineage
    pub parent: Option<SpeciesId>,
    pub generation: u32,
    pub color: Hsl,
    pub count: u32,
    pub extinct: bool,
    /// tick of founding
    pub first_appeared: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SpeciesRegistry {
    species: BTreeMap<SpeciesId, Species>,
    next: u32,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// creates a new species record with no members yet.
    /// the generation is the parent's + 1, 0 for a root.
    pub fn found<R: Rng>(
        &mut self,
        parent: Option<SpeciesId>,
        color: Hsl,
        tick: u64,
        rng: &mut R,
    ) -> &Species {
        let id = SpeciesId(self.next);
        self.next += 1;
        let generation = parent
            .and_then(|p| self.species.get(&p))
            .map(|p| p.generation + 1)
            .unwrap_or(0);
        let name = species_name(rng);
        self.species.entry(id).or_insert(Species {
            id,
            name,
            parent,
            generation,
            color,
            count: 0,
            extinct: false,
            first_appeared: tick,
        })
    }

    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(&id)
    }

    /// a critter of this species was spawned
    pub fn join(&mut self, id: SpeciesId) {
        match self.species.get_mut(&id) {
            Some(s) => {
                debug_assert!(!s.extinct, "spawned into extinct species {:?}", id);
                s.count += 1;
            }
            None => debug_assert!(false, "joined unknown species {:?}", id),
        }
    }

    /// a critter of this species was removed.
    /// returns the record if this made the species go extinct.
    pub fn leave(&mut self, id: SpeciesId) -> Option<&Species> {
        let s = self.species.get_mut(&id)?;
        debug_assert!(s.count > 0, "species {:?} count going negative", id);
        s.count = s.count.saturating_sub(1);
        if s.count == 0 && !s.extinct {
            s.extinct = true;
            Some(&*s)
        } else {
            None
        }
    }

    /// species that have not gone extinct
    pub fn living(&self) -> usize {
        self.species.values().filter(|s| !s.extinct).count()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.values()
    }

    /// a copy for consumers that outlive the tick
    pub fn snapshot(&self) -> BTreeMap<SpeciesId, Species> {
        self.species.clone()
    }
}

static ONSETS: &[&str] = &[
    "b", "br", "c", "cr", "d", "dr", "f", "g", "gl", "k", "l", "m", "n", "p", "ph", "qu", "r", "s",
    "sc", "st", "t", "th", "tr", "v", "x", "z",
];
static VOWELS: &[&str] = &["a", "e", "i", "o", "u", "ae", "ia", "io", "eu", "y"];
static ENDINGS: &[&str] = &[
    "us", "a", "um", "is", "ex", "ops", "odon", "ax", "ia", "ites", "oides", "ura",
];

fn pick<'a, R: Rng>(rng: &mut R, list: &[&'a str]) -> &'a str {
    list[rng.random_range(0..list.len())]
}

fn word<R: Rng>(rng: &mut R, syllables: usize) -> String {
    let mut w = String::new();
    for _ in 0..syllables {
        w.push_str(pick(rng, ONSETS));
        w.push_str(pick(rng, VOWELS));
    }
    w.push_str(pick(rng, ONSETS));
    w.push_str(pick(rng, ENDINGS));
    w
}

/// a latin-ish binomial like "Brathops tulax"
fn species_name<R: Rng>(rng: &mut R) -> String {
    let syllables = rng.random_range(1..=2);
    let genus = word(rng, syllables);
    let epithet = word(rng, 1);
    let mut chars = genus.chars();
    let genus: String = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .into_iter()
        .chain(chars)
        .collect();
    format!("{} {}", genus, epithet)
}

#[cfg(test)]
fn test_color() -> Hsl {
    Hsl {
        h: 10.,
        s: 50.,
        l: 50.,
    }
}

#[test]
fn lineage_and_generation() {
    use rand::SeedableRng;
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(1);
    let mut reg = SpeciesRegistry::new();
    let root = reg.found(None, test_color(), 0, &mut rng).id;
    let child = reg.found(Some(root), test_color(), 10, &mut rng).id;
    let grandchild = reg.found(Some(child), test_color(), 20, &mut rng).id;

    let g = reg.get(grandchild).unwrap();
    assert_eq!(g.parent, Some(child));
    assert_eq!(g.generation, 2);
    assert_eq!(g.first_appeared, 20);
    assert_eq!(reg.get(root).unwrap().parent, None);
    assert_eq!(reg.get(root).unwrap().generation, 0);
    assert_ne!(root, child);
}

#[test]
fn extinction_happens_once() {
    use rand::SeedableRng;
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(2);
    let mut reg = SpeciesRegistry::new();
    let id = reg.found(None, test_color(), 0, &mut rng).id;
    // freshly founded species are not extinct yet
    assert_eq!(reg.living(), 1);
    reg.join(id);
    reg.join(id);
    assert!(reg.leave(id).is_none());
    let extinct = reg.leave(id).map(|s| s.id);
    assert_eq!(extinct, Some(id));
    assert!(reg.get(id).unwrap().extinct);
    assert_eq!(reg.get(id).unwrap().count, 0);
    assert_eq!(reg.living(), 0);
}

#[test]
fn names_look_binomial() {
    use rand::SeedableRng;
    let mut rng = rand_pcg::Pcg64Mcg::seed_from_u64(3);
    for _ in 0..20 {
        let name = species_name(&mut rng);
        let mut parts = name.split(' ');
        let genus = parts.next().unwrap();
        assert!(genus.chars().next().unwrap().is_ascii_uppercase());
        assert!(parts.next().is_some());
        assert!(parts.next().is_none());
    }
}
