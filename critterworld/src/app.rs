use crate::behavior::{self, State};
use crate::config::{Config, ConfigError};
use crate::critter::{Critter, CritterGrid, CritterId, Steering, Target};
use crate::events::{Event, EventBus, LogCategory, Subscription};
use crate::food::{self, FoodGrid, FoodMap};
use crate::genetics::{self, Genome, Hsl};
use crate::species::{Species, SpeciesId, SpeciesRegistry};
use crate::terrain::Terrain;
use crate::vecmath::{self, Vector};
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg as DetRng;
use serde_derive::Serialize;
use slotmap::SlotMap;
use std::collections::BTreeMap;
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DeathCause {
    Starvation,
    OldAge,
    Predation,
    Eliminated,
    AreaDamage,
}

/// cumulative deaths per cause since the last reset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Deaths {
    pub starvation: u64,
    pub old_age: u64,
    pub predation: u64,
    pub eliminated: u64,
    pub area_damage: u64,
}

impl Deaths {
    fn record(&mut self, cause: DeathCause) {
        let counter = match cause {
            DeathCause::Starvation => &mut self.starvation,
            DeathCause::OldAge => &mut self.old_age,
            DeathCause::Predation => &mut self.predation,
            DeathCause::Eliminated => &mut self.eliminated,
            DeathCause::AreaDamage => &mut self.area_damage,
        };
        *counter += 1;
    }

    pub fn total(&self) -> u64 {
        self.starvation + self.old_age + self.predation + self.eliminated + self.area_damage
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionMode {
    Inspect,
    Feed,
    Eliminate,
    AreaDamage,
}

/// what an [`App::interact`] call did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    Selected(Option<CritterId>),
    /// number of food items spawned, less than the batch if the cap was hit
    Fed(usize),
    Eliminated(Option<CritterId>),
    Damaged { critters: usize, food: usize },
}

/// the simulation.
///
/// owns every entity collection, both spatial grids and the species registry.
/// the only ways to change anything are [`App::tick`], [`App::interact`], the spawn functions
/// and [`App::reset`].
#[derive(Debug)]
pub struct App {
    config: Config,
    seed: u64,
    terrain: Terrain,
    critters: SlotMap<CritterId, Critter>,
    critter_grid: CritterGrid,
    foods: FoodMap,
    food_grid: FoodGrid,
    species: SpeciesRegistry,
    tick: u64,
    rng: DetRng,
    selection: Option<CritterId>,
    events: EventBus,
    births: u64,
    deaths: Deaths,
}

impl App {
    /// validates the config and seeds a fresh world
    pub fn new(config: Config, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut app = Self::empty(config, seed, EventBus::new());
        app.populate();
        tracing::info!(seed, population = app.critters.len(), "world created");
        Ok(app)
    }

    fn empty(config: Config, seed: u64, events: EventBus) -> Self {
        let w = &config.world;
        let terrain = Terrain::generate(seed, w.width, w.height, &config.terrain);
        let critter_grid = CritterGrid::new(w.width, w.height, w.critter_cell);
        let food_grid = FoodGrid::new(w.width, w.height, w.food_cell);
        App {
            seed,
            terrain,
            critters: SlotMap::with_capacity_and_key(config.population.initial),
            critter_grid,
            foods: SlotMap::with_capacity_and_key(config.food.initial),
            food_grid,
            species: SpeciesRegistry::new(),
            tick: 0,
            rng: DetRng::seed_from_u64(seed),
            selection: None,
            events,
            births: 0,
            deaths: Deaths::default(),
            config,
        }
    }

    /// tears everything down and generates a new world. subscribers stay subscribed.
    pub fn reset(&mut self, seed: u64) {
        let had_selection = self.selection.is_some();
        let events = std::mem::take(&mut self.events);
        *self = Self::empty(self.config.clone(), seed, events);
        if had_selection {
            self.events.publish(Event::SelectionChanged(None));
        }
        self.populate();
        tracing::info!(seed, population = self.critters.len(), "world reset");
        self.events.log(
            format!("a new world grows from seed {}", seed),
            LogCategory::World,
            None,
        );
    }

    /// founders land at random spots with an amphibious gene that fits the spot.
    /// herbivores and carnivores each get their own founding species.
    fn populate(&mut self) {
        let mut herbivores = None;
        let mut carnivores = None;
        for _ in 0..self.config.population.initial {
            let pos = [
                self.rng.random_range(0.0..self.config.world.width),
                self.rng.random_range(0.0..self.config.world.height),
            ];
            let landness = self.terrain.biome_at(pos[0], pos[1]).landness();
            let carnivore = self.rng.random_bool(self.config.population.carnivore_share);
            let mut genome = Genome::random(&mut self.rng, landness, carnivore);

            let slot = if carnivore {
                &mut carnivores
            } else {
                &mut herbivores
            };
            let (species, color) = match *slot {
                Some(founded) => founded,
                None => {
                    let hue = if carnivore {
                        self.rng.random_range(-20.0..20.)
                    } else {
                        self.rng.random_range(80.0..160.)
                    };
                    let mut color = Hsl {
                        h: 0.,
                        s: 65.,
                        l: 50.,
                    };
                    color.shift_hue(hue);
                    let id = self.found_species(None, color);
                    *slot = Some((id, color));
                    (id, color)
                }
            };
            genome.color.h = color.h;
            genome
                .color
                .shift_hue(self.rng.random_range(-10.0..10.));

            let energy = genome.repro_threshold * self.rng.random_range(0.5..0.8);
            self.spawn_critter(genome, pos, energy, species);
        }
        food::sprinkle(
            &mut self.foods,
            &mut self.food_grid,
            &self.terrain,
            &self.config.food,
            self.config.food.initial,
            &mut self.rng,
        );
    }

    /// registers a new species, members can then be spawned into it
    pub fn found_species(&mut self, parent: Option<SpeciesId>, color: Hsl) -> SpeciesId {
        let s = self
            .species
            .found(parent, color, self.tick, &mut self.rng)
            .clone();
        tracing::debug!(id = s.id.0, name = %s.name, generation = s.generation, "new species");
        let id = s.id;
        let message = match parent.and_then(|p| self.species.get(p)) {
            Some(p) => format!("{} branched off {}", s.name, p.name),
            None => format!("{} appeared", s.name),
        };
        let color = s.color;
        self.events.publish(Event::SpeciesNew(s));
        self.events
            .log(message, LogCategory::Species, Some(color));
        id
    }

    /// places a critter into the world.
    /// refused at the population cap and for unknown or extinct species.
    pub fn spawn_critter(
        &mut self,
        genome: Genome,
        pos: Vector,
        energy: f64,
        species: SpeciesId,
    ) -> Option<CritterId> {
        if self.critters.len() >= self.config.population.max {
            return None;
        }
        if self.species.get(species).is_none_or(|s| s.extinct) {
            return None;
        }
        let pos = self.clamp_to_world(pos);
        let critter = Critter {
            species,
            pos,
            vel: [0., 0.],
            heading: self.rng.random_range(-PI..PI),
            energy,
            age: 0,
            genome,
            state: State::Wandering,
            target: None,
            next_think: self.tick,
            cell: self.critter_grid.cell_index(&pos),
            generation: 0,
            children: 0,
        };
        let id = self.critters.insert(critter);
        self.critter_grid.insert(id, &pos);
        self.species.join(species);
        Some(id)
    }

    /// places a food item, refused at the food cap
    pub fn spawn_food(&mut self, pos: Vector, energy: f64) -> Option<food::FoodId> {
        let pos = self.clamp_to_world(pos);
        food::spawn(
            &mut self.foods,
            &mut self.food_grid,
            pos,
            energy,
            self.config.food.max,
        )
    }

    fn clamp_to_world(&self, pos: Vector) -> Vector {
        let w = &self.config.world;
        let clamp = |v: f64, max: f64| if v.is_nan() { 0. } else { v.clamp(0., max) };
        [clamp(pos[0], w.width), clamp(pos[1], w.height)]
    }

    /// splits off a child. the parent keeps `parent_share` of its energy, the child starts with
    /// `offspring_share` of it, the rest is lost.
    ///
    /// speciation is decided here, once, from the mutation magnitude.
    pub fn reproduce(&mut self, id: CritterId) -> Option<CritterId> {
        if self.critters.len() >= self.config.population.max {
            return None;
        }
        let parent = self.critters.get(id)?;
        let before = parent.energy;
        if !(before > 0.) {
            return None;
        }
        let (parent_species, parent_pos, parent_size, generation) = (
            parent.species,
            parent.pos,
            parent.genome.size,
            parent.generation + 1,
        );
        let mutation = genetics::mutate(&parent.genome, &self.config.mutation, &mut self.rng);
        let mut genome = mutation.genome;
        let species = if mutation.speciates(self.config.mutation.speciation_threshold) {
            genome
                .color
                .shift_hue(self.config.mutation.speciation_hue_jump);
            self.found_species(Some(parent_species), genome.color)
        } else {
            parent_species
        };

        let angle = self.rng.random_range(-PI..PI);
        let pos = vecmath::add(
            parent_pos,
            vecmath::scale(vecmath::from_heading(angle), parent_size),
        );
        let share = &self.config.population;
        let child_energy = before * share.offspring_share;
        let parent_energy = before * share.parent_share;

        let child = self.spawn_critter(genome, pos, child_energy, species)?;
        self.critters[child].generation = generation;
        let parent = &mut self.critters[id];
        parent.energy = parent_energy;
        parent.children += 1;
        self.births += 1;
        Some(child)
    }

    /// removes a critter from everything that knows about it
    fn kill(&mut self, id: CritterId, cause: DeathCause) -> Option<Critter> {
        let critter = self.critters.remove(id)?;
        let removed = self.critter_grid.remove(id, critter.cell);
        debug_assert!(removed, "critter {:?} was missing from the grid", id);
        self.deaths.record(cause);

        if let Some(gone) = self.species.leave(critter.species).cloned() {
            tracing::debug!(id = gone.id.0, name = %gone.name, tick = self.tick, "extinct");
            let message = format!("{} died out", gone.name);
            let color = gone.color;
            self.events.publish(Event::SpeciesExtinct(gone));
            self.events
                .log(message, LogCategory::Species, Some(color));
        }
        if self.selection == Some(id) {
            self.selection = None;
            self.events.publish(Event::SelectionChanged(None));
        }
        Some(critter)
    }

    /// advances the world by one tick
    pub fn tick(&mut self) {
        self.tick += 1;
        food::update(
            &mut self.foods,
            &mut self.food_grid,
            &self.terrain,
            &self.config.food,
            &mut self.rng,
        );

        // newborns join the update next tick
        let ids: Vec<CritterId> = self.critters.keys().collect();
        for id in ids {
            self.update_critter(id);
        }

        let ticks = &self.config.ticks;
        if self.tick % ticks.cleanup_interval == 0 {
            food::cleanup(&mut self.foods, &mut self.food_grid, self.config.food.max_age);
        }
        if self.tick % ticks.stats_interval == 0 {
            let event = Event::StatsUpdate {
                tick: self.tick,
                population: self.critters.len(),
                species: self.species.living(),
            };
            self.events.publish(event);
        }
        if ticks.report_interval > 0 && self.tick % ticks.report_interval == 0 {
            tracing::info!("\n{}", self.report());
        }
    }

    fn update_critter(&mut self, id: CritterId) {
        // may have been eaten earlier this tick
        let Some(c) = self.critters.get_mut(id) else {
            return;
        };
        c.age += 1;

        let c = &self.critters[id];
        let target_gone = match c.target {
            Some(Target::Critter { id: other, .. }) => !self.critters.contains_key(other),
            Some(Target::Food { id: food, .. }) => {
                !self.foods.get(food).is_some_and(|f| f.energy > 0.)
            }
            None => false,
        };
        if target_gone || self.tick >= c.next_think {
            self.think(id);
        }

        let steering = self.pursue(id);

        let physics = &self.config.physics;
        let b = &self.config.behavior;
        let bounds = [self.config.world.width, self.config.world.height];
        let c = &mut self.critters[id];
        let biome = self.terrain.biome_at(c.pos[0], c.pos[1]);
        c.steer(
            steering,
            b.wander_jitter,
            b.wander_throttle,
            biome,
            physics,
            &mut self.rng,
        );
        c.clamp_to_max_speed(biome, physics);
        c.integrate(id, biome, bounds, &mut self.critter_grid);
        let biome = self.terrain.biome_at(c.pos[0], c.pos[1]);
        c.metabolize(biome, physics, &self.config.metabolism);

        if c.energy >= c.genome.repro_threshold {
            self.reproduce(id);
        }

        let c = &self.critters[id];
        if c.energy <= 0. {
            self.kill(id, DeathCause::Starvation);
        } else if c.age > self.config.population.max_age {
            self.kill(id, DeathCause::OldAge);
        }
    }

    fn think(&mut self, id: CritterId) {
        let cfg = &self.config.behavior;
        let decision = behavior::think(
            id,
            &self.critters[id],
            &self.critters,
            &self.critter_grid,
            &self.foods,
            &self.food_grid,
            cfg,
        );
        let jitter = if cfg.think_jitter > 0 {
            self.rng.random_range(0..=cfg.think_jitter)
        } else {
            0
        };
        let next = self.tick + cfg.think_interval.max(1) + jitter;
        let c = &mut self.critters[id];
        c.state = decision.state;
        c.target = decision.target;
        c.next_think = next;
    }

    /// follows the current target, bites or eats once in reach
    fn pursue(&mut self, id: CritterId) -> Steering {
        let c = &self.critters[id];
        match (c.state, c.target) {
            (State::Hunting, Some(Target::Critter { id: prey, .. })) => {
                let Some(p) = self.critters.get(prey) else {
                    return Steering::Wander;
                };
                let reach = c.attack_range(p);
                let prey_pos = p.pos;
                if vecmath::dist2(c.pos, prey_pos) <= reach * reach {
                    self.devour(id, prey);
                    return Steering::Wander;
                }
                self.critters[id].target = Some(Target::Critter {
                    id: prey,
                    last_pos: prey_pos,
                });
                Steering::Seek(prey_pos)
            }
            (State::Fleeing, Some(Target::Critter { id: threat, last_pos })) => {
                let pos = self.critters.get(threat).map_or(last_pos, |t| t.pos);
                self.critters[id].target = Some(Target::Critter {
                    id: threat,
                    last_pos: pos,
                });
                Steering::Flee(pos)
            }
            (State::SeekingFood, Some(Target::Food { id: food, pos })) => {
                let reach = c.eat_range(self.config.behavior.food_radius);
                if vecmath::dist2(c.pos, pos) <= reach * reach {
                    self.eat(id, food);
                    return Steering::Wander;
                }
                Steering::Seek(pos)
            }
            (State::Resting, _) => Steering::Rest,
            _ => Steering::Wander,
        }
    }

    fn devour(&mut self, id: CritterId, prey: CritterId) {
        let Some(meal) = self.kill(prey, DeathCause::Predation) else {
            return;
        };
        let gain =
            meal.energy.max(0.) + self.config.behavior.predation_size_bonus * meal.genome.size;
        self.satisfied(id, gain);
    }

    fn eat(&mut self, id: CritterId, food: food::FoodId) {
        let Some(f) = self.foods.get_mut(food) else {
            return;
        };
        if !(f.energy > 0.) {
            return;
        }
        let gain = std::mem::replace(&mut f.energy, 0.);
        self.food_grid.remove(food, f.cell);
        self.satisfied(id, gain);
    }

    /// a finished meal, back to wandering until the next think
    fn satisfied(&mut self, id: CritterId, gain: f64) {
        let tick = self.tick;
        let c = &mut self.critters[id];
        c.energy += gain;
        c.state = State::Wandering;
        c.target = None;
        c.next_think = tick + 1;
    }

    /// the nearest critter around the point, bigger critters are easier to hit
    fn critter_at(&self, pos: Vector) -> Option<CritterId> {
        let radius = self.config.interaction.inspect_radius;
        self.critter_grid
            .query_point(&pos)
            .filter_map(|&id| {
                let c = self.critters.get(id)?;
                let d = vecmath::dist2(pos, c.pos).sqrt() - c.genome.size;
                (d <= radius).then_some((id, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// the narrow api for outside input
    pub fn interact(&mut self, x: f64, y: f64, mode: InteractionMode) -> Interaction {
        let pos = [x, y];
        match mode {
            InteractionMode::Inspect => {
                let hit = self.critter_at(pos);
                if hit != self.selection {
                    self.selection = hit;
                    self.events.publish(Event::SelectionChanged(hit));
                }
                Interaction::Selected(hit)
            }
            InteractionMode::Feed => {
                let cfg = &self.config.interaction;
                let (batch, jitter) = (cfg.feed_batch, cfg.feed_jitter);
                let mut fed = 0;
                for _ in 0..batch {
                    let offset = if jitter > 0. {
                        [
                            self.rng.random_range(-jitter..jitter),
                            self.rng.random_range(-jitter..jitter),
                        ]
                    } else {
                        [0., 0.]
                    };
                    let energy = food::fresh_energy(&self.config.food, &mut self.rng);
                    if self.spawn_food(vecmath::add(pos, offset), energy).is_some() {
                        fed += 1;
                    }
                }
                tracing::debug!(x, y, fed, "feed");
                self.events.log(
                    format!("manna fell from the sky, {} morsels", fed),
                    LogCategory::Intervention,
                    None,
                );
                Interaction::Fed(fed)
            }
            InteractionMode::Eliminate => {
                let hit = self.critter_at(pos);
                if let Some(id) = hit {
                    if let Some(c) = self.kill(id, DeathCause::Eliminated) {
                        let name = self
                            .species
                            .get(c.species)
                            .map_or("something", |s| s.name.as_str());
                        let message = format!("a lightning bolt struck a {}", name);
                        tracing::debug!(x, y, "eliminate");
                        self.events.log(
                            message,
                            LogCategory::Intervention,
                            Some(c.genome.color),
                        );
                    }
                }
                Interaction::Eliminated(hit)
            }
            InteractionMode::AreaDamage => {
                let r2 = self.config.interaction.damage_radius.powi(2);
                let victims: Vec<CritterId> = self
                    .critters
                    .iter()
                    .filter(|(_, c)| vecmath::dist2(pos, c.pos) <= r2)
                    .map(|(id, _)| id)
                    .collect();
                let critters = victims
                    .into_iter()
                    .filter_map(|id| self.kill(id, DeathCause::AreaDamage))
                    .count();

                let before = self.foods.len();
                let food_grid = &mut self.food_grid;
                self.foods.retain(|id, f| {
                    if !(vecmath::dist2(pos, f.pos) <= r2) {
                        return true;
                    }
                    // eaten food already left the grid
                    if f.energy > 0. {
                        food_grid.remove(id, f.cell);
                    }
                    false
                });
                let food = before - self.foods.len();

                tracing::debug!(x, y, critters, food, "area damage");
                self.events.log(
                    format!("a meteor struck, {} critters perished", critters),
                    LogCategory::Intervention,
                    None,
                );
                Interaction::Damaged { critters, food }
            }
        }
    }

    pub fn subscribe<F: FnMut(&Event) + 'static>(&mut self, handler: F) -> Subscription {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.events.unsubscribe(sub)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }
    pub fn critters(&self) -> &SlotMap<CritterId, Critter> {
        &self.critters
    }
    pub fn critter(&self, id: CritterId) -> Option<&Critter> {
        self.critters.get(id)
    }
    pub fn critter_grid(&self) -> &CritterGrid {
        &self.critter_grid
    }
    pub fn foods(&self) -> &FoodMap {
        &self.foods
    }
    pub fn food_grid(&self) -> &FoodGrid {
        &self.food_grid
    }
    pub fn species(&self) -> &SpeciesRegistry {
        &self.species
    }
    /// a copy that may outlive the tick
    pub fn species_snapshot(&self) -> BTreeMap<SpeciesId, Species> {
        self.species.snapshot()
    }
    pub fn selection(&self) -> Option<CritterId> {
        self.selection
    }
    pub fn births(&self) -> u64 {
        self.births
    }
    pub fn deaths(&self) -> &Deaths {
        &self.deaths
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub tick: u64,
    pub population: usize,
    pub herbivores: usize,
    pub carnivores: usize,
    pub living_species: usize,
    pub total_species: usize,
    /// uneaten items only
    pub food: usize,
    pub mean_energy: f64,
    pub oldest: u64,
    pub highest_generation: u32,
    pub most_children: u32,
    pub births: u64,
    pub deaths: Deaths,
}

impl App {
    pub fn report(&self) -> Report {
        let carnivores = self
            .critters
            .values()
            .filter(|c| c.genome.is_carnivore())
            .count();
        let population = self.critters.len();
        let total_energy: f64 = self.critters.values().map(|c| c.energy).sum();
        Report {
            tick: self.tick,
            population,
            herbivores: population - carnivores,
            carnivores,
            living_species: self.species.living(),
            total_species: self.species.len(),
            food: self.foods.values().filter(|f| f.energy > 0.).count(),
            mean_energy: if population > 0 {
                total_energy / population as f64
            } else {
                0.
            },
            oldest: self.critters.values().map(|c| c.age).max().unwrap_or(0),
            highest_generation: self
                .critters
                .values()
                .map(|c| c.generation)
                .max()
                .unwrap_or(0),
            most_children: self.critters.values().map(|c| c.children).max().unwrap_or(0),
            births: self.births,
            deaths: self.deaths,
        }
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "report for         : {}", self.tick)?;
        writeln!(
            f,
            "number of critters : {} ({} herbivores, {} carnivores)",
            self.population, self.herbivores, self.carnivores
        )?;
        writeln!(
            f,
            "species            : {} living, {} total",
            self.living_species, self.total_species
        )?;
        writeln!(f, "food items         : {}", self.food)?;
        writeln!(f, "average energy     : {:.2}", self.mean_energy)?;
        writeln!(f, "oldest             : {}", self.oldest)?;
        writeln!(f, "highest generation : {}", self.highest_generation)?;
        writeln!(f, "most reproduction  : {}", self.most_children)?;
        writeln!(f, "births             : {}", self.births)?;
        write!(
            f,
            "deaths             : {} (starved {}, old age {}, eaten {}, smitten {})",
            self.deaths.total(),
            self.deaths.starvation,
            self.deaths.old_age,
            self.deaths.predation,
            self.deaths.eliminated + self.deaths.area_damage
        )
    }
}

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::rc::Rc;

/// a flat world of land, no founders and no food growth
#[cfg(test)]
fn quiet_config() -> Config {
    let mut c = Config::default();
    c.population.initial = 0;
    c.food.initial = 0;
    c.food.spawn_quota = 0;
    c.food.spread_parents = 0;
    c.terrain.deep_ocean = -1.;
    c.terrain.ocean = -1.;
    c.terrain.beach = -1.;
    c.terrain.mountain = 2.;
    c
}

#[cfg(test)]
fn genome(carnivore: bool) -> Genome {
    Genome {
        speed: 1.5,
        size: 5.,
        sense_radius: 60.,
        repro_threshold: 100.,
        color: Hsl {
            h: 100.,
            s: 50.,
            l: 50.,
        },
        diet: if carnivore { 0.9 } else { 0.1 },
        amphibious: 1.,
        defense: 0.01,
        limb_count: 4,
        limb_length: 3.,
        mouth_size: 2.,
    }
}

#[cfg(test)]
fn grey() -> Hsl {
    Hsl {
        h: 0.,
        s: 0.,
        l: 50.,
    }
}

#[cfg(test)]
fn record(app: &mut App) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    app.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    seen
}

#[test]
fn same_seed_same_world() {
    let config = Config::default();
    let a = App::new(config.clone(), 42).unwrap();
    let mut b = App::new(config.clone(), 42).unwrap();
    assert_eq!(a.critters().len(), config.population.initial);
    assert_eq!(a.critters().len(), b.critters().len());
    assert_eq!(
        a.terrain().biome_at(321., 123.),
        b.terrain().biome_at(321., 123.)
    );
    let positions = |app: &App| app.critters().values().map(|c| c.pos).collect::<Vec<_>>();
    assert_eq!(positions(&a), positions(&b));

    for _ in 0..50 {
        b.tick();
    }
    b.reset(42);
    assert_eq!(b.tick_count(), 0);
    assert_eq!(positions(&a), positions(&b));
    assert_eq!(a.foods().len(), b.foods().len());
    assert_eq!(a.species().len(), b.species().len());
}

#[test]
fn bad_config_is_refused() {
    let mut config = Config::default();
    config.world.width = -1.;
    assert!(App::new(config, 1).is_err());
}

#[test]
fn caps_and_species_books_hold() {
    let mut config = Config::default();
    config.world.width = 800.;
    config.world.height = 500.;
    config.population.initial = 80;
    config.population.max = 100;
    config.food.max = 400;
    config.food.initial = 300;
    config.food.spawn_quota = 10;
    let mut app = App::new(config.clone(), 3).unwrap();
    let mut extinct = std::collections::BTreeSet::new();

    for _ in 0..400 {
        app.tick();
        assert!(app.critters().len() <= config.population.max);
        assert!(app.foods().len() <= config.food.max);
        assert_eq!(app.critter_grid().len(), app.critters().len());
        for s in app.species().iter() {
            if extinct.contains(&s.id) {
                assert!(s.extinct);
            }
            if s.extinct {
                extinct.insert(s.id);
                assert_eq!(s.count, 0);
            }
        }
    }
    for s in app.species().iter() {
        let members = app
            .critters()
            .values()
            .filter(|c| c.species == s.id)
            .count();
        assert_eq!(s.count as usize, members);
    }
}

#[test]
fn lonely_herbivore_wanders() {
    let mut app = App::new(quiet_config(), 5).unwrap();
    let species = app.found_species(None, grey());
    let mut g = genome(false);
    g.repro_threshold = 100.;
    let id = app.spawn_critter(g, [800., 500.], 90., species).unwrap();
    let (w, h) = (app.config().world.width, app.config().world.height);
    for _ in 0..60 {
        app.tick();
        let c = app.critter(id).unwrap();
        assert_eq!(c.state, State::Wandering);
        assert!((0.0..=w).contains(&c.pos[0]));
        assert!((0.0..=h).contains(&c.pos[1]));
    }
}

#[test]
fn carnivore_hunts_down_smaller_prey() {
    let mut app = App::new(quiet_config(), 6).unwrap();
    let hunters = app.found_species(None, grey());
    let grazers = app.found_species(None, grey());

    let mut hunter = genome(true);
    hunter.speed = 2.;
    hunter.size = 8.;
    hunter.sense_radius = 80.;
    hunter.repro_threshold = 200.;
    let hunter = app
        .spawn_critter(hunter, [800., 500.], 30., hunters)
        .unwrap();

    let mut prey = genome(false);
    prey.speed = 0.2;
    prey.size = 3.;
    prey.sense_radius = 40.;
    prey.limb_count = 0;
    prey.limb_length = 0.5;
    prey.mouth_size = 0.5;
    let prey = app.spawn_critter(prey, [830., 500.], 40., grazers).unwrap();

    app.tick();
    assert_eq!(app.critter(hunter).unwrap().state, State::Hunting);

    let mut caught = false;
    for _ in 0..300 {
        let before = app.critter(hunter).unwrap().energy;
        let meal = app.critter(prey).unwrap().energy;
        app.tick();
        if app.critter(prey).is_none() {
            let after = app.critter(hunter).unwrap().energy;
            assert!(after >= before + meal);
            caught = true;
            break;
        }
    }
    assert!(caught);
    assert_eq!(app.deaths().predation, 1);
    assert!(app.species().get(grazers).unwrap().extinct);
}

#[test]
fn reproduction_splits_energy() {
    let mut app = App::new(quiet_config(), 7).unwrap();
    let species = app.found_species(None, grey());
    let parent = app
        .spawn_critter(genome(false), [400., 400.], 150., species)
        .unwrap();
    let child = app.reproduce(parent).unwrap();

    let p = app.critter(parent).unwrap();
    let c = app.critter(child).unwrap();
    assert!((p.energy - 75.).abs() < 1e-9);
    assert!((c.energy - 60.).abs() < 1e-9);
    assert_eq!(p.children, 1);
    assert_eq!(c.generation, p.generation + 1);
    assert_eq!(app.births(), 1);
}

#[test]
fn reproduction_respects_the_cap() {
    let mut config = quiet_config();
    config.population.max = 1;
    let mut app = App::new(config, 8).unwrap();
    let species = app.found_species(None, grey());
    let parent = app
        .spawn_critter(genome(false), [400., 400.], 150., species)
        .unwrap();
    assert!(app.reproduce(parent).is_none());
    assert_eq!(app.critter(parent).unwrap().energy, 150.);
    assert!(
        app.spawn_critter(genome(false), [1., 1.], 10., species)
            .is_none()
    );
}

#[test]
fn big_mutations_found_a_species() {
    let mut config = quiet_config();
    config.mutation.speciation_threshold = -1.;
    let mut app = App::new(config, 9).unwrap();
    let events = record(&mut app);
    let root = app.found_species(None, grey());
    let parent = app
        .spawn_critter(genome(false), [400., 400.], 150., root)
        .unwrap();

    let child = app.reproduce(parent).unwrap();
    let child_species = app.critter(child).unwrap().species;
    assert_ne!(child_species, root);
    let s = app.species().get(child_species).unwrap();
    assert_eq!(s.parent, Some(root));
    assert_eq!(s.generation, app.species().get(root).unwrap().generation + 1);
    assert_eq!(s.count, 1);
    let founded = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::SpeciesNew(_)))
        .count();
    assert_eq!(founded, 2);
}

#[test]
fn small_mutations_stay_in_the_species() {
    let mut config = quiet_config();
    config.mutation.speciation_threshold = f64::INFINITY;
    let mut app = App::new(config, 10).unwrap();
    let root = app.found_species(None, grey());
    let mut parent = app
        .spawn_critter(genome(false), [400., 400.], 150., root)
        .unwrap();
    for _ in 0..10 {
        app.critters[parent].energy = 150.;
        parent = app.reproduce(parent).unwrap();
        assert_eq!(app.critter(parent).unwrap().species, root);
    }
    assert_eq!(app.species().len(), 1);
    assert_eq!(app.species().get(root).unwrap().count, 11);
}

#[test]
fn feeding_and_area_damage() {
    let mut app = App::new(quiet_config(), 11).unwrap();
    let batch = app.config().interaction.feed_batch;
    assert_eq!(
        app.interact(400., 400., InteractionMode::Feed),
        Interaction::Fed(batch)
    );
    assert_eq!(app.foods().len(), batch);

    let species = app.found_species(None, grey());
    for x in [390., 400., 410.] {
        app.spawn_critter(genome(false), [x, 400.], 50., species);
    }
    let survivor = app
        .spawn_critter(genome(false), [1200., 800.], 50., species)
        .unwrap();
    let hit = app.interact(400., 400., InteractionMode::AreaDamage);
    // feed jitter is well inside the damage radius
    assert_eq!(
        hit,
        Interaction::Damaged {
            critters: 3,
            food: batch
        }
    );
    assert!(app.foods().is_empty());
    assert_eq!(app.food_grid().len(), 0);
    assert_eq!(app.critters().len(), 1);
    assert!(app.critter(survivor).is_some());
    assert_eq!(app.deaths().area_damage, 3);
}

#[test]
fn selection_follows_the_critter() {
    let mut app = App::new(quiet_config(), 12).unwrap();
    let events = record(&mut app);
    let species = app.found_species(None, grey());
    let id = app
        .spawn_critter(genome(false), [300., 300.], 50., species)
        .unwrap();

    assert_eq!(
        app.interact(310., 300., InteractionMode::Inspect),
        Interaction::Selected(Some(id))
    );
    assert_eq!(app.selection(), Some(id));
    assert_eq!(
        app.interact(900., 900., InteractionMode::Eliminate),
        Interaction::Eliminated(None)
    );
    assert_eq!(
        app.interact(301., 300., InteractionMode::Eliminate),
        Interaction::Eliminated(Some(id))
    );
    assert_eq!(app.selection(), None);
    assert!(app.species().get(species).unwrap().extinct);

    let events = events.borrow();
    let selections: Vec<Option<CritterId>> = events
        .iter()
        .filter_map(|e| match e {
            Event::SelectionChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(selections, vec![Some(id), None]);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::SpeciesExtinct(s) if s.id == species))
    );
}

#[test]
fn stats_are_published_on_schedule() {
    let mut app = App::new(quiet_config(), 13).unwrap();
    let events = record(&mut app);
    let interval = app.config().ticks.stats_interval;
    for _ in 0..interval * 2 {
        app.tick();
    }
    let ticks: Vec<u64> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::StatsUpdate { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![interval, interval * 2]);
}

#[test]
fn starving_critters_die() {
    let mut app = App::new(quiet_config(), 14).unwrap();
    let species = app.found_species(None, grey());
    let id = app
        .spawn_critter(genome(false), [300., 300.], 0.01, species)
        .unwrap();
    app.tick();
    assert!(app.critter(id).is_none());
    assert_eq!(app.deaths().starvation, 1);
    assert_eq!(app.report().population, 0);
}

#[test]
fn hungry_herbivore_waits_for_its_think_tick_then_eats() {
    let mut app = App::new(quiet_config(), 14).unwrap();
    let species = app.found_species(None, grey());
    // half way to the repro threshold: hungry but not exhausted
    let id = app
        .spawn_critter(genome(false), [600., 400.], 50., species)
        .unwrap();
    app.tick();
    let c = app.critter(id).unwrap();
    assert_eq!(c.state, State::Wandering);
    let next = c.next_think;
    assert!(next > app.tick_count() + 1);

    // behind it, so wandering does not stumble into it before the next think
    let behind = vecmath::scale(vecmath::from_heading(c.heading), -30.);
    let spot = vecmath::add(c.pos, behind);
    let food = app.spawn_food(spot, 40.).unwrap();
    while app.tick_count() + 1 < next {
        app.tick();
        assert_eq!(app.critter(id).unwrap().state, State::Wandering);
    }

    app.tick();
    let c = app.critter(id).unwrap();
    assert_eq!(c.state, State::SeekingFood);
    assert!(matches!(c.target, Some(Target::Food { id, .. }) if id == food));

    let mut eaten = false;
    for _ in 0..200 {
        let before = app.critter(id).unwrap().energy;
        app.tick();
        // the cleanup pass may already have dropped the eaten item
        if app.foods().get(food).is_none_or(|f| f.energy <= 0.) {
            assert!(app.critter(id).unwrap().energy > before);
            eaten = true;
            break;
        }
    }
    assert!(eaten);
    assert_eq!(app.food_grid().len(), 0);
    let c = app.critter(id).unwrap();
    assert_eq!(c.target, None);
    assert_eq!(c.next_think, app.tick_count() + 1);
}

#[test]
fn hunter_rethinks_when_its_prey_vanishes() {
    let mut app = App::new(quiet_config(), 15).unwrap();
    let hunters = app.found_species(None, grey());
    let grazers = app.found_species(None, grey());
    let mut hunter = genome(true);
    hunter.size = 8.;
    hunter.sense_radius = 80.;
    hunter.repro_threshold = 200.;
    // hungry enough to hunt, too fed to rest once the prey is gone
    let hunter = app
        .spawn_critter(hunter, [800., 500.], 100., hunters)
        .unwrap();
    let mut prey = genome(false);
    prey.size = 3.;
    let prey = app.spawn_critter(prey, [850., 500.], 40., grazers).unwrap();

    app.tick();
    let c = app.critter(hunter).unwrap();
    assert_eq!(c.state, State::Hunting);
    let scheduled = c.next_think;
    assert!(scheduled > app.tick_count() + 1);

    app.kill(prey, DeathCause::Eliminated);
    app.tick();
    let c = app.critter(hunter).unwrap();
    assert_eq!(c.state, State::Wandering);
    assert_eq!(c.target, None);
    let interval = app.config().behavior.think_interval;
    assert!(c.next_think >= app.tick_count() + interval);
}

#[test]
fn area_damage_at_nan_hits_nothing() {
    let mut app = App::new(quiet_config(), 16).unwrap();
    let batch = app.config().interaction.feed_batch;
    app.interact(400., 400., InteractionMode::Feed);
    let species = app.found_species(None, grey());
    app.spawn_critter(genome(false), [400., 400.], 50., species);

    assert_eq!(
        app.interact(f64::NAN, f64::NAN, InteractionMode::AreaDamage),
        Interaction::Damaged {
            critters: 0,
            food: 0
        }
    );
    assert_eq!(app.foods().len(), batch);
    assert_eq!(app.food_grid().len(), batch);
    assert_eq!(app.critters().len(), 1);
}
