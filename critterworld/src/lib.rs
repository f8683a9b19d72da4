//! Critterworld is a tick based artificial life simulation
//!
//! Lets go over it from the ground up.
//!
//! ## The World
//! The world is a rectangle of procedurally generated terrain.
//! Two layered noise fields, elevation and moisture, decide what biome sits where:
//! deep ocean, ocean, beach, plains, forest, jungle and mountains.
//! Biomes matter, they slow things down, make food grow faster or slower and decide
//! whether a critter can breathe.
//!
//! Food grows on its own, a bit sprinkled randomly and a lot spreading from existing food,
//! so it clusters inside biomes.
//!
//! ## Critters
//! Critters are little animals with a genome: how fast and big they are, how far they see,
//! whether they eat plants or each other, whether they live on land or in water,
//! how many legs they have and so on.
//!
//! Every few ticks a critter looks around and decides what it wants to do:
//! run from a predator, go for food or prey, rest, or just wander.
//! Every tick it then steers towards whatever it decided on, moves, and pays for it in energy.
//!
//! ## Evolution
//! Critters with enough energy split off a child, the child's genome is a slightly mutated
//! copy. If the mutation was big enough the child founds a new species.
//! Species have names, a lineage and go extinct when their last member dies.
//!
//! ## Determinism
//! The simulation runs single threaded off one seeded rng,
//! the same seed and configuration give the same world.
//!
//! # Hacking
//! [`app::App`] is where everything comes together, start reading at [`app::App::tick`].
//! Parameters are in the [`config`] module.

pub mod config;

pub mod vecmath;

pub mod terrain;

pub mod genetics;

pub mod species;

pub mod food;

pub mod critter;

pub mod behavior;

pub mod events;

pub mod app;
pub use app::App;
