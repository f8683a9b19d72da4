//! publish/subscribe for things outside of the simulation.
//!
//! subscribers get called synchronously from within the tick that produced the event and only
//! ever see a borrowed payload, anything they want to keep they have to clone.

use crate::critter::CritterId;
use crate::genetics::Hsl;
use crate::species::Species;
use serde_derive::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogCategory {
    /// resets and other world level things
    World,
    Species,
    /// feed, eliminate and area damage
    Intervention,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Event {
    StatsUpdate {
        tick: u64,
        population: usize,
        species: usize,
    },
    Log {
        message: String,
        category: LogCategory,
        color: Option<Hsl>,
    },
    SpeciesNew(Species),
    SpeciesExtinct(Species),
    SelectionChanged(Option<CritterId>),
}

/// returned by [`EventBus::subscribe`], hand it back to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Handler = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(Subscription, Handler)>,
    next: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F: FnMut(&Event) + 'static>(&mut self, handler: F) -> Subscription {
        let sub = Subscription(self.next);
        self.next += 1;
        self.handlers.push((sub, Box::new(handler)));
        sub
    }

    /// returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(s, _)| *s != sub);
        before != self.handlers.len()
    }

    /// delivers to every subscriber in subscription order
    pub fn publish(&mut self, event: Event) {
        match &event {
            Event::Log {
                message, category, ..
            } => tracing::info!(?category, "{}", message),
            Event::StatsUpdate {
                tick,
                population,
                species,
            } => tracing::trace!(tick, population, species, "stats"),
            _ => {}
        }
        for (_, handler) in self.handlers.iter_mut() {
            handler(&event);
        }
    }

    pub fn log(&mut self, message: String, category: LogCategory, color: Option<Hsl>) {
        self.publish(Event::Log {
            message,
            category,
            color,
        })
    }
}

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::rc::Rc;

#[test]
fn delivers_in_order_until_unsubscribed() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let a = {
        let seen = seen.clone();
        bus.subscribe(move |e| {
            if let Event::StatsUpdate { tick, .. } = e {
                seen.borrow_mut().push(("a", *tick));
            }
        })
    };
    let _b = {
        let seen = seen.clone();
        bus.subscribe(move |e| {
            if let Event::StatsUpdate { tick, .. } = e {
                seen.borrow_mut().push(("b", *tick));
            }
        })
    };
    let stats = |tick| Event::StatsUpdate {
        tick,
        population: 0,
        species: 0,
    };
    bus.publish(stats(1));
    assert!(bus.unsubscribe(a));
    assert!(!bus.unsubscribe(a));
    bus.publish(stats(2));

    assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1), ("b", 2)]);
}

#[test]
fn publishing_without_subscribers_is_fine() {
    let mut bus = EventBus::new();
    bus.log("nobody listens".into(), LogCategory::World, None);
    bus.publish(Event::SelectionChanged(None));
}
