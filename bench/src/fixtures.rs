//! World fixtures shared across benchmarks.
//!
//! The standard fixture registers a small movement-style set of component
//! types sized like real game components and populates them from a seeded
//! generator, so runs are reproducible.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use skein_engine::ecs::entity::Entity;
use skein_engine::ecs::schema::{PropertyDef, Schema};
use skein_engine::ecs::world::{Id, TypeId, World};

/// A world with the standard benchmark types registered.
pub struct Fixture {
    pub world: World,
    pub position: TypeId,
    pub velocity: TypeId,
    pub lifetime: TypeId,

    // Property indices, resolved once.
    pub px: usize,
    pub py: usize,
    pub vx: usize,
    pub vy: usize,
    pub remaining: usize,
}

impl Fixture {
    /// Register the standard types into a fresh world.
    pub fn new() -> Self {
        let mut world = World::new(Id::new(0));
        let position = world
            .register(
                Schema::new("position")
                    .with(PropertyDef::scalar("x", 0.0f32))
                    .with(PropertyDef::scalar("y", 0.0f32)),
            )
            .expect("position schema");
        let velocity = world
            .register(
                Schema::new("velocity")
                    .with(PropertyDef::scalar("x", 0.0f32))
                    .with(PropertyDef::scalar("y", 0.0f32)),
            )
            .expect("velocity schema");
        let lifetime = world
            .register(
                Schema::new("lifetime").with(PropertyDef::scalar("remaining", 5.0f32)),
            )
            .expect("lifetime schema");

        let px = world.repository(position).property_index("x").expect("x");
        let py = world.repository(position).property_index("y").expect("y");
        let vx = world.repository(velocity).property_index("x").expect("x");
        let vy = world.repository(velocity).property_index("y").expect("y");
        let remaining = world
            .repository(lifetime)
            .property_index("remaining")
            .expect("remaining");

        Self {
            world,
            position,
            velocity,
            lifetime,
            px,
            py,
            vx,
            vy,
            remaining,
        }
    }

    /// Spawn `count` moving entities with randomised state. Every fourth
    /// entity also carries a lifetime.
    pub fn spawn(&mut self, count: usize, rng: &mut ChaCha8Rng) -> Vec<Entity> {
        let mut spawned = Vec::with_capacity(count);
        for index in 0..count {
            let entity = self.world.add_entity();
            let position = self.world.add_component(self.position, entity);
            let velocity = self.world.add_component(self.velocity, entity);

            let repository = self.world.repository_mut(self.position);
            repository.set_value(&position, self.px, rng.gen_range(-100.0f32..100.0));
            repository.set_value(&position, self.py, rng.gen_range(-100.0f32..100.0));
            let repository = self.world.repository_mut(self.velocity);
            repository.set_value(&velocity, self.vx, rng.gen_range(-10.0f32..10.0));
            repository.set_value(&velocity, self.vy, rng.gen_range(-10.0f32..10.0));

            if index % 4 == 0 {
                let lifetime = self.world.add_component(self.lifetime, entity);
                self.world.repository_mut(self.lifetime).set_value(
                    &lifetime,
                    self.remaining,
                    rng.gen_range(1.0f32..5.0),
                );
            }
            spawned.push(entity);
        }
        spawned
    }

    /// Integrate one movement frame: positions advance by velocity.
    pub fn step(&mut self, dt: f32) {
        let mut moves = Vec::new();
        let mut query = self.world.query(&[self.position, self.velocity], &[]);
        while query.advance() {
            moves.push((query.required(0), query.required(1)));
        }
        for (position, velocity) in moves {
            let vx = self
                .world
                .repository(self.velocity)
                .value::<f32>(&velocity, self.vx)
                .unwrap_or(0.0);
            let vy = self
                .world
                .repository(self.velocity)
                .value::<f32>(&velocity, self.vy)
                .unwrap_or(0.0);
            let repository = self.world.repository_mut(self.position);
            if let Some(x) = repository.value::<f32>(&position, self.px) {
                repository.set_value(&position, self.px, x + vx * dt);
            }
            if let Some(y) = repository.value::<f32>(&position, self.py) {
                repository.set_value(&position, self.py, y + vy * dt);
            }
        }
    }

    /// Remove a random fraction of the live entities.
    pub fn cull(&mut self, fraction: f64, rng: &mut ChaCha8Rng) {
        let doomed: Vec<Entity> = self
            .world
            .entities()
            .filter(|_| rng.gen_bool(fraction))
            .collect();
        for entity in doomed {
            self.world.remove_entity(entity);
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
