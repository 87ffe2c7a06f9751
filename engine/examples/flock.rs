//! A small flock simulation driving the public surface end to end:
//! schema registration, required types, template cloning, iteration with an
//! optional type, decoration, and compaction.
//!
//! ```bash
//! cargo run -p skein_engine --example flock
//! ```

use skein_engine::ecs::column::PrimitiveFactory;
use skein_engine::ecs::schema::{PropertyDef, Schema};
use skein_engine::ecs::world::{Id, World};

fn main() {
    let mut world = World::new(Id::new(1));

    let position = world
        .register(
            Schema::new("position")
                .with(PropertyDef::scalar("x", 0.0f32))
                .with(PropertyDef::scalar("y", 0.0f32)),
        )
        .expect("position schema");
    // Every boid needs somewhere to be; velocity pulls position in
    // automatically.
    let velocity = world
        .register(
            Schema::new("velocity")
                .with(PropertyDef::scalar("x", 0.0f32))
                .with(PropertyDef::scalar("y", 0.0f32))
                .requires("position"),
        )
        .expect("velocity schema");
    let leader = world
        .register(Schema::new("leader").with(PropertyDef::scalar("weight", 1.0f32)))
        .expect("leader schema");

    let px = world.repository(position).property_index("x").expect("x");
    let py = world.repository(position).property_index("y").expect("y");
    let vx = world.repository(velocity).property_index("x").expect("x");
    let vy = world.repository(velocity).property_index("y").expect("y");

    // Build one template boid and stamp the flock out of it.
    let template = world.add_entity();
    let template_velocity = world.add_component(velocity, template);
    world
        .repository_mut(velocity)
        .set_value(&template_velocity, vx, 1.0f32);
    world
        .repository_mut(velocity)
        .set_value(&template_velocity, vy, 0.5f32);

    for index in 0..400 {
        let boid = world.add_entity_from(template);
        if index % 40 == 0 {
            world.add_component(leader, boid);
        }
        let handle = world
            .get_component(position, boid)
            .expect("cloned boids carry a position");
        world
            .repository_mut(position)
            .set_value(&handle, px, (index % 20) as f32);
        world
            .repository_mut(position)
            .set_value(&handle, py, (index / 20) as f32);
    }

    // A runtime-added grounded flag, without touching any schema.
    let grounded = world.decorate(position, &PrimitiveFactory::new(false));

    for frame in 0..120 {
        // Bind handles under a shared borrow, then apply writes.
        let mut moves = Vec::new();
        let mut query = world.query(&[position, velocity], &[leader]);
        while query.advance() {
            let boost = if world.is_alive(&query.optional(0)) {
                2.0
            } else {
                1.0
            };
            moves.push((query.required(0), query.required(1), boost));
        }

        for (pos, vel, boost) in moves {
            let dx = world
                .repository(velocity)
                .value::<f32>(&vel, vx)
                .unwrap_or(0.0);
            let dy = world
                .repository(velocity)
                .value::<f32>(&vel, vy)
                .unwrap_or(0.0);
            let repository = world.repository_mut(position);
            let x = repository.value::<f32>(&pos, px).unwrap_or(0.0);
            let y = repository.value::<f32>(&pos, py).unwrap_or(0.0);
            repository.set_value(&pos, px, x + dx * boost / 60.0);
            let landed = y + dy * boost / 60.0;
            repository.set_value(&pos, py, landed.min(40.0));
            if landed >= 40.0 {
                grounded.with_mut(|col| {
                    col.as_primitive_mut::<bool>()
                        .expect("grounded is a bool column")
                        .set(pos.slot().index(), true)
                });
            }
        }

        // Retire a slice of the flock every second and re-densify.
        if frame % 60 == 59 {
            let retired: Vec<_> = world
                .entities()
                .filter(|entity| entity.id().value() % 7 == 0)
                .collect();
            for entity in retired {
                world.remove_entity(entity);
            }
            world.compact();
        }
    }

    let mut grounded_count = 0;
    let mut query = world.query(&[position], &[]);
    while query.advance() {
        let value = grounded.with(|col| {
            col.as_primitive::<bool>()
                .expect("grounded is a bool column")
                .get(query.required(0).slot().index())
        });
        if value {
            grounded_count += 1;
        }
    }

    println!(
        "flock settled: {} boids alive, {} grounded",
        world.entity_count(),
        grounded_count
    );
}
