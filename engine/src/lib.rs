//! Skein is a data-oriented entity-component runtime.
//!
//! Component state lives in columnar, densely-packed property stores with
//! one repository per component type. Iteration walks only the entities
//! that carry a requested combination of types. The runtime is
//! single-threaded by design and intended as the storage foundation for
//! simulation loops where the dominant cost is sweeping large populations
//! of similar objects.

pub mod ecs;
