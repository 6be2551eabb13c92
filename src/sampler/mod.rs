pub mod engine;
pub mod gradient;
pub mod runtime;
pub mod store;
pub mod surface;

pub use engine::{ColorUpdate, Position, SamplerEngine};
pub use runtime::{start_sampler_loop, SamplerHandle, SamplerInput};
pub use store::{BackgroundStore, JsonFileStore, MemoryStore, TargetStore};
