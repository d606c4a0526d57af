//! Model capability registry and the per-model request adapter.

pub mod params;
pub mod registry;

pub use params::{RequestBody, build};
pub use registry::{Capability, ModelCategory, ModelDescriptor, TokenField, lookup};
