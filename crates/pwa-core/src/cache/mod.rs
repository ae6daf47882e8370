//! Cache policy module

mod controller;
mod policy;

pub use controller::{CachePolicyController, ControllerStats};
pub use policy::{is_cacheable, RequestClass, ResponseSource};
