mod broker;
mod engine;

pub use broker::*;
pub use engine::*;
