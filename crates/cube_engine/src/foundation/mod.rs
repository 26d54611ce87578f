//! Engine-independent building blocks: logging, math and frame timing

pub mod logging;
pub mod math;
pub mod time;
