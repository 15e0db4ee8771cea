pub mod capacity;

pub use capacity::{CapacityPolicy, DEFAULT_REDUCE_RATIO};
