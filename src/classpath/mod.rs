mod builder;
mod types;

pub use self::builder::{ClassBuilder, PoolBuilder};
pub use self::types::*;
