mod lookup;
mod types;

pub use self::lookup::*;
pub use self::types::*;
