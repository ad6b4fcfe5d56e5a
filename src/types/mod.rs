// Types fondamentaux de POC
// Principe: Minimal, déterministe

pub mod account;
pub mod coin;
pub mod decimal;
pub mod primitives;
pub mod time;

pub use account::*;
pub use coin::*;
pub use decimal::*;
pub use primitives::*;
pub use time::{parse_rfc3339, rfc3339, to_rfc3339, TimeParseError};
