//! Chat transport abstractions (IRC today).

pub mod port;
pub mod throttled;
pub mod types;
