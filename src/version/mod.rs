//! Local and remote version resolution for the helper binary.

mod compare;
mod local;
mod remote;

pub use compare::*;
pub use local::*;
pub use remote::*;
