pub mod global;
pub mod source;

pub use global::*;
pub use source::*;
