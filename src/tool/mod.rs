mod identity;
mod installer;
mod locator;
mod toolchain;

pub use identity::*;
pub use installer::*;
pub use locator::*;
pub use toolchain::*;
