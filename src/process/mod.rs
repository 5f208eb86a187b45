mod definition;
mod logging;
mod ports;
mod runtime_impl;
mod state_machine;
mod supervisor;
mod traits;

pub use definition::*;
pub use logging::*;
pub use ports::*;
pub use runtime_impl::*;
pub use state_machine::*;
pub use supervisor::*;
pub use traits::*;
