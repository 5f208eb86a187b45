//! Background reconciliation of the installed helper against the latest release.

mod coordinator;

pub use coordinator::*;
