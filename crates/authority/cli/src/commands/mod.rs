//! Command implementations

pub mod replay;
pub mod run;
pub mod verify;
