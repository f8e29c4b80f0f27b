//! Session supervisor, switch trigger and game launch resolver for a
//! SteamOS-style couch appliance built on a stock distribution.
//!
//! The binaries in `src/bin/` are thin role aliases over [`cli`].

pub mod cli;
pub mod config;
pub mod launch;
pub mod logging;
pub mod select;
pub mod session;
pub mod shim;
pub mod supervisor;
