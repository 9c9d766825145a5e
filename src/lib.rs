pub mod backport;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod forge;
pub mod gate;
pub mod orchestrator;
pub mod outcome;
pub mod request;
pub mod status;

pub use error::{PatchbackError, Result};
pub use orchestrator::{BackportReport, Orchestrator};

#[cfg(test)]
pub mod test_helpers;
