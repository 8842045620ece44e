pub mod config;
pub mod cycle;
pub mod entry;
pub mod error;
pub mod history;
pub mod io;
pub mod paths;
pub mod search;
pub mod session;
pub mod status;
pub mod store;
pub mod vcs;
pub mod writer;

pub use error::{CheckpointError, Result};
