#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod bme280;
pub mod config;
pub mod fault;
pub mod pms7003;
pub mod report;
pub mod scheduler;

#[cfg(test)]
mod debug_utils;

pub use fault::Fault;
pub use report::{Publish, Reporter, Snapshot};
pub use scheduler::{Ring, Stage, Station};
