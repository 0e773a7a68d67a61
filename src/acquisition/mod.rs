//! Per-sensor acquisition state machines and the bounded-retry loop that
//! drives them.
//!
//! A machine exposes its current state, runs the operation that belongs to
//! it, and moves through an explicit transition function. The loop in
//! [`run_cycle`] is the only place that decides about retries and about
//! giving up on a cycle.

use crate::fault::Fault;

pub mod environmental;
pub mod particulate;

pub use environmental::{Environment, EnvironmentalMachine, EnvironmentalState};
pub use particulate::{ParticulateMachine, ParticulateSample, ParticulateState};

/// Failed attempts a single cycle may absorb before it is abandoned.
pub const MAX_FAILURES: u8 = 5;

/// Result of running the operation of one state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Success,
    Failure,
}

#[allow(async_fn_in_trait)]
pub trait Sequencer {
    type State: Copy + PartialEq + core::fmt::Debug;

    fn state(&self) -> Self::State;

    fn is_done(&self) -> bool;

    /// Runs the operation of the current state and applies the transition
    /// for its outcome. A failure leaves the state untouched.
    async fn step(&mut self) -> Result<(), Fault>;

    /// Moves to the state the next cycle starts from.
    fn restart(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleSummary {
    pub completed: bool,
    pub failures: u8,
}

/// Drives `machine` until it is done or the failure budget is spent, then
/// rewinds it for the next cycle either way.
pub async fn run_cycle<S: Sequencer>(machine: &mut S) -> CycleSummary {
    let mut failures = 0;

    while !machine.is_done() && failures < MAX_FAILURES {
        if let Err(fault) = machine.step().await {
            failures += 1;
            warn!("attempt {} failed: {}", failures, fault);
            if !fault.is_retryable() {
                break;
            }
        }
    }

    let completed = machine.is_done();
    if !completed {
        error!("cycle abandoned after {} failures", failures);
    }
    machine.restart();

    CycleSummary {
        completed,
        failures,
    }
}
