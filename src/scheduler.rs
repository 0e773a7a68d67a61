//! Token ring over the three workers.
//!
//! Each stage waits on its own single-slot [`Signal`]: a trigger that arrives
//! while one is already pending is absorbed. Finishing a stage triggers the
//! next one in the [`Ring`], so only one worker is active at a time.

use core::cell::Cell;

use embassy_futures::join::join3;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use thiserror::Error;

use crate::acquisition::{EnvironmentalMachine, ParticulateMachine};
use crate::report::{Publish, Reporter, Snapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    Particulate,
    Environmental,
    Publish,
}

impl Stage {
    const fn index(self) -> usize {
        match self {
            Self::Particulate => 0,
            Self::Environmental => 1,
            Self::Publish => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingError {
    #[error("stage {0:?} appears more than once")]
    Duplicate(Stage),
}

/// Order in which stages hand control to each other; the last one wraps
/// around to the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ring {
    order: [Stage; 3],
}

impl Ring {
    pub const DEFAULT: Ring = Ring {
        order: [Stage::Particulate, Stage::Environmental, Stage::Publish],
    };

    pub fn new(order: [Stage; 3]) -> Result<Self, RingError> {
        for (i, stage) in order.iter().enumerate() {
            if order[i + 1..].contains(stage) {
                return Err(RingError::Duplicate(*stage));
            }
        }
        Ok(Self { order })
    }

    pub const fn first(&self) -> Stage {
        self.order[0]
    }

    pub fn next(&self, stage: Stage) -> Stage {
        match self.order.iter().position(|&s| s == stage) {
            Some(i) => self.order[(i + 1) % self.order.len()],
            None => self.first(),
        }
    }

    pub fn order(&self) -> &[Stage; 3] {
        &self.order
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Shared state of the ring: one trigger per stage plus the measurements
/// travelling with the token.
///
/// ```ignore
/// static STATION: Station<CriticalSectionRawMutex> = Station::new(Ring::DEFAULT);
/// ```
pub struct Station<M: RawMutex> {
    ring: Ring,
    triggers: [Signal<M, ()>; 3],
    snapshot: Mutex<M, Cell<Snapshot>>,
}

impl<M: RawMutex> Station<M> {
    pub const fn new(ring: Ring) -> Self {
        Self {
            ring,
            triggers: [Signal::new(), Signal::new(), Signal::new()],
            snapshot: Mutex::new(Cell::new(Snapshot::EMPTY)),
        }
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Hands the token to the first stage.
    pub fn start(&self) {
        self.trigger(self.ring.first());
    }

    pub fn trigger(&self, stage: Stage) {
        self.triggers[stage.index()].signal(());
    }

    pub fn is_pending(&self, stage: Stage) -> bool {
        self.triggers[stage.index()].signaled()
    }

    pub async fn wait(&self, stage: Stage) {
        self.triggers[stage.index()].wait().await
    }

    pub fn hand_off(&self, from: Stage) {
        let to = self.ring.next(from);
        debug!("{} -> {}", from, to);
        self.trigger(to);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock(Cell::get)
    }

    pub fn store(&self, snapshot: Snapshot) {
        self.snapshot.lock(|cell| cell.set(snapshot));
    }
}

/// One stage of the ring.
#[allow(async_fn_in_trait)]
pub trait Worker {
    fn stage(&self) -> Stage;

    /// Runs one turn, updating the measurements this stage owns.
    async fn work(&mut self, snapshot: &mut Snapshot);
}

impl<U, D> Worker for ParticulateMachine<U, D>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
{
    fn stage(&self) -> Stage {
        Stage::Particulate
    }

    async fn work(&mut self, snapshot: &mut Snapshot) {
        self.cycle().await;
        snapshot.particulate = self.sample();
    }
}

impl<I2C, D> Worker for EnvironmentalMachine<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn stage(&self) -> Stage {
        Stage::Environmental
    }

    async fn work(&mut self, snapshot: &mut Snapshot) {
        self.cycle().await;
        snapshot.environment = self.reading();
    }
}

impl<P, D> Worker for Reporter<P, D>
where
    P: Publish,
    D: DelayNs,
{
    fn stage(&self) -> Stage {
        Stage::Publish
    }

    async fn work(&mut self, snapshot: &mut Snapshot) {
        self.report(snapshot).await;
    }
}

/// Waits for the worker's trigger, runs one turn and passes the token on.
pub async fn serve_once<M: RawMutex, W: Worker>(station: &Station<M>, worker: &mut W) {
    let stage = worker.stage();
    station.wait(stage).await;

    let mut snapshot = station.snapshot();
    worker.work(&mut snapshot).await;
    station.store(snapshot);

    station.hand_off(stage);
}

/// Worker task body.
pub async fn serve<M: RawMutex, W: Worker>(station: &Station<M>, mut worker: W) -> ! {
    loop {
        serve_once(station, &mut worker).await;
    }
}

/// Starts the ring and runs all three workers on the current executor.
pub async fn run_ring<M, A, B, C>(station: &Station<M>, a: A, b: B, c: C) -> !
where
    M: RawMutex,
    A: Worker,
    B: Worker,
    C: Worker,
{
    station.start();
    let (never, ..) = join3(serve(station, a), serve(station, b), serve(station, c)).await;
    never
}
