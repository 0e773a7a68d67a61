use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};

use super::{CycleSummary, Outcome, Sequencer, run_cycle};
use crate::config::Timing;
use crate::fault::Fault;
use crate::pms7003::{self, AnswerFrame, Pms7003};

/// The read command is repeated this often; only the last send counts.
pub const READ_REQUESTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParticulateState {
    ChangeModePassive,
    Wakeup,
    ReadRequest,
    Read,
    Sleep,
    Done,
}

impl ParticulateState {
    pub const fn next(self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Failure => self,
            Outcome::Success => match self {
                Self::ChangeModePassive => Self::Wakeup,
                Self::Wakeup => Self::ReadRequest,
                Self::ReadRequest => Self::Read,
                Self::Read => Self::Sleep,
                Self::Sleep | Self::Done => Self::Done,
            },
        }
    }
}

/// Standard-particle mass concentrations in µg/m³.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParticulateSample {
    pub pm1: u16,
    pub pm25: u16,
    pub pm10: u16,
}

impl ParticulateSample {
    pub const ZERO: Self = Self {
        pm1: 0,
        pm25: 0,
        pm10: 0,
    };
}

impl From<&AnswerFrame> for ParticulateSample {
    fn from(frame: &AnswerFrame) -> Self {
        Self {
            pm1: frame.pm1_standard,
            pm25: frame.pm25_standard,
            pm10: frame.pm10_standard,
        }
    }
}

/// Acquisition sequence for the PMS7003.
///
/// Passive mode is requested once per power-up; every later cycle starts by
/// waking the sensor and ends by putting it back to sleep.
pub struct ParticulateMachine<U, D> {
    sensor: Pms7003<U>,
    delay: D,
    timing: Timing,
    state: ParticulateState,
    passive: bool,
    frame: Option<AnswerFrame>,
}

impl<U, D> ParticulateMachine<U, D> {
    pub fn new(uart: U, delay: D, timing: Timing) -> Self {
        Self {
            sensor: Pms7003::new(uart),
            delay,
            timing,
            state: ParticulateState::ChangeModePassive,
            passive: false,
            frame: None,
        }
    }

    /// Latest good sample; zero until the first frame arrives.
    pub fn sample(&self) -> ParticulateSample {
        self.frame
            .as_ref()
            .map(ParticulateSample::from)
            .unwrap_or(ParticulateSample::ZERO)
    }

    pub fn last_frame(&self) -> Option<&AnswerFrame> {
        self.frame.as_ref()
    }

    pub fn release(self) -> (U, D) {
        (self.sensor.release(), self.delay)
    }
}

impl<U, D> ParticulateMachine<U, D>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
{
    /// One acquisition cycle, from the restart state to the next one.
    pub async fn cycle(&mut self) -> CycleSummary {
        run_cycle(self).await
    }

    async fn execute(&mut self) -> Result<(), pms7003::Error<U::Error>> {
        match self.state {
            ParticulateState::ChangeModePassive => {
                self.sensor.change_mode_passive().await?;
                self.passive = true;
                self.delay.delay_ms(self.timing.settle_ms).await;
            }
            ParticulateState::Wakeup => {
                self.sensor.wakeup().await?;
                self.delay.delay_ms(self.timing.warmup_ms).await;
            }
            ParticulateState::ReadRequest => {
                let mut last = Ok(());
                for _ in 0..READ_REQUESTS {
                    if let Err(err) = self.sensor.discard_input().await {
                        debug!("stale input not discarded: {}", err.fault());
                    }
                    last = self.sensor.read_request().await;
                    self.delay
                        .delay_ms(self.timing.read_request_interval_ms)
                        .await;
                }
                last?;
            }
            ParticulateState::Read => {
                let frame = self
                    .sensor
                    .receive(&mut self.delay, self.timing.receive)
                    .await?;
                info!(
                    "pm1 {} pm2.5 {} pm10 {}",
                    frame.pm1_standard, frame.pm25_standard, frame.pm10_standard
                );
                self.frame = Some(frame);
                self.delay.delay_ms(self.timing.settle_ms).await;
            }
            ParticulateState::Sleep => {
                self.sensor.sleep().await?;
                self.delay.delay_ms(self.timing.settle_ms).await;
            }
            ParticulateState::Done => {}
        }

        Ok(())
    }
}

impl<U, D> Sequencer for ParticulateMachine<U, D>
where
    U: Read + Write + ReadReady,
    D: DelayNs,
{
    type State = ParticulateState;

    fn state(&self) -> ParticulateState {
        self.state
    }

    fn is_done(&self) -> bool {
        self.state == ParticulateState::Done
    }

    async fn step(&mut self) -> Result<(), Fault> {
        let state = self.state;
        let result = self.execute().await;
        let outcome = match result {
            Ok(()) => Outcome::Success,
            Err(_) => Outcome::Failure,
        };
        self.state = state.next(outcome);
        trace!("pms7003 {} -> {}", state, self.state);

        result.map_err(|err| {
            warn!("pms7003 {} failed: {}", state, err.fault());
            err.fault()
        })
    }

    fn restart(&mut self) {
        self.state = if self.passive {
            ParticulateState::Wakeup
        } else {
            ParticulateState::ChangeModePassive
        };
    }
}
