use crate::bme280::Settings;
use crate::pms7003::ReceiveTimeouts;

/// Topic every report is published on.
pub const TOPIC: &str = "aerosense/measurements";

/// Fixed waits of the acquisition cycle, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// After a mode change, a read and going to sleep.
    pub settle_ms: u32,
    /// After wakeup; the fan needs this long before readings are stable.
    pub warmup_ms: u32,
    /// Pause after each of the repeated read requests.
    pub read_request_interval_ms: u32,
    /// Lower bound on the wait after triggering a forced conversion.
    pub conversion_ms: u32,
    /// Pause between the environmental cycle and publishing.
    pub handoff_ms: u32,
    /// Pause after publishing before the next cycle starts.
    pub report_interval_ms: u32,
    pub receive: ReceiveTimeouts,
}

impl Timing {
    pub const DEFAULT: Timing = Timing {
        settle_ms: 500,
        warmup_ms: 30_000,
        read_request_interval_ms: 500,
        conversion_ms: 15,
        handoff_ms: 500,
        report_interval_ms: 60_000,
        receive: ReceiveTimeouts {
            resync_ms: Some(5_000),
            byte_ms: 100,
        },
    };

    /// Time to wait after a forced-mode trigger with the given settings.
    pub fn conversion_wait_ms(&self, settings: &Settings) -> u32 {
        self.conversion_ms
            .max(settings.max_measurement_time_us().div_ceil(1000))
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}
