use core::fmt::Write as _;

use embedded_hal_async::delay::DelayNs;
use heapless::String;

use crate::acquisition::{Environment, ParticulateSample};
use crate::config::{TOPIC, Timing};

pub const PAYLOAD_CAPACITY: usize = 192;

/// Outbound message sink. Delivery is at most once; the caller never
/// retries.
#[allow(async_fn_in_trait)]
pub trait Publish {
    type Error: core::fmt::Debug;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;
}

impl<T: Publish + ?Sized> Publish for &mut T {
    type Error = T::Error;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        T::publish(self, topic, payload).await
    }
}

/// Latest measurements of both sensors, passed around the ring.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub particulate: ParticulateSample,
    pub environment: Environment,
}

impl Snapshot {
    pub const EMPTY: Self = Self {
        particulate: ParticulateSample::ZERO,
        environment: Environment::ZERO,
    };
}

/// `pm1=<u16> pm2.5=<u16> pm10=<u16> temp=<f64> hum=<f64> press=<f64>`,
/// without `press=` when the pressure is invalid.
pub fn format_payload(snapshot: &Snapshot) -> Result<String<PAYLOAD_CAPACITY>, core::fmt::Error> {
    let Snapshot {
        particulate,
        environment,
    } = snapshot;

    let mut payload = String::new();
    write!(
        payload,
        "pm1={} pm2.5={} pm10={} temp={:.2} hum={:.2}",
        particulate.pm1,
        particulate.pm25,
        particulate.pm10,
        environment.temperature,
        environment.humidity
    )?;
    if let Some(pressure) = environment.pressure {
        write!(payload, " press={pressure:.2}")?;
    }

    Ok(payload)
}

/// Publish step of the ring: one message per cycle, then the reporting
/// interval.
pub struct Reporter<P, D> {
    publisher: P,
    delay: D,
    topic: &'static str,
    interval_ms: u32,
}

impl<P, D> Reporter<P, D> {
    pub fn new(publisher: P, delay: D, timing: &Timing) -> Self {
        Self::with_topic(publisher, delay, timing, TOPIC)
    }

    pub fn with_topic(publisher: P, delay: D, timing: &Timing, topic: &'static str) -> Self {
        Self {
            publisher,
            delay,
            topic,
            interval_ms: timing.report_interval_ms,
        }
    }

    pub fn release(self) -> (P, D) {
        (self.publisher, self.delay)
    }
}

impl<P: Publish, D: DelayNs> Reporter<P, D> {
    /// Returns whether the message went out. Failures are only logged.
    pub async fn report(&mut self, snapshot: &Snapshot) -> bool {
        let sent = match format_payload(snapshot) {
            Ok(payload) => match self.publisher.publish(self.topic, payload.as_bytes()).await {
                Ok(()) => {
                    info!("published {} bytes", payload.len());
                    true
                }
                Err(_) => {
                    warn!("publish failed");
                    false
                }
            },
            Err(_) => {
                error!("payload does not fit {} bytes", PAYLOAD_CAPACITY);
                false
            }
        };
        self.delay.delay_ms(self.interval_ms).await;

        sent
    }
}
