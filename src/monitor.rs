// NH3 Sentinel — Threshold Monitor
//
// The sample-threshold-count loop the coprocessor runs while the main CPU is
// in deep sleep.  Each cycle reads the gas sensor once, records the reading
// in shared memory and tracks how many consecutive readings sat at or above
// the threshold.  Once that run reaches the confirm count the host is woken
// and the loop ends.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;

use crate::shared::{SharedState, SharedVar};

/// One raw conversion from the gas sensor channel.
pub trait GasAdc {
    type Error: Debug;

    fn read_raw(&mut self) -> Result<u32, Self::Error>;
}

/// Whatever brings the main CPU back up.
pub trait WakeSignal {
    fn wake_host(&mut self);
}

/// Outcome of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The ADC returned an error; nothing was recorded.
    ReadFailed,
    /// Reading below threshold; the above count is now zero.
    Below { reading: u32 },
    /// Reading at or above threshold, run not yet long enough.
    Above { reading: u32, count: u32 },
    /// Run reached the confirm count.
    Confirmed { reading: u32, count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The host was signalled after a confirmed exceedance.
    WakeSignalled,
    /// The host raised the stop flag.
    Stopped,
}

pub struct ThresholdMonitor<A, D, W, S> {
    adc: A,
    delay: D,
    wake: W,
    shared: S,
    interval_ms: u32,
}

impl<A, D, W, S> ThresholdMonitor<A, D, W, S>
where
    A: GasAdc,
    D: DelayNs,
    W: WakeSignal,
    S: SharedState,
{
    pub fn new(adc: A, delay: D, wake: W, shared: S, interval_ms: u32) -> Self {
        Self {
            adc,
            delay,
            wake,
            shared,
            interval_ms,
        }
    }

    /// Hand back the parts, e.g. to inspect a simulated ADC after a run.
    pub fn release(self) -> (A, D, W, S) {
        (self.adc, self.delay, self.wake, self.shared)
    }

    /// Take one sample and update the shared counters.  Never sleeps.
    ///
    /// Threshold and confirm count are re-read every call so the host can
    /// retune a running monitor.
    pub fn step(&mut self) -> Step {
        let reading = match self.adc.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("NH3 ADC read failed: {:?}", e);
                return Step::ReadFailed;
            }
        };

        self.shared.store(SharedVar::LastReading, reading);
        let cycles = self.shared.load(SharedVar::CycleCount).wrapping_add(1);
        self.shared.store(SharedVar::CycleCount, cycles);

        let threshold = self.shared.threshold();
        if reading < threshold {
            self.shared.store(SharedVar::AboveCount, 0);
            log::trace!("cycle {}: {} < {}", cycles, reading, threshold);
            return Step::Below { reading };
        }

        let count = self.shared.load(SharedVar::AboveCount).saturating_add(1);
        self.shared.store(SharedVar::AboveCount, count);
        log::debug!("cycle {}: {} >= {} ({} in a row)", cycles, reading, threshold, count);

        if count >= self.shared.confirm_count() {
            Step::Confirmed { reading, count }
        } else {
            Step::Above { reading, count }
        }
    }

    /// Sample until the exceedance is confirmed or the host asks to stop.
    pub fn run(&mut self) -> MonitorExit {
        while !self.shared.stop_requested() {
            if let Step::Confirmed { reading, count } = self.step() {
                log::info!(
                    "NH3 confirmed: {} >= {} for {} samples — waking host",
                    reading,
                    self.shared.threshold(),
                    count
                );
                self.wake.wake_host();
                return MonitorExit::WakeSignalled;
            }
            self.delay.delay_ms(self.interval_ms);
        }

        log::info!("Stop flag set — monitor halting");
        MonitorExit::Stopped
    }
}
