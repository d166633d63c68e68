// NH3 Sentinel — Simulated Peripherals
//
// Stand-ins for the ADC, delay and wake line so the monitor can run on the
// host: in unit tests and in the host build of the binary.

use embedded_hal::delay::DelayNs;

use crate::monitor::{GasAdc, WakeSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAdcError {
    /// The script asked for a failed conversion at this position.
    Scripted,
    /// Every scripted reading has been consumed.
    Exhausted,
}

/// Plays back a fixed list of readings; `None` entries fail the read.
#[derive(Debug, Clone)]
pub struct ScriptedAdc {
    script: Vec<Option<u32>>,
    pos: usize,
}

impl ScriptedAdc {
    pub fn new(script: Vec<Option<u32>>) -> Self {
        Self { script, pos: 0 }
    }

    /// `len` readings climbing linearly from `from` by `step` per sample.
    pub fn ramp(from: u32, step: u32, len: usize) -> Self {
        let script = (0..len)
            .scan(from, |raw, _| {
                let cur = *raw;
                *raw = raw.saturating_add(step);
                Some(Some(cur))
            })
            .collect();
        Self::new(script)
    }

    /// Number of conversions attempted so far.
    pub fn reads(&self) -> usize {
        self.pos
    }
}

impl GasAdc for ScriptedAdc {
    type Error = SimAdcError;

    fn read_raw(&mut self) -> Result<u32, Self::Error> {
        let entry = self.script.get(self.pos).copied();
        self.pos += 1;
        match entry {
            Some(Some(raw)) => Ok(raw),
            Some(None) => Err(SimAdcError::Scripted),
            None => Err(SimAdcError::Exhausted),
        }
    }
}

/// Counts wake requests instead of toggling a line.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordingWake {
    pub count: u32,
}

impl WakeSignal for RecordingWake {
    fn wake_host(&mut self) {
        self.count += 1;
    }
}

/// Advances a virtual clock instead of sleeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimClock {
    pub elapsed_ns: u64,
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_plays_back_then_exhausts() {
        let mut adc = ScriptedAdc::new(vec![Some(12), None]);
        assert_eq!(adc.read_raw(), Ok(12));
        assert_eq!(adc.read_raw(), Err(SimAdcError::Scripted));
        assert_eq!(adc.read_raw(), Err(SimAdcError::Exhausted));
        assert_eq!(adc.reads(), 3);
    }

    #[test]
    fn ramp_climbs_by_step() {
        let mut adc = ScriptedAdc::ramp(100, 50, 3);
        assert_eq!(adc.read_raw(), Ok(100));
        assert_eq!(adc.read_raw(), Ok(150));
        assert_eq!(adc.read_raw(), Ok(200));
        assert_eq!(adc.read_raw(), Err(SimAdcError::Exhausted));
    }

    #[test]
    fn wake_signals_are_counted() {
        let mut wake = RecordingWake::default();
        wake.wake_host();
        wake.wake_host();
        assert_eq!(wake.count, 2);
    }

    #[test]
    fn clock_accumulates_millis() {
        let mut clock = SimClock::default();
        clock.delay_ms(200);
        clock.delay_ms(200);
        assert_eq!(clock.elapsed_ns, 400_000_000);
    }
}
