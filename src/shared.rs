// NH3 Sentinel — Coprocessor Shared Memory
//
// Six 32-bit words live in RTC slow memory and survive deep sleep.  The
// coprocessor owns them; the main CPU reads all of them and writes only the
// threshold, confirm count and stop flag.  Access is plain relaxed loads and
// stores: the two cores never write the same word at the same time, and the
// coprocessor core has no atomic read-modify-write instructions.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::{DEFAULT_CONFIRM_COUNT, DEFAULT_THRESHOLD_ADC};

// ---------------------------------------------------------------------------
// Variable catalogue
// ---------------------------------------------------------------------------

/// One of the shared words, named by the fixed `ulp_*` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedVar {
    ThresholdAdc,
    LastReading,
    AboveCount,
    ConfirmCount,
    CycleCount,
    StopFlag,
}

impl SharedVar {
    /// Declaration order in the coprocessor image.
    pub const ALL: [SharedVar; 6] = [
        Self::ThresholdAdc,
        Self::LastReading,
        Self::AboveCount,
        Self::ConfirmCount,
        Self::CycleCount,
        Self::StopFlag,
    ];

    /// Symbol name as declared by the coprocessor program.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::ThresholdAdc => "ulp_nh3_threshold_adc",
            Self::LastReading  => "ulp_nh3_last_reading",
            Self::AboveCount   => "ulp_nh3_above_count",
            Self::ConfirmCount => "ulp_nh3_confirm_count",
            Self::CycleCount   => "ulp_cycle_count",
            Self::StopFlag     => "ulp_stop_flag",
        }
    }

    pub fn from_symbol(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.symbol() == name)
    }

    /// Whether the main CPU may write this word while the monitor runs.
    pub const fn host_writable(self) -> bool {
        matches!(self, Self::ThresholdAdc | Self::ConfirmCount | Self::StopFlag)
    }

    /// Value the coprocessor image starts with after a fresh load.
    pub const fn initial_value(self) -> u32 {
        match self {
            Self::ThresholdAdc => DEFAULT_THRESHOLD_ADC,
            Self::ConfirmCount => DEFAULT_CONFIRM_COUNT,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Access trait
// ---------------------------------------------------------------------------

/// Anything that can hand out the six shared words.
///
/// Implemented by [`MonitorShared`] for an in-process block, and by the
/// linker-symbol binding in [`crate::ulp`] on the device.
pub trait SharedState {
    fn cell(&self, var: SharedVar) -> &AtomicU32;

    fn load(&self, var: SharedVar) -> u32 {
        self.cell(var).load(Ordering::Relaxed)
    }

    fn store(&self, var: SharedVar, value: u32) {
        self.cell(var).store(value, Ordering::Relaxed)
    }

    fn threshold(&self) -> u32 {
        self.load(SharedVar::ThresholdAdc)
    }

    fn set_threshold(&self, raw: u32) {
        self.store(SharedVar::ThresholdAdc, raw)
    }

    fn confirm_count(&self) -> u32 {
        self.load(SharedVar::ConfirmCount)
    }

    fn set_confirm_count(&self, count: u32) {
        self.store(SharedVar::ConfirmCount, count)
    }

    fn stop_requested(&self) -> bool {
        self.load(SharedVar::StopFlag) != 0
    }

    fn set_stop(&self, stop: bool) {
        self.store(SharedVar::StopFlag, u32::from(stop))
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            threshold_adc: self.load(SharedVar::ThresholdAdc),
            last_reading: self.load(SharedVar::LastReading),
            above_count: self.load(SharedVar::AboveCount),
            confirm_count: self.load(SharedVar::ConfirmCount),
            cycle_count: self.load(SharedVar::CycleCount),
            stop_flag: self.load(SharedVar::StopFlag) != 0,
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory block
// ---------------------------------------------------------------------------

/// The shared words as one `#[repr(C)]` block, in declaration order.
#[repr(C)]
#[derive(Debug)]
pub struct MonitorShared {
    threshold_adc: AtomicU32,
    last_reading: AtomicU32,
    above_count: AtomicU32,
    confirm_count: AtomicU32,
    cycle_count: AtomicU32,
    stop_flag: AtomicU32,
}

impl MonitorShared {
    /// Same initial contents as a freshly loaded coprocessor image.
    pub const fn new() -> Self {
        Self::with_limits(DEFAULT_THRESHOLD_ADC, DEFAULT_CONFIRM_COUNT)
    }

    pub const fn with_limits(threshold_adc: u32, confirm_count: u32) -> Self {
        Self {
            threshold_adc: AtomicU32::new(threshold_adc),
            last_reading: AtomicU32::new(0),
            above_count: AtomicU32::new(0),
            confirm_count: AtomicU32::new(confirm_count),
            cycle_count: AtomicU32::new(0),
            stop_flag: AtomicU32::new(0),
        }
    }
}

impl Default for MonitorShared {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState for MonitorShared {
    fn cell(&self, var: SharedVar) -> &AtomicU32 {
        match var {
            SharedVar::ThresholdAdc => &self.threshold_adc,
            SharedVar::LastReading => &self.last_reading,
            SharedVar::AboveCount => &self.above_count,
            SharedVar::ConfirmCount => &self.confirm_count,
            SharedVar::CycleCount => &self.cycle_count,
            SharedVar::StopFlag => &self.stop_flag,
        }
    }
}

impl<T: SharedState + ?Sized> SharedState for &T {
    fn cell(&self, var: SharedVar) -> &AtomicU32 {
        (**self).cell(var)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the shared words, as read by the main CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub threshold_adc: u32,
    pub last_reading: u32,
    pub above_count: u32,
    pub confirm_count: u32,
    pub cycle_count: u32,
    pub stop_flag: bool,
}

impl MonitorSnapshot {
    /// True when the monitor's last state satisfies its own wake condition.
    pub fn confirmed(&self) -> bool {
        self.above_count > 0 && self.above_count >= self.confirm_count
    }
}
