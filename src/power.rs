// NH3 Sentinel — Power Management
//
// Main-CPU side of the coprocessor contract: figure out why we booted, hand
// the monitor its threshold and confirm count, read back what it saw, and go
// to deep sleep with the ULP as the wake source.

use crate::config::MonitorConfig;
use crate::shared::{MonitorSnapshot, SharedState, SharedVar};

// esp_sleep_source_t values (ESP-IDF 5.x).
const CAUSE_UNDEFINED: u32 = 0;
const CAUSE_EXT0: u32 = 2;
const CAUSE_EXT1: u32 = 3;
const CAUSE_TIMER: u32 = 4;
const CAUSE_ULP: u32 = 6;
const CAUSE_GPIO: u32 = 7;
const CAUSE_COCPU: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Cold boot or reset; not a deep-sleep wake.
    PowerOn,
    /// The coprocessor confirmed an NH3 exceedance.
    UlpWake,
    Timer,
    Gpio,
    Other(u32),
}

impl WakeReason {
    pub fn from_cause(raw: u32) -> Self {
        match raw {
            CAUSE_UNDEFINED => Self::PowerOn,
            CAUSE_ULP | CAUSE_COCPU => Self::UlpWake,
            CAUSE_TIMER => Self::Timer,
            CAUSE_EXT0 | CAUSE_EXT1 | CAUSE_GPIO => Self::Gpio,
            other => Self::Other(other),
        }
    }
}

/// Platform hooks for the coprocessor and sleep controller.
pub trait UlpControl {
    /// Copy the monitor image into RTC memory.  Resets the shared words to
    /// their initial values.
    fn load_program(&mut self) -> anyhow::Result<()>;
    fn start(&mut self) -> anyhow::Result<()>;
    fn enable_wakeup(&mut self) -> anyhow::Result<()>;
    fn wakeup_cause(&self) -> WakeReason;
    fn deep_sleep(&mut self) -> !;
}

pub struct PowerManager<C, S> {
    control: C,
    shared: S,
    config: MonitorConfig,
}

impl<C: UlpControl, S: SharedState> PowerManager<C, S> {
    pub fn new(control: C, shared: S, config: MonitorConfig) -> Self {
        Self {
            control,
            shared,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn determine_wake_reason(&self) -> WakeReason {
        self.control.wakeup_cause()
    }

    /// Load a fresh monitor image and arm it with the current config.
    pub fn load_ulp_program(&mut self) -> anyhow::Result<()> {
        self.config.validate()?;
        self.control.load_program()?;
        let config = self.config;
        self.arm(&config)
    }

    /// Write threshold and confirm count and clear the run state.  The cycle
    /// count is left alone; it counts across wakes.
    pub fn arm(&mut self, config: &MonitorConfig) -> anyhow::Result<()> {
        config.validate()?;
        self.config = *config;

        let threshold = config.threshold_adc();
        self.shared.set_threshold(threshold);
        self.shared.set_confirm_count(config.confirm_count);
        self.shared.store(SharedVar::AboveCount, 0);
        self.shared.set_stop(false);

        log::info!(
            "ULP armed: {:.1} ppm -> ADC {}, confirm {} x {} ms",
            config.threshold_ppm,
            threshold,
            config.confirm_count,
            config.sample_interval_ms
        );
        Ok(())
    }

    pub fn start_ulp_monitor(&mut self) -> anyhow::Result<()> {
        self.control.start()?;
        self.control.enable_wakeup()?;
        log::info!("ULP monitor running");
        Ok(())
    }

    pub fn read_ulp_state(&self) -> MonitorSnapshot {
        self.shared.snapshot()
    }

    /// Ask the monitor to halt at its next cycle.
    pub fn stop_ulp_monitor(&mut self) {
        self.shared.set_stop(true);
        log::info!("ULP monitor stop requested");
    }

    /// Clear the stop flag and the run, then start sampling again.
    pub fn resume_ulp_monitor(&mut self) -> anyhow::Result<()> {
        self.shared.store(SharedVar::AboveCount, 0);
        self.shared.set_stop(false);
        self.start_ulp_monitor()
    }

    pub fn enter_deep_sleep(&mut self) -> ! {
        if let Err(e) = self.control.enable_wakeup() {
            log::error!("ULP wakeup source not armed ({}), sleeping anyway", e);
        }
        log::info!("Entering deep sleep — wake on NH3 (ULP)");
        self.control.deep_sleep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::MonitorShared;

    #[derive(Default)]
    struct FakeControl {
        cause: u32,
        loads: u32,
        starts: u32,
        wakeups_enabled: u32,
        fail_load: bool,
    }

    impl UlpControl for FakeControl {
        fn load_program(&mut self) -> anyhow::Result<()> {
            if self.fail_load {
                anyhow::bail!("no image");
            }
            self.loads += 1;
            Ok(())
        }

        fn start(&mut self) -> anyhow::Result<()> {
            self.starts += 1;
            Ok(())
        }

        fn enable_wakeup(&mut self) -> anyhow::Result<()> {
            self.wakeups_enabled += 1;
            Ok(())
        }

        fn wakeup_cause(&self) -> WakeReason {
            WakeReason::from_cause(self.cause)
        }

        fn deep_sleep(&mut self) -> ! {
            panic!("deep sleep entered");
        }
    }

    #[test]
    fn wake_causes_classified() {
        assert_eq!(WakeReason::from_cause(0), WakeReason::PowerOn);
        assert_eq!(WakeReason::from_cause(6), WakeReason::UlpWake);
        assert_eq!(WakeReason::from_cause(10), WakeReason::UlpWake);
        assert_eq!(WakeReason::from_cause(4), WakeReason::Timer);
        assert_eq!(WakeReason::from_cause(7), WakeReason::Gpio);
        assert_eq!(WakeReason::from_cause(2), WakeReason::Gpio);
        assert_eq!(WakeReason::from_cause(8), WakeReason::Other(8));
    }

    #[test]
    fn determine_wake_reason_asks_platform() {
        let control = FakeControl {
            cause: 6,
            ..Default::default()
        };
        let shared = MonitorShared::new();
        let pm = PowerManager::new(control, &shared, MonitorConfig::default());
        assert_eq!(pm.determine_wake_reason(), WakeReason::UlpWake);
    }

    #[test]
    fn load_arms_with_config() {
        let shared = MonitorShared::new();
        shared.store(SharedVar::AboveCount, 2);
        shared.store(SharedVar::CycleCount, 41);
        shared.set_stop(true);

        let mut pm = PowerManager::new(FakeControl::default(), &shared, MonitorConfig::default());
        pm.load_ulp_program().unwrap();

        let snap = pm.read_ulp_state();
        assert_eq!(snap.threshold_adc, 560);
        assert_eq!(snap.confirm_count, 3);
        assert_eq!(snap.above_count, 0);
        assert!(!snap.stop_flag);
        assert_eq!(snap.cycle_count, 41);
        assert_eq!(pm.control.loads, 1);
    }

    #[test]
    fn load_failure_leaves_shared_untouched() {
        let shared = MonitorShared::new();
        let control = FakeControl {
            fail_load: true,
            ..Default::default()
        };
        let mut pm = PowerManager::new(control, &shared, MonitorConfig::default());

        assert!(pm.load_ulp_program().is_err());
        assert_eq!(shared.threshold(), 1500);
    }

    #[test]
    fn arm_rejects_invalid_config() {
        let shared = MonitorShared::new();
        let mut pm = PowerManager::new(FakeControl::default(), &shared, MonitorConfig::default());
        let bad = MonitorConfig {
            confirm_count: 0,
            ..MonitorConfig::default()
        };

        assert!(pm.arm(&bad).is_err());
        assert_eq!(shared.confirm_count(), 3);
        assert_eq!(pm.config().confirm_count, 3);
    }

    #[test]
    fn stop_and_resume_cycle() {
        let shared = MonitorShared::new();
        let mut pm = PowerManager::new(FakeControl::default(), &shared, MonitorConfig::default());

        pm.start_ulp_monitor().unwrap();
        pm.stop_ulp_monitor();
        assert!(shared.stop_requested());

        shared.store(SharedVar::AboveCount, 3);
        pm.resume_ulp_monitor().unwrap();
        assert!(!shared.stop_requested());
        assert_eq!(shared.load(SharedVar::AboveCount), 0);
        assert_eq!(pm.control.starts, 2);
        assert_eq!(pm.control.wakeups_enabled, 2);
    }

    #[test]
    #[should_panic(expected = "deep sleep entered")]
    fn deep_sleep_arms_wakeup_first() {
        let shared = MonitorShared::new();
        let mut pm = PowerManager::new(FakeControl::default(), &shared, MonitorConfig::default());
        pm.enter_deep_sleep();
    }
}
