// NH3 Sentinel — Coprocessor Symbol Binding
//
// The coprocessor build re-exports every global of its program with an extra
// `ulp_` prefix, so `ulp_cycle_count` in the monitor is `ulp_ulp_cycle_count`
// from the main CPU's point of view.  This module maps those linker symbols
// onto `SharedState` and wraps the ESP-IDF calls that load and start the
// program.

#[cfg(target_os = "espidf")]
pub use device::{EspUlpControl, UlpSymbols};

#[cfg(target_os = "espidf")]
mod device {
    use core::sync::atomic::AtomicU32;

    use esp_idf_sys::{self as sys, esp};

    use crate::power::{UlpControl, WakeReason};
    use crate::shared::{SharedState, SharedVar};

    extern "C" {
        static ulp_ulp_nh3_threshold_adc: AtomicU32;
        static ulp_ulp_nh3_last_reading: AtomicU32;
        static ulp_ulp_nh3_above_count: AtomicU32;
        static ulp_ulp_nh3_confirm_count: AtomicU32;
        static ulp_ulp_cycle_count: AtomicU32;
        static ulp_ulp_stop_flag: AtomicU32;

        static _binary_ulp_nh3_monitor_bin_start: u8;
        static _binary_ulp_nh3_monitor_bin_end: u8;
    }

    /// The shared words as placed in RTC slow memory by the linker.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UlpSymbols;

    impl SharedState for UlpSymbols {
        fn cell(&self, var: SharedVar) -> &AtomicU32 {
            // SAFETY: the symbols are 4-byte aligned words in RTC memory for
            // the whole program lifetime; all access goes through the atomic.
            unsafe {
                match var {
                    SharedVar::ThresholdAdc => &ulp_ulp_nh3_threshold_adc,
                    SharedVar::LastReading => &ulp_ulp_nh3_last_reading,
                    SharedVar::AboveCount => &ulp_ulp_nh3_above_count,
                    SharedVar::ConfirmCount => &ulp_ulp_nh3_confirm_count,
                    SharedVar::CycleCount => &ulp_ulp_cycle_count,
                    SharedVar::StopFlag => &ulp_ulp_stop_flag,
                }
            }
        }
    }

    /// ULP lifecycle through the ESP-IDF RISC-V coprocessor API.
    #[derive(Debug, Default)]
    pub struct EspUlpControl;

    impl UlpControl for EspUlpControl {
        fn load_program(&mut self) -> anyhow::Result<()> {
            // SAFETY: start/end bracket the image embedded by the build.
            unsafe {
                let start = &_binary_ulp_nh3_monitor_bin_start as *const u8;
                let end = &_binary_ulp_nh3_monitor_bin_end as *const u8;
                let len = end as usize - start as usize;
                log::info!("Loading ULP image ({} bytes)", len);
                esp!(sys::ulp_riscv_load_binary(start, len as _))?;
            }
            Ok(())
        }

        fn start(&mut self) -> anyhow::Result<()> {
            esp!(unsafe { sys::ulp_riscv_run() })?;
            Ok(())
        }

        fn enable_wakeup(&mut self) -> anyhow::Result<()> {
            esp!(unsafe { sys::esp_sleep_enable_ulp_wakeup() })?;
            Ok(())
        }

        fn wakeup_cause(&self) -> WakeReason {
            let raw = unsafe { sys::esp_sleep_get_wakeup_cause() };
            WakeReason::from_cause(raw as u32)
        }

        fn deep_sleep(&mut self) -> ! {
            unsafe { sys::esp_deep_sleep_start() }
        }
    }
}
