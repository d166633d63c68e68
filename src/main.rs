// NH3 Sentinel — Firmware Entry Point
//
// Boot sequence:
//   1. Work out why we woke (power-on, ULP, other).
//   2. Power-on: load the ULP monitor image and arm it from config.
//      ULP wake: log what the monitor saw, stop it, re-arm.
//   3. Start the monitor and enter deep sleep with the ULP as wake source.
//
// If the ULP image cannot be loaded the main CPU runs the same threshold
// monitor itself and never sleeps.
//
// On the host the same sequence runs against simulated hardware.

use nh3_sentinel::config::*;
use nh3_sentinel::monitor::ThresholdMonitor;
use nh3_sentinel::power::{PowerManager, WakeReason};
use nh3_sentinel::shared::MonitorShared;

// ---------------------------------------------------------------------------
// Main (device)
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use nh3_sentinel::ulp::{EspUlpControl, UlpSymbols};

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("NH3 Sentinel firmware starting…");

    let config = MonitorConfig::default();
    let mut power = PowerManager::new(EspUlpControl, UlpSymbols, config);

    match power.determine_wake_reason() {
        WakeReason::PowerOn => {
            log::info!("Boot: power-on");
            if let Err(e) = power.load_ulp_program() {
                log::warn!("ULP program load failed: {} — monitoring on main CPU", e);
                return monitor_on_main_cpu(&config);
            }
        }
        WakeReason::UlpWake => {
            let snap = power.read_ulp_state();
            log::info!(
                "Boot: ULP wake (ADC={}, threshold={}, cycles={}, confirmed={})",
                snap.last_reading,
                snap.threshold_adc,
                snap.cycle_count,
                snap.confirmed()
            );
            power.stop_ulp_monitor();
            power.arm(&config)?;
        }
        other => {
            log::info!("Boot: {:?}", other);
            power.arm(&config)?;
        }
    }

    power.start_ulp_monitor()?;
    power.enter_deep_sleep()
}

/// Run the threshold monitor on the main core with the oneshot ADC.  Each
/// confirmed exceedance is logged and the run starts over.
#[cfg(target_os = "espidf")]
fn monitor_on_main_cpu(config: &MonitorConfig) -> anyhow::Result<()> {
    use esp_idf_hal::delay::FreeRtos;
    use nh3_sentinel::drivers::adc::OneshotAdc;
    use nh3_sentinel::monitor::MonitorExit;
    use nh3_sentinel::shared::{SharedState, SharedVar};

    let shared = MonitorShared::with_limits(config.threshold_adc(), config.confirm_count);
    let mut monitor = ThresholdMonitor::new(
        OneshotAdc::new()?,
        FreeRtos,
        AlarmLog,
        &shared,
        config.sample_interval_ms,
    );

    loop {
        match monitor.run() {
            MonitorExit::WakeSignalled => {
                shared.store(SharedVar::AboveCount, 0);
                FreeRtos::delay_ms(config.sample_interval_ms);
            }
            MonitorExit::Stopped => return Ok(()),
        }
    }
}

/// Wake "signal" when the main CPU is already awake: just raise the alarm.
#[cfg(target_os = "espidf")]
struct AlarmLog;

#[cfg(target_os = "espidf")]
impl nh3_sentinel::monitor::WakeSignal for AlarmLog {
    fn wake_host(&mut self) {
        log::warn!("NH3 threshold exceeded");
    }
}

// ---------------------------------------------------------------------------
// Main (host simulation)
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use nh3_sentinel::drivers::sim::{RecordingWake, ScriptedAdc, SimClock};

    let config = MonitorConfig::default();
    let shared = MonitorShared::new();
    let mut power = PowerManager::new(SimUlp::default(), &shared, config);

    let reason = power.determine_wake_reason();
    println!("boot: {:?}", reason);
    power.load_ulp_program()?;
    power.start_ulp_monitor()?;

    // Clean air drifting up into the alarm band, 40 counts per sample.
    let mut monitor = ThresholdMonitor::new(
        ScriptedAdc::ramp(300, 40, 64),
        SimClock::default(),
        RecordingWake::default(),
        &shared,
        config.sample_interval_ms,
    );
    let exit = monitor.run();
    let (adc, clock, wake, _) = monitor.release();

    let snap = power.read_ulp_state();
    println!(
        "{:?} after {} reads ({} ms simulated), {} wake signal(s): {:?}",
        exit,
        adc.reads(),
        clock.elapsed_ns / 1_000_000,
        wake.count,
        snap
    );
    println!("confirmed: {}", snap.confirmed());
    println!(
        "last reading {:.1} ppm, threshold {:.1} ppm",
        config.calibration.adc_to_ppm(snap.last_reading),
        config.threshold_ppm
    );

    power.stop_ulp_monitor();
    power.enter_deep_sleep()
}

/// Coprocessor stand-in for the host build; "deep sleep" ends the process.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimUlp {
    running: bool,
}

#[cfg(not(target_os = "espidf"))]
impl nh3_sentinel::power::UlpControl for SimUlp {
    fn load_program(&mut self) -> anyhow::Result<()> {
        self.running = false;
        Ok(())
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.running = true;
        Ok(())
    }

    fn enable_wakeup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn wakeup_cause(&self) -> WakeReason {
        WakeReason::PowerOn
    }

    fn deep_sleep(&mut self) -> ! {
        println!("deep sleep (ULP running: {})", self.running);
        std::process::exit(0)
    }
}
