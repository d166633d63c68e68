// NH3 Sentinel — Hardware & Monitor Configuration
// Target: ESP32-S3 with the RISC-V ULP coprocessor, MQ-137 on ADC1.

use anyhow::bail;

// ---------------------------------------------------------------------------
// ADC (MQ-137 ammonia sensor)
// ---------------------------------------------------------------------------
pub const PIN_NH3_ADC: i32 = 5;      // GPIO5 — MQ-137 analog output
pub const NH3_ADC_CHANNEL: u32 = 4;  // ADC1_CH4 = GPIO5
pub const ADC_MAX_RAW: u32 = 4095;   // 12-bit conversion

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SAMPLE_INTERVAL_MS: u32 = 200; // 5 Hz while the main CPU sleeps

// ---------------------------------------------------------------------------
// Monitor Defaults (mirrored in the coprocessor image)
// ---------------------------------------------------------------------------
pub const DEFAULT_THRESHOLD_ADC: u32 = 1500;
pub const DEFAULT_CONFIRM_COUNT: u32 = 3;
pub const DEFAULT_THRESHOLD_PPM: f32 = 10.0;

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Two-point linear calibration of the MQ-137 output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Raw reading in clean air.
    pub zero_adc: u32,
    /// Raw reading at `span_ppm`.
    pub span_adc: u32,
    pub span_ppm: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            zero_adc: 200,
            span_adc: 2000,
            span_ppm: 50.0,
        }
    }
}

impl Calibration {
    /// Concentration for a raw reading.  Anything at or below the zero point
    /// reads as clean air.
    pub fn adc_to_ppm(&self, raw: u32) -> f32 {
        if raw <= self.zero_adc || self.span_adc <= self.zero_adc {
            return 0.0;
        }
        let range = (self.span_adc - self.zero_adc) as f32;
        let normalised = (raw - self.zero_adc) as f32 / range;
        (normalised * self.span_ppm).max(0.0)
    }

    /// Raw threshold the coprocessor compares against for a given ppm.
    /// A degenerate calibration, or one whose zero point lies outside the
    /// 12-bit range, yields `ADC_MAX_RAW`, which the ADC can only just reach,
    /// so the monitor effectively never fires.
    pub fn ppm_to_adc(&self, ppm: f32) -> u32 {
        if self.span_adc <= self.zero_adc
            || self.zero_adc > ADC_MAX_RAW
            || !(self.span_ppm > 0.0)
            || !ppm.is_finite()
        {
            return ADC_MAX_RAW;
        }
        if ppm <= 0.0 {
            return self.zero_adc;
        }
        let range = (self.span_adc - self.zero_adc) as f32;
        let raw = self.zero_adc as f32 + (ppm / self.span_ppm) * range;
        (raw.round() as u32).clamp(self.zero_adc, ADC_MAX_RAW)
    }
}

// ---------------------------------------------------------------------------
// Monitor Configuration
// ---------------------------------------------------------------------------

/// What the main CPU hands the coprocessor before going to sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    pub threshold_ppm: f32,
    /// Consecutive readings at or above threshold before waking the host.
    pub confirm_count: u32,
    pub sample_interval_ms: u32,
    pub calibration: Calibration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_ppm: DEFAULT_THRESHOLD_PPM,
            confirm_count: DEFAULT_CONFIRM_COUNT,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            calibration: Calibration::default(),
        }
    }
}

impl MonitorConfig {
    /// Default config whose confirm count covers `window_secs` of samples.
    pub fn from_confirm_window(window_secs: u32) -> Self {
        let mut cfg = Self::default();
        cfg.confirm_count = confirm_count_for(window_secs, cfg.sample_interval_ms);
        cfg
    }

    pub fn threshold_adc(&self) -> u32 {
        self.calibration.ppm_to_adc(self.threshold_ppm)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.confirm_count == 0 {
            bail!("confirm count must be at least 1");
        }
        if self.sample_interval_ms == 0 {
            bail!("sample interval must be nonzero");
        }
        if self.calibration.span_adc <= self.calibration.zero_adc {
            bail!(
                "calibration span ({}) must exceed zero point ({})",
                self.calibration.span_adc,
                self.calibration.zero_adc
            );
        }
        if self.calibration.span_adc > ADC_MAX_RAW {
            bail!(
                "calibration span ({}) exceeds the ADC range (0..={})",
                self.calibration.span_adc,
                ADC_MAX_RAW
            );
        }
        if !(self.calibration.span_ppm > 0.0) {
            bail!("calibration span ppm must be positive");
        }
        if !self.threshold_ppm.is_finite() || self.threshold_ppm < 0.0 {
            bail!("threshold {} ppm is not a valid concentration", self.threshold_ppm);
        }
        Ok(())
    }
}

/// Samples needed to span `window_secs`, rounded up, never below one.
fn confirm_count_for(window_secs: u32, interval_ms: u32) -> u32 {
    if interval_ms == 0 {
        return 1;
    }
    let window_ms = u64::from(window_secs) * 1000;
    let count = window_ms.div_ceil(u64::from(interval_ms));
    count.clamp(1, u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_maps_onto_calibration_line() {
        let cfg = MonitorConfig::default();
        // 10 ppm is a fifth of the 50 ppm span above the zero point.
        assert_eq!(cfg.threshold_adc(), 200 + 360);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn ppm_round_trip_within_one_step() {
        let cal = Calibration::default();
        for ppm in [0.5f32, 3.3, 12.0, 25.0, 49.9] {
            let back = cal.adc_to_ppm(cal.ppm_to_adc(ppm));
            let step = cal.span_ppm / (cal.span_adc - cal.zero_adc) as f32;
            assert!((back - ppm).abs() <= step, "{ppm} -> {back}");
        }
    }

    #[test]
    fn clean_air_reads_zero() {
        let cal = Calibration::default();
        assert_eq!(cal.adc_to_ppm(0), 0.0);
        assert_eq!(cal.adc_to_ppm(200), 0.0);
        assert_eq!(cal.ppm_to_adc(0.0), 200);
        assert_eq!(cal.ppm_to_adc(-4.0), 200);
    }

    #[test]
    fn threshold_clamped_to_adc_range() {
        let cal = Calibration::default();
        assert_eq!(cal.ppm_to_adc(10_000.0), ADC_MAX_RAW);
    }

    #[test]
    fn degenerate_calibration_never_fires() {
        let cal = Calibration {
            zero_adc: 900,
            span_adc: 900,
            span_ppm: 50.0,
        };
        assert_eq!(cal.ppm_to_adc(10.0), ADC_MAX_RAW);
        assert_eq!(cal.adc_to_ppm(3000), 0.0);

        let cfg = MonitorConfig {
            calibration: cal,
            ..MonitorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn calibration_beyond_adc_range_rejected_without_panic() {
        let cal = Calibration {
            zero_adc: 5000,
            span_adc: 6000,
            span_ppm: 50.0,
        };
        assert_eq!(cal.ppm_to_adc(10.0), ADC_MAX_RAW);
        assert_eq!(cal.ppm_to_adc(0.0), ADC_MAX_RAW);

        let cfg = MonitorConfig {
            calibration: cal,
            ..MonitorConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.threshold_adc(), ADC_MAX_RAW);

        // Zero point in range, span point past full scale.
        let cfg = MonitorConfig {
            calibration: Calibration {
                zero_adc: 200,
                span_adc: 5000,
                span_ppm: 50.0,
            },
            ..MonitorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_confirm_and_interval() {
        let mut cfg = MonitorConfig::default();
        cfg.confirm_count = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MonitorConfig::default();
        cfg.sample_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = MonitorConfig::default();
        cfg.threshold_ppm = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn confirm_window_rounds_up() {
        assert_eq!(MonitorConfig::from_confirm_window(30).confirm_count, 150);
        assert_eq!(confirm_count_for(1, 300), 4);
        assert_eq!(confirm_count_for(0, 200), 1);
        assert_eq!(confirm_count_for(5, 0), 1);
    }
}
