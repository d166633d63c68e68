// NH3 Sentinel — Oneshot ADC Driver
//
// Reads the MQ-137 channel from the main CPU through the raw ESP-IDF oneshot
// API.  Used when the coprocessor image cannot be loaded and the monitor has
// to run on the main core instead.

use esp_idf_sys::{self as sys, esp, EspError};

use crate::config::*;
use crate::monitor::GasAdc;

pub struct OneshotAdc {
    handle: sys::adc_oneshot_unit_handle_t,
    channel: sys::adc_channel_t,
}

impl OneshotAdc {
    /// Claim ADC1 and configure the NH3 channel for 0–3.3 V, 12-bit.
    pub fn new() -> anyhow::Result<Self> {
        let mut handle: sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        let channel = NH3_ADC_CHANNEL as sys::adc_channel_t;

        // SAFETY: both config structs outlive the calls, and `handle` is only
        // used after the unit was created successfully.
        unsafe {
            let unit_cfg = sys::adc_oneshot_unit_init_cfg_t {
                unit_id: sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp!(sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = sys::adc_oneshot_chan_cfg_t {
                atten: sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            if let Err(e) = esp!(sys::adc_oneshot_config_channel(handle, channel, &chan_cfg)) {
                sys::adc_oneshot_del_unit(handle);
                return Err(e.into());
            }
        }

        log::info!("ADC1_CH{} ready for NH3 (GPIO{})", NH3_ADC_CHANNEL, PIN_NH3_ADC);
        Ok(Self { handle, channel })
    }
}

impl GasAdc for OneshotAdc {
    type Error = EspError;

    fn read_raw(&mut self) -> Result<u32, Self::Error> {
        let mut raw: i32 = 0;
        // SAFETY: `handle` is a live unit owned by `self`.
        esp!(unsafe { sys::adc_oneshot_read(self.handle, self.channel, &mut raw) })?;
        Ok(raw.clamp(0, ADC_MAX_RAW as i32) as u32)
    }
}

impl Drop for OneshotAdc {
    fn drop(&mut self) {
        // SAFETY: the unit is released exactly once, here.
        unsafe {
            sys::adc_oneshot_del_unit(self.handle);
        }
    }
}
