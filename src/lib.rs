// NH3 Sentinel — Library Root
//
// Everything except the firmware entry point lives here so the monitor and
// power logic can be tested on the host.  ESP-IDF specific pieces are behind
// `#[cfg(target_os = "espidf")]` inside their modules.

pub mod config;
pub mod drivers;
pub mod monitor;
pub mod power;
pub mod shared;
pub mod ulp;
