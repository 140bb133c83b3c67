//! Per-model driver interface.
//!
//! A [`Driver`] implements the high-level operations for one family of
//! watches. Every hook has a default: `init` and `deinit` do nothing, and all
//! other hooks return [`AmbitError::Unsupported`] without touching the
//! device. A driver overrides only what its hardware can do.
//!
//! Drivers are shared, immutable objects owned by the capability registry.
//! Per-connection state goes in [`Link::driver_data`](crate::session::Link).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AmbitError, Result};
use crate::log_entry::LogSink;
use crate::session::Link;

/// Battery and state report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Battery charge in percent.
    pub charge: u8,
}

/// Measurement units configured on the watch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub air_pressure: u8,
    pub date: u8,
    pub distance: u8,
    pub height: u8,
    pub temperature: u8,
    pub time: u8,
    pub weight: u8,
}

/// User profile and device settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalSettings {
    pub sportmode_button_lock: bool,
    pub timemode_button_lock: bool,
    pub compass_declination: i16,
    pub units: Units,
    pub gps_position_format: u8,
    pub language: u8,
    pub navigation_style: u8,
    pub sync_time_w_gps: bool,
    pub time_format: u8,
    pub alarm_hour: u8,
    pub alarm_minute: u8,
    pub alarm_enable: bool,
    pub dual_time_hour: u8,
    pub dual_time_minute: u8,
    pub backlight_mode: u8,
    pub backlight_brightness: u8,
    pub display_contrast: u8,
    pub display_is_negative: bool,
    pub weight_g: u16,
    pub birthyear: u16,
    pub max_hr: u8,
    pub rest_hr: u8,
    pub fitness_level: u8,
    pub is_male: bool,
    pub length_cm: u8,
    pub alti_baro_mode: u8,
    pub storm_alarm: bool,
    pub fused_alti_disabled: bool,
    pub bikepod_calibration: u16,
    pub footpod_calibration: u16,
    pub automatic_bikepower_calib: bool,
    pub automatic_footpod_calib: bool,
    pub training_program: u8,
}

/// Operations a watch model may implement.
///
/// `name` identifies the driver in logs.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when a session opens, with the registry's driver parameter.
    fn init(&self, _link: &mut Link, _param: u32) -> Result<()> {
        Ok(())
    }

    /// Called once when a session closes.
    fn deinit(&self, _link: &mut Link) {}

    /// Show (`true`) or clear (`false`) the sync message and lock the log.
    fn lock_log(&self, _link: &mut Link, _lock: bool) -> Result<()> {
        Err(AmbitError::Unsupported("lock_log"))
    }

    fn date_time_set(&self, _link: &mut Link, _date_time: &NaiveDateTime) -> Result<()> {
        Err(AmbitError::Unsupported("date_time_set"))
    }

    fn status_get(&self, _link: &mut Link) -> Result<DeviceStatus> {
        Err(AmbitError::Unsupported("status_get"))
    }

    fn personal_settings_get(&self, _link: &mut Link) -> Result<PersonalSettings> {
        Err(AmbitError::Unsupported("personal_settings_get"))
    }

    /// Read the 8-byte header of the GPS orbit data stored on the watch.
    fn gps_orbit_header_read(&self, _link: &mut Link) -> Result<[u8; 8]> {
        Err(AmbitError::Unsupported("gps_orbit_header_read"))
    }

    fn gps_orbit_write(&self, _link: &mut Link, _data: &[u8]) -> Result<()> {
        Err(AmbitError::Unsupported("gps_orbit_write"))
    }

    /// Read moves into `sink`. Returns the number of entries pushed.
    fn log_read(&self, _link: &mut Link, _sink: &mut dyn LogSink) -> Result<usize> {
        Err(AmbitError::Unsupported("log_read"))
    }
}
