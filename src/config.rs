//! Registry configuration (TOML).
//!
//! Lets a deployment teach the registry about watches the built-in table does
//! not list, or override a built-in row, without a rebuild:
//!
//! ```toml
//! [[device]]
//! product_id = 0x002e
//! model = "Puffin"
//! min_firmware = "2.0.0"
//! name = "Suunto Ambit3 Vertical"
//! family = "ambit3"
//! driver_param = 0x0400
//! ```
//!
//! `vendor_id` defaults to Suunto's, `min_firmware` to `"0.0.0"`, `supported`
//! to `true`, `model` to empty (any model) and `driver_param` to `0`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AmbitError, Result};
use crate::identity::{Version, MODEL_NAME_LENGTH, PRODUCT_NAME_LENGTH};
use crate::registry::{KnownDevice, SUUNTO_USB_VENDOR_ID};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceEntry>,
}

/// One `[[device]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_min_firmware")]
    pub min_firmware: String,
    pub name: String,
    #[serde(default = "default_supported")]
    pub supported: bool,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub driver_param: u32,
}

fn default_vendor_id() -> u16 {
    SUUNTO_USB_VENDOR_ID
}

fn default_min_firmware() -> String {
    "0.0.0".into()
}

fn default_supported() -> bool {
    true
}

impl RegistryConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl DeviceEntry {
    /// Build a registry row without a driver.
    ///
    /// `name` and `model` must fit the descriptor fields they end up in.
    pub fn to_known_device(&self) -> Result<KnownDevice> {
        if self.name.len() > PRODUCT_NAME_LENGTH {
            return Err(AmbitError::Config(format!(
                "device name {:?} is longer than {PRODUCT_NAME_LENGTH} bytes",
                self.name
            )));
        }
        if self.model.len() > MODEL_NAME_LENGTH {
            return Err(AmbitError::Config(format!(
                "model {:?} is longer than {MODEL_NAME_LENGTH} bytes",
                self.model
            )));
        }
        Ok(KnownDevice {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            model: self.model.clone(),
            min_fw_version: self.min_firmware.parse::<Version>()?,
            name: self.name.clone(),
            supported: self.supported,
            family: self.family.clone(),
            driver: None,
            driver_param: self.driver_param,
        })
    }
}
