//! Capability registry.
//!
//! Maps what a watch says about itself (USB IDs, model code name, firmware
//! version) to how the library treats it: a canonical display name, whether
//! it is supported, and which [`Driver`] serves it.
//!
//! Entries are matched in order and the first hit wins, so for each model the
//! entries with the highest minimum firmware come first. A registry is built
//! once, then shared read-only (`Arc<Registry>`) by the enumerator and every
//! session.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::driver::Driver;
use crate::error::Result;
use crate::identity::Version;

/// USB vendor ID used by every Suunto watch.
pub const SUUNTO_USB_VENDOR_ID: u16 = 0x1493;

/// Family tag for first and second generation Ambits.
pub const FAMILY_AMBIT: &str = "ambit";
/// Family tag for Ambit3 and Traverse watches.
pub const FAMILY_AMBIT3: &str = "ambit3";

/// One registry row.
#[derive(Clone)]
pub struct KnownDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Firmware model code name. Empty matches any model.
    pub model: String,
    /// Lowest firmware this row applies to.
    pub min_fw_version: Version,
    /// Canonical display name.
    pub name: String,
    pub supported: bool,
    /// Family tag used to attach drivers.
    pub family: String,
    pub driver: Option<Arc<dyn Driver>>,
    /// Passed to [`Driver::init`].
    pub driver_param: u32,
}

impl KnownDevice {
    fn matches(&self, vendor_id: u16, product_id: u16, model: &str, fw_version: &Version) -> bool {
        self.vendor_id == vendor_id
            && self.product_id == product_id
            && (self.model.is_empty() || self.model == model)
            && *fw_version >= self.min_fw_version
    }
}

impl fmt::Debug for KnownDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownDevice")
            .field("vendor_id", &format_args!("{:04x}", self.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.product_id))
            .field("model", &self.model)
            .field("min_fw_version", &format_args!("{}", self.min_fw_version))
            .field("name", &self.name)
            .field("supported", &self.supported)
            .field("family", &self.family)
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .field("driver_param", &format_args!("{:#06x}", self.driver_param))
            .finish()
    }
}

struct Builtin {
    product_id: u16,
    model: &'static str,
    min_fw: Version,
    name: &'static str,
    supported: bool,
    family: &'static str,
    param: u32,
}

const fn row(
    product_id: u16,
    model: &'static str,
    min_fw: Version,
    name: &'static str,
    supported: bool,
    family: &'static str,
    param: u32,
) -> Builtin {
    Builtin {
        product_id,
        model,
        min_fw,
        name,
        supported,
        family,
        param,
    }
}

const ANY_FW: Version = Version::new(0, 0, 0);

const BUILTIN: &[Builtin] = &[
    row(0x002d, "Ibisbill", ANY_FW, "Suunto Ambit3 Run", true, FAMILY_AMBIT3, 0x0400),
    row(0x002b, "Loon", ANY_FW, "Suunto Traverse", true, FAMILY_AMBIT3, 0x0400),
    row(0x002c, "Kaka", ANY_FW, "Suunto Ambit3 Vertical", true, FAMILY_AMBIT3, 0x0400),
    row(0x001e, "Finch", ANY_FW, "Suunto Ambit3 Sport", true, FAMILY_AMBIT3, 0x0400),
    row(0x001c, "Emu", ANY_FW, "Suunto Ambit3 Peak", true, FAMILY_AMBIT3, 0x0400),
    row(0x001d, "Greentit", ANY_FW, "Suunto Ambit2 R", true, FAMILY_AMBIT, 0x0400),
    row(0x001a, "Colibri", Version::new(1, 1, 2), "Suunto Ambit2 S", true, FAMILY_AMBIT, 0x0400),
    row(0x0019, "Duck", Version::new(1, 1, 2), "Suunto Ambit2", true, FAMILY_AMBIT, 0x0400),
    row(0x001a, "Colibri", ANY_FW, "Suunto Ambit2 S", false, FAMILY_AMBIT, 0x0400),
    row(0x0019, "Duck", ANY_FW, "Suunto Ambit2", false, FAMILY_AMBIT, 0x0400),
    row(0x0010, "Bluebird", Version::new(2, 1, 0), "Suunto Ambit", true, FAMILY_AMBIT, 0x0200),
    row(0x0010, "Bluebird", Version::new(1, 9, 0), "Suunto Ambit", true, FAMILY_AMBIT, 0x0100),
    row(0x0010, "Bluebird", ANY_FW, "Suunto Ambit", false, FAMILY_AMBIT, 0x0100),
];

/// Ordered, immutable-once-shared table of [`KnownDevice`]s.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: Vec<KnownDevice>,
}

impl Registry {
    pub fn new(entries: Vec<KnownDevice>) -> Self {
        Self { entries }
    }

    /// The built-in Suunto table, without drivers.
    ///
    /// Attach drivers per family with [`Registry::with_driver`].
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|b| KnownDevice {
                vendor_id: SUUNTO_USB_VENDOR_ID,
                product_id: b.product_id,
                model: b.model.to_string(),
                min_fw_version: b.min_fw,
                name: b.name.to_string(),
                supported: b.supported,
                family: b.family.to_string(),
                driver: None,
                driver_param: b.param,
            })
            .collect();
        Self { entries }
    }

    /// Serve every entry tagged `family` with `driver`.
    pub fn with_driver(mut self, family: &str, driver: Arc<dyn Driver>) -> Self {
        for entry in self.entries.iter_mut().filter(|e| e.family == family) {
            entry.driver = Some(Arc::clone(&driver));
        }
        self
    }

    /// Append one entry (lowest precedence).
    pub fn push(&mut self, entry: KnownDevice) {
        self.entries.push(entry);
    }

    /// Add entries from configuration ahead of the existing ones.
    ///
    /// `resolve` maps a family tag to its driver; entries whose family does
    /// not resolve are kept without a driver.
    pub fn extend_from_config<F>(&mut self, config: &RegistryConfig, resolve: F) -> Result<()>
    where
        F: Fn(&str) -> Option<Arc<dyn Driver>>,
    {
        let mut added = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            let mut entry = device.to_known_device()?;
            entry.driver = resolve(&entry.family);
            debug!(?entry, "registry entry from configuration");
            added.push(entry);
        }
        self.entries.splice(0..0, added);
        Ok(())
    }

    /// Cheap pre-filter: does any entry carry these USB IDs?
    pub fn is_known(&self, vendor_id: u16, product_id: u16) -> bool {
        self.entries
            .iter()
            .any(|e| e.vendor_id == vendor_id && e.product_id == product_id)
    }

    /// First entry matching the device identity.
    pub fn find(
        &self,
        vendor_id: u16,
        product_id: u16,
        model: &str,
        fw_version: &Version,
    ) -> Option<&KnownDevice> {
        self.entries
            .iter()
            .find(|e| e.matches(vendor_id, product_id, model, fw_version))
    }

    pub fn entries(&self) -> &[KnownDevice] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
