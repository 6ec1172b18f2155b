use std::sync::Arc;
use tracing::debug;

use super::error::IdentityError;
use super::platform::{
    HardwareInventory, InstallIdProvider, InterfaceEnumerator, Reachability, SystemInstallId,
    SystemInterfaces, SystemInventory,
};

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// One raw identifier the fingerprint is built from.
pub trait IdentifierSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn query(&self) -> Result<String, IdentityError>;
}

/// Installation id persisted by the OS (MachineGuid, IOPlatformUUID, machine-id).
#[derive(Clone)]
pub struct PersistentInstallId {
    provider: Arc<dyn InstallIdProvider>,
}

impl PersistentInstallId {
    pub const NAME: &'static str = "install id";

    pub fn new(provider: Arc<dyn InstallIdProvider>) -> Self {
        Self { provider }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemInstallId))
    }
}

impl IdentifierSource for PersistentInstallId {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn query(&self) -> Result<String, IdentityError> {
        let id = self
            .provider
            .persistent_id()
            .map_err(|e| IdentityError::query_failed(Self::NAME, e))?;

        if id.len() != UUID_LEN || uuid::Uuid::parse_str(&id).is_err() {
            return Err(IdentityError::MalformedIdentifier {
                identifier: Self::NAME,
                value: id,
            });
        }

        Ok(id)
    }
}

/// Vendor and physical id of the first processor record.
#[derive(Clone)]
pub struct ProcessorIdentity {
    inventory: Arc<dyn HardwareInventory>,
}

impl ProcessorIdentity {
    pub const NAME: &'static str = "processor identity";

    pub fn new(inventory: Arc<dyn HardwareInventory>) -> Self {
        Self { inventory }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemInventory))
    }
}

impl IdentifierSource for ProcessorIdentity {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn query(&self) -> Result<String, IdentityError> {
        let records = self
            .inventory
            .processors()
            .map_err(|e| IdentityError::query_failed(Self::NAME, e))?;

        let first = records
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::query_failed(Self::NAME, "no processor records returned"))?;

        Ok(format!("{}{}", first.vendor_id, first.physical_id))
    }
}

/// Hardware address of the first interface that is up, not loopback and
/// bound to a global unicast address.
#[derive(Clone)]
pub struct PrimaryMacAddress {
    enumerator: Arc<dyn InterfaceEnumerator>,
}

impl PrimaryMacAddress {
    pub const NAME: &'static str = "primary mac address";

    pub fn new(enumerator: Arc<dyn InterfaceEnumerator>) -> Self {
        Self { enumerator }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemInterfaces))
    }
}

impl IdentifierSource for PrimaryMacAddress {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn query(&self) -> Result<String, IdentityError> {
        let interfaces = self
            .enumerator
            .interfaces()
            .map_err(|e| IdentityError::query_failed(Self::NAME, e))?;

        let primary = interfaces
            .into_iter()
            .find(|intf| {
                intf.is_up
                    && !intf.is_loopback
                    && intf.addresses.contains(&Reachability::GlobalUnicast)
            })
            .ok_or(IdentityError::NoSuitableInterface)?;

        debug!("Primary interface: {} ({})", primary.name, primary.hardware_address);
        Ok(primary.hardware_address)
    }
}
