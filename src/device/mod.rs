pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod hash;
pub mod platform;
pub mod sources;

pub use error::{IdentityError, ProviderError};
pub use fingerprint::{derive_fingerprint, FingerprintDeriver};
pub use guard::TimeoutGuard;
pub use hash::{compute, md5_hex, Fingerprint, FingerprintInput};
pub use platform::{
    hardware_addresses, HardwareInventory, InstallIdProvider, InterfaceEnumerator, InterfaceRecord,
    ProcessorRecord, Reachability, SystemInstallId, SystemInterfaces, SystemInventory,
};
pub use sources::{IdentifierSource, PersistentInstallId, PrimaryMacAddress, ProcessorIdentity};
