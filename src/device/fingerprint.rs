use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::IdentityError;
use super::guard::TimeoutGuard;
use super::hash::{Fingerprint, FingerprintInput, INPUT_LEN};
use super::sources::{IdentifierSource, PersistentInstallId, PrimaryMacAddress, ProcessorIdentity};

/// Collects the three machine identifiers and hashes them.
///
/// Nothing is cached: every `derive` call queries live system state.
#[derive(Clone)]
pub struct FingerprintDeriver {
    install_id: Arc<dyn IdentifierSource>,
    processor: Arc<dyn IdentifierSource>,
    mac_address: Arc<dyn IdentifierSource>,
    guard: TimeoutGuard,
}

impl FingerprintDeriver {
    pub fn new(
        install_id: Arc<dyn IdentifierSource>,
        processor: Arc<dyn IdentifierSource>,
        mac_address: Arc<dyn IdentifierSource>,
    ) -> Self {
        Self {
            install_id,
            processor,
            mac_address,
            guard: TimeoutGuard::default(),
        }
    }

    /// Deriver over this machine's own identifier sources.
    pub fn system() -> Self {
        Self::new(
            Arc::new(PersistentInstallId::system()),
            Arc::new(ProcessorIdentity::system()),
            Arc::new(PrimaryMacAddress::system()),
        )
    }

    /// Deadline for the processor query.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.guard = TimeoutGuard::new(deadline);
        self
    }

    /// 16 uppercase hex characters identifying this machine.
    ///
    /// Stops at the first identifier that cannot be read; a fingerprint is
    /// never built from fewer than all three.
    pub async fn derive(&self) -> Result<Fingerprint, IdentityError> {
        let mut ids = Vec::with_capacity(INPUT_LEN);

        let value = Self::off_runtime(&self.install_id).await;
        ids.push(Self::checked(self.install_id.as_ref(), value)?);

        let processor = Arc::clone(&self.processor);
        let name = processor.name();
        let value = self.guard.run(name, move || processor.query()).await;
        ids.push(Self::checked(self.processor.as_ref(), value)?);

        let value = Self::off_runtime(&self.mac_address).await;
        ids.push(Self::checked(self.mac_address.as_ref(), value)?);

        let fingerprint = FingerprintInput::try_from(ids)?.compute(true, true);
        info!("🔑 Device fingerprint derived: {}", fingerprint);
        Ok(fingerprint)
    }

    /// Runs an unbounded query on the blocking pool.
    async fn off_runtime(source: &Arc<dyn IdentifierSource>) -> Result<String, IdentityError> {
        let source = Arc::clone(source);
        let name = source.name();
        tokio::task::spawn_blocking(move || source.query())
            .await
            .unwrap_or_else(|e| Err(IdentityError::query_failed(name, e)))
    }

    fn checked(
        source: &dyn IdentifierSource,
        value: Result<String, IdentityError>,
    ) -> Result<String, IdentityError> {
        match value {
            Ok(v) => {
                debug!("  ✓ {}: {}", source.name(), v);
                Ok(v)
            }
            Err(e) => {
                warn!("  ✗ {}: {}", source.name(), e);
                Err(e)
            }
        }
    }
}

/// Derives this machine's fingerprint with the default deadline.
pub async fn derive_fingerprint() -> Result<Fingerprint, IdentityError> {
    FingerprintDeriver::system().derive().await
}
