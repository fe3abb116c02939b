use std::sync::{Arc, PoisonError, RwLock};

use barscan_kv::{KVError, KVStore};
use tracing::{info, warn};

/// Fixed key holding the installation's identity.
pub const DEVICE_ID_KEY: &str = "device:id";

/// DeviceIdentity resolves the stable id of this installation.
///
/// The id is created once (UUID v4), persisted under [`DEVICE_ID_KEY`] and
/// cached for the lifetime of this instance. Construct one per application
/// and share it through `Arc`.
///
/// If storage misbehaves the provider degrades to an in-memory id for the
/// rest of the process instead of failing: scans stay grouped within the
/// session but will not be found again after a restart.
pub struct DeviceIdentity {
    kv: Arc<dyn KVStore>,
    cached: RwLock<Option<String>>,
}

impl DeviceIdentity {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            cached: RwLock::new(None),
        }
    }

    /// An identity that is already resolved. Storage is only touched by
    /// [`clear_device_id`](Self::clear_device_id).
    pub fn with_fixed(kv: Arc<dyn KVStore>, id: impl Into<String>) -> Self {
        Self {
            kv,
            cached: RwLock::new(Some(id.into())),
        }
    }

    /// Return the device id, creating and persisting it on first use.
    pub fn device_id(&self) -> String {
        if let Some(id) = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return id.clone();
        }

        let mut slot = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have resolved it while we waited for the lock.
        if let Some(id) = slot.as_ref() {
            return id.clone();
        }

        let id = match self.load_or_create() {
            Ok(id) => id,
            Err(e) => {
                let id = uuid::Uuid::new_v4().to_string();
                warn!("device id storage unavailable ({}), using in-memory id {}", e, id);
                id
            }
        };
        *slot = Some(id.clone());
        id
    }

    /// Remove the persisted id and forget the cached one.
    ///
    /// Test/reset path. If the delete fails the cached id is kept.
    pub fn clear_device_id(&self) {
        match self.kv.delete(DEVICE_ID_KEY) {
            Ok(()) => {
                *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
                info!("device id cleared");
            }
            Err(e) => warn!("failed to clear device id: {}", e),
        }
    }

    fn load_or_create(&self) -> Result<String, KVError> {
        if let Some(bytes) = self.kv.get(DEVICE_ID_KEY)? {
            let id = String::from_utf8(bytes)
                .map_err(|e| KVError::Serialization(format!("device id: {}", e)))?;
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.kv.set(DEVICE_ID_KEY, id.as_bytes())?;
        info!("generated new device id {}", id);
        Ok(id)
    }
}
