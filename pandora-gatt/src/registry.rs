//! Connections: maps connection cookies to their GattInstance

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pandora_proto::Connection;
use tokio::sync::{Mutex, RwLock};

use crate::GattError;
use crate::instance::{GattInstance, cookie_str};
use crate::platform::GattPlatform;

pub type Instance<P> = Arc<GattInstance<<P as GattPlatform>::Client>>;

/// One cookie's instance. Attaching holds only this lock, so lookups for
/// other cookies never wait on a slow platform.
type Slot<P> = Arc<Mutex<Option<Instance<P>>>>;

pub struct Connections<P: GattPlatform> {
    platform: Arc<P>,
    slots: RwLock<HashMap<Vec<u8>, Slot<P>>>,
    callback_timeout: Duration,
}

impl<P: GattPlatform> Connections<P> {
    pub fn new(platform: Arc<P>, callback_timeout: Duration) -> Self {
        Self {
            platform,
            slots: RwLock::new(HashMap::new()),
            callback_timeout,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn callback_timeout(&self) -> Duration {
        self.callback_timeout
    }

    /// Instance for the request's connection, attaching to the platform
    /// connection on first use or after the previous one was lost.
    pub async fn get(&self, connection: Option<&Connection>) -> Result<Instance<P>, GattError> {
        let cookie = &connection.ok_or(GattError::MissingConnection)?.cookie;
        let slot = self.slot(cookie).await;

        let mut current = slot.lock().await;
        if let Some(instance) = current.as_ref() {
            if instance.is_connected() {
                return Ok(instance.clone());
            }
            tracing::info!(cookie = %cookie_str(cookie), "dropping stale gatt instance");
            *current = None;
        }

        let opened = tokio::time::timeout(
            self.callback_timeout,
            GattInstance::open(self.platform.as_ref(), cookie, self.callback_timeout),
        )
        .await
        .map_err(|_| GattError::Timeout(format!("attach to {}", cookie_str(cookie))))
        .and_then(|result| result);

        match opened {
            Ok(instance) => {
                let instance = Arc::new(instance);
                *current = Some(instance.clone());
                Ok(instance)
            }
            Err(e) => {
                drop(current);
                self.forget_if_empty(cookie, &slot).await;
                Err(e)
            }
        }
    }

    async fn slot(&self, cookie: &[u8]) -> Slot<P> {
        if let Some(slot) = self.slots.read().await.get(cookie) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(cookie.to_vec())
            .or_default()
            .clone()
    }

    /// Unknown cookies must not pile up as empty slots.
    async fn forget_if_empty(&self, cookie: &[u8], slot: &Slot<P>) {
        let mut slots = self.slots.write().await;
        let unused = slots.get(cookie).is_some_and(|s| Arc::ptr_eq(s, slot))
            && slot.try_lock().is_ok_and(|current| current.is_none());
        if unused {
            slots.remove(cookie);
        }
    }

    /// Number of attached connections, live or stale.
    pub async fn attached(&self) -> usize {
        let slots: Vec<Slot<P>> = self.slots.read().await.values().cloned().collect();
        let mut attached = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                attached += 1;
            }
        }
        attached
    }
}
