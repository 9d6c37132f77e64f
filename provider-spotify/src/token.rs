//! Shared bearer token handle.
//!
//! The OAuth exchange happens in the host; it pushes fresh tokens here and
//! both the search client and the Connect session read the latest one.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct AccessToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        let handle = Self::default();
        handle.set(token);
        handle
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        *self.inner.write() = (!token.is_empty()).then_some(token);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &self.is_present().then_some("[REDACTED]"))
            .finish()
    }
}
