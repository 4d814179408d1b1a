use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("target address cannot be empty")]
    Empty,
}

/// Shared handle to the set-top box the relay currently forwards to.
///
/// There is a single target for the whole process; the last writer wins
/// regardless of which controller or HTTP caller set it.
#[derive(Clone, Default)]
pub struct RokuTarget {
    inner: Arc<RwLock<Option<String>>>,
}

impl RokuTarget {
    pub fn new(initial: Option<String>) -> Self {
        let initial = initial
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Replace the target. Blank addresses are rejected.
    pub async fn set(&self, ip: &str) -> Result<String, TargetError> {
        let trimmed = ip.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }
        *self.inner.write().await = Some(trimmed.to_string());
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_trims_and_stores() {
        let target = RokuTarget::new(None);
        assert_eq!(target.get().await, None);
        assert_eq!(target.set("  192.168.1.40  ").await.unwrap(), "192.168.1.40");
        assert_eq!(target.get().await.as_deref(), Some("192.168.1.40"));
    }

    #[tokio::test]
    async fn blank_addresses_are_rejected() {
        let target = RokuTarget::new(Some("192.168.1.40".to_string()));
        assert_eq!(target.set("   ").await, Err(TargetError::Empty));
        // The previous target survives a rejected update.
        assert_eq!(target.get().await.as_deref(), Some("192.168.1.40"));
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let target = RokuTarget::new(Some("10.0.0.1".to_string()));
        target.set("10.0.0.2").await.unwrap();
        target.set("10.0.0.3").await.unwrap();
        assert_eq!(target.get().await.as_deref(), Some("10.0.0.3"));
    }

    #[tokio::test]
    async fn blank_initial_target_is_dropped() {
        let target = RokuTarget::new(Some("   ".to_string()));
        assert_eq!(target.get().await, None);
    }
}
