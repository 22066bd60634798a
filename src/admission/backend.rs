//! Admission backend trait for abstracting controller implementations.

use async_trait::async_trait;

use super::clock::Clock;
use super::controller::AdmissionController;
use super::decision::Decision;
use super::key::RateKey;
use super::policy::AdmissionPolicy;
use crate::error::Result;

/// Trait for admission backends.
///
/// The HTTP layer is generic over this trait so it can sit in front of the
/// in-process `AdmissionController` or any other store that makes the same
/// decision.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Count one request for `key` and decide whether it may proceed.
    async fn admit(&self, key: &RateKey) -> Result<Decision>;

    /// The policy decisions are made against.
    fn policy(&self) -> AdmissionPolicy;
}

#[async_trait]
impl<C: Clock + 'static> AdmissionBackend for AdmissionController<C> {
    async fn admit(&self, key: &RateKey) -> Result<Decision> {
        Ok(self.record_now(key))
    }

    fn policy(&self) -> AdmissionPolicy {
        *AdmissionController::<C>::policy(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_controller_as_backend() {
        let policy = AdmissionPolicy::new(Duration::from_secs(60), 2).unwrap();
        let controller = AdmissionController::with_clock(policy, ManualClock::new(0));
        let backend: &dyn AdmissionBackend = &controller;
        let key = RateKey::new("10.0.0.1").unwrap();

        assert!(tokio_test::block_on(backend.admit(&key)).unwrap().is_admitted());
        assert!(tokio_test::block_on(backend.admit(&key)).unwrap().is_admitted());
        assert!(!tokio_test::block_on(backend.admit(&key)).unwrap().is_admitted());
        assert_eq!(backend.policy().max_requests(), 2);
    }
}
