// Licensed under the Apache-2.0 license

//! Activation surface (§6): the small set of read/write properties an external management-bus
//! binding exposes for this agent. Defining that bus binding (D-Bus, Redfish, whatever the
//! platform uses) is external to this crate; this struct is the shape a binding - or, in this
//! crate's own tests, a harness - drives. The single edge that matters functionally is the write
//! of `RequestedActivation = Active`: that is what wakes [`crate::manager::activate_staged`]
//! and starts every matched Device Updater and sidecar hand-off together.

use crate::update_manager::ActivationState;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Digest and algorithm name published alongside `PackageVersion`, mirroring what a signature
/// verifier checked the package against (§4.2, §6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDigest {
    pub algorithm: String,
    pub digest: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    activation: ActivationState,
    requested_activation: bool,
    progress: u8,
    package_version: String,
    digest: Option<PackageDigest>,
}

/// Read/write activation properties for the currently staged package, guarded by a single lock.
pub struct ActivationSurface {
    inner: Mutex<Inner>,
    activated: Condvar,
}

impl Default for ActivationSurface {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            activated: Condvar::new(),
        }
    }
}

impl ActivationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the surface for a newly staged package: `Ready`, zero progress, the new version
    /// and digest published, and the activation-requested edge cleared.
    pub fn reset(&self, package_version: String, digest: Option<PackageDigest>) {
        let mut inner = self.inner.lock().unwrap();
        inner.activation = ActivationState::Ready;
        inner.requested_activation = false;
        inner.progress = 0;
        inner.package_version = package_version;
        inner.digest = digest;
    }

    pub fn activation(&self) -> ActivationState {
        self.inner.lock().unwrap().activation
    }

    pub fn set_activation(&self, state: ActivationState) {
        self.inner.lock().unwrap().activation = state;
    }

    pub fn progress(&self) -> u8 {
        self.inner.lock().unwrap().progress
    }

    pub fn set_progress(&self, percent: u8) {
        self.inner.lock().unwrap().progress = percent.min(100);
    }

    pub fn package_version(&self) -> String {
        self.inner.lock().unwrap().package_version.clone()
    }

    pub fn digest(&self) -> Option<PackageDigest> {
        self.inner.lock().unwrap().digest.clone()
    }

    /// Writes `RequestedActivation = Active`: the edge that wakes every blocked
    /// [`ActivationSurface::wait_for_activation_request`] caller and moves `Activation` to
    /// `Activating`.
    pub fn request_activation(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.requested_activation = true;
        inner.activation = ActivationState::Activating;
        drop(inner);
        self.activated.notify_all();
    }

    pub fn activation_requested(&self) -> bool {
        self.inner.lock().unwrap().requested_activation
    }

    /// Blocks until `request_activation` has been called, or `timeout` elapses. Returns whether
    /// the request landed.
    pub fn wait_for_activation_request(&self, timeout: Duration) -> bool {
        let inner = self.inner.lock().unwrap();
        if inner.requested_activation {
            return true;
        }
        let (inner, result) = self
            .activated
            .wait_timeout_while(inner, timeout, |i| !i.requested_activation)
            .unwrap();
        !result.timed_out() && inner.requested_activation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_activation_flips_state_and_flag() {
        let surface = ActivationSurface::new();
        surface.reset("1.2.3".to_string(), None);
        assert_eq!(surface.activation(), ActivationState::Ready);
        assert!(!surface.activation_requested());

        surface.request_activation();
        assert!(surface.activation_requested());
        assert_eq!(surface.activation(), ActivationState::Activating);
    }

    #[test]
    fn wait_for_activation_request_observes_concurrent_write() {
        let surface = std::sync::Arc::new(ActivationSurface::new());
        let surface2 = surface.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            surface2.request_activation();
        });
        assert!(surface.wait_for_activation_request(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_for_activation_request_times_out() {
        let surface = ActivationSurface::new();
        assert!(!surface.wait_for_activation_request(Duration::from_millis(20)));
    }

    #[test]
    fn progress_is_clamped_to_100() {
        let surface = ActivationSurface::new();
        surface.set_progress(255);
        assert_eq!(surface.progress(), 100);
    }
}
