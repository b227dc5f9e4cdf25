// Licensed under the Apache-2.0 license

//! Update Manager: lifecycle of the single in-flight package (§4.6).
//!
//! Holds the parsed package, the device-record matches produced by [`crate::matcher`], and the
//! non-PLDM sidecar set; aggregates per-device and per-sidecar completions into the package's
//! activation verdict and a monotonic `0..100` progress percentage. Routing inbound PLDM
//! requests to the `Device Updater`/`Component Updater` owning an endpoint, and actually driving
//! the transport, is the concern of the daemon event loop (`daemon.rs`) built around one
//! `update_sm::StateMachine` per matched endpoint; this module is the single-owner bookkeeping
//! object described in Design Note "Global current activation".

use crate::matcher::{self, DescriptorMap, DeviceRecordMatch};
use crate::transport::EndpointId;
use log::{info, warn};
use pldm_fw_pkg::FirmwareManifest;
use std::collections::{HashMap, HashSet};

/// Mirrors the `Activation` property on the management-bus activation surface (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    #[default]
    Ready,
    Activating,
    Active,
    Failed,
    Invalid,
}

/// Terminal result of one device update or one sidecar hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed,
}

/// Identifies one unit the manager is waiting on a completion for: either a matched PLDM device
/// record, or a non-PLDM sidecar keyed by the updater name that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompletionTarget {
    Device(EndpointId, usize),
    Sidecar(String),
}

/// The single package currently being staged or activated. At most one exists at a time; the
/// Update Manager replaces it wholesale rather than mutating around a previous run (§3).
pub struct InFlightPackage {
    pub manifest: FirmwareManifest,
    pub matches: Vec<DeviceRecordMatch>,
    outcomes: HashMap<CompletionTarget, Outcome>,
    activation_state: ActivationState,
}

impl InFlightPackage {
    pub fn new(
        manifest: FirmwareManifest,
        descriptor_map: &DescriptorMap,
        targets: Option<&HashSet<String>>,
        sidecar_updaters: &[String],
    ) -> Self {
        let matches = matcher::match_device_records(
            &manifest.firmware_device_id_records,
            &manifest.component_image_information,
            descriptor_map,
            targets,
        );

        let mut outcomes = HashMap::new();
        for m in &matches {
            outcomes.insert(
                CompletionTarget::Device(m.endpoint, m.record_index),
                Outcome::Pending,
            );
        }
        for updater in sidecar_updaters {
            outcomes.insert(
                CompletionTarget::Sidecar(updater.clone()),
                Outcome::Pending,
            );
        }

        if outcomes.is_empty() {
            info!("No matching device or sidecar for this package");
        }

        Self {
            manifest,
            matches,
            outcomes,
            activation_state: ActivationState::Ready,
        }
    }

    /// Number of units (PLDM device matches + sidecars) the package expects a completion from.
    pub fn expected_completions(&self) -> usize {
        self.outcomes.len()
    }

    fn completed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| **o != Outcome::Pending)
            .count()
    }

    /// `Progress` as published on the activation surface: `0` until anything has started,
    /// `100` exactly when every expected completion has landed, monotonically non-decreasing
    /// in between (§8).
    pub fn progress_percent(&self) -> u8 {
        let expected = self.expected_completions();
        if expected == 0 {
            return 100;
        }
        let completed = self.completed_count();
        if completed >= expected {
            100
        } else {
            ((completed * 100) / expected).min(99) as u8
        }
    }

    /// Records the terminal result of one device or sidecar and recomputes the activation
    /// verdict once every expected completion has landed. The edge triggering activation itself
    /// (`RequestedActivation = Active`) is external; this only tracks what happens afterward.
    pub fn record_completion(&mut self, target: CompletionTarget, succeeded: bool) {
        let outcome = if succeeded {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        match self.outcomes.get_mut(&target) {
            Some(slot) => *slot = outcome,
            None => {
                warn!("Completion reported for unknown target {:?}", target);
                return;
            }
        }

        self.activation_state = ActivationState::Activating;

        if self.completed_count() == self.expected_completions() {
            let any_succeeded = self.outcomes.values().any(|o| *o == Outcome::Succeeded);
            self.activation_state = if any_succeeded {
                info!("Package activation verdict: Active");
                ActivationState::Active
            } else {
                warn!("Package activation verdict: Failed (no device or sidecar succeeded)");
                ActivationState::Failed
            };
        }
    }

    pub fn activation_state(&self) -> ActivationState {
        self.activation_state
    }
}

/// Owns the single in-flight package, if any. Starting a new one atomically replaces (and
/// thereby cancels) whatever was in flight, matching the "Global current activation" design
/// note and §3's "attempting to start another clears the previous".
#[derive(Default)]
pub struct UpdateManager {
    in_flight: Option<InFlightPackage>,
}

impl UpdateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs C1 (already-parsed) through C3 and stages the result as the in-flight package,
    /// tearing down whatever was previously in flight.
    pub fn stage(
        &mut self,
        manifest: FirmwareManifest,
        descriptor_map: &DescriptorMap,
        targets: Option<&HashSet<String>>,
        sidecar_updaters: &[String],
    ) {
        if self.in_flight.is_some() {
            info!("Replacing in-flight package with a newly staged one");
        }
        self.in_flight = Some(InFlightPackage::new(
            manifest,
            descriptor_map,
            targets,
            sidecar_updaters,
        ));
    }

    /// Clears the in-flight package; cancels every in-progress device/sidecar (the actual
    /// cancellation fan-out happens in the daemon event loop, which observes this transition).
    pub fn clear(&mut self) {
        self.in_flight = None;
    }

    pub fn in_flight(&self) -> Option<&InFlightPackage> {
        self.in_flight.as_ref()
    }

    pub fn in_flight_mut(&mut self) -> Option<&mut InFlightPackage> {
        self.in_flight.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pldm_fw_pkg::manifest::{Descriptor, DescriptorType, FirmwareDeviceIdRecord};

    fn descriptor() -> Descriptor {
        Descriptor {
            descriptor_type: DescriptorType::Uuid,
            descriptor_data: vec![1, 2, 3, 4],
        }
    }

    fn manifest_with_one_matching_device() -> (FirmwareManifest, DescriptorMap) {
        let mut manifest = FirmwareManifest::default();
        manifest.firmware_device_id_records.push(FirmwareDeviceIdRecord {
            initial_descriptor: descriptor(),
            applicable_components: Some(vec![0]),
            ..Default::default()
        });
        manifest
            .component_image_information
            .push(Default::default());

        let mut descriptor_map = DescriptorMap::new();
        descriptor_map.insert(EndpointId(5), vec![descriptor()]);
        (manifest, descriptor_map)
    }

    #[test]
    fn empty_match_set_is_ready_with_full_progress() {
        let manifest = FirmwareManifest::default();
        let descriptor_map = DescriptorMap::new();
        let mut mgr = UpdateManager::new();
        mgr.stage(manifest, &descriptor_map, None, &[]);
        let pkg = mgr.in_flight().unwrap();
        assert_eq!(pkg.activation_state(), ActivationState::Ready);
        assert_eq!(pkg.progress_percent(), 100);
    }

    #[test]
    fn progress_reaches_100_only_once_all_completions_land() {
        let (manifest, descriptor_map) = manifest_with_one_matching_device();
        let mut mgr = UpdateManager::new();
        mgr.stage(manifest, &descriptor_map, None, &["sidecar-a".to_string()]);

        let pkg = mgr.in_flight_mut().unwrap();
        assert_eq!(pkg.expected_completions(), 2);
        assert_eq!(pkg.progress_percent(), 0);

        pkg.record_completion(CompletionTarget::Device(EndpointId(5), 0), true);
        let after_first = pkg.progress_percent();
        assert!(after_first < 100);
        assert_eq!(pkg.activation_state(), ActivationState::Activating);

        pkg.record_completion(CompletionTarget::Sidecar("sidecar-a".to_string()), false);
        assert_eq!(pkg.progress_percent(), 100);
        // One of the two succeeded -> Active, even though the sidecar failed.
        assert_eq!(pkg.activation_state(), ActivationState::Active);
    }

    #[test]
    fn failed_verdict_when_nothing_succeeds() {
        let (manifest, descriptor_map) = manifest_with_one_matching_device();
        let mut mgr = UpdateManager::new();
        mgr.stage(manifest, &descriptor_map, None, &[]);
        let pkg = mgr.in_flight_mut().unwrap();
        pkg.record_completion(CompletionTarget::Device(EndpointId(5), 0), false);
        assert_eq!(pkg.activation_state(), ActivationState::Failed);
        assert_eq!(pkg.progress_percent(), 100);
    }

    #[test]
    fn staging_a_new_package_clears_the_previous() {
        let (manifest, descriptor_map) = manifest_with_one_matching_device();
        let mut mgr = UpdateManager::new();
        mgr.stage(manifest.clone(), &descriptor_map, None, &[]);
        mgr.in_flight_mut()
            .unwrap()
            .record_completion(CompletionTarget::Device(EndpointId(5), 0), true);

        mgr.stage(manifest, &descriptor_map, None, &[]);
        assert_eq!(mgr.in_flight().unwrap().progress_percent(), 0);
    }
}
