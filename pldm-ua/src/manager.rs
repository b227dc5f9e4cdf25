// Licensed under the Apache-2.0 license

//! Fleet orchestration (§2, §4.6): turns one staged package into one Device Updater per matched
//! PLDM endpoint plus one non-PLDM hand-off per sidecar updater, starts all of them together on
//! the `RequestedActivation = Active` edge, and folds every completion back into the
//! `UpdateManager` verdict the activation surface publishes.
//!
//! Building the `DescriptorMap` [`stage_package`] matches against is external (§6): some other
//! part of the platform already knows which endpoints are attached and what they advertised.

use crate::activation::ActivationSurface;
use crate::config::Config;
use crate::daemon::{self, PldmDaemon};
use crate::discovery_sm;
use crate::error::UpdateAgentError;
use crate::matcher::DescriptorMap;
use crate::sidecar;
use crate::transport::{EndpointId, PldmSocket, PldmTransport};
use crate::update_manager::{CompletionTarget, UpdateManager};
use crate::update_sm;
use log::{info, warn};
use pldm_fw_pkg::manifest::FirmwareDeviceIdRecord;
use pldm_fw_pkg::FirmwareManifest;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

type DeviceDaemon<S> = PldmDaemon<S, discovery_sm::DefaultActions, update_sm::DefaultActions>;

/// Partitions `manifest`'s records into PLDM matches and non-PLDM sidecar updaters, records the
/// result as the in-flight package, and republishes the activation surface for it. Matches
/// `activation.reset()`'s package-version/digest fields against `manifest`'s own header.
///
/// Returns [`UpdateAgentError::NoMatch`] when neither a PLDM endpoint nor a sidecar updater was
/// found for any record (§7); the package is still staged as `Ready` in that case, just with
/// nothing for `activate_staged` to do.
pub fn stage_package(
    manager: &mut UpdateManager,
    activation: &ActivationSurface,
    manifest: FirmwareManifest,
    descriptor_map: &DescriptorMap,
    targets: Option<&HashSet<String>>,
) -> Result<(), UpdateAgentError> {
    let sidecar_updaters: Vec<String> =
        sidecar::partition_sidecar_records(&manifest.firmware_device_id_records)
            .into_iter()
            .map(|(name, _)| name)
            .collect();

    activation.reset(
        manifest
            .package_header_information
            .package_version_string
            .clone()
            .unwrap_or_default(),
        None,
    );
    manager.stage(manifest, descriptor_map, targets, &sidecar_updaters);

    match manager.in_flight() {
        Some(pkg) if pkg.expected_completions() == 0 => {
            warn!("Package staged with no matching device or sidecar updater");
            Err(UpdateAgentError::NoMatch)
        }
        _ => Ok(()),
    }
}

/// Starts every matched Device Updater and non-PLDM hand-off for the package already staged in
/// `manager`, blocks until each reports a terminal outcome, and republishes the final
/// `Activation` verdict. Call this once `RequestedActivation = Active` has been written (§6) --
/// that write itself is [`ActivationSurface::request_activation`]; this function does the actual
/// fan-out, it does not wait for the edge.
///
/// `source` is this agent's own endpoint id, used to open one socket per matched device.
pub fn activate_staged<S, T>(
    manager: &mut UpdateManager,
    activation: &ActivationSurface,
    config: &Config,
    transport: &T,
    source: EndpointId,
) where
    S: PldmSocket + Send + 'static,
    T: PldmTransport<S>,
{
    let Some(pkg) = manager.in_flight() else {
        warn!("activate_staged called with no package currently staged");
        return;
    };
    let manifest = pkg.manifest.clone();
    let matches = pkg.matches.clone();

    let sidecar_records = sidecar::partition_sidecar_records(&manifest.firmware_device_id_records);
    let sidecar_updaters: Vec<String> =
        sidecar_records.iter().map(|(name, _)| name.clone()).collect();

    // Exactly one Device Updater runs per endpoint, however many records matched it: `update_sm`
    // itself picks the one record whose descriptors are a subset of the connected device's
    // `QueryDeviceIdentifiers` response, independent of which record this matcher pass used.
    let mut by_endpoint: HashMap<EndpointId, Vec<usize>> = HashMap::new();
    for m in &matches {
        by_endpoint.entry(m.endpoint).or_default().push(m.record_index);
    }

    let mut daemons = Vec::new();
    for (endpoint, record_indices) in &by_endpoint {
        let socket = match transport.create_socket(source, *endpoint) {
            Ok(s) => s,
            Err(e) => {
                warn!("Could not create a socket to {:?}: {:?}", endpoint, e);
                fail_all(manager, *endpoint, record_indices);
                continue;
            }
        };

        let opts = daemon::Options {
            discovery_sm_actions: discovery_sm::DefaultActions {},
            update_sm_actions: update_sm::DefaultActions {},
            pldm_fw_pkg: Some(manifest.clone()),
            fd_tid: endpoint.0,
            max_transfer_size: config.max_transfer_size,
            ua_t2: config.ua_t2,
            ua_t6: config.ua_t6,
        };
        match DeviceDaemon::run(socket, opts) {
            Ok(daemon) => daemons.push((*endpoint, record_indices.clone(), daemon)),
            Err(()) => {
                warn!("Failed to start Device Updater for {:?}", endpoint);
                fail_all(manager, *endpoint, record_indices);
            }
        }
    }

    let sidecar_handle = (!sidecar_records.is_empty()).then(|| {
        spawn_sidecar_handoff(
            sidecar_records,
            manifest.component_image_information.clone(),
            config.staging_dir.clone(),
            config.sidecar_per_image_timeout,
        )
    });

    let components_per_endpoint = by_endpoint.values().map(|v| v.len()).max().unwrap_or(1);
    let per_device_budget = (config.ua_t2 + config.ua_t6) * components_per_endpoint as u32;

    for (endpoint, record_indices, daemon) in &daemons {
        let succeeded = await_completion(daemon, per_device_budget, Duration::from_millis(50));
        for idx in record_indices {
            record(manager, CompletionTarget::Device(*endpoint, *idx), succeeded);
        }
    }

    if let Some(handle) = sidecar_handle {
        match handle.join() {
            Ok(results) => {
                for (name, ready) in results {
                    record(manager, CompletionTarget::Sidecar(name), ready);
                }
            }
            Err(_) => {
                warn!("Sidecar hand-off thread panicked; treating every updater as failed");
                for name in sidecar_updaters {
                    record(manager, CompletionTarget::Sidecar(name), false);
                }
            }
        }
    }

    let verdict = manager.in_flight().map(|pkg| pkg.activation_state());
    activation.set_activation(verdict.unwrap_or_default());
    info!("Package activation finished: {:?}", verdict);
}

fn fail_all(manager: &mut UpdateManager, endpoint: EndpointId, record_indices: &[usize]) {
    for idx in record_indices {
        record(manager, CompletionTarget::Device(endpoint, *idx), false);
    }
}

fn record(manager: &mut UpdateManager, target: CompletionTarget, succeeded: bool) {
    if let Some(pkg) = manager.in_flight_mut() {
        pkg.record_completion(target, succeeded);
    }
}

fn spawn_sidecar_handoff(
    sidecar_records: Vec<(String, &FirmwareDeviceIdRecord)>,
    components: Vec<pldm_fw_pkg::manifest::ComponentImageInformation>,
    staging_root: std::path::PathBuf,
    per_image_timeout: Duration,
) -> std::thread::JoinHandle<HashMap<String, bool>> {
    let owned: Vec<(String, FirmwareDeviceIdRecord)> = sidecar_records
        .into_iter()
        .map(|(name, record)| (name, record.clone()))
        .collect();
    std::thread::spawn(move || {
        let refs: Vec<(String, &FirmwareDeviceIdRecord)> = owned
            .iter()
            .map(|(name, record)| (name.clone(), record))
            .collect();
        sidecar::run_handoff(&refs, &components, &staging_root, per_image_timeout, |_name| {
            // A production binding polls whatever readiness signal the sidecar updater
            // publishes (a marker file, a socket write); this crate does not define that
            // contract beyond the hand-off shape itself (§4.7 Non-goals).
            true
        })
    })
}

/// Polls `daemon`'s update state machine until it returns to `Idle` having passed through
/// `Activate` (success), reaches `Done` (a forced stop, failure), or `deadline` elapses without
/// either. The per-component UA_T2/UA_T6 timers should force a terminal state well before the
/// deadline; it exists only as a backstop against a wedged device.
fn await_completion<S, D, U>(
    daemon: &PldmDaemon<S, D, U>,
    deadline: Duration,
    poll_interval: Duration,
) -> bool
where
    S: PldmSocket + Send + 'static,
    D: discovery_sm::StateMachineActions + Send + 'static,
    U: update_sm::StateMachineActions + Send + 'static,
{
    let start = Instant::now();
    let mut saw_activate = false;
    loop {
        match daemon.get_update_sm_state() {
            update_sm::States::Activate => saw_activate = true,
            update_sm::States::Idle if saw_activate => return true,
            update_sm::States::Done => return false,
            _ => {}
        }
        if start.elapsed() >= deadline {
            warn!("Device Updater did not reach a terminal state within its budget");
            return false;
        }
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{PldmTransportError, RxPacket};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};

    struct NullSocket {
        rx: Arc<Mutex<Receiver<RxPacket>>>,
        _tx: Sender<RxPacket>,
    }

    impl PldmSocket for NullSocket {
        fn send(&self, _payload: &[u8]) -> Result<(), PldmTransportError> {
            Ok(())
        }
        fn receive(&self, timeout: Option<Duration>) -> Result<RxPacket, PldmTransportError> {
            let rx = self.rx.lock().unwrap();
            match timeout {
                Some(d) => rx.recv_timeout(d).map_err(|_| PldmTransportError::Timeout),
                None => rx.recv().map_err(|_| PldmTransportError::Disconnected),
            }
        }
        fn connect(&self) -> Result<(), PldmTransportError> {
            Ok(())
        }
        fn disconnect(&self) {}
        fn clone(&self) -> Self {
            NullSocket {
                rx: self.rx.clone(),
                _tx: self._tx.clone(),
            }
        }
    }

    struct NullTransport;
    impl PldmTransport<NullSocket> for NullTransport {
        fn create_socket(
            &self,
            _source: EndpointId,
            _dest: EndpointId,
        ) -> Result<NullSocket, PldmTransportError> {
            let (tx, rx) = mpsc::channel();
            Ok(NullSocket {
                rx: Arc::new(Mutex::new(rx)),
                _tx: tx,
            })
        }
    }

    #[test]
    fn empty_descriptor_map_leaves_package_ready_without_spawning_anything() {
        let mut manager = UpdateManager::new();
        let activation = ActivationSurface::new();
        let config = Config::default();
        let transport = NullTransport;
        let manifest = FirmwareManifest::default();
        let descriptor_map = DescriptorMap::new();

        let err = stage_package(&mut manager, &activation, manifest, &descriptor_map, None)
            .unwrap_err();
        assert_eq!(err, crate::error::UpdateAgentError::NoMatch);
        activation.request_activation();
        activate_staged(&mut manager, &activation, &config, &transport, EndpointId(1));

        let pkg = manager.in_flight().unwrap();
        assert_eq!(pkg.expected_completions(), 0);
        assert_eq!(pkg.progress_percent(), 100);
    }

    #[test]
    fn sidecar_only_package_records_a_completion_without_any_daemon() {
        let mut manager = UpdateManager::new();
        let activation = ActivationSurface::new();
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            staging_dir: dir.path().to_path_buf(),
            sidecar_per_image_timeout: Duration::from_millis(10),
            ..Config::default()
        };
        let transport = NullTransport;

        let mut manifest = FirmwareManifest::default();
        manifest.firmware_device_id_records.push(FirmwareDeviceIdRecord {
            initial_descriptor: pldm_fw_pkg::manifest::Descriptor {
                descriptor_type: pldm_fw_pkg::manifest::DescriptorType::VendorDefined,
                descriptor_data: b"bios-updater".to_vec(),
            },
            applicable_components: Some(vec![]),
            ..Default::default()
        });

        stage_package(
            &mut manager,
            &activation,
            manifest,
            &DescriptorMap::new(),
            None,
        )
        .unwrap();
        activation.request_activation();
        activate_staged(&mut manager, &activation, &config, &transport, EndpointId(1));

        let pkg = manager.in_flight().unwrap();
        assert_eq!(pkg.expected_completions(), 1);
        assert_eq!(pkg.progress_percent(), 100);
        assert_eq!(
            pkg.activation_state(),
            crate::update_manager::ActivationState::Active
        );
        assert_eq!(activation.activation(), crate::update_manager::ActivationState::Active);
    }
}
