// Licensed under the Apache-2.0 license

//! Non-PLDM hand-off (§4.7).
//!
//! A firmware device id record can name a descriptor identifying a non-PLDM updater instead of
//! an MCTP endpoint. For those records this module extracts each applicable component image to
//! a staging directory published by that updater, skips the sentinel "dead" component, and waits
//! (bounded by `n_images * per_image_timeout`) for the updater to publish readiness.

use log::{error, info, warn};
use pldm_fw_pkg::manifest::{ComponentImageInformation, DescriptorType, FirmwareDeviceIdRecord};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Component identifier that never names a real image; components carrying it are skipped
/// during extraction rather than handed to the sidecar updater.
pub const DEAD_COMPONENT_IDENTIFIER: u16 = 0xFFFF;

/// A record names a non-PLDM updater, rather than an MCTP-reachable device, by carrying a
/// `VendorDefined` initial descriptor whose data is the updater's name as UTF-8 (§4.7). No
/// PLDM endpoint descriptor uses this type, so the Device-Record Matcher and this module
/// partition a package's records without overlap.
pub fn sidecar_updater_name(record: &FirmwareDeviceIdRecord) -> Option<String> {
    if record.initial_descriptor.descriptor_type != DescriptorType::VendorDefined {
        return None;
    }
    std::str::from_utf8(&record.initial_descriptor.descriptor_data)
        .ok()
        .map(|s| s.to_string())
}

/// Splits `records` into the `(updater_name, record)` pairs the non-PLDM hand-off owns.
/// PLDM-matchable records (anything without a `VendorDefined` initial descriptor) are excluded;
/// [`crate::matcher::match_device_records`] is the counterpart that owns those.
pub fn partition_sidecar_records(
    records: &[FirmwareDeviceIdRecord],
) -> Vec<(String, &FirmwareDeviceIdRecord)> {
    records
        .iter()
        .filter_map(|r| sidecar_updater_name(r).map(|name| (name, r)))
        .collect()
}

/// One non-PLDM updater's extracted component set, staged under its own directory.
pub struct SidecarExtraction {
    pub updater_name: String,
    pub staged_paths: Vec<PathBuf>,
}

/// Extracts every applicable, non-sentinel component of `record` into `staging_dir`, named
/// `img_<component_identifier>.bin`. Returns the paths written, in package order.
pub fn extract_components(
    record: &FirmwareDeviceIdRecord,
    components: &[ComponentImageInformation],
    staging_dir: &Path,
) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(staging_dir)?;
    let mut staged = Vec::new();

    let applicable = record.applicable_components.clone().unwrap_or_default();
    for idx in applicable {
        let component = match components.get(idx as usize) {
            Some(c) => c,
            None => {
                warn!("applicable_components index {} out of range, skipping", idx);
                continue;
            }
        };
        if component.identifier == DEAD_COMPONENT_IDENTIFIER {
            info!("Skipping sentinel dead-component {}", component.identifier);
            continue;
        }
        let image_data = component.image_data.as_deref().unwrap_or(&[]);
        let path = staging_dir.join(format!("img_{:04x}.bin", component.identifier));
        fs::write(&path, image_data)?;
        staged.push(path);
    }

    Ok(staged)
}

/// Polls `is_ready` at a short fixed interval until it returns true or the deadline
/// `n_images * per_image_timeout` elapses. `n_images == 0` is vacuously ready.
pub fn wait_for_readiness(
    n_images: usize,
    per_image_timeout: Duration,
    mut is_ready: impl FnMut() -> bool,
) -> bool {
    if n_images == 0 {
        return true;
    }
    let deadline = Instant::now() + per_image_timeout * n_images as u32;
    loop {
        if is_ready() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20).min(per_image_timeout));
    }
}

/// Drives the full hand-off for every record whose descriptor names one of `sidecar_updaters`:
/// extracts its components, then waits for that updater's readiness signal. Returns a
/// `{updater_name -> ready?}` map for the Update Manager to fold into the activation verdict.
pub fn run_handoff(
    records: &[(String, &FirmwareDeviceIdRecord)],
    components: &[ComponentImageInformation],
    staging_root: &Path,
    per_image_timeout: Duration,
    mut is_ready: impl FnMut(&str) -> bool,
) -> HashMap<String, bool> {
    let mut results = HashMap::new();
    for (updater_name, record) in records {
        let staging_dir = staging_root.join(updater_name);
        let staged = match extract_components(record, components, &staging_dir) {
            Ok(paths) => paths,
            Err(e) => {
                error!("Failed to stage components for {}: {}", updater_name, e);
                results.insert(updater_name.clone(), false);
                continue;
            }
        };
        let ready = wait_for_readiness(staged.len(), per_image_timeout, || is_ready(updater_name));
        if !ready {
            warn!("Sidecar updater {} did not become ready in time", updater_name);
        }
        results.insert(updater_name.clone(), ready);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn component(identifier: u16, data: &[u8]) -> ComponentImageInformation {
        ComponentImageInformation {
            identifier,
            image_data: Some(data.to_vec()),
            ..Default::default()
        }
    }

    #[test]
    fn extracts_applicable_components_and_skips_dead_sentinel() {
        let dir = tempdir().unwrap();
        let components = vec![
            component(0x10, b"real-image"),
            component(DEAD_COMPONENT_IDENTIFIER, b"should-not-be-written"),
        ];
        let record = FirmwareDeviceIdRecord {
            applicable_components: Some(vec![0, 1]),
            ..Default::default()
        };

        let staged = extract_components(&record, &components, dir.path()).unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(fs::read(&staged[0]).unwrap(), b"real-image");
    }

    #[test]
    fn wait_for_readiness_returns_immediately_with_no_images() {
        assert!(wait_for_readiness(0, Duration::from_secs(10), || false));
    }

    #[test]
    fn wait_for_readiness_observes_late_ready_flag() {
        let mut polls = 0;
        let ready = wait_for_readiness(2, Duration::from_millis(30), || {
            polls += 1;
            polls >= 3
        });
        assert!(ready);
    }

    #[test]
    fn wait_for_readiness_times_out() {
        let ready = wait_for_readiness(1, Duration::from_millis(10), || false);
        assert!(!ready);
    }

    #[test]
    fn vendor_defined_descriptor_names_the_sidecar_updater() {
        let record = FirmwareDeviceIdRecord {
            initial_descriptor: pldm_fw_pkg::manifest::Descriptor {
                descriptor_type: DescriptorType::VendorDefined,
                descriptor_data: b"bios-updater".to_vec(),
            },
            ..Default::default()
        };
        assert_eq!(sidecar_updater_name(&record), Some("bios-updater".to_string()));
    }

    #[test]
    fn non_vendor_defined_descriptor_is_not_a_sidecar_record() {
        let record = FirmwareDeviceIdRecord {
            initial_descriptor: pldm_fw_pkg::manifest::Descriptor {
                descriptor_type: DescriptorType::Uuid,
                descriptor_data: vec![1, 2, 3, 4],
            },
            ..Default::default()
        };
        assert_eq!(sidecar_updater_name(&record), None);
    }

    #[test]
    fn partition_sidecar_records_keeps_only_vendor_defined() {
        let sidecar = FirmwareDeviceIdRecord {
            initial_descriptor: pldm_fw_pkg::manifest::Descriptor {
                descriptor_type: DescriptorType::VendorDefined,
                descriptor_data: b"nic-updater".to_vec(),
            },
            ..Default::default()
        };
        let pldm_device = FirmwareDeviceIdRecord {
            initial_descriptor: pldm_fw_pkg::manifest::Descriptor {
                descriptor_type: DescriptorType::Uuid,
                descriptor_data: vec![5, 6, 7, 8],
            },
            ..Default::default()
        };
        let records = vec![sidecar, pldm_device];
        let partitioned = partition_sidecar_records(&records);
        assert_eq!(partitioned.len(), 1);
        assert_eq!(partitioned[0].0, "nic-updater");
    }

    #[test]
    fn run_handoff_reports_per_updater_readiness() {
        let dir = tempdir().unwrap();
        let components = vec![component(0x20, b"payload")];
        let record = FirmwareDeviceIdRecord {
            applicable_components: Some(vec![0]),
            ..Default::default()
        };
        let records = vec![("bios-updater".to_string(), &record)];

        let results = run_handoff(
            &records,
            &components,
            dir.path(),
            Duration::from_millis(5),
            |_name| true,
        );
        assert_eq!(results.get("bios-updater"), Some(&true));
    }
}
