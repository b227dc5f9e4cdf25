// Licensed under the Apache-2.0 license

//! Device-Record Matcher.
//!
//! Decides, for every firmware device id record carried by a package, which discovered
//! endpoints it applies to, and narrows `applicable_components` to an optional set of
//! user-requested component names.

use crate::transport::EndpointId;
use log::debug;
use pldm_fw_pkg::manifest::{ComponentImageInformation, Descriptor, FirmwareDeviceIdRecord};
use std::collections::{HashMap, HashSet};

/// What discovery (external to this crate) knows about each attached endpoint: the full set of
/// descriptors it advertised during `QueryDeviceIdentifiers`.
pub type DescriptorMap = HashMap<EndpointId, Vec<Descriptor>>;

/// One firmware device id record matched against one discovered endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecordMatch {
    pub endpoint: EndpointId,
    pub record_index: usize,
    /// Indices into the package's component-image table, after target filtering.
    pub applicable_components: Vec<u8>,
}

fn record_descriptors(record: &FirmwareDeviceIdRecord) -> Vec<&Descriptor> {
    let mut descriptors = vec![&record.initial_descriptor];
    if let Some(additional) = &record.additional_descriptors {
        descriptors.extend(additional.iter());
    }
    descriptors
}

/// True iff every descriptor in `record` also appears in `endpoint_descriptors`
/// (`record.descriptors ⊆ descriptors`, §4.3).
fn record_subset_of_endpoint(record: &FirmwareDeviceIdRecord, endpoint_descriptors: &[Descriptor]) -> bool {
    record_descriptors(record)
        .into_iter()
        .all(|d| endpoint_descriptors.iter().any(|e| e == d))
}

/// Narrows a record's applicable-component indices to those whose package version string
/// appears in `targets`, when a target filter is present. Returns the unfiltered list verbatim
/// when `targets` is `None`.
fn filter_applicable_components(
    record: &FirmwareDeviceIdRecord,
    components: &[ComponentImageInformation],
    targets: Option<&HashSet<String>>,
) -> Vec<u8> {
    let base = record.applicable_components.clone().unwrap_or_default();
    match targets {
        None => base,
        Some(targets) => base
            .into_iter()
            .filter(|&idx| {
                components
                    .get(idx as usize)
                    .and_then(|c| c.version_string.as_ref())
                    .is_some_and(|name| targets.contains(name))
            })
            .collect(),
    }
}

/// Matches every device id record in `records` against every endpoint in `descriptor_map`,
/// producing one `(endpoint, record_index, applicable_components)` entry per hit. A record that
/// matches an endpoint but whose target-filtered `applicable_components` is empty is dropped
/// (§4.3 step 2).
pub fn match_device_records(
    records: &[FirmwareDeviceIdRecord],
    components: &[ComponentImageInformation],
    descriptor_map: &DescriptorMap,
    targets: Option<&HashSet<String>>,
) -> Vec<DeviceRecordMatch> {
    let mut matches = Vec::new();
    for (record_index, record) in records.iter().enumerate() {
        if crate::sidecar::sidecar_updater_name(record).is_some() {
            // Owned by the non-PLDM hand-off instead (§4.7).
            continue;
        }
        for (endpoint, endpoint_descriptors) in descriptor_map {
            if !record_subset_of_endpoint(record, endpoint_descriptors) {
                continue;
            }
            let applicable_components = filter_applicable_components(record, components, targets);
            if targets.is_some() && applicable_components.is_empty() {
                debug!(
                    "record {} matches endpoint {:?} but no component survives the target filter",
                    record_index, endpoint
                );
                continue;
            }
            debug!(
                "record {} matches endpoint {:?}, {} applicable component(s)",
                record_index,
                endpoint,
                applicable_components.len()
            );
            matches.push(DeviceRecordMatch {
                endpoint: *endpoint,
                record_index,
                applicable_components,
            });
        }
    }
    matches
}

/// Total number of component updates the package is expected to drive, PLDM matches plus the
/// non-PLDM sidecar count (§4.3 step 3).
pub fn total_pending_updates(matches: &[DeviceRecordMatch], sidecar_count: usize) -> usize {
    matches
        .iter()
        .map(|m| m.applicable_components.len())
        .sum::<usize>()
        + sidecar_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use pldm_fw_pkg::manifest::DescriptorType;

    fn descriptor(data: u8) -> Descriptor {
        Descriptor {
            descriptor_type: DescriptorType::Uuid,
            descriptor_data: vec![data],
        }
    }

    fn record(initial: u8, applicable: Vec<u8>) -> FirmwareDeviceIdRecord {
        FirmwareDeviceIdRecord {
            initial_descriptor: descriptor(initial),
            applicable_components: Some(applicable),
            ..Default::default()
        }
    }

    fn component(version: &str) -> ComponentImageInformation {
        ComponentImageInformation {
            version_string: Some(version.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn matches_endpoint_with_superset_descriptors() {
        let records = vec![record(1, vec![0])];
        let mut descriptor_map = DescriptorMap::new();
        descriptor_map.insert(EndpointId(9), vec![descriptor(1), descriptor(2)]);

        let matches = match_device_records(&records, &[component("v1")], &descriptor_map, None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].endpoint, EndpointId(9));
        assert_eq!(matches[0].applicable_components, vec![0]);
    }

    #[test]
    fn no_match_when_descriptor_missing() {
        let records = vec![record(1, vec![0])];
        let mut descriptor_map = DescriptorMap::new();
        descriptor_map.insert(EndpointId(9), vec![descriptor(2)]);

        let matches = match_device_records(&records, &[component("v1")], &descriptor_map, None);
        assert!(matches.is_empty());
    }

    #[test]
    fn target_filter_drops_record_when_no_component_survives() {
        let records = vec![record(1, vec![0, 1])];
        let components = vec![component("bios-1.0"), component("bmc-2.0")];
        let mut descriptor_map = DescriptorMap::new();
        descriptor_map.insert(EndpointId(9), vec![descriptor(1)]);

        let mut targets = HashSet::new();
        targets.insert("bios-1.0".to_string());
        let matches = match_device_records(&records, &components, &descriptor_map, Some(&targets));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].applicable_components, vec![0]);

        let mut unmatched_targets = HashSet::new();
        unmatched_targets.insert("nic-3.0".to_string());
        let matches =
            match_device_records(&records, &components, &descriptor_map, Some(&unmatched_targets));
        assert!(matches.is_empty());
    }

    #[test]
    fn sidecar_record_never_matches_a_live_endpoint() {
        let sidecar_record = FirmwareDeviceIdRecord {
            initial_descriptor: Descriptor {
                descriptor_type: DescriptorType::VendorDefined,
                descriptor_data: b"bios-updater".to_vec(),
            },
            applicable_components: Some(vec![0]),
            ..Default::default()
        };
        let records = vec![sidecar_record];
        // Even an endpoint that happens to advertise the exact same descriptor must not match;
        // VendorDefined records are reserved for the non-PLDM hand-off.
        let mut descriptor_map = DescriptorMap::new();
        descriptor_map.insert(
            EndpointId(9),
            vec![Descriptor {
                descriptor_type: DescriptorType::VendorDefined,
                descriptor_data: b"bios-updater".to_vec(),
            }],
        );

        let matches = match_device_records(&records, &[component("v1")], &descriptor_map, None);
        assert!(matches.is_empty());
    }

    #[test]
    fn total_pending_sums_components_and_sidecars() {
        let matches = vec![
            DeviceRecordMatch {
                endpoint: EndpointId(1),
                record_index: 0,
                applicable_components: vec![0, 1],
            },
            DeviceRecordMatch {
                endpoint: EndpointId(2),
                record_index: 1,
                applicable_components: vec![0],
            },
        ];
        assert_eq!(total_pending_updates(&matches, 2), 5);
    }
}
