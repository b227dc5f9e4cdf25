// Licensed under the Apache-2.0 license

//! Error taxonomy (§7): named dispositions for the handful of failure shapes the Update Manager
//! and its Device/Component Updaters can surface above their own best-effort recovery (retry,
//! status-probe-then-cancel). Everything below this line is local recovery handled inline in
//! `update_sm`/`manager`; these variants are what's left over once local recovery gives up.

use thiserror::Error;

/// A terminal disposition for one package, device, or component, per §7's error table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateAgentError {
    /// Parser or Signature Verifier rejected the package outright; no device is touched.
    #[error("package rejected: {0}")]
    PackageInvalid(String),

    /// The Device-Record Matcher found no endpoint or sidecar updater for any record; the
    /// package is left `Ready` with nothing to activate.
    #[error("no device or sidecar matched this package")]
    NoMatch,

    /// An outbound request's response never arrived within the transport's own timeout.
    #[error("transport timeout on endpoint {endpoint:?}")]
    TransportTimeout { endpoint: u8 },

    /// A response or device-initiated request failed to decode as the expected PLDM message.
    #[error("failed to decode a PLDM message from endpoint {endpoint:?}")]
    DecodeFailure { endpoint: u8 },

    /// The device returned a non-success completion code, or a non-identical compatibility
    /// response code, for a specific component.
    #[error("device rejected component {component_index} on endpoint {endpoint:?}")]
    DeviceRejected { endpoint: u8, component_index: usize },
}

impl UpdateAgentError {
    /// Whether this disposition ends only the affected component (the device updater continues
    /// with its next component) or the whole device/package (§7 propagation column).
    pub fn is_component_scoped(&self) -> bool {
        matches!(
            self,
            UpdateAgentError::DeviceRejected { .. } | UpdateAgentError::DecodeFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_rejected_and_decode_failure_are_component_scoped() {
        assert!(UpdateAgentError::DeviceRejected {
            endpoint: 1,
            component_index: 0
        }
        .is_component_scoped());
        assert!(UpdateAgentError::DecodeFailure { endpoint: 1 }.is_component_scoped());
    }

    #[test]
    fn package_invalid_and_no_match_are_not_component_scoped() {
        assert!(!UpdateAgentError::PackageInvalid("bad header".into()).is_component_scoped());
        assert!(!UpdateAgentError::NoMatch.is_component_scoped());
    }

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(UpdateAgentError::NoMatch.to_string(), "no device or sidecar matched this package");
    }
}
