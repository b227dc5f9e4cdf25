// Licensed under the Apache-2.0 license

//! Environment knobs (§6): maximum transfer size, integrity/authentication requirements, the
//! staging directory for non-PLDM hand-offs, and the watchdog defaults. Read once when the
//! daemon/manager is constructed, following the same pattern as `daemon::Options<D, U>`: nothing
//! here is re-read mid-update.

use std::path::PathBuf;
use std::time::Duration;

/// Agent-wide configuration, defaulted the same way for every attached device unless a future
/// per-package override is introduced.
#[derive(Debug, Clone)]
pub struct Config {
    /// Largest `length` this agent will accept in a `RequestFirmwareData` reply (§4.5).
    pub max_transfer_size: u32,
    /// §4.2: an absent or failing integrity check fails the package.
    pub integrity_required: bool,
    /// §4.2: an absent or failing authentication check fails the package.
    pub authentication_required: bool,
    /// Overrides the public key carried in the package's own signature block, when set.
    pub verification_public_key: Option<Vec<u8>>,
    /// Root directory non-PLDM components are staged under, one subdirectory per updater (§4.7).
    pub staging_dir: PathBuf,
    /// How often the Update Manager's coarse progress indicator is expected to tick (§6).
    pub progress_tick_interval: Duration,
    /// Per-image bound on how long a sidecar updater has to publish readiness (§4.7).
    pub sidecar_per_image_timeout: Duration,
    /// UA_T2: maximum gap between consecutive `RequestFirmwareData` messages.
    pub ua_t2: Duration,
    /// UA_T6: maximum time from `TransferComplete`/`VerifyComplete` to the next completion.
    pub ua_t6: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_transfer_size: 512,
            integrity_required: false,
            authentication_required: false,
            verification_public_key: None,
            staging_dir: PathBuf::from("/var/lib/pldm-ua/staging"),
            progress_tick_interval: Duration::from_secs(1),
            sidecar_per_image_timeout: Duration::from_secs(30),
            ua_t2: crate::update_sm::UA_T2_DEFAULT,
            ua_t6: crate::update_sm::UA_T6_DEFAULT,
        }
    }
}

impl Config {
    /// Reads `PLDM_UA_*` environment variables over the defaults. A missing or unparsable
    /// variable falls back silently to its documented default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let parse_u32 = |key: &str, default: u32| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let parse_bool = |key: &str, default: bool| {
            std::env::var(key)
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let parse_secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            max_transfer_size: parse_u32("PLDM_UA_MAX_TRANSFER_SIZE", defaults.max_transfer_size),
            integrity_required: parse_bool(
                "PLDM_UA_INTEGRITY_REQUIRED",
                defaults.integrity_required,
            ),
            authentication_required: parse_bool(
                "PLDM_UA_AUTHENTICATION_REQUIRED",
                defaults.authentication_required,
            ),
            verification_public_key: std::env::var("PLDM_UA_VERIFICATION_PUBLIC_KEY_HEX")
                .ok()
                .and_then(|hex| decode_hex(&hex))
                .or(defaults.verification_public_key),
            staging_dir: std::env::var("PLDM_UA_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            progress_tick_interval: parse_secs(
                "PLDM_UA_PROGRESS_TICK_SECS",
                defaults.progress_tick_interval,
            ),
            sidecar_per_image_timeout: parse_secs(
                "PLDM_UA_SIDECAR_PER_IMAGE_TIMEOUT_SECS",
                defaults.sidecar_per_image_timeout,
            ),
            ua_t2: parse_secs("PLDM_UA_T2_SECS", defaults.ua_t2),
            ua_t6: parse_secs("PLDM_UA_T6_SECS", defaults.ua_t6),
        }
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.max_transfer_size, 512);
        assert!(!cfg.integrity_required);
        assert!(!cfg.authentication_required);
        assert_eq!(cfg.ua_t2, crate::update_sm::UA_T2_DEFAULT);
        assert_eq!(cfg.ua_t6, crate::update_sm::UA_T6_DEFAULT);
    }

    #[test]
    fn decode_hex_round_trips() {
        assert_eq!(decode_hex("deadbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(decode_hex("xyz"), None);
        assert_eq!(decode_hex("abc"), None);
    }
}
