//! TLS preset table
//!
//! Cipher suites and session policy per compatibility level, after the
//! Mozilla server-side TLS guidelines.

use super::types::{TlsPreset, TlsProtocol};

/// Fixed settings bundled by a [`TlsPreset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPresetSpec {
    /// Colon separated OpenSSL cipher list; empty for TLS 1.3 only
    pub ciphers: &'static str,
    pub protocols: &'static [TlsProtocol],
    pub prefer_server_ciphers: bool,
    /// Minimum DH parameter size in bits, 0 when no DHE suites are offered
    pub min_dh_param_size: u32,
    pub session_timeout: &'static str,
    pub session_cache: &'static str,
    pub session_tickets: bool,
}

impl TlsPresetSpec {
    pub fn dh_param_required(&self) -> bool {
        self.min_dh_param_size > 0
    }
}

const INTERMEDIATE_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384:DHE-RSA-CHACHA20-POLY1305";

const LEGACY_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384:DHE-RSA-CHACHA20-POLY1305:\
ECDHE-ECDSA-AES128-SHA256:ECDHE-RSA-AES128-SHA256:ECDHE-ECDSA-AES128-SHA:ECDHE-RSA-AES128-SHA:\
ECDHE-ECDSA-AES256-SHA384:ECDHE-RSA-AES256-SHA384:ECDHE-ECDSA-AES256-SHA:ECDHE-RSA-AES256-SHA:\
DHE-RSA-AES128-SHA256:DHE-RSA-AES256-SHA256:AES128-GCM-SHA256:AES256-GCM-SHA384:\
AES128-SHA256:AES256-SHA256:AES128-SHA:AES256-SHA:DES-CBC3-SHA";

const MODERN: TlsPresetSpec = TlsPresetSpec {
    // TLS 1.3 suites are not configurable through ssl_ciphers
    ciphers: "",
    protocols: &[TlsProtocol::TlsV1_3],
    prefer_server_ciphers: false,
    min_dh_param_size: 0,
    session_timeout: "1d",
    session_cache: "shared:SSL:10m",
    session_tickets: false,
};

const INTERMEDIATE: TlsPresetSpec = TlsPresetSpec {
    ciphers: INTERMEDIATE_CIPHERS,
    protocols: &[TlsProtocol::TlsV1_2, TlsProtocol::TlsV1_3],
    prefer_server_ciphers: false,
    min_dh_param_size: 2048,
    session_timeout: "1d",
    session_cache: "shared:SSL:10m",
    session_tickets: false,
};

const LEGACY: TlsPresetSpec = TlsPresetSpec {
    ciphers: LEGACY_CIPHERS,
    protocols: &[
        TlsProtocol::TlsV1,
        TlsProtocol::TlsV1_1,
        TlsProtocol::TlsV1_2,
        TlsProtocol::TlsV1_3,
    ],
    prefer_server_ciphers: true,
    min_dh_param_size: 1024,
    session_timeout: "1d",
    session_cache: "shared:SSL:10m",
    session_tickets: false,
};

impl TlsPreset {
    pub const ALL: [TlsPreset; 3] = [TlsPreset::Modern, TlsPreset::Intermediate, TlsPreset::Legacy];

    pub fn spec(&self) -> &'static TlsPresetSpec {
        match self {
            TlsPreset::Modern => &MODERN,
            TlsPreset::Intermediate => &INTERMEDIATE,
            TlsPreset::Legacy => &LEGACY,
        }
    }

    /// Find the preset whose cipher list is exactly `ciphers`
    pub fn from_ciphers(ciphers: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| !preset.spec().ciphers.is_empty() && preset.spec().ciphers == ciphers)
    }
}
