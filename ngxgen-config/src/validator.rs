//! Model validation
//!
//! Structural and semantic checks over a model. Validation reports; it never
//! rejects. Findings carry the dotted path of the offending field.

use ngxgen_core::config::*;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.field, self.message)
    }
}

const ONE_DAY: u64 = 86_400;
const ONE_GIB: u64 = 1024 * 1024 * 1024;

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.|\.)?([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)*([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?|\*)$")
        .expect("domain pattern is valid")
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").expect("IPv4 pattern is valid")
});

fn is_ipv4(name: &str) -> bool {
    IPV4.captures(name).is_some_and(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .all(|octet| octet.as_str().parse::<u8>().is_ok())
    })
}

fn is_valid_server_name(name: &str) -> bool {
    match name {
        "_" | "localhost" => true,
        // nginx regex server names
        name if name.starts_with('~') => name.len() > 1,
        name if name.starts_with('[') && name.ends_with(']') => name.len() > 2,
        name if name.bytes().all(|b| b.is_ascii_digit() || b == b'.') => is_ipv4(name),
        name => DOMAIN.is_match(name),
    }
}

struct Findings(Vec<ValidationWarning>);

impl Findings {
    fn push(&mut self, severity: Severity, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationWarning {
            field: field.into(),
            message: message.into(),
            severity,
        });
    }
}

/// Check a model and report every finding
pub fn validate(config: &NginxConfig) -> Vec<ValidationWarning> {
    let mut findings = Findings(Vec::new());

    check_server(config, &mut findings);
    check_tls(config, &mut findings);
    check_locations(config, &mut findings);
    check_upstream(config, &mut findings);
    check_security(config, &mut findings);
    check_performance(config, &mut findings);

    tracing::debug!(findings = findings.0.len(), "validated model");
    findings.0
}

fn check_server(config: &NginxConfig, findings: &mut Findings) {
    let server = &config.server;

    if server.server_names.is_empty() {
        findings.push(Severity::Warning, "server.server_names", "No server name set; nginx will use the default server");
    }

    let mut seen = HashSet::new();
    for (i, name) in server.server_names.iter().enumerate() {
        if !is_valid_server_name(name) {
            findings.push(
                Severity::Warning,
                format!("server.server_names[{}]", i),
                format!("'{}' is not a valid domain, IP address, '_' or 'localhost'", name),
            );
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            findings.push(
                Severity::Warning,
                format!("server.server_names[{}]", i),
                format!("Duplicate server name '{}'", name),
            );
        }
    }

    if server.listen_port == 0 {
        findings.push(Severity::Error, "server.listen_port", "Listen port must be between 1 and 65535");
    }
}

fn check_tls(config: &NginxConfig, findings: &mut Findings) {
    let tls = &config.tls;
    if !tls.enabled {
        return;
    }

    if !tls.cert_path.starts_with('/') {
        findings.push(Severity::Warning, "tls.cert_path", "Certificate path should be absolute");
    }
    if !tls.key_path.starts_with('/') {
        findings.push(Severity::Warning, "tls.key_path", "Private key path should be absolute");
    }
    if tls.hsts && tls.hsts_max_age < ONE_DAY {
        findings.push(
            Severity::Warning,
            "tls.hsts_max_age",
            format!("HSTS max-age of {}s is under one day", tls.hsts_max_age),
        );
    }
    if tls.preset != TlsPreset::Modern && tls.dh_param_path.is_none() {
        findings.push(
            Severity::Info,
            "tls.dh_param_path",
            format!(
                "The {} preset offers DHE suites; consider a {}-bit DH parameter file",
                tls.preset.as_str(),
                tls.preset.spec().min_dh_param_size
            ),
        );
    }
}

fn check_locations(config: &NginxConfig, findings: &mut Findings) {
    let mut seen = HashSet::new();

    for (i, location) in config.locations.iter().enumerate() {
        let field = |name: &str| format!("locations[{}].{}", i, name);

        if location.path.trim().is_empty() {
            findings.push(Severity::Error, field("path"), "Location path is empty");
        } else if !seen.insert((location.path.as_str(), location.match_kind)) {
            findings.push(
                Severity::Error,
                field("path"),
                format!("Duplicate location '{}'", location.path),
            );
        }

        match &location.body {
            LocationBody::Proxy(proxy) => {
                if proxy.backend.trim().is_empty() {
                    findings.push(Severity::Error, field("body.backend"), "Proxy location has no backend");
                }
                let has_root = location.extra_directives.as_deref().is_some_and(|extra| {
                    extra
                        .lines()
                        .any(|line| line.split_whitespace().next() == Some("root"))
                });
                if has_root {
                    findings.push(
                        Severity::Error,
                        field("extra_directives"),
                        "Proxy location must not also set a static root",
                    );
                }
            }
            LocationBody::Redirect(redirect) if redirect.target.trim().is_empty() => {
                findings.push(Severity::Error, field("body.target"), "Redirect location has no target");
            }
            _ => {}
        }
    }
}

fn check_upstream(config: &NginxConfig, findings: &mut Findings) {
    let Some(upstream) = &config.upstream else {
        return;
    };

    if upstream.servers.is_empty() {
        findings.push(Severity::Warning, "upstream.servers", "Upstream has no servers");
    }
    for (i, server) in upstream.servers.iter().enumerate() {
        if server.address.trim().is_empty() {
            findings.push(
                Severity::Error,
                format!("upstream.servers[{}].address", i),
                "Upstream server address is empty",
            );
        }
    }

    let referenced = config
        .locations
        .iter()
        .filter_map(LocationEntry::proxy)
        .any(|proxy| upstream.is_referenced_by(&proxy.backend));
    if !referenced {
        findings.push(
            Severity::Warning,
            "upstream.name",
            format!(
                "Upstream '{}' is not used by any proxy location (expected backend {})",
                upstream.name,
                upstream.proxy_address()
            ),
        );
    }
}

fn check_security(config: &NginxConfig, findings: &mut Findings) {
    let security = &config.security;

    if let Some(auth) = &security.basic_auth {
        if auth.credentials_file.trim().is_empty() {
            findings.push(
                Severity::Warning,
                "security.basic_auth.credentials_file",
                "Basic auth is enabled without a credentials file",
            );
        }
    }
    if let Some(rate_limit) = &security.rate_limit {
        if rate_limit.requests_per_second == 0 {
            findings.push(
                Severity::Error,
                "security.rate_limit.requests_per_second",
                "Rate limit must allow at least one request per second",
            );
        }
    }
}

fn check_performance(config: &NginxConfig, findings: &mut Findings) {
    let performance = &config.performance;

    if let Some(gzip) = &performance.gzip {
        if !(1..=9).contains(&gzip.level) {
            findings.push(
                Severity::Error,
                "performance.gzip.level",
                format!("Gzip level {} is outside 1-9", gzip.level),
            );
        }
    }
    if performance.client_max_body_size.bytes() > ONE_GIB {
        findings.push(
            Severity::Warning,
            "performance.client_max_body_size",
            format!("Body size {} exceeds 1G", performance.client_max_body_size),
        );
    }
    if performance.http2 && !config.tls.enabled {
        findings.push(Severity::Warning, "performance.http2", "HTTP/2 is only enabled together with TLS");
    }
    if performance.worker_connections == Some(0) {
        findings.push(
            Severity::Error,
            "performance.worker_connections",
            "worker_connections must be at least 1",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(config: &NginxConfig) -> Vec<ValidationWarning> {
        validate(config)
            .into_iter()
            .filter(|w| w.severity == Severity::Error)
            .collect()
    }

    #[test]
    fn test_default_model_is_clean() {
        assert!(validate(&NginxConfig::default()).is_empty());
    }

    #[test]
    fn test_zero_worker_connections() {
        let mut config = NginxConfig::default();
        config.performance.worker_connections = Some(0);
        let found = errors(&config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "performance.worker_connections");
    }

    #[test]
    fn test_server_names() {
        for name in ["example.com", "*.example.com", ".example.com", "_", "localhost", "10.0.0.1", "intranet"] {
            assert!(is_valid_server_name(name), "{}", name);
        }
        for name in ["exa mple.com", "-bad.com", "999.1.1.1", "a..b"] {
            assert!(!is_valid_server_name(name), "{}", name);
        }

        let config = NginxConfig {
            server: ServerSection {
                server_names: vec!["a.test".to_string(), "A.test".to_string(), "bad name".to_string()],
                ..ServerSection::default()
            },
            ..NginxConfig::default()
        };
        let findings = validate(&config);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|w| w.severity == Severity::Warning));
    }

    #[test]
    fn test_port_zero() {
        let config = NginxConfig {
            server: ServerSection {
                listen_port: 0,
                ..ServerSection::default()
            },
            ..NginxConfig::default()
        };
        assert_eq!(errors(&config)[0].field, "server.listen_port");
    }

    #[test]
    fn test_tls_checks() {
        let config = NginxConfig {
            tls: TlsSection {
                enabled: true,
                cert_path: "cert.pem".to_string(),
                hsts: true,
                hsts_max_age: 3600,
                ..TlsSection::default()
            },
            ..NginxConfig::default()
        };
        let fields: Vec<String> = validate(&config).into_iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["tls.cert_path", "tls.hsts_max_age", "tls.dh_param_path"]);
    }

    #[test]
    fn test_location_checks() {
        let proxy = LocationEntry::new("/api", LocationBody::Proxy(ProxyLocation::to("")))
            .with_extra_directives("root /srv;");
        let config = NginxConfig {
            locations: vec![
                proxy,
                LocationEntry::new("/api", LocationBody::Static(StaticLocation::default())),
                LocationEntry::new(
                    "",
                    LocationBody::Redirect(RedirectLocation {
                        target: String::new(),
                        code: RedirectCode::Found,
                    }),
                ),
            ],
            ..NginxConfig::default()
        };
        let fields: Vec<String> = errors(&config).into_iter().map(|w| w.field).collect();
        assert_eq!(
            fields,
            vec![
                "locations[0].body.backend",
                "locations[0].extra_directives",
                "locations[1].path",
                "locations[2].path",
                "locations[2].body.target",
            ]
        );
    }

    #[test]
    fn test_same_path_different_match_kind_is_allowed() {
        let config = NginxConfig {
            locations: vec![
                LocationEntry::new("/", LocationBody::Static(StaticLocation::default())),
                LocationEntry::new("/", LocationBody::Static(StaticLocation::default()))
                    .with_match_kind(MatchKind::Exact),
            ],
            ..NginxConfig::default()
        };
        assert!(errors(&config).is_empty());
    }

    #[test]
    fn test_upstream_checks() {
        let config = NginxConfig {
            upstream: Some(UpstreamSection {
                name: "pool".to_string(),
                servers: vec![UpstreamServer::new("")],
                ..UpstreamSection::default()
            }),
            ..NginxConfig::default()
        };
        let findings = validate(&config);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[1].field, "upstream.name");
    }

    #[test]
    fn test_performance_and_security_checks() {
        let config = NginxConfig {
            security: SecuritySection {
                rate_limit: Some(RateLimit {
                    requests_per_second: 0,
                    ..RateLimit::default()
                }),
                basic_auth: Some(BasicAuth {
                    credentials_file: String::new(),
                    ..BasicAuth::default()
                }),
                ..SecuritySection::default()
            },
            performance: PerformanceSection {
                gzip: Some(GzipSettings {
                    level: 12,
                    ..GzipSettings::default()
                }),
                client_max_body_size: "2G".parse().unwrap(),
                http2: true,
                ..PerformanceSection::default()
            },
            ..NginxConfig::default()
        };
        let findings = validate(&config);
        let errors: Vec<&str> = findings
            .iter()
            .filter(|w| w.severity == Severity::Error)
            .map(|w| w.field.as_str())
            .collect();
        assert_eq!(errors, vec!["security.rate_limit.requests_per_second", "performance.gzip.level"]);
        assert_eq!(findings.iter().filter(|w| w.severity == Severity::Warning).count(), 3);
    }

    #[test]
    fn test_presets_have_no_errors() {
        for preset in presets::all() {
            assert!(errors(&preset.config).is_empty(), "{}", preset.id);
        }
    }
}
