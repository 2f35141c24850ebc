//! Partial updates to a [`NginxConfig`]
//!
//! A [`ConfigPatch`] mirrors the model with every field optional. Merging is
//! schema aware: object-valued fields merge field by field (an absent
//! optional object is started from its default), scalars and lists replace
//! wholesale. Optional model fields take a second `Option` layer: a missing
//! key leaves the field alone, an explicit `null` clears it. Patches reject
//! unknown keys so a malformed patch fails to load instead of being silently
//! ignored.

use super::types::*;
use serde::{Deserialize, Deserializer, Serialize};

/// Merge a partial value into a complete one
pub trait Merge<T> {
    fn merge_into(&self, target: &mut T);
}

/// Keeps `null` apart from a missing key
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn set_nullable<T: Clone>(slot: &mut Option<T>, value: &Option<Option<T>>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn merge_optional<T: Default, P: Merge<T>>(slot: &mut Option<T>, patch: &Option<Option<P>>) {
    match patch {
        None => {}
        Some(None) => *slot = None,
        Some(Some(patch)) => patch.merge_into(slot.get_or_insert_with(T::default)),
    }
}

/// Partial [`NginxConfig`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigPatch {
    pub server: Option<ServerPatch>,
    pub tls: Option<TlsPatch>,
    pub locations: Option<Vec<LocationEntry>>,
    pub security: Option<SecurityPatch>,
    pub performance: Option<PerformancePatch>,
    pub logging: Option<LoggingPatch>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Option<UpstreamPatch>>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl NginxConfig {
    /// A new model with `patch` deep-merged into this one
    pub fn merged(&self, patch: &ConfigPatch) -> NginxConfig {
        let mut next = self.clone();
        patch.merge_into(&mut next);
        next
    }
}

impl Merge<NginxConfig> for ConfigPatch {
    fn merge_into(&self, target: &mut NginxConfig) {
        if let Some(server) = &self.server {
            server.merge_into(&mut target.server);
        }
        if let Some(tls) = &self.tls {
            tls.merge_into(&mut target.tls);
        }
        set(&mut target.locations, &self.locations);
        if let Some(security) = &self.security {
            security.merge_into(&mut target.security);
        }
        if let Some(performance) = &self.performance {
            performance.merge_into(&mut target.performance);
        }
        if let Some(logging) = &self.logging {
            logging.merge_into(&mut target.logging);
        }
        merge_optional(&mut target.upstream, &self.upstream);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ServerPatch {
    pub server_names: Option<Vec<String>>,
    pub listen_port: Option<u16>,
    pub listen_ipv6: Option<bool>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub root: Option<Option<String>>,
    pub index: Option<Vec<String>>,
}

impl Merge<ServerSection> for ServerPatch {
    fn merge_into(&self, target: &mut ServerSection) {
        set(&mut target.server_names, &self.server_names);
        set(&mut target.listen_port, &self.listen_port);
        set(&mut target.listen_ipv6, &self.listen_ipv6);
        set_nullable(&mut target.root, &self.root);
        set(&mut target.index, &self.index);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TlsPatch {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub protocols: Option<Vec<TlsProtocol>>,
    pub preset: Option<TlsPreset>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub ciphers: Option<Option<String>>,
    pub http_redirect: Option<bool>,
    pub hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub ocsp_stapling: Option<bool>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub dh_param_path: Option<Option<String>>,
}

impl Merge<TlsSection> for TlsPatch {
    fn merge_into(&self, target: &mut TlsSection) {
        set(&mut target.enabled, &self.enabled);
        set(&mut target.cert_path, &self.cert_path);
        set(&mut target.key_path, &self.key_path);
        set(&mut target.protocols, &self.protocols);
        set(&mut target.preset, &self.preset);
        set_nullable(&mut target.ciphers, &self.ciphers);
        set(&mut target.http_redirect, &self.http_redirect);
        set(&mut target.hsts, &self.hsts);
        set(&mut target.hsts_max_age, &self.hsts_max_age);
        set(&mut target.ocsp_stapling, &self.ocsp_stapling);
        set_nullable(&mut target.dh_param_path, &self.dh_param_path);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityPatch {
    pub hide_server_tokens: Option<bool>,
    pub headers: Option<SecurityHeadersPatch>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<Option<RateLimitPatch>>,
    pub ip_allow: Option<Vec<String>>,
    pub ip_deny: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<Option<BasicAuthPatch>>,
}

impl Merge<SecuritySection> for SecurityPatch {
    fn merge_into(&self, target: &mut SecuritySection) {
        set(&mut target.hide_server_tokens, &self.hide_server_tokens);
        if let Some(headers) = &self.headers {
            headers.merge_into(&mut target.headers);
        }
        merge_optional(&mut target.rate_limit, &self.rate_limit);
        set(&mut target.ip_allow, &self.ip_allow);
        set(&mut target.ip_deny, &self.ip_deny);
        merge_optional(&mut target.basic_auth, &self.basic_auth);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityHeadersPatch {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub frame_options: Option<Option<FrameOptions>>,
    pub content_type_options: Option<bool>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub referrer_policy: Option<Option<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub content_security_policy: Option<Option<String>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub permissions_policy: Option<Option<String>>,
}

impl Merge<SecurityHeaders> for SecurityHeadersPatch {
    fn merge_into(&self, target: &mut SecurityHeaders) {
        set_nullable(&mut target.frame_options, &self.frame_options);
        set(&mut target.content_type_options, &self.content_type_options);
        set_nullable(&mut target.referrer_policy, &self.referrer_policy);
        set_nullable(&mut target.content_security_policy, &self.content_security_policy);
        set_nullable(&mut target.permissions_policy, &self.permissions_policy);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitPatch {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub zone: Option<Option<String>>,
    pub requests_per_second: Option<u32>,
    pub burst: Option<u32>,
    pub nodelay: Option<bool>,
    pub apply_to_server: Option<bool>,
}

impl Merge<RateLimit> for RateLimitPatch {
    fn merge_into(&self, target: &mut RateLimit) {
        set_nullable(&mut target.zone, &self.zone);
        set(&mut target.requests_per_second, &self.requests_per_second);
        set(&mut target.burst, &self.burst);
        set(&mut target.nodelay, &self.nodelay);
        set(&mut target.apply_to_server, &self.apply_to_server);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BasicAuthPatch {
    pub realm: Option<String>,
    pub credentials_file: Option<String>,
}

impl Merge<BasicAuth> for BasicAuthPatch {
    fn merge_into(&self, target: &mut BasicAuth) {
        set(&mut target.realm, &self.realm);
        set(&mut target.credentials_file, &self.credentials_file);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PerformancePatch {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub gzip: Option<Option<GzipPatch>>,
    pub brotli: Option<bool>,
    pub http2: Option<bool>,
    pub client_max_body_size: Option<BodySize>,
    pub keepalive_timeout: Option<u32>,
    pub sendfile: Option<bool>,
    pub tcp_nopush: Option<bool>,
    pub tcp_nodelay: Option<bool>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub worker_connections: Option<Option<u32>>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub static_caching: Option<Option<StaticCachingPatch>>,
}

impl Merge<PerformanceSection> for PerformancePatch {
    fn merge_into(&self, target: &mut PerformanceSection) {
        merge_optional(&mut target.gzip, &self.gzip);
        set(&mut target.brotli, &self.brotli);
        set(&mut target.http2, &self.http2);
        set(&mut target.client_max_body_size, &self.client_max_body_size);
        set(&mut target.keepalive_timeout, &self.keepalive_timeout);
        set(&mut target.sendfile, &self.sendfile);
        set(&mut target.tcp_nopush, &self.tcp_nopush);
        set(&mut target.tcp_nodelay, &self.tcp_nodelay);
        set_nullable(&mut target.worker_connections, &self.worker_connections);
        match &self.static_caching {
            None => {}
            Some(None) => target.static_caching = StaticCaching::none(),
            Some(Some(patch)) => patch.merge_into(&mut target.static_caching),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GzipPatch {
    pub enabled: Option<bool>,
    pub level: Option<u8>,
    pub min_length: Option<u32>,
    pub types: Option<Vec<String>>,
}

impl Merge<GzipSettings> for GzipPatch {
    fn merge_into(&self, target: &mut GzipSettings) {
        set(&mut target.enabled, &self.enabled);
        set(&mut target.level, &self.level);
        set(&mut target.min_length, &self.min_length);
        set(&mut target.types, &self.types);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct StaticCachingPatch {
    pub images: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub fonts: Option<String>,
}

impl Merge<StaticCaching> for StaticCachingPatch {
    fn merge_into(&self, target: &mut StaticCaching) {
        set(&mut target.images, &self.images);
        set(&mut target.css, &self.css);
        set(&mut target.js, &self.js);
        set(&mut target.fonts, &self.fonts);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingPatch {
    pub access_log: Option<AccessLogPatch>,
    pub error_log: Option<ErrorLogPatch>,
}

impl Merge<LoggingSection> for LoggingPatch {
    fn merge_into(&self, target: &mut LoggingSection) {
        if let Some(access) = &self.access_log {
            set(&mut target.access_log.enabled, &access.enabled);
            set(&mut target.access_log.path, &access.path);
            set_nullable(&mut target.access_log.format, &access.format);
        }
        if let Some(error) = &self.error_log {
            set(&mut target.error_log.enabled, &error.enabled);
            set(&mut target.error_log.path, &error.path);
            set(&mut target.error_log.level, &error.level);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogPatch {
    pub enabled: Option<bool>,
    pub path: Option<String>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub format: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorLogPatch {
    pub enabled: Option<bool>,
    pub path: Option<String>,
    pub level: Option<ErrorLogLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamPatch {
    pub name: Option<String>,
    pub servers: Option<Vec<UpstreamServer>>,
    pub method: Option<LoadBalancing>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<Option<u32>>,
}

impl Merge<UpstreamSection> for UpstreamPatch {
    fn merge_into(&self, target: &mut UpstreamSection) {
        set(&mut target.name, &self.name);
        set(&mut target.servers, &self.servers);
        set(&mut target.method, &self.method);
        set_nullable(&mut target.keepalive, &self.keepalive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_objects_merge_field_by_field() {
        let mut base = NginxConfig::default();
        base.security.headers.content_type_options = true;

        let patch = ConfigPatch {
            security: Some(SecurityPatch {
                headers: Some(SecurityHeadersPatch {
                    frame_options: Some(Some(FrameOptions::Deny)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let next = base.merged(&patch);
        assert_eq!(next.security.headers.frame_options, Some(FrameOptions::Deny));
        assert!(next.security.headers.content_type_options);
        assert_eq!(next.server, base.server);
    }

    #[test]
    fn test_absent_optional_object_starts_from_default() {
        let base = NginxConfig::default();
        assert!(base.performance.gzip.is_none());

        let patch = ConfigPatch {
            performance: Some(PerformancePatch {
                gzip: Some(Some(GzipPatch {
                    level: Some(4),
                    ..Default::default()
                })),
                ..Default::default()
            }),
            ..Default::default()
        };

        let gzip = base.merged(&patch).performance.gzip.unwrap();
        assert!(gzip.enabled);
        assert_eq!(gzip.level, 4);
        assert_eq!(gzip.types, GzipSettings::default().types);
    }

    #[test]
    fn test_lists_replace_wholesale() {
        let base = NginxConfig::default();
        let patch = ConfigPatch {
            server: Some(ServerPatch {
                index: Some(vec!["index.php".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(base.merged(&patch).server.index, vec!["index.php".to_string()]);
    }

    #[test]
    fn test_patch_from_json_rejects_unknown_keys() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"tls": {"hsts": true, "hsts_max_age": 31536000}}"#).unwrap();
        let next = NginxConfig::default().merged(&patch);
        assert!(next.tls.hsts);
        assert_eq!(next.tls.hsts_max_age, 31_536_000);
        assert!(!next.tls.enabled);

        assert!(serde_json::from_str::<ConfigPatch>(r#"{"tls": {"hstss": true}}"#).is_err());
    }

    #[test]
    fn test_merge_leaves_original_untouched() {
        let base = NginxConfig::default();
        let patch = ConfigPatch {
            server: Some(ServerPatch {
                listen_port: Some(8080),
                ..Default::default()
            }),
            ..Default::default()
        };
        let next = base.merged(&patch);
        assert_eq!(base.server.listen_port, 80);
        assert_eq!(next.server.listen_port, 8080);
        assert!(ConfigPatch::default().is_empty());
        assert!(!patch.is_empty());
    }
    #[test]
    fn test_null_clears_optional_fields() {
        let mut base = crate::config::presets::load_balanced();
        base.server.root = Some("/srv".to_string());
        base.tls.ciphers = Some("HIGH:!aNULL".to_string());
        base.tls.dh_param_path = Some("/etc/ssl/dh.pem".to_string());
        base.security.basic_auth = Some(BasicAuth::default());
        base.security.headers.referrer_policy = Some("no-referrer".to_string());
        assert!(base.security.rate_limit.is_some());
        assert!(base.performance.gzip.is_some());
        assert_eq!(base.performance.worker_connections, Some(1024));

        let patch: ConfigPatch = serde_json::from_str(
            r#"{
                "server": {"root": null},
                "tls": {"ciphers": null, "dh_param_path": null},
                "security": {
                    "rate_limit": null,
                    "basic_auth": null,
                    "headers": {"frame_options": null, "referrer_policy": null}
                },
                "performance": {"gzip": null, "static_caching": null, "worker_connections": null},
                "upstream": null
            }"#,
        )
        .unwrap();
        let next = base.merged(&patch);

        assert_eq!(next.server.root, None);
        assert_eq!(next.tls.ciphers, None);
        assert_eq!(next.tls.dh_param_path, None);
        assert_eq!(next.security.rate_limit, None);
        assert_eq!(next.security.basic_auth, None);
        assert_eq!(next.security.headers.frame_options, None);
        assert_eq!(next.security.headers.referrer_policy, None);
        assert!(next.security.headers.content_type_options);
        assert_eq!(next.performance.gzip, None);
        assert!(next.performance.static_caching.is_empty());
        assert_eq!(next.performance.worker_connections, None);
        assert_eq!(next.upstream, None);
        assert_eq!(next.server.server_names, base.server.server_names);
    }

    #[test]
    fn test_missing_key_keeps_and_null_clears_nested_values() {
        let mut base = NginxConfig::default();
        base.security.rate_limit = Some(RateLimit {
            zone: Some("$binary_remote_addr zone=api:20m rate=5r/s".to_string()),
            ..RateLimit::default()
        });
        base.logging.access_log.format = Some("combined".to_string());

        let keep: ConfigPatch = serde_json::from_str(r#"{"security": {"rate_limit": {"burst": 5}}}"#).unwrap();
        let kept = base.merged(&keep);
        let rate_limit = kept.security.rate_limit.as_ref().unwrap();
        assert_eq!(rate_limit.burst, 5);
        assert!(rate_limit.zone.is_some());

        let clear: ConfigPatch = serde_json::from_str(
            r#"{"security": {"rate_limit": {"zone": null}}, "logging": {"access_log": {"format": null}}}"#,
        )
        .unwrap();
        let cleared = base.merged(&clear);
        assert_eq!(cleared.security.rate_limit.as_ref().unwrap().zone, None);
        assert_eq!(cleared.logging.access_log.format, None);
    }

    #[test]
    fn test_cleared_fields_serialize_as_null() {
        let patch = ConfigPatch {
            upstream: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.ends_with(r#""upstream":null}"#), "{json}");
        assert!(!serde_json::to_string(&ConfigPatch::default()).unwrap().contains("upstream"));
        assert_eq!(serde_json::from_str::<ConfigPatch>(&json).unwrap(), patch);
    }
}
