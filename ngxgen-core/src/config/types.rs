//! Configuration type definitions
//!
//! These types are the canonical model of a single nginx site: one main
//! server block, its locations, and at most one upstream pool. Every section
//! is always present so that any value can be handed straight to the
//! generator.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Root model for one generated nginx site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NginxConfig {
    /// Main server block settings
    pub server: ServerSection,

    /// TLS termination
    pub tls: TlsSection,

    /// Location blocks in generation (and match-specificity) order
    pub locations: Vec<LocationEntry>,

    /// Security headers, access control and rate limiting
    pub security: SecuritySection,

    /// Compression, HTTP/2, body limits and static caching
    pub performance: PerformanceSection,

    /// Access and error logs
    pub logging: LoggingSection,

    /// Optional upstream pool referenced by proxy locations
    pub upstream: Option<UpstreamSection>,
}

// ============================================================
// Server
// ============================================================

/// Server (virtual host) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Server names: domains, `_`, `localhost` or literal IPs
    pub server_names: Vec<String>,

    /// Listen port
    pub listen_port: u16,

    /// Also listen on `[::]`
    pub listen_ipv6: bool,

    /// Document root
    pub root: Option<String>,

    /// Index file names, in order
    pub index: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            server_names: vec!["example.com".to_string()],
            listen_port: 80,
            listen_ipv6: true,
            root: Some("/var/www/html".to_string()),
            index: vec!["index.html".to_string(), "index.htm".to_string()],
        }
    }
}

// ============================================================
// TLS
// ============================================================

/// TLS settings. Disabled unless `enabled` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSection {
    /// Terminate TLS on the main server block
    pub enabled: bool,

    /// Certificate (chain) path
    pub cert_path: String,

    /// Private key path
    pub key_path: String,

    /// Allowed protocol versions
    pub protocols: Vec<TlsProtocol>,

    /// Cipher/session policy bundle
    pub preset: TlsPreset,

    /// Explicit cipher list overriding the preset's list
    pub ciphers: Option<String>,

    /// Emit a plain HTTP server that redirects to HTTPS
    pub http_redirect: bool,

    /// Send Strict-Transport-Security
    pub hsts: bool,

    /// HSTS max-age in seconds
    pub hsts_max_age: u64,

    /// Enable OCSP stapling
    pub ocsp_stapling: bool,

    /// Diffie-Hellman parameter file
    pub dh_param_path: Option<String>,
}

impl Default for TlsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: "/etc/ssl/certs/fullchain.pem".to_string(),
            key_path: "/etc/ssl/private/privkey.pem".to_string(),
            protocols: vec![TlsProtocol::TlsV1_2, TlsProtocol::TlsV1_3],
            preset: TlsPreset::Intermediate,
            ciphers: None,
            http_redirect: false,
            hsts: false,
            hsts_max_age: 63_072_000,
            ocsp_stapling: false,
            dh_param_path: None,
        }
    }
}

/// TLS protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TlsProtocol {
    #[serde(rename = "TLSv1")]
    TlsV1,
    #[serde(rename = "TLSv1.1")]
    TlsV1_1,
    #[serde(rename = "TLSv1.2")]
    TlsV1_2,
    #[serde(rename = "TLSv1.3")]
    TlsV1_3,
}

impl TlsProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsProtocol::TlsV1 => "TLSv1",
            TlsProtocol::TlsV1_1 => "TLSv1.1",
            TlsProtocol::TlsV1_2 => "TLSv1.2",
            TlsProtocol::TlsV1_3 => "TLSv1.3",
        }
    }

    /// TLS 1.0 and 1.1 are deprecated (RFC 8996)
    pub fn is_deprecated(&self) -> bool {
        matches!(self, TlsProtocol::TlsV1 | TlsProtocol::TlsV1_1)
    }
}

impl FromStr for TlsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TLSv1" => Ok(TlsProtocol::TlsV1),
            "TLSv1.1" => Ok(TlsProtocol::TlsV1_1),
            "TLSv1.2" => Ok(TlsProtocol::TlsV1_2),
            "TLSv1.3" => Ok(TlsProtocol::TlsV1_3),
            other => Err(format!("unknown TLS protocol '{}'", other)),
        }
    }
}

/// Named TLS compatibility preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsPreset {
    Modern,
    #[default]
    Intermediate,
    Legacy,
}

impl TlsPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsPreset::Modern => "modern",
            TlsPreset::Intermediate => "intermediate",
            TlsPreset::Legacy => "legacy",
        }
    }
}

// ============================================================
// Locations
// ============================================================

/// A `location` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    /// Path or pattern
    pub path: String,

    /// How `path` is matched
    #[serde(default)]
    pub match_kind: MatchKind,

    /// What the location does
    pub body: LocationBody,

    /// Directives not represented by `body`, emitted verbatim after it
    #[serde(default)]
    pub extra_directives: Option<String>,
}

impl LocationEntry {
    pub fn new(path: impl Into<String>, body: LocationBody) -> Self {
        Self {
            path: path.into(),
            match_kind: MatchKind::Prefix,
            body,
            extra_directives: None,
        }
    }

    pub fn with_match_kind(mut self, match_kind: MatchKind) -> Self {
        self.match_kind = match_kind;
        self
    }

    pub fn with_extra_directives(mut self, directives: impl Into<String>) -> Self {
        self.extra_directives = Some(directives.into());
        self
    }

    pub fn proxy(&self) -> Option<&ProxyLocation> {
        match &self.body {
            LocationBody::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }
}

/// Location match modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Prefix,
    Exact,
    Regex,
    RegexCaseInsensitive,
}

impl MatchKind {
    /// The qualifier written between `location` and the path, if any
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            MatchKind::Prefix => None,
            MatchKind::Exact => Some("="),
            MatchKind::Regex => Some("~"),
            MatchKind::RegexCaseInsensitive => Some("~*"),
        }
    }

    pub fn from_qualifier(s: &str) -> Option<Self> {
        match s {
            "=" => Some(MatchKind::Exact),
            "~" => Some(MatchKind::Regex),
            "~*" => Some(MatchKind::RegexCaseInsensitive),
            _ => None,
        }
    }
}

/// Location body, discriminated by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationBody {
    /// Serve files from disk
    Static(StaticLocation),

    /// Reverse proxy to a backend or upstream
    Proxy(ProxyLocation),

    /// Redirect to another URL
    Redirect(RedirectLocation),

    /// Raw directives, emitted verbatim
    Custom(CustomLocation),
}

impl LocationBody {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LocationBody::Static(_) => "static",
            LocationBody::Proxy(_) => "proxy",
            LocationBody::Redirect(_) => "redirect",
            LocationBody::Custom(_) => "custom",
        }
    }
}

/// Static file serving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StaticLocation {
    /// Root directory (empty inherits the server root)
    pub root: String,

    /// `try_files` fallback chain, e.g. `$uri $uri/ =404`
    pub try_files: Option<String>,

    /// Directory index file name
    pub index: Option<String>,

    /// Directory listings
    pub autoindex: bool,

    /// Cache expiry, e.g. `30d`
    pub expires: Option<String>,
}

/// Reverse proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyLocation {
    /// Backend URL or `http://<upstream name>`
    pub backend: String,

    /// Forward WebSocket upgrades
    pub websocket: bool,

    /// Send X-Real-IP / X-Forwarded-For / X-Forwarded-Proto
    pub pass_real_ip: bool,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,

    /// Seconds
    pub connect_timeout: Option<u32>,

    /// Seconds
    pub read_timeout: Option<u32>,

    /// Seconds
    pub send_timeout: Option<u32>,

    /// Response buffering
    pub buffering: Option<bool>,
}

impl Default for ProxyLocation {
    fn default() -> Self {
        Self {
            backend: String::new(),
            websocket: false,
            pass_real_ip: true,
            headers: BTreeMap::new(),
            connect_timeout: None,
            read_timeout: None,
            send_timeout: None,
            buffering: None,
        }
    }
}

impl ProxyLocation {
    pub fn to(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }
}

/// Redirect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectLocation {
    pub target: String,
    #[serde(default)]
    pub code: RedirectCode,
}

/// Redirect status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectCode {
    #[default]
    MovedPermanently,
    Found,
}

impl RedirectCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            RedirectCode::MovedPermanently => 301,
            RedirectCode::Found => 302,
        }
    }
}

impl TryFrom<u16> for RedirectCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectCode::MovedPermanently),
            302 => Ok(RedirectCode::Found),
            other => Err(format!("unsupported redirect code {} (expected 301 or 302)", other)),
        }
    }
}

impl From<RedirectCode> for u16 {
    fn from(code: RedirectCode) -> Self {
        code.as_u16()
    }
}

/// Raw directive text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CustomLocation {
    pub directives: String,
}

// ============================================================
// Security
// ============================================================

/// Security configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecuritySection {
    /// `server_tokens off`
    pub hide_server_tokens: bool,

    /// Response security headers
    pub headers: SecurityHeaders,

    /// Request rate limiting
    pub rate_limit: Option<RateLimit>,

    /// Addresses/CIDRs allowed (everything else denied)
    pub ip_allow: Vec<String>,

    /// Addresses/CIDRs denied
    pub ip_deny: Vec<String>,

    /// HTTP basic authentication
    pub basic_auth: Option<BasicAuth>,
}

/// Response security headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityHeaders {
    pub frame_options: Option<FrameOptions>,
    pub content_type_options: bool,
    pub referrer_policy: Option<String>,
    pub content_security_policy: Option<String>,
    pub permissions_policy: Option<String>,
}

impl SecurityHeaders {
    /// True when no header would be emitted
    pub fn is_empty(&self) -> bool {
        self.frame_options.is_none()
            && !self.content_type_options
            && self.referrer_policy.is_none()
            && self.content_security_policy.is_none()
            && self.permissions_policy.is_none()
    }
}

/// X-Frame-Options value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOptions {
    Deny,
    SameOrigin,
}

impl FrameOptions {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameOptions::Deny => "DENY",
            FrameOptions::SameOrigin => "SAMEORIGIN",
        }
    }
}

/// Rate limiting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    /// Full `limit_req_zone` descriptor; generated when absent
    pub zone: Option<String>,

    /// Requests per second
    pub requests_per_second: u32,

    /// Burst size
    pub burst: u32,

    /// Serve bursts without delay
    pub nodelay: bool,

    /// Emit `limit_req` for the whole server. Off when the zone is only
    /// applied by directives inside locations
    pub apply_to_server: bool,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            zone: None,
            requests_per_second: 10,
            burst: 20,
            nodelay: true,
            apply_to_server: true,
        }
    }
}

/// Zone name used when no descriptor names one
pub const DEFAULT_RATE_LIMIT_ZONE: &str = "req_limit";

impl RateLimit {
    /// The `limit_req_zone` arguments
    pub fn zone_descriptor(&self) -> String {
        match &self.zone {
            Some(zone) if !zone.trim().is_empty() => zone.trim().to_string(),
            _ => format!(
                "$binary_remote_addr zone={}:10m rate={}r/s",
                DEFAULT_RATE_LIMIT_ZONE, self.requests_per_second
            ),
        }
    }

    /// Zone name referenced by `limit_req`
    pub fn zone_name(&self) -> String {
        self.zone_descriptor()
            .split_whitespace()
            .find_map(|arg| arg.strip_prefix("zone="))
            .and_then(|zone| zone.split(':').next())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_RATE_LIMIT_ZONE)
            .to_string()
    }
}

/// HTTP basic auth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    pub realm: String,
    pub credentials_file: String,
}

impl Default for BasicAuth {
    fn default() -> Self {
        Self {
            realm: "Restricted".to_string(),
            credentials_file: "/etc/nginx/.htpasswd".to_string(),
        }
    }
}

// ============================================================
// Performance
// ============================================================

/// Performance tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSection {
    /// Gzip compression
    pub gzip: Option<GzipSettings>,

    /// Brotli compression (requires the ngx_brotli module)
    pub brotli: bool,

    /// HTTP/2 on the TLS listener
    pub http2: bool,

    /// Maximum request body size
    pub client_max_body_size: BodySize,

    /// Keep-alive timeout in seconds
    pub keepalive_timeout: u32,

    pub sendfile: bool,
    pub tcp_nopush: bool,
    pub tcp_nodelay: bool,

    /// `worker_connections` from the `events` context. Imported but never
    /// generated: the site text is included from `http`, where `events` is not allowed
    pub worker_connections: Option<u32>,

    /// Per-class cache expiry for static assets; an empty table disables caching
    #[serde(deserialize_with = "caching_or_none")]
    pub static_caching: StaticCaching,
}

/// `null` reads as the empty table
fn caching_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StaticCaching, D::Error> {
    Ok(Option::<StaticCaching>::deserialize(deserializer)?.unwrap_or_else(StaticCaching::none))
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            gzip: None,
            brotli: false,
            http2: false,
            client_max_body_size: BodySize::default(),
            keepalive_timeout: 65,
            sendfile: true,
            tcp_nopush: true,
            tcp_nodelay: true,
            worker_connections: None,
            static_caching: StaticCaching::none(),
        }
    }
}

/// Gzip compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GzipSettings {
    pub enabled: bool,

    /// 1–9
    pub level: u8,

    /// Minimum response length in bytes
    pub min_length: u32,

    /// MIME types to compress (text/html is always compressed)
    pub types: Vec<String>,
}

impl Default for GzipSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 6,
            min_length: 256,
            types: [
                "text/plain",
                "text/css",
                "application/json",
                "application/javascript",
                "text/xml",
                "application/xml",
                "application/xml+rss",
                "text/javascript",
                "image/svg+xml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Cache expiry per static asset class; an empty value disables that class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCaching {
    pub images: String,
    pub css: String,
    pub js: String,
    pub fonts: String,
}

impl Default for StaticCaching {
    fn default() -> Self {
        Self {
            images: "30d".to_string(),
            css: "7d".to_string(),
            js: "7d".to_string(),
            fonts: "30d".to_string(),
        }
    }
}

impl StaticCaching {
    /// An empty table, every class disabled
    pub fn none() -> Self {
        Self {
            images: String::new(),
            css: String::new(),
            js: String::new(),
            fonts: String::new(),
        }
    }

    /// Expiry for a class, `None` when the class is disabled
    pub fn expiry(&self, class: AssetClass) -> Option<&str> {
        let value = match class {
            AssetClass::Images => &self.images,
            AssetClass::Css => &self.css,
            AssetClass::Js => &self.js,
            AssetClass::Fonts => &self.fonts,
        };
        Some(value.trim()).filter(|v| !v.is_empty())
    }

    pub fn set_expiry(&mut self, class: AssetClass, expiry: impl Into<String>) {
        let slot = match class {
            AssetClass::Images => &mut self.images,
            AssetClass::Css => &mut self.css,
            AssetClass::Js => &mut self.js,
            AssetClass::Fonts => &mut self.fonts,
        };
        *slot = expiry.into();
    }

    pub fn is_empty(&self) -> bool {
        AssetClass::ALL.iter().all(|class| self.expiry(*class).is_none())
    }
}

/// Static asset classes with their synthesized location patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Images,
    Css,
    Js,
    Fonts,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Images,
        AssetClass::Css,
        AssetClass::Js,
        AssetClass::Fonts,
    ];

    /// Case-insensitive regex used for the synthesized `location ~*` block
    pub fn pattern(&self) -> &'static str {
        match self {
            AssetClass::Images => r"\.(jpg|jpeg|png|gif|ico|svg|webp|avif)$",
            AssetClass::Css => r"\.css$",
            AssetClass::Js => r"\.(js|mjs)$",
            AssetClass::Fonts => r"\.(woff2|woff|ttf|otf|eot)$",
        }
    }

    pub fn from_pattern(pattern: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.pattern() == pattern)
    }
}

/// Size with unit, rendered canonically as e.g. `10M`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BodySize {
    pub value: u64,
    pub unit: SizeUnit,
}

/// Size unit suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    fn multiplier(&self) -> u64 {
        match self {
            SizeUnit::Bytes => 1,
            SizeUnit::Kilobytes => 1024,
            SizeUnit::Megabytes => 1024 * 1024,
            SizeUnit::Gigabytes => 1024 * 1024 * 1024,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            SizeUnit::Bytes => "",
            SizeUnit::Kilobytes => "K",
            SizeUnit::Megabytes => "M",
            SizeUnit::Gigabytes => "G",
        }
    }
}

impl BodySize {
    pub const fn megabytes(value: u64) -> Self {
        Self { value, unit: SizeUnit::Megabytes }
    }

    /// Size in bytes (saturating)
    pub fn bytes(&self) -> u64 {
        self.value.saturating_mul(self.unit.multiplier())
    }
}

impl Default for BodySize {
    fn default() -> Self {
        Self::megabytes(1)
    }
}

impl fmt::Display for BodySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for BodySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, unit) = match s.char_indices().last() {
            Some((idx, c)) if c.is_ascii_alphabetic() => {
                let unit = match c.to_ascii_uppercase() {
                    'K' => SizeUnit::Kilobytes,
                    'M' => SizeUnit::Megabytes,
                    'G' => SizeUnit::Gigabytes,
                    _ => return Err(format!("invalid size unit in '{}'", s)),
                };
                (&s[..idx], unit)
            }
            _ => (s, SizeUnit::Bytes),
        };
        let value = digits
            .parse::<u64>()
            .map_err(|_| format!("invalid size '{}'", s))?;
        Ok(Self { value, unit })
    }
}

impl TryFrom<String> for BodySize {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BodySize> for String {
    fn from(size: BodySize) -> Self {
        size.to_string()
    }
}

// ============================================================
// Logging
// ============================================================

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub access_log: AccessLog,
    pub error_log: ErrorLog,
}

/// Access log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLog {
    pub enabled: bool,
    pub path: String,
    /// Named `log_format`
    pub format: Option<String>,
}

impl Default for AccessLog {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/var/log/nginx/access.log".to_string(),
            format: None,
        }
    }
}

/// Error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLog {
    pub enabled: bool,
    pub path: String,
    pub level: ErrorLogLevel,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/var/log/nginx/error.log".to_string(),
            level: ErrorLogLevel::Error,
        }
    }
}

/// Error log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLogLevel {
    Debug,
    Info,
    Notice,
    Warn,
    #[default]
    Error,
    Crit,
}

impl ErrorLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLogLevel::Debug => "debug",
            ErrorLogLevel::Info => "info",
            ErrorLogLevel::Notice => "notice",
            ErrorLogLevel::Warn => "warn",
            ErrorLogLevel::Error => "error",
            ErrorLogLevel::Crit => "crit",
        }
    }
}

impl FromStr for ErrorLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(ErrorLogLevel::Debug),
            "info" => Ok(ErrorLogLevel::Info),
            "notice" => Ok(ErrorLogLevel::Notice),
            "warn" => Ok(ErrorLogLevel::Warn),
            "error" => Ok(ErrorLogLevel::Error),
            "crit" => Ok(ErrorLogLevel::Crit),
            other => Err(format!("unknown error_log level '{}'", other)),
        }
    }
}

// ============================================================
// Upstream
// ============================================================

/// Upstream pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub name: String,
    pub servers: Vec<UpstreamServer>,
    pub method: LoadBalancing,
    /// Idle keepalive connections per worker
    pub keepalive: Option<u32>,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            name: "backend".to_string(),
            servers: Vec::new(),
            method: LoadBalancing::RoundRobin,
            keepalive: None,
        }
    }
}

impl UpstreamSection {
    /// Whether a proxy backend address points at this upstream
    pub fn is_referenced_by(&self, backend: &str) -> bool {
        let rest = backend
            .strip_prefix("http://")
            .or_else(|| backend.strip_prefix("https://"))
            .unwrap_or(backend);
        let host = rest.split(['/', ':']).next().unwrap_or("");
        !self.name.is_empty() && host == self.name
    }

    /// `http://<name>`, the backend address for proxies using this pool
    pub fn proxy_address(&self) -> String {
        format!("http://{}", self.name)
    }
}

/// One backend of an upstream pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamServer {
    pub address: String,
    pub weight: Option<u32>,
    pub max_fails: Option<u32>,
    /// Seconds
    pub fail_timeout: Option<u32>,
    pub backup: bool,
    pub down: bool,
}

impl UpstreamServer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Load-balancing method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    /// nginx's implicit default
    #[default]
    RoundRobin,
    LeastConn,
    IpHash,
    Random,
}

impl LoadBalancing {
    /// Directive name, `None` for the implicit round-robin
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            LoadBalancing::RoundRobin => None,
            LoadBalancing::LeastConn => Some("least_conn"),
            LoadBalancing::IpHash => Some("ip_hash"),
            LoadBalancing::Random => Some("random"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_size_canonical_form() {
        let size: BodySize = "10m".parse().unwrap();
        assert_eq!(size, BodySize::megabytes(10));
        assert_eq!(size.to_string(), "10M");
        assert_eq!(size.bytes(), 10 * 1024 * 1024);

        let plain: BodySize = "2048".parse().unwrap();
        assert_eq!(plain.unit, SizeUnit::Bytes);
        assert_eq!(plain.to_string(), "2048");

        assert!("ten".parse::<BodySize>().is_err());
        assert!("10x".parse::<BodySize>().is_err());
    }

    #[test]
    fn test_rate_limit_zone_name() {
        let generated = RateLimit::default();
        assert_eq!(
            generated.zone_descriptor(),
            "$binary_remote_addr zone=req_limit:10m rate=10r/s"
        );
        assert_eq!(generated.zone_name(), "req_limit");

        let custom = RateLimit {
            zone: Some("$binary_remote_addr zone=api:20m rate=5r/s".to_string()),
            ..RateLimit::default()
        };
        assert_eq!(custom.zone_name(), "api");
    }

    #[test]
    fn test_upstream_reference() {
        let upstream = UpstreamSection {
            name: "api_backends".to_string(),
            ..UpstreamSection::default()
        };
        assert!(upstream.is_referenced_by("http://api_backends"));
        assert!(upstream.is_referenced_by("https://api_backends/v1"));
        assert!(!upstream.is_referenced_by("http://api_backends_old"));
        assert!(!upstream.is_referenced_by("http://127.0.0.1:3000"));
    }

    #[test]
    fn test_location_json_shape() {
        let location = LocationEntry::new("/api", LocationBody::Proxy(ProxyLocation::to("http://backend")))
            .with_match_kind(MatchKind::Exact);
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["match_kind"], "exact");
        assert_eq!(json["body"]["kind"], "proxy");
        assert_eq!(json["body"]["backend"], "http://backend");

        let back: LocationEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, location);
    }

    #[test]
    fn test_redirect_code_rejects_other_statuses() {
        let ok: RedirectLocation = serde_json::from_str(r#"{"target": "https://a", "code": 302}"#).unwrap();
        assert_eq!(ok.code, RedirectCode::Found);
        assert!(serde_json::from_str::<RedirectLocation>(r#"{"target": "https://a", "code": 307}"#).is_err());
    }

    #[test]
    fn test_static_caching_classes() {
        let mut caching = StaticCaching::none();
        assert!(caching.is_empty());
        caching.set_expiry(AssetClass::Css, "7d");
        assert_eq!(caching.expiry(AssetClass::Css), Some("7d"));
        assert_eq!(caching.expiry(AssetClass::Js), None);
        assert_eq!(AssetClass::from_pattern(r"\.css$"), Some(AssetClass::Css));
    }

    #[test]
    fn test_static_caching_null_is_empty_table() {
        let performance: PerformanceSection = serde_json::from_str(r#"{"static_caching": null}"#).unwrap();
        assert!(performance.static_caching.is_empty());
        assert_eq!(performance, PerformanceSection::default());

        let performance: PerformanceSection =
            serde_json::from_str(r#"{"static_caching": {"images": "", "css": "7d", "js": "", "fonts": ""}}"#).unwrap();
        assert_eq!(performance.static_caching.expiry(AssetClass::Css), Some("7d"));
        assert_eq!(performance.static_caching.expiry(AssetClass::Images), None);
    }
}
