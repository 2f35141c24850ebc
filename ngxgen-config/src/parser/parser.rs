//! nginx configuration parser
//!
//! Walks the token stream with an explicit stack of block frames and folds
//! recognised directives into an [`NginxConfig`]. Parsing never stops at the
//! first problem: errors are collected and the best-effort model is returned
//! alongside them.

use crate::parser::ast::{Arg, Directive, Terminator};
use crate::parser::lexer::{tokenize, Location, Spanned, Token};
use ngxgen_core::config::*;
use thiserror::Error;

/// A recoverable problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub span: Location,
    pub message: String,
}

/// Result of parsing nginx text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseOutput {
    pub config: NginxConfig,
    pub parse_errors: Vec<ParseError>,
    pub warnings: Vec<String>,
}

/// Parse nginx configuration text into the model
pub fn parse(source: &str) -> ParseOutput {
    Parser::new(source).parse()
}

/// Diagnostics and file-wide state shared by every frame
#[derive(Default)]
struct Context {
    errors: Vec<ParseError>,
    warnings: Vec<String>,
    limit_req_zones: Vec<Directive>,
}

impl Context {
    fn error(&mut self, directive: &Directive, message: impl Into<String>) {
        self.error_at(directive.line, directive.span, message);
    }

    fn error_at(&mut self, line: usize, span: Location, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(line, "parse error: {}", message);
        self.errors.push(ParseError { line, span, message });
    }

    fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = format!("line {}: {}", line, message.into());
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

// ============================================================
// Frames
// ============================================================

enum Frame {
    Http,
    Events(usize),
    Server(Box<ServerDraft>),
    Location(LocationDraft),
    Upstream(UpstreamDraft),
    Opaque(OpaqueBlock),
}

impl Frame {
    fn describe(&self) -> (String, usize) {
        match self {
            Frame::Http => ("http".to_string(), 0),
            Frame::Events(line) => ("events".to_string(), *line),
            Frame::Server(draft) => ("server".to_string(), draft.line),
            Frame::Location(draft) => (format!("location {}", draft.path), draft.line),
            Frame::Upstream(draft) => (format!("upstream {}", draft.section.name), draft.line),
            Frame::Opaque(block) => (block.directive.header(), block.directive.line),
        }
    }
}

/// `server` block (or http-level defaults) being assembled
#[derive(Debug, Clone)]
struct ServerDraft {
    server: ServerSection,
    tls: TlsSection,
    security: SecuritySection,
    performance: PerformanceSection,
    logging: LoggingSection,
    locations: Vec<LocationEntry>,
    limit_req: Option<LimitReq>,
    /// Server-level `return <code> <target>`
    redirect: Option<(u16, String)>,
    port_from_v4: bool,
    root_set: bool,
    ciphers_seen: bool,
    line: usize,
}

#[derive(Debug, Clone)]
struct LimitReq {
    zone: String,
    burst: u32,
    nodelay: bool,
    line: usize,
}

impl ServerDraft {
    /// nginx's own defaults rather than the model's opinionated ones
    fn baseline() -> Self {
        Self {
            server: ServerSection {
                server_names: Vec::new(),
                listen_port: 80,
                listen_ipv6: false,
                root: None,
                index: Vec::new(),
            },
            tls: TlsSection::default(),
            security: SecuritySection::default(),
            performance: PerformanceSection {
                sendfile: false,
                tcp_nopush: false,
                tcp_nodelay: true,
                keepalive_timeout: 75,
                ..PerformanceSection::default()
            },
            logging: LoggingSection::default(),
            locations: Vec::new(),
            limit_req: None,
            redirect: None,
            port_from_v4: false,
            root_set: false,
            ciphers_seen: false,
            line: 0,
        }
    }

    fn open_server(&self, line: usize) -> Self {
        Self {
            locations: Vec::new(),
            redirect: None,
            root_set: false,
            line,
            ..self.clone()
        }
    }

    /// `return 301 https://...` and nothing that serves content
    fn is_redirect_only(&self) -> bool {
        matches!(&self.redirect, Some((301 | 302, target)) if target.starts_with("https://"))
            && self.locations.is_empty()
            && !self.root_set
    }

    fn gzip_mut(&mut self) -> &mut GzipSettings {
        self.performance.gzip.get_or_insert_with(|| GzipSettings {
            enabled: false,
            level: 1,
            min_length: 20,
            types: Vec::new(),
        })
    }

    fn apply(&mut self, d: &Directive, ctx: &mut Context) {
        match d.name.as_str() {
            "listen" => self.apply_listen(d, ctx),
            "server_name" => self
                .server
                .server_names
                .extend(d.values().filter(|v| !v.is_empty()).map(str::to_string)),
            "root" => match d.arg(0) {
                Some(root) => {
                    self.server.root = Some(root.to_string());
                    self.root_set = true;
                }
                None => ctx.error(d, "root requires a path"),
            },
            "index" => self.server.index = d.values().map(str::to_string).collect(),

            // TLS
            "ssl_certificate" => {
                self.tls.enabled = true;
                match d.arg(0) {
                    Some(path) => self.tls.cert_path = path.to_string(),
                    None => ctx.error(d, "ssl_certificate requires a path"),
                }
            }
            "ssl_certificate_key" => match d.arg(0) {
                Some(path) => self.tls.key_path = path.to_string(),
                None => ctx.error(d, "ssl_certificate_key requires a path"),
            },
            "ssl_protocols" => {
                let mut protocols = Vec::new();
                for value in d.values() {
                    match value.parse::<TlsProtocol>() {
                        Ok(protocol) => protocols.push(protocol),
                        Err(e) => ctx.error(d, e),
                    }
                }
                self.tls.protocols = protocols;
            }
            "ssl_ciphers" => {
                let ciphers = d.joined();
                self.ciphers_seen = true;
                match TlsPreset::from_ciphers(&ciphers) {
                    Some(preset) => {
                        self.tls.preset = preset;
                        self.tls.ciphers = None;
                    }
                    None => self.tls.ciphers = Some(ciphers),
                }
            }
            "ssl_dhparam" => self.tls.dh_param_path = d.arg(0).map(str::to_string),
            "ssl_stapling" => self.tls.ocsp_stapling = d.is_on(),
            "ssl_prefer_server_ciphers" | "ssl_stapling_verify" | "ssl_trusted_certificate" | "ssl_ecdh_curve" => {
                tracing::debug!(directive = %d.name, "absorbed by TLS preset");
            }
            name if name.starts_with("ssl_session_") => {
                tracing::debug!(directive = %name, "absorbed by TLS preset");
            }

            // Security
            "add_header" => self.apply_header(d, ctx),
            "server_tokens" => self.security.hide_server_tokens = d.arg(0) == Some("off"),
            "limit_req_zone" => ctx.limit_req_zones.push(d.clone()),
            "limit_req" => self.apply_limit_req(d, ctx),
            "allow" => {
                if let Some(addr) = d.arg(0) {
                    self.security.ip_allow.push(addr.to_string());
                }
            }
            "deny" => match d.arg(0) {
                // Implied by a non-empty allow list
                Some("all") if !self.security.ip_allow.is_empty() => {}
                Some(addr) => self.security.ip_deny.push(addr.to_string()),
                None => ctx.error(d, "deny requires an address"),
            },
            "auth_basic" => match d.arg(0) {
                Some("off") => self.security.basic_auth = None,
                Some(realm) => {
                    self.security.basic_auth.get_or_insert_with(BasicAuth::default).realm = realm.to_string()
                }
                None => ctx.error(d, "auth_basic requires a realm"),
            },
            "auth_basic_user_file" => match d.arg(0) {
                Some(file) => {
                    self.security
                        .basic_auth
                        .get_or_insert_with(BasicAuth::default)
                        .credentials_file = file.to_string()
                }
                None => ctx.error(d, "auth_basic_user_file requires a path"),
            },

            // Logging
            "access_log" => match d.arg(0) {
                Some("off") => self.logging.access_log.enabled = false,
                Some(path) => {
                    let log = &mut self.logging.access_log;
                    log.enabled = true;
                    log.path = path.to_string();
                    log.format = d.arg(1).filter(|f| !f.contains('=')).map(str::to_string);
                }
                None => ctx.error(d, "access_log requires a path"),
            },
            "error_log" => self.apply_error_log(d, ctx),

            // Performance
            "gzip" => self.gzip_mut().enabled = d.is_on(),
            "gzip_comp_level" => match d.arg(0).and_then(|v| v.parse::<u8>().ok()) {
                Some(level) => self.gzip_mut().level = level,
                None => ctx.error(d, format!("invalid gzip_comp_level '{}'", d.joined())),
            },
            "gzip_min_length" => match d.arg(0).and_then(|v| v.parse::<u32>().ok()) {
                Some(length) => self.gzip_mut().min_length = length,
                None => ctx.error(d, format!("invalid gzip_min_length '{}'", d.joined())),
            },
            "gzip_types" => {
                // text/html is always compressed
                self.gzip_mut().types = d
                    .values()
                    .filter(|t| *t != "text/html")
                    .map(str::to_string)
                    .collect();
            }
            "gzip_vary" | "gzip_proxied" | "gzip_buffers" | "gzip_http_version" | "gzip_disable" => {
                tracing::debug!(directive = %d.name, "absorbed by gzip settings");
            }
            "brotli" => self.performance.brotli = d.is_on(),
            name if name.starts_with("brotli_") => {
                tracing::debug!(directive = %name, "absorbed by brotli flag");
            }
            "http2" => self.performance.http2 = d.is_on(),
            "client_max_body_size" => match d.arg(0).map(str::parse::<BodySize>) {
                Some(Ok(size)) => self.performance.client_max_body_size = size,
                Some(Err(e)) => ctx.error(d, e),
                None => ctx.error(d, "client_max_body_size requires a size"),
            },
            "keepalive_timeout" => match d.arg(0).and_then(parse_seconds) {
                Some(seconds) => self.performance.keepalive_timeout = seconds,
                None => ctx.error(d, format!("invalid keepalive_timeout '{}'", d.joined())),
            },
            "sendfile" => self.performance.sendfile = d.is_on(),
            "tcp_nopush" => self.performance.tcp_nopush = d.is_on(),
            "tcp_nodelay" => self.performance.tcp_nodelay = d.is_on(),

            "return" => {
                self.redirect = d
                    .arg(0)
                    .and_then(|code| code.parse::<u16>().ok())
                    .zip(d.arg(1).map(str::to_string));
            }
            other => tracing::debug!(directive = other, line = d.line, "ignoring directive"),
        }
    }

    fn apply_listen(&mut self, d: &Directive, ctx: &mut Context) {
        let Some(addr) = d.arg(0) else {
            ctx.error(d, "listen requires an address or port");
            return;
        };
        if addr.starts_with("unix:") {
            tracing::debug!(addr, "ignoring unix socket listen");
            return;
        }

        let (ipv6, port) = if let Some(rest) = addr.strip_prefix('[') {
            let after = rest.split_once(']').map(|(_, after)| after).unwrap_or("");
            (true, after.strip_prefix(':').unwrap_or("80"))
        } else if let Some((_, port)) = addr.rsplit_once(':') {
            (false, port)
        } else if addr.bytes().all(|b| b.is_ascii_digit()) {
            (false, addr)
        } else if addr == "*" || addr == "localhost" || addr.contains('.') {
            (false, "80")
        } else {
            ctx.error(d, format!("invalid port '{}' in listen", addr));
            return;
        };

        let port = match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                ctx.error(d, format!("invalid port '{}' in listen", port));
                return;
            }
        };

        let ssl = d.values().skip(1).any(|v| v == "ssl");
        if ssl {
            self.tls.enabled = true;
        }
        if d.values().skip(1).any(|v| v == "http2") {
            self.performance.http2 = true;
        }

        if ipv6 {
            self.server.listen_ipv6 = true;
            if !self.port_from_v4 {
                self.server.listen_port = port;
            }
        } else if !self.port_from_v4 || ssl {
            self.server.listen_port = port;
            self.port_from_v4 = true;
        }
    }

    fn apply_header(&mut self, d: &Directive, ctx: &mut Context) {
        let (Some(name), Some(value)) = (d.arg(0), d.arg(1)) else {
            ctx.error(d, "add_header requires a name and a value");
            return;
        };
        let headers = &mut self.security.headers;

        match name.to_ascii_lowercase().as_str() {
            "strict-transport-security" => {
                self.tls.hsts = true;
                let max_age = value
                    .split(';')
                    .map(str::trim)
                    .find_map(|part| part.strip_prefix("max-age="));
                if let Some(age) = max_age {
                    match age.parse::<u64>() {
                        Ok(age) => self.tls.hsts_max_age = age,
                        Err(_) => ctx.error(d, format!("invalid HSTS max-age '{}'", age)),
                    }
                }
            }
            "x-frame-options" => match value.to_ascii_uppercase().as_str() {
                "DENY" => headers.frame_options = Some(FrameOptions::Deny),
                "SAMEORIGIN" => headers.frame_options = Some(FrameOptions::SameOrigin),
                _ => ctx.warn(d.line, format!("unsupported X-Frame-Options value '{}' ignored", value)),
            },
            "x-content-type-options" => headers.content_type_options = value.eq_ignore_ascii_case("nosniff"),
            "referrer-policy" => headers.referrer_policy = Some(value.to_string()),
            "content-security-policy" => headers.content_security_policy = Some(value.to_string()),
            "permissions-policy" => headers.permissions_policy = Some(value.to_string()),
            _ => tracing::debug!(header = name, "ignoring response header"),
        }
    }

    fn apply_limit_req(&mut self, d: &Directive, ctx: &mut Context) {
        let mut limit = LimitReq {
            zone: String::new(),
            burst: 0,
            nodelay: false,
            line: d.line,
        };
        for value in d.values() {
            if let Some(zone) = value.strip_prefix("zone=") {
                limit.zone = zone.to_string();
            } else if let Some(burst) = value.strip_prefix("burst=") {
                match burst.parse() {
                    Ok(burst) => limit.burst = burst,
                    Err(_) => ctx.error(d, format!("invalid burst '{}'", burst)),
                }
            } else if value == "nodelay" {
                limit.nodelay = true;
            }
        }
        if limit.zone.is_empty() {
            ctx.error(d, "limit_req requires zone=<name>");
        }
        self.limit_req = Some(limit);
    }

    fn apply_error_log(&mut self, d: &Directive, ctx: &mut Context) {
        let Some(path) = d.arg(0) else {
            ctx.error(d, "error_log requires a path");
            return;
        };
        let log = &mut self.logging.error_log;
        if path == "/dev/null" {
            log.enabled = false;
            return;
        }
        log.enabled = true;
        log.path = path.to_string();
        if let Some(level) = d.arg(1) {
            match level.parse() {
                Ok(level) => log.level = level,
                Err(e) => ctx.error(d, e),
            }
        }
    }
}

/// A directive (or captured nested block) inside a location
#[derive(Debug, Clone)]
struct Entry {
    directive: Directive,
    text: String,
}

impl Entry {
    fn simple(directive: Directive) -> Self {
        let text = directive.to_string();
        Self { directive, text }
    }

    fn is_simple(&self) -> bool {
        self.directive.terminator != Terminator::Block
    }

    fn named(&self, name: &str) -> bool {
        self.is_simple() && self.directive.name == name
    }
}

#[derive(Debug)]
struct LocationDraft {
    path: String,
    match_kind: MatchKind,
    entries: Vec<Entry>,
    line: usize,
}

/// What a closed location turns into
enum Finished {
    Location(LocationEntry),
    StaticCache(AssetClass, String),
}

impl LocationDraft {
    fn open(d: &Directive, ctx: &mut Context) -> Self {
        let mut args = d.values();
        let mut match_kind = MatchKind::Prefix;
        let mut path = args.next();

        if let Some(qualifier) = path {
            if let Some(kind) = MatchKind::from_qualifier(qualifier) {
                match_kind = kind;
                path = args.next();
            } else if qualifier == "^~" {
                ctx.warn(d.line, "'^~' modifier treated as a plain prefix match");
                path = args.next();
            }
        }

        let path = match path {
            Some(path) => path.to_string(),
            None => {
                ctx.error(d, "location requires a path");
                String::new()
            }
        };
        if args.next().is_some() {
            ctx.error(d, format!("malformed location '{}'", d.joined()));
        }

        Self {
            path,
            match_kind,
            entries: Vec::new(),
            line: d.line,
        }
    }

    fn finish(self, ctx: &mut Context) -> Finished {
        if let Some(cached) = self.as_static_cache() {
            return cached;
        }

        let has = |name: &str| self.entries.iter().any(|e| e.named(name));
        let redirect = self.entries.iter().position(|e| {
            e.named("return")
                && matches!(e.directive.arg(0), Some("301" | "302"))
                && e.directive.arg(1).is_some()
        });

        let (body, extra) = if has("proxy_pass") {
            self.build_proxy(ctx)
        } else if let Some(index) = redirect {
            self.build_redirect(index)
        } else if has("root") || has("try_files") {
            self.build_static()
        } else {
            let directives = self
                .entries
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            (LocationBody::Custom(CustomLocation { directives }), Vec::new())
        };

        let mut entry = LocationEntry::new(self.path, body).with_match_kind(self.match_kind);
        if !extra.is_empty() {
            entry = entry.with_extra_directives(extra.join("\n"));
        }
        Finished::Location(entry)
    }

    /// Synthesized asset-caching block: `~*` class pattern carrying `expires`
    fn as_static_cache(&self) -> Option<Finished> {
        if self.match_kind != MatchKind::RegexCaseInsensitive {
            return None;
        }
        let class = AssetClass::from_pattern(&self.path)?;
        let only_cache_directives = self.entries.iter().all(|e| {
            e.named("expires")
                || (e.named("access_log") && e.directive.arg(0) == Some("off"))
                || (e.named("add_header") && e.directive.arg(0).is_some_and(|h| h.eq_ignore_ascii_case("Cache-Control")))
        });
        if !only_cache_directives {
            return None;
        }
        let expires = self.entries.iter().find(|e| e.named("expires"))?;
        Some(Finished::StaticCache(class, expires.directive.joined()))
    }

    fn build_proxy(&self, ctx: &mut Context) -> (LocationBody, Vec<String>) {
        let mut proxy = ProxyLocation {
            pass_real_ip: false,
            ..ProxyLocation::default()
        };
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut http_version: Option<&Entry> = None;
        let mut extra = Vec::new();

        for entry in &self.entries {
            if !entry.is_simple() {
                extra.push(entry.text.clone());
                continue;
            }
            let d = &entry.directive;
            let timeout = || d.arg(0).and_then(parse_seconds);
            match d.name.as_str() {
                "proxy_pass" => proxy.backend = d.joined(),
                "proxy_set_header" if d.args.len() >= 2 => {
                    let value = d.args[1..].iter().map(|a| a.value.as_str()).collect::<Vec<_>>().join(" ");
                    headers.push((d.args[0].value.clone(), value));
                }
                "proxy_http_version" => http_version = Some(entry),
                "proxy_connect_timeout" if timeout().is_some() => proxy.connect_timeout = timeout(),
                "proxy_read_timeout" if timeout().is_some() => proxy.read_timeout = timeout(),
                "proxy_send_timeout" if timeout().is_some() => proxy.send_timeout = timeout(),
                "proxy_buffering" => proxy.buffering = Some(d.is_on()),
                "root" => {
                    ctx.warn(
                        d.line,
                        format!("location {} has both root and proxy_pass; kept as a proxy", self.path),
                    );
                    extra.push(entry.text.clone());
                }
                _ => extra.push(entry.text.clone()),
            }
        }

        if headers_contain(&headers, "Upgrade", "$http_upgrade") && headers_contain(&headers, "Connection", "upgrade") {
            remove_header(&mut headers, "Upgrade", "$http_upgrade");
            remove_header(&mut headers, "Connection", "upgrade");
            proxy.websocket = true;
        }

        let triad = [
            ("X-Real-IP", "$remote_addr"),
            ("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
            ("X-Forwarded-Proto", "$scheme"),
        ];
        if triad.iter().all(|(n, v)| headers_contain(&headers, n, v)) {
            for (name, value) in triad {
                remove_header(&mut headers, name, value);
            }
            proxy.pass_real_ip = true;
        }

        proxy.headers = headers.into_iter().collect();

        if let Some(entry) = http_version {
            if !(proxy.websocket && entry.directive.arg(0) == Some("1.1")) {
                extra.push(entry.text.clone());
            }
        }

        (LocationBody::Proxy(proxy), extra)
    }

    fn build_redirect(&self, index: usize) -> (LocationBody, Vec<String>) {
        let mut redirect = RedirectLocation {
            target: String::new(),
            code: RedirectCode::MovedPermanently,
        };
        let mut extra = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if i == index {
                let d = &entry.directive;
                if d.arg(0) == Some("302") {
                    redirect.code = RedirectCode::Found;
                }
                redirect.target = d.values().skip(1).collect::<Vec<_>>().join(" ");
            } else {
                extra.push(entry.text.clone());
            }
        }

        (LocationBody::Redirect(redirect), extra)
    }

    fn build_static(&self) -> (LocationBody, Vec<String>) {
        let mut location = StaticLocation::default();
        let mut extra = Vec::new();

        for entry in &self.entries {
            if !entry.is_simple() {
                extra.push(entry.text.clone());
                continue;
            }
            let d = &entry.directive;
            match d.name.as_str() {
                "root" => location.root = d.joined(),
                "try_files" => location.try_files = Some(d.joined()),
                "index" => location.index = Some(d.joined()),
                "autoindex" => location.autoindex = d.is_on(),
                "expires" => location.expires = Some(d.joined()),
                _ => extra.push(entry.text.clone()),
            }
        }

        (LocationBody::Static(location), extra)
    }
}

fn headers_contain(headers: &[(String, String)], name: &str, value: &str) -> bool {
    headers
        .iter()
        .any(|(n, v)| n.eq_ignore_ascii_case(name) && v.eq_ignore_ascii_case(value))
}

fn remove_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(n, v)| !(n.eq_ignore_ascii_case(name) && v.eq_ignore_ascii_case(value)));
}

#[derive(Debug)]
struct UpstreamDraft {
    section: UpstreamSection,
    line: usize,
}

impl UpstreamDraft {
    fn open(d: &Directive, ctx: &mut Context) -> Self {
        let name = match d.arg(0) {
            Some(name) => name.to_string(),
            None => {
                ctx.error(d, "upstream requires a name");
                UpstreamSection::default().name
            }
        };
        Self {
            section: UpstreamSection {
                name,
                ..UpstreamSection::default()
            },
            line: d.line,
        }
    }

    fn apply(&mut self, d: &Directive, ctx: &mut Context) {
        match d.name.as_str() {
            "server" => {
                let Some(address) = d.arg(0) else {
                    ctx.error(d, "upstream server requires an address");
                    return;
                };
                let mut server = UpstreamServer::new(address);
                for param in d.values().skip(1) {
                    let (key, value) = param.split_once('=').unwrap_or((param, ""));
                    let number = || value.parse::<u32>().ok();
                    let parsed = match key {
                        "weight" => number().map(|n| server.weight = Some(n)),
                        "max_fails" => number().map(|n| server.max_fails = Some(n)),
                        "fail_timeout" => parse_seconds(value).map(|n| server.fail_timeout = Some(n)),
                        "backup" => Some(server.backup = true),
                        "down" => Some(server.down = true),
                        _ => {
                            ctx.warn(d.line, format!("upstream server parameter '{}' ignored", param));
                            Some(())
                        }
                    };
                    if parsed.is_none() {
                        ctx.error(d, format!("bad upstream parameter '{}'", param));
                    }
                }
                self.section.servers.push(server);
            }
            "least_conn" => self.section.method = LoadBalancing::LeastConn,
            "ip_hash" => self.section.method = LoadBalancing::IpHash,
            "random" => self.section.method = LoadBalancing::Random,
            "hash" => ctx.warn(d.line, "hash load balancing is not supported; using round robin"),
            "keepalive" => match d.arg(0).and_then(|v| v.parse().ok()) {
                Some(n) => self.section.keepalive = Some(n),
                None => ctx.error(d, format!("invalid keepalive '{}'", d.joined())),
            },
            other => tracing::debug!(directive = other, "ignoring upstream directive"),
        }
    }
}

/// A block the model has no place for
struct OpaqueBlock {
    directive: Directive,
    /// Keep the text (nested in a location) or discard it
    capture: bool,
    children: Vec<String>,
}

impl OpaqueBlock {
    fn new(directive: Directive, capture: bool) -> Self {
        Self {
            directive,
            capture,
            children: Vec::new(),
        }
    }

    fn render(&self) -> String {
        let mut out = format!("{} {{", self.directive.header());
        for line in self.children.iter().flat_map(|child| child.lines()) {
            out.push_str("\n    ");
            out.push_str(line);
        }
        out.push_str("\n}");
        out
    }
}

// ============================================================
// Parser
// ============================================================

/// Parser state
pub struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    stack: Vec<Frame>,
    /// Top-level and `http {}` directives, inherited by every server
    inherited: ServerDraft,
    main: Option<Box<ServerDraft>>,
    http_redirect: bool,
    upstream: Option<UpstreamSection>,
    worker_connections: Option<u32>,
    ctx: Context,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            stack: Vec::new(),
            inherited: ServerDraft::baseline(),
            main: None,
            http_redirect: false,
            upstream: None,
            worker_connections: None,
            ctx: Context::default(),
        }
    }

    pub fn parse(mut self) -> ParseOutput {
        while let Some(token) = self.tokens.get(self.pos) {
            let (span, line) = (token.span, token.line);
            match &token.value {
                Token::Word { value, .. } => {
                    let name = value.clone();
                    self.pos += 1;
                    let directive = self.read_directive(name, span, line);
                    self.handle(directive);
                }
                Token::Comment(_) | Token::Semicolon => self.pos += 1,
                Token::BlockEnd => {
                    self.pos += 1;
                    match self.stack.pop() {
                        Some(frame) => self.close(frame),
                        None => self.ctx.error_at(line, span, "unexpected '}'"),
                    }
                }
                Token::BlockStart => {
                    self.pos += 1;
                    self.ctx.error_at(line, span, "unexpected '{'");
                    let anonymous = Directive {
                        name: String::new(),
                        args: Vec::new(),
                        terminator: Terminator::Block,
                        span,
                        line,
                    };
                    self.stack.push(Frame::Opaque(OpaqueBlock::new(anonymous, false)));
                }
            }
        }

        let eof = self.tokens.last().map(|t| (t.line, t.span)).unwrap_or_default();
        while let Some(frame) = self.stack.pop() {
            let (name, opened) = frame.describe();
            self.ctx
                .error_at(eof.0, eof.1, format!("unterminated block '{}' opened on line {}", name, opened));
            self.close(frame);
        }

        self.finish()
    }

    fn read_directive(&mut self, name: String, span: Location, line: usize) -> Directive {
        let mut args = Vec::new();
        let mut end = span.end;

        let terminator = loop {
            let Some(token) = self.tokens.get(self.pos) else {
                break Terminator::Missing;
            };
            match &token.value {
                Token::Word { value, quote } => {
                    args.push(Arg {
                        value: value.clone(),
                        quote: *quote,
                    });
                    end = token.span.end;
                    self.pos += 1;
                }
                Token::Comment(_) => self.pos += 1,
                Token::Semicolon => {
                    end = token.span.end;
                    self.pos += 1;
                    break Terminator::Semicolon;
                }
                Token::BlockStart => {
                    end = token.span.end;
                    self.pos += 1;
                    break Terminator::Block;
                }
                Token::BlockEnd => break Terminator::Missing,
            }
        };

        let directive = Directive {
            name,
            args,
            terminator,
            span: Location { start: span.start, end },
            line,
        };
        if terminator == Terminator::Missing {
            self.ctx
                .error(&directive, format!("missing ';' after '{}'", directive.name));
        }
        directive
    }

    fn handle(&mut self, d: Directive) {
        if d.terminator == Terminator::Block {
            self.open(d);
            return;
        }

        match self.stack.last_mut() {
            None | Some(Frame::Http) => self.inherited.apply(&d, &mut self.ctx),
            Some(Frame::Server(draft)) => draft.apply(&d, &mut self.ctx),
            Some(Frame::Location(draft)) => draft.entries.push(Entry::simple(d)),
            Some(Frame::Upstream(draft)) => draft.apply(&d, &mut self.ctx),
            Some(Frame::Events(_)) => match d.name.as_str() {
                "worker_connections" => match d.arg(0).and_then(|v| v.parse::<u32>().ok()) {
                    Some(n) => self.worker_connections = Some(n),
                    None => self
                        .ctx
                        .error(&d, format!("invalid worker_connections '{}'", d.joined())),
                },
                other => tracing::debug!(directive = other, "ignoring events directive"),
            },
            Some(Frame::Opaque(block)) => {
                if block.capture {
                    block.children.push(d.to_string());
                }
            }
        }
    }

    fn open(&mut self, d: Directive) {
        let frame = match self.stack.last() {
            None | Some(Frame::Http) => match d.name.as_str() {
                "http" => Frame::Http,
                "events" => Frame::Events(d.line),
                "server" => Frame::Server(Box::new(self.inherited.open_server(d.line))),
                "upstream" => Frame::Upstream(UpstreamDraft::open(&d, &mut self.ctx)),
                _ => Frame::Opaque(OpaqueBlock::new(d, false)),
            },
            Some(Frame::Server(_)) if d.name == "location" => {
                Frame::Location(LocationDraft::open(&d, &mut self.ctx))
            }
            Some(Frame::Location(_)) => Frame::Opaque(OpaqueBlock::new(d, true)),
            Some(Frame::Opaque(parent)) => {
                let capture = parent.capture;
                Frame::Opaque(OpaqueBlock::new(d, capture))
            }
            Some(Frame::Server(_)) | Some(Frame::Upstream(_)) | Some(Frame::Events(_)) => {
                tracing::debug!(block = %d.name, line = d.line, "ignoring block");
                Frame::Opaque(OpaqueBlock::new(d, false))
            }
        };
        self.stack.push(frame);
    }

    fn close(&mut self, frame: Frame) {
        match frame {
            Frame::Http | Frame::Events(_) => {}
            Frame::Server(draft) => self.close_server(draft),
            Frame::Location(draft) => {
                let finished = draft.finish(&mut self.ctx);
                if let Some(Frame::Server(server)) = self.stack.last_mut() {
                    match finished {
                        Finished::Location(location) => server.locations.push(location),
                        Finished::StaticCache(class, expiry) => {
                            server.performance.static_caching.set_expiry(class, expiry)
                        }
                    }
                }
            }
            Frame::Upstream(draft) => {
                if self.upstream.is_some() {
                    self.ctx.warn(
                        draft.line,
                        format!("additional upstream '{}' dropped", draft.section.name),
                    );
                } else {
                    self.upstream = Some(draft.section);
                }
            }
            Frame::Opaque(block) => {
                if !block.capture {
                    return;
                }
                let text = block.render();
                match self.stack.last_mut() {
                    Some(Frame::Location(location)) => location.entries.push(Entry {
                        directive: block.directive,
                        text,
                    }),
                    Some(Frame::Opaque(parent)) => parent.children.push(text),
                    _ => {}
                }
            }
        }
    }

    fn close_server(&mut self, draft: Box<ServerDraft>) {
        if draft.is_redirect_only() {
            tracing::debug!(line = draft.line, "redirect-only server block");
            self.http_redirect = true;
        } else if self.main.is_some() {
            let names = draft.server.server_names.join(" ");
            self.ctx.warn(
                draft.line,
                format!("additional server block '{}' dropped", names),
            );
        } else {
            self.main = Some(draft);
        }
    }

    fn finish(mut self) -> ParseOutput {
        let draft = self.main.take().map(|d| *d).unwrap_or(self.inherited);

        let zones = std::mem::take(&mut self.ctx.limit_req_zones);
        let zone = select_zone(zones, draft.limit_req.as_ref(), &draft.locations, &mut self.ctx);
        let in_locations = zone
            .as_ref()
            .and_then(zone_name)
            .is_some_and(|name| locations_apply_zone(&draft.locations, name));
        let rate_limit = match (zone, draft.limit_req) {
            (None, None) => None,
            (zone, limit) => Some(build_rate_limit(zone, limit, in_locations, &mut self.ctx)),
        };

        let mut config = NginxConfig {
            server: draft.server,
            tls: draft.tls,
            locations: draft.locations,
            security: draft.security,
            performance: draft.performance,
            logging: draft.logging,
            upstream: self.upstream,
        };
        config.tls.http_redirect = self.http_redirect;
        // TLS 1.3 suites carry no ssl_ciphers line
        if config.tls.enabled && !draft.ciphers_seen && config.tls.protocols == [TlsProtocol::TlsV1_3] {
            config.tls.preset = TlsPreset::Modern;
        }
        config.security.rate_limit = rate_limit;
        config.performance.worker_connections = self.worker_connections;

        ParseOutput {
            config,
            parse_errors: self.ctx.errors,
            warnings: self.ctx.warnings,
        }
    }
}

/// `api` from `limit_req_zone ... zone=api:10m ...`
fn zone_name(d: &Directive) -> Option<&str> {
    d.values()
        .find_map(|v| v.strip_prefix("zone="))
        .and_then(|zone| zone.split(':').next())
        .filter(|name| !name.is_empty())
}

/// Whether location text applies `limit_req zone=<name>`
fn locations_apply_zone(locations: &[LocationEntry], name: &str) -> bool {
    let needle = format!("zone={}", name);
    locations
        .iter()
        .flat_map(|location| {
            let custom = match &location.body {
                LocationBody::Custom(custom) => Some(custom.directives.as_str()),
                _ => None,
            };
            custom.into_iter().chain(location.extra_directives.as_deref())
        })
        .flat_map(str::lines)
        .map(|line| line.trim().trim_end_matches(';'))
        .filter(|line| line.starts_with("limit_req "))
        .any(|line| line.split_whitespace().any(|arg| arg == needle))
}

/// One zone is modelled: the one the server applies, else one a location
/// applies, else the first
fn select_zone(
    zones: Vec<Directive>,
    limit: Option<&LimitReq>,
    locations: &[LocationEntry],
    ctx: &mut Context,
) -> Option<Directive> {
    let wanted = |d: &Directive| match (limit, zone_name(d)) {
        (Some(limit), Some(name)) => name == limit.zone,
        (None, Some(name)) => locations_apply_zone(locations, name),
        _ => false,
    };
    let keep = zones.iter().position(|d| wanted(d)).unwrap_or(0);

    let mut selected = None;
    for (index, d) in zones.into_iter().enumerate() {
        if index == keep {
            selected = Some(d);
        } else {
            ctx.warn(d.line, format!("additional limit_req_zone '{}' dropped", d.joined()));
        }
    }
    selected
}

fn build_rate_limit(
    zone: Option<Directive>,
    limit: Option<LimitReq>,
    applied_in_locations: bool,
    ctx: &mut Context,
) -> RateLimit {
    let mut rate_limit = RateLimit {
        zone: None,
        requests_per_second: RateLimit::default().requests_per_second,
        burst: 0,
        nodelay: false,
        apply_to_server: true,
    };

    if let Some(d) = &zone {
        let descriptor = d.joined();
        match d.values().find_map(|v| v.strip_prefix("rate=")) {
            Some(rate) => match parse_rate(rate) {
                Some(rps) => rate_limit.requests_per_second = rps,
                None => ctx.error(d, format!("invalid rate '{}'", rate)),
            },
            None => ctx.error(d, "limit_req_zone requires rate=<N>r/s"),
        }
        // The generated descriptor is implied by the rate
        let implied = RateLimit {
            zone: None,
            ..rate_limit.clone()
        };
        if implied.zone_descriptor() != descriptor {
            rate_limit.zone = Some(descriptor);
        }
    }

    match limit {
        Some(limit) => {
            rate_limit.burst = limit.burst;
            rate_limit.nodelay = limit.nodelay;
            if !limit.zone.is_empty() && limit.zone != rate_limit.zone_name() {
                ctx.warn(
                    limit.line,
                    format!("limit_req references zone '{}' which is not defined", limit.zone),
                );
            }
        }
        None => {
            rate_limit.apply_to_server = false;
            if !applied_in_locations {
                let line = zone.as_ref().map(|d| d.line).unwrap_or_default();
                ctx.warn(line, "limit_req_zone is defined but never applied");
            }
        }
    }

    rate_limit
}

/// `10r/s`, or `600r/m` rounded up to whole requests per second
fn parse_rate(rate: &str) -> Option<u32> {
    if let Some(n) = rate.strip_suffix("r/s") {
        return n.parse().ok();
    }
    let per_minute: u32 = rate.strip_suffix("r/m")?.parse().ok()?;
    Some(per_minute.div_ceil(60))
}

/// nginx time value in whole seconds: `60`, `60s`, `2m`, `1h`
fn parse_seconds(value: &str) -> Option<u32> {
    let (digits, multiplier) = match value.chars().last()? {
        's' => (&value[..value.len() - 1], 1),
        'm' => (&value[..value.len() - 1], 60),
        'h' => (&value[..value.len() - 1], 3600),
        'd' => (&value[..value.len() - 1], 86_400),
        _ => (value, 1),
    };
    digits.parse::<u32>().ok()?.checked_mul(multiplier)
}
