//! nginx text generator
//!
//! Renders a model as canonical nginx configuration text. Generation is
//! total: anything questionable in the model becomes a warning, never an
//! error. The emitted text has as many `{` as `}` characters, counted raw:
//! values and custom text that would break that are skipped with a warning.

use ngxgen_core::config::*;
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Generated text plus anything worth telling the user about it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateOutput {
    pub text: String,
    pub warnings: Vec<String>,
}

/// Render a model as nginx configuration text
pub fn generate(config: &NginxConfig) -> GenerateOutput {
    let mut generator = Generator {
        config,
        out: Writer::default(),
        warnings: Vec::new(),
    };
    generator.run();
    GenerateOutput {
        text: generator.out.finish(),
        warnings: generator.warnings,
    }
}

/// Indentation-aware line buffer
#[derive(Default)]
struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn line(&mut self, text: impl AsRef<str>) {
        self.line_at(self.depth, text.as_ref());
    }

    fn line_at(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, header: impl AsRef<str>) {
        self.line(format!("{} {{", header.as_ref()));
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("{\n") && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    /// Free-form directive text, re-indented by brace depth
    fn text_block(&mut self, text: &str) {
        let mut depth = 0usize;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (opens, closes) = count_braces(line);
            let leading_close = usize::from(line.starts_with('}'));
            self.line_at(self.depth + depth.saturating_sub(leading_close), line);
            depth = (depth + opens).saturating_sub(closes);
        }
    }

    fn finish(self) -> String {
        let mut out = self.out;
        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}

struct Generator<'a> {
    config: &'a NginxConfig,
    out: Writer,
    warnings: Vec<String>,
}

impl Generator<'_> {
    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("generator warning: {}", message);
        self.warnings.push(message);
    }

    fn run(&mut self) {
        let config = self.config;
        self.check_model();

        if let Some(upstream) = &config.upstream {
            self.upstream(upstream);
            self.out.blank();
        }

        if let Some(rate_limit) = &config.security.rate_limit {
            self.out.line(format!("limit_req_zone {};", rate_limit.zone_descriptor()));
            self.out.blank();
        }

        if config.tls.enabled && config.tls.http_redirect {
            self.redirect_server();
            self.out.blank();
        }

        self.main_server();
    }

    fn check_model(&mut self) {
        let config = self.config;
        let tls = &config.tls;

        if !tls.enabled {
            if tls.http_redirect {
                self.warn("HTTP to HTTPS redirect requested but TLS is disabled; redirect not emitted");
            }
            if tls.hsts {
                self.warn("HSTS requested but TLS is disabled; header not emitted");
            }
            if config.performance.http2 {
                self.warn("HTTP/2 requires TLS; http2 not emitted");
            }
        } else if config.server.listen_port == 80 {
            if tls.http_redirect {
                self.warn("TLS listener and HTTP redirect server both use port 80");
            } else {
                self.warn("TLS is enabled on port 80");
            }
        }

        if config.performance.brotli {
            self.warn("brotli requires the ngx_brotli module");
        }
    }

    fn upstream(&mut self, upstream: &UpstreamSection) {
        self.out.open(format!("upstream {}", upstream.name));
        if let Some(method) = upstream.method.directive() {
            self.out.line(format!("{};", method));
        }
        for server in &upstream.servers {
            let mut line = format!("server {}", server.address);
            if let Some(weight) = server.weight {
                let _ = write!(line, " weight={}", weight);
            }
            if let Some(max_fails) = server.max_fails {
                let _ = write!(line, " max_fails={}", max_fails);
            }
            if let Some(timeout) = server.fail_timeout {
                let _ = write!(line, " fail_timeout={}s", timeout);
            }
            if server.backup {
                line.push_str(" backup");
            }
            if server.down {
                line.push_str(" down");
            }
            line.push(';');
            self.out.line(line);
        }
        if let Some(keepalive) = upstream.keepalive {
            self.out.line(format!("keepalive {};", keepalive));
        }
        self.out.close();
    }

    fn redirect_server(&mut self) {
        let server = &self.config.server;
        self.out.open("server");
        self.out.line("listen 80;");
        if server.listen_ipv6 {
            self.out.line("listen [::]:80;");
        }
        self.out.line(format!("server_name {};", server_names(server)));
        self.out.line("return 301 https://$host$request_uri;");
        self.out.close();
    }

    fn main_server(&mut self) {
        let config = self.config;
        self.out.open("server");

        self.listen();
        self.out.line(format!("server_name {};", server_names(&config.server)));
        if let Some(root) = &config.server.root {
            self.out.line(format!("root {};", root));
        }
        if !config.server.index.is_empty() {
            self.out.line(format!("index {};", config.server.index.join(" ")));
        }

        if config.tls.enabled {
            self.out.blank();
            self.tls();
        }

        self.out.blank();
        self.security();

        if let Some(rate_limit) = config.security.rate_limit.as_ref().filter(|r| r.apply_to_server) {
            self.out.blank();
            let mut line = format!("limit_req zone={} burst={}", rate_limit.zone_name(), rate_limit.burst);
            if rate_limit.nodelay {
                line.push_str(" nodelay");
            }
            line.push(';');
            self.out.line(line);
        }

        self.out.blank();
        self.logging();

        self.out.blank();
        self.performance();

        if config.locations.is_empty() {
            self.warn("no locations defined; added a default location /");
            let fallback = LocationEntry::new(
                "/",
                LocationBody::Static(StaticLocation {
                    try_files: Some("$uri $uri/ =404".to_string()),
                    ..StaticLocation::default()
                }),
            );
            self.out.blank();
            self.location(&fallback);
        }
        for location in &config.locations {
            self.out.blank();
            self.location(location);
        }
        self.static_caching();

        self.out.close();
    }

    fn listen(&mut self) {
        let config = self.config;
        let port = config.server.listen_port;
        let mut flags = String::new();
        if config.tls.enabled {
            flags.push_str(" ssl");
            if config.performance.http2 {
                flags.push_str(" http2");
            }
        }
        self.out.line(format!("listen {}{};", port, flags));
        if config.server.listen_ipv6 {
            self.out.line(format!("listen [::]:{}{};", port, flags));
        }
    }

    fn tls(&mut self) {
        let config = self.config;
        let tls = &config.tls;
        let preset = tls.preset.spec();

        self.out.line("# TLS");
        self.out.line(format!("ssl_certificate {};", tls.cert_path));
        self.out.line(format!("ssl_certificate_key {};", tls.key_path));
        if !tls.protocols.is_empty() {
            let protocols: Vec<&str> = tls.protocols.iter().map(TlsProtocol::as_str).collect();
            self.out.line(format!("ssl_protocols {};", protocols.join(" ")));
        }
        let ciphers = tls.ciphers.as_deref().unwrap_or(preset.ciphers);
        if !ciphers.is_empty() {
            self.out.line(format!("ssl_ciphers {};", ciphers));
        }
        self.out.line(format!(
            "ssl_prefer_server_ciphers {};",
            on_off(preset.prefer_server_ciphers)
        ));
        self.out.line(format!("ssl_session_timeout {};", preset.session_timeout));
        self.out.line(format!("ssl_session_cache {};", preset.session_cache));
        self.out.line(format!("ssl_session_tickets {};", on_off(preset.session_tickets)));
        if let Some(dh) = &tls.dh_param_path {
            self.out.line(format!("ssl_dhparam {};", dh));
        }
        if tls.ocsp_stapling {
            self.out.line("ssl_stapling on;");
            self.out.line("ssl_stapling_verify on;");
        }
        if tls.hsts {
            self.out.line(format!(
                "add_header Strict-Transport-Security \"max-age={}; includeSubDomains\" always;",
                tls.hsts_max_age
            ));
        }
    }

    fn security(&mut self) {
        let config = self.config;
        let security = &config.security;
        let headers = &security.headers;

        self.out.line("# Security");
        if security.hide_server_tokens {
            self.out.line("server_tokens off;");
        }
        if let Some(frame) = headers.frame_options {
            self.header("X-Frame-Options", frame.as_str());
        }
        if headers.content_type_options {
            self.header("X-Content-Type-Options", "nosniff");
        }
        if let Some(policy) = &headers.referrer_policy {
            self.header("Referrer-Policy", policy);
        }
        if let Some(csp) = &headers.content_security_policy {
            self.header("Content-Security-Policy", csp);
        }
        if let Some(policy) = &headers.permissions_policy {
            self.header("Permissions-Policy", policy);
        }

        // First match wins, so explicit denials go ahead of the allow list
        for addr in &security.ip_deny {
            self.out.line(format!("deny {};", addr));
        }
        for addr in &security.ip_allow {
            self.out.line(format!("allow {};", addr));
        }
        if !security.ip_allow.is_empty() {
            self.out.line("deny all;");
        }

        if let Some(auth) = &security.basic_auth {
            if let Some(realm) = self.word("auth_basic", &auth.realm, true) {
                self.out.line(format!("auth_basic {};", realm));
                self.out.line(format!("auth_basic_user_file {};", auth.credentials_file));
            }
        }
    }

    fn header(&mut self, name: &str, value: &str) {
        if let Some(value) = self.word(name, value, true) {
            self.out.line(format!("add_header {} {} always;", name, value));
        }
    }

    /// `value` as a single nginx word, or `None` after a warning when it
    /// cannot be written without breaking the surrounding text
    fn word(&mut self, context: &str, value: &str, always_quote: bool) -> Option<String> {
        if !is_balanced(value) {
            self.warn(format!("{}: '{}' has unbalanced braces; skipped", context, value));
            return None;
        }
        let word = if always_quote || needs_quotes(value) {
            quote(value)
        } else {
            Some(value.to_string())
        };
        if word.is_none() {
            self.warn(format!(
                "{}: value mixes single and double quotes and cannot be written; skipped",
                context
            ));
        }
        word
    }

    fn logging(&mut self) {
        let config = self.config;
        let logging = &config.logging;

        self.out.line("# Logging");
        let access = &logging.access_log;
        if access.enabled {
            match &access.format {
                Some(format) => self.out.line(format!("access_log {} {};", access.path, format)),
                None => self.out.line(format!("access_log {};", access.path)),
            }
        } else {
            self.out.line("access_log off;");
        }

        let error = &logging.error_log;
        if error.enabled {
            self.out.line(format!("error_log {} {};", error.path, error.level.as_str()));
        } else {
            self.out.line("error_log /dev/null crit;");
        }
    }

    fn performance(&mut self) {
        let config = self.config;
        let performance = &config.performance;

        self.out.line("# Performance");
        if let Some(gzip) = &performance.gzip {
            self.out.line(format!("gzip {};", on_off(gzip.enabled)));
            if gzip.enabled {
                self.out.line("gzip_vary on;");
                self.out.line("gzip_proxied any;");
            }
            self.out.line(format!("gzip_comp_level {};", gzip.level));
            self.out.line(format!("gzip_min_length {};", gzip.min_length));
            if !gzip.types.is_empty() {
                self.out.line(format!("gzip_types {};", gzip.types.join(" ")));
            }
        }
        if performance.brotli {
            self.out.line("brotli on;");
            self.out.line("brotli_comp_level 6;");
            self.out.line("brotli_types text/plain text/css application/json application/javascript text/xml application/xml image/svg+xml;");
        }
        self.out.line(format!("client_max_body_size {};", performance.client_max_body_size));
        self.out.line(format!("keepalive_timeout {};", performance.keepalive_timeout));
        self.out.line(format!("sendfile {};", on_off(performance.sendfile)));
        self.out.line(format!("tcp_nopush {};", on_off(performance.tcp_nopush)));
        self.out.line(format!("tcp_nodelay {};", on_off(performance.tcp_nodelay)));
    }

    fn location(&mut self, location: &LocationEntry) {
        let context = format!("location {}", location.path);
        let Some(path) = self.word(&context, &location.path, false) else {
            return;
        };
        let header = match location.match_kind.qualifier() {
            Some(qualifier) => format!("location {} {}", qualifier, path),
            None => format!("location {}", path),
        };
        self.out.open(header);

        match &location.body {
            LocationBody::Static(body) => self.static_body(body),
            LocationBody::Proxy(body) => self.proxy_body(&location.path, body),
            LocationBody::Redirect(body) => {
                if let Some(target) = self.word(&context, &body.target, false) {
                    self.out.line(format!("return {} {};", body.code.as_u16(), target));
                }
            }
            LocationBody::Custom(body) => self.raw_text(&location.path, &body.directives),
        }
        if let Some(extra) = &location.extra_directives {
            self.raw_text(&location.path, extra);
        }

        self.out.close();
    }

    fn static_body(&mut self, body: &StaticLocation) {
        if !body.root.is_empty() {
            self.out.line(format!("root {};", body.root));
        }
        if let Some(index) = &body.index {
            self.out.line(format!("index {};", index));
        }
        if let Some(try_files) = &body.try_files {
            self.out.line(format!("try_files {};", try_files));
        }
        if body.autoindex {
            self.out.line("autoindex on;");
        }
        if let Some(expires) = &body.expires {
            self.out.line(format!("expires {};", expires));
        }
    }

    fn proxy_body(&mut self, path: &str, body: &ProxyLocation) {
        if body.backend.trim().is_empty() {
            self.warn(format!("location {}: proxy backend is empty; proxy_pass not emitted", path));
        } else {
            self.out.line(format!("proxy_pass {};", body.backend));
        }
        if body.websocket {
            self.out.line("proxy_http_version 1.1;");
            self.out.line("proxy_set_header Upgrade $http_upgrade;");
            self.out.line("proxy_set_header Connection \"upgrade\";");
        }
        if body.pass_real_ip {
            self.out.line("proxy_set_header X-Real-IP $remote_addr;");
            self.out.line("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;");
            self.out.line("proxy_set_header X-Forwarded-Proto $scheme;");
        }
        for (name, value) in &body.headers {
            if let Some(value) = self.word(&format!("location {}: {}", path, name), value, false) {
                self.out.line(format!("proxy_set_header {} {};", name, value));
            }
        }
        if let Some(timeout) = body.connect_timeout {
            self.out.line(format!("proxy_connect_timeout {}s;", timeout));
        }
        if let Some(timeout) = body.read_timeout {
            self.out.line(format!("proxy_read_timeout {}s;", timeout));
        }
        if let Some(timeout) = body.send_timeout {
            self.out.line(format!("proxy_send_timeout {}s;", timeout));
        }
        if let Some(buffering) = body.buffering {
            self.out.line(format!("proxy_buffering {};", on_off(buffering)));
        }
    }

    fn raw_text(&mut self, path: &str, text: &str) {
        if is_balanced(text) {
            self.out.text_block(text);
        } else {
            self.warn(format!(
                "location {}: custom directives have unbalanced braces; skipped",
                path
            ));
        }
    }

    fn static_caching(&mut self) {
        let config = self.config;
        let caching = &config.performance.static_caching;
        for class in AssetClass::ALL {
            let Some(expiry) = caching.expiry(class) else {
                continue;
            };
            let pattern = class.pattern();
            let shadowed = config.locations.iter().any(|l| {
                l.match_kind == MatchKind::RegexCaseInsensitive && l.path == pattern
            });
            if shadowed {
                self.warn(format!("static caching for {} skipped; a location already uses that pattern", pattern));
                continue;
            }
            self.out.blank();
            self.out.open(format!("location ~* {}", pattern));
            self.out.line(format!("expires {};", expiry));
            self.out.line("access_log off;");
            self.out.close();
        }
    }
}

fn server_names(server: &ServerSection) -> String {
    if server.server_names.is_empty() {
        "_".to_string()
    } else {
        server.server_names.join(" ")
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Quoted form of a value; quotes have no escapes, so a value holding
/// both kinds has none
fn quote(value: &str) -> Option<String> {
    match (value.contains('"'), value.contains('\'')) {
        (true, true) => None,
        (true, false) => Some(format!("'{}'", value)),
        (false, _) => Some(format!("\"{}\"", value)),
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"' | '\''))
}

/// Braces opened and closed on one line, ignoring quoted text and comments
fn count_braces(line: &str) -> (usize, usize) {
    let mut quote: Option<char> = None;
    let (mut opens, mut closes) = (0, 0);
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => break,
            (None, '{') => opens += 1,
            (None, '}') => closes += 1,
            _ => {}
        }
    }
    (opens, closes)
}

/// Whether text can be embedded without unbalancing the output. Braces
/// are counted raw, quoted and commented ones included
fn is_balanced(text: &str) -> bool {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn braces(text: &str) -> (usize, usize) {
        (text.matches('{').count(), text.matches('}').count())
    }

    #[test]
    fn test_default_model() {
        let output = generate(&NginxConfig::default());
        let text = &output.text;
        assert!(text.contains("server_name example.com;"));
        assert!(text.contains("listen 80;"));
        assert!(text.contains("listen [::]:80;"));
        assert!(text.contains("root /var/www/html;"));
        assert!(text.contains("location / {"));
        assert_eq!(output.warnings, vec!["no locations defined; added a default location /"]);
        let (open, close) = braces(text);
        assert_eq!(open, close);
    }

    #[test]
    fn test_gzip_directives() {
        let config = NginxConfig {
            performance: PerformanceSection {
                gzip: Some(GzipSettings {
                    enabled: true,
                    level: 6,
                    min_length: 256,
                    types: vec!["text/plain".to_string(), "text/css".to_string()],
                }),
                ..PerformanceSection::default()
            },
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.contains("    gzip on;\n"));
        assert!(text.contains("gzip_comp_level 6;"));
        assert!(text.contains("gzip_types text/plain text/css;"));
    }

    #[test]
    fn test_websocket_proxy() {
        let mut proxy = ProxyLocation::to("http://127.0.0.1:3000");
        proxy.websocket = true;
        proxy.headers.insert("Host".to_string(), "$host".to_string());
        proxy.read_timeout = Some(90);
        let config = NginxConfig {
            locations: vec![LocationEntry::new("/ws", LocationBody::Proxy(proxy))],
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(text.contains("proxy_set_header Connection \"upgrade\";"));
        assert!(text.contains("proxy_http_version 1.1;"));
        assert!(text.contains("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"));
        assert!(text.contains("proxy_set_header Host $host;"));
        assert!(text.contains("proxy_read_timeout 90s;"));
    }

    #[test]
    fn test_rate_limit() {
        let config = NginxConfig {
            security: SecuritySection {
                rate_limit: Some(RateLimit::default()),
                ..SecuritySection::default()
            },
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.starts_with("limit_req_zone $binary_remote_addr zone=req_limit:10m rate=10r/s;\n"));
        assert!(text.contains("limit_req zone=req_limit burst=20 nodelay;"));
    }

    #[test]
    fn test_tls_with_redirect() {
        let config = NginxConfig {
            server: ServerSection {
                listen_port: 443,
                ..ServerSection::default()
            },
            tls: TlsSection {
                enabled: true,
                http_redirect: true,
                hsts: true,
                ..TlsSection::default()
            },
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        let redirect = text.find("listen 80;").unwrap();
        let main = text.find("listen 443 ssl;").unwrap();
        assert!(redirect < main);
        assert!(text.contains("return 301 https://$host$request_uri;"));
        assert!(text.contains("ssl_certificate /etc/ssl/certs/fullchain.pem;"));
        assert!(text.contains(TlsPreset::Intermediate.spec().ciphers));
        assert!(text.contains("Strict-Transport-Security \"max-age=63072000; includeSubDomains\" always;"));
    }

    #[test]
    fn test_tls_requests_without_tls_warn() {
        let config = NginxConfig {
            tls: TlsSection {
                http_redirect: true,
                hsts: true,
                ..TlsSection::default()
            },
            performance: PerformanceSection {
                http2: true,
                brotli: true,
                ..PerformanceSection::default()
            },
            ..NginxConfig::default()
        };
        let output = generate(&config);
        assert!(!output.text.contains("http2"));
        assert!(!output.text.contains("Strict-Transport-Security"));
        assert!(output.warnings.iter().any(|w| w.contains("brotli")));
        assert_eq!(output.warnings.len(), 5);
    }

    #[test]
    fn test_upstream_block() {
        let config = ngxgen_core::config::presets::load_balanced();
        let text = generate(&config).text;
        assert!(text.starts_with("upstream api_backends {\n    least_conn;\n"));
        assert!(text.contains(
            "    server 10.0.0.1:8080 weight=3 max_fails=3 fail_timeout=30s;\n    server 10.0.0.2:8080 weight=2"
        ));
        assert!(text.contains("    keepalive 32;\n}"));
        assert!(text.contains("location = /health {"));
    }

    #[test]
    fn test_custom_text_is_reindented() {
        let location = LocationEntry::new(
            "/",
            LocationBody::Custom(CustomLocation {
                directives: "if ($bad) {\nreturn 403;\n}\n  add_header X-A b;".to_string(),
            }),
        );
        let config = NginxConfig {
            locations: vec![location],
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.contains(
            "    location / {\n        if ($bad) {\n            return 403;\n        }\n        add_header X-A b;\n    }"
        ));
    }

    #[test]
    fn test_unbalanced_custom_text_is_skipped() {
        let config = NginxConfig {
            locations: vec![LocationEntry::new(
                "/",
                LocationBody::Custom(CustomLocation {
                    directives: "if ($x) {".to_string(),
                }),
            )],
            ..NginxConfig::default()
        };
        let output = generate(&config);
        let (open, close) = braces(&output.text);
        assert_eq!(open, close);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_static_caching_blocks() {
        let mut caching = StaticCaching::none();
        caching.set_expiry(AssetClass::Fonts, "30d");
        let config = NginxConfig {
            performance: PerformanceSection {
                static_caching: caching,
                ..PerformanceSection::default()
            },
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.contains("location ~* \\.(woff2|woff|ttf|otf|eot)$ {\n        expires 30d;"));
        assert_eq!(text.matches("location ~*").count(), 1);
    }

    #[test]
    fn test_location_paths_with_special_characters_are_quoted() {
        let config = NginxConfig {
            locations: vec![
                LocationEntry::new(
                    "^/api/v[0-9]{2}/",
                    LocationBody::Proxy(ProxyLocation::to("http://127.0.0.1:3000")),
                )
                .with_match_kind(MatchKind::Regex),
                LocationEntry::new(
                    "/old",
                    LocationBody::Redirect(RedirectLocation {
                        target: "/new page".to_string(),
                        code: RedirectCode::Found,
                    }),
                ),
            ],
            ..NginxConfig::default()
        };
        let output = generate(&config);
        assert!(output.text.contains("    location ~ \"^/api/v[0-9]{2}/\" {\n"));
        assert!(output.text.contains("return 302 \"/new page\";"));
        assert!(output.text.contains("    location /old {\n"));
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    }

    #[test]
    fn test_values_that_cannot_be_written_are_skipped() {
        let mut config = NginxConfig::default();
        config.security.headers.content_security_policy = Some(r#"default-src 'self'; x "y""#.to_string());
        config.security.headers.referrer_policy = Some("no-referrer".to_string());
        config.locations = vec![
            LocationEntry::new("/a{", LocationBody::Static(StaticLocation::default())),
            LocationEntry::new("/", LocationBody::Static(StaticLocation::default())),
        ];

        let output = generate(&config);
        assert!(!output.text.contains("Content-Security-Policy"));
        assert!(output.text.contains("add_header Referrer-Policy \"no-referrer\" always;"));
        assert!(!output.text.contains("/a{"));
        assert!(output.text.contains("location / {"));
        assert_eq!(output.warnings.len(), 2, "{:?}", output.warnings);
        let (open, close) = braces(&output.text);
        assert_eq!(open, close);
    }

    #[test]
    fn test_quoted_braces_in_custom_text_are_rejected() {
        let config = NginxConfig {
            locations: vec![LocationEntry::new(
                "/",
                LocationBody::Custom(CustomLocation {
                    directives: "add_header X-Test \"}\";".to_string(),
                }),
            )],
            ..NginxConfig::default()
        };
        let output = generate(&config);
        assert!(!output.text.contains("X-Test"));
        assert_eq!(output.warnings.len(), 1);
        let (open, close) = braces(&output.text);
        assert_eq!(open, close);
    }

    #[test]
    fn test_zone_without_server_wide_limit() {
        let config = NginxConfig {
            security: SecuritySection {
                rate_limit: Some(RateLimit {
                    apply_to_server: false,
                    ..RateLimit::default()
                }),
                ..SecuritySection::default()
            },
            ..NginxConfig::default()
        };
        let text = generate(&config).text;
        assert!(text.starts_with("limit_req_zone $binary_remote_addr zone=req_limit:10m rate=10r/s;\n"));
        assert!(!text.contains("limit_req zone="));
    }

    #[test]
    fn test_balance_helpers() {
        assert!(is_balanced("if ($a) {\n return 403;\n}"));
        assert!(!is_balanced("add_header X \"}\";"));
        assert!(!is_balanced("# }"));
        assert!(is_balanced("^/v[0-9]{2}/"));
        assert!(!is_balanced("}{"));
        assert!(!is_balanced("{"));
        assert_eq!(count_braces("a { b } # }"), (1, 1));
    }
}
