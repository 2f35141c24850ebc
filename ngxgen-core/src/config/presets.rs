//! Ready-made site configurations

use super::types::*;

/// A named, described preset model
#[derive(Debug, Clone)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub config: NginxConfig,
}

/// All shipped presets, in display order
pub fn all() -> Vec<Preset> {
    vec![
        Preset {
            id: "static_site",
            name: "Simple Static Site",
            description: "Static HTML/CSS file serving with caching and gzip",
            config: static_site(),
        },
        Preset {
            id: "reverse_proxy",
            name: "Reverse Proxy",
            description: "TLS-terminated proxy to a Node.js/Python/Go backend",
            config: reverse_proxy(),
        },
        Preset {
            id: "wordpress",
            name: "WordPress",
            description: "PHP-FPM + WordPress with upload limits and hardening",
            config: wordpress(),
        },
        Preset {
            id: "spa",
            name: "SPA (React/Vue/Angular)",
            description: "Single-page app with history fallback and API proxy",
            config: spa(),
        },
        Preset {
            id: "load_balanced",
            name: "Load Balanced API",
            description: "Upstream load balancing with rate limiting",
            config: load_balanced(),
        },
    ]
}

/// Look a preset up by id
pub fn find(id: &str) -> Option<Preset> {
    all().into_iter().find(|preset| preset.id == id)
}

fn hardened_security() -> SecuritySection {
    SecuritySection {
        hide_server_tokens: true,
        headers: SecurityHeaders {
            frame_options: Some(FrameOptions::SameOrigin),
            content_type_options: true,
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            content_security_policy: None,
            permissions_policy: None,
        },
        ..SecuritySection::default()
    }
}

fn letsencrypt(domain: &str) -> TlsSection {
    TlsSection {
        enabled: true,
        cert_path: format!("/etc/letsencrypt/live/{}/fullchain.pem", domain),
        key_path: format!("/etc/letsencrypt/live/{}/privkey.pem", domain),
        http_redirect: true,
        hsts: true,
        ocsp_stapling: true,
        dh_param_path: Some("/etc/nginx/dhparam.pem".to_string()),
        ..TlsSection::default()
    }
}

fn server(domain: &str, root: Option<&str>, index: &[&str]) -> ServerSection {
    ServerSection {
        server_names: vec![domain.to_string()],
        listen_port: 443,
        listen_ipv6: true,
        root: root.map(str::to_string),
        index: index.iter().map(|s| s.to_string()).collect(),
    }
}

fn static_root(root: &str, try_files: &str) -> LocationBody {
    LocationBody::Static(StaticLocation {
        root: root.to_string(),
        try_files: Some(try_files.to_string()),
        ..StaticLocation::default()
    })
}

pub fn static_site() -> NginxConfig {
    NginxConfig {
        server: ServerSection {
            server_names: vec!["example.com".to_string(), "www.example.com".to_string()],
            ..ServerSection::default()
        },
        locations: vec![LocationEntry::new(
            "/",
            static_root("/var/www/html", "$uri $uri/ =404"),
        )],
        security: hardened_security(),
        performance: PerformanceSection {
            gzip: Some(GzipSettings::default()),
            worker_connections: Some(1024),
            static_caching: StaticCaching::default(),
            ..PerformanceSection::default()
        },
        ..NginxConfig::default()
    }
}

pub fn reverse_proxy() -> NginxConfig {
    let mut proxy = ProxyLocation::to("http://127.0.0.1:3000");
    proxy.websocket = true;

    NginxConfig {
        server: server("app.example.com", None, &[]),
        tls: letsencrypt("app.example.com"),
        locations: vec![LocationEntry::new("/", LocationBody::Proxy(proxy))],
        security: hardened_security(),
        performance: PerformanceSection {
            gzip: Some(GzipSettings::default()),
            worker_connections: Some(1024),
            http2: true,
            ..PerformanceSection::default()
        },
        ..NginxConfig::default()
    }
}

pub fn wordpress() -> NginxConfig {
    let php = [
        "fastcgi_pass unix:/var/run/php/php-fpm.sock;",
        "fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;",
        "include fastcgi_params;",
        "fastcgi_intercept_errors on;",
        "fastcgi_buffer_size 128k;",
        "fastcgi_buffers 4 256k;",
    ]
    .join("\n");

    NginxConfig {
        server: server(
            "blog.example.com",
            Some("/var/www/wordpress"),
            &["index.php", "index.html", "index.htm"],
        ),
        tls: letsencrypt("blog.example.com"),
        locations: vec![
            LocationEntry::new("/", static_root("/var/www/wordpress", "$uri $uri/ /index.php?$args")),
            LocationEntry::new(r"\.php$", LocationBody::Custom(CustomLocation { directives: php }))
                .with_match_kind(MatchKind::Regex),
            LocationEntry::new(
                r"/\.ht",
                LocationBody::Custom(CustomLocation {
                    directives: "deny all;".to_string(),
                }),
            )
            .with_match_kind(MatchKind::Regex),
        ],
        security: hardened_security(),
        performance: PerformanceSection {
            gzip: Some(GzipSettings::default()),
            worker_connections: Some(1024),
            http2: true,
            client_max_body_size: BodySize::megabytes(64),
            static_caching: StaticCaching::default(),
            ..PerformanceSection::default()
        },
        ..NginxConfig::default()
    }
}

pub fn spa() -> NginxConfig {
    NginxConfig {
        server: server("app.example.com", Some("/var/www/app/dist"), &["index.html"]),
        tls: letsencrypt("app.example.com"),
        locations: vec![
            LocationEntry::new("/", static_root("/var/www/app/dist", "$uri $uri/ /index.html")),
            LocationEntry::new("/api", LocationBody::Proxy(ProxyLocation::to("http://127.0.0.1:3000"))),
        ],
        security: hardened_security(),
        performance: PerformanceSection {
            gzip: Some(GzipSettings::default()),
            worker_connections: Some(1024),
            http2: true,
            static_caching: StaticCaching::default(),
            ..PerformanceSection::default()
        },
        ..NginxConfig::default()
    }
}

pub fn load_balanced() -> NginxConfig {
    let upstream = UpstreamSection {
        name: "api_backends".to_string(),
        servers: vec![
            UpstreamServer {
                max_fails: Some(3),
                fail_timeout: Some(30),
                ..UpstreamServer::new("10.0.0.1:8080").with_weight(3)
            },
            UpstreamServer {
                max_fails: Some(3),
                fail_timeout: Some(30),
                ..UpstreamServer::new("10.0.0.2:8080").with_weight(2)
            },
            UpstreamServer {
                max_fails: Some(3),
                fail_timeout: Some(30),
                ..UpstreamServer::new("10.0.0.3:8080").with_weight(1)
            },
        ],
        method: LoadBalancing::LeastConn,
        keepalive: Some(32),
    };
    let backend = upstream.proxy_address();

    NginxConfig {
        server: server("api.example.com", None, &[]),
        tls: letsencrypt("api.example.com"),
        locations: vec![
            LocationEntry::new("/", LocationBody::Proxy(ProxyLocation::to(backend.clone()))),
            LocationEntry::new("/health", LocationBody::Proxy(ProxyLocation::to(backend)))
                .with_match_kind(MatchKind::Exact),
        ],
        security: SecuritySection {
            rate_limit: Some(RateLimit::default()),
            ..hardened_security()
        },
        performance: PerformanceSection {
            gzip: Some(GzipSettings::default()),
            worker_connections: Some(1024),
            http2: true,
            ..PerformanceSection::default()
        },
        upstream: Some(upstream),
        ..NginxConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_ids_are_unique() {
        let presets = all();
        assert_eq!(presets.len(), 5);
        for preset in &presets {
            assert_eq!(presets.iter().filter(|p| p.id == preset.id).count(), 1);
            assert!(!preset.name.is_empty());
            assert!(!preset.description.is_empty());
        }
    }

    #[test]
    fn test_find() {
        assert!(find("wordpress").is_some());
        assert!(find("nope").is_none());
    }

    #[test]
    fn test_load_balanced_proxies_reference_upstream() {
        let config = load_balanced();
        let upstream = config.upstream.as_ref().unwrap();
        assert!(config
            .locations
            .iter()
            .filter_map(|loc| loc.proxy())
            .all(|proxy| upstream.is_referenced_by(&proxy.backend)));
    }
}
