//! End-to-end properties of the engine over whole models

use ngxgen_config::{generate, lint, parse, validate, Severity};
use ngxgen_core::config::presets;
use ngxgen_core::config::*;

/// Raw `{` minus `}` over the whole text, quotes and comments included
fn brace_balance(text: &str) -> i64 {
    let mut depth = 0i64;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        assert!(depth >= 0, "closing brace before its opener in:\n{text}");
    }
    depth
}

fn location_header(location: &LocationEntry) -> String {
    match location.match_kind.qualifier() {
        Some(q) => format!("location {} {} {{", q, location.path),
        None => format!("location {} {{", location.path),
    }
}

fn all_models() -> Vec<NginxConfig> {
    let mut models: Vec<NginxConfig> = presets::all().into_iter().map(|p| p.config).collect();
    models.push(NginxConfig::default());

    let mut mixed = NginxConfig::default();
    mixed.locations = vec![
        LocationEntry::new("/", LocationBody::Static(StaticLocation::default())),
        LocationEntry::new("/old", LocationBody::Redirect(RedirectLocation {
            target: "/new".to_string(),
            code: RedirectCode::MovedPermanently,
        }))
        .with_match_kind(MatchKind::Exact),
        LocationEntry::new(
            "/broken",
            LocationBody::Custom(CustomLocation {
                directives: "if ($x) {\nreturn 403;".to_string(),
            }),
        ),
        LocationEntry::new(
            "/quoted",
            LocationBody::Custom(CustomLocation {
                directives: "add_header X-Test \"}\";".to_string(),
            }),
        ),
        LocationEntry::new(
            "/nested",
            LocationBody::Custom(CustomLocation {
                directives: "if ($request_method = POST) {\nreturn 405;\n}".to_string(),
            }),
        ),
    ];
    models.push(mixed);
    models
}

#[test]
fn generated_text_is_balanced_with_one_header_per_location() {
    for model in all_models() {
        let text = generate(&model).text;
        assert_eq!(brace_balance(&text), 0, "unbalanced output:\n{text}");

        for location in &model.locations {
            let header = location_header(location);
            let count = text.lines().filter(|l| l.trim() == header).count();
            assert_eq!(count, 1, "{header} appears {count} times in:\n{text}");
        }
    }
}

#[test]
fn unbalanced_custom_text_is_reported() {
    let model = all_models().pop().unwrap();
    let output = generate(&model);
    assert!(output.warnings.iter().any(|w| w.contains("/broken")));
    assert!(output.warnings.iter().any(|w| w.contains("/quoted")));
    assert!(!output.text.contains("return 403;"));
    assert!(!output.text.contains("X-Test"));
    assert!(output.text.contains("return 405;"));
}

#[test]
fn tls_redirect_emits_both_servers() {
    let mut model = NginxConfig::default();
    model.server.listen_port = 443;
    model.tls.enabled = true;
    model.tls.http_redirect = true;
    model.tls.cert_path = "/etc/ssl/site.crt".to_string();
    model.tls.key_path = "/etc/ssl/site.key".to_string();

    let text = generate(&model).text;
    assert!(text.contains("listen 80;"));
    assert!(text.contains("return 301 https://$host$request_uri;"));
    assert!(text.contains("listen 443 ssl;"));
    assert!(text.contains("ssl_certificate /etc/ssl/site.crt;"));

    let redirect_at = text.find("return 301").unwrap();
    let tls_listen_at = text.find("listen 443 ssl;").unwrap();
    assert!(redirect_at < tls_listen_at);
}

#[test]
fn upstream_servers_keep_their_order_and_attributes() {
    let mut model = presets::find("load_balanced").unwrap().config;
    if let Some(upstream) = model.upstream.as_mut() {
        upstream.servers.push(UpstreamServer {
            backup: true,
            ..UpstreamServer::new("10.0.0.9:8080")
        });
    }

    let text = generate(&model).text;
    assert!(text.contains("upstream api_backends {"));
    assert!(text.contains("proxy_pass http://api_backends;"));

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("server ") && l.contains(':'))
        .collect();
    assert_eq!(
        lines,
        vec![
            "server 10.0.0.1:8080 weight=3 max_fails=3 fail_timeout=30s;",
            "server 10.0.0.2:8080 weight=2 max_fails=3 fail_timeout=30s;",
            "server 10.0.0.3:8080 weight=1 max_fails=3 fail_timeout=30s;",
            "server 10.0.0.9:8080 backup;",
        ]
    );
}

#[test]
fn static_caching_survives_a_round_trip() {
    let mut partial = StaticCaching::none();
    partial.set_expiry(AssetClass::Images, "90d");
    partial.set_expiry(AssetClass::Fonts, "1y");

    for caching in [StaticCaching::default(), partial, StaticCaching::none()] {
        let mut model = presets::find("static_site").unwrap().config;
        model.performance.static_caching = caching.clone();

        let first = parse(&generate(&model).text);
        assert!(first.parse_errors.is_empty(), "{:?}", first.parse_errors);
        assert_eq!(first.config.performance.static_caching, caching);
        assert_eq!(first.config.locations.len(), model.locations.len());

        let second = parse(&generate(&first.config).text);
        assert_eq!(second.config.performance.static_caching, caching);
        assert_eq!(second.config.locations, first.config.locations);
    }
}

#[test]
fn regex_location_with_repetition_survives_a_round_trip() {
    let mut model = NginxConfig::default();
    model.locations = vec![
        LocationEntry::new(
            "^/api/v[0-9]{2}/",
            LocationBody::Proxy(ProxyLocation::to("http://127.0.0.1:3000")),
        )
        .with_match_kind(MatchKind::Regex),
        LocationEntry::new("/", LocationBody::Static(StaticLocation::default())),
    ];

    let text = generate(&model).text;
    assert_eq!(brace_balance(&text), 0, "unbalanced output:\n{text}");

    let imported = parse(&text);
    assert!(imported.parse_errors.is_empty(), "{:?}", imported.parse_errors);
    let location = &imported.config.locations[0];
    assert_eq!(location.path, "^/api/v[0-9]{2}/");
    assert_eq!(location.match_kind, MatchKind::Regex);
    assert_eq!(location.proxy().map(|p| p.backend.as_str()), Some("http://127.0.0.1:3000"));
    assert!(generate(&imported.config).text.contains("location ~ \"^/api/v[0-9]{2}/\" {"));
}

#[test]
fn location_level_rate_limit_stays_in_its_location() {
    let source = r#"
limit_req_zone $binary_remote_addr zone=api:10m rate=5r/s;
server {
    listen 80;
    server_name api.example.com;
    location /api {
        limit_req zone=api burst=5;
        proxy_pass http://127.0.0.1:3000;
    }
}
"#;
    let first = parse(source);
    assert!(first.parse_errors.is_empty(), "{:?}", first.parse_errors);
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);

    let text = generate(&first.config).text;
    assert!(text.contains("limit_req_zone $binary_remote_addr zone=api:10m rate=5r/s;"));
    assert_eq!(text.matches("limit_req zone=").count(), 1, "{text}");
    assert!(text.contains("        limit_req zone=api burst=5;"));

    let second = parse(&text);
    assert_eq!(second.config.security.rate_limit, first.config.security.rate_limit);
    assert_eq!(second.config.locations, first.config.locations);
}

#[test]
fn presets_round_trip_without_parse_errors() {
    for preset in presets::all() {
        let text = generate(&preset.config).text;
        let imported = parse(&text);
        assert!(imported.parse_errors.is_empty(), "{}: {:?}", preset.id, imported.parse_errors);
        assert_eq!(imported.config.server.server_names, preset.config.server.server_names);
        assert_eq!(imported.config.tls.enabled, preset.config.tls.enabled);
        assert_eq!(imported.config.locations.len(), preset.config.locations.len(), "{}", preset.id);
        assert_eq!(generate(&imported.config).text, text, "{} is not stable", preset.id);
    }
}

#[test]
fn presets_have_no_validation_errors() {
    for preset in presets::all() {
        let errors: Vec<_> = validate(&preset.config)
            .into_iter()
            .filter(|w| w.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "{}: {:?}", preset.id, errors);
    }
}

#[test]
fn lint_score_is_bounded_and_monotone() {
    let mut model = presets::find("reverse_proxy").unwrap().config;
    let mut previous = lint(&model);
    assert!(previous.score <= 100);

    let degradations: [fn(&mut NginxConfig); 9] = [
        |m| m.security.hide_server_tokens = false,
        |m| m.tls.hsts = false,
        |m| m.performance.gzip = None,
        |m| m.performance.keepalive_timeout = 300,
        |m| m.tls.protocols.insert(0, TlsProtocol::TlsV1_1),
        |m| m.security.headers = SecurityHeaders::default(),
        |m| m.performance.http2 = false,
        |m| {
            m.locations.push(LocationEntry::new(
                "/remote",
                LocationBody::Proxy(ProxyLocation::to("http://203.0.113.10")),
            ))
        },
        |m| {
            m.locations
                .push(LocationEntry::new("/empty", LocationBody::Proxy(ProxyLocation::to(""))))
        },
    ];

    for degrade in degradations {
        degrade(&mut model);
        let report = lint(&model);
        assert!(report.score <= previous.score);
        assert!(report.results.len() >= previous.results.len());
        previous = report;
    }
    assert!(!previous.valid);
}

#[test]
fn server_name_and_listen_scenario() {
    let model = NginxConfig {
        server: ServerSection {
            server_names: vec!["example.com".to_string()],
            listen_port: 80,
            listen_ipv6: true,
            ..ServerSection::default()
        },
        ..NginxConfig::default()
    };
    let text = generate(&model).text;
    assert!(text.contains("server_name example.com;"));
    assert!(text.contains("listen 80;"));
    assert!(text.contains("listen [::]:80;"));
}

#[test]
fn gzip_scenario() {
    let mut model = NginxConfig::default();
    model.performance.gzip = Some(GzipSettings {
        enabled: true,
        level: 6,
        types: vec!["text/plain".to_string(), "text/css".to_string()],
        ..GzipSettings::default()
    });
    let text = generate(&model).text;
    assert!(text.contains("gzip on;"));
    assert!(text.contains("gzip_comp_level 6;"));
    assert!(text.contains("gzip_types text/plain text/css;"));
}

#[test]
fn websocket_scenario() {
    let mut proxy = ProxyLocation::to("http://127.0.0.1:3000");
    proxy.websocket = true;
    let model = NginxConfig {
        locations: vec![LocationEntry::new("/ws", LocationBody::Proxy(proxy))],
        ..NginxConfig::default()
    };
    let text = generate(&model).text;
    assert!(text.contains("proxy_set_header Upgrade $http_upgrade;"));
    assert!(text.contains("proxy_set_header Connection \"upgrade\";"));
}

#[test]
fn rate_limit_scenario() {
    let mut model = NginxConfig::default();
    model.security.rate_limit = Some(RateLimit {
        zone: None,
        requests_per_second: 10,
        burst: 20,
        nodelay: true,
        apply_to_server: true,
    });
    let text = generate(&model).text;
    assert!(text.contains("limit_req_zone $binary_remote_addr zone=req_limit:10m rate=10r/s;"));
    assert!(text.contains("limit_req zone=req_limit burst=20 nodelay;"));

    let zone_at = text.find("limit_req_zone").unwrap();
    let server_at = text.find("server {").unwrap();
    assert!(zone_at < server_at);
}
