//! The lint rule table

use super::{Category, LintRule};
use crate::validator::Severity;
use ngxgen_core::config::*;

const RECOMMENDED_KEEPALIVE: u32 = 65;
const MAX_KEEPALIVE: u32 = 75;
const HSTS_MIN_AGE: u64 = 86_400;
const HSTS_DEFAULT_AGE: u64 = 31_536_000;
const MIN_WORKER_CONNECTIONS: u32 = 1024;

/// Every rule, in report order
pub static RULES: &[LintRule] = &[
    LintRule {
        id: "security-server-tokens",
        title: "Server tokens exposed",
        message: "The nginx version is visible in error pages and the Server header. Disable server_tokens to hide it.",
        category: Category::Security,
        severity: Severity::Warning,
        test: |c| !c.security.hide_server_tokens,
        fix: Some(fix_server_tokens),
        docs_url: "/docs/lint/security-server-tokens",
    },
    LintRule {
        id: "security-headers-missing",
        title: "Security headers missing",
        message: "X-Frame-Options and X-Content-Type-Options are not sent. Enable the standard security headers.",
        category: Category::Security,
        severity: Severity::Error,
        test: |c| {
            let headers = &c.security.headers;
            headers.frame_options.is_none() || !headers.content_type_options
        },
        fix: Some(fix_security_headers),
        docs_url: "/docs/lint/security-headers-missing",
    },
    LintRule {
        id: "security-tls-missing",
        title: "Served over plain HTTP",
        message: "The site is served over HTTP on port 80. Enable TLS to encrypt traffic.",
        category: Category::Security,
        severity: Severity::Error,
        test: |c| !c.tls.enabled && c.server.listen_port == 80,
        fix: None,
        docs_url: "/docs/lint/security-tls-missing",
    },
    LintRule {
        id: "security-upstream-plaintext",
        title: "Plaintext connection to a remote backend",
        message: "A proxied backend outside this host is reached over http://. Consider TLS between nginx and the backend.",
        category: Category::Security,
        severity: Severity::Info,
        test: has_remote_plaintext_backend,
        fix: None,
        docs_url: "/docs/lint/security-upstream-plaintext",
    },
    LintRule {
        id: "security-hsts-missing",
        title: "HSTS disabled",
        message: "TLS is enabled but Strict-Transport-Security is not sent, so browsers may still downgrade to HTTP.",
        category: Category::Security,
        severity: Severity::Warning,
        test: |c| c.tls.enabled && !c.tls.hsts,
        fix: Some(fix_hsts),
        docs_url: "/docs/lint/security-hsts-missing",
    },
    LintRule {
        id: "security-legacy-tls",
        title: "Deprecated TLS protocols",
        message: "TLSv1 and TLSv1.1 are deprecated. Restrict ssl_protocols to TLSv1.2 and TLSv1.3.",
        category: Category::Security,
        severity: Severity::Warning,
        test: |c| c.tls.enabled && c.tls.protocols.iter().any(|p| p.is_deprecated()),
        fix: Some(fix_legacy_tls),
        docs_url: "/docs/lint/security-legacy-tls",
    },
    LintRule {
        id: "perf-gzip-disabled",
        title: "Gzip compression disabled",
        message: "Responses are sent uncompressed. Enable gzip to reduce transfer size.",
        category: Category::Performance,
        severity: Severity::Warning,
        test: |c| !c.performance.gzip.as_ref().is_some_and(|g| g.enabled),
        fix: Some(fix_gzip),
        docs_url: "/docs/lint/perf-gzip-disabled",
    },
    LintRule {
        id: "perf-http2-disabled",
        title: "HTTP/2 disabled",
        message: "TLS is enabled but HTTP/2 is not. HTTP/2 multiplexes requests over one connection.",
        category: Category::Performance,
        severity: Severity::Info,
        test: |c| c.tls.enabled && !c.performance.http2,
        fix: Some(fix_enable_http2),
        docs_url: "/docs/lint/perf-http2-disabled",
    },
    LintRule {
        id: "perf-static-caching-missing",
        title: "No cache headers for static assets",
        message: "Static files are served without expiry headers. Enable caching for images, stylesheets, scripts and fonts.",
        category: Category::Performance,
        severity: Severity::Info,
        test: |c| serves_static_files(c) && c.performance.static_caching.is_empty(),
        fix: Some(fix_static_caching),
        docs_url: "/docs/lint/perf-static-caching-missing",
    },
    LintRule {
        id: "bp-worker-connections-low",
        title: "Low worker connections",
        message: "worker_connections is below 1024, which limits concurrent clients per worker. 1024 or more is usual in production.",
        category: Category::BestPractice,
        severity: Severity::Warning,
        test: |c| c.performance.worker_connections.is_some_and(|n| n < MIN_WORKER_CONNECTIONS),
        fix: Some(fix_worker_connections),
        docs_url: "/docs/lint/bp-worker-connections-low",
    },
    LintRule {
        id: "bp-keepalive-timeout-high",
        title: "Keep-alive timeout too high",
        message: "keepalive_timeout above 75 seconds holds idle connections open. 65 seconds is a common value.",
        category: Category::BestPractice,
        severity: Severity::Info,
        test: |c| c.performance.keepalive_timeout > MAX_KEEPALIVE,
        fix: Some(fix_keepalive),
        docs_url: "/docs/lint/bp-keepalive-timeout-high",
    },
    LintRule {
        id: "correctness-http2-without-tls",
        title: "HTTP/2 without TLS",
        message: "HTTP/2 is enabled but TLS is not. Browsers only speak HTTP/2 over TLS, so the setting has no effect.",
        category: Category::Correctness,
        severity: Severity::Warning,
        test: |c| c.performance.http2 && !c.tls.enabled,
        fix: Some(fix_disable_http2),
        docs_url: "/docs/lint/correctness-http2-without-tls",
    },
    LintRule {
        id: "correctness-proxy-backend-empty",
        title: "Proxy location without backend",
        message: "A proxy location has no backend address, so nginx will refuse the configuration.",
        category: Category::Correctness,
        severity: Severity::Error,
        test: |c| {
            c.locations
                .iter()
                .filter_map(LocationEntry::proxy)
                .any(|p| p.backend.trim().is_empty())
        },
        fix: None,
        docs_url: "/docs/lint/correctness-proxy-backend-empty",
    },
];

fn is_local_host(address: &str) -> bool {
    let rest = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"))
        .unwrap_or(address);
    let host = if rest.starts_with('[') {
        rest.split(']').next().map(|h| h.trim_start_matches('[')).unwrap_or("")
    } else {
        rest.split(['/', ':']).next().unwrap_or("")
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1") || rest.starts_with("unix:")
}

fn has_remote_plaintext_backend(config: &NginxConfig) -> bool {
    config
        .locations
        .iter()
        .filter_map(LocationEntry::proxy)
        .filter(|p| p.backend.starts_with("http://"))
        .any(|p| match &config.upstream {
            Some(upstream) if upstream.is_referenced_by(&p.backend) => upstream
                .servers
                .iter()
                .any(|s| !is_local_host(&s.address)),
            _ => !is_local_host(&p.backend),
        })
}

fn serves_static_files(config: &NginxConfig) -> bool {
    config.server.root.is_some()
        || config
            .locations
            .iter()
            .any(|l| matches!(l.body, LocationBody::Static(_)))
}

fn security(patch: SecurityPatch) -> ConfigPatch {
    ConfigPatch {
        security: Some(patch),
        ..Default::default()
    }
}

fn performance(patch: PerformancePatch) -> ConfigPatch {
    ConfigPatch {
        performance: Some(patch),
        ..Default::default()
    }
}

fn tls(patch: TlsPatch) -> ConfigPatch {
    ConfigPatch {
        tls: Some(patch),
        ..Default::default()
    }
}

fn fix_server_tokens(_: &NginxConfig) -> ConfigPatch {
    security(SecurityPatch {
        hide_server_tokens: Some(true),
        ..Default::default()
    })
}

fn fix_security_headers(config: &NginxConfig) -> ConfigPatch {
    let current = &config.security.headers;
    security(SecurityPatch {
        headers: Some(SecurityHeadersPatch {
            frame_options: Some(Some(current.frame_options.unwrap_or(FrameOptions::SameOrigin))),
            content_type_options: Some(true),
            referrer_policy: current
                .referrer_policy
                .is_none()
                .then(|| Some("strict-origin-when-cross-origin".to_string())),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn fix_hsts(config: &NginxConfig) -> ConfigPatch {
    tls(TlsPatch {
        hsts: Some(true),
        hsts_max_age: (config.tls.hsts_max_age < HSTS_MIN_AGE).then_some(HSTS_DEFAULT_AGE),
        ..Default::default()
    })
}

fn fix_legacy_tls(_: &NginxConfig) -> ConfigPatch {
    tls(TlsPatch {
        protocols: Some(vec![TlsProtocol::TlsV1_2, TlsProtocol::TlsV1_3]),
        ..Default::default()
    })
}

fn fix_gzip(_: &NginxConfig) -> ConfigPatch {
    performance(PerformancePatch {
        gzip: Some(Some(GzipPatch {
            enabled: Some(true),
            ..Default::default()
        })),
        ..Default::default()
    })
}

fn fix_enable_http2(_: &NginxConfig) -> ConfigPatch {
    performance(PerformancePatch {
        http2: Some(true),
        ..Default::default()
    })
}

fn fix_disable_http2(_: &NginxConfig) -> ConfigPatch {
    performance(PerformancePatch {
        http2: Some(false),
        ..Default::default()
    })
}

fn fix_static_caching(_: &NginxConfig) -> ConfigPatch {
    let defaults = StaticCaching::default();
    performance(PerformancePatch {
        static_caching: Some(Some(StaticCachingPatch {
            images: Some(defaults.images),
            css: Some(defaults.css),
            js: Some(defaults.js),
            fonts: Some(defaults.fonts),
        })),
        ..Default::default()
    })
}

fn fix_worker_connections(_: &NginxConfig) -> ConfigPatch {
    performance(PerformancePatch {
        worker_connections: Some(Some(MIN_WORKER_CONNECTIONS)),
        ..Default::default()
    })
}

fn fix_keepalive(_: &NginxConfig) -> ConfigPatch {
    performance(PerformancePatch {
        keepalive_timeout: Some(RECOMMENDED_KEEPALIVE),
        ..Default::default()
    })
}
