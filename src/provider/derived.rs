//! Derived configuration builders.
//!
//! Assemble structured settings from well-known key layouts. Each builder
//! reads a single snapshot, so a reload landing midway cannot mix fields
//! from two configurations.

use std::str::FromStr;
use std::time::Duration;

use http::{HeaderName, Method};
use regex::Regex;
use url::Url;

use super::Provider;
use crate::defaults::{JAEGER_PROPAGATION_ENV, TRACING_SAMPLER_TYPE, TRACING_SAMPLER_VALUE};
use crate::layer::EnvSource;
use crate::snapshot::Snapshot;

/// Cross-origin resource sharing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Allowed origins; `*` allows all, and one `*` inside an entry is a
    /// wildcard (`https://*.example.com`).
    pub allowed_origins: Vec<String>,
    /// Allowed request methods.
    pub allowed_methods: Vec<Method>,
    /// Allowed request headers.
    pub allowed_headers: Vec<HeaderName>,
    /// Headers exposed to the client.
    pub exposed_headers: Vec<HeaderName>,
    /// Whether credentials are allowed.
    pub allow_credentials: bool,
    /// Whether preflight requests are passed to the next handler.
    pub options_passthrough: bool,
    /// How long preflight results may be cached.
    pub max_age: Duration,
    /// Whether CORS decisions are logged.
    pub debug: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![Method::GET, Method::POST, Method::HEAD],
            allowed_headers: vec![
                http::header::ORIGIN,
                http::header::ACCEPT,
                http::header::CONTENT_TYPE,
                HeaderName::from_static("x-requested-with"),
            ],
            exposed_headers: Vec::new(),
            allow_credentials: false,
            options_passthrough: false,
            max_age: Duration::ZERO,
            debug: false,
        }
    }
}

impl CorsPolicy {
    /// Builds the policy from `<prefix>.cors.*` in `snapshot`.
    ///
    /// Each field falls back to `defaults`. The second element is
    /// `<prefix>.cors.enabled`. Methods and headers that do not parse are
    /// skipped with a warning.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot, prefix: &str, defaults: Self) -> (Self, bool) {
        let prefix = prefix.trim_end_matches('.');
        let key = |name: &str| {
            if prefix.is_empty() {
                format!("cors.{name}")
            } else {
                format!("{prefix}.cors.{name}")
            }
        };

        let max_age = u64::try_from(snapshot.int_f(&key("max_age"), -1))
            .map_or(defaults.max_age, Duration::from_secs);

        let policy = Self {
            allowed_origins: snapshot.strings_f(&key("allowed_origins"), defaults.allowed_origins),
            allowed_methods: typed_list(snapshot, &key("allowed_methods"), defaults.allowed_methods),
            allowed_headers: typed_list(snapshot, &key("allowed_headers"), defaults.allowed_headers),
            exposed_headers: typed_list(snapshot, &key("exposed_headers"), defaults.exposed_headers),
            allow_credentials: snapshot
                .bool_f(&key("allow_credentials"), defaults.allow_credentials),
            options_passthrough: snapshot
                .bool_f(&key("options_passthrough"), defaults.options_passthrough),
            max_age,
            debug: snapshot.bool_f(&key("debug"), defaults.debug),
        };
        (policy, snapshot.bool(&key("enabled")))
    }

    /// Returns true if `origin` matches an allowed origin.
    ///
    /// Comparison is case-insensitive.
    #[must_use]
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.to_ascii_lowercase();
        self.allowed_origins.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            if allowed == "*" || allowed == origin {
                return true;
            }
            origin_pattern(&allowed).is_some_and(|re| re.is_match(&origin))
        })
    }
}

/// Compiles an origin with exactly one `*` into an anchored regex.
fn origin_pattern(allowed: &str) -> Option<Regex> {
    let (prefix, suffix) = allowed.split_once('*')?;
    if suffix.contains('*') {
        return None;
    }
    Regex::new(&format!(
        "^{}.+{}$",
        regex::escape(prefix),
        regex::escape(suffix)
    ))
    .ok()
}

/// Distributed tracing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    /// Name reported for this service.
    pub service_name: String,
    /// Selected provider (`jaeger`, `zipkin`, or empty for none).
    pub provider: String,
    /// Jaeger settings.
    pub jaeger: JaegerConfig,
    /// Zipkin settings.
    pub zipkin: ZipkinConfig,
}

impl TracingConfig {
    /// Builds the tracing settings from `tracing.*` in `snapshot`.
    ///
    /// A non-empty `JAEGER_PROPAGATION` in `env` overrides the configured
    /// propagation.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot, service_name: &str, env: &dyn EnvSource) -> Self {
        let propagation = env
            .var(JAEGER_PROPAGATION_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| snapshot.string("tracing.providers.jaeger.propagation"));

        Self {
            service_name: snapshot.string_f("tracing.service_name", service_name),
            provider: snapshot.string("tracing.provider"),
            jaeger: JaegerConfig {
                local_agent_address: snapshot
                    .string("tracing.providers.jaeger.local_agent_address"),
                sampler_type: snapshot
                    .string_f("tracing.providers.jaeger.sampling.type", TRACING_SAMPLER_TYPE),
                sampler_value: snapshot
                    .float64_f("tracing.providers.jaeger.sampling.value", TRACING_SAMPLER_VALUE),
                sampler_server_url: snapshot
                    .string("tracing.providers.jaeger.sampling.server_url"),
                propagation,
            },
            zipkin: ZipkinConfig {
                server_url: snapshot.string("tracing.providers.zipkin.server_url"),
            },
        }
    }
}

/// Jaeger exporter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct JaegerConfig {
    /// `host:port` of the local agent.
    pub local_agent_address: String,
    /// Sampler type.
    pub sampler_type: String,
    /// Sampler parameter.
    pub sampler_value: f64,
    /// Remote sampling server.
    pub sampler_server_url: String,
    /// Propagation format.
    pub propagation: String,
}

/// Zipkin exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipkinConfig {
    /// Collector URL.
    pub server_url: String,
}

impl Provider {
    /// Builds the CORS policy from `<prefix>.cors.*` in the live snapshot.
    ///
    /// See [`CorsPolicy::from_snapshot`].
    #[must_use]
    pub fn cors(&self, prefix: &str, defaults: CorsPolicy) -> (CorsPolicy, bool) {
        CorsPolicy::from_snapshot(&self.snapshot(), prefix, defaults)
    }

    /// Builds the tracing settings from `tracing.*` in the live snapshot.
    ///
    /// See [`TracingConfig::from_snapshot`].
    #[must_use]
    pub fn tracing_config(&self, service_name: &str) -> TracingConfig {
        TracingConfig::from_snapshot(
            &self.snapshot(),
            service_name,
            self.context.pipeline.env(),
        )
    }

    /// Parses `key` as a URL, or returns `fallback`.
    #[must_use]
    pub fn uri_f(&self, key: &str, fallback: Url) -> Url {
        self.snapshot()
            .get(key)
            .and_then(|raw| Url::parse(&raw.to_string()).ok())
            .unwrap_or(fallback)
    }

    /// Parses `key` as an absolute request URL with a host, or returns
    /// `fallback`.
    #[must_use]
    pub fn request_uri_f(&self, key: &str, fallback: Url) -> Url {
        self.snapshot()
            .get(key)
            .and_then(|raw| Url::parse(&raw.to_string()).ok())
            .filter(|url| !url.cannot_be_a_base() && url.has_host())
            .unwrap_or(fallback)
    }
}

fn typed_list<T: FromStr>(snapshot: &Snapshot, key: &str, fallback: Vec<T>) -> Vec<T> {
    if !snapshot.exists(key) {
        return fallback;
    }
    snapshot
        .strings(key)
        .into_iter()
        .filter_map(|raw| {
            let parsed = raw.trim().parse::<T>().ok();
            if parsed.is_none() {
                tracing::warn!(key, value = %raw, "Ignoring invalid CORS entry");
            }
            parsed
        })
        .collect()
}
