use uuid::Uuid;

const DEFAULT_TWIN_CACHE_TTL_SECONDS: u64 = 30 * 60;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_uuid(name: &str) -> Option<Uuid> {
    let value = env_string(name)?;
    match Uuid::parse_str(&value) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(var = name, error = %err, "ignoring malformed uuid in environment");
            None
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_string(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_string(name).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

#[derive(Debug, Clone)]
pub struct InsightConfig {
    /// Source id of the privileged automation app (the rules engine). Status
    /// changes from this source bypass table validation.
    pub automation_app_id: Option<Uuid>,
    pub automation_app_name: String,
    /// Optional mapped-integration app identity, used only for source
    /// naming.
    pub mapped_app_id: Option<Uuid>,
    pub mapped_app_name: String,
    /// Rule override applied to inspection-sourced alert insights.
    pub inspection_rule_id: Option<String>,
    pub inspection_rule_name: Option<String>,
    pub notifications_enabled: bool,
    pub twin_cache_ttl_seconds: u64,
}

impl InsightConfig {
    pub fn from_env() -> Self {
        Self {
            automation_app_id: env_uuid("INSIGHT_AUTOMATION_APP_ID"),
            automation_app_name: env_string("INSIGHT_AUTOMATION_APP_NAME")
                .unwrap_or_else(|| "Automation".to_string()),
            mapped_app_id: env_uuid("INSIGHT_MAPPED_APP_ID"),
            mapped_app_name: env_string("INSIGHT_MAPPED_APP_NAME")
                .unwrap_or_else(|| "Mapped".to_string()),
            inspection_rule_id: env_string("INSIGHT_INSPECTION_RULE_ID"),
            inspection_rule_name: env_string("INSIGHT_INSPECTION_RULE_NAME"),
            notifications_enabled: env_bool("INSIGHT_NOTIFICATIONS_ENABLED", true),
            twin_cache_ttl_seconds: env_u64(
                "INSIGHT_TWIN_CACHE_TTL_SECONDS",
                DEFAULT_TWIN_CACHE_TTL_SECONDS,
            ),
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            automation_app_id: None,
            automation_app_name: "Automation".to_string(),
            mapped_app_id: None,
            mapped_app_name: "Mapped".to_string(),
            inspection_rule_id: None,
            inspection_rule_name: None,
            notifications_enabled: true,
            twin_cache_ttl_seconds: DEFAULT_TWIN_CACHE_TTL_SECONDS,
        }
    }
}

/// Install the tracing subscriber for a host binary. Respects `RUST_LOG`,
/// defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
