use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;

use crate::{drawer::DrawerSelectors, placement::PlacementMetrics};

pub const DEFAULT_CONFIG_FILE: &str = "tour.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Viewports at or below this width use the mobile layout.
    pub breakpoint_px: f64,
    pub settle_delay: Duration,
    pub menu_retry_delay: Duration,
    pub scroll_settle_delay: Duration,
    pub welcome_delay: Duration,
    pub completion_message_duration: Duration,
    pub placement: PlacementMetrics,
    pub drawer: DrawerSelectors,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            breakpoint_px: 900.0,
            settle_delay: Duration::from_millis(300),
            menu_retry_delay: Duration::from_millis(500),
            scroll_settle_delay: Duration::from_millis(400),
            welcome_delay: Duration::from_millis(500),
            completion_message_duration: Duration::from_millis(2500),
            placement: PlacementMetrics::default(),
            drawer: DrawerSelectors::default(),
            database_url: "sqlite://./data/tour.db".into(),
        }
    }
}

impl Settings {
    /// Same settings with every wait removed, for scripted runs.
    pub fn without_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.menu_retry_delay = Duration::ZERO;
        self.scroll_settle_delay = Duration::ZERO;
        self.welcome_delay = Duration::ZERO;
        self.completion_message_duration = Duration::ZERO;
        self
    }
}

/// Defaults, then `tour.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE)).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable tour config");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        settings
    })
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(&raw)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        let file_cfg = file_cfg
            .into_iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|value| (key, value)))
            .collect();
        apply_overrides(&mut settings, &file_cfg);
    }

    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn scalar_to_string(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    let mut overrides = HashMap::new();
    for (env_key, key) in [
        ("APP__BREAKPOINT_PX", "breakpoint_px"),
        ("APP__SETTLE_DELAY_MS", "settle_delay_ms"),
        ("APP__MENU_RETRY_DELAY_MS", "menu_retry_delay_ms"),
        ("APP__SCROLL_SETTLE_MS", "scroll_settle_ms"),
        ("APP__WELCOME_DELAY_MS", "welcome_delay_ms"),
        ("APP__COMPLETION_MESSAGE_MS", "completion_message_ms"),
        ("TOUR_DATABASE_URL", "database_url"),
        ("APP__DATABASE_URL", "database_url"),
    ] {
        if let Ok(v) = std::env::var(env_key) {
            overrides.insert(key.to_string(), v);
        }
    }
    apply_overrides(settings, &overrides);
}

/// Applies flat `key = value` overrides. Unknown keys and unparsable values
/// are ignored.
pub fn apply_overrides(settings: &mut Settings, overrides: &HashMap<String, String>) {
    let millis = |key: &str| {
        overrides
            .get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
    };
    let float = |key: &str| overrides.get(key).and_then(|v| v.trim().parse::<f64>().ok());

    if let Some(v) = float("breakpoint_px") {
        settings.breakpoint_px = v;
    }
    if let Some(v) = millis("settle_delay_ms") {
        settings.settle_delay = v;
    }
    if let Some(v) = millis("menu_retry_delay_ms") {
        settings.menu_retry_delay = v;
    }
    if let Some(v) = millis("scroll_settle_ms") {
        settings.scroll_settle_delay = v;
    }
    if let Some(v) = millis("welcome_delay_ms") {
        settings.welcome_delay = v;
    }
    if let Some(v) = millis("completion_message_ms") {
        settings.completion_message_duration = v;
    }
    if let Some(v) = float("tooltip_padding") {
        settings.placement.padding = v;
    }
    if let Some(v) = float("safe_margin") {
        settings.placement.safe_margin = v;
    }
    if let Some(v) = float("mobile_bottom_reserve") {
        settings.placement.mobile_bottom_reserve = v;
    }
    if let Some(v) = overrides.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = overrides.get("drawer_panel") {
        settings.drawer.panel = v.as_str().into();
    }
    if let Some(v) = overrides.get("drawer_open_control") {
        settings.drawer.open_control = v.as_str().into();
    }
    if let Some(v) = overrides.get("drawer_close_control") {
        settings.drawer.close_control = v.as_str().into();
    }
    if let Some(v) = overrides.get("drawer_overlay") {
        settings.drawer.overlay = v.as_str().into();
    }
}
