use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use controller::{InputMode, LoopConfig};
use gesture::GestureConfig;
use link::{LinkConfig, RfcommTransport, TcpTransport, Transport};
use serde::Deserialize;
use shared::domain::ScreenSize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "wearable.toml";
const ENV_PREFIX: &str = "APP__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Rfcomm,
}

impl TransportKind {
    pub fn default_addr(self) -> &'static str {
        match self {
            TransportKind::Tcp => "127.0.0.1:7878",
            TransportKind::Rfcomm => "/dev/rfcomm0",
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "rfcomm" => Ok(TransportKind::Rfcomm),
            other => Err(format!("unknown transport `{other}`")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Rfcomm => "rfcomm",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub screen_width: u32,
    pub screen_height: u32,
    pub transport: TransportKind,
    /// Falls back to the transport's usual address when unset.
    pub transport_addr: Option<String>,
    pub reconnect_backoff_ms: u64,
    pub tick_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub debounce_ms: u64,
    pub flex_threshold: f32,
    pub tracker_command: String,
    pub splash_step_ms: u64,
    pub panel_hold_ms: u64,
    pub queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            screen_width: 128,
            screen_height: 64,
            transport: TransportKind::Tcp,
            transport_addr: None,
            reconnect_backoff_ms: 2000,
            tick_interval_ms: 100,
            poll_timeout_ms: 50,
            debounce_ms: 500,
            flex_threshold: 0.05,
            tracker_command: "python3 hand_tracker.py".into(),
            splash_step_ms: 2000,
            panel_hold_ms: 5000,
            queue_capacity: 64,
        }
    }
}

impl Settings {
    pub fn screen(&self) -> ScreenSize {
        ScreenSize::new(self.screen_width, self.screen_height)
    }

    pub fn transport_addr(&self) -> &str {
        self.transport_addr
            .as_deref()
            .unwrap_or_else(|| self.transport.default_addr())
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        match self.transport {
            TransportKind::Tcp => Box::new(TcpTransport::new(self.transport_addr())),
            TransportKind::Rfcomm => Box::new(RfcommTransport::new(self.transport_addr())),
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            backoff: Duration::from_millis(self.reconnect_backoff_ms),
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            flex_threshold: self.flex_threshold,
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn loop_config(&self, mode: InputMode) -> LoopConfig {
        LoopConfig {
            screen: self.screen(),
            mode,
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            splash_step: Duration::from_millis(self.splash_step_ms),
            panel_hold: Duration::from_millis(self.panel_hold_ms),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.screen_width == 0 || self.screen_height == 0 {
            bail!(
                "screen size must be non-zero, got {}x{}",
                self.screen_width,
                self.screen_height
            );
        }
        if self.screen_width > i32::MAX as u32 || self.screen_height > i32::MAX as u32 {
            bail!(
                "screen size {}x{} does not fit display coordinates",
                self.screen_width,
                self.screen_height
            );
        }
        // landmark coordinates are normalised, so only [0, 1) makes sense
        if !(0.0..1.0).contains(&self.flex_threshold) {
            bail!(
                "flex_threshold must be in [0, 1), got {}",
                self.flex_threshold
            );
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.tracker_command.trim().is_empty() {
            bail!("tracker_command must not be empty");
        }
        Ok(())
    }
}

/// Defaults, then the TOML file, then `APP__*` environment overrides.
///
/// An explicit `path` must exist; the default `wearable.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => Settings::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config '{}'", path.display()))
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

/// Applies `APP__<FIELD>` values found through `lookup`. Values that fail to
/// parse are skipped with a warning.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    fn apply<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, field: &str, slot: &mut T)
    where
        T::Err: fmt::Display,
    {
        let key = format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());
        let Some(raw) = lookup(&key) else {
            return;
        };
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(err) => warn!(key = %key, value = %raw, "ignoring invalid override: {err}"),
        }
    }

    let lookup: &dyn Fn(&str) -> Option<String> = &lookup;
    apply(lookup, "screen_width", &mut settings.screen_width);
    apply(lookup, "screen_height", &mut settings.screen_height);
    apply(lookup, "transport", &mut settings.transport);
    apply(lookup, "reconnect_backoff_ms", &mut settings.reconnect_backoff_ms);
    apply(lookup, "tick_interval_ms", &mut settings.tick_interval_ms);
    apply(lookup, "poll_timeout_ms", &mut settings.poll_timeout_ms);
    apply(lookup, "debounce_ms", &mut settings.debounce_ms);
    apply(lookup, "flex_threshold", &mut settings.flex_threshold);
    apply(lookup, "splash_step_ms", &mut settings.splash_step_ms);
    apply(lookup, "panel_hold_ms", &mut settings.panel_hold_ms);
    apply(lookup, "queue_capacity", &mut settings.queue_capacity);

    if let Some(addr) = lookup("APP__TRANSPORT_ADDR") {
        settings.transport_addr = Some(addr);
    }
    if let Some(command) = lookup("APP__TRACKER_COMMAND") {
        settings.tracker_command = command;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_reference_display() {
        let settings = Settings::default();
        assert_eq!(settings.screen(), ScreenSize::new(128, 64));
        assert_eq!(settings.transport_addr(), "127.0.0.1:7878");
        assert_eq!(settings.link_config().backoff, Duration::from_secs(2));
        assert_eq!(settings.gesture_config(), GestureConfig::default());
        assert_eq!(settings.queue_capacity, 64);
    }

    #[test]
    fn file_values_override_defaults_field_by_field() {
        let settings = parse_settings(
            r#"
            transport = "rfcomm"
            panel_hold_ms = 1500
            flex_threshold = 0.08
            "#,
        )
        .expect("parse");

        assert_eq!(settings.transport, TransportKind::Rfcomm);
        assert_eq!(settings.transport_addr(), "/dev/rfcomm0");
        assert_eq!(settings.panel_hold_ms, 1500);
        assert_eq!(settings.flex_threshold, 0.08);
        assert_eq!(settings.screen_width, 128);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(parse_settings("bind_addr = \"0.0.0.0\"").is_err());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut settings = parse_settings("tick_interval_ms = 250").expect("parse");
        apply_env_overrides(
            &mut settings,
            env_of(&[
                ("APP__TICK_INTERVAL_MS", "40"),
                ("APP__TRANSPORT", "RFCOMM"),
                ("APP__TRANSPORT_ADDR", "/dev/rfcomm1"),
                ("APP__SCREEN_WIDTH", " 256 "),
            ]),
        );

        assert_eq!(settings.tick_interval_ms, 40);
        assert_eq!(settings.transport, TransportKind::Rfcomm);
        assert_eq!(settings.transport_addr(), "/dev/rfcomm1");
        assert_eq!(settings.screen_width, 256);
    }

    #[test]
    fn invalid_env_values_keep_previous_value() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            env_of(&[
                ("APP__DEBOUNCE_MS", "soon"),
                ("APP__TRANSPORT", "carrier-pigeon"),
                ("APP__QUEUE_CAPACITY", "-3"),
            ]),
        );
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn zero_queue_capacity_fails_validation() {
        let settings = Settings {
            queue_capacity: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn out_of_range_flex_threshold_fails_validation() {
        for flex_threshold in [-0.1, 1.0, f32::NAN, f32::INFINITY] {
            let settings = Settings {
                flex_threshold,
                ..Settings::default()
            };
            assert!(settings.validate().is_err(), "{flex_threshold} accepted");
        }
    }

    #[test]
    fn oversized_screen_fails_validation() {
        let settings = Settings {
            screen_width: u32::MAX,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn negative_threshold_from_environment_is_rejected() {
        let vars = HashMap::from([("APP__FLEX_THRESHOLD", "-0.5")]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| vars.get(key).map(|v| v.to_string()));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let missing = env::temp_dir().join(format!("wearable_missing_{suffix}.toml"));
        assert!(load_settings(Some(missing.as_path())).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("wearable_config_{suffix}.toml"));
        fs::write(&path, "screen_height = 32\nsplash_step_ms = 0\n").expect("write");

        let settings = load_settings(Some(path.as_path())).expect("load");
        assert_eq!(settings.screen(), ScreenSize::new(128, 32));
        assert_eq!(settings.loop_config(InputMode::Gesture).splash_step, Duration::ZERO);

        fs::remove_file(path).expect("cleanup");
    }
}
