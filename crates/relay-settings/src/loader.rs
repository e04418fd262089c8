//! Layered settings: compiled defaults, then `settings.json`, then `RELAY_*`
//! variables. The merged result is validated before it is returned.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RelaySettings;

const SETTINGS_DIR: &str = ".relay";
const SETTINGS_FILE: &str = "settings.json";

/// `$HOME/.relay/settings.json`, or a path relative to the working directory
/// when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(SETTINGS_DIR)
        .join(SETTINGS_FILE)
}

/// [`load_settings_from_path`] on [`settings_path`].
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Full load: file layer, process environment, validation.
///
/// A missing file is not an error. Malformed JSON is.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the file at `path` merged over them. No env overrides.
pub fn load_file_layer(path: &Path) -> Result<RelaySettings> {
    let mut layered = serde_json::to_value(RelaySettings::default())?;
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            debug!(path = %path.display(), "merging settings file");
            merge_into(&mut layered, serde_json::from_str(&raw)?);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, defaults only");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(serde_json::from_value(layered)?)
}

/// Overlay `layer` onto `base` in place.
///
/// Objects merge key by key. A `null` in `layer` leaves `base` untouched;
/// any other non-object value replaces what was there.
pub fn merge_into(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => merge_maps(base_map, layer_map),
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

fn merge_maps(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        if value.is_null() {
            continue;
        }
        match base.get_mut(&key) {
            Some(existing) => merge_into(existing, value),
            None => {
                let _ = base.insert(key, value);
            }
        }
    }
}

/// Overlay `RELAY_*` variables from the process environment.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] with variables resolved through `lookup`.
///
/// A value that fails to parse or is out of range is logged and skipped.
pub fn apply_overrides<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.number("RELAY_PORT", 0..=u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.number("RELAY_MAILBOX_CAPACITY", 1..=1_000_000) {
        settings.server.mailbox_capacity = v;
    }
    if let Some(v) = env.number("RELAY_MAX_SESSIONS", 0..=1_000_000) {
        settings.server.max_sessions = v;
    }
    if let Some(v) = env.flag("RELAY_ECHO_TO_SENDER") {
        settings.server.echo_to_sender = v;
    }

    // ── Heartbeat ───────────────────────────────────────────────────
    if let Some(v) = env.flag("RELAY_HEARTBEAT_ENABLED") {
        settings.heartbeat.enabled = v;
    }
    if let Some(v) = env.number("RELAY_HEARTBEAT_INTERVAL_MS", 100..=3_600_000) {
        settings.heartbeat.interval_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.flag("RELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Boolean flag text: `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim();
    if TRUTHY.iter().any(|t| val.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| val.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Parse `val` as a `T` and keep it only if it falls inside `bounds`.
pub fn parse_in_range<T>(val: &str, bounds: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| bounds.contains(n))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and empty both count as absent.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.checked(name, parse_bool)
    }

    fn number<T>(&self, name: &str, bounds: RangeInclusive<T>) -> Option<T>
    where
        T: FromStr + PartialOrd,
    {
        self.checked(name, move |v| parse_in_range(v, bounds))
    }

    fn checked<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = (self.lookup)(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(var = name, value = %raw, "ignoring unparseable override");
        }
        parsed
    }
}
