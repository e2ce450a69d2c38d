use ember_notifications_util::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const ID: &str = "dev.ember.Notifications";

/// Current settings schema version, stored in exported snapshots.
pub const SETTINGS_VERSION: u32 = 2;

/// Screen anchor where notification cards are stacked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    TopLeft,
    #[default]
    TopRight,
    TopCenter,
    BottomLeft,
    BottomRight,
    BottomCenter,
}

/// Process-wide notification settings.
///
/// Loaded once at engine init, mutated only through `apply`, and exported /
/// imported as a versioned [`SettingsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub position: Anchor,
    /// Cap on simultaneously rendered notifications (not total queued).
    pub max_visible: usize,
    #[serde(default = "default_true")]
    pub enable_animations: bool,
    #[serde(default)]
    pub enable_sounds: bool,
    /// Per-severity auto-close overrides in milliseconds.
    #[serde(default)]
    pub custom_durations: HashMap<Severity, u64>,
    /// Severities that default to `duration = 0` (never auto-close).
    #[serde(default)]
    pub persistent_severities: HashSet<Severity>,
    /// Milliseconds between sweeps evicting notifications older than the
    /// retention threshold.
    #[serde(default = "default_cleanup_interval")]
    pub auto_cleanup_interval_ms: u64,
    /// While set, non-error notifications go straight to history.
    #[serde(default)]
    pub do_not_disturb: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            position: Anchor::default(),
            max_visible: 5,
            enable_animations: default_true(),
            enable_sounds: false,
            custom_durations: HashMap::new(),
            persistent_severities: HashSet::new(),
            auto_cleanup_interval_ms: default_cleanup_interval(),
            do_not_disturb: false,
        }
    }
}

impl Settings {
    /// Resolve the auto-close duration for a severity: persistent set wins,
    /// then a configured override, then the built-in default.
    pub fn duration_for(&self, severity: Severity) -> u64 {
        if self.persistent_severities.contains(&severity) {
            return 0;
        }
        self.custom_durations
            .get(&severity)
            .copied()
            .unwrap_or_else(|| severity.default_duration_ms())
    }

    /// Apply a partial update. Fields left unset in the patch are untouched.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(max_visible) = patch.max_visible {
            self.max_visible = max_visible.max(1);
        }
        if let Some(enable_animations) = patch.enable_animations {
            self.enable_animations = enable_animations;
        }
        if let Some(enable_sounds) = patch.enable_sounds {
            self.enable_sounds = enable_sounds;
        }
        if let Some(custom_durations) = patch.custom_durations {
            self.custom_durations = custom_durations;
        }
        if let Some(persistent_severities) = patch.persistent_severities {
            self.persistent_severities = persistent_severities;
        }
        if let Some(interval) = patch.auto_cleanup_interval_ms {
            self.auto_cleanup_interval_ms = interval;
        }
        if let Some(do_not_disturb) = patch.do_not_disturb {
            self.do_not_disturb = do_not_disturb;
        }
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            version: SETTINGS_VERSION,
            settings: self.clone(),
        }
    }
}

/// Partial settings update; every field optional.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub position: Option<Anchor>,
    pub max_visible: Option<usize>,
    pub enable_animations: Option<bool>,
    pub enable_sounds: Option<bool>,
    pub custom_durations: Option<HashMap<Severity, u64>>,
    pub persistent_severities: Option<HashSet<Severity>>,
    pub auto_cleanup_interval_ms: Option<u64>,
    pub do_not_disturb: Option<bool>,
}

/// A versioned, exportable settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub version: u32,
    pub settings: Settings,
}

impl SettingsSnapshot {
    /// A snapshot is importable when it comes from this schema version or an
    /// older one and its values are structurally sane.
    pub fn is_importable(&self) -> bool {
        self.version >= 1 && self.version <= SETTINGS_VERSION && self.settings.max_visible >= 1
    }
}

const fn default_true() -> bool {
    true
}

const fn default_cleanup_interval() -> u64 {
    60_000
}
