//! Persists the reader's theme preference. The preference is loaded once on
//! start-up and written back whenever it changes; there is no other global
//! state.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// The theme the reader picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSetting {
    Light,
    Dark,

    /// Follow the operating system's preference.
    System,
}

impl Default for ThemeSetting {
    fn default() -> Self {
        ThemeSetting::System
    }
}

/// The theme actually applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectiveTheme {
    Light,
    Dark,
}

impl ThemeSetting {
    pub fn resolve(self, system_prefers_dark: bool) -> EffectiveTheme {
        match self {
            ThemeSetting::Light => EffectiveTheme::Light,
            ThemeSetting::Dark => EffectiveTheme::Dark,
            ThemeSetting::System if system_prefers_dark => EffectiveTheme::Dark,
            ThemeSetting::System => EffectiveTheme::Light,
        }
    }
}

impl fmt::Display for EffectiveTheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EffectiveTheme::Light => "light",
            EffectiveTheme::Dark => "dark",
        })
    }
}

impl FromStr for ThemeSetting {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeSetting::Light),
            "dark" => Ok(ThemeSetting::Dark),
            "system" => Ok(ThemeSetting::System),
            _ => Err(UnknownTheme(s.to_owned())),
        }
    }
}

impl fmt::Display for ThemeSetting {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ThemeSetting::Light => "light",
            ThemeSetting::Dark => "dark",
            ThemeSetting::System => "system",
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownTheme(pub String);

impl fmt::Display for UnknownTheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown theme `{}` (expected light, dark or system)", self.0)
    }
}

impl std::error::Error for UnknownTheme {}

/// The persisted reader preferences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: ThemeSetting,
}

impl Preferences {
    /// Loads the preferences stored at `path`. A missing file yields the
    /// defaults; an unreadable or invalid one is logged and also yields the
    /// defaults.
    pub fn load(path: &Path) -> Preferences {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                warn!("reading preferences `{}`: {}", path.display(), e);
                return Preferences::default();
            }
        };
        match serde_yaml::from_reader(file) {
            Ok(preferences) => preferences,
            Err(e) => {
                warn!("ignoring invalid preferences `{}`: {}", path.display(), e);
                Preferences::default()
            }
        }
    }

    /// Writes the preferences to `path`, creating parent directories as
    /// needed.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        serde_yaml::to_writer(File::create(path)?, self)?;
        Ok(())
    }

    /// Changes the theme and persists the change immediately.
    pub fn set_theme(path: &Path, theme: ThemeSetting) -> Result<Preferences, SaveError> {
        let preferences = Preferences {
            theme,
            ..Preferences::load(path)
        };
        preferences.save(path)?;
        Ok(preferences)
    }
}

/// Represents an error writing the preferences file.
#[derive(Debug)]
pub enum SaveError {
    Io(io::Error),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SaveError::Io(err) => err.fmt(f),
            SaveError::Yaml(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Io(err) => Some(err),
            SaveError::Yaml(err) => Some(err),
        }
    }
}

impl From<io::Error> for SaveError {
    fn from(err: io::Error) -> SaveError {
        SaveError::Io(err)
    }
}

impl From<serde_yaml::Error> for SaveError {
    fn from(err: serde_yaml::Error) -> SaveError {
        SaveError::Yaml(err)
    }
}
