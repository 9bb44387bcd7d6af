//! Desktop environment classification from the session's environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const XDG_CURRENT_DESKTOP: &str = "XDG_CURRENT_DESKTOP";
pub const DESKTOP_SESSION: &str = "DESKTOP_SESSION";
pub const KDE_SESSION_VERSION: &str = "KDE_SESSION_VERSION";
pub const GNOME_DESKTOP_SESSION_ID: &str = "GNOME_DESKTOP_SESSION_ID";
pub const KDE_FULL_SESSION: &str = "KDE_FULL_SESSION";

/// Source of environment variables.
pub trait EnvReader: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    fn has_var(&self, key: &str) -> bool {
        self.var(key).is_some()
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvReader for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvReader for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesktopEnvironment {
    Other,
    Cinnamon,
    Deepin,
    Gnome,
    Kde3,
    Kde4,
    Kde5,
    Kde6,
    Pantheon,
    Ukui,
    Unity,
    Xfce,
    Lxqt,
}

impl DesktopEnvironment {
    pub fn detect(env: &dyn EnvReader) -> Self {
        if let Some(current) = env.var(XDG_CURRENT_DESKTOP) {
            // Colon-separated, highest priority first.
            for value in current.split(':').map(str::trim).filter(|v| !v.is_empty()) {
                match value {
                    "Unity" => {
                        let fallback = env
                            .var(DESKTOP_SESSION)
                            .is_some_and(|session| session.contains("gnome-fallback"));
                        return if fallback {
                            DesktopEnvironment::Gnome
                        } else {
                            DesktopEnvironment::Unity
                        };
                    }
                    "Deepin" => return DesktopEnvironment::Deepin,
                    "GNOME" => return DesktopEnvironment::Gnome,
                    "X-Cinnamon" => return DesktopEnvironment::Cinnamon,
                    "KDE" => {
                        return match env.var(KDE_SESSION_VERSION).as_deref() {
                            Some("5") => DesktopEnvironment::Kde5,
                            Some("6") => DesktopEnvironment::Kde6,
                            _ => DesktopEnvironment::Kde4,
                        };
                    }
                    "Pantheon" => return DesktopEnvironment::Pantheon,
                    "XFCE" => return DesktopEnvironment::Xfce,
                    "UKUI" => return DesktopEnvironment::Ukui,
                    "LXQt" => return DesktopEnvironment::Lxqt,
                    _ => {}
                }
            }
        }

        if let Some(session) = env.var(DESKTOP_SESSION) {
            match session.as_str() {
                "deepin" => return DesktopEnvironment::Deepin,
                "gnome" | "mate" => return DesktopEnvironment::Gnome,
                "kde4" | "kde-plasma" => return DesktopEnvironment::Kde4,
                "kde" => {
                    return if env.has_var(KDE_SESSION_VERSION) {
                        DesktopEnvironment::Kde4
                    } else {
                        DesktopEnvironment::Kde3
                    };
                }
                "ukui" => return DesktopEnvironment::Ukui,
                s if s.contains("xfce") || s == "xubuntu" => return DesktopEnvironment::Xfce,
                _ => {}
            }
        }

        if env.has_var(GNOME_DESKTOP_SESSION_ID) {
            return DesktopEnvironment::Gnome;
        }
        if env.has_var(KDE_FULL_SESSION) {
            return if env.has_var(KDE_SESSION_VERSION) {
                DesktopEnvironment::Kde4
            } else {
                DesktopEnvironment::Kde3
            };
        }

        DesktopEnvironment::Other
    }

    pub fn name(&self) -> &'static str {
        match self {
            DesktopEnvironment::Other => "other",
            DesktopEnvironment::Cinnamon => "cinnamon",
            DesktopEnvironment::Deepin => "deepin",
            DesktopEnvironment::Gnome => "gnome",
            DesktopEnvironment::Kde3 => "kde3",
            DesktopEnvironment::Kde4 => "kde4",
            DesktopEnvironment::Kde5 => "kde5",
            DesktopEnvironment::Kde6 => "kde6",
            DesktopEnvironment::Pantheon => "pantheon",
            DesktopEnvironment::Ukui => "ukui",
            DesktopEnvironment::Unity => "unity",
            DesktopEnvironment::Xfce => "xfce",
            DesktopEnvironment::Lxqt => "lxqt",
        }
    }
}

impl fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_xdg_current_desktop() {
        let cases = [
            (vec![(XDG_CURRENT_DESKTOP, "GNOME")], DesktopEnvironment::Gnome),
            (vec![(XDG_CURRENT_DESKTOP, "ubuntu:GNOME")], DesktopEnvironment::Gnome),
            (vec![(XDG_CURRENT_DESKTOP, "X-Cinnamon")], DesktopEnvironment::Cinnamon),
            (vec![(XDG_CURRENT_DESKTOP, "KDE")], DesktopEnvironment::Kde4),
            (vec![(XDG_CURRENT_DESKTOP, "KDE"), (KDE_SESSION_VERSION, "5")], DesktopEnvironment::Kde5),
            (vec![(XDG_CURRENT_DESKTOP, "KDE"), (KDE_SESSION_VERSION, "6")], DesktopEnvironment::Kde6),
            (vec![(XDG_CURRENT_DESKTOP, "Unity")], DesktopEnvironment::Unity),
            (
                vec![(XDG_CURRENT_DESKTOP, "Unity"), (DESKTOP_SESSION, "gnome-fallback-compiz")],
                DesktopEnvironment::Gnome,
            ),
            (vec![(XDG_CURRENT_DESKTOP, "LXQt")], DesktopEnvironment::Lxqt),
        ];
        for (vars, expected) in cases {
            assert_eq!(DesktopEnvironment::detect(&env(&vars)), expected, "{:?}", vars);
        }
    }

    #[test]
    fn test_desktop_session_fallbacks() {
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(XDG_CURRENT_DESKTOP, "Sway"), (DESKTOP_SESSION, "mate")])),
            DesktopEnvironment::Gnome
        );
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(DESKTOP_SESSION, "kde")])),
            DesktopEnvironment::Kde3
        );
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(DESKTOP_SESSION, "kde"), (KDE_SESSION_VERSION, "4")])),
            DesktopEnvironment::Kde4
        );
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(DESKTOP_SESSION, "xfce4")])),
            DesktopEnvironment::Xfce
        );
    }

    #[test]
    fn test_legacy_variables() {
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(GNOME_DESKTOP_SESSION_ID, "this-is-deprecated")])),
            DesktopEnvironment::Gnome
        );
        assert_eq!(
            DesktopEnvironment::detect(&env(&[(KDE_FULL_SESSION, "true")])),
            DesktopEnvironment::Kde3
        );
        assert_eq!(DesktopEnvironment::detect(&env(&[])), DesktopEnvironment::Other);
    }
}
