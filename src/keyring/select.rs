//! Secret backend selection.
//!
//! Evaluated once per import. Whatever is picked here is the only backend
//! tried; a failed `init` is never followed by a second choice.

use super::desktop::DesktopEnvironment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage the host browser would use for this session, before checking
/// which backends are actually available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordStoreType {
    Basic,
    GnomeAny,
    GnomeKeyring,
    GnomeLibsecret,
    Kwallet,
    Kwallet5,
    Kwallet6,
}

impl PasswordStoreType {
    /// The host's default mapping from desktop to store.
    pub fn for_desktop(desktop: DesktopEnvironment) -> Self {
        match desktop {
            DesktopEnvironment::Cinnamon
            | DesktopEnvironment::Deepin
            | DesktopEnvironment::Gnome
            | DesktopEnvironment::Pantheon
            | DesktopEnvironment::Ukui
            | DesktopEnvironment::Unity
            | DesktopEnvironment::Xfce => PasswordStoreType::GnomeAny,
            DesktopEnvironment::Kde4 => PasswordStoreType::Kwallet,
            DesktopEnvironment::Kde5 => PasswordStoreType::Kwallet5,
            DesktopEnvironment::Kde6 => PasswordStoreType::Kwallet6,
            DesktopEnvironment::Kde3 | DesktopEnvironment::Lxqt | DesktopEnvironment::Other => {
                PasswordStoreType::Basic
            }
        }
    }
}

impl FromStr for PasswordStoreType {
    type Err = String;

    /// Accepts the host browser's `--password-store` values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(PasswordStoreType::Basic),
            "gnome" => Ok(PasswordStoreType::GnomeAny),
            "gnome-keyring" => Ok(PasswordStoreType::GnomeKeyring),
            "gnome-libsecret" => Ok(PasswordStoreType::GnomeLibsecret),
            "kwallet" => Ok(PasswordStoreType::Kwallet),
            "kwallet5" => Ok(PasswordStoreType::Kwallet5),
            "kwallet6" => Ok(PasswordStoreType::Kwallet6),
            other => Err(format!("unknown password store: {}", other)),
        }
    }
}

/// KWallet daemon generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KWalletVersion {
    Kde4,
    Kde5,
}

/// The one backend an import will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretBackendKind {
    LoginDatabase,
    KWallet(KWalletVersion),
    Libsecret,
    None,
}

impl fmt::Display for SecretBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretBackendKind::LoginDatabase => f.write_str("login-database"),
            SecretBackendKind::KWallet(KWalletVersion::Kde4) => f.write_str("kwallet"),
            SecretBackendKind::KWallet(KWalletVersion::Kde5) => f.write_str("kwallet5"),
            SecretBackendKind::Libsecret => f.write_str("libsecret"),
            SecretBackendKind::None => f.write_str("none"),
        }
    }
}

/// Pick the keyring backend for a desktop session.
///
/// An explicit store type wins over detection. GNOME stores need libsecret
/// compiled in; the legacy gnome-keyring library is not supported, so
/// `GnomeKeyring` resolves to no backend.
pub fn select_backend(
    desktop: DesktopEnvironment,
    store_override: Option<PasswordStoreType>,
    libsecret_available: bool,
) -> SecretBackendKind {
    let store = store_override.unwrap_or_else(|| PasswordStoreType::for_desktop(desktop));
    match store {
        PasswordStoreType::Kwallet => SecretBackendKind::KWallet(KWalletVersion::Kde4),
        // kwalletd6 still answers on the kwalletd5 service name.
        PasswordStoreType::Kwallet5 | PasswordStoreType::Kwallet6 => {
            SecretBackendKind::KWallet(KWalletVersion::Kde5)
        }
        PasswordStoreType::GnomeAny | PasswordStoreType::GnomeLibsecret if libsecret_available => {
            SecretBackendKind::Libsecret
        }
        PasswordStoreType::GnomeAny
        | PasswordStoreType::GnomeLibsecret
        | PasswordStoreType::GnomeKeyring
        | PasswordStoreType::Basic => SecretBackendKind::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kde_selects_kwallet_generation() {
        assert_eq!(
            select_backend(DesktopEnvironment::Kde4, None, true),
            SecretBackendKind::KWallet(KWalletVersion::Kde4)
        );
        assert_eq!(
            select_backend(DesktopEnvironment::Kde5, None, true),
            SecretBackendKind::KWallet(KWalletVersion::Kde5)
        );
        assert_eq!(
            select_backend(DesktopEnvironment::Kde6, None, false),
            SecretBackendKind::KWallet(KWalletVersion::Kde5)
        );
    }

    #[test]
    fn test_gnome_family_needs_libsecret() {
        for desktop in [
            DesktopEnvironment::Gnome,
            DesktopEnvironment::Unity,
            DesktopEnvironment::Xfce,
            DesktopEnvironment::Cinnamon,
        ] {
            assert_eq!(select_backend(desktop, None, true), SecretBackendKind::Libsecret);
            assert_eq!(select_backend(desktop, None, false), SecretBackendKind::None);
        }
    }

    #[test]
    fn test_unsupported_desktops() {
        for desktop in [
            DesktopEnvironment::Other,
            DesktopEnvironment::Kde3,
            DesktopEnvironment::Lxqt,
        ] {
            assert_eq!(select_backend(desktop, None, true), SecretBackendKind::None);
        }
    }

    #[test]
    fn test_override_wins() {
        assert_eq!(
            select_backend(DesktopEnvironment::Gnome, Some(PasswordStoreType::Kwallet5), true),
            SecretBackendKind::KWallet(KWalletVersion::Kde5)
        );
        assert_eq!(
            select_backend(DesktopEnvironment::Kde5, Some(PasswordStoreType::Basic), true),
            SecretBackendKind::None
        );
        assert_eq!(
            select_backend(DesktopEnvironment::Kde5, Some(PasswordStoreType::GnomeKeyring), true),
            SecretBackendKind::None
        );
    }

    #[test]
    fn test_parse_store_type() {
        assert_eq!("gnome-libsecret".parse(), Ok(PasswordStoreType::GnomeLibsecret));
        assert_eq!("KWallet5".parse(), Ok(PasswordStoreType::Kwallet5));
        assert!("keychain".parse::<PasswordStoreType>().is_err());
    }
}
