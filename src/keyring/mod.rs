//! Password store selection.
//!
//! Two strategies exist. Platforms with a desktop keyring go through the
//! ladder: read the profile id, classify the desktop, pick exactly one
//! backend, init it. Everything else reads `Login Data` directly.

pub mod desktop;
pub mod kwallet;
#[cfg(all(target_os = "linux", feature = "libsecret"))]
pub mod libsecret;
pub mod pickle;
pub mod select;

pub use desktop::{DesktopEnvironment, EnvReader, SystemEnv};
pub use kwallet::{CommandRunner, KWalletBackend, SystemCommandRunner};
pub use select::{select_backend, KWalletVersion, PasswordStoreType, SecretBackendKind};

use crate::data_types::PasswordForm;
use crate::error::Result;
use crate::profile::SourceProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// A source of saved credentials.
pub trait PasswordBackend {
    fn name(&self) -> &'static str;

    fn init(&mut self) -> Result<()>;

    /// Logins the user allowed to be saved.
    fn autofillable_logins(&mut self) -> Result<Vec<PasswordForm>>;

    /// "Never save for this site" entries.
    fn blacklist_logins(&mut self) -> Result<Vec<PasswordForm>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordStrategy {
    DirectLoginDatabase,
    KeyringLadder,
}

impl PasswordStrategy {
    /// What the host browser itself uses on this platform.
    pub fn native() -> Self {
        if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            PasswordStrategy::KeyringLadder
        } else {
            PasswordStrategy::DirectLoginDatabase
        }
    }
}

impl Default for PasswordStrategy {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for PasswordStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordStrategy::DirectLoginDatabase => f.write_str("login-db"),
            PasswordStrategy::KeyringLadder => f.write_str("keyring"),
        }
    }
}

impl FromStr for PasswordStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(PasswordStrategy::native()),
            "login-db" | "login-database" => Ok(PasswordStrategy::DirectLoginDatabase),
            "keyring" => Ok(PasswordStrategy::KeyringLadder),
            other => Err(format!("unknown password strategy: {}", other)),
        }
    }
}

/// Builds backends for a selected kind.
pub trait BackendFactory: Send + Sync {
    fn libsecret_available(&self) -> bool;

    /// `None` when nothing can serve `kind`.
    fn create(&self, kind: SecretBackendKind, local_profile_id: i32)
        -> Option<Box<dyn PasswordBackend>>;
}

/// Builds the real keyring backends compiled into this binary.
///
/// `LoginDatabase` is never produced here; the direct strategy opens it from
/// the profile itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn libsecret_available(&self) -> bool {
        cfg!(all(target_os = "linux", feature = "libsecret"))
    }

    fn create(
        &self,
        kind: SecretBackendKind,
        local_profile_id: i32,
    ) -> Option<Box<dyn PasswordBackend>> {
        match kind {
            SecretBackendKind::KWallet(version) => {
                Some(Box::new(KWalletBackend::new(local_profile_id, version)))
            }
            #[cfg(all(target_os = "linux", feature = "libsecret"))]
            SecretBackendKind::Libsecret => {
                Some(Box::new(libsecret::LibsecretBackend::new(local_profile_id)))
            }
            #[cfg(not(all(target_os = "linux", feature = "libsecret")))]
            SecretBackendKind::Libsecret => None,
            SecretBackendKind::LoginDatabase | SecretBackendKind::None => None,
        }
    }
}

/// Run the keyring ladder up to backend construction.
///
/// Returns the chosen kind and, when one can be built, the uninitialized
/// backend. Errors only when the profile id cannot be read.
pub fn keyring_backend(
    profile: &SourceProfile,
    env: &dyn EnvReader,
    store_override: Option<PasswordStoreType>,
    factory: &dyn BackendFactory,
) -> Result<(SecretBackendKind, Option<Box<dyn PasswordBackend>>)> {
    let local_profile_id = profile.local_profile_id()?;
    let desktop = DesktopEnvironment::detect(env);
    let kind = select_backend(desktop, store_override, factory.libsecret_available());
    info!(
        "Desktop {} selected password backend {} for profile id {}",
        desktop, kind, local_profile_id
    );
    Ok((kind, factory.create(kind, local_profile_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    struct NamedBackend(&'static str);

    impl PasswordBackend for NamedBackend {
        fn name(&self) -> &'static str {
            self.0
        }
        fn init(&mut self) -> Result<()> {
            Ok(())
        }
        fn autofillable_logins(&mut self) -> Result<Vec<PasswordForm>> {
            Ok(Vec::new())
        }
        fn blacklist_logins(&mut self) -> Result<Vec<PasswordForm>> {
            Ok(Vec::new())
        }
    }

    struct NamingFactory;

    impl BackendFactory for NamingFactory {
        fn libsecret_available(&self) -> bool {
            true
        }
        fn create(&self, kind: SecretBackendKind, _id: i32) -> Option<Box<dyn PasswordBackend>> {
            match kind {
                SecretBackendKind::KWallet(_) => Some(Box::new(NamedBackend("kwallet"))),
                SecretBackendKind::Libsecret => Some(Box::new(NamedBackend("libsecret"))),
                _ => None,
            }
        }
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("login-db".parse(), Ok(PasswordStrategy::DirectLoginDatabase));
        assert_eq!("keyring".parse(), Ok(PasswordStrategy::KeyringLadder));
        assert_eq!("native".parse(), Ok(PasswordStrategy::native()));
        assert!("vault".parse::<PasswordStrategy>().is_err());
    }

    #[test]
    fn test_ladder_needs_profile_id() {
        let dir = tempfile::tempdir().unwrap();
        let profile = SourceProfile::new(dir.path());
        let env = env(&[("XDG_CURRENT_DESKTOP", "KDE"), ("KDE_SESSION_VERSION", "5")]);
        assert!(keyring_backend(&profile, &env, None, &NamingFactory).is_err());
    }

    #[test]
    fn test_ladder_picks_by_desktop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Preferences"),
            r#"{"profile": {"local_profile_id": 3}}"#,
        )
        .unwrap();
        let profile = SourceProfile::new(dir.path());

        let kde = env(&[("XDG_CURRENT_DESKTOP", "KDE"), ("KDE_SESSION_VERSION", "5")]);
        let (kind, backend) = keyring_backend(&profile, &kde, None, &NamingFactory).unwrap();
        assert_eq!(kind, SecretBackendKind::KWallet(KWalletVersion::Kde5));
        assert_eq!(backend.unwrap().name(), "kwallet");

        let gnome = env(&[("XDG_CURRENT_DESKTOP", "GNOME")]);
        let (kind, backend) = keyring_backend(&profile, &gnome, None, &NamingFactory).unwrap();
        assert_eq!(kind, SecretBackendKind::Libsecret);
        assert_eq!(backend.unwrap().name(), "libsecret");

        let (kind, backend) = keyring_backend(&profile, &env(&[]), None, &NamingFactory).unwrap();
        assert_eq!(kind, SecretBackendKind::None);
        assert!(backend.is_none());
    }

    #[test]
    fn test_default_factory_has_no_backend_for_none() {
        let factory = DefaultBackendFactory;
        assert!(factory.create(SecretBackendKind::None, 1).is_none());
        assert!(factory.create(SecretBackendKind::LoginDatabase, 1).is_none());
        assert!(factory
            .create(SecretBackendKind::KWallet(KWalletVersion::Kde4), 1)
            .is_some());
    }
}
