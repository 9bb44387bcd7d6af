//! KWallet password backend.
//!
//! Talks to the wallet daemon through the KDE command line tools:
//! - `qdbus` to check the daemon is enabled and find the network wallet
//! - `kwallet-query` to list and read entries of the profile's folder
//!
//! Entries are keyed by signon realm and hold pickled form vectors.

use super::pickle::deserialize_forms;
use super::select::KWalletVersion;
use super::PasswordBackend;
use crate::data_types::PasswordForm;
use crate::error::{ImportError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::process::Command;
use tracing::{debug, warn};

/// Runs an external program and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::result::Result<String, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::result::Result<String, String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| format!("failed to run {}: {}", program, e))?;
        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct KWalletBackend {
    version: KWalletVersion,
    local_profile_id: i32,
    runner: Box<dyn CommandRunner>,
    wallet: Option<String>,
    forms: Option<Vec<PasswordForm>>,
}

impl KWalletBackend {
    pub fn new(local_profile_id: i32, version: KWalletVersion) -> Self {
        Self::with_runner(local_profile_id, version, Box::new(SystemCommandRunner))
    }

    pub fn with_runner(
        local_profile_id: i32,
        version: KWalletVersion,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            version,
            local_profile_id,
            runner,
            wallet: None,
            forms: None,
        }
    }

    fn dbus_service(&self) -> (&'static str, &'static str) {
        match self.version {
            KWalletVersion::Kde4 => ("org.kde.kwalletd", "/modules/kwalletd"),
            KWalletVersion::Kde5 => ("org.kde.kwalletd5", "/modules/kwalletd5"),
        }
    }

    pub fn folder_name(&self) -> String {
        format!("Chrome Form Data ({})", self.local_profile_id)
    }

    fn qdbus(&self, method: &str) -> std::result::Result<String, String> {
        let (service, path) = self.dbus_service();
        let method = format!("org.kde.KWallet.{}", method);
        self.runner
            .run("qdbus", &[service, path, method.as_str()])
            .map(|out| out.trim().to_string())
    }

    /// Read and decode every entry in the profile folder once.
    fn load_forms(&mut self) -> Result<&[PasswordForm]> {
        if self.forms.is_none() {
            let wallet = self
                .wallet
                .clone()
                .ok_or_else(|| ImportError::backend_init(self.name(), "wallet not initialized"))?;
            let folder = self.folder_name();

            let listing = self
                .runner
                .run("kwallet-query", &["-f", folder.as_str(), "-l", wallet.as_str()])
                .map_err(|e| ImportError::open(&folder, e))?;

            let mut forms = Vec::new();
            for realm in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
                // Binary entries are printed base64-encoded.
                let args = ["-f", folder.as_str(), "-r", realm, wallet.as_str()];
                let encoded = match self.runner.run("kwallet-query", &args) {
                    Ok(out) => out,
                    Err(e) => {
                        debug!("Could not read wallet entry {}: {}", realm, e);
                        continue;
                    }
                };
                let data = match STANDARD.decode(encoded.trim()) {
                    Ok(data) => data,
                    Err(e) => {
                        debug!("Wallet entry {} is not base64: {}", realm, e);
                        continue;
                    }
                };
                match deserialize_forms(realm, &data) {
                    Ok(decoded) => forms.extend(decoded),
                    Err(e) => warn!("Invalid KWallet entry {}: {}", realm, e),
                }
            }
            self.forms = Some(forms);
        }
        Ok(self.forms.as_deref().unwrap_or_default())
    }
}

impl PasswordBackend for KWalletBackend {
    fn name(&self) -> &'static str {
        match self.version {
            KWalletVersion::Kde4 => "kwallet",
            KWalletVersion::Kde5 => "kwallet5",
        }
    }

    fn init(&mut self) -> Result<()> {
        let enabled = self
            .qdbus("isEnabled")
            .map_err(|e| ImportError::backend_init(self.name(), e))?;
        if enabled != "true" {
            return Err(ImportError::backend_init(self.name(), "wallet subsystem disabled"));
        }

        let wallet = self
            .qdbus("networkWallet")
            .map_err(|e| ImportError::backend_init(self.name(), e))?;
        if wallet.is_empty() {
            return Err(ImportError::backend_init(self.name(), "no network wallet"));
        }

        debug!("Using KWallet {:?} folder {:?}", wallet, self.folder_name());
        self.wallet = Some(wallet);
        Ok(())
    }

    fn autofillable_logins(&mut self) -> Result<Vec<PasswordForm>> {
        Ok(self
            .load_forms()?
            .iter()
            .filter(|form| !form.blacklisted_by_user)
            .cloned()
            .collect())
    }

    fn blacklist_logins(&mut self) -> Result<Vec<PasswordForm>> {
        Ok(self
            .load_forms()?
            .iter()
            .filter(|form| form.blacklisted_by_user)
            .cloned()
            .collect())
    }
}
