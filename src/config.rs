use anyhow::{anyhow, Result};
use chrome_importer::{
    ChromeImporter, ImportItem, ImportItems, PasswordStoreType, PasswordStrategy, SourceProfile,
};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Settings for one import run.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Chromium profile directory, e.g. `~/.config/google-chrome/Default`.
    pub profile: PathBuf,

    pub items: ImportItems,

    /// Where the JSON export is written.
    pub output: PathBuf,

    /// Same meaning as the browser's `--password-store` switch.
    pub password_store: Option<PasswordStoreType>,

    pub strategy: PasswordStrategy,

    /// Show per-item spinners.
    pub progress: bool,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            profile: PathBuf::new(),
            items: ImportItems::ALL,
            output: PathBuf::from("chrome-import"),
            password_store: None,
            strategy: PasswordStrategy::native(),
            progress: true,
        }
    }
}

impl ImporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(anyhow!(
                "❌ Error: No data types selected. Please specify at least one of: history, bookmarks, cookies, passwords"
            ));
        }

        if !self.profile.is_dir() {
            return Err(anyhow!(
                "❌ Error: Profile directory {:?} does not exist",
                self.profile
            ));
        }

        // The source profile is read-only input.
        if is_within(&self.output, &self.profile) {
            return Err(anyhow!(
                "❌ Error: Output directory {:?} is inside the source profile",
                self.output
            ));
        }

        if self.items.contains(ImportItem::Cookies) {
            warn!("⚠️  WARNING: The cookie export contains session tokens.");
        }
        if self.items.contains(ImportItem::Passwords) {
            warn!("⚠️  WARNING: The password export contains saved credentials.");
            warn!("   Handle {:?} with extreme care!", self.output);
        }

        Ok(())
    }

    pub fn source(&self) -> SourceProfile {
        SourceProfile::new(&self.profile)
    }

    pub fn build_importer(&self) -> ChromeImporter {
        ChromeImporter::new()
            .with_strategy(self.strategy)
            .with_password_store(self.password_store)
    }
}

fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        // Output may not exist yet; compare as given.
        _ => path.starts_with(dir),
    }
}
