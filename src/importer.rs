//! Import orchestration.
//!
//! Runs the requested phases in a fixed order (history, bookmarks with
//! favicons, cookies, passwords) and hands each phase's results to the
//! bridge. No error escapes a phase: failures are logged and the phase
//! simply delivers nothing.

use crate::bridge::{ImporterBridge, VisitSource, IMPORTED_BOOKMARKS_FOLDER};
use crate::cancel::{Cancellation, CancellationFlag};
use crate::data_types::{
    read_bookmarks, read_cookies, read_favicons, read_history, reencode_favicon, FaviconReencoder,
    LoginDatabase,
};
use crate::error::ImportError;
use crate::items::{ImportItem, ImportItems};
use crate::keyring::{
    keyring_backend, BackendFactory, DefaultBackendFactory, EnvReader, PasswordBackend,
    PasswordStoreType, PasswordStrategy, SystemEnv,
};
use crate::profile::SourceProfile;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Records delivered per kind by one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub history: usize,
    pub bookmarks: usize,
    pub favicons: usize,
    pub cookies: usize,
    pub passwords: usize,
    pub cancelled: bool,
}

pub struct ChromeImporter {
    flag: CancellationFlag,
    external_cancel: Option<Arc<dyn Cancellation>>,
    reencoder: Box<FaviconReencoder>,
    backend_factory: Box<dyn BackendFactory>,
    strategy: PasswordStrategy,
    store_override: Option<PasswordStoreType>,
    env: Box<dyn EnvReader>,
}

impl Default for ChromeImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromeImporter {
    pub fn new() -> Self {
        Self {
            flag: CancellationFlag::new(),
            external_cancel: None,
            reencoder: Box::new(reencode_favicon),
            backend_factory: Box::new(DefaultBackendFactory),
            strategy: PasswordStrategy::native(),
            store_override: None,
            env: Box::new(SystemEnv),
        }
    }

    /// Also stop when `cancel` reports cancellation.
    pub fn with_cancellation(mut self, cancel: Arc<dyn Cancellation>) -> Self {
        self.external_cancel = Some(cancel);
        self
    }

    pub fn with_reencoder(mut self, reencoder: Box<FaviconReencoder>) -> Self {
        self.reencoder = reencoder;
        self
    }

    pub fn with_backend_factory(mut self, factory: Box<dyn BackendFactory>) -> Self {
        self.backend_factory = factory;
        self
    }

    pub fn with_strategy(mut self, strategy: PasswordStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_password_store(mut self, store: Option<PasswordStoreType>) -> Self {
        self.store_override = store;
        self
    }

    pub fn with_env(mut self, env: Box<dyn EnvReader>) -> Self {
        self.env = env;
        self
    }

    /// Handle that can cancel this importer from another thread.
    pub fn cancel_handle(&self) -> CancellationFlag {
        self.flag.clone()
    }

    pub fn cancel(&self) {
        self.flag.cancel();
    }

    pub fn cancelled(&self) -> bool {
        self.flag.is_cancelled()
            || self
                .external_cancel
                .as_ref()
                .is_some_and(|cancel| cancel.is_cancelled())
    }

    pub fn start_import(
        &self,
        profile: &SourceProfile,
        items: ImportItems,
        bridge: &mut dyn ImporterBridge,
    ) -> ImportSummary {
        info!("🚀 Importing {} from {:?}", items.description(), profile.source_path);
        let mut summary = ImportSummary::default();

        bridge.notify_started();
        for item in items.iter() {
            if self.cancelled() {
                break;
            }
            bridge.notify_item_started(item);
            match item {
                ImportItem::History => summary.history = self.import_history(profile, bridge),
                ImportItem::Favorites => {
                    let (bookmarks, favicons) = self.import_bookmarks(profile, bridge);
                    summary.bookmarks = bookmarks;
                    summary.favicons = favicons;
                }
                ImportItem::Cookies => summary.cookies = self.import_cookies(profile, bridge),
                ImportItem::Passwords => summary.passwords = self.import_passwords(profile, bridge),
            }
            bridge.notify_item_ended(item);
        }
        bridge.notify_ended();

        summary.cancelled = self.cancelled();
        if summary.cancelled {
            warn!("⚠️  Import cancelled");
        } else {
            info!("✅ Import finished: {:?}", summary);
        }
        summary
    }

    fn import_history(&self, profile: &SourceProfile, bridge: &mut dyn ImporterBridge) -> usize {
        let rows = match read_history(profile, self) {
            Ok(rows) => rows,
            Err(e) => {
                log_phase_error(ImportItem::History, &e);
                return 0;
            }
        };
        if rows.is_empty() || self.cancelled() {
            return 0;
        }
        let count = rows.len();
        info!("📜 Importing {} history entries", count);
        bridge.set_history_items(rows, VisitSource::ChromeImported);
        count
    }

    /// Bookmarks, then the favicons of the same profile.
    fn import_bookmarks(
        &self,
        profile: &SourceProfile,
        bridge: &mut dyn ImporterBridge,
    ) -> (usize, usize) {
        let bookmarks = match read_bookmarks(profile, self) {
            Ok(bookmarks) => bookmarks,
            Err(e) => {
                log_phase_error(ImportItem::Favorites, &e);
                return (0, 0);
            }
        };
        if self.cancelled() {
            return (0, 0);
        }

        let mut delivered = 0;
        if !bookmarks.is_empty() {
            delivered = bookmarks.len();
            info!("🔖 Importing {} bookmarks", delivered);
            bridge.add_bookmarks(bookmarks, IMPORTED_BOOKMARKS_FOLDER);
        }

        let favicons = match read_favicons(profile, self.reencoder.as_ref(), self) {
            Ok(favicons) => favicons,
            Err(e) => {
                log_phase_error(ImportItem::Favorites, &e);
                return (delivered, 0);
            }
        };
        if favicons.is_empty() || self.cancelled() {
            return (delivered, 0);
        }
        let favicon_count = favicons.len();
        debug!("Importing {} favicons", favicon_count);
        bridge.set_favicons(favicons);
        (delivered, favicon_count)
    }

    fn import_cookies(&self, profile: &SourceProfile, bridge: &mut dyn ImporterBridge) -> usize {
        let cookies = match read_cookies(profile, self) {
            Ok(cookies) => cookies,
            Err(e) => {
                log_phase_error(ImportItem::Cookies, &e);
                return 0;
            }
        };
        if cookies.is_empty() || self.cancelled() {
            return 0;
        }
        let count = cookies.len();
        info!("🍪 Importing {} cookies", count);
        bridge.set_cookies(cookies);
        count
    }

    fn import_passwords(&self, profile: &SourceProfile, bridge: &mut dyn ImporterBridge) -> usize {
        let mut backend: Box<dyn PasswordBackend> = match self.strategy {
            PasswordStrategy::DirectLoginDatabase => Box::new(LoginDatabase::new(profile)),
            PasswordStrategy::KeyringLadder => {
                match keyring_backend(
                    profile,
                    self.env.as_ref(),
                    self.store_override,
                    self.backend_factory.as_ref(),
                ) {
                    Ok((_, Some(backend))) => backend,
                    Ok((kind, None)) => {
                        info!("No password backend available ({}), skipping passwords", kind);
                        return 0;
                    }
                    Err(e) => {
                        log_phase_error(ImportItem::Passwords, &e);
                        return 0;
                    }
                }
            }
        };

        if let Err(e) = backend.init() {
            error!("❌ {}", e);
            return 0;
        }

        let mut count = 0;
        for fetch in [PasswordFetch::Autofillable, PasswordFetch::Blacklist] {
            let forms = match fetch.run(backend.as_mut()) {
                Ok(forms) => forms,
                Err(e) => {
                    warn!("⚠️  Failed to read {} logins from {}: {}", fetch.name(), backend.name(), e);
                    continue;
                }
            };
            for form in forms {
                if self.cancelled() {
                    return count;
                }
                bridge.set_password_form(form);
                count += 1;
            }
        }
        info!("🔑 Imported {} saved logins from {}", count, backend.name());
        count
    }
}

impl Cancellation for ChromeImporter {
    fn is_cancelled(&self) -> bool {
        self.cancelled()
    }
}

#[derive(Clone, Copy)]
enum PasswordFetch {
    Autofillable,
    Blacklist,
}

impl PasswordFetch {
    fn name(&self) -> &'static str {
        match self {
            PasswordFetch::Autofillable => "autofillable",
            PasswordFetch::Blacklist => "blacklisted",
        }
    }

    fn run(
        &self,
        backend: &mut dyn PasswordBackend,
    ) -> crate::error::Result<Vec<crate::data_types::PasswordForm>> {
        match self {
            PasswordFetch::Autofillable => backend.autofillable_logins(),
            PasswordFetch::Blacklist => backend.blacklist_logins(),
        }
    }
}

fn log_phase_error(item: ImportItem, e: &ImportError) {
    match e {
        ImportError::MissingSource(_) => debug!("Skipping {}: {}", item, e),
        ImportError::BackendInitFailure { .. } => error!("❌ Skipping {}: {}", item, e),
        _ => warn!("⚠️  Skipping {}: {}", item, e),
    }
}
