//! Secret Service (libsecret) password backend.
//!
//! The host browser stores one item per login, tagged with
//! `application = chrome-<local profile id>` and the form fields as string
//! attributes. The item secret is the password.

use super::PasswordBackend;
use crate::data_types::{PasswordForm, PasswordScheme};
use crate::error::{ImportError, Result};
use crate::time::chrome_time_to_double;
use secret_service::blocking::SecretService;
use secret_service::EncryptionType;
use std::collections::HashMap;
use tracing::debug;

pub struct LibsecretBackend {
    application: String,
}

impl LibsecretBackend {
    pub fn new(local_profile_id: i32) -> Self {
        Self {
            application: application_name(local_profile_id),
        }
    }

    fn connect(&self) -> Result<SecretService<'static>> {
        SecretService::connect(EncryptionType::Dh)
            .map_err(|e| ImportError::backend_init(self.name(), e))
    }

    fn load_forms(&self, blacklisted: bool) -> Result<Vec<PasswordForm>> {
        let ss = self.connect()?;
        let mut attributes = HashMap::new();
        attributes.insert("application", self.application.as_str());

        let search = ss
            .search_items(attributes)
            .map_err(|e| ImportError::open(&self.application, e))?;

        // Unlocked items first, then locked ones, each as the service returned them.
        let items: Vec<_> = search.unlocked.iter().chain(search.locked.iter()).collect();
        let forms = forms_in_store_order(
            &items,
            blacklisted,
            |item| {
                if item.is_locked().unwrap_or(true) {
                    if let Err(e) = item.unlock() {
                        debug!("Could not unlock secret item: {}", e);
                        return None;
                    }
                }
                item.get_attributes()
                    .map_err(|e| debug!("Could not read secret item attributes: {}", e))
                    .ok()
            },
            |item| {
                item.get_secret()
                    .map_err(|e| debug!("Could not read secret item: {}", e))
                    .ok()
            },
        );
        Ok(forms)
    }
}

impl PasswordBackend for LibsecretBackend {
    fn name(&self) -> &'static str {
        "libsecret"
    }

    fn init(&mut self) -> Result<()> {
        // Connecting is the availability check; reads open their own session.
        self.connect().map(|_| ())
    }

    fn autofillable_logins(&mut self) -> Result<Vec<PasswordForm>> {
        self.load_forms(false)
    }

    fn blacklist_logins(&mut self) -> Result<Vec<PasswordForm>> {
        self.load_forms(true)
    }
}

pub fn application_name(local_profile_id: i32) -> String {
    format!("chrome-{}", local_profile_id)
}

/// Map items to forms of one blacklist state, keeping the store's order.
///
/// The secret is only fetched for items that pass the blacklist filter.
fn forms_in_store_order<T>(
    items: &[T],
    blacklisted: bool,
    attributes: impl Fn(&T) -> Option<HashMap<String, String>>,
    secret: impl Fn(&T) -> Option<Vec<u8>>,
) -> Vec<PasswordForm> {
    let mut forms = Vec::new();
    for item in items {
        let Some(attrs) = attributes(item) else {
            continue;
        };
        let Some(mut form) = form_from_attributes(&attrs) else {
            debug!("Secret item is missing login attributes");
            continue;
        };
        if form.blacklisted_by_user != blacklisted {
            continue;
        }
        let Some(password) = secret(item) else {
            continue;
        };
        form.password_value = password;
        forms.push(form);
    }
    forms
}

/// Build a form from item attributes. The secret is filled in separately.
fn form_from_attributes(attrs: &HashMap<String, String>) -> Option<PasswordForm> {
    let text = |key: &str| attrs.get(key).cloned().unwrap_or_default();
    let number = |key: &str| {
        attrs
            .get(key)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0)
    };

    let signon_realm = attrs.get("signon_realm")?.clone();
    let origin_url = attrs.get("origin_url")?.clone();

    Some(PasswordForm {
        scheme: PasswordScheme::from_i32(number("scheme") as i32),
        signon_realm,
        origin_url,
        action_url: text("action_url"),
        username_element: text("username_element"),
        username_value: text("username_value"),
        password_element: text("password_element"),
        password_value: Vec::new(),
        submit_element: text("submit_element"),
        date_created: chrome_time_to_double(number("date_created")),
        blacklisted_by_user: number("blacklisted_by_user") != 0,
        preferred: number("preferred") != 0,
        times_used: number("times_used") as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_application_name() {
        assert_eq!(application_name(7), "chrome-7");
    }

    #[test]
    fn test_form_from_attributes() {
        let form = form_from_attributes(&attrs(&[
            ("origin_url", "https://a.example/login"),
            ("signon_realm", "https://a.example/"),
            ("username_value", "ann"),
            ("password_element", "pw"),
            ("date_created", "13348540800000000"),
            ("blacklisted_by_user", "0"),
            ("preferred", "1"),
            ("scheme", "1"),
            ("times_used", "3"),
            ("application", "chrome-7"),
        ]))
        .unwrap();

        assert_eq!(form.origin_url, "https://a.example/login");
        assert_eq!(form.username_value, "ann");
        assert_eq!(form.password_element, "pw");
        assert_eq!(form.date_created, 1_704_067_200.0);
        assert!(!form.blacklisted_by_user);
        assert!(form.preferred);
        assert_eq!(form.scheme, PasswordScheme::Basic);
        assert_eq!(form.times_used, 3);
        assert!(form.password_value.is_empty());
    }

    #[test]
    fn test_forms_keep_store_order() {
        let login = |origin: &str, blacklisted: &str, secret: &str| {
            (
                attrs(&[
                    ("origin_url", origin),
                    ("signon_realm", origin),
                    ("blacklisted_by_user", blacklisted),
                ]),
                secret.as_bytes().to_vec(),
            )
        };
        let items = vec![
            login("https://z.example/", "0", "zz"),
            login("https://never.example/", "1", ""),
            login("https://a.example/", "0", "aa"),
            login("https://m.example/", "0", "mm"),
        ];
        let attributes = |item: &(HashMap<String, String>, Vec<u8>)| Some(item.0.clone());
        let secret = |item: &(HashMap<String, String>, Vec<u8>)| Some(item.1.clone());

        let forms = forms_in_store_order(&items, false, attributes, secret);
        let origins: Vec<&str> = forms.iter().map(|f| f.origin_url.as_str()).collect();
        assert_eq!(
            origins,
            vec!["https://z.example/", "https://a.example/", "https://m.example/"]
        );
        assert_eq!(forms[0].password_value, b"zz".to_vec());

        let blacklist = forms_in_store_order(&items, true, attributes, secret);
        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist[0].origin_url, "https://never.example/");
    }

    #[test]
    fn test_unreadable_items_are_skipped() {
        let items = vec![
            attrs(&[("origin_url", "https://a.example/"), ("signon_realm", "https://a.example/")]),
            attrs(&[("origin_url", "https://b.example/"), ("signon_realm", "https://b.example/")]),
        ];
        let forms = forms_in_store_order(
            &items,
            false,
            |item| Some(item.clone()),
            |item| (item["origin_url"] != "https://a.example/").then(|| b"pw".to_vec()),
        );
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].origin_url, "https://b.example/");
    }

    #[test]
    fn test_form_requires_realm_and_origin() {
        assert!(form_from_attributes(&attrs(&[("origin_url", "https://a.example/")])).is_none());
        assert!(form_from_attributes(&attrs(&[("signon_realm", "https://a.example/")])).is_none());
    }

    #[test]
    fn test_bad_numbers_fall_back_to_zero() {
        let form = form_from_attributes(&attrs(&[
            ("origin_url", "https://a.example/"),
            ("signon_realm", "https://a.example/"),
            ("blacklisted_by_user", "yes"),
            ("times_used", ""),
        ]))
        .unwrap();
        assert!(!form.blacklisted_by_user);
        assert_eq!(form.times_used, 0);
    }
}
