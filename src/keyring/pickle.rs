//! Reader for the host browser's binary pickle format, as stored in KWallet.
//!
//! Layout: a little-endian `u32` payload size, then fields packed on 4-byte
//! boundaries. Strings are an `i32` byte length plus bytes; UTF-16 strings an
//! `i32` code-unit length plus two bytes per unit.

use crate::data_types::{PasswordForm, PasswordScheme};
use crate::time::chrome_time_to_double;
use thiserror::Error;
use tracing::warn;

/// Newest form layout this reader understands.
pub const MAX_PICKLE_VERSION: i32 = 9;

/// Newest layout of the nested form and form field records.
const MAX_FORM_DATA_VERSION: i32 = 6;

#[derive(Debug, Error, PartialEq)]
pub enum PickleError {
    #[error("pickle truncated at offset {0}")]
    Truncated(usize),
    #[error("invalid string at offset {0}")]
    InvalidString(usize),
    #[error("unsupported pickle version {0}")]
    UnsupportedVersion(i32),
    #[error("invalid form data at offset {0}")]
    InvalidFormData(usize),
}

type Result<T> = std::result::Result<T, PickleError>;

pub struct PickleReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PickleReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let size = data
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .ok_or(PickleError::Truncated(0))?;
        let payload = data.get(4..4 + size).ok_or(PickleError::Truncated(4))?;
        Ok(Self { payload, pos: 0 })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .payload
            .get(self.pos..self.pos + len)
            .ok_or(PickleError::Truncated(self.pos))?;
        self.pos += (len + 3) & !3;
        Ok(bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.read_i64()? as u64)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let at = self.pos;
        let len = usize::try_from(self.read_i32()?).map_err(|_| PickleError::InvalidString(at))?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PickleError::InvalidString(at))
    }

    pub fn read_string16(&mut self) -> Result<String> {
        let at = self.pos;
        let units = usize::try_from(self.read_i32()?).map_err(|_| PickleError::InvalidString(at))?;
        let bytes = self.take(units.checked_mul(2).ok_or(PickleError::InvalidString(at))?)?;
        let utf16: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&utf16).map_err(|_| PickleError::InvalidString(at))
    }
}

/// Decode the forms stored under one wallet entry.
///
/// The entry key is the signon realm. From version 2 on, each form carries a
/// tail of serialized form field data and later additions; it is decoded only
/// to find where the next form begins. If a later form cannot be located the
/// forms read so far are returned and the rest are reported as dropped.
pub fn deserialize_forms(signon_realm: &str, data: &[u8]) -> Result<Vec<PasswordForm>> {
    let mut reader = PickleReader::new(data)?;
    let version = reader.read_i32()?;
    if !(1..=MAX_PICKLE_VERSION).contains(&version) {
        return Err(PickleError::UnsupportedVersion(version));
    }
    let count = reader.read_u64()?;

    let mut forms = Vec::new();
    while (forms.len() as u64) < count {
        let read = read_form(&mut reader, signon_realm, version).and_then(|form| {
            forms.push(form);
            if version > 1 {
                skip_form_tail(&mut reader, version)?;
            }
            Ok(())
        });
        if let Err(err) = read {
            if forms.is_empty() {
                return Err(err);
            }
            let dropped = count.saturating_sub(forms.len() as u64);
            if dropped > 0 {
                warn!(
                    "KWallet entry {} holds {} forms; {} could not be decoded: {}",
                    signon_realm, count, dropped, err
                );
            }
            break;
        }
    }

    Ok(forms)
}

fn read_form(reader: &mut PickleReader<'_>, signon_realm: &str, version: i32) -> Result<PasswordForm> {
    let scheme = reader.read_i32()?;
    let origin_url = reader.read_string()?;
    let action_url = reader.read_string()?;
    let username_element = reader.read_string16()?;
    let username_value = reader.read_string16()?;
    let password_element = reader.read_string16()?;
    let password_value = reader.read_string16()?;
    let submit_element = reader.read_string16()?;
    if version < 8 {
        let _ssl_valid = reader.read_bool()?;
    }
    let preferred = reader.read_bool()?;
    let blacklisted_by_user = reader.read_bool()?;
    let date_created = reader.read_i64()?;

    let mut form = PasswordForm {
        scheme: PasswordScheme::from_i32(scheme),
        signon_realm: signon_realm.to_string(),
        origin_url,
        action_url,
        username_element,
        username_value,
        password_element,
        password_value: password_value.into_bytes(),
        submit_element,
        // Version 1 stored time_t seconds.
        date_created: if version > 1 {
            chrome_time_to_double(date_created)
        } else {
            date_created as f64
        },
        blacklisted_by_user,
        preferred,
        times_used: 0,
    };

    if version > 1 {
        let _type = reader.read_i32()?;
        form.times_used = reader.read_i32()?;
    }
    Ok(form)
}

/// Step over everything after `times_used` that none of the imported fields use.
fn skip_form_tail(reader: &mut PickleReader<'_>, version: i32) -> Result<()> {
    skip_form_data(reader)?;
    if version > 2 {
        let _date_synced = reader.read_i64()?;
    }
    if version > 3 {
        let _display_name = reader.read_string16()?;
        let _icon_url = reader.read_string()?;
        let _federation_origin = reader.read_string()?;
        let _skip_zero_click = reader.read_bool()?;
    }
    if version > 4 {
        let _generation_upload_status = reader.read_i32()?;
    }
    Ok(())
}

/// Form data carries its own layout version, independent of the entry's.
fn skip_form_data(reader: &mut PickleReader<'_>) -> Result<()> {
    let at = reader.pos;
    let version = reader.read_i32()?;
    if !(1..=MAX_FORM_DATA_VERSION).contains(&version) {
        return Err(PickleError::InvalidFormData(at));
    }
    let _name = reader.read_string16()?;
    if version < 4 {
        let _method = reader.read_string16()?;
    }
    let _origin = reader.read_string()?;
    let _action = reader.read_string()?;
    if version == 1 {
        let _user_submitted = reader.read_bool()?;
    }
    let at = reader.pos;
    let fields = usize::try_from(reader.read_i32()?).map_err(|_| PickleError::InvalidFormData(at))?;
    for _ in 0..fields {
        skip_form_field(reader)?;
    }
    if version >= 3 {
        let _is_form_tag = reader.read_bool()?;
    }
    if version >= 5 {
        let _is_formless_checkout = reader.read_bool()?;
    }
    if version >= 6 {
        let _main_frame_origin = reader.read_string()?;
    }
    Ok(())
}

fn skip_form_field(reader: &mut PickleReader<'_>) -> Result<()> {
    let at = reader.pos;
    let version = reader.read_i32()?;
    if !(1..=MAX_FORM_DATA_VERSION).contains(&version) {
        return Err(PickleError::InvalidFormData(at));
    }
    let _label = reader.read_string16()?;
    let _name = reader.read_string16()?;
    let _value = reader.read_string16()?;
    let _form_control_type = reader.read_string()?;
    let _autocomplete_attribute = reader.read_string()?;
    let _max_length = reader.read_u64()?;
    let _is_autofilled = reader.read_bool()?;
    if version == 1 {
        let _is_checked = reader.read_bool()?;
        let _is_checkable = reader.read_bool()?;
    } else {
        let _check_status = reader.read_i32()?;
    }
    let _is_focusable = reader.read_bool()?;
    let _should_autocomplete = reader.read_bool()?;
    if version >= 3 {
        let _role = reader.read_i32()?;
    }
    let _text_direction = reader.read_i32()?;
    for _ in 0..2 {
        // option values, then option contents
        let at = reader.pos;
        let options = usize::try_from(reader.read_i32()?).map_err(|_| PickleError::InvalidFormData(at))?;
        for _ in 0..options {
            reader.read_string16()?;
        }
    }
    if version >= 4 {
        let _properties_mask = reader.read_i32()?;
    }
    if version >= 5 {
        let _id = reader.read_string16()?;
    }
    if version >= 6 {
        let _css_classes = reader.read_string16()?;
    }
    Ok(())
}
