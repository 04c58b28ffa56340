//! Canonical credential entry.
//!
//! Standard fields live in the attribute map under reserved keys
//! ([`TITLE`], [`USER_NAME`], [`PASSWORD`], [`URL`], [`NOTES`]) next to
//! importer-defined attributes, so every value carries its own protection
//! flag.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use keyport_crypto_core::{CryptoError, TotpSettings};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Reserved attribute keys
// ---------------------------------------------------------------------------

pub const TITLE: &str = "Title";
pub const USER_NAME: &str = "UserName";
pub const PASSWORD: &str = "Password";
pub const URL: &str = "URL";
pub const NOTES: &str = "Notes";

/// Canonical `otpauth://` URI of the installed TOTP settings.
pub const OTP: &str = "otp";

/// Prefix of secondary URLs: `KP2A_URL_1`, `KP2A_URL_2`, ...
pub const ADDITIONAL_URL_PREFIX: &str = "KP2A_URL_";

pub const PASSKEY_CREDENTIAL_ID: &str = "KPEX_PASSKEY_CREDENTIAL_ID";
pub const PASSKEY_PRIVATE_KEY_PEM: &str = "KPEX_PASSKEY_PRIVATE_KEY_PEM";
pub const PASSKEY_USERNAME: &str = "KPEX_PASSKEY_USERNAME";
pub const PASSKEY_RELYING_PARTY: &str = "KPEX_PASSKEY_RELYING_PARTY";
pub const PASSKEY_USER_HANDLE: &str = "KPEX_PASSKEY_USER_HANDLE";

const STANDARD_KEYS: [&str; 5] = [TITLE, USER_NAME, PASSWORD, URL, NOTES];

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// One attribute value plus its protection flag.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Attribute {
    value: String,
    #[zeroize(skip)]
    protected: bool,
}

impl Attribute {
    #[must_use]
    pub fn new(value: impl Into<String>, protected: bool) -> Self {
        Self {
            value: value.into(),
            protected,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.protected
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.protected {
            f.write_str("Attribute(***)")
        } else {
            write!(f, "Attribute({:?})", self.value)
        }
    }
}

/// Attribute map, ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryAttributes {
    map: BTreeMap<String, Attribute>,
}

impl EntryAttributes {
    /// Value under `key`, or `""` when absent.
    #[must_use]
    pub fn value(&self, key: &str) -> &str {
        self.map.get(key).map_or("", Attribute::value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.map.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn is_protected(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(Attribute::is_protected)
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, protected: bool) {
        self.map.insert(key.into(), Attribute::new(value, protected));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys other than the five standard fields.
    pub fn custom_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !STANDARD_KEYS.contains(k))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// First free key among `base`, `base_1`, `base_2`, ...
    #[must_use]
    pub fn free_key(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_owned();
        }
        let mut n: usize = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.contains(&candidate) {
                return candidate;
            }
            n = n.saturating_add(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Creation and modification timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryTimes {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A credential entry. Owned by exactly one group.
#[derive(Clone, Debug)]
pub struct Entry {
    uuid: Uuid,
    attributes: EntryAttributes,
    tags: BTreeSet<String>,
    expires: bool,
    expiry_time: Option<DateTime<Utc>>,
    totp: Option<TotpSettings>,
    attachments: BTreeMap<String, Vec<u8>>,
    times: EntryTimes,
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

impl Entry {
    /// Empty entry with a random UUID, both timestamps set to now.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            attributes: EntryAttributes::default(),
            tags: BTreeSet::new(),
            expires: false,
            expiry_time: None,
            totp: None,
            attachments: BTreeMap::new(),
            times: EntryTimes {
                created: now,
                modified: now,
            },
        }
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.attributes.value(TITLE)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.attributes.value(USER_NAME)
    }

    #[must_use]
    pub fn password(&self) -> &str {
        self.attributes.value(PASSWORD)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.attributes.value(URL)
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        self.attributes.value(NOTES)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.attributes.set(TITLE, title, false);
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.attributes.set(USER_NAME, username, false);
    }

    /// The password is always protected.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.attributes.set(PASSWORD, password, true);
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.attributes.set(URL, url, false);
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.attributes.set(NOTES, notes, false);
    }

    /// Value of any attribute, `""` when absent.
    #[must_use]
    pub fn attribute(&self, key: &str) -> &str {
        self.attributes.value(key)
    }

    #[must_use]
    pub const fn attributes(&self) -> &EntryAttributes {
        &self.attributes
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>, protected: bool) {
        self.attributes.set(key, value, protected);
    }

    /// Store under `name`, or `name_1`, `name_2`, ... when taken. Returns the
    /// key that was used.
    pub fn add_attribute(&mut self, name: &str, value: impl Into<String>, protected: bool) -> String {
        let key = self.attributes.free_key(name);
        self.attributes.set(key.clone(), value, protected);
        key
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Add a tag; empty and whitespace-only tags are ignored.
    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() {
            self.tags.insert(tag.to_owned());
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Set the expiry time and raise the "expires" flag.
    pub fn set_expiry(&mut self, when: DateTime<Utc>) {
        self.expires = true;
        self.expiry_time = Some(when);
    }

    #[must_use]
    pub const fn expires(&self) -> bool {
        self.expires
    }

    #[must_use]
    pub const fn expiry_time(&self) -> Option<DateTime<Utc>> {
        self.expiry_time
    }

    /// `expires && expiry_time <= now`.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires && self.expiry_time.is_some_and(|t| t <= Utc::now())
    }

    #[must_use]
    pub const fn totp(&self) -> Option<&TotpSettings> {
        self.totp.as_ref()
    }

    #[must_use]
    pub const fn has_totp(&self) -> bool {
        self.totp.is_some()
    }

    /// Install TOTP settings unless the entry already has some.
    ///
    /// Returns `Ok(false)` and leaves the entry untouched when TOTP is
    /// already set. On install, the canonical URI is stored under [`OTP`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Otp` if the URI cannot be rendered.
    pub fn set_totp(&mut self, settings: TotpSettings) -> Result<bool, CryptoError> {
        if self.totp.is_some() {
            return Ok(false);
        }
        let label = if self.username().is_empty() {
            self.title()
        } else {
            self.username()
        };
        let uri = settings.to_uri(label, self.title())?;
        self.attributes.set(OTP, uri, true);
        self.totp = Some(settings);
        Ok(true)
    }

    #[must_use]
    pub const fn attachments(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.attachments
    }

    /// Attach `data` under `name`, or a numbered variant if `name` is taken.
    pub fn add_attachment(&mut self, name: &str, data: Vec<u8>) -> String {
        let mut key = name.to_owned();
        let mut n: usize = 1;
        while self.attachments.contains_key(&key) {
            key = format!("{name}_{n}");
            n = n.saturating_add(1);
        }
        self.attachments.insert(key.clone(), data);
        key
    }

    #[must_use]
    pub const fn times(&self) -> EntryTimes {
        self.times
    }

    pub fn set_times(&mut self, created: Option<DateTime<Utc>>, modified: Option<DateTime<Utc>>) {
        if let Some(created) = created {
            self.times.created = created;
        }
        if let Some(modified) = modified {
            self.times.modified = modified;
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn standard_fields_roundtrip_and_password_is_protected() {
        let mut entry = Entry::new();
        entry.set_title("GitHub");
        entry.set_username("octocat");
        entry.set_password("hunter2");
        entry.set_url("https://github.com");
        entry.set_notes(" line one\nline two ");

        assert_eq!(entry.title(), "GitHub");
        assert_eq!(entry.username(), "octocat");
        assert_eq!(entry.password(), "hunter2");
        assert_eq!(entry.url(), "https://github.com");
        assert_eq!(entry.notes(), " line one\nline two ");
        assert!(entry.attributes().is_protected(PASSWORD));
        assert!(!entry.attributes().is_protected(USER_NAME));
        assert_eq!(entry.attributes().custom_keys().count(), 0);
    }

    #[test]
    fn add_attribute_never_overwrites() {
        let mut entry = Entry::new();
        assert_eq!(entry.add_attribute("pin", "1", true), "pin");
        assert_eq!(entry.add_attribute("pin", "2", true), "pin_1");
        assert_eq!(entry.add_attribute("pin", "3", false), "pin_2");
        assert_eq!(entry.attribute("pin"), "1");
        assert_eq!(entry.attribute("pin_2"), "3");
        assert!(!entry.attributes().is_protected("pin_2"));
    }

    #[test]
    fn names_are_kept_verbatim() {
        let mut entry = Entry::new();
        entry.add_attribute(" spaced name ", "v", false);
        assert_eq!(entry.attribute(" spaced name "), "v");
        assert_eq!(entry.attribute("spaced name"), "");
    }

    #[test]
    fn protected_attribute_debug_is_masked() {
        let secret = Attribute::new("hunter2", true);
        assert_eq!(format!("{secret:?}"), "Attribute(***)");
        let plain = Attribute::new("hello", false);
        assert_eq!(format!("{plain:?}"), "Attribute(\"hello\")");
    }

    #[test]
    fn totp_is_first_wins() {
        let mut entry = Entry::new();
        entry.set_title("Example");
        let first = TotpSettings::parse(
            "otpauth://totp/Example?secret=JBSWY3DPEHPK3PXP&digits=8&period=45",
        )
        .unwrap();
        assert!(entry.set_totp(first).unwrap());
        assert!(entry.attribute(OTP).starts_with("otpauth://totp/"));
        assert!(entry.attributes().is_protected(OTP));

        let second = TotpSettings::parse("GEZDGNBV").unwrap();
        assert!(!entry.set_totp(second).unwrap());
        let totp = entry.totp().unwrap();
        assert_eq!(totp.digits(), 8);
        assert_eq!(totp.step(), 45);
        assert_eq!(totp.secret(), "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn expiry_flag_and_is_expired() {
        let mut entry = Entry::new();
        assert!(!entry.expires());
        assert!(!entry.is_expired());

        entry.set_expiry(Utc::now() + Duration::days(30));
        assert!(entry.expires());
        assert!(!entry.is_expired());

        entry.set_expiry(Utc::now() - Duration::days(1));
        assert!(entry.is_expired());
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let mut entry = Entry::new();
        entry.add_tag("work");
        entry.add_tag(" work ");
        entry.add_tag("   ");
        assert_eq!(entry.tags().len(), 1);
        assert!(entry.has_tag("work"));
    }

    #[test]
    fn attachments_get_unique_names() {
        let mut entry = Entry::new();
        assert_eq!(entry.add_attachment("a.txt", b"1".to_vec()), "a.txt");
        assert_eq!(entry.add_attachment("a.txt", b"2".to_vec()), "a.txt_1");
        assert_eq!(entry.attachments().len(), 2);
    }

    #[test]
    fn set_times_only_overrides_given_values() {
        let mut entry = Entry::new();
        let before = entry.times();
        let created = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        entry.set_times(Some(created), None);
        assert_eq!(entry.times().created, created);
        assert_eq!(entry.times().modified, before.modified);
    }
}
