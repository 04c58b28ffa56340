//! Foreign vault readers and the shared import infrastructure.
//!
//! Each reader module exposes `read(path, password, options)` returning an
//! [`ImportReport`]. [`convert`] dispatches on [`ImportFormat`];
//! [`Importer`] wraps it for callers that want a sentinel-style API.
//!
//! Shared mapping helpers (URL numbering, TOTP installation, address
//! flattening, timestamps) live here so that every format applies them the
//! same way.

pub mod bitwarden;
pub mod opux;
pub mod opvault;
pub mod proton_pass;

mod builder;
mod categories;
mod opdata;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use keyport_crypto_core::TotpSettings;
use serde::Serialize;

use crate::database::Database;
use crate::entry::{Entry, ADDITIONAL_URL_PREFIX, OTP};
use crate::error::ImportError;
use crate::options::ImportOptions;

pub(crate) use builder::TreeBuilder;
pub use categories::category_name;

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Supported source formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportFormat {
    /// 1Password 7 `.opvault` directory.
    OpVault,
    /// 1Password 8 `.1pux` archive.
    Opux,
    /// Bitwarden JSON export, plaintext or password protected.
    Bitwarden,
    /// Proton Pass JSON export.
    ProtonPass,
}

impl ImportFormat {
    pub const ALL: [Self; 4] = [Self::OpVault, Self::Opux, Self::Bitwarden, Self::ProtonPass];

    /// Short name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpVault => "opvault",
            Self::Opux => "1pux",
            Self::Bitwarden => "bitwarden",
            Self::ProtonPass => "protonpass",
        }
    }

    /// Guess the format of `path`.
    ///
    /// Directories and `.opvault` paths are OPVault, `.1pux` files are 1PUX.
    /// JSON files are sniffed: a top-level `vaults` object means Proton Pass,
    /// `items`, `folders` or `encKeyValidation_DO_NOT_EDIT` mean Bitwarden.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Io` if a JSON file cannot be read and
    /// `ImportError::UnsupportedSchema` if nothing matches.
    pub fn detect(path: &Path) -> Result<Self, ImportError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if path.is_dir() || extension == "opvault" {
            return Ok(Self::OpVault);
        }
        if extension == "1pux" {
            return Ok(Self::Opux);
        }
        if extension == "json" {
            let contents = fs::read_to_string(path)?;
            if let Ok(serde_json::Value::Object(root)) = serde_json::from_str(&contents) {
                if root.get("vaults").is_some_and(serde_json::Value::is_object) {
                    return Ok(Self::ProtonPass);
                }
                if ["items", "folders", "encKeyValidation_DO_NOT_EDIT"]
                    .iter()
                    .any(|k| root.contains_key(*k))
                {
                    return Ok(Self::Bitwarden);
                }
            }
        }
        Err(ImportError::UnsupportedSchema(format!(
            "cannot detect the format of {}",
            path.display()
        )))
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImportFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opvault" => Ok(Self::OpVault),
            "1pux" | "opux" => Ok(Self::Opux),
            "bitwarden" => Ok(Self::Bitwarden),
            "protonpass" | "proton-pass" | "proton" => Ok(Self::ProtonPass),
            other => Err(ImportError::UnsupportedSchema(format!(
                "unknown import format: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reports and warnings
// ---------------------------------------------------------------------------

/// Category of a non-fatal problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// The item was not imported at all.
    ItemSkipped,
    /// The item type is unknown; it was imported as a plain note.
    UnsupportedItem,
    /// The item was imported but one of its values could not be mapped.
    FieldIgnored,
}

/// A non-fatal problem with one source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    /// Position of the item in source order.
    pub index: usize,
    /// Item title, empty when unknown.
    pub title: String,
    pub kind: WarningKind,
    pub reason: String,
}

impl ImportWarning {
    /// The equivalent error value.
    #[must_use]
    pub fn to_error(&self) -> ImportError {
        match self.kind {
            WarningKind::UnsupportedItem => ImportError::UnsupportedSchema(format!(
                "item {} ({}): {}",
                self.index, self.title, self.reason
            )),
            WarningKind::ItemSkipped | WarningKind::FieldIgnored => {
                ImportError::PartialItemFailure {
                    index: self.index,
                    title: self.title.clone(),
                    reason: self.reason.clone(),
                }
            }
        }
    }
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::ItemSkipped => write!(f, "{}", self.to_error()),
            WarningKind::UnsupportedItem => write!(
                f,
                "item {} ({}) imported as a note: {}",
                self.index, self.title, self.reason
            ),
            WarningKind::FieldIgnored => write!(
                f,
                "item {} ({}): {}",
                self.index, self.title, self.reason
            ),
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug)]
pub struct ImportReport {
    pub database: Database,
    pub warnings: Vec<ImportWarning>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Convert the vault at `path` into a fresh [`Database`].
///
/// `password` is required for OPVault and for password-protected Bitwarden
/// exports; other formats ignore it.
///
/// # Errors
///
/// Returns the first container-level failure. Problems with single items are
/// reported in [`ImportReport::warnings`] instead.
pub fn convert(
    format: ImportFormat,
    path: &Path,
    password: Option<&str>,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    tracing::debug!(%format, path = %path.display(), "starting import");
    match format {
        ImportFormat::OpVault => {
            let password = password.ok_or_else(|| {
                ImportError::DecryptionFailed("an OPVault password is required".into())
            })?;
            opvault::read(path, password, options)
        }
        ImportFormat::Opux => opux::read(path, options),
        ImportFormat::Bitwarden => bitwarden::read(path, password, options),
        ImportFormat::ProtonPass => proton_pass::read(path, options),
    }
}

/// Stateful wrapper around [`convert`] that keeps the last error.
///
/// Every call to [`Importer::convert`] clears the previous error and
/// warnings.
#[derive(Debug)]
pub struct Importer {
    format: ImportFormat,
    options: ImportOptions,
    error: Option<ImportError>,
    warnings: Vec<ImportWarning>,
}

impl Importer {
    #[must_use]
    pub fn new(format: ImportFormat) -> Self {
        Self::with_options(format, ImportOptions::default())
    }

    #[must_use]
    pub const fn with_options(format: ImportFormat, options: ImportOptions) -> Self {
        Self {
            format,
            options,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Run one conversion. Returns `None` on a fatal error, see
    /// [`Importer::error_string`].
    pub fn convert(&mut self, path: &Path, password: Option<&str>) -> Option<Database> {
        self.error = None;
        self.warnings.clear();
        match convert(self.format, path, password, &self.options) {
            Ok(report) => {
                self.warnings = report.warnings;
                Some(report.database)
            }
            Err(e) => {
                tracing::warn!(format = %self.format, "import failed: {e}");
                self.error = Some(e);
                None
            }
        }
    }

    #[must_use]
    pub const fn format(&self) -> ImportFormat {
        self.format
    }

    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Human-readable error of the last call, empty on success.
    #[must_use]
    pub fn error_string(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ImportError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }
}

// ---------------------------------------------------------------------------
// Shared mapping helpers
// ---------------------------------------------------------------------------

/// Set the primary URL and number the rest as `KP2A_URL_<n>`.
///
/// The first non-blank URL becomes the primary one unless the entry already
/// has a URL. Blank URLs and repeats of the primary URL are skipped.
pub(crate) fn add_urls<'a, I>(entry: &mut Entry, urls: I)
where
    I: IntoIterator<Item = &'a str>,
{
    for url in urls {
        if url.trim().is_empty() {
            continue;
        }
        if entry.url().is_empty() {
            entry.set_url(url);
            continue;
        }
        if url == entry.url() {
            continue;
        }
        let mut n: usize = 1;
        loop {
            let key = format!("{ADDITIONAL_URL_PREFIX}{n}");
            match entry.attributes().get(&key) {
                Some(existing) if existing.value() == url => break,
                Some(_) => n = n.saturating_add(1),
                None => {
                    entry.set_attribute(key, url, false);
                    break;
                }
            }
        }
    }
}

/// Install `value` as the entry's TOTP.
///
/// When TOTP is already set, the raw value is kept under the next free
/// `otp_<n>` key instead (once). A value that does not parse is kept the
/// same way and reported through `Err`.
pub(crate) fn apply_otp(entry: &mut Entry, value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    if entry.has_totp() {
        store_extra_otp(entry, value);
        return Ok(());
    }
    let installed = TotpSettings::parse(value).and_then(|settings| entry.set_totp(settings));
    if let Err(e) = installed {
        store_extra_otp(entry, value);
        return Err(format!("TOTP value kept as a plain attribute: {e}"));
    }
    Ok(())
}

fn store_extra_otp(entry: &mut Entry, value: &str) {
    let prefix = format!("{OTP}_");
    let already_stored = entry
        .attributes()
        .iter()
        .any(|(k, a)| k.starts_with(&prefix) && a.value() == value);
    if already_stored {
        return;
    }
    let mut n: usize = 1;
    while entry.attributes().contains(&format!("{prefix}{n}")) {
        n = n.saturating_add(1);
    }
    entry.set_attribute(format!("{prefix}{n}"), value, true);
}

/// Flatten an address into `street\ncity, state zip\ncountry`.
///
/// Blank components are skipped; the others are copied untouched.
pub(crate) fn format_address(
    street: &[&str],
    city: &str,
    state: &str,
    zip: &str,
    country: &str,
) -> String {
    let present = |s: &&str| !s.trim().is_empty();
    let mut lines: Vec<String> = street
        .iter()
        .copied()
        .filter(present)
        .map(str::to_owned)
        .collect();

    let mut locality = String::new();
    if present(&city) {
        locality.push_str(city);
    }
    if present(&state) {
        if !locality.is_empty() {
            locality.push_str(", ");
        }
        locality.push_str(state);
    }
    if present(&zip) {
        if !locality.is_empty() {
            locality.push(' ');
        }
        locality.push_str(zip);
    }
    if !locality.is_empty() {
        lines.push(locality);
    }
    if present(&country) {
        lines.push(country.to_owned());
    }
    lines.join("\n")
}

/// Display text of a JSON value: strings unquoted, `null` empty, anything
/// else in its JSON form.
pub(crate) fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Unix seconds to UTC.
pub(crate) fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// RFC 3339 timestamp to UTC.
pub(crate) fn from_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Last second of `month` in `year`.
pub(crate) fn end_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month.checked_add(1)?)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?;
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc()
        .checked_sub_signed(Duration::seconds(1))
}

/// `YYYYMM` (or `YYYY-MM`, `MM/YYYY`) to the end of that month.
pub(crate) fn month_year_expiry(value: &str) -> Option<DateTime<Utc>> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 6 {
        return None;
    }
    let (a, b) = digits.split_at(4);
    if let (Ok(year), Ok(month)) = (a.parse::<i32>(), b.parse::<u32>()) {
        if (1..=12).contains(&month) {
            return end_of_month(year, month);
        }
    }
    // MMYYYY
    let (a, b) = digits.split_at(2);
    end_of_month(b.parse().ok()?, a.parse().ok()?)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn format_names_parse_back() {
        for format in ImportFormat::ALL {
            assert_eq!(format.name().parse::<ImportFormat>().unwrap(), format);
        }
        assert_eq!("OPUX".parse::<ImportFormat>().unwrap(), ImportFormat::Opux);
        assert_eq!("proton-pass".parse::<ImportFormat>().unwrap(), ImportFormat::ProtonPass);
        assert!(matches!(
            "lastpass".parse::<ImportFormat>(),
            Err(ImportError::UnsupportedSchema(_))
        ));
    }

    #[test]
    fn detect_by_path_and_content() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ImportFormat::detect(dir.path()).unwrap(), ImportFormat::OpVault);
        assert_eq!(
            ImportFormat::detect(&dir.path().join("export.1pux")).unwrap(),
            ImportFormat::Opux
        );

        let proton = dir.path().join("proton.json");
        fs::File::create(&proton)
            .unwrap()
            .write_all(br#"{"encrypted":false,"vaults":{}}"#)
            .unwrap();
        assert_eq!(ImportFormat::detect(&proton).unwrap(), ImportFormat::ProtonPass);

        let bitwarden = dir.path().join("bitwarden.json");
        fs::write(&bitwarden, r#"{"encrypted":false,"folders":[],"items":[]}"#).unwrap();
        assert_eq!(ImportFormat::detect(&bitwarden).unwrap(), ImportFormat::Bitwarden);

        let other = dir.path().join("other.json");
        fs::write(&other, r#"{"hello":"world"}"#).unwrap();
        assert!(ImportFormat::detect(&other).is_err());
    }

    #[test]
    fn urls_are_numbered_in_order_without_repeats() {
        let mut entry = Entry::new();
        add_urls(
            &mut entry,
            ["https://a.example", "", "https://b.example", "https://a.example", "https://c.example"],
        );
        assert_eq!(entry.url(), "https://a.example");
        assert_eq!(entry.attribute("KP2A_URL_1"), "https://b.example");
        assert_eq!(entry.attribute("KP2A_URL_2"), "https://c.example");
        assert!(!entry.attributes().contains("KP2A_URL_3"));

        // Same list again changes nothing.
        let before = entry.attributes().clone();
        add_urls(&mut entry, ["https://a.example", "https://b.example", "https://c.example"]);
        assert_eq!(entry.attributes(), &before);
    }

    #[test]
    fn otp_is_first_wins_and_extra_values_are_idempotent() {
        let mut entry = Entry::new();
        entry.set_title("Complex");
        apply_otp(
            &mut entry,
            "otpauth://totp/Complex?secret=JBSWY3DPEHPK3PXP&digits=8&period=45",
        )
        .unwrap();
        apply_otp(&mut entry, "otpauth://test.url?digits=6").unwrap();
        apply_otp(&mut entry, "otpauth://test.url?digits=6").unwrap();

        let totp = entry.totp().unwrap();
        assert_eq!((totp.digits(), totp.step()), (8, 45));
        assert_eq!(entry.attribute("otp_1"), "otpauth://test.url?digits=6");
        assert!(entry.attributes().is_protected("otp_1"));
        assert!(!entry.attributes().contains("otp_2"));
    }

    #[test]
    fn unparsable_otp_is_kept_and_reported() {
        let mut entry = Entry::new();
        assert!(apply_otp(&mut entry, "not a seed!").is_err());
        assert!(!entry.has_totp());
        assert_eq!(entry.attribute("otp_1"), "not a seed!");
    }

    #[test]
    fn address_keeps_whitespace_and_skips_blanks() {
        assert_eq!(
            format_address(
                &[" 1 North Calle Cesar Chavez ", "", ""],
                "Santa Barbara",
                "CA",
                "93103",
                "United States "
            ),
            " 1 North Calle Cesar Chavez \nSanta Barbara, CA 93103\nUnited States "
        );
        assert_eq!(format_address(&["Main St"], "", "", "12345", ""), "Main St\n12345");
        assert_eq!(format_address(&[], "", "", "", ""), "");
    }

    #[test]
    fn month_year_expiry_is_end_of_month() {
        let t = month_year_expiry("202206").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2022, 6, 30));
        let t = month_year_expiry("2023-12").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2023, 12, 31));
        let t = month_year_expiry("02/2024").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 2, 29));
        assert!(month_year_expiry("soon").is_none());
    }

    #[test]
    fn warnings_map_to_errors() {
        let skipped = ImportWarning {
            index: 2,
            title: "Bank".into(),
            kind: WarningKind::ItemSkipped,
            reason: "bad key".into(),
        };
        assert!(matches!(
            skipped.to_error(),
            ImportError::PartialItemFailure { index: 2, .. }
        ));
        let unsupported = ImportWarning {
            kind: WarningKind::UnsupportedItem,
            ..skipped
        };
        assert!(matches!(unsupported.to_error(), ImportError::UnsupportedSchema(_)));
    }

    #[test]
    fn json_text_unquotes_strings_only() {
        assert_eq!(json_text(&serde_json::json!(null)), "");
        assert_eq!(json_text(&serde_json::json!("a b")), "a b");
        assert_eq!(json_text(&serde_json::json!(42)), "42");
        assert_eq!(json_text(&serde_json::json!(true)), "true");
        assert_eq!(json_text(&serde_json::json!(["x"])), r#"["x"]"#);
    }

    #[test]
    fn importer_keeps_error_until_next_call() {
        let dir = TempDir::new().unwrap();
        let mut importer = Importer::new(ImportFormat::ProtonPass);
        assert!(importer.convert(&dir.path().join("missing.json"), None).is_none());
        assert!(importer.has_error());
        assert!(!importer.error_string().is_empty());

        let path = dir.path().join("ok.json");
        fs::write(&path, r#"{"encrypted":false,"vaults":{}}"#).unwrap();
        assert!(importer.convert(&path, None).is_some());
        assert!(!importer.has_error());
        assert!(importer.error_string().is_empty());
    }
}
