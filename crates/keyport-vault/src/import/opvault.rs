//! 1Password 7 OPVault reader.
//!
//! An `.opvault` directory holds `default/profile.js` (key derivation
//! parameters and the wrapped master/overview keys), sixteen
//! `default/band_X.js` files with the items, and one
//! `default/<ITEM>_<ATTACHMENT>.attachment` file per attachment.
//!
//! Key hierarchy: PBKDF2-HMAC-SHA512 of the password gives the 64-byte
//! derived key pair, which unwraps the master and overview key pairs. Each
//! item carries its own key pair (`k`) wrapped under the master keys; the
//! overview (`o`) is under the overview keys and the details (`d`) under the
//! item keys.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use keyport_crypto_core::{decode_base64, derive_key, EncMacKey, KdfParams, Pbkdf2Params, PrfAlgorithm};
use serde::Deserialize;
use serde_json::Value;

use super::categories::{category_code, category_label, PASSWORD};
use super::opdata::{decrypt_opdata01, split_attachment, unwrap_item_key, unwrap_profile_key};
use super::{
    add_urls, apply_otp, from_unix, json_text, month_year_expiry, ImportFormat, ImportReport,
    TreeBuilder, WarningKind,
};
use crate::entry::Entry;
use crate::error::ImportError;
use crate::options::ImportOptions;

const PROFILE_DIR: &str = "default";
const BAND_NAMES: &str = "0123456789ABCDEF";
const DERIVED_KEY_LEN: usize = 64;

// ---------------------------------------------------------------------------
// On-disk structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    salt: String,
    iterations: u32,
    master_key: String,
    overview_key: String,
}

#[derive(Debug, Deserialize)]
struct BandItem {
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    o: String,
    #[serde(default)]
    d: String,
    #[serde(default)]
    k: String,
    #[serde(default)]
    trashed: bool,
    #[serde(default)]
    fave: Option<Value>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    updated: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overview {
    title: String,
    url: String,
    #[serde(rename = "URLs")]
    urls: Vec<OverviewUrl>,
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OverviewUrl {
    u: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Details {
    fields: Vec<DetailField>,
    notes_plain: String,
    password: Option<String>,
    sections: Vec<Section>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailField {
    designation: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Section {
    title: String,
    fields: Vec<SectionField>,
}

/// One `{k, n, t, v}` field of a details section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SectionField {
    /// Kind: `string`, `concealed`, `date`, `monthYear`, `address`, ...
    pub k: String,
    /// Machine name, e.g. `TOTP_1A2B` or `ccnum`.
    pub n: String,
    /// Display title.
    pub t: String,
    /// Value; a string, a number or (for addresses) an object.
    pub v: Value,
}

impl SectionField {
    #[must_use]
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            k: "string".into(),
            n: name.into(),
            t: String::new(),
            v: Value::String(value.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttachmentMetadata {
    overview: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentOverview {
    filename: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read the `.opvault` directory at `path`.
///
/// Items whose keys or payloads fail to decrypt are skipped with a warning;
/// if that leaves nothing at all, the import fails with `DecryptionFailed`.
///
/// # Errors
///
/// - `MalformedContainer` for a missing or unreadable profile or band
/// - `DecryptionFailed` for a wrong password
/// - `Io` for file system errors
pub fn read(path: &Path, password: &str, options: &ImportOptions) -> Result<ImportReport, ImportError> {
    let profile_dir = path.join(PROFILE_DIR);
    let profile_text = fs::read_to_string(profile_dir.join("profile.js")).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ImportError::MalformedContainer(format!(
                "{} has no {PROFILE_DIR}/profile.js",
                path.display()
            ))
        } else {
            ImportError::Io(e)
        }
    })?;
    let profile: Profile = serde_json::from_str(strip_js_wrapper(&profile_text)?)
        .map_err(|e| ImportError::MalformedContainer(format!("invalid profile.js: {e}")))?;

    let kdf = KdfParams::Pbkdf2(Pbkdf2Params {
        prf: PrfAlgorithm::HmacSha512,
        iterations: profile.iterations,
    });
    kdf.check(&options.kdf_limits())?;
    let salt = decode_base64(&profile.salt)?;
    let derived = derive_key(password.as_bytes(), &salt, &kdf, DERIVED_KEY_LEN)?;
    let derived = EncMacKey::from_concatenated(derived.expose())?;

    let master = unwrap_profile_key(&decode_base64(&profile.master_key)?, &derived)?;
    let overview = unwrap_profile_key(&decode_base64(&profile.overview_key)?, &derived)?;
    let keys = VaultKeys { master, overview };

    let items = read_bands(&profile_dir)?;
    let attachments = list_attachments(&profile_dir)?;

    let root_name = path
        .file_stem()
        .map_or_else(|| "OPVault".to_owned(), |s| s.to_string_lossy().into_owned());
    let mut builder = TreeBuilder::new(&root_name, options);

    let mut failures: usize = 0;
    for (index, (uuid, raw)) in items.iter().enumerate() {
        let mut item = match BandItem::deserialize(raw) {
            Ok(item) => item,
            Err(e) => {
                builder.warn(index, "", WarningKind::ItemSkipped, format!("unreadable item {uuid}: {e}"));
                continue;
            }
        };
        if item.uuid.is_empty() {
            item.uuid.clone_from(uuid);
        }
        let files = attachments.get(&item.uuid).map_or(&[][..], Vec::as_slice);
        if let Err(e) = import_item(&mut builder, &keys, &profile_dir, index, &item, files) {
            failures = failures.saturating_add(1);
            builder.warn(index, "", WarningKind::ItemSkipped, e.to_string());
        }
    }

    if failures > 0 && builder.db().entry_count() == 0 {
        return Err(ImportError::DecryptionFailed(format!(
            "none of the {failures} items could be decrypted"
        )));
    }
    Ok(builder.finish(ImportFormat::OpVault))
}

/// Apply one details-section field to `entry`.
///
/// Attribute names are `<section>_<title>`, or the title alone for an
/// untitled section. `TOTP_*` fields install TOTP (first wins; later values
/// are kept under `otp_<n>`). Fields whose name or title mentions an expiry
/// also set the entry's expiry time.
///
/// # Errors
///
/// Returns a reason when the value could only be stored in raw form.
pub fn fill_from_section_field(entry: &mut Entry, section: &str, field: &SectionField) -> Result<(), String> {
    if field.n.starts_with("TOTP_") {
        return apply_otp(entry, &json_text(&field.v));
    }

    let label = if field.t.is_empty() { &field.n } else { &field.t };

    // Scalar addresses fall through and are stored as text.
    if field.k == "address" {
        if let Value::Object(parts) = &field.v {
            for (part, value) in parts {
                let text = json_text(value);
                if !text.is_empty() {
                    entry.add_attribute(&format!("{label}_{part}"), text, false);
                }
            }
            return Ok(());
        }
    }

    let text = json_text(&field.v);
    if text.is_empty() {
        return Ok(());
    }

    if section.is_empty() && fill_standard_field(entry, &field.n, &field.t, &text) {
        return Ok(());
    }

    let is_expiry = [&field.n, &field.t]
        .iter()
        .any(|s| s.to_lowercase().contains("expir"));
    let text = match field.k.as_str() {
        "date" => match field.v.as_i64().and_then(from_unix) {
            Some(when) => {
                if is_expiry {
                    entry.set_expiry(when);
                }
                when.format("%Y-%m-%d").to_string()
            }
            None => text,
        },
        "monthYear" => {
            if is_expiry {
                if let Some(when) = month_year_expiry(&text) {
                    entry.set_expiry(when);
                }
            }
            text
        }
        _ => text,
    };

    let name = if section.is_empty() {
        label.clone()
    } else {
        format!("{section}_{label}")
    };
    entry.add_attribute(&name, text, field.k == "concealed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct VaultKeys {
    master: EncMacKey,
    overview: EncMacKey,
}

/// `var profile={...};` and `ld({...});` to the JSON object inside.
fn strip_js_wrapper(text: &str) -> Result<&str, ImportError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(text.get(start..=end).unwrap_or_default()),
        _ => Err(ImportError::MalformedContainer(
            "no JSON object in OPVault file".into(),
        )),
    }
}

/// Raw items of every band, keyed by UUID. Items are decoded one at a time
/// later so that a single bad item does not sink its band.
fn read_bands(profile_dir: &Path) -> Result<Vec<(String, Value)>, ImportError> {
    let mut items = Vec::new();
    for band in BAND_NAMES.chars() {
        let path = profile_dir.join(format!("band_{band}.js"));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let band_items: BTreeMap<String, Value> = serde_json::from_str(strip_js_wrapper(&text)?)
            .map_err(|e| ImportError::MalformedContainer(format!("invalid band_{band}.js: {e}")))?;
        tracing::debug!(band = %band, items = band_items.len(), "read band");
        items.extend(band_items);
    }
    Ok(items)
}

/// Attachment file names keyed by item UUID.
fn list_attachments(profile_dir: &Path) -> Result<BTreeMap<String, Vec<String>>, ImportError> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for dirent in fs::read_dir(profile_dir)? {
        let name = dirent?.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(".attachment") else {
            continue;
        };
        if let Some((item, _)) = stem.split_once('_') {
            out.entry(item.to_owned()).or_default().push(name.clone());
        }
    }
    for files in out.values_mut() {
        files.sort();
    }
    Ok(out)
}

fn import_item(
    builder: &mut TreeBuilder<'_>,
    keys: &VaultKeys,
    profile_dir: &Path,
    index: usize,
    item: &BandItem,
    attachment_files: &[String],
) -> Result<(), ImportError> {
    let item_key = unwrap_item_key(&decode_base64(&item.k)?, &keys.master)?;
    let overview: Overview = decrypt_json(&item.o, &keys.overview)?;
    let details: Details = decrypt_json(&item.d, &item_key)?;

    let mut entry = Entry::new();
    entry.set_title(overview.title.as_str());
    add_urls(
        &mut entry,
        std::iter::once(overview.url.as_str()).chain(overview.urls.iter().map(|u| u.u.as_str())),
    );
    for tag in &overview.tags {
        entry.add_tag(tag);
    }
    if item.fave.as_ref().is_some_and(|f| !f.is_null()) {
        builder.mark_favorite(&mut entry);
    }
    entry.set_times(item.created.and_then(from_unix), item.updated.and_then(from_unix));

    for field in &details.fields {
        let text = json_text(&field.value);
        match field.designation.as_str() {
            "username" => entry.set_username(text),
            "password" => entry.set_password(text),
            _ if !text.is_empty() && !field.name.is_empty() => {
                entry.add_attribute(&field.name, text, field.kind == "P");
            }
            _ => {}
        }
    }
    if let Some(password) = &details.password {
        if category_code(&item.category) == Some(PASSWORD) || entry.password().is_empty() {
            entry.set_password(password.as_str());
        }
    }
    if !details.notes_plain.is_empty() {
        entry.set_notes(details.notes_plain.as_str());
    }
    for section in &details.sections {
        for field in &section.fields {
            if let Err(reason) = fill_from_section_field(&mut entry, &section.title, field) {
                let title = entry.title().to_owned();
                builder.warn(index, &title, WarningKind::FieldIgnored, reason);
            }
        }
    }

    for file in attachment_files {
        if let Err(e) = attach_file(&mut entry, keys, &item_key, &profile_dir.join(file)) {
            let title = entry.title().to_owned();
            builder.warn(
                index,
                &title,
                WarningKind::FieldIgnored,
                format!("attachment {file} not imported: {e}"),
            );
        }
    }

    let group = if item.trashed {
        builder.recycle_bin()
    } else {
        let root = builder.root();
        builder.group(root, &category_label(&item.category))
    };
    builder.insert(group, entry);
    Ok(())
}

fn attach_file(
    entry: &mut Entry,
    keys: &VaultKeys,
    item_key: &EncMacKey,
    path: &Path,
) -> Result<(), ImportError> {
    let data = fs::read(path)?;
    let parts = split_attachment(&data)?;
    let metadata: AttachmentMetadata = serde_json::from_slice(parts.metadata)
        .map_err(|e| ImportError::MalformedContainer(format!("invalid attachment metadata: {e}")))?;
    let overview: AttachmentOverview = decrypt_json(&metadata.overview, &keys.overview)?;
    let content = decrypt_opdata01(parts.content, item_key)?;
    entry.add_attachment(&overview.filename, content.expose().to_vec());
    Ok(())
}

fn decrypt_json<T: for<'de> Deserialize<'de>>(b64: &str, key: &EncMacKey) -> Result<T, ImportError> {
    let plaintext = decrypt_opdata01(&decode_base64(b64)?, key)?;
    serde_json::from_slice(plaintext.expose())
        .map_err(|e| ImportError::MalformedContainer(format!("decrypted payload is not JSON: {e}")))
}

/// Fill username / password / URL from an untitled section. Returns whether
/// the value was consumed.
fn fill_standard_field(entry: &mut Entry, name: &str, title: &str, value: &str) -> bool {
    let is = |s: &str| name.eq_ignore_ascii_case(s) || title.eq_ignore_ascii_case(s);
    if is("password") && entry.password().is_empty() {
        entry.set_password(value);
        true
    } else if is("username") && entry.username().is_empty() {
        entry.set_username(value);
        true
    } else if is("url") || is("website") {
        add_urls(entry, [value]);
        true
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
