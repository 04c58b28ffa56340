//! 1Password 8 `.1pux` reader.
//!
//! A 1PUX file is a zip archive holding `export.data` (JSON: accounts →
//! vaults → items) and a `files/` directory with attachments and vault
//! avatars. Nothing in it is encrypted.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use zip::result::ZipError;
use zip::ZipArchive;

use super::categories::category_label;
use super::{
    add_urls, format_address, from_unix, json_text, ImportFormat, ImportReport, TreeBuilder,
    WarningKind,
};
use crate::database::GroupId;
use crate::entry::Entry;
use crate::error::ImportError;
use crate::options::ImportOptions;

const EXPORT_DATA: &str = "export.data";
const FILES_DIR: &str = "files/";

// ---------------------------------------------------------------------------
// export.data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Export {
    accounts: Vec<Account>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Account {
    vaults: Vec<Vault>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Vault {
    attrs: VaultAttrs,
    /// Kept raw so that one bad item does not sink the whole vault.
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VaultAttrs {
    name: String,
    avatar: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    fav_index: i64,
    created_at: Option<i64>,
    updated_at: Option<i64>,
    state: String,
    category_uuid: String,
    details: ItemDetails,
    overview: ItemOverview,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemDetails {
    login_fields: Vec<LoginField>,
    notes_plain: String,
    sections: Vec<DetailSection>,
    password: Option<String>,
    document_attributes: Option<FileRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LoginField {
    value: String,
    name: String,
    field_type: String,
    designation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailSection {
    title: String,
    fields: Vec<DetailField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailField {
    title: String,
    id: String,
    /// Single-key object: `{"<kind>": <payload>}`.
    value: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileRef {
    file_name: String,
    document_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemOverview {
    title: String,
    url: String,
    urls: Vec<OverviewUrl>,
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OverviewUrl {
    url: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read the `.1pux` archive at `path`. The root group is named after the
/// file stem.
///
/// # Errors
///
/// - `Io` if the file cannot be opened
/// - `MalformedContainer` if it is not a zip or `export.data` is missing or
///   not valid JSON
pub fn read(path: &Path, options: &ImportOptions) -> Result<ImportReport, ImportError> {
    let file = File::open(path)?;
    let root_name = path
        .file_stem()
        .map_or_else(|| "1Password".to_owned(), |s| s.to_string_lossy().into_owned());
    read_archive(file, &root_name, options)
}

/// Read a 1PUX archive from any seekable reader.
///
/// # Errors
///
/// See [`read`].
pub fn read_archive<R: Read + Seek>(
    reader: R,
    root_name: &str,
    options: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let mut archive = Archive::open(reader)?;
    let data = archive
        .read(EXPORT_DATA)?
        .ok_or_else(|| ImportError::MalformedContainer(format!("archive has no {EXPORT_DATA}")))?;
    let export: Export = serde_json::from_slice(&data)
        .map_err(|e| ImportError::MalformedContainer(format!("invalid {EXPORT_DATA}: {e}")))?;

    let mut builder = TreeBuilder::new(root_name, options);
    let mut index: usize = 0;
    for vault in export.accounts.iter().flat_map(|a| &a.vaults) {
        let root = builder.root();
        let group = builder.group(root, &vault.attrs.name);
        set_vault_icon(&mut builder, &mut archive, group, &vault.attrs.avatar);

        for raw in &vault.items {
            match Item::deserialize(raw) {
                Ok(item) => import_item(&mut builder, &mut archive, group, index, &item),
                Err(e) => {
                    let title = raw
                        .pointer("/overview/title")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    builder.warn(index, title, WarningKind::ItemSkipped, format!("unreadable item: {e}"));
                }
            }
            index = index.saturating_add(1);
        }
    }
    Ok(builder.finish(ImportFormat::Opux))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct Archive<R> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> Archive<R> {
    fn open(reader: R) -> Result<Self, ImportError> {
        let zip = ZipArchive::new(reader)
            .map_err(|e| ImportError::MalformedContainer(format!("not a 1PUX archive: {e}")))?;
        Ok(Self { zip })
    }

    /// Contents of `name`, `None` if absent.
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, ImportError> {
        let mut file = match self.zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(ImportError::MalformedContainer(format!("cannot read {name}: {e}")))
            }
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// `files/<documentId>__<fileName>`, or any `files/` entry ending with
    /// the file name.
    fn read_document(&mut self, file: &FileRef) -> Result<Option<Vec<u8>>, ImportError> {
        let exact = format!("{FILES_DIR}{}__{}", file.document_id, file.file_name);
        if let Some(data) = self.read(&exact)? {
            return Ok(Some(data));
        }
        let fallback = self
            .zip
            .file_names()
            .find(|n| n.starts_with(FILES_DIR) && n.ends_with(file.file_name.as_str()))
            .map(str::to_owned);
        match fallback {
            Some(name) => self.read(&name),
            None => Ok(None),
        }
    }
}

fn set_vault_icon<R: Read + Seek>(
    builder: &mut TreeBuilder<'_>,
    archive: &mut Archive<R>,
    group: GroupId,
    avatar: &str,
) {
    if avatar.is_empty() {
        return;
    }
    match archive.read(&format!("{FILES_DIR}{avatar}")) {
        Ok(Some(data)) => {
            let db = builder.db_mut();
            let icon = db.add_custom_icon(data);
            db.set_group_icon(group, icon);
        }
        Ok(None) => tracing::warn!(avatar, "vault avatar missing from archive"),
        Err(e) => tracing::warn!(avatar, error = %e, "vault avatar unreadable"),
    }
}

fn import_item<R: Read + Seek>(
    builder: &mut TreeBuilder<'_>,
    archive: &mut Archive<R>,
    group: GroupId,
    index: usize,
    item: &Item,
) {
    let mut entry = Entry::new();
    entry.set_title(item.overview.title.as_str());
    add_urls(
        &mut entry,
        std::iter::once(item.overview.url.as_str())
            .chain(item.overview.urls.iter().map(|u| u.url.as_str())),
    );
    for tag in &item.overview.tags {
        entry.add_tag(tag);
    }
    if item.fav_index > 0 {
        builder.mark_favorite(&mut entry);
    }
    if item.state == "archived" {
        builder.mark_archived(&mut entry);
    }
    entry.set_times(
        item.created_at.and_then(from_unix),
        item.updated_at.and_then(from_unix),
    );

    let details = &item.details;
    for field in &details.login_fields {
        match field.designation.as_str() {
            "username" => entry.set_username(field.value.as_str()),
            "password" => entry.set_password(field.value.as_str()),
            _ if !field.value.is_empty() && !field.name.is_empty() => {
                entry.add_attribute(&field.name, field.value.as_str(), field.field_type == "P");
            }
            _ => {}
        }
    }
    if let Some(password) = &details.password {
        entry.set_password(password.as_str());
    }
    if !details.notes_plain.is_empty() {
        entry.set_notes(details.notes_plain.as_str());
    }

    let category = category_label(&item.category_uuid);
    for section in &details.sections {
        let prefix = if section.title.is_empty() {
            format!("{category} Fields")
        } else {
            section.title.clone()
        };
        for field in &section.fields {
            apply_field(builder, archive, &mut entry, index, &prefix, field);
        }
    }

    if let Some(document) = &details.document_attributes {
        attach(builder, archive, &mut entry, index, document);
    }

    builder.insert(group, entry);
}

fn apply_field<R: Read + Seek>(
    builder: &mut TreeBuilder<'_>,
    archive: &mut Archive<R>,
    entry: &mut Entry,
    index: usize,
    prefix: &str,
    field: &DetailField,
) {
    let label = if field.title.is_empty() { &field.id } else { &field.title };
    let name = format!("{prefix}_{label}");
    let Some((kind, payload)) = field.value.iter().next() else {
        return;
    };

    let (text, protected) = match kind.as_str() {
        "totp" => {
            builder.apply_otp(index, entry, &json_text(payload));
            return;
        }
        "file" => {
            match FileRef::deserialize(payload) {
                Ok(file) => attach(builder, archive, entry, index, &file),
                Err(e) => {
                    let title = entry.title().to_owned();
                    builder.warn(
                        index,
                        &title,
                        WarningKind::FieldIgnored,
                        format!("file field {name} is unreadable: {e}"),
                    );
                }
            }
            return;
        }
        "concealed" => (json_text(payload), true),
        "date" => (
            payload
                .as_i64()
                .and_then(from_unix)
                .map_or_else(|| json_text(payload), |d| d.format("%Y-%m-%d").to_string()),
            false,
        ),
        "email" => (
            payload
                .get("email_address")
                .map_or_else(|| json_text(payload), json_text),
            false,
        ),
        "sshKey" => (
            payload
                .get("privateKey")
                .map_or_else(|| json_text(payload), json_text),
            true,
        ),
        "address" => {
            let part = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or_default();
            (
                format_address(&[part("street")], part("city"), part("state"), part("zip"), part("country")),
                false,
            )
        }
        _ if payload.is_object() || payload.is_array() => {
            let title = entry.title().to_owned();
            builder.warn(
                index,
                &title,
                WarningKind::FieldIgnored,
                format!("field {name} has unsupported kind {kind}"),
            );
            return;
        }
        // string, url, phone, menu, monthYear, creditCardNumber, ...
        _ => (json_text(payload), false),
    };

    if !text.is_empty() {
        entry.add_attribute(&name, text, protected);
    }
}

fn attach<R: Read + Seek>(
    builder: &mut TreeBuilder<'_>,
    archive: &mut Archive<R>,
    entry: &mut Entry,
    index: usize,
    file: &FileRef,
) {
    if file.file_name.is_empty() {
        return;
    }
    let reason = match archive.read_document(file) {
        Ok(Some(data)) => {
            entry.add_attachment(&file.file_name, data);
            return;
        }
        Ok(None) => format!("attachment {} missing from archive", file.file_name),
        Err(e) => format!("attachment {} unreadable: {e}", file.file_name),
    };
    let title = entry.title().to_owned();
    builder.warn(index, &title, WarningKind::FieldIgnored, reason);
}

