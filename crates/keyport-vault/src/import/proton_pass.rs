//! Proton Pass plaintext JSON export reader.

use std::fs;
use std::path::Path;

use chrono::Utc;
use keyport_crypto_core::TotpSettings;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{add_urls, from_unix, json_text, ImportFormat, ImportReport, TreeBuilder, WarningKind};
use crate::entry::Entry;
use crate::error::ImportError;
use crate::options::ImportOptions;

/// Item state of an item sitting in the Proton Pass trash.
const STATE_TRASHED: u8 = 2;

const CARD_PROTECTED: [&str; 2] = ["pin", "verificationCode"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Export {
    encrypted: bool,
    vaults: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Vault {
    name: String,
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    data: ItemData,
    state: u8,
    pinned: bool,
    alias_email: Option<String>,
    create_time: Option<i64>,
    modify_time: Option<i64>,
    delete_time: Option<i64>,
    trash_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemData {
    metadata: ItemMetadata,
    extra_fields: Vec<ExtraField>,
    #[serde(rename = "type")]
    kind: String,
    content: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemMetadata {
    name: String,
    note: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ExtraField {
    field_name: String,
    #[serde(rename = "type")]
    kind: String,
    data: Map<String, Value>,
}

impl Item {
    fn is_deleted(&self) -> bool {
        self.state == STATE_TRASHED || self.delete_time.is_some() || self.trash_time.is_some()
    }

    fn deletion_time(&self) -> Option<i64> {
        self.delete_time.or(self.trash_time).or(self.modify_time)
    }
}

/// Read the Proton Pass export at `path`. The root group is named after the
/// file stem.
///
/// # Errors
///
/// See [`read_json`].
pub fn read(path: &Path, options: &ImportOptions) -> Result<ImportReport, ImportError> {
    let text = fs::read_to_string(path)?;
    let root_name = path
        .file_stem()
        .map_or_else(|| "Proton Pass".to_owned(), |s| s.to_string_lossy().into_owned());
    read_json(&text, &root_name, options)
}

/// Convert a Proton Pass export held in memory.
///
/// # Errors
///
/// - `MalformedContainer` for invalid JSON or a vault that is not an object
/// - `UnsupportedSchema` for PGP-encrypted exports
pub fn read_json(json: &str, root_name: &str, options: &ImportOptions) -> Result<ImportReport, ImportError> {
    let export: Export = serde_json::from_str(json)
        .map_err(|e| ImportError::MalformedContainer(format!("invalid Proton Pass JSON: {e}")))?;
    if export.encrypted {
        return Err(ImportError::UnsupportedSchema(
            "encrypted Proton Pass exports are not supported; export without encryption".into(),
        ));
    }

    let mut builder = TreeBuilder::new(root_name, options);
    let mut index = 0usize;
    for (id, raw) in &export.vaults {
        let vault = Vault::deserialize(raw)
            .map_err(|e| ImportError::MalformedContainer(format!("vault {id}: {e}")))?;
        let name = if vault.name.is_empty() { id.as_str() } else { vault.name.as_str() };
        let group = builder.group(builder.root(), name);

        for raw in &vault.items {
            match Item::deserialize(raw) {
                Ok(item) => {
                    let entry = convert_item(&mut builder, index, &item);
                    builder.insert(group, entry);
                }
                Err(e) => {
                    let title = raw
                        .pointer("/data/metadata/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    builder.warn(index, title, WarningKind::ItemSkipped, format!("unreadable item: {e}"));
                }
            }
            index = index.saturating_add(1);
        }
    }
    Ok(builder.finish(ImportFormat::ProtonPass))
}

fn convert_item(builder: &mut TreeBuilder<'_>, index: usize, item: &Item) -> Entry {
    let data = &item.data;
    let mut entry = Entry::new();
    entry.set_title(data.metadata.name.as_str());
    entry.set_notes(data.metadata.note.as_str());
    if item.pinned {
        builder.mark_favorite(&mut entry);
    }
    entry.set_times(
        item.create_time.and_then(from_unix),
        item.modify_time.and_then(from_unix),
    );

    let content = &data.content;
    match data.kind.as_str() {
        "login" => fill_login(builder, index, &mut entry, content),
        "note" => {}
        "creditCard" => fill_card(&mut entry, content),
        "alias" => {
            let email = item
                .alias_email
                .clone()
                .unwrap_or_else(|| text(content, "aliasEmail"));
            entry.set_username(email);
        }
        "identity" => {
            for (key, value) in content {
                let value = json_text(value);
                if !value.is_empty() {
                    entry.add_attribute(&format!("identity_{key}"), value, false);
                }
            }
        }
        other => builder.warn(
            index,
            &data.metadata.name,
            WarningKind::UnsupportedItem,
            format!("item type {other:?} is not supported"),
        ),
    }

    for field in &data.extra_fields {
        fill_extra_field(builder, index, &mut entry, field);
    }

    if item.is_deleted() {
        let when = item
            .deletion_time()
            .and_then(from_unix)
            .unwrap_or_else(Utc::now);
        entry.set_expiry(when);
    }
    entry
}

fn fill_login(builder: &mut TreeBuilder<'_>, index: usize, entry: &mut Entry, content: &Map<String, Value>) {
    let username = text(content, "itemUsername");
    let email = text(content, "itemEmail");
    if username.is_empty() {
        entry.set_username(email.as_str());
    } else {
        entry.set_username(username.as_str());
        if !email.is_empty() && email != username {
            entry.add_attribute("login_email", email, false);
        }
    }
    entry.set_password(text(content, "password"));

    let urls: Vec<String> = content
        .get("urls")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(json_text)
        .collect();
    add_urls(entry, urls.iter().map(String::as_str));

    let totp = text(content, "totpUri");
    if !totp.is_empty() {
        builder.apply_otp(index, entry, &totp);
    }
}

fn fill_card(entry: &mut Entry, content: &Map<String, Value>) {
    entry.set_username(text(content, "number"));
    entry.set_password(text(content, "verificationCode"));
    for (key, value) in content {
        let value = json_text(value);
        if !value.is_empty() {
            entry.add_attribute(&format!("card_{key}"), value, CARD_PROTECTED.contains(&key.as_str()));
        }
    }
}

fn fill_extra_field(builder: &mut TreeBuilder<'_>, index: usize, entry: &mut Entry, field: &ExtraField) {
    let name = field.field_name.as_str();
    match field.kind.as_str() {
        "totp" => {
            let uri = text(&field.data, "totpUri");
            if uri.is_empty() {
                return;
            }
            if entry.has_totp() {
                entry.add_attribute(name, uri, true);
                return;
            }
            let installed = TotpSettings::parse(uri.trim()).and_then(|settings| entry.set_totp(settings));
            if let Err(e) = installed {
                entry.add_attribute(name, uri, true);
                let title = entry.title().to_owned();
                builder.warn(
                    index,
                    &title,
                    WarningKind::FieldIgnored,
                    format!("TOTP field {name} kept as a plain attribute: {e}"),
                );
            }
        }
        "hidden" => {
            entry.add_attribute(name, text(&field.data, "content"), true);
        }
        _ => {
            entry.add_attribute(name, text(&field.data, "content"), false);
        }
    }
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(json_text).unwrap_or_default()
}
