#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for the Proton Pass reader.

use keyport_vault::import::proton_pass;
use keyport_vault::{ImportError, ImportFormat, ImportOptions, Importer, WarningKind};
use serde_json::json;

fn export() -> serde_json::Value {
    json!({
        "version": "1.17.0",
        "userId": "u1",
        "encrypted": false,
        "vaults": {
            "v1": {
                "name": "Personal",
                "description": "Personal vault",
                "items": [
                    {
                        "itemId": "a",
                        "shareId": "v1",
                        "data": {
                            "metadata": { "name": "Test Login", "note": "My login secure note.", "itemUuid": "1" },
                            "extraFields": [
                                { "fieldName": "non-hidden field", "type": "text", "data": { "content": "non-hidden field content" } },
                                { "fieldName": "hidden field", "type": "hidden", "data": { "content": "hidden field content" } },
                                { "fieldName": "second 2fa secret", "type": "totp", "data": { "totpUri": "TOTPCODE" } }
                            ],
                            "type": "login",
                            "content": {
                                "itemEmail": "Email",
                                "password": "Password",
                                "urls": ["https://example.com/", "https://example2.com/"],
                                "totpUri": "otpauth://totp/Test%20Login%20-%20Personal%20Vault:Username?issuer=Test%20Login%20-%20Personal%20Vault&secret=YMGTTMQJS3TLZ5Z3TCB4BXKRXYQKVHCU&algorithm=SHA1&digits=6&period=30",
                                "passkeys": [],
                                "itemUsername": "Username"
                            }
                        },
                        "state": 1,
                        "aliasEmail": null,
                        "contentFormatVersion": 1,
                        "createTime": 1_689_182_868,
                        "modifyTime": 1_689_182_868,
                        "pinned": true
                    },
                    {
                        "itemId": "b",
                        "data": {
                            "metadata": { "name": "My Secure Note", "note": "Secure note contents.", "itemUuid": "2" },
                            "extraFields": [],
                            "type": "note",
                            "content": {}
                        },
                        "state": 1,
                        "createTime": 1_689_182_908,
                        "modifyTime": 1_689_182_908,
                        "pinned": false
                    },
                    {
                        "itemId": "c",
                        "data": {
                            "metadata": { "name": "Test Card", "note": "Credit Card Note", "itemUuid": "3" },
                            "extraFields": [],
                            "type": "creditCard",
                            "content": {
                                "cardholderName": "Test name",
                                "cardType": 0,
                                "number": "1234222233334444",
                                "verificationCode": "333",
                                "expirationDate": "2025-01",
                                "pin": "1234"
                            }
                        },
                        "state": 1,
                        "createTime": 1_691_001_643,
                        "modifyTime": 1_691_001_643,
                        "pinned": false
                    },
                    {
                        "itemId": "d",
                        "data": {
                            "metadata": { "name": "My Deleted Note", "note": "Secure note contents.", "itemUuid": "4" },
                            "extraFields": [],
                            "type": "note",
                            "content": {}
                        },
                        "state": 2,
                        "createTime": 1_689_182_908,
                        "modifyTime": 1_689_182_908,
                        "pinned": false
                    },
                    {
                        "itemId": "e",
                        "data": {
                            "metadata": { "name": "Mail alias", "note": "", "itemUuid": "5" },
                            "extraFields": [],
                            "type": "alias",
                            "content": {}
                        },
                        "aliasEmail": "alias.123@passmail.net",
                        "state": 1,
                        "pinned": false
                    }
                ]
            },
            "v2": {
                "name": "Test",
                "description": "",
                "items": [
                    {
                        "itemId": "f",
                        "data": {
                            "metadata": { "name": "Other vault login", "note": "", "itemUuid": "6" },
                            "extraFields": [],
                            "type": "login",
                            "content": {
                                "itemEmail": "other@example.com",
                                "password": "pw",
                                "urls": [],
                                "totpUri": "",
                                "itemUsername": "other"
                            }
                        },
                        "state": 1,
                        "pinned": false
                    },
                    {
                        "itemId": "g",
                        "data": {
                            "metadata": { "name": "SSH box", "note": "fingerprint", "itemUuid": "7" },
                            "extraFields": [],
                            "type": "sshKey",
                            "content": { "privateKey": "..." }
                        },
                        "state": 1,
                        "pinned": false
                    },
                    {
                        "itemId": "h",
                        "data": "corrupted",
                        "state": 1
                    }
                ]
            }
        }
    })
}

fn convert(json: &serde_json::Value) -> Result<keyport_vault::ImportReport, ImportError> {
    proton_pass::read_json(&json.to_string(), "protonpass_export", &ImportOptions::default())
}

#[test]
fn login_fields_are_mapped() {
    let report = convert(&export()).unwrap();
    let entry = report.database.find_entry_by_path("/Personal/Test Login").unwrap();

    assert_eq!(entry.title(), "Test Login");
    assert_eq!(entry.username(), "Username");
    assert_eq!(entry.password(), "Password");
    assert_eq!(entry.url(), "https://example.com/");
    assert_eq!(entry.notes(), "My login secure note.");
    assert_eq!(entry.attribute("KP2A_URL_1"), "https://example2.com/");
    assert_eq!(entry.attribute("login_email"), "Email");
    assert!(entry.has_totp());
    assert!(entry.has_tag("Favorite"));
    assert!(!entry.expires());

    let attrs = entry.attributes();
    assert!(attrs.is_protected("hidden field"));
    assert_eq!(attrs.value("hidden field"), "hidden field content");
    assert!(!attrs.is_protected("non-hidden field"));
    assert_eq!(attrs.value("second 2fa secret"), "TOTPCODE");
    assert_eq!(entry.times().created.timestamp(), 1_689_182_868);
}

#[test]
fn notes_cards_and_aliases_are_mapped() {
    let report = convert(&export()).unwrap();
    let db = &report.database;

    let note = db.find_entry_by_path("/Personal/My Secure Note").unwrap();
    assert_eq!(note.notes(), "Secure note contents.");

    let card = db.find_entry_by_path("/Personal/Test Card").unwrap();
    assert_eq!(card.username(), "1234222233334444");
    assert_eq!(card.password(), "333");
    let attrs = card.attributes();
    assert_eq!(attrs.value("card_cardholderName"), "Test name");
    assert_eq!(attrs.value("card_expirationDate"), "2025-01");
    assert_eq!(attrs.value("card_pin"), "1234");
    assert!(attrs.is_protected("card_pin"));
    assert!(attrs.is_protected("card_verificationCode"));
    assert!(!card.expires());

    let alias = db.find_entry_by_path("/Personal/Mail alias").unwrap();
    assert_eq!(alias.username(), "alias.123@passmail.net");
}

#[test]
fn deleted_items_are_imported_expired() {
    let report = convert(&export()).unwrap();
    let entry = report.database.find_entry_by_path("/Personal/My Deleted Note").unwrap();
    assert!(entry.expires());
    assert!(entry.is_expired());
    assert_eq!(entry.expiry_time().unwrap().timestamp(), 1_689_182_908);
}

#[test]
fn each_vault_becomes_a_group() {
    let report = convert(&export()).unwrap();
    let db = &report.database;
    assert!(db.find_entry_by_path("/Test/Other vault login").is_some());
    assert_eq!(db.root_group().name(), "protonpass_export");
    assert_eq!(db.root_group().children().len(), 2);
}

#[test]
fn vault_groups_follow_export_order() {
    let json = r#"{
        "encrypted": false,
        "vaults": {
            "zz-vault": { "name": "Work", "items": [] },
            "aa-vault": { "name": "Home", "items": [] },
            "mm-vault": { "name": "", "items": [] }
        }
    }"#;
    let report = proton_pass::read_json(json, "export", &ImportOptions::default()).unwrap();
    let db = &report.database;
    let names: Vec<_> = db
        .root_group()
        .children()
        .iter()
        .map(|&id| db.group(id).unwrap().name().to_owned())
        .collect();
    assert_eq!(names, ["Work", "Home", "mm-vault"]);
}

#[test]
fn unknown_and_corrupt_items_are_reported() {
    let report = convert(&export()).unwrap();

    let ssh = report.database.find_entry_by_path("/Test/SSH box").unwrap();
    assert_eq!(ssh.notes(), "fingerprint");

    let kinds: Vec<_> = report.warnings.iter().map(|w| (w.index, w.kind)).collect();
    assert_eq!(
        kinds,
        vec![(6, WarningKind::UnsupportedItem), (7, WarningKind::ItemSkipped)]
    );
    assert_eq!(report.database.entry_count(), 7);
}

#[test]
fn encrypted_exports_are_unsupported() {
    let json = json!({ "encrypted": true, "vaults": {} });
    assert!(matches!(convert(&json), Err(ImportError::UnsupportedSchema(_))));
}

#[test]
fn invalid_json_is_malformed() {
    let err = proton_pass::read_json("{ not json", "x", &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, ImportError::MalformedContainer(_)));
}

#[test]
fn importer_detects_and_reads_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protonpass_export.json");
    std::fs::write(&path, export().to_string()).unwrap();

    let format = ImportFormat::detect(&path).unwrap();
    assert_eq!(format, ImportFormat::ProtonPass);

    let mut importer = Importer::new(format);
    let db = importer.convert(&path, None).unwrap();
    assert!(!importer.has_error());
    assert_eq!(importer.warnings().len(), 2);
    assert!(db.find_entry_by_path("/Personal/Test Login").is_some());
}
