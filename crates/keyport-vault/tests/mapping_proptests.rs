#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the mapping rules every reader shares: URL
//! numbering, untouched free text and first-wins TOTP.

use keyport_vault::import::{bitwarden, proton_pass};
use keyport_vault::{Entry, ImportOptions};
use proptest::prelude::*;
use serde_json::json;

fn bitwarden_login(name: &str, login: serde_json::Value, notes: &str) -> Entry {
    let export = json!({
        "encrypted": false,
        "folders": [],
        "items": [{ "type": 1, "name": name, "notes": notes, "login": login }]
    });
    let report =
        bitwarden::read_json(&export.to_string(), None, "root", &ImportOptions::default()).unwrap();
    report.database.entries()[0].1.clone()
}

proptest! {
    /// First URL is primary, the rest are numbered from 1 in source order.
    #[test]
    fn urls_are_numbered_in_order(hosts in proptest::collection::btree_set(0u16..500, 1..8)) {
        let urls: Vec<String> = hosts.iter().map(|h| format!("https://h{h}.example/")).collect();
        let uris: Vec<_> = urls.iter().map(|u| json!({ "uri": u })).collect();
        let entry = bitwarden_login("site", json!({ "uris": uris }), "");

        prop_assert_eq!(entry.url(), urls[0].as_str());
        for (n, url) in urls.iter().enumerate().skip(1) {
            let key = format!("KP2A_URL_{n}");
            prop_assert_eq!(entry.attribute(&key), url.as_str());
        }
        let past_end = format!("KP2A_URL_{}", urls.len());
        prop_assert!(!entry.attributes().contains(&past_end));
    }

    /// Repeating the primary URL never produces a numbered copy.
    #[test]
    fn duplicate_primary_urls_are_dropped(repeats in 1usize..5) {
        let uris: Vec<_> = std::iter::repeat(json!({ "uri": "https://same.example/" }))
            .take(repeats + 1)
            .collect();
        let entry = bitwarden_login("site", json!({ "uris": uris }), "");
        prop_assert_eq!(entry.url(), "https://same.example/");
        prop_assert!(!entry.attributes().contains("KP2A_URL_1"));
    }

    /// Notes survive byte-for-byte, leading and trailing whitespace included.
    #[test]
    fn notes_are_not_trimmed(notes in "[ \t\na-zA-Z0-9.,]{0,60}") {
        let entry = bitwarden_login("note", json!({}), &notes);
        prop_assert_eq!(entry.notes(), notes.as_str());
    }

    /// A single street line with padding comes through as-is.
    #[test]
    fn identity_street_is_not_trimmed(street in "[ ]{0,3}[a-z0-9][ a-z0-9]{0,20}[ ]{0,3}") {
        let export = json!({
            "encrypted": false,
            "items": [{ "type": 4, "name": "id", "identity": { "address1": street } }]
        });
        let report = bitwarden::read_json(&export.to_string(), None, "root", &ImportOptions::default())
            .unwrap();
        let entry = report.database.entries()[0].1;
        prop_assert_eq!(entry.attribute("identity_address"), street.as_str());
    }

    /// The first TOTP seed wins; later ones are kept as attributes.
    #[test]
    fn first_totp_wins(first in "[A-Z2-7]{16}", second in "[A-Z2-7]{16}") {
        let export = json!({
            "encrypted": false,
            "vaults": { "v": { "name": "Vault", "items": [{
                "data": {
                    "metadata": { "name": "two seeds", "note": "" },
                    "type": "login",
                    "content": { "totpUri": first },
                    "extraFields": [
                        { "fieldName": "backup", "type": "totp", "data": { "totpUri": second } }
                    ]
                },
                "state": 1
            }] } }
        });
        let report = proton_pass::read_json(&export.to_string(), "root", &ImportOptions::default())
            .unwrap();
        let entry = report.database.find_entry_by_path("/Vault/two seeds").unwrap();
        prop_assert_eq!(entry.totp().unwrap().secret(), first.as_str());
        prop_assert_eq!(entry.attribute("backup"), second.as_str());
        prop_assert!(entry.attributes().is_protected("backup"));
    }
}
