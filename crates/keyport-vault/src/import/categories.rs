//! 1Password category codes shared by OPVault and 1PUX.

use std::borrow::Cow;

/// Category code to display name.
const CATEGORIES: &[(u16, &str)] = &[
    (1, "Login"),
    (2, "Credit Card"),
    (3, "Secure Note"),
    (4, "Identity"),
    (5, "Password"),
    (6, "Document"),
    (99, "Tombstone"),
    (100, "Software License"),
    (101, "Bank Account"),
    (102, "Database"),
    (103, "Driver License"),
    (104, "Outdoor License"),
    (105, "Membership"),
    (106, "Passport"),
    (107, "Rewards"),
    (108, "SSN"),
    (109, "Router"),
    (110, "Server"),
    (111, "Email"),
    (112, "API Credential"),
    (113, "Medical Record"),
    (114, "SSH Key"),
    (115, "Crypto Wallet"),
];

pub(crate) const PASSWORD: u16 = 5;

/// Numeric value of a category code; `"005"`, `"05"` and `"5"` are equal.
pub(crate) fn category_code(code: &str) -> Option<u16> {
    code.trim().parse().ok()
}

/// Display name of a known category code.
#[must_use]
pub fn category_name(code: &str) -> Option<&'static str> {
    let code = category_code(code)?;
    CATEGORIES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Display name, or `Category <code>` for unknown codes.
pub(crate) fn category_label(code: &str) -> Cow<'static, str> {
    category_name(code).map_or_else(
        || Cow::Owned(format!("Category {}", code.trim())),
        Cow::Borrowed,
    )
}
