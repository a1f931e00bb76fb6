//! The account registry.
//!
//! The emulator provisions a single fixed dummy account at startup. The
//! registry is populated once and read-only afterwards, so plain slice
//! lookups are safe under concurrency.

/// An access key pair with a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// The access key ID presented in credentials.
    pub access_key_id: String,
    /// The secret used to derive signing keys.
    pub secret_access_key: String,
    /// The display name reported as the owner of buckets and objects.
    pub display_name: String,
}

/// The fixed dummy access key ID.
pub const DEFAULT_ACCESS_KEY_ID: &str = "S3RVER";

/// The fixed dummy secret access key.
pub const DEFAULT_SECRET_ACCESS_KEY: &str = "S3RVER";

impl Account {
    /// The built-in dummy account.
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            access_key_id: DEFAULT_ACCESS_KEY_ID.to_owned(),
            secret_access_key: DEFAULT_SECRET_ACCESS_KEY.to_owned(),
            display_name: "S3rver".to_owned(),
        }
    }
}

/// Registry of accounts known to the emulator.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self {
            accounts: vec![Account::dummy()],
        }
    }
}

impl AccountRegistry {
    /// Create a registry holding exactly the given accounts.
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Look up an account by access key ID.
    #[must_use]
    pub fn lookup(&self, access_key_id: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.access_key_id == access_key_id)
    }
}
