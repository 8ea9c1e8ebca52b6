//! Secret payload handed to providers at connect time

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Password and key material for one connection
///
/// Serialized only by the secret store. `Debug` never prints field values and
/// memory is cleared on drop.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// PEM private key contents (SSH/SFTP kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// Overrides the config's username when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_private_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_passphrase: Option<String>,
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        let mut credential = Self::default();
        credential.password = Some(password.into());
        credential
    }

    pub fn private_key(key: impl Into<String>, passphrase: Option<String>) -> Self {
        let mut credential = Self::default();
        credential.private_key = Some(key.into());
        credential.passphrase = passphrase;
        credential
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_ssh_password(mut self, password: impl Into<String>) -> Self {
        self.ssh_password = Some(password.into());
        self
    }

    pub fn with_ssh_private_key(mut self, key: impl Into<String>, passphrase: Option<String>) -> Self {
        self.ssh_private_key = Some(key.into());
        self.ssh_passphrase = passphrase;
        self
    }

    /// Username to authenticate with: the override, else the config's
    pub fn resolve_username<'a>(&'a self, config_username: Option<&'a str>) -> Option<&'a str> {
        self.username.as_deref().or(config_username)
    }

    /// Bastion-side authentication material, if any
    pub fn has_ssh_secret(&self) -> bool {
        self.ssh_password.is_some() || self.ssh_private_key.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.private_key.is_none()
            && self.passphrase.is_none()
            && self.username.is_none()
            && !self.has_ssh_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "[REDACTED]" } else { "None" };
        f.debug_struct("Credential")
            .field("password", &mark(&self.password))
            .field("private_key", &mark(&self.private_key))
            .field("passphrase", &mark(&self.passphrase))
            .field("username", &self.username)
            .field("ssh_password", &mark(&self.ssh_password))
            .field("ssh_private_key", &mark(&self.ssh_private_key))
            .finish_non_exhaustive()
    }
}
