use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{MigrationError, Result};
use crate::migration::channel::ChannelRole;

/// Single-use bearer token authenticating one channel connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Hex encoding of `bytes` bytes read from the OS random source.
    pub fn generate(bytes: usize) -> std::result::Result<Self, rand::Error> {
        let mut buf = vec![0u8; bytes];
        OsRng.try_fill_bytes(&mut buf)?;
        Ok(Self(hex::encode(buf)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented token.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }

        expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

/// One optional secret per channel role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Secret>,
}

impl ChannelSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: ChannelRole, secret: impl Into<Secret>) -> Self {
        self.set(role, secret.into());
        self
    }

    pub fn get(&self, role: ChannelRole) -> Option<&Secret> {
        match role {
            ChannelRole::Control => self.control.as_ref(),
            ChannelRole::Filesystem => self.filesystem.as_ref(),
            ChannelRole::State => self.state.as_ref(),
        }
    }

    pub fn set(&mut self, role: ChannelRole, secret: Secret) {
        let slot = match role {
            ChannelRole::Control => &mut self.control,
            ChannelRole::Filesystem => &mut self.filesystem,
            ChannelRole::State => &mut self.state,
        };
        *slot = Some(secret);
    }

    /// The role whose secret equals `presented`. Every slot is compared so
    /// the lookup time does not depend on which role matched.
    pub fn role_for(&self, presented: &str) -> Option<ChannelRole> {
        let mut found = None;
        for role in ChannelRole::ALL {
            if let Some(secret) = self.get(role) {
                if secret.matches(presented) && found.is_none() {
                    found = Some(role);
                }
            }
        }
        found
    }

    pub fn roles(&self) -> Vec<ChannelRole> {
        ChannelRole::ALL
            .into_iter()
            .filter(|role| self.get(*role).is_some())
            .collect()
    }
}

/// Shortest secret, in random bytes, that [`SecretAuthority`] will mint.
pub const MIN_SECRET_BYTES: usize = 16;

/// Mints fresh secrets for migration channels.
#[derive(Debug, Clone)]
pub struct SecretAuthority {
    secret_bytes: usize,
}

impl SecretAuthority {
    pub fn new(secret_bytes: usize) -> Self {
        Self {
            secret_bytes: secret_bytes.max(MIN_SECRET_BYTES),
        }
    }

    pub fn mint(&self, role: ChannelRole) -> Result<Secret> {
        Secret::generate(self.secret_bytes)
            .map_err(|source| MigrationError::SecretGeneration { role, source })
    }

    /// Mints control and filesystem secrets, plus state when asked for.
    pub fn mint_set(&self, include_state: bool) -> Result<ChannelSecrets> {
        let mut secrets = ChannelSecrets::new();
        secrets.control = Some(self.mint(ChannelRole::Control)?);
        secrets.filesystem = Some(self.mint(ChannelRole::Filesystem)?);
        if include_state {
            secrets.state = Some(self.mint(ChannelRole::State)?);
        }
        Ok(secrets)
    }
}

impl Default for SecretAuthority {
    fn default() -> Self {
        Self::new(32)
    }
}
