//! Database credentials taken from the environment

use std::fmt;

use crate::error::{Error, Result};

pub const USER_VAR: &str = "ORACLE_USER";
pub const PASSWORD_VAR: &str = "ORACLE_PASSWORD";

/// Oracle username and password
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Read `ORACLE_USER` and `ORACLE_PASSWORD` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(Error::MissingCredential(name))
        };

        let user = fetch(USER_VAR)?;
        let password = fetch(PASSWORD_VAR)?;
        Ok(Self { user, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
