//! Durable user preferences
//!
//! Remembers who signed in last. The bearer token is never part of it: a new
//! process always has to log in again.

use crate::persistence::{read_if_exists, write_atomic};
use crate::{ConfigError, ConfigResult};
use reparto_core::{Session, UserId, UserRole};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the preferences store inside the config dir
pub const PREFERENCES_FILE: &str = "preferences.toml";

/// Non-sensitive identity of the last signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedUser {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl From<&Session> for RememberedUser {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email.clone(),
            name: session.name.clone(),
            role: session.role,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    user: Option<RememberedUser>,
}

/// TOML-backed preferences, written atomically
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last signed-in user, if any
    pub fn remembered_user(&self) -> ConfigResult<Option<RememberedUser>> {
        let Some(contents) = read_if_exists(&self.path)? else {
            return Ok(None);
        };

        let file: PreferencesFile =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(file.user)
    }

    pub fn remember_user(&self, user: &RememberedUser) -> ConfigResult<()> {
        let file = PreferencesFile {
            user: Some(user.clone()),
        };
        write_atomic(&self.path, &toml::to_string_pretty(&file)?)?;
        log::debug!("Remembered user {} in {}", user.user_id, self.path.display());
        Ok(())
    }

    /// Forgets everything; a missing file is not an error
    pub fn clear(&self) -> ConfigResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::WriteError {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}
