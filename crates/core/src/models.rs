//! Users, movies and collections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

const MAX_TITLE_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 150;

/// Account as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Registration / user creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_username(&self.username)?;
        if self.password.is_empty() {
            return Err(CoreError::Validation("password may not be blank".into()));
        }
        Ok(())
    }
}

/// Partial user update; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(ref username) = self.username {
            validate_username(username)?;
        }
        if self.password.as_deref() == Some("") {
            return Err(CoreError::Validation("password may not be blank".into()));
        }
        Ok(())
    }
}

/// Login payload for token generation
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub genres: Option<String>,
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movie payload, used standalone and nested inside collection payloads
#[derive(Debug, Clone, Deserialize)]
pub struct MovieInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub genres: Option<String>,
}

impl MovieInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_title("movie", &self.title)
    }
}

/// Partial movie update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genres: Option<String>,
}

impl MovieUpdate {
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.title {
            Some(ref title) => validate_title("movie", title),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub collection_uuid: Uuid,
    pub is_success: bool,
    pub user: User,
    pub movies: Vec<Movie>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collection payload for create, full update and partial update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub user: Option<i64>,
    pub is_success: Option<bool>,
    #[serde(default)]
    pub movies: Vec<MovieInput>,
}

impl CollectionInput {
    /// Create and PUT require every writable field
    pub fn validate_full(&self) -> Result<(), CoreError> {
        match self.title {
            Some(ref title) => validate_title("collection", title)?,
            None => return Err(CoreError::Validation("title is required".into())),
        }
        if self.description.is_none() {
            return Err(CoreError::Validation("description is required".into()));
        }
        self.validate_movies()
    }

    pub fn validate_partial(&self) -> Result<(), CoreError> {
        if let Some(ref title) = self.title {
            validate_title("collection", title)?;
        }
        self.validate_movies()
    }

    fn validate_movies(&self) -> Result<(), CoreError> {
        self.movies.iter().try_for_each(MovieInput::validate)
    }
}

fn validate_title(kind: &str, title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(format!("{kind} title may not be blank")));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "{kind} title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), CoreError> {
    if username.trim().is_empty() {
        return Err(CoreError::Validation("username may not be blank".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(CoreError::Validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}
