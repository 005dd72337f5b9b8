//! Wire types for the config extension webhook.
//!
//! The CI server sends a [`BuildNotification`] for every build and expects either a
//! [`ConfigResponse`] or an empty 204 response telling it to use the config stored
//! in the repository. Only `repo.slug` drives any decision; the remaining fields
//! are accepted so that complete notifications parse.

use hyper::body::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::string::FromUtf8Error;

/// Treats an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Inbound payload. Every field is optional and defaults to its zero value, as
/// does a `null` in its place.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildNotification {
    #[serde(deserialize_with = "null_as_default")]
    pub repo: Repo,
    #[serde(deserialize_with = "null_as_default")]
    pub build: Build,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Repo {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Fully qualified repository name, e.g. "owner/name"
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub scm: String,
    #[serde(deserialize_with = "null_as_default")]
    pub git_http_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub git_ssh_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub default_branch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub private: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub visibility: String,
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub config: String,
    #[serde(deserialize_with = "null_as_default")]
    pub trusted: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub protected: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub ignore_forks: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub ignore_pulls: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub cancel_pulls: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub timeout: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub counter: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub synced: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub updated: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub version: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Build {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub repo_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub parent: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event: String,
    #[serde(deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub before: String,
    #[serde(deserialize_with = "null_as_default")]
    pub after: String,
    pub r#ref: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source_repo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub target: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_login: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author_avatar: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(deserialize_with = "null_as_default")]
    pub params: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cron: String,
    #[serde(deserialize_with = "null_as_default")]
    pub deploy_to: String,
    #[serde(deserialize_with = "null_as_default")]
    pub deploy_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub started: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub finished: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub updated: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub version: i64,
}

impl BuildNotification {
    /// Parses a notification body. A bare `null` is an empty notification.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Option<Self>>(body).map(Option::unwrap_or_default)
    }
}

/// Outbound envelope carrying the fetched config verbatim.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConfigResponse {
    pub data: String,
}

impl ConfigResponse {
    /// Wraps fetched bytes without altering them.
    ///
    /// JSON strings must be UTF-8; anything else cannot be carried verbatim and is
    /// rejected rather than lossily converted.
    pub fn from_bytes(config: Bytes) -> Result<Self, FromUtf8Error> {
        let data = String::from_utf8(config.to_vec())?;
        Ok(ConfigResponse { data })
    }
}
