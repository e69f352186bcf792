//! Owner and group name resolution.
//!
//! [`PasswdResolver`] reads `passwd(5)` and `group(5)` style files once and
//! answers from memory. [`StaticResolver`] is a fixed table, mostly for
//! tests and dry runs. [`resolve_owners`] applies a resolver to a document
//! under a timeout, keeping the numeric id whenever resolution fails.

use async_trait::async_trait;
use fbi_core::{FileInfo, IdentityResolver, Owner, ResolveError};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Resolver backed by passwd and group files.
#[derive(Debug, Clone, Default)]
pub struct PasswdResolver {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl PasswdResolver {
    /// Load both files.
    pub async fn from_files(passwd: &Path, group: &Path) -> std::io::Result<Self> {
        let passwd = tokio::fs::read_to_string(passwd).await?;
        let group = tokio::fs::read_to_string(group).await?;
        Ok(Self::parse(&passwd, &group))
    }

    /// Build from file contents.
    #[must_use]
    pub fn parse(passwd: &str, group: &str) -> Self {
        Self {
            users: parse_id_table(passwd),
            groups: parse_id_table(group),
        }
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Both formats carry the name in field 0 and the numeric id in field 2.
fn parse_id_table(text: &str) -> HashMap<u32, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?.trim();
            let id = fields.nth(1)?.trim().parse().ok()?;
            (!name.is_empty()).then(|| (id, name.to_string()))
        })
        .collect()
}

#[async_trait]
impl IdentityResolver for PasswdResolver {
    async fn resolve_user(&self, uid: u32) -> Result<String, ResolveError> {
        self.users
            .get(&uid)
            .cloned()
            .ok_or(ResolveError::UnknownUser(uid))
    }

    async fn resolve_group(&self, gid: u32) -> Result<String, ResolveError> {
        self.groups
            .get(&gid)
            .cloned()
            .ok_or(ResolveError::UnknownGroup(gid))
    }
}

/// Resolver over a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, uid: u32, name: impl Into<String>) -> Self {
        self.users.insert(uid, name.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, gid: u32, name: impl Into<String>) -> Self {
        self.groups.insert(gid, name.into());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn resolve_user(&self, uid: u32) -> Result<String, ResolveError> {
        self.users
            .get(&uid)
            .cloned()
            .ok_or(ResolveError::UnknownUser(uid))
    }

    async fn resolve_group(&self, gid: u32) -> Result<String, ResolveError> {
        self.groups
            .get(&gid)
            .cloned()
            .ok_or(ResolveError::UnknownGroup(gid))
    }
}

/// Replace numeric `user` and `group` on `info` with names.
///
/// Each lookup is bounded by `timeout`. On failure or timeout the numeric id
/// stays in place and a warning is logged; this never fails the event.
pub async fn resolve_owners(
    resolver: &dyn IdentityResolver,
    info: &mut FileInfo,
    timeout: Duration,
) {
    if let Some(Owner::Id(uid)) = info.user {
        info.user = Some(with_fallback(uid, "user", timeout, resolver.resolve_user(uid)).await);
    }
    if let Some(Owner::Id(gid)) = info.group {
        info.group = Some(with_fallback(gid, "group", timeout, resolver.resolve_group(gid)).await);
    }
}

async fn with_fallback<F>(id: u32, kind: &str, timeout: Duration, lookup: F) -> Owner
where
    F: Future<Output = Result<String, ResolveError>>,
{
    let error = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(name)) => return Owner::Name(name),
        Ok(Err(e)) => e,
        Err(_) => ResolveError::Timeout,
    };
    warn!("Could not resolve {} {}, keeping numeric id: {}", kind, id, error);
    Owner::Id(id)
}
