use std::path::PathBuf;

use anyhow::Context;
use uuid::Uuid;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_STORAGE_ROOT: &str = "./surveillance-images";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub storage_root: PathBuf,
    pub storage_quota_bytes: Option<u64>,
    pub user_id: Option<Uuid>,
}

impl Settings {
    /// Reads the process environment after loading `.env` when present.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|raw| !raw.trim().is_empty());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let storage_root = lookup("IMAGE_STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT));

        let storage_quota_bytes = lookup("IMAGE_STORAGE_QUOTA_BYTES")
            .map(|raw| {
                raw.trim()
                    .parse()
                    .with_context(|| format!("IMAGE_STORAGE_QUOTA_BYTES is not a number: {raw}"))
            })
            .transpose()?;

        let user_id = lookup("SURVEILLANCE_USER_ID")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .with_context(|| format!("SURVEILLANCE_USER_ID is not a UUID: {raw}"))
            })
            .transpose()?;

        Ok(Self {
            database_url,
            max_connections,
            storage_root,
            storage_quota_bytes,
            user_id,
        })
    }

    /// Only commands that touch Postgres need this.
    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")
    }

    /// The signed-in identity; a command-line value wins over the environment.
    pub fn current_user(&self, cli_user: Option<Uuid>) -> Option<Uuid> {
        cli_user.or(self.user_id)
    }

    /// Owner of the indices a cycle saves. `None` means compute only.
    pub fn cycle_owner(&self, cli_user: Option<Uuid>, dry_run: bool) -> Option<Uuid> {
        if dry_run {
            None
        } else {
            self.current_user(cli_user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/vs")]).unwrap();
        assert_eq!(s.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(s.storage_root, PathBuf::from(DEFAULT_STORAGE_ROOT));
        assert_eq!(s.storage_quota_bytes, None);
        assert_eq!(s.user_id, None);
    }

    #[test]
    fn database_url_is_only_required_on_demand() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, None);
        assert!(s.require_database_url().is_err());

        let s = settings(&[("DATABASE_URL", "postgres://localhost/vs")]).unwrap();
        assert_eq!(s.require_database_url().unwrap(), "postgres://localhost/vs");
    }

    #[test]
    fn dry_run_never_has_an_owner() {
        let user = Uuid::new_v4();
        let s = settings(&[("SURVEILLANCE_USER_ID", &user.to_string())]).unwrap();

        assert_eq!(s.cycle_owner(None, false), Some(user));
        assert_eq!(s.cycle_owner(Some(Uuid::new_v4()), true), None);
        assert_eq!(settings(&[]).unwrap().cycle_owner(None, false), None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(settings(&[
            ("DATABASE_URL", "postgres://localhost/vs"),
            ("DATABASE_MAX_CONNECTIONS", "lots"),
        ])
        .is_err());
        assert!(settings(&[
            ("DATABASE_URL", "postgres://localhost/vs"),
            ("SURVEILLANCE_USER_ID", "field-worker-7"),
        ])
        .is_err());
    }

    #[test]
    fn cli_user_overrides_environment() {
        let env_user = Uuid::new_v4();
        let cli_user = Uuid::new_v4();
        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/vs"),
            ("SURVEILLANCE_USER_ID", &env_user.to_string()),
        ])
        .unwrap();

        assert_eq!(s.current_user(None), Some(env_user));
        assert_eq!(s.current_user(Some(cli_user)), Some(cli_user));
    }
}
