use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "MONADAGE_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "MONADAGE_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Monadage";
const APPLICATION: &str = "monadage";

/// User directories holding extra shaders (`shaders/`) and recipes
/// (`recipes/`).
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let data_override = env_override(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self::from_raw(config_dir.clone(), data_dir.clone()));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| {
                anyhow!("failed to determine user directories; set {ENV_CONFIG_DIR} and {ENV_DATA_DIR}")
            })?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Shader folders in load order; later folders override earlier ones.
    pub fn shader_dirs(&self) -> Vec<PathBuf> {
        vec![self.data_dir.join("shaders"), self.config_dir.join("shaders")]
    }

    /// Recipe folders in lookup order.
    pub fn recipe_dirs(&self) -> Vec<PathBuf> {
        vec![self.config_dir.join("recipes"), self.data_dir.join("recipes")]
    }

    /// Finds `<name>.toml` in the recipe folders.
    pub fn find_recipe(&self, name: &str) -> Option<PathBuf> {
        self.recipe_dirs()
            .into_iter()
            .map(|dir| dir.join(format!("{name}.toml")))
            .find(|candidate| candidate.is_file())
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let data_dir = root.path().join("data");
        let _config = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _data = EnvGuard::set(ENV_DATA_DIR, &data_dir);

        let paths = AppPaths::discover().unwrap();
        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.data_dir(), data_dir.as_path());
        assert_eq!(
            paths.shader_dirs(),
            vec![data_dir.join("shaders"), config_dir.join("shaders")]
        );
    }

    #[test]
    fn finds_recipes_by_name() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_raw(root.path().join("config"), root.path().join("data"));
        assert!(paths.find_recipe("retro").is_none());

        let dir = root.path().join("data").join("recipes");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("retro.toml"), "version = 1\n").unwrap();
        assert_eq!(paths.find_recipe("retro"), Some(dir.join("retro.toml")));
    }
}
