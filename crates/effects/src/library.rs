use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// File extension effect shaders are stored under.
pub const SHADER_EXTENSION: &str = "glsl";

/// In-memory map from effect name to fragment shader source.
///
/// Sources are loaded before an engine is built so shader lookup never
/// touches the filesystem during a run.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: HashMap<String, String>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library containing the embedded shaders of the built-in catalog.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for (name, source) in crate::builtin::SHADERS {
            library.insert(*name, *source);
        }
        library
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads every `<effect>.glsl` in `dir`, replacing existing entries.
    ///
    /// Returns the names that were loaded. A missing directory loads nothing.
    pub fn load_dir(&mut self, dir: &Path) -> io::Result<Vec<String>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut loaded = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SHADER_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path)?;
            if self.contains(name) {
                tracing::info!(effect = name, path = %path.display(), "overriding shader");
            } else {
                tracing::debug!(effect = name, path = %path.display(), "loaded shader");
            }
            self.insert(name, source);
            loaded.push(name.to_string());
        }
        loaded.sort();
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_library_covers_every_builtin_effect() {
        let library = ShaderLibrary::builtin();
        for definition in crate::builtin::definitions() {
            assert!(
                library.contains(&definition.name),
                "missing shader for {}",
                definition.name
            );
        }
    }

    #[test]
    fn load_dir_overrides_and_adds() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("grayscale.glsl"), "// custom").unwrap();
        fs::write(dir.path().join("sepia.glsl"), "// sepia").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut library = ShaderLibrary::builtin();
        let loaded = library.load_dir(dir.path()).unwrap();
        assert_eq!(loaded, vec!["grayscale".to_string(), "sepia".to_string()]);
        assert_eq!(library.get("grayscale"), Some("// custom"));
        assert_eq!(library.get("sepia"), Some("// sepia"));
        assert!(!library.contains("notes"));
    }

    #[test]
    fn missing_dir_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut library = ShaderLibrary::new();
        let loaded = library.load_dir(&dir.path().join("absent")).unwrap();
        assert!(loaded.is_empty());
        assert!(library.is_empty());
    }
}
