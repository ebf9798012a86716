use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use effects::{Category, EffectDefinition, EffectRegistry, ShaderLibrary};

use crate::cli::Assignment;
use crate::paths::AppPaths;

/// Effect definitions plus the shader sources that implement them.
pub struct Catalog {
    pub registry: EffectRegistry,
    pub shaders: ShaderLibrary,
}

impl Catalog {
    /// Built-ins, then user shader folders, then `extra_dir`. A shader whose
    /// name matches no registered effect becomes a parameterless effect.
    pub fn load(paths: Option<&AppPaths>, extra_dir: Option<&Path>) -> Result<Self> {
        let mut registry =
            EffectRegistry::with_builtins().context("built-in effect catalog is invalid")?;
        let mut shaders = ShaderLibrary::builtin();

        let mut dirs: Vec<PathBuf> = paths.map(AppPaths::shader_dirs).unwrap_or_default();
        if let Some(dir) = extra_dir {
            if !dir.is_dir() {
                bail!("shader directory {} does not exist", dir.display());
            }
            dirs.push(dir.to_path_buf());
        }

        for dir in &dirs {
            let loaded = shaders
                .load_dir(dir)
                .with_context(|| format!("failed to read shaders from {}", dir.display()))?;
            for name in loaded {
                if registry.contains(&name) {
                    continue;
                }
                let definition = EffectDefinition::new(&name, &name, Category::Stylize)
                    .with_description(&format!("User shader from {}", dir.display()));
                if let Err(error) = registry.register(definition) {
                    tracing::warn!(effect = %name, %error, "skipping user shader");
                }
            }
        }

        Ok(Self { registry, shaders })
    }

    /// Fails with the list of known effects when any name is unregistered.
    pub fn check_effects<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            if !self.registry.contains(name) {
                bail!(
                    "unknown effect '{name}'. Available effects: {}",
                    self.registry.names().join(", ")
                );
            }
        }
        Ok(())
    }

    /// `--set` assignments naming a parameter their effect does not declare.
    pub fn undeclared_parameters<'a>(&self, assignments: &'a [Assignment]) -> Vec<&'a Assignment> {
        assignments
            .iter()
            .filter(|assignment| {
                self.registry
                    .get(&assignment.effect)
                    .is_some_and(|definition| definition.parameter(&assignment.param).is_none())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_assignment;
    use tempfile::TempDir;

    #[test]
    fn user_shaders_extend_and_override() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("extra");
        std::fs::create_dir_all(&dir).unwrap();
        let custom = "void mainEffect(out vec4 fragColor, in vec2 uv) { fragColor = texture(uInput, uv).bgra; }";
        std::fs::write(dir.join("swizzle.glsl"), custom).unwrap();
        std::fs::write(dir.join("invert.glsl"), custom).unwrap();

        let catalog = Catalog::load(None, Some(&dir)).unwrap();
        let swizzle = catalog.registry.get("swizzle").expect("registered");
        assert!(swizzle.parameters.is_empty());
        assert_eq!(catalog.shaders.get("invert"), Some(custom));
        assert!(catalog.registry.get("invert").unwrap().parameters.contains_key("amount"));
    }

    #[test]
    fn missing_extra_dir_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(Catalog::load(None, Some(&root.path().join("nope"))).is_err());
    }

    #[test]
    fn unknown_effect_lists_alternatives() {
        let catalog = Catalog::load(None, None).unwrap();
        assert!(catalog.check_effects(["grayscale", "invert"]).is_ok());
        let err = catalog.check_effects(["grayscale", "foo"]).unwrap_err().to_string();
        assert!(err.starts_with("unknown effect 'foo'. Available effects: "));
        assert!(err.contains("grayscale"));
    }

    #[test]
    fn flags_assignments_to_undeclared_parameters() {
        let catalog = Catalog::load(None, None).unwrap();
        let assignments: Vec<Assignment> = ["invert.amount=0.5", "invert.strength=1", "foo.amount=1"]
            .iter()
            .map(|raw| parse_assignment(raw).unwrap())
            .collect();
        let undeclared = catalog.undeclared_parameters(&assignments);
        assert_eq!(undeclared.len(), 1);
        assert_eq!(undeclared[0].param, "strength");
    }
}
