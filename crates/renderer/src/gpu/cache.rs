use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ShaderError;

/// Programs keyed by effect name, built at most once per name.
///
/// The lock is held while a program builds, so concurrent runs asking for the
/// same effect wait for the first build instead of compiling twice.
pub(crate) struct ProgramCache<P> {
    programs: Mutex<HashMap<String, Arc<P>>>,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self {
            programs: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> ProgramCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<P>> {
        self.programs.lock().get(name).cloned()
    }

    /// Returns the cached program for `name`, building it on first use.
    ///
    /// When `build` fails and a `fallback` is given, the fallback program is
    /// stored under `name` and the build error is still returned so the caller
    /// can report it. Later lookups get the fallback without rebuilding.
    pub fn compile<F>(
        &self,
        name: &str,
        build: F,
        fallback: Option<&dyn Fn() -> Result<P, ShaderError>>,
    ) -> Result<Arc<P>, ShaderError>
    where
        F: FnOnce() -> Result<P, ShaderError>,
    {
        let mut programs = self.programs.lock();
        if let Some(program) = programs.get(name) {
            return Ok(Arc::clone(program));
        }

        match build() {
            Ok(program) => {
                let program = Arc::new(program);
                programs.insert(name.to_string(), Arc::clone(&program));
                Ok(program)
            }
            Err(error) => {
                if let Some(fallback) = fallback {
                    match fallback() {
                        Ok(stand_in) => {
                            programs.insert(name.to_string(), Arc::new(stand_in));
                        }
                        Err(fallback_error) => {
                            tracing::error!(
                                effect = name,
                                error = %fallback_error,
                                "fallback program failed to build"
                            );
                        }
                    }
                }
                Err(error)
            }
        }
    }

    pub fn snapshot(&self) -> Vec<(String, Arc<P>)> {
        let mut entries: Vec<(String, Arc<P>)> = self
            .programs
            .lock()
            .iter()
            .map(|(name, program)| (name.clone(), Arc::clone(program)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn reset(&self) {
        let mut programs = self.programs.lock();
        let dropped = programs.len();
        programs.clear();
        tracing::debug!(dropped, "cleared program cache");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn compile_error(effect: &str) -> ShaderError {
        ShaderError::Compile {
            effect: effect.to_string(),
            diagnostic: "syntax error".to_string(),
        }
    }

    #[test]
    fn builds_once_and_reuses() {
        let cache = ProgramCache::<String>::new();
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok("program".to_string())
        };

        let first = cache.compile("a", build, None).unwrap();
        let second = cache
            .compile("a", || panic!("cached entries are not rebuilt"), None)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.get(), 1);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn failed_build_without_fallback_stores_nothing() {
        let cache = ProgramCache::<String>::new();
        let err = cache
            .compile("broken", || Err(compile_error("broken")), None)
            .unwrap_err();
        assert_eq!(err.effect(), "broken");
        assert!(cache.get("broken").is_none());
    }

    #[test]
    fn failed_build_with_fallback_caches_the_stand_in() {
        let cache = ProgramCache::<String>::new();
        let fallback = || -> Result<String, ShaderError> { Ok("identity".to_string()) };
        let err = cache
            .compile("broken", || Err(compile_error("broken")), Some(&fallback))
            .unwrap_err();
        assert!(matches!(err, ShaderError::Compile { .. }));
        assert_eq!(cache.get("broken").as_deref(), Some(&"identity".to_string()));

        let again = cache
            .compile("broken", || panic!("fallback entry is final"), Some(&fallback))
            .unwrap();
        assert_eq!(again.as_str(), "identity");
    }

    #[test]
    fn reset_clears_everything() {
        let cache = ProgramCache::<String>::new();
        cache.compile("b", || Ok("b".into()), None).unwrap();
        cache.compile("a", || Ok("a".into()), None).unwrap();
        let names: Vec<String> = cache.snapshot().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        cache.reset();
        assert!(cache.snapshot().is_empty());
    }
}
