//! Closed table of supported languages and their runtime profiles

use crate::error::{SandboxError, SandboxResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directory inside every sandbox where the submission is written
pub const WORKDIR: &str = "/app";

/// Everything needed to run one language inside a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Language identifier as submitted by callers
    pub id: String,

    /// Pre-built image the sandbox is created from
    pub runtime_image: String,

    /// Argument list that builds (if needed) and runs the submission
    pub entry_command: Vec<String>,

    /// File name the submission must occupy under [`WORKDIR`]
    pub source_filename: String,
}

impl LanguageProfile {
    fn new(id: &str, image: &str, source_filename: &str, entry_command: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            runtime_image: image.to_string(),
            entry_command: entry_command.iter().map(|s| s.to_string()).collect(),
            source_filename: source_filename.to_string(),
        }
    }

    /// Absolute path of the submission inside the sandbox
    pub fn source_path(&self) -> String {
        format!("{}/{}", WORKDIR, self.source_filename)
    }
}

/// Registry of language profiles. No runtime registration: the set of ids is
/// fixed by [`LanguageRegistry::builtin`].
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageRegistry {
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                LanguageProfile::new(
                    "python",
                    "python:3.11-alpine",
                    "main.py",
                    &["python", "/app/main.py"],
                ),
                LanguageProfile::new(
                    "javascript",
                    "node:18-alpine",
                    "main.js",
                    &["node", "/app/main.js"],
                ),
                LanguageProfile::new(
                    "typescript",
                    "node:18-alpine",
                    "main.ts",
                    &["sh", "-c", "cd /app && tsc main.ts && node main.js"],
                ),
                LanguageProfile::new(
                    "java",
                    "openjdk:11-alpine",
                    "Main.java",
                    &["sh", "-c", "cd /app && javac Main.java && java Main"],
                ),
                LanguageProfile::new(
                    "cpp",
                    "gcc:latest",
                    "main.cpp",
                    &["sh", "-c", "cd /app && g++ -O2 -o main main.cpp && ./main"],
                ),
            ],
        }
    }

    /// Look up a profile. Unknown ids are rejected, never mapped to a default.
    pub fn resolve(&self, language: &str) -> SandboxResult<&LanguageProfile> {
        self.profiles
            .iter()
            .find(|p| p.id == language)
            .ok_or_else(|| SandboxError::UnsupportedLanguage(language.to_string()))
    }

    /// Pin a different image for an already registered language
    pub fn with_image_override(
        mut self,
        language: &str,
        image: impl Into<String>,
    ) -> SandboxResult<Self> {
        let image = image.into();
        if image.trim().is_empty() {
            return Err(SandboxError::InvalidRequest(format!(
                "empty image override for '{}'",
                language
            )));
        }
        let profile = self
            .profiles
            .iter_mut()
            .find(|p| p.id == language)
            .ok_or_else(|| SandboxError::UnsupportedLanguage(language.to_string()))?;
        profile.runtime_image = image;
        Ok(self)
    }

    /// Supported ids in registration order
    pub fn languages(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.id.as_str()).collect()
    }

    /// Language id to image reference, for the capability listing
    pub fn images(&self) -> BTreeMap<String, String> {
        self.profiles
            .iter()
            .map(|p| (p.id.clone(), p.runtime_image.clone()))
            .collect()
    }

    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_every_profile_is_complete() {
        let registry = LanguageRegistry::builtin();
        for id in registry.languages() {
            let profile = registry.resolve(id).unwrap();
            assert!(!profile.runtime_image.is_empty());
            assert!(!profile.source_filename.is_empty());
            assert!(!profile.entry_command.is_empty());
        }
    }

    #[test]
    fn test_entry_command_targets_source_file() {
        let registry = LanguageRegistry::builtin();
        for profile in registry.profiles() {
            let joined = profile.entry_command.join(" ");
            assert!(
                joined.contains(&profile.source_filename),
                "{} command does not reference {}",
                profile.id,
                profile.source_filename
            );
        }
    }

    #[test]
    fn test_unknown_language_rejected() {
        let registry = LanguageRegistry::builtin();
        assert_matches!(
            registry.resolve("rust"),
            Err(SandboxError::UnsupportedLanguage(id)) if id == "rust"
        );
        // lookups are exact
        assert!(registry.resolve("Python").is_err());
        assert!(registry.resolve("").is_err());
    }

    #[test]
    fn test_images_table() {
        let images = LanguageRegistry::builtin().images();
        assert_eq!(images.len(), 5);
        assert_eq!(images["python"], "python:3.11-alpine");
        assert_eq!(images["javascript"], "node:18-alpine");
        assert_eq!(images["typescript"], "node:18-alpine");
        assert_eq!(images["java"], "openjdk:11-alpine");
        assert_eq!(images["cpp"], "gcc:latest");
    }

    #[test]
    fn test_image_override() {
        let registry = LanguageRegistry::builtin()
            .with_image_override("python", "python:3.12-alpine")
            .unwrap();
        assert_eq!(
            registry.resolve("python").unwrap().runtime_image,
            "python:3.12-alpine"
        );

        let err = LanguageRegistry::builtin()
            .with_image_override("rust", "rust:latest")
            .unwrap_err();
        assert_matches!(err, SandboxError::UnsupportedLanguage(_));
    }

    #[test]
    fn test_source_path() {
        let registry = LanguageRegistry::builtin();
        assert_eq!(registry.resolve("java").unwrap().source_path(), "/app/Main.java");
    }
}
