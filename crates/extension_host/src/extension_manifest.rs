use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, path::Path, sync::Arc};

/// The schema version of the [`ExtensionManifest`].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct SchemaVersion(pub i32);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SchemaVersion {
    pub const CURRENT: Self = Self(1);
}

/// The contents of an `extension.toml`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ExtensionManifest {
    pub id: Arc<str>,
    pub name: String,
    pub version: Arc<str>,
    #[serde(default = "default_schema_version")]
    pub schema_version: SchemaVersion,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub lib: LibManifestEntry,

    #[serde(default)]
    pub language_servers: BTreeMap<Arc<str>, LanguageServerManifestEntry>,
}

fn default_schema_version() -> SchemaVersion {
    SchemaVersion::CURRENT
}

#[derive(Clone, Default, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct LibManifestEntry {
    pub kind: Option<ExtensionLibraryKind>,
    /// The version of the extension API the library was built against.
    pub version: Option<semver::Version>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum ExtensionLibraryKind {
    Rust,
}

#[derive(Clone, Default, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct LanguageServerManifestEntry {
    /// Deprecated in favor of `languages`.
    #[serde(default)]
    language: Option<Arc<str>>,
    /// The list of languages this language server should work with.
    #[serde(default)]
    languages: Vec<Arc<str>>,
}

impl LanguageServerManifestEntry {
    /// Returns the list of languages for the language server.
    ///
    /// Prefer this over accessing the `language` or `languages` fields directly,
    /// as we currently support both.
    pub fn languages(&self) -> impl IntoIterator<Item = Arc<str>> + '_ {
        let language = if self.languages.is_empty() {
            self.language.clone()
        } else {
            None
        };
        self.languages.iter().cloned().chain(language)
    }
}

impl ExtensionManifest {
    pub fn load(extension_dir: &Path) -> Result<Self> {
        let extension_name = extension_dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid extension directory {extension_dir:?}"))?;

        let manifest_path = extension_dir.join("extension.toml");
        let manifest_content = fs::read_to_string(&manifest_path)
            .with_context(|| format!("failed to load {extension_name} extension.toml"))?;
        Self::parse(&manifest_content)
            .with_context(|| format!("invalid extension.toml for extension {extension_name}"))
    }

    pub fn parse(manifest_content: &str) -> Result<Self> {
        Ok(toml::from_str(manifest_content)?)
    }

    pub fn provides_language_server(&self, language_server_id: &str) -> bool {
        self.language_servers.contains_key(language_server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_manifest() {
        let manifest = ExtensionManifest::parse(indoc! {r#"
            id = "cpp"
            name = "C++"
            version = "0.1.0"
            schema_version = 1
            authors = ["Klyx Developers"]

            [lib]
            kind = "Rust"
            version = "0.1.0"

            [language_servers.clangd]
            languages = ["C", "C++"]

            [language_servers.legacy]
            language = "C"
        "#})
        .unwrap();

        assert_eq!(manifest.id.as_ref(), "cpp");
        assert_eq!(manifest.schema_version, SchemaVersion(1));
        assert_eq!(manifest.lib.kind, Some(ExtensionLibraryKind::Rust));
        assert_eq!(manifest.lib.version, Some(semver::Version::new(0, 1, 0)));
        assert!(manifest.provides_language_server("clangd"));
        assert!(!manifest.provides_language_server("ccls"));

        let clangd_languages = manifest.language_servers["clangd"]
            .languages()
            .into_iter()
            .collect::<Vec<_>>();
        assert_eq!(clangd_languages, vec![Arc::from("C"), Arc::from("C++")]);

        let legacy_languages = manifest.language_servers["legacy"]
            .languages()
            .into_iter()
            .collect::<Vec<_>>();
        assert_eq!(legacy_languages, vec![Arc::from("C")]);
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = ExtensionManifest::parse(indoc! {r#"
            id = "empty"
            name = "Empty"
            version = "1.0.0"
        "#})
        .unwrap();

        assert_eq!(manifest.schema_version, SchemaVersion::CURRENT);
        assert_eq!(manifest.lib, LibManifestEntry::default());
        assert!(manifest.language_servers.is_empty());
    }

    #[test]
    fn test_load_reports_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let error = ExtensionManifest::load(dir.path()).unwrap_err();
        assert!(format!("{error:#}").contains("failed to load"));
    }
}
