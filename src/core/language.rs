use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of a test or implementation file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Cpp,
    Ruby,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        static EXTENSION_MAP: &[(&[&str], Language)] = &[
            (&["rs"], Language::Rust),
            (&["py"], Language::Python),
            (&["js", "jsx", "mjs", "cjs"], Language::JavaScript),
            (&["ts", "tsx", "mts", "cts"], Language::TypeScript),
            (&["java"], Language::Java),
            (&["go"], Language::Go),
            (&["cc", "cpp", "cxx", "hpp", "h"], Language::Cpp),
            (&["rb"], Language::Ruby),
        ];

        EXTENSION_MAP
            .iter()
            .find(|(exts, _)| exts.contains(&ext))
            .map(|(_, lang)| *lang)
            .unwrap_or(Language::Unknown)
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// JavaScript and TypeScript share test idioms (`describe`/`it`/`expect`).
    pub fn is_js_family(self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        static DISPLAY_STRINGS: &[(Language, &str)] = &[
            (Language::Rust, "Rust"),
            (Language::Python, "Python"),
            (Language::JavaScript, "JavaScript"),
            (Language::TypeScript, "TypeScript"),
            (Language::Java, "Java"),
            (Language::Go, "Go"),
            (Language::Cpp, "C++"),
            (Language::Ruby, "Ruby"),
            (Language::Unknown, "Unknown"),
        ];

        let name = DISPLAY_STRINGS
            .iter()
            .find(|(lang, _)| lang == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown");
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("tests/test_cart.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("cart.spec.ts")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
    }

    #[test]
    fn test_js_family() {
        assert!(Language::JavaScript.is_js_family());
        assert!(Language::TypeScript.is_js_family());
        assert!(!Language::Python.is_js_family());
    }
}
