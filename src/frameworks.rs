//! Test framework detection from source signatures.
//!
//! Each framework has *marker* patterns that identify it on their own (an
//! import, an include, a base class) and *shape* patterns shared with related
//! frameworks (`describe(`, `@Test`). Markers win; otherwise the framework with
//! the most shape matches for the test's language is chosen.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{Language, TestId, TestUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Pytest,
    Unittest,
    Jest,
    Mocha,
    Junit,
    Testng,
    Googletest,
    Rspec,
    RustTest,
    GoTest,
    Unknown,
}

impl TestFramework {
    pub fn as_str(self) -> &'static str {
        match self {
            TestFramework::Pytest => "pytest",
            TestFramework::Unittest => "unittest",
            TestFramework::Jest => "jest",
            TestFramework::Mocha => "mocha",
            TestFramework::Junit => "junit",
            TestFramework::Testng => "testng",
            TestFramework::Googletest => "googletest",
            TestFramework::Rspec => "rspec",
            TestFramework::RustTest => "rust",
            TestFramework::GoTest => "go",
            TestFramework::Unknown => "unknown",
        }
    }

    pub fn language(self) -> Language {
        match self {
            TestFramework::Pytest | TestFramework::Unittest => Language::Python,
            TestFramework::Jest | TestFramework::Mocha => Language::JavaScript,
            TestFramework::Junit | TestFramework::Testng => Language::Java,
            TestFramework::Googletest => Language::Cpp,
            TestFramework::Rspec => Language::Ruby,
            TestFramework::RustTest => Language::Rust,
            TestFramework::GoTest => Language::Go,
            TestFramework::Unknown => Language::Unknown,
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Signature {
    framework: TestFramework,
    markers: Vec<Regex>,
    shapes: Vec<Regex>,
}

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(p).expect("valid framework pattern"))
        .collect()
}

static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(|| {
    vec![
        Signature {
            framework: TestFramework::Unittest,
            markers: patterns(&[
                r"import\s+unittest",
                r"from\s+unittest",
                r"class\s+\w+\(.*TestCase\)",
            ]),
            shapes: patterns(&[r"self\.assert\w+\("]),
        },
        Signature {
            framework: TestFramework::Pytest,
            markers: patterns(&[r"import\s+pytest", r"from\s+pytest", r"@pytest\."]),
            shapes: patterns(&[r"(?m)^\s*def\s+test_\w*\(", r"(?m)^\s*assert\s+"]),
        },
        Signature {
            framework: TestFramework::Jest,
            markers: patterns(&[r#"from\s+['"]@?jest"#, r"\bjest\.", r"\bbeforeAll\("]),
            shapes: patterns(&[r"\bdescribe\(", r"\bit\(", r"\btest\(", r"\bexpect\("]),
        },
        Signature {
            framework: TestFramework::Mocha,
            markers: patterns(&[r#"from\s+['"]mocha['"]"#, r#"require\(['"]mocha['"]\)"#, r#"require\(['"]chai['"]\)"#]),
            shapes: patterns(&[r"\bdescribe\(", r"\bit\(", r"\bbefore\("]),
        },
        Signature {
            framework: TestFramework::Junit,
            markers: patterns(&[r"import\s+(?:static\s+)?org\.junit"]),
            shapes: patterns(&[r"@Test\b", r"\bAssert\.", r"\bassert(?:Equals|True|False|NotNull)\("]),
        },
        Signature {
            framework: TestFramework::Testng,
            markers: patterns(&[r"import\s+(?:static\s+)?org\.testng"]),
            shapes: patterns(&[r"@Test\b", r"\bAssert\."]),
        },
        Signature {
            framework: TestFramework::Googletest,
            markers: patterns(&[r#"#include\s+["<]gtest"#]),
            shapes: patterns(&[r"\bTEST(?:_F|_P)?\(", r"\bEXPECT_\w+\(", r"\bASSERT_\w+\("]),
        },
        Signature {
            framework: TestFramework::Rspec,
            markers: patterns(&[r#"require\s+['"](?:rspec|spec_helper)['"]"#, r"RSpec\."]),
            shapes: patterns(&[r"(?m)^\s*describe\s+", r"(?m)^\s*it\s+['\x22]", r"\bexpect\("]),
        },
        Signature {
            framework: TestFramework::RustTest,
            markers: patterns(&[r"#\[(?:tokio::)?test\]", r"#\[cfg\(test\)\]"]),
            shapes: patterns(&[r"\bassert(?:_eq|_ne)?!\("]),
        },
        Signature {
            framework: TestFramework::GoTest,
            markers: patterns(&[r#"import\s+(?:\(\s*)?"testing""#, r"\*testing\.T\b"]),
            shapes: patterns(&[r"func\s+Test\w*\("]),
        },
    ]
});

static TEST_DEFINITIONS: Lazy<Vec<(Language, Regex)>> = Lazy::new(|| {
    let defs: &[(Language, &str)] = &[
        (Language::Python, r"(?m)^\s*(?:async\s+)?def\s+test\w*\(|class\s+Test\w*"),
        (Language::JavaScript, r"\b(?:describe|test|it)\s*\("),
        (Language::Java, r"@Test\b|\bvoid\s+test\w*\("),
        (Language::Rust, r"#\[(?:tokio::)?test\]"),
        (Language::Go, r"func\s+Test\w*\("),
        (Language::Cpp, r"\bTEST(?:_F|_P)?\("),
        (Language::Ruby, r"(?m)^\s*(?:describe|it|context)\s+|def\s+test_\w*"),
    ];
    defs.iter()
        .map(|(lang, p)| (*lang, Regex::new(p).expect("valid test definition pattern")))
        .collect()
});

fn family(language: Language) -> Language {
    if language.is_js_family() {
        Language::JavaScript
    } else {
        language
    }
}

/// Identify the framework a test source is written against.
pub fn detect_framework(source: &str, language: Language) -> TestFramework {
    let language = family(language);
    let applicable = SIGNATURES
        .iter()
        .filter(|sig| language == Language::Unknown || sig.framework.language() == language);

    let mut best: Option<(usize, TestFramework)> = None;
    for signature in applicable {
        if signature.markers.iter().any(|re| re.is_match(source)) {
            return signature.framework;
        }
        let shape_hits = signature.shapes.iter().filter(|re| re.is_match(source)).count();
        if shape_hits > 0 && best.map_or(true, |(hits, _)| shape_hits > hits) {
            best = Some((shape_hits, signature.framework));
        }
    }
    best.map(|(_, framework)| framework)
        .unwrap_or(TestFramework::Unknown)
}

/// True when the source declares at least one test in a form its language recognizes.
pub fn has_test_definition(source: &str, language: Language) -> bool {
    let language = family(language);
    TEST_DEFINITIONS
        .iter()
        .filter(|(lang, _)| language == Language::Unknown || *lang == language)
        .any(|(_, re)| re.is_match(source))
}

/// Tests grouped by detected framework; undetected tests land under `Unknown`.
pub fn group_by_framework(tests: &[TestUnit]) -> BTreeMap<TestFramework, Vec<TestId>> {
    let mut groups: BTreeMap<TestFramework, Vec<TestId>> = BTreeMap::new();
    for test in tests {
        let framework = detect_framework(&test.source, test.language());
        groups.entry(framework).or_default().push(test.id.clone());
    }
    for ids in groups.values_mut() {
        ids.sort();
    }
    groups
}

/// Test files per source file; the denominator is at least one.
pub fn test_to_source_ratio(test_files: usize, source_files: usize) -> f64 {
    test_files as f64 / source_files.max(1) as f64
}
