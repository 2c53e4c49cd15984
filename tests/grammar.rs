//! Grammar registry and lifecycle tests (no network access)

use code_chunker::grammar::{
    language_for_extension, GrammarRegistry, GrammarStatus, BUILTIN_LANGUAGES,
};

fn registry() -> GrammarRegistry {
    let dir = tempfile::TempDir::new().expect("temp dir");
    GrammarRegistry::with_cache_dir(dir.keep()).expect("registry")
}

#[test]
fn every_builtin_language_parses() {
    let registry = registry();

    for (language, _) in BUILTIN_LANGUAGES {
        assert!(registry.is_installed(language), "{language} not installed");
        let parser = registry.parser(language);
        assert!(parser.is_ok(), "{language} parser failed");
    }
}

#[tokio::test]
async fn installed_language_parses_without_network() {
    let registry = registry();

    // A built-in needs no install step; get_parser succeeds with
    // auto-download disabled
    let mut parser = registry
        .get_parser("python", false)
        .await
        .expect("python is installed");
    let tree = parser.parse("def f(): pass", None).expect("tree");
    assert_eq!(tree.root_node().kind(), "module");
}

#[tokio::test]
async fn missing_language_without_download_is_denied() {
    let registry = registry();
    let err = match registry.get_parser("brainfuck", false).await {
        Err(e) => e,
        Ok(_) => panic!("expected brainfuck to be unavailable"),
    };
    assert!(matches!(
        err,
        code_chunker::Error::GrammarUnavailable { .. }
    ));
}

#[test]
fn install_of_builtin_is_a_noop() {
    let registry = registry();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let installed = runtime.block_on(registry.install("rust", None)).unwrap();
    assert!(!installed);
    assert!(registry.is_installed("rust"));
}

#[test]
fn uninstall_of_builtin_reports_false() {
    let registry = registry();
    assert!(!registry.uninstall("python").unwrap());
    assert!(registry.is_installed("python"));
}

#[test]
fn metadata_reports_abi_and_extensions() {
    let registry = registry();
    let metadata = registry.get_metadata("python").unwrap();

    assert!(metadata.abi_version >= 13);
    assert!(metadata
        .file_extensions
        .iter()
        .any(|e| e == "py"));
    assert!(metadata.installed_path.is_none());
}

#[test]
fn list_installed_covers_builtins() {
    let registry = registry();
    let installed = registry.list_installed();
    for (language, _) in BUILTIN_LANGUAGES {
        assert!(installed.iter().any(|l| l == language));
    }
}

#[test]
fn extension_mapping_matches_registry() {
    assert_eq!(language_for_extension("rs"), Some("rust"));
    assert_eq!(language_for_extension("kt"), Some("kotlin"));
    assert_eq!(language_for_extension("tsx"), Some("typescript"));
    assert_eq!(language_for_extension("nope"), None);
}

#[test]
fn sources_catalog_tracks_status() {
    let registry = registry();
    let sources = registry.sources();

    sources
        .add_source(
            "toml",
            "https://github.com/tree-sitter-grammars/tree-sitter-toml",
        )
        .unwrap();
    sources.mark_status("toml", GrammarStatus::Building).unwrap();

    let descriptor = sources.describe("toml").unwrap();
    assert_eq!(descriptor.status, GrammarStatus::Building);
    assert!(!descriptor.is_available());

    sources.mark_error("toml", "no compiler").unwrap();
    let descriptor = sources.describe("toml").unwrap();
    assert_eq!(descriptor.status, GrammarStatus::Error);
    assert_eq!(descriptor.error.as_deref(), Some("no compiler"));
}

#[test]
fn clean_cache_on_empty_cache_is_safe() {
    let registry = registry();
    assert_eq!(registry.clean_cache(None).unwrap(), 0);
}
