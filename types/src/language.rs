use std::path::Path;

/// Language identifiers served by the Biome language server.
pub const SUPPORTED_LANGUAGES: [&str; 15] = [
    "astro",
    "css",
    "graphql",
    "grit",
    "html",
    "javascript",
    "javascriptreact",
    "json",
    "jsonc",
    "snippets",
    "svelte",
    "tailwindcss",
    "typescript",
    "typescriptreact",
    "vue",
];

#[must_use]
pub fn is_supported_language(language: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&language)
}

/// Infer the editor language identifier from a file extension.
///
/// Only languages in [`SUPPORTED_LANGUAGES`] are returned; anything else is `None`.
#[must_use]
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let language = match ext.as_str() {
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "json" => "json",
        "jsonc" => "jsonc",
        "css" => "css",
        "graphql" | "gql" => "graphql",
        "grit" => "grit",
        "html" | "htm" => "html",
        "astro" => "astro",
        "svelte" => "svelte",
        "vue" => "vue",
        _ => return None,
    };
    Some(language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inferred_languages_are_supported() {
        for name in [
            "a.js", "a.mjs", "a.jsx", "a.ts", "a.tsx", "a.json", "a.jsonc", "a.css", "a.gql",
            "a.grit", "a.html", "a.astro", "a.svelte", "a.vue",
        ] {
            let language = language_for_path(Path::new(name)).unwrap();
            assert!(is_supported_language(language), "{name} -> {language}");
        }
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert_eq!(language_for_path(Path::new("main.rs")), None);
        assert_eq!(language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(language_for_path(Path::new("App.TSX")), Some("typescriptreact"));
    }
}
