//! File-type classification used to pick a chunking strategy (`SPEC_FULL.md`
//! section 4.1 / 6).

use common::FileKind;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "mjs", "cjs", "go", "rs", "java", "kt", "kts", "scala", "c",
    "h", "cc", "cpp", "cxx", "hpp", "hxx", "cs", "rb", "php", "sh", "bash", "zsh", "fish", "swift",
    "m", "mm", "lua", "pl", "pm", "r", "jl", "ex", "exs", "erl", "hs", "clj", "cljs", "cljc",
    "sql", "yaml", "yml", "toml", "ini", "json", "jsonc", "css", "scss", "sass", "less", "vue",
    "svelte", "astro", "graphql", "gql", "proto", "tf", "hcl", "dockerfile",
];

const DOC_EXTENSIONS: &[&str] = &[
    "md", "markdown", "mkd", "txt", "rst", "rest", "html", "htm", "adoc", "asciidoc", "org", "tex",
];

/// Returns the chunking strategy for `relpath`, or `None` if the extension is
/// not recognized as either code or documentation.
#[must_use]
pub fn classify(relpath: &str) -> Option<FileKind> {
    let ext = extension_of(relpath)?;
    if CODE_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileKind::Code)
    } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileKind::Doc)
    } else {
        None
    }
}

fn extension_of(relpath: &str) -> Option<String> {
    let file_name = relpath.rsplit('/').next().unwrap_or(relpath);
    if file_name.eq_ignore_ascii_case("dockerfile") {
        return Some("dockerfile".to_string());
    }
    let (_, ext) = file_name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::classify;
    use common::FileKind;

    #[test]
    fn classifies_rust_as_code() {
        assert_eq!(classify("src/main.rs"), Some(FileKind::Code));
    }

    #[test]
    fn classifies_markdown_as_doc() {
        assert_eq!(classify("README.md"), Some(FileKind::Doc));
    }

    #[test]
    fn classifies_dockerfile_by_name() {
        assert_eq!(classify("Dockerfile"), Some(FileKind::Code));
    }

    #[test]
    fn unknown_extension_is_unclassified() {
        assert_eq!(classify("image.png"), None);
    }
}
