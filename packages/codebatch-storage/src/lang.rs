//! Extension -> language hint lookup, used to annotate file records.
//!
//! Matching is case-insensitive on the extension only; files with no
//! recognized extension simply carry no hint rather than `"unknown"`.

/// Return the language hint for a path, if its extension is recognized.
pub fn hint_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('/').next().unwrap_or(path).rsplit_once('.')?.1;
    hint_for_extension(ext)
}

/// Return the language hint for a bare extension (no leading dot),
/// matched case-insensitively.
pub fn hint_for_extension(ext: &str) -> Option<&'static str> {
    let lower = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _)| *e == lower)
        .map(|(_, lang)| *lang)
}

const TABLE: &[(&str, &str)] = &[
    ("py", "python"),
    ("pyi", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("rs", "rust"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("scala", "scala"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("json", "json"),
    ("toml", "toml"),
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("sql", "sql"),
    ("proto", "protobuf"),
    ("cs", "csharp"),
    ("lua", "lua"),
    ("r", "r"),
    ("dart", "dart"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("hs", "haskell"),
    ("clj", "clojure"),
    ("cljs", "clojure"),
    ("vue", "vue"),
];
