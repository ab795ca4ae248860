/// Derives remote object keys from local paths.
///
/// When `target_key` is set, every path maps to that literal key. This is
/// meant for renaming a single file; with a multi-file source all uploads land
/// on the same key and the last one to finish wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapper {
    prefix: String,
    strip_prefix: String,
    target_key: Option<String>,
}

impl KeyMapper {
    pub fn new(
        prefix: impl Into<String>,
        strip_prefix: impl Into<String>,
        target_key: Option<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            strip_prefix: strip_prefix.into(),
            target_key: target_key.filter(|k| !k.is_empty()),
        }
    }

    /// True when every path collapses onto one literal key
    pub fn is_fixed(&self) -> bool {
        self.target_key.is_some()
    }

    /// Construct the object key for a local path
    ///
    /// The strip prefix is removed only when it is a textual prefix of the
    /// path. The remainder is joined to the key prefix with a single `/`, and
    /// the result never starts with `/`.
    pub fn derive_key(&self, local_path: &str) -> String {
        if let Some(key) = &self.target_key {
            return key.trim_start_matches('/').to_string();
        }

        let rest = local_path
            .strip_prefix(self.strip_prefix.as_str())
            .unwrap_or(local_path);
        let rest = rest.trim_start_matches("./").trim_start_matches('/');

        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", prefix, rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_with_prefix() {
        let mapper = KeyMapper::new("releases/v1", "", None);
        assert_eq!(mapper.derive_key("app.tar.gz"), "releases/v1/app.tar.gz");
        assert_eq!(mapper.derive_key("./app.tar.gz"), "releases/v1/app.tar.gz");
        assert_eq!(mapper.derive_key("dir/app.js"), "releases/v1/dir/app.js");
    }

    #[test]
    fn test_key_strip_prefix() {
        let mapper = KeyMapper::new("/site", "public/", None);
        assert_eq!(mapper.derive_key("public/index.html"), "site/index.html");
        assert_eq!(
            mapper.derive_key("public/css/main.css"),
            "site/css/main.css"
        );
        // Not a prefix of this path, left untouched
        assert_eq!(mapper.derive_key("other/a.txt"), "site/other/a.txt");
    }

    #[test]
    fn test_key_without_prefix_is_bucket_relative() {
        let mapper = KeyMapper::new("", "/build", None);
        assert_eq!(mapper.derive_key("/build/out/a.bin"), "out/a.bin");

        let mapper = KeyMapper::new("/", "", None);
        assert_eq!(mapper.derive_key("/abs/path.txt"), "abs/path.txt");
    }

    #[test]
    fn test_fixed_target_collapses_all_paths() {
        let mapper = KeyMapper::new("ignored", "dist/", Some("/latest/app.zip".to_string()));
        assert!(mapper.is_fixed());
        for path in ["dist/a.zip", "b.txt", "deep/nested/c", ""] {
            assert_eq!(mapper.derive_key(path), "latest/app.zip");
        }
    }

    #[test]
    fn test_empty_target_key_is_ignored() {
        let mapper = KeyMapper::new("p", "", Some(String::new()));
        assert!(!mapper.is_fixed());
        assert_eq!(mapper.derive_key("a.txt"), "p/a.txt");
    }

    #[test]
    fn test_stripped_key_never_contains_strip_prefix() {
        let strip = "build/out/";
        let mapper = KeyMapper::new("", strip, None);
        for rel in ["a.txt", "x/y/z.bin", "build/out/nested.txt"] {
            let path = format!("{}{}", strip, rel);
            assert_eq!(mapper.derive_key(&path), rel);
        }
    }
}
