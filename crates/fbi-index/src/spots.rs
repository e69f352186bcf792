//! Spot mapping: logical storage-area labels for archive paths.

use std::path::Path;

/// Maps path prefixes to spot names. The longest matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct SpotMapping {
    /// `(prefix, name)`, longest prefix first
    entries: Vec<(String, String)>,
}

impl SpotMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a spot file: one `name path` pair per line, `#` comments allowed.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut mapping = Self::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            if let (Some(name), Some(path)) = (fields.next(), fields.next()) {
                mapping.insert(path, name);
            }
        }
        mapping
    }

    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&text))
    }

    /// Add a spot. A later insert for the same prefix replaces the name.
    pub fn insert(&mut self, prefix: impl AsRef<str>, name: impl Into<String>) {
        let prefix = normalize(prefix.as_ref());
        let name = name.into();

        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            entry.1 = name;
            return;
        }
        self.entries.push((prefix, name));
        self.entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Spot name for `path`, if any prefix covers it.
    #[must_use]
    pub fn get_spot(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(prefix, _)| covers(prefix, path))
            .map(|(_, name)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(prefix: &str) -> String {
    match prefix.trim_end_matches('/') {
        "" => "/".to_string(),
        p => p.to_string(),
    }
}

/// Prefix match on whole path components.
fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let mut spots = SpotMapping::new();
        spots.insert("/badc", "badc");
        spots.insert("/badc/cmip6/", "cmip6");

        assert_eq!(spots.get_spot("/badc/cmip6/data/tas.nc"), Some("cmip6"));
        assert_eq!(spots.get_spot("/badc/ukmo/x.pp"), Some("badc"));
        assert_eq!(spots.get_spot("/neodc/x"), None);
    }

    #[test]
    fn test_prefix_matches_whole_components() {
        let mut spots = SpotMapping::new();
        spots.insert("/badc/cmip6", "cmip6");

        assert_eq!(spots.get_spot("/badc/cmip6"), Some("cmip6"));
        assert_eq!(spots.get_spot("/badc/cmip6plus/x.nc"), None);
    }

    #[test]
    fn test_parse_spot_file() {
        let spots = SpotMapping::parse(
            "# name path\n\
             spot-1234-cmip6 /badc/cmip6\n\
             \n\
             malformed\n\
             spot-9-sentinel /neodc/sentinel1a\n",
        );

        assert_eq!(spots.len(), 2);
        assert_eq!(spots.get_spot("/neodc/sentinel1a/a.zip"), Some("spot-9-sentinel"));
    }

    #[test]
    fn test_insert_replaces_name() {
        let mut spots = SpotMapping::new();
        spots.insert("/badc", "old");
        spots.insert("/badc/", "new");

        assert_eq!(spots.len(), 1);
        assert_eq!(spots.get_spot("/badc/x"), Some("new"));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("spots.txt");
        std::fs::write(&file, "archive /\n").unwrap();

        let spots = SpotMapping::from_file(&file).await.unwrap();
        assert_eq!(spots.get_spot("/anything/here"), Some("archive"));
    }
}
