//! String-level path splitting shared by the handlers and extractors.
//!
//! These work on the path string as it arrived in the message and never touch
//! the file system. Only `/` is treated as a separator.

/// Final component of `path`; empty when `path` ends with `/`.
#[must_use]
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Everything before the final component, without the trailing `/`.
///
/// The root is kept as `/`; a bare file name has an empty directory.
#[must_use]
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => match path[..i].trim_end_matches('/') {
            "" => "/",
            dir => dir,
        },
        None => "",
    }
}

/// Extension of the final component including the leading dot, or an empty
/// string. Leading dots of the name do not start an extension, so `.bashrc`
/// has none.
#[must_use]
pub fn extension(path: &str) -> &str {
    let name = basename(path);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(i) => &name[stem_start + i..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(basename("/data/obs/readme"), "readme");
        assert_eq!(basename("readme"), "readme");
        assert_eq!(basename("/data/obs/"), "");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/data/obs/readme"), "/data/obs");
        assert_eq!(dirname("/readme"), "/");
        assert_eq!(dirname("readme"), "");
        assert_eq!(dirname("//readme"), "/");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/data/tas.nc"), ".nc");
        assert_eq!(extension("/data/archive.tar.gz"), ".gz");
        assert_eq!(extension("/data/obs/readme"), "");
        assert_eq!(extension("/home/user/.bashrc"), "");
        assert_eq!(extension("/home/user/..hidden.txt"), ".txt");
        assert_eq!(extension("/data/trailing."), ".");
    }

    #[test]
    fn test_extension_ignores_dots_in_directories() {
        assert_eq!(extension("/data/v1.2/readme"), "");
    }
}
