//! Canonicalisation of user-supplied artifact locations.
//!
//! A location is either a bare filesystem path (`./mlruns`, `/srv/runs/`) or
//! a URI (`file:///srv/runs`, `s3://bucket/prefix`). Local locations become
//! absolute; every other scheme is passed through. Trailing `/` are trimmed
//! in both cases.
//!
//! The only platform-dependent step, turning a native absolute path into a
//! URI path, lives in [`PathStyle`]. [`PathStyle::native`] picks the style of
//! the build target; tests can drive either style on any host.

use std::io;
use std::path::{Component, Path, PathBuf};

use runledger_api::Failure;
use url::Url;

/// How native absolute paths map onto URI paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/`-separated paths. Bare paths stay bare; `file:` URIs keep their
    /// scheme and host.
    Posix,
    /// `\`-separated drive paths. Output is always a `file:///C:/...` URI.
    Windows,
}

impl PathStyle {
    pub const fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    /// Whether local locations must be rewritten to the `file` scheme.
    fn forces_file_scheme(self) -> bool {
        matches!(self, PathStyle::Windows)
    }

    /// URI path for a native absolute path.
    pub fn uri_path(self, absolute: &str) -> String {
        match self {
            PathStyle::Posix => absolute.to_string(),
            PathStyle::Windows => format!("/{}", absolute.replace('\\', "/")),
        }
    }

    /// Native path for the path component of a `file:` URI.
    fn native_path(self, uri_path: &str) -> String {
        match self {
            PathStyle::Posix => uri_path.to_string(),
            PathStyle::Windows => match uri_path.strip_prefix('/') {
                Some(rest) if has_drive_letter(rest) => rest.to_string(),
                _ => uri_path.to_string(),
            },
        }
    }

    /// A one-letter "scheme" is a drive letter on Windows (`C:\runs`).
    fn is_drive_scheme(self, scheme: &str) -> bool {
        self == PathStyle::Windows && scheme.len() == 1
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Canonicalise `raw` for the build target, resolving relative paths
/// against the process working directory.
///
/// Returns `Ok(None)` for an empty input: normalisation is opt-in and an
/// empty location stays unset.
pub fn normalize_artifact_location(raw: &str) -> Result<Option<String>, Failure> {
    normalize_with(raw, PathStyle::native(), absolute_path)
}

/// [`normalize_artifact_location`] with an explicit style and resolver.
///
/// `resolve` turns a native path into an absolute one.
pub fn normalize_with(
    raw: &str,
    style: PathStyle,
    resolve: impl Fn(&str) -> io::Result<String>,
) -> Result<Option<String>, Failure> {
    if raw.is_empty() {
        return Ok(None);
    }
    let trimmed = raw.trim_end_matches('/');

    if trimmed.chars().any(char::is_control) {
        return Err(invalid_location(raw, "contains control characters"));
    }

    let scheme = split_scheme(trimmed)
        .map_err(|reason| invalid_location(raw, reason))?
        .filter(|s| !style.is_drive_scheme(s));

    let resolve_path = |path: &str| {
        resolve(path).map_err(|e| {
            Failure::invalid_parameter(format!("error getting absolute path: {e}"))
        })
    };

    match scheme {
        None => {
            let absolute = resolve_path(trimmed)?;
            if style.forces_file_scheme() {
                file_url(&style.uri_path(&absolute)).map(Some)
            } else {
                Ok(Some(absolute))
            }
        }
        Some(s) if s.eq_ignore_ascii_case("file") => {
            let mut url =
                Url::parse(trimmed).map_err(|e| invalid_location(raw, &e.to_string()))?;
            let uri_path = urlencoding::decode(url.path())
                .map_err(|e| invalid_location(raw, &e.to_string()))?
                .into_owned();
            let absolute = resolve_path(&style.native_path(&uri_path))?;
            set_uri_path(&mut url, &style.uri_path(&absolute));
            Ok(Some(url.to_string()))
        }
        Some(_) => {
            Url::parse(trimmed).map_err(|e| invalid_location(raw, &e.to_string()))?;
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn file_url(path: &str) -> Result<String, Failure> {
    let mut url = Url::parse("file:///").map_err(|e| Failure::internal(e.to_string()))?;
    set_uri_path(&mut url, path);
    Ok(url.to_string())
}

/// `set_path` escapes everything but `%`, so a literal `%` in a decoded path
/// would be read back as an escape on the next pass.
fn set_uri_path(url: &mut Url, decoded: &str) {
    url.set_path(&decoded.replace('%', "%25"));
}

fn invalid_location(raw: &str, reason: &str) -> Failure {
    Failure::invalid_parameter(format!("invalid artifact location {raw:?}: {reason}"))
}

/// RFC 3986 scheme, if `s` starts with one.
///
/// `scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`. A colon that
/// appears after a `/`, `?` or `#` is part of a path, not a scheme.
fn split_scheme(s: &str) -> Result<Option<&str>, &'static str> {
    for (i, c) in s.char_indices() {
        match c {
            ':' if i == 0 => return Err("missing protocol scheme"),
            ':' => return Ok(Some(&s[..i])),
            c if c.is_ascii_alphabetic() => {}
            '0'..='9' | '+' | '-' | '.' if i > 0 => {}
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// Absolute, lexically cleaned form of `path`, relative to the working
/// directory. Does not touch the filesystem beyond reading the cwd.
pub fn absolute_path(path: &str) -> io::Result<String> {
    let path = Path::new(path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let cleaned = clean(&joined);
    cleaned
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"))
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use runledger_api::ErrorCode;

    fn posix(raw: &str) -> Result<Option<String>, Failure> {
        normalize_with(raw, PathStyle::Posix, |p| {
            Ok(if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/work/{p}")
            })
        })
    }

    fn windows(raw: &str) -> Result<Option<String>, Failure> {
        normalize_with(raw, PathStyle::Windows, |p| {
            let p = p.replace('/', "\\");
            let p = p.trim_end_matches('\\');
            Ok(if has_drive_letter(p) {
                p.to_string()
            } else {
                format!("C:\\work\\{}", p.trim_start_matches(".\\"))
            })
        })
    }

    #[test]
    fn empty_input_is_left_unset() {
        assert_eq!(posix("").unwrap(), None);
    }

    #[test]
    fn absolute_posix_path_loses_trailing_slash() {
        assert_eq!(posix("/tmp/mlruns/").unwrap().as_deref(), Some("/tmp/mlruns"));
    }

    #[test]
    fn relative_posix_path_is_resolved() {
        assert_eq!(posix("mlruns").unwrap().as_deref(), Some("/work/mlruns"));
    }

    #[test]
    fn file_uri_keeps_scheme_on_posix() {
        assert_eq!(
            posix("file:///tmp/mlruns/").unwrap().as_deref(),
            Some("file:///tmp/mlruns")
        );
    }

    #[test]
    fn remote_scheme_passes_through() {
        assert_eq!(
            posix("s3://bucket/path/").unwrap().as_deref(),
            Some("s3://bucket/path")
        );
        assert_eq!(
            windows("gs://bucket/a b").unwrap().as_deref(),
            Some("gs://bucket/a b")
        );
    }

    #[test]
    fn windows_drive_path_becomes_file_uri() {
        assert_eq!(
            windows("C:\\Users\\me\\mlruns\\").unwrap().as_deref(),
            Some("file:///C:/Users/me/mlruns")
        );
    }

    #[test]
    fn windows_relative_path_becomes_file_uri() {
        assert_eq!(
            windows("mlruns").unwrap().as_deref(),
            Some("file:///C:/work/mlruns")
        );
    }

    #[test]
    fn windows_uri_path_rewrite() {
        assert_eq!(PathStyle::Windows.uri_path("C:\\a\\b"), "/C:/a/b");
        assert_eq!(PathStyle::Posix.uri_path("/a/b"), "/a/b");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "/tmp/mlruns/",
            "mlruns",
            "./a/../b//c/",
            "file:///tmp/my%20runs",
            "file:///tmp/mlruns//",
            "file:///tmp/%2541",
            "file:///tmp/a%252Fb",
            "s3://bucket/path//",
        ] {
            let once = posix(raw).unwrap().unwrap();
            let twice = posix(&once).unwrap().unwrap();
            assert_eq!(once, twice, "posix {raw}");
        }
        for raw in ["C:\\runs\\", "runs", "file:///C:/runs/", "C:\\a%41", "file:///C:/a%2541"] {
            let once = windows(raw).unwrap().unwrap();
            let twice = windows(&once).unwrap().unwrap();
            assert_eq!(once, twice, "windows {raw}");
        }
    }

    #[test]
    fn literal_percent_in_file_path_survives() {
        assert_eq!(
            posix("file:///tmp/%2541").unwrap().as_deref(),
            Some("file:///tmp/%2541")
        );
        assert_eq!(
            posix("file:///tmp/a%252Fb/").unwrap().as_deref(),
            Some("file:///tmp/a%252Fb")
        );
        assert_eq!(
            windows("C:\\runs%41").unwrap().as_deref(),
            Some("file:///C:/runs%2541")
        );
    }

    #[test]
    fn unparsable_uri_is_invalid_parameter() {
        let err = posix("://nowhere").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        let err = posix("s3://[bad/x").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        let err = posix("/tmp/\u{7}bell").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[test]
    fn resolver_failure_carries_cause() {
        let err = normalize_with("runs", PathStyle::Posix, |_| {
            Err(io::Error::new(io::ErrorKind::NotFound, "cwd removed"))
        })
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        assert!(err.message().contains("cwd removed"));
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(split_scheme("s3://b"), Ok(Some("s3")));
        assert_eq!(split_scheme("/tmp/a:b"), Ok(None));
        assert_eq!(split_scheme("./a:b"), Ok(None));
        assert_eq!(split_scheme("1abc:x"), Ok(None));
        assert!(split_scheme(":x").is_err());
    }

    #[test]
    fn clean_removes_dot_segments() {
        assert_eq!(clean(Path::new("/a/./b/../c//d")), PathBuf::from("/a/c/d"));
        assert_eq!(clean(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn native_resolver_produces_absolute_paths() {
        let got = normalize_artifact_location("some/dir/").unwrap().unwrap();
        let expected = absolute_path("some/dir").unwrap();
        if PathStyle::native() == PathStyle::Posix {
            assert_eq!(got, expected);
            assert!(got.starts_with('/'));
            assert!(!got.ends_with('/'));
        }
    }
}
