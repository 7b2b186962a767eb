//! Path joining and pattern matching.

use std::str::FromStr;

use regex::Regex;

use crate::error::{Result, RouterError};

/// Returns the shortest path equivalent to `path` by purely lexical
/// processing.
///
/// Repeated slashes collapse, `.` elements vanish, `..` removes the element
/// before it (or is dropped at the root of a rooted path). The result has no
/// trailing slash unless it is the root. An empty input yields `"."`.
///
/// ```
/// use trellis::clean_path;
///
/// assert_eq!(clean_path("/a//b/./c/.."), "/a/b");
/// assert_eq!(clean_path("/../x/"), "/x");
/// assert_eq!(clean_path(""), ".");
/// ```
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Joins path elements with `/` and cleans the result.
///
/// Empty elements are ignored; if every element is empty the result is the
/// empty string.
///
/// ```
/// use trellis::join_paths;
///
/// assert_eq!(join_paths(&["/api", "v1/", "/users"]), "/api/v1/users");
/// assert_eq!(join_paths(&["", ""]), "");
/// ```
pub fn join_paths(elements: &[&str]) -> String {
    let non_empty: Vec<&str> = elements.iter().copied().filter(|e| !e.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean_path(&non_empty.join("/"))
}

/// Makes a joined registration path absolute.
pub(crate) fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else if path.is_empty() || path == "." {
        "/".to_string()
    } else {
        format!("/{path}")
    }
}

/// Values captured by a [`PathPattern`], in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// An empty set, as seen by not-found handlers.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// The value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The value captured for `name`, converted with [`FromStr`].
    ///
    /// `None` when the parameter is absent or does not parse.
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.parse().ok()
    }

    /// Number of captured values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// A compiled path pattern for matching URLs.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    shape: String,
    param_names: Vec<String>,
    catch_all: bool,
}

impl PathPattern {
    /// Parses a path pattern string.
    ///
    /// Pattern syntax:
    /// - `/users` - Literal path
    /// - `/users/:id` - One named segment
    /// - `/files/*filepath` - Catch-all, must be last; its value keeps the
    ///   leading slash
    ///
    /// # Example
    ///
    /// ```
    /// use trellis::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/:id/comments/:comment_id").unwrap();
    /// let params = pattern.match_path("/posts/123/comments/456").unwrap();
    /// assert_eq!(params.get("id"), Some("123"));
    /// assert_eq!(params.get("comment_id"), Some("456"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut param_names = Vec::new();
        let mut regex_str = String::from("^");
        let mut shape = String::new();
        let mut catch_all = false;

        let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            if let Some(name) = part.strip_prefix(':') {
                check_name(pattern, name)?;
                param_names.push(name.to_string());
                regex_str.push_str("/([^/]+)");
                shape.push_str("/:");
            } else if let Some(name) = part.strip_prefix('*') {
                check_name(pattern, name)?;
                if i + 1 != parts.len() {
                    return Err(RouterError::InvalidPattern(format!(
                        "catch-all must be the last segment in {pattern}"
                    )));
                }
                param_names.push(name.to_string());
                regex_str.push_str("(/.*)");
                shape.push_str("/*");
                catch_all = true;
            } else {
                regex_str.push('/');
                regex_str.push_str(&regex::escape(part));
                shape.push('/');
                shape.push_str(part);
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }

        if !catch_all {
            regex_str.push_str("/?");
        }
        regex_str.push('$');

        let regex = Regex::new(&regex_str)
            .map_err(|e| RouterError::InvalidPattern(format!("{pattern}: {e}")))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            shape,
            param_names,
            catch_all,
        })
    }

    /// Attempts to match a path against this pattern.
    ///
    /// Returns extracted parameters if the path matches.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;

        let mut params = PathParams::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                params.insert(name.clone(), value.as_str());
            }
        }

        Some(params)
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parameter names in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// The pattern with parameter names erased, e.g. `/users/:` for
    /// `/users/:id`. Two patterns with the same shape match the same paths.
    pub(crate) fn shape(&self) -> &str {
        &self.shape
    }

    /// Whether the pattern ends with a catch-all segment.
    pub const fn is_catch_all(&self) -> bool {
        self.catch_all
    }
}

fn check_name(pattern: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains([':', '*']) {
        return Err(RouterError::InvalidPattern(format!(
            "bad parameter name {name:?} in {pattern}"
        )));
    }
    Ok(())
}
