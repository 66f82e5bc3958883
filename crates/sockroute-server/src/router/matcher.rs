//! Path template matching.
//!
//! Templates are `/`-separated segments; a segment starting with `:` captures
//! the request segment under that name. Literal segments compare
//! case-insensitively, trailing slashes are optional and the query string is
//! ignored. Captured values are taken verbatim (no percent-decoding).

use std::collections::HashMap;

/// How much of the request path a template has to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whole path (verb and `all` routes).
    Exact,
    /// Leading segments (`use` routes): `/api` matches `/api/users`.
    Prefix,
    /// Every path (app-level middleware). Yields `path = "/"` and no params.
    Always,
}

/// Result of a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub path: String,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Lower-cased literal.
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    segments: Vec<Segment>,
    mode: MatchMode,
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Strip `?query` and `#fragment`.
fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

impl PathMatcher {
    pub fn new(pattern: &str, mode: MatchMode) -> Self {
        let segments = path_segments(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_owned()),
                _ => Segment::Literal(s.to_lowercase()),
            })
            .collect();

        Self {
            pattern: pattern.to_owned(),
            segments,
            mode,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn matches(&self, url: &str) -> Option<PathMatch> {
        if self.mode == MatchMode::Always {
            return Some(PathMatch {
                path: "/".to_owned(),
                params: HashMap::new(),
            });
        }

        let path = strip_query(url);
        let parts: Vec<&str> = path_segments(path).collect();

        let fits = match self.mode {
            MatchMode::Exact => parts.len() == self.segments.len(),
            _ => parts.len() >= self.segments.len(),
        };
        if !fits {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if part.to_lowercase() != *lit {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_owned());
                }
            }
        }

        let matched = &parts[..self.segments.len()];
        Some(PathMatch {
            path: format!("/{}", matched.join("/")),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(p: &str) -> PathMatcher {
        PathMatcher::new(p, MatchMode::Exact)
    }

    #[test]
    fn params_are_extracted() {
        let m = exact("/users/:id").matches("/users/42").expect("match");
        assert_eq!(m.path, "/users/42");
        assert_eq!(m.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn literal_segments_ignore_case_and_trailing_slash() {
        assert!(exact("/Users").matches("/users/").is_some());
        assert!(exact("/users").matches("/users/42").is_none());
    }

    #[test]
    fn query_is_ignored() {
        let m = exact("/search").matches("/search?q=rust#top").expect("match");
        assert_eq!(m.path, "/search");
    }

    #[test]
    fn prefix_matches_leading_segments() {
        let m = PathMatcher::new("/api", MatchMode::Prefix)
            .matches("/api/users/1")
            .expect("match");
        assert_eq!(m.path, "/api");
        assert!(PathMatcher::new("/", MatchMode::Prefix).matches("/anything").is_some());
        assert!(PathMatcher::new("/api", MatchMode::Prefix).matches("/apix").is_none());
    }

    #[test]
    fn always_matches_root() {
        let m = PathMatcher::new("/", MatchMode::Always).matches("/a/b").expect("match");
        assert_eq!(m.path, "/");
        assert!(m.params.is_empty());
    }
}
