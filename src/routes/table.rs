// Route table for the anime/manga browser.
// Maps URL paths to named views, with `:param` capture and redirects.

use serde::{Deserialize, Serialize};

/// Maximum redirect hops `resolve` will follow before giving up.
const MAX_REDIRECT_HOPS: usize = 8;

/// Named view screens the application can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewName {
    Home,
    Anime,
    AnimeDetail,
    Manga,
    MangaDetail,
    Browse,
    Topology,
    Stats,
    Recommend,
}

impl ViewName {
    /// Get the display title for this view.
    pub fn title(&self) -> &'static str {
        match self {
            ViewName::Home => "Home",
            ViewName::Anime => "Anime",
            ViewName::AnimeDetail => "Anime Detail",
            ViewName::Manga => "Manga",
            ViewName::MangaDetail => "Manga Detail",
            ViewName::Browse => "Browse",
            ViewName::Topology => "Topology",
            ViewName::Stats => "Stats",
            ViewName::Recommend => "Recommend",
        }
    }
}

/// Target of a route entry: render a view, or redirect to another path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteTarget {
    View(ViewName),
    Redirect(&'static str),
}

/// One declarative route entry. Pattern segments starting with `:`
/// capture the corresponding path segment as a named parameter.
#[derive(Debug, Clone)]
struct Route {
    pattern: &'static str,
    target: RouteTarget,
}

/// A resolved route: the view to render plus extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The view this path resolved to.
    pub view: ViewName,
    params: Vec<(String, String)>,
}

impl RouteMatch {
    /// Look up an extracted path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All extracted parameters in pattern order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Result of a single resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path matched a view entry.
    Match(RouteMatch),
    /// The path matched a redirect entry; resolution continues at the target.
    Redirect(String),
}

/// Ordered route table. Entries are tried first to last; the first
/// matching pattern wins. Unmatched paths resolve to `None` and the
/// caller decides what a not-found looks like.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// The canonical table for the application: the union of the route
    /// sets shipped by the two frontend variants, with `/` redirecting
    /// to `/home`.
    pub fn canonical() -> Self {
        Self {
            routes: vec![
                Route {
                    pattern: "/",
                    target: RouteTarget::Redirect("/home"),
                },
                Route {
                    pattern: "/home",
                    target: RouteTarget::View(ViewName::Home),
                },
                Route {
                    pattern: "/anime",
                    target: RouteTarget::View(ViewName::Anime),
                },
                Route {
                    pattern: "/anime/:id",
                    target: RouteTarget::View(ViewName::AnimeDetail),
                },
                Route {
                    pattern: "/manga",
                    target: RouteTarget::View(ViewName::Manga),
                },
                Route {
                    pattern: "/manga/:id",
                    target: RouteTarget::View(ViewName::MangaDetail),
                },
                Route {
                    pattern: "/browse",
                    target: RouteTarget::View(ViewName::Browse),
                },
                Route {
                    pattern: "/topology",
                    target: RouteTarget::View(ViewName::Topology),
                },
                Route {
                    pattern: "/stats",
                    target: RouteTarget::View(ViewName::Stats),
                },
                Route {
                    pattern: "/recommend",
                    target: RouteTarget::View(ViewName::Recommend),
                },
            ],
        }
    }

    /// Perform a single resolution step without following redirects.
    pub fn resolve_entry(&self, path: &str) -> Option<Resolution> {
        let path = normalize(path)?;

        for route in &self.routes {
            if let Some(params) = match_pattern(route.pattern, path) {
                return Some(match route.target {
                    RouteTarget::View(view) => Resolution::Match(RouteMatch { view, params }),
                    RouteTarget::Redirect(target) => Resolution::Redirect(target.to_string()),
                });
            }
        }

        None
    }

    /// Resolve a path to a view, following redirects up to a bounded
    /// hop count.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let mut current = path.to_string();

        for _ in 0..MAX_REDIRECT_HOPS {
            match self.resolve_entry(&current)? {
                Resolution::Match(matched) => return Some(matched),
                Resolution::Redirect(target) => current = target,
            }
        }

        None
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Strip query string and fragment, and tolerate a single trailing
/// slash. Returns `None` for paths that are not absolute.
fn normalize(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    if !path.starts_with('/') {
        return None;
    }
    if path.len() > 1 {
        Some(path.trim_end_matches('/'))
    } else {
        Some(path)
    }
}

/// Match a path against a pattern, extracting `:name` segments.
fn match_pattern(pattern: &str, path: &str) -> Option<Vec<(String, String)>> {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = Vec::new();
    for (pat, seg) in pattern_segments.iter().zip(&path_segments) {
        if let Some(name) = pat.strip_prefix(':') {
            params.push((name.to_string(), seg.to_string()));
        } else if pat != seg {
            return None;
        }
    }

    Some(params)
}
