use anyhow::{bail, Context, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use url::{form_urlencoded, Url};

use crate::filter::{FilterState, ALL_CATEGORY};

pub const CATEGORIES: [&str; 8] = [
    ALL_CATEGORY,
    "Trending",
    "Music",
    "Gaming",
    "Movies",
    "News",
    "Sports",
    "Education",
];

pub const SIDEBAR_TAGS: [&str; 8] = [
    "React",
    "JavaScript",
    "Python",
    "Web Development",
    "AI",
    "Machine Learning",
    "Crypto",
    "Gaming",
];

const ROUTE_BASE: &str = "http://zutube.local/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home(FilterState),
    Video { id: String },
    Login,
    Signup,
}

impl Default for Route {
    fn default() -> Self {
        Route::Home(FilterState::default())
    }
}

impl Route {
    pub fn home() -> Self {
        Route::default()
    }

    pub fn video<S: Into<String>>(id: S) -> Self {
        Route::Video { id: id.into() }
    }

    pub fn parse(path: &str) -> Result<Self> {
        let base = Url::parse(ROUTE_BASE).context("routes: base url")?;
        let url = base
            .join(path.trim())
            .with_context(|| format!("routes: invalid path {path:?}"))?;
        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| {
                parts
                    .filter(|part| !part.is_empty())
                    .map(|part| percent_decode_str(part).decode_utf8_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        match segments.as_slice() {
            [] => {
                let mut filter = FilterState::default();
                for (key, value) in url.query_pairs() {
                    match key.as_ref() {
                        "search" => filter.search = Some(value.into_owned()),
                        "category" => filter.category = Some(value.into_owned()),
                        "tag" => filter.tag = Some(value.into_owned()),
                        _ => {}
                    }
                }
                Ok(Route::Home(filter))
            }
            [first, id] if first == "video" => Ok(Route::Video { id: id.clone() }),
            [only] if only == "login" => Ok(Route::Login),
            [only] if only == "signup" => Ok(Route::Signup),
            _ => bail!("routes: no page at {path}"),
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Route::Home(filter) => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                if let Some(search) = &filter.search {
                    query.append_pair("search", search);
                }
                if let Some(category) = &filter.category {
                    query.append_pair("category", category);
                }
                if let Some(tag) = &filter.tag {
                    query.append_pair("tag", tag);
                }
                let query = query.finish();
                if query.is_empty() {
                    "/".to_string()
                } else {
                    format!("/?{query}")
                }
            }
            Route::Video { id } => format!("/video/{}", utf8_percent_encode(id, NON_ALPHANUMERIC)),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
        }
    }

    pub fn filter(&self) -> Option<&FilterState> {
        match self {
            Route::Home(filter) => Some(filter),
            _ => None,
        }
    }
}

/// Search box submit: replaces the query with `search`, or clears it when blank.
pub fn search_submit(text: &str) -> Route {
    let text = text.trim();
    if text.is_empty() {
        return Route::home();
    }
    Route::Home(FilterState {
        search: Some(text.to_string()),
        ..Default::default()
    })
}

pub fn category_link(category: &str) -> Route {
    let category = category.trim();
    if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORY) {
        return Route::home();
    }
    Route::Home(FilterState {
        category: Some(category.to_string()),
        ..Default::default()
    })
}

pub fn tag_link(tag: &str) -> Route {
    let tag = tag.trim();
    if tag.is_empty() {
        return Route::home();
    }
    Route::Home(FilterState {
        tag: Some(tag.to_string()),
        ..Default::default()
    })
}

/// Back-stack of visited routes.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Route>,
}

impl History {
    pub fn push(&mut self, route: Route) {
        if self.entries.last() != Some(&route) {
            self.entries.push(route);
        }
    }

    pub fn back(&mut self) -> Option<Route> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
