use crate::models::Video;

pub const ALL_CATEGORY: &str = "All";

/// Visible-subset criteria rebuilt from the route's query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterState {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.active_search().is_none()
            && self.active_category().is_none()
            && self.active_tag().is_none()
    }

    pub fn active_search(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    /// `All` selects everything and is not a predicate.
    pub fn active_category(&self) -> Option<&str> {
        non_blank(self.category.as_deref()).filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORY))
    }

    pub fn active_tag(&self) -> Option<&str> {
        non_blank(self.tag.as_deref())
    }

    pub fn matches(&self, video: &Video) -> bool {
        if let Some(query) = self.active_search() {
            let query = query.to_lowercase();
            let hit = [&video.title, &video.description, &video.channel_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }

        if let Some(category) = self.active_category() {
            let category = category.to_lowercase();
            let hit = video.category.to_lowercase() == category
                || video.tags.iter().any(|tag| tag.to_lowercase() == category);
            if !hit {
                return false;
            }
        }

        if let Some(tag) = self.active_tag() {
            let tag = tag.to_lowercase();
            if !video
                .tags
                .iter()
                .any(|candidate| candidate.to_lowercase().contains(&tag))
            {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Subset of `videos` matching `state`, in source order.
pub fn filter(videos: &[Video], state: &FilterState) -> Vec<Video> {
    if state.is_empty() {
        return videos.to_vec();
    }
    videos
        .iter()
        .filter(|video| state.matches(video))
        .cloned()
        .collect()
}

pub const RELATED_LIMIT: usize = 10;

/// Catalog minus `current_id`, first [`RELATED_LIMIT`] in server order.
pub fn related(videos: &[Video], current_id: &str) -> Vec<Video> {
    videos
        .iter()
        .filter(|video| video.id != current_id)
        .take(RELATED_LIMIT)
        .cloned()
        .collect()
}
