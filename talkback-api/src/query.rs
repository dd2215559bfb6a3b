use std::fmt;

use crate::{Comment, ServiceError};

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ArticleId(pub String);

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CollectionId(pub String);

impl CollectionId {
    pub fn stub() -> CollectionId {
        CollectionId(String::from("stub-collection"))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque pointer to the next page of a collection, only ever handed back to
/// the service
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PageCursor(pub u32);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    pub article_id: ArticleId,
    pub url: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Whether the service should also open the live stream for this collection
    #[serde(default)]
    pub stream: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageCursor>,
}

impl CommentsQuery {
    pub fn validate(&self) -> Result<(), ServiceError> {
        crate::validate_string(&self.article_id.0)?;
        crate::validate_string(&self.url)?;
        crate::validate_string(&self.title)?;
        if let Some(section) = &self.section {
            crate::validate_string(section)?;
        }
        for tag in &self.tags {
            crate::validate_string(tag)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPage {
    /// Absent when the collection could not be created or found
    #[serde(default)]
    pub collection_id: Option<CollectionId>,

    #[serde(default)]
    pub comments: Vec<Comment>,

    /// None once the last page was reached
    #[serde(default)]
    pub next_page: Option<PageCursor>,

    #[serde(default)]
    pub unclassified_article: bool,

    #[serde(default)]
    pub not_allowed_to_create_collection: bool,

    #[serde(default)]
    pub comments_enabled: Option<bool>,
}

impl CollectionPage {
    pub fn new(collection_id: CollectionId, comments: Vec<Comment>) -> CollectionPage {
        CollectionPage {
            collection_id: Some(collection_id),
            comments,
            ..CollectionPage::default()
        }
    }

    pub fn with_next_page(mut self, next: PageCursor) -> CollectionPage {
        self.next_page = Some(next);
        self
    }
}
