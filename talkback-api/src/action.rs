use crate::{CollectionId, CommentId, ServiceError, Time};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub collection_id: CollectionId,
    pub body: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), ServiceError> {
        crate::validate_string(&self.collection_id.0)?;
        crate::validate_string(&self.body)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCommentResult {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub comment_id: Option<CommentId>,

    #[serde(default)]
    pub body_html: Option<String>,

    #[serde(default)]
    pub created_at: Option<Time>,

    /// The service did not accept the session token the request was sent with
    #[serde(default)]
    pub invalid_session: bool,

    #[serde(default)]
    pub error_message: Option<String>,
}

impl PostCommentResult {
    pub fn posted(id: CommentId, body_html: String, created_at: Time) -> PostCommentResult {
        PostCommentResult {
            success: true,
            comment_id: Some(id),
            body_html: Some(body_html),
            created_at: Some(created_at),
            ..PostCommentResult::default()
        }
    }

    pub fn invalid_session() -> PostCommentResult {
        PostCommentResult {
            invalid_session: true,
            ..PostCommentResult::default()
        }
    }

    pub fn failed(error_message: Option<String>) -> PostCommentResult {
        PostCommentResult {
            error_message,
            ..PostCommentResult::default()
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteComment {
    pub collection_id: CollectionId,
    pub comment_id: CommentId,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCommentResult {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub invalid_session: bool,

    #[serde(default)]
    pub error_message: Option<String>,
}

impl DeleteCommentResult {
    pub fn deleted() -> DeleteCommentResult {
        DeleteCommentResult {
            success: true,
            ..DeleteCommentResult::default()
        }
    }

    pub fn invalid_session() -> DeleteCommentResult {
        DeleteCommentResult {
            invalid_session: true,
            ..DeleteCommentResult::default()
        }
    }

    pub fn failed(error_message: Option<String>) -> DeleteCommentResult {
        DeleteCommentResult {
            error_message,
            ..DeleteCommentResult::default()
        }
    }
}
