use std::cell::RefCell;

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use talkback_client::api::{
    AuthData, AuthQuery, CollectionId, CollectionPage, CommentsQuery, DataService, DeleteComment,
    DeleteCommentResult, NewComment, PostCommentResult, RawStreamEvent, ServiceError,
    UpdateUserError, UserUpdate,
};

use crate::feed;

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}

/// Parses a successful answer, or turns a failed one into the matching error
async fn parse<R>(resp: reqwest::Response) -> Result<R, ServiceError>
where
    R: for<'de> serde::Deserialize<'de>,
{
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport)?;
    if !status.is_success() {
        return Err(ServiceError::from_response(status.as_u16(), &body));
    }
    serde_json::from_slice(&body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

/// Data service talking JSON over HTTP to the commenting backend
///
/// Auth data is cached until `forget_auth` or a forced query.
pub struct HttpDataService {
    host: String,
    client: reqwest::Client,
    auth: RefCell<Option<AuthData>>,
}

impl HttpDataService {
    pub fn new(host: String) -> HttpDataService {
        HttpDataService {
            host: String::from(host.trim_end_matches('/')),
            client: reqwest::Client::new(),
            auth: RefCell::new(None),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(format!("{}/api/{}", self.host, path));
        match self.auth.borrow().as_ref().and_then(|a| a.token.as_ref()) {
            Some(token) => req.bearer_auth(&token.0),
            None => req,
        }
    }
}

#[async_trait(?Send)]
impl DataService for HttpDataService {
    async fn get_comments(&self, query: &CommentsQuery) -> Result<CollectionPage, ServiceError> {
        query.validate()?;
        let resp = self
            .post("comments")
            .json(query)
            .send()
            .await
            .map_err(transport)?;
        parse(resp).await
    }

    fn comment_stream(&self, collection: &CollectionId) -> LocalBoxStream<'static, RawStreamEvent> {
        feed::comment_stream(&self.host, collection)
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<PostCommentResult, ServiceError> {
        comment.validate()?;
        let resp = self
            .post("comments/new")
            .json(comment)
            .send()
            .await
            .map_err(transport)?;
        parse(resp).await
    }

    async fn delete_comment(
        &self,
        req: &DeleteComment,
    ) -> Result<DeleteCommentResult, ServiceError> {
        let resp = self
            .post("comments/delete")
            .json(req)
            .send()
            .await
            .map_err(transport)?;
        parse(resp).await
    }

    async fn get_auth(&self, query: AuthQuery) -> Result<Option<AuthData>, ServiceError> {
        if !query.force {
            if let Some(auth) = self.auth.borrow().clone() {
                return Ok(Some(auth));
            }
        }
        let resp = self
            .client
            .get(format!("{}/api/auth", self.host))
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT
            || resp.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            tracing::debug!(status = %resp.status(), "service does not know the user");
            *self.auth.borrow_mut() = None;
            return Ok(None);
        }
        let auth: AuthData = parse(resp).await?;
        *self.auth.borrow_mut() = Some(auth.clone());
        Ok(Some(auth))
    }

    async fn update_user(&self, update: &UserUpdate) -> Result<(), UpdateUserError> {
        let resp = self
            .post("user")
            .json(update)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.bytes().await.map_err(transport)?;
        match UpdateUserError::parse(&body) {
            Ok(err) => Err(err),
            Err(err) => {
                tracing::debug!(?err, "user update failure is not a rejection");
                Err(ServiceError::from_response(status.as_u16(), &body).into())
            }
        }
    }

    fn forget_auth(&self) {
        *self.auth.borrow_mut() = None;
    }
}
