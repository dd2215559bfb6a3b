use anyhow::{anyhow, Context};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response from the service: {0}")]
    InvalidResponse(String),

    #[error("Service answered with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),
}

impl ServiceError {
    /// Builds the error for a non-successful HTTP answer, using the `message`
    /// field of a JSON body when there is one
    pub fn from_response(status: u16, body: &[u8]) -> ServiceError {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|data| {
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        ServiceError::Status { status, message }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum UpdateUserError {
    /// The service refused the change, `0` is its error key (eg. a pseudonym
    /// already in use)
    #[error("User update rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl UpdateUserError {
    pub fn parse(body: &[u8]) -> anyhow::Result<UpdateUserError> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing user update error contents")?;
        let is_service_error = data
            .get("sudsError")
            .and_then(|e| e.as_bool())
            .unwrap_or(false);
        if !is_service_error {
            return Err(anyhow!("user update error is not a service rejection"));
        }
        Ok(UpdateUserError::Rejected(String::from(
            data.get("error")
                .and_then(|e| e.as_str())
                .ok_or_else(|| anyhow!("user update rejection without an error key"))?,
        )))
    }
}
