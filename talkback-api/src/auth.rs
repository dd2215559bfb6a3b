use crate::default_true;

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(String::from("stub-token"))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthQuery {
    /// Bypass any auth information cached by the data service
    pub force: bool,
}

impl AuthQuery {
    pub fn cached() -> AuthQuery {
        AuthQuery { force: false }
    }

    pub fn forced() -> AuthQuery {
        AuthQuery { force: true }
    }
}

/// What the data service knows about the current user
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    #[serde(default)]
    pub token: Option<AuthToken>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub admin: bool,

    #[serde(default)]
    pub moderator: bool,

    /// The user is known but has not picked a pseudonym yet
    #[serde(default)]
    pub pseudonym_missing: bool,

    /// Set to false when the commenting service is known to be down
    #[serde(default = "default_true")]
    pub service_up: bool,

    /// The user had a session that is no longer valid
    #[serde(default)]
    pub session_expired: bool,
}

impl AuthData {
    pub fn logged_in(token: AuthToken, display_name: String) -> AuthData {
        AuthData {
            token: Some(token),
            display_name: Some(display_name),
            ..AuthData::anonymous()
        }
    }

    pub fn anonymous() -> AuthData {
        AuthData {
            token: None,
            display_name: None,
            admin: false,
            moderator: false,
            pseudonym_missing: false,
            service_up: true,
            session_expired: false,
        }
    }

    pub fn without_pseudonym() -> AuthData {
        AuthData {
            pseudonym_missing: true,
            ..AuthData::anonymous()
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.admin || self.moderator
    }
}

/// Fields of the user profile to change, anything else the settings form
/// submitted is passed through as-is
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudonym: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserUpdate {
    pub fn pseudonym(pseudonym: String) -> UserUpdate {
        UserUpdate {
            pseudonym: Some(pseudonym),
            extra: serde_json::Map::new(),
        }
    }
}
