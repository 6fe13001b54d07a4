use serde::Serialize;

use super::{Application, Role, User};

/// An authenticated subject: either an end user or a registered application.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    User(User),
    Application(Application),
}

impl Principal {
    /// The id ownership checks compare against. Applications act on behalf of
    /// the user that registered them.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        match self {
            Principal::User(user) => &user.id,
            Principal::Application(app) => &app.owner_id,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Principal::User(user) => user.role,
            Principal::Application(_) => Role::User,
        }
    }

    #[must_use]
    pub fn as_user(&self) -> Option<&User> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Application(_) => None,
        }
    }
}
