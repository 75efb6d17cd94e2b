use userverse_core::{ActorSnapshot, UserId};

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware after the bearer token is verified and the
/// user is found active. Present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    actor: ActorSnapshot,
}

impl CallerContext {
    pub fn new(actor: ActorSnapshot) -> Self {
        Self { actor }
    }

    pub fn user_id(&self) -> UserId {
        self.actor.id
    }

    pub fn actor(&self) -> &ActorSnapshot {
        &self.actor
    }
}
