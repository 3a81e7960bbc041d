use uuid::Uuid;

use crate::models::Post;

/// Actor
///
/// The identity context under which an operation is evaluated. Resolved by the
/// API layer (extractors) and passed into every service call, so the decision
/// rules below stay callable without any transport or storage in sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User { id: Uuid, is_staff: bool },
}

impl Actor {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::Anonymous => None,
            Actor::User { id, .. } => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User { .. })
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::User { is_staff: true, .. })
    }
}

/// Action
///
/// The operations the policy decides on. `Create` covers both new posts
/// (no resource) and new comments (scoped to a readable post).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Like,
    Upload,
    AdminManage,
}

/// can_perform
///
/// The single pure decision function: is `actor` permitted to perform `action`
/// against `post` (None for operations without a post resource)?
///
/// Rules:
/// - AdminManage (categories, user listing): staff only.
/// - Read: public posts are readable by anyone; private posts only by their
///   author. Listing (no resource) is always permitted; visibility filtering
///   happens in the query itself.
/// - Create without a resource (new post): any authenticated user. Create
///   scoped to a post (new comment): any authenticated user who can read it.
/// - Update / Delete / Upload: the post's author, or a staff override.
/// - Like: any authenticated user, on any post they can read.
pub fn can_perform(actor: &Actor, action: Action, post: Option<&Post>) -> bool {
    match action {
        Action::AdminManage => actor.is_staff(),
        Action::Read => match post {
            None => true,
            Some(p) => p.is_public || actor.id() == Some(p.author_id),
        },
        Action::Create => match post {
            None => actor.is_authenticated(),
            Some(p) => actor.is_authenticated() && can_perform(actor, Action::Read, Some(p)),
        },
        Action::Update | Action::Delete | Action::Upload => match post {
            None => false,
            Some(p) => actor.id() == Some(p.author_id) || actor.is_staff(),
        },
        Action::Like => match post {
            None => false,
            Some(p) => actor.is_authenticated() && can_perform(actor, Action::Read, Some(p)),
        },
    }
}
