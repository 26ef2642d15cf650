//! Who may see, change and review which listings.
//!
//! Every rule matches on [`Role`] exhaustively so adding a role forces a decision
//! at each call site.

use super::listing::{CarListing, ListingStatus};
use super::user::{Role, User, UserStatus};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// The signed-in user as seen by authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub status: UserStatus,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            status: user.status,
        }
    }
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    fn owns(&self, listing: &CarListing) -> bool {
        listing.dealer_id == self.id
    }
}

pub fn can_view(actor: &Actor, listing: &CarListing) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Dealer => listing.status == ListingStatus::Approved || actor.owns(listing),
    }
}

/// Edit or delete.
pub fn can_mutate(actor: &Actor, listing: &CarListing) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Dealer => actor.owns(listing),
    }
}

/// Approve or reject.
pub fn can_transition(actor: &Actor, _listing: &CarListing) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Dealer => false,
    }
}

/// Only approved dealers submit listings.
pub fn can_submit_listing(actor: &Actor) -> bool {
    match (actor.role, actor.status) {
        (Role::Dealer, UserStatus::Active) => true,
        (Role::Dealer, UserStatus::Pending | UserStatus::Inactive) => false,
        (Role::Admin, _) => false,
    }
}

/// Admin-only operations on users and subscriptions.
pub fn can_administer(actor: &Actor) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Dealer => false,
    }
}

/// A dealer may read their own records; admins may read anyone's.
pub fn can_access_user(actor: &Actor, user_id: Uuid) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Dealer => actor.id == user_id,
    }
}

/// Which screens a user lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Area {
    Admin,
    Dealer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Allow,
    SignIn,
    RedirectAdminHome,
    RedirectDealerHome,
}

pub fn guard_route(actor: Option<&Actor>, area: Area) -> RouteDecision {
    let Some(actor) = actor else {
        return RouteDecision::SignIn;
    };
    match (area, actor.role) {
        (Area::Admin, Role::Admin) | (Area::Dealer, Role::Dealer) => RouteDecision::Allow,
        (Area::Admin, Role::Dealer) => RouteDecision::RedirectDealerHome,
        (Area::Dealer, Role::Admin) => RouteDecision::RedirectAdminHome,
    }
}

/// Which slice of listings a list screen starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingScope {
    /// Approved listings from every dealer.
    #[default]
    Marketplace,
    /// The actor's own listings in any status.
    Mine,
    /// Everything; admins only.
    All,
}

impl ListingScope {
    pub fn allowed_for(self, actor: &Actor) -> bool {
        match self {
            ListingScope::Marketplace | ListingScope::Mine => true,
            ListingScope::All => actor.is_admin(),
        }
    }

    pub fn includes(self, actor: &Actor, listing: &CarListing) -> bool {
        let in_scope = match self {
            ListingScope::Marketplace => listing.status == ListingStatus::Approved,
            ListingScope::Mine => actor.owns(listing),
            ListingScope::All => true,
        };
        in_scope && can_view(actor, listing)
    }
}
