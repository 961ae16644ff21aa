//! The household view consumed from the membership directory.

use serde::{Deserialize, Serialize};

use crate::types::{HouseholdId, UserId};

/// A household as reported by the membership directory.
///
/// The vault reads this to authorize callers and validate recipients. It never
/// mutates membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub household_id: HouseholdId,
    pub name: String,
    pub owner_id: UserId,
    /// Members in join order. The owner is always the first member.
    pub members: Vec<UserId>,
}

impl Household {
    /// A new household whose only member is its owner.
    pub fn new(household_id: HouseholdId, name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            household_id,
            name: name.into(),
            members: vec![owner_id.clone()],
            owner_id,
        }
    }

    /// Whether `user` is currently a member.
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|m| m == user)
    }

    /// Whether `user` owns the household.
    pub fn is_owner(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Add a member, keeping join order. Returns false if already present.
    pub fn add_member(&mut self, user: UserId) -> bool {
        if self.is_member(&user) {
            return false;
        }
        self.members.push(user);
        true
    }

    /// Remove a member. Returns false if they were not a member.
    pub fn remove_member(&mut self, user: &UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != user);
        self.members.len() != before
    }
}

/// A user known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
}
