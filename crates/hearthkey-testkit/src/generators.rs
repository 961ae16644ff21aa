//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use hearthkey_core::{HouseholdId, UserId, WrappedKey, WrappedKeyMap};

/// Generate a valid user id.
pub fn user_id() -> impl Strategy<Value = UserId> {
    "[a-z][a-z0-9-]{0,15}".prop_map(|s| UserId::new(s).expect("pattern yields valid ids"))
}

/// Generate a valid household id.
pub fn household_id() -> impl Strategy<Value = HouseholdId> {
    "h-[a-z0-9]{1,12}".prop_map(|s| HouseholdId::new(s).expect("pattern yields valid ids"))
}

/// Generate opaque key material. Deliberately not restricted to any encoding.
pub fn key_material() -> impl Strategy<Value = String> {
    "[ -~]{0,64}"
}

/// Generate a wrapped key. The vault refuses empty ones.
pub fn wrapped_key() -> impl Strategy<Value = WrappedKey> {
    "[ -~]{1,64}".prop_map(WrappedKey::new)
}

/// Generate between `min` and `max` distinct user ids.
pub fn distinct_users(min: usize, max: usize) -> impl Strategy<Value = Vec<UserId>> {
    prop::collection::btree_set(user_id(), min..=max)
        .prop_map(|set: BTreeSet<UserId>| set.into_iter().collect())
}

/// Generate a vault map whose keys are drawn from `members`.
pub fn wrapped_keys_for(members: Vec<UserId>) -> impl Strategy<Value = WrappedKeyMap> {
    let len = members.len();
    prop::collection::vec((any::<bool>(), wrapped_key()), len).prop_map(move |picks| {
        members
            .iter()
            .zip(picks)
            .filter(|(_, (keep, _))| *keep)
            .map(|(member, (_, key))| (member.clone(), key))
            .collect()
    })
}

/// A household membership split: the owner, further members and outsiders.
#[derive(Debug, Clone)]
pub struct MembershipParams {
    pub owner: UserId,
    pub members: Vec<UserId>,
    pub outsiders: Vec<UserId>,
}

impl Arbitrary for MembershipParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        (distinct_users(2, 10), 0usize..=4)
            .prop_map(|(users, outsider_count)| {
                let outsider_count = outsider_count.min(users.len() - 1);
                let split = users.len() - outsider_count;
                let owner = users[0].clone();
                MembershipParams {
                    owner,
                    members: users[1..split].to_vec(),
                    outsiders: users[split..].to_vec(),
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn membership_split_is_disjoint(params: MembershipParams) {
            prop_assert!(!params.members.contains(&params.owner));
            prop_assert!(!params.outsiders.contains(&params.owner));
            for outsider in &params.outsiders {
                prop_assert!(!params.members.contains(outsider));
            }
        }

        #[test]
        fn wrapped_keys_only_name_members(
            (members, map) in distinct_users(1, 6)
                .prop_flat_map(|m| (Just(m.clone()), wrapped_keys_for(m)))
        ) {
            for id in map.keys() {
                prop_assert!(members.contains(id));
            }
        }
    }
}
