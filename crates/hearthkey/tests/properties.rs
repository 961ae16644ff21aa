//! Property tests over registry and vault behavior.

use std::sync::Arc;

use proptest::prelude::*;

use hearthkey::core::{Caller, Household, HouseholdId, UserId, WrappedKey, WrappedKeyMap};
use hearthkey::store::{KeyStore, MemoryStore, MembershipDirectory};
use hearthkey::{Hearthkey, HearthkeyConfig, KeyError, KeySetup, VaultConfig, WriteMode};
use hearthkey_testkit::generators::{key_material, wrapped_key};
use hearthkey_testkit::MembershipParams;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn household_id() -> HouseholdId {
    HouseholdId::new("h-prop").unwrap()
}

async fn service_for(
    params: &MembershipParams,
    mode: WriteMode,
) -> (Arc<MemoryStore>, Hearthkey) {
    let store = Arc::new(MemoryStore::new());
    let config = HearthkeyConfig {
        vault: VaultConfig { write_mode: mode },
    };
    let service = Hearthkey::new(store.clone(), store.clone(), config);

    let mut household = Household::new(household_id(), "Prop", params.owner.clone());
    for member in &params.members {
        household.add_member(member.clone());
    }
    store.create_household(&household).await.unwrap();
    (store, service)
}

fn write_mode() -> impl Strategy<Value = WriteMode> {
    prop_oneof![Just(WriteMode::Record), Just(WriteMode::Snapshot)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Key material is stored and returned verbatim, and the first setup wins.
    #[test]
    fn setup_is_write_once_and_verbatim(
        first in (key_material(), key_material(), key_material()),
        second in (key_material(), key_material(), key_material()),
    ) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let service = Hearthkey::new(store.clone(), store, HearthkeyConfig::default());
            let user = UserId::new("u").unwrap();
            service
                .registry()
                .register(&Caller::new(user.clone(), "u@example.com"))
                .await
                .unwrap();

            let (pk, epk, salt) = first.clone();
            let result = service
                .registry()
                .setup_user_keys(&user, KeySetup::new(pk.as_str(), epk.as_str(), salt.as_str()))
                .await;
            prop_assert!(result.is_ok());

            let (pk2, epk2, salt2) = second;
            let again = service
                .registry()
                .setup_user_keys(&user, KeySetup::new(pk2, epk2, salt2))
                .await;

            if pk.is_empty() {
                // An empty public key never counts as set up.
                prop_assert!(again.is_ok());
            } else {
                prop_assert!(matches!(again, Err(KeyError::AlreadySetUp(_))));
                let record = service.registry().get_own_keys(&user).await.unwrap();
                prop_assert_eq!(record.public_key.as_str(), pk.as_str());
                prop_assert_eq!(record.encrypted_private_key.as_str(), epk.as_str());
                prop_assert_eq!(record.salt.as_str(), salt.as_str());
            }
            Ok(())
        })?;
    }

    /// Bulk set either rejects a payload naming a non-member or replaces the
    /// map with exactly the payload.
    #[test]
    fn set_all_keys_validates_then_replaces(
        params: MembershipParams,
        include_outsider: bool,
        keys in proptest::collection::vec(wrapped_key(), 12),
        mode in write_mode(),
    ) {
        runtime().block_on(async {
            let (store, service) = service_for(&params, mode).await;

            let mut seeded = WrappedKeyMap::new();
            seeded.insert(params.owner.clone(), WrappedKey::new("seed"));
            store.replace_member_keys(&household_id(), &seeded).await.unwrap();

            let mut payload = WrappedKeyMap::new();
            let recipients = params.members.iter().chain(
                params.outsiders.iter().take(usize::from(include_outsider)),
            );
            for (recipient, key) in recipients.zip(keys) {
                payload.insert(recipient.clone(), key);
            }
            let names_outsider = payload.keys().any(|id| params.outsiders.contains(id));

            let result = service
                .vault()
                .set_all_keys(&household_id(), &params.owner, payload.clone())
                .await;
            let stored = store.list_member_keys(&household_id()).await.unwrap();

            if names_outsider {
                prop_assert!(matches!(result, Err(KeyError::InvalidMember(_))));
                prop_assert_eq!(stored, seeded);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(stored, payload);
            }
            Ok(())
        })?;
    }

    /// A caller without an entry is refused whatever the target, and the
    /// vault is unchanged.
    #[test]
    fn keyless_caller_is_always_forbidden(
        params: MembershipParams,
        target_is_member: bool,
        key in wrapped_key(),
        mode in write_mode(),
    ) {
        prop_assume!(!params.members.is_empty());
        runtime().block_on(async {
            let (store, service) = service_for(&params, mode).await;
            let caller = &params.members[0];
            let target = if target_is_member || params.outsiders.is_empty() {
                params.owner.clone()
            } else {
                params.outsiders[0].clone()
            };

            let result = service
                .vault()
                .add_member_key(&household_id(), caller, &target, key)
                .await;
            prop_assert!(matches!(result, Err(KeyError::Forbidden(_))));
            prop_assert!(store.list_member_keys(&household_id()).await.unwrap().is_empty());
            Ok(())
        })?;
    }

    /// Repeated removal has the same effect as a single one.
    #[test]
    fn remove_is_idempotent(params: MembershipParams, mode in write_mode(), times in 1usize..4) {
        runtime().block_on(async {
            let (store, service) = service_for(&params, mode).await;
            let mut seeded = WrappedKeyMap::new();
            seeded.insert(params.owner.clone(), WrappedKey::new("w-owner"));
            for member in &params.members {
                seeded.insert(member.clone(), WrappedKey::new(format!("w-{member}")));
            }
            store.replace_member_keys(&household_id(), &seeded).await.unwrap();

            let victim = params.members.first().unwrap_or(&params.owner).clone();
            for _ in 0..times {
                service
                    .vault()
                    .remove_member_key(&household_id(), &params.owner, &victim)
                    .await
                    .unwrap();
            }

            let mut expected = seeded;
            expected.remove(&victim);
            prop_assert_eq!(store.list_member_keys(&household_id()).await.unwrap(), expected);
            Ok(())
        })?;
    }
}
