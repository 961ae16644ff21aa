//! End-to-end onboarding and revocation scenarios.

use std::sync::Arc;

use hearthkey::store::{KeyStore, MembershipDirectory, SqliteStore};
use hearthkey::{Hearthkey, HearthkeyConfig, KeyAccessState, KeyError, WriteMode};
use hearthkey_testkit::{setup_member, ClientKeys, HouseholdFixture, Member, TEST_PASSPHRASE};

#[tokio::test]
async fn onboarding_chain_gives_every_member_the_same_key() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    let bob = fixture.join("bob").await;

    let pending = fixture
        .service
        .workflow()
        .pending_members(&fixture.household_id, fixture.owner.id())
        .await
        .unwrap();
    assert_eq!(pending, vec![alice.id().clone(), bob.id().clone()]);

    // The owner onboards alice; alice, now keyed, onboards bob.
    fixture.onboard(&fixture.owner, &alice).await.unwrap();
    fixture.onboard(&alice, &bob).await.unwrap();

    for member in [&fixture.owner, &alice, &bob] {
        let key = fixture.unwrap_for(member).await.unwrap();
        assert_eq!(key.as_ref(), Some(&fixture.household_key));
    }
    assert!(fixture
        .service
        .workflow()
        .pending_members(&fixture.household_id, bob.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn keyless_member_cannot_onboard_anyone() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    let bob = fixture.join("bob").await;

    let err = fixture.onboard(&alice, &bob).await.unwrap_err();
    assert!(matches!(err, KeyError::Forbidden(_)));

    let view = fixture
        .service
        .vault()
        .get_member_key(&fixture.household_id, bob.id())
        .await
        .unwrap();
    assert!(!view.has_key);
}

#[tokio::test]
async fn revocation_diverges_key_state_from_membership() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();

    let workflow = fixture.service.workflow();
    let vault = fixture.service.vault();

    vault
        .remove_member_key(&fixture.household_id, fixture.owner.id(), alice.id())
        .await
        .unwrap();

    // Still a member, no longer keyed.
    assert_eq!(
        workflow.key_access_state(&fixture.household_id, alice.id()).await.unwrap(),
        KeyAccessState::MemberNoKey
    );
    let view = vault.get_member_key(&fixture.household_id, alice.id()).await.unwrap();
    assert!(!view.has_key);
    assert_eq!(view.wrapped_key, None);
}

#[tokio::test]
async fn leaving_keeps_a_stale_entry_until_the_owner_revokes_it() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();

    fixture.leave(&alice).await;

    let workflow = fixture.service.workflow();
    let vault = fixture.service.vault();
    let household_id = &fixture.household_id;

    assert_eq!(
        workflow.key_access_state(household_id, alice.id()).await.unwrap(),
        KeyAccessState::FormerMemberKeyed
    );
    // The stale entry is still stored but alice can no longer read it.
    assert!(fixture.store.get_member_key(household_id, alice.id()).await.unwrap().is_some());
    assert!(matches!(
        vault.get_member_key(household_id, alice.id()).await,
        Err(KeyError::Forbidden(_))
    ));
    assert_eq!(
        workflow.stale_entries(household_id, fixture.owner.id()).await.unwrap(),
        vec![alice.id().clone()]
    );

    assert!(vault
        .remove_member_key(household_id, fixture.owner.id(), alice.id())
        .await
        .unwrap());
    assert_eq!(
        workflow.key_access_state(household_id, alice.id()).await.unwrap(),
        KeyAccessState::NotMember
    );
    assert!(workflow
        .stale_entries(household_id, fixture.owner.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn former_member_cannot_onboard_with_stale_entry() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    let bob = fixture.join("bob").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();
    fixture.leave(&alice).await;

    let err = fixture.onboard(&alice, &bob).await.unwrap_err();
    assert!(matches!(err, KeyError::Forbidden(_)));
}

#[tokio::test]
async fn rotation_replaces_the_whole_map() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    let bob = fixture.join("bob").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();
    fixture.onboard(&fixture.owner, &bob).await.unwrap();

    // Rotate to a new key for owner and bob only.
    let new_key = hearthkey_testkit::HouseholdKey::generate();
    let mut keys = hearthkey::core::WrappedKeyMap::new();
    for member in [&fixture.owner, &bob] {
        keys.insert(
            member.id().clone(),
            ClientKeys::wrap_for(&new_key, &member.keys.public_key()).unwrap(),
        );
    }
    fixture
        .service
        .vault()
        .set_all_keys(&fixture.household_id, fixture.owner.id(), keys)
        .await
        .unwrap();

    assert_eq!(fixture.unwrap_for(&bob).await.unwrap(), Some(new_key));
    assert_eq!(fixture.unwrap_for(&alice).await.unwrap(), None);
}

#[tokio::test]
async fn recovered_device_can_unwrap() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();

    // A new device only has the passphrase and what the server returns.
    let record = fixture.service.registry().get_own_keys(alice.id()).await.unwrap();
    let recovered = ClientKeys::recover(&record, TEST_PASSPHRASE).unwrap();
    let view = fixture
        .service
        .vault()
        .get_member_key(&fixture.household_id, alice.id())
        .await
        .unwrap();
    let wrapped = view.wrapped_key.unwrap();
    assert_eq!(recovered.unwrap_key(&wrapped).unwrap(), fixture.household_key);
}

#[tokio::test]
async fn deleting_the_household_destroys_the_vault() {
    let fixture = HouseholdFixture::new(WriteMode::Record).await;
    let alice = fixture.join("alice").await;
    fixture.onboard(&fixture.owner, &alice).await.unwrap();

    assert!(fixture.store.delete_household(&fixture.household_id).await.unwrap());
    assert!(fixture.store.list_member_keys(&fixture.household_id).await.unwrap().is_empty());
    assert!(matches!(
        fixture
            .service
            .vault()
            .get_member_key(&fixture.household_id, alice.id())
            .await,
        Err(KeyError::NotFound(_))
    ));
}

#[tokio::test]
async fn sqlite_backed_service_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hearthkey.db");
    let owner = Member::new("owner");
    let household_id = hearthkey_testkit::household("home");

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let service = Hearthkey::new(store.clone(), store.clone(), HearthkeyConfig::default());
        setup_member(&service, &owner).await;
        store
            .create_household(&hearthkey::core::Household::new(
                household_id.clone(),
                "Home",
                owner.id().clone(),
            ))
            .await
            .unwrap();

        let mut keys = hearthkey::core::WrappedKeyMap::new();
        keys.insert(owner.id().clone(), "wrapped-for-owner".into());
        service
            .vault()
            .set_all_keys(&household_id, owner.id(), keys)
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let service = Hearthkey::new(store.clone(), store, HearthkeyConfig::default());

    let view = service.vault().get_member_key(&household_id, owner.id()).await.unwrap();
    assert_eq!(view.wrapped_key.unwrap().as_str(), "wrapped-for-owner");
    assert!(matches!(
        service
            .registry()
            .setup_user_keys(owner.id(), owner.keys.key_setup(TEST_PASSPHRASE).unwrap())
            .await,
        Err(KeyError::AlreadySetUp(_))
    ));
}
