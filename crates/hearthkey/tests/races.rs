//! Concurrent vault writes.
//!
//! In snapshot mode two writes that start from the same map race: the later
//! whole-map write wins and the other write is lost, whether it was an add
//! or the owner's bulk set. In record mode each entry is written on its own
//! and racing adds both survive, but a bulk set still replaces whatever was
//! added before it commits. Either way nothing that survives is ever
//! corrupted.

use std::sync::Arc;

use hearthkey::core::{WrappedKey, WrappedKeyMap};
use hearthkey::store::{KeyStore, MemoryStore};
use hearthkey::{KeyError, WriteMode};
use hearthkey_testkit::{ClientKeys, GatedStore, HouseholdFixture, HouseholdKey, Member};

/// A household with a keyed owner, a keyed member `carol`, and two members
/// `alice` and `bob` still waiting for a key.
struct RaceSetup {
    fixture: HouseholdFixture,
    gated: Arc<GatedStore<MemoryStore>>,
    alice: Member,
    bob: Member,
    carol: Member,
}

async fn race_setup(mode: WriteMode) -> RaceSetup {
    let store = Arc::new(MemoryStore::new());
    let gated = Arc::new(GatedStore::new(store.clone()));
    let fixture = HouseholdFixture::with_stores(store.clone(), gated.clone(), store, mode).await;
    let alice = fixture.join("alice").await;
    let bob = fixture.join("bob").await;
    let carol = fixture.join("carol").await;
    fixture.onboard(&fixture.owner, &carol).await.unwrap();
    RaceSetup {
        fixture,
        gated,
        alice,
        bob,
        carol,
    }
}

fn wrap_for(fixture: &HouseholdFixture, member: &Member) -> WrappedKey {
    ClientKeys::wrap_for(&fixture.household_key, &member.keys.public_key()).unwrap()
}

/// The owner's rotation to `key` for exactly `holders`.
fn rotation(key: &HouseholdKey, holders: &[&Member]) -> WrappedKeyMap {
    holders
        .iter()
        .map(|holder| {
            let wrapped = ClientKeys::wrap_for(key, &holder.keys.public_key()).unwrap();
            (holder.id().clone(), wrapped)
        })
        .collect()
}

async fn add(
    fixture: &HouseholdFixture,
    target: &Member,
    wrapped: WrappedKey,
) -> Result<(), KeyError> {
    add_by(fixture, &fixture.owner, target, wrapped).await
}

async fn add_by(
    fixture: &HouseholdFixture,
    by: &Member,
    target: &Member,
    wrapped: WrappedKey,
) -> Result<(), KeyError> {
    fixture
        .service
        .vault()
        .add_member_key(&fixture.household_id, by.id(), target.id(), wrapped)
        .await
}

async fn bulk_set(fixture: &HouseholdFixture, keys: WrappedKeyMap) -> Result<(), KeyError> {
    fixture
        .service
        .vault()
        .set_all_keys(&fixture.household_id, fixture.owner.id(), keys)
        .await
}

async fn vault(fixture: &HouseholdFixture) -> WrappedKeyMap {
    fixture.store.list_member_keys(&fixture.household_id).await.unwrap()
}

#[tokio::test]
async fn snapshot_mode_loses_one_of_two_racing_adds() {
    let RaceSetup {
        fixture,
        gated,
        alice,
        bob,
        carol,
    } = race_setup(WriteMode::Snapshot).await;

    let for_alice = wrap_for(&fixture, &alice);
    let for_bob = wrap_for(&fixture, &bob);

    // The owner onboards alice while carol onboards bob.
    gated.arm(2);
    let (a, b) = tokio::join!(
        add(&fixture, &alice, for_alice.clone()),
        add_by(&fixture, &carol, &bob, for_bob.clone())
    );
    a.unwrap();
    b.unwrap();

    let final_map = vault(&fixture).await;
    let writes = gated.replaced_maps();
    let last = writes.last().unwrap();

    // The store holds exactly the last whole-map write.
    assert_eq!(&final_map, last);
    assert_eq!(final_map.len(), 3);

    let alice_kept = final_map.get(alice.id()) == Some(&for_alice);
    let bob_kept = final_map.get(bob.id()) == Some(&for_bob);
    assert!(alice_kept ^ bob_kept, "exactly one addition survives");

    // Every surviving entry is still usable by its holder.
    let survivor = if alice_kept { &alice } else { &bob };
    for holder in [&fixture.owner, &carol, survivor] {
        assert_eq!(
            holder.keys.unwrap_key(&final_map[holder.id()]).unwrap(),
            fixture.household_key,
            "{}",
            holder.id()
        );
    }
}

#[tokio::test]
async fn snapshot_mode_keeps_serialized_adds() {
    let RaceSetup {
        fixture,
        alice,
        bob,
        carol,
        ..
    } = race_setup(WriteMode::Snapshot).await;

    add(&fixture, &alice, wrap_for(&fixture, &alice)).await.unwrap();
    add_by(&fixture, &carol, &bob, wrap_for(&fixture, &bob)).await.unwrap();

    assert_eq!(vault(&fixture).await.len(), 4);
}

#[tokio::test]
async fn snapshot_mode_add_undoes_a_bulk_set_committed_after_its_read() {
    let RaceSetup {
        fixture,
        gated,
        alice,
        carol,
        ..
    } = race_setup(WriteMode::Snapshot).await;

    let for_alice = wrap_for(&fixture, &alice);
    let before = vault(&fixture).await;
    let rotated = HouseholdKey::generate();
    let rotated_map = rotation(&rotated, &[&fixture.owner, &carol]);

    // Carol's add reads the vault, the owner's rotation commits, then the
    // add writes back the map it read plus alice.
    let hold = gated.hold_next_read();
    let rotate = async {
        let mut hold = hold;
        hold.snapshot_taken().await;
        let result = bulk_set(&fixture, rotated_map.clone()).await;
        hold.release();
        result
    };
    let (added, rotated_result) =
        tokio::join!(add_by(&fixture, &carol, &alice, for_alice.clone()), rotate);
    added.unwrap();
    rotated_result.unwrap();

    let writes = gated.replaced_maps();
    assert_eq!(writes[writes.len() - 2], rotated_map, "the rotation did commit");

    let final_map = vault(&fixture).await;
    assert_eq!(&final_map, writes.last().unwrap());

    // The rotation is gone: the store is the pre-rotation map plus alice.
    let mut expected = before;
    expected.insert(alice.id().clone(), for_alice);
    assert_eq!(final_map, expected);

    // Nobody holds the rotated key, and every entry opens to the old one.
    for holder in [&fixture.owner, &carol, &alice] {
        let key = holder.keys.unwrap_key(&final_map[holder.id()]).unwrap();
        assert_eq!(key, fixture.household_key, "{}", holder.id());
        assert_ne!(key, rotated);
    }
}

#[tokio::test]
async fn record_mode_keeps_both_racing_adds() {
    let RaceSetup {
        fixture,
        gated,
        alice,
        bob,
        carol,
    } = race_setup(WriteMode::Record).await;

    let for_alice = wrap_for(&fixture, &alice);
    let for_bob = wrap_for(&fixture, &bob);

    // Record mode never reads the whole map on the add path, so nothing
    // waits at the gate.
    let (a, b) = tokio::join!(
        add(&fixture, &alice, for_alice.clone()),
        add_by(&fixture, &carol, &bob, for_bob.clone())
    );
    a.unwrap();
    b.unwrap();

    let final_map = vault(&fixture).await;
    assert_eq!(final_map.len(), 4);
    assert_eq!(final_map.get(alice.id()), Some(&for_alice));
    assert_eq!(final_map.get(bob.id()), Some(&for_bob));
    assert_eq!(gated.replaced_maps().len(), 1, "only the owner's initial bulk set");
}

#[tokio::test]
async fn record_mode_bulk_set_drops_an_add_it_did_not_include() {
    let RaceSetup {
        fixture,
        alice,
        carol,
        ..
    } = race_setup(WriteMode::Record).await;

    // The owner builds the rotation before carol onboards alice, and commits
    // it after.
    let rotated = HouseholdKey::generate();
    let rotated_map = rotation(&rotated, &[&fixture.owner, &carol]);

    add_by(&fixture, &carol, &alice, wrap_for(&fixture, &alice)).await.unwrap();
    assert!(vault(&fixture).await.contains_key(alice.id()));

    bulk_set(&fixture, rotated_map.clone()).await.unwrap();

    assert_eq!(vault(&fixture).await, rotated_map);
    assert_eq!(fixture.unwrap_for(&alice).await.unwrap(), None);
    for holder in [&fixture.owner, &carol] {
        assert_eq!(fixture.unwrap_for(holder).await.unwrap(), Some(rotated.clone()));
    }

    // Alice is back to waiting for a key.
    let pending = fixture
        .service
        .workflow()
        .pending_members(&fixture.household_id, fixture.owner.id())
        .await
        .unwrap();
    assert!(pending.contains(alice.id()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn record_mode_survives_many_concurrent_adds() {
    let fixture = Arc::new(HouseholdFixture::new(WriteMode::Record).await);

    let mut members = Vec::new();
    for i in 0..8 {
        members.push(Arc::new(fixture.join(&format!("member-{i}")).await));
    }

    let mut handles = Vec::new();
    for member in &members {
        let fixture = fixture.clone();
        let member = member.clone();
        handles.push(tokio::spawn(async move {
            let wrapped = wrap_for(&fixture, &member);
            add(&fixture, &member, wrapped).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for member in &members {
        assert_eq!(
            fixture.unwrap_for(member).await.unwrap().as_ref(),
            Some(&fixture.household_key)
        );
    }
}
