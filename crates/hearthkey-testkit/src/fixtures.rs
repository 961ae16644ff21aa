//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a household with an owner whose
//! keys are set up and who holds the first wrapped household key.

use std::sync::Arc;

use hearthkey::{Hearthkey, HearthkeyConfig, VaultConfig, WriteMode};
use hearthkey_core::{Caller, Household, HouseholdId, UserId, WrappedKeyMap};
use hearthkey_store::{KeyStore, MemoryStore, MembershipDirectory};

use crate::client::{ClientKeys, HouseholdKey};

/// Passphrase every fixture member encrypts their private key with.
pub const TEST_PASSPHRASE: &str = "correct horse battery staple";

/// Shorthand for a user id in tests.
pub fn user(name: &str) -> UserId {
    UserId::new(name).expect("valid test user id")
}

/// Shorthand for a household id in tests.
pub fn household(name: &str) -> HouseholdId {
    HouseholdId::new(name).expect("valid test household id")
}

/// A simulated user: identity plus the key pair on their device.
pub struct Member {
    pub caller: Caller,
    pub keys: ClientKeys,
}

impl Member {
    pub fn new(name: &str) -> Self {
        Self {
            caller: Caller::new(user(name), format!("{name}@example.com")),
            keys: ClientKeys::generate(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.caller.user_id
    }
}

/// A household whose owner has set up keys and wrapped the household key
/// for themself.
pub struct HouseholdFixture {
    pub store: Arc<MemoryStore>,
    pub service: Hearthkey,
    pub household_id: HouseholdId,
    pub owner: Member,
    pub household_key: HouseholdKey,
}

impl HouseholdFixture {
    /// A fixture over a fresh in-memory store.
    pub async fn new(write_mode: WriteMode) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(store.clone(), store.clone(), store, write_mode).await
    }

    /// A fixture whose service uses `keys` for key storage, for wrapping the
    /// backing store in a harness.
    pub async fn with_stores(
        store: Arc<MemoryStore>,
        keys: Arc<dyn KeyStore>,
        directory: Arc<dyn MembershipDirectory>,
        write_mode: WriteMode,
    ) -> Self {
        let config = HearthkeyConfig {
            vault: VaultConfig { write_mode },
        };
        let service = Hearthkey::new(keys, directory, config);
        let household_id = household("home");
        let owner = Member::new("owner");

        setup_member(&service, &owner).await;
        store
            .create_household(&Household::new(
                household_id.clone(),
                "Home",
                owner.id().clone(),
            ))
            .await
            .expect("create household");

        let household_key = HouseholdKey::generate();
        let mut keys = WrappedKeyMap::new();
        keys.insert(
            owner.id().clone(),
            ClientKeys::wrap_for(&household_key, &owner.keys.public_key())
                .expect("wrap for owner"),
        );
        service
            .vault()
            .set_all_keys(&household_id, owner.id(), keys)
            .await
            .expect("owner sets initial keys");

        Self {
            store,
            service,
            household_id,
            owner,
            household_key,
        }
    }

    /// A new user who registers, sets up keys and joins the household.
    ///
    /// Joining does not give them a wrapped key.
    pub async fn join(&self, name: &str) -> Member {
        let member = Member::new(name);
        setup_member(&self.service, &member).await;
        self.store
            .add_member(&self.household_id, member.id())
            .await
            .expect("add member");
        member
    }

    /// `by` fetches `newcomer`'s public key, wraps the household key for
    /// them and submits it.
    ///
    /// A `by` without a key of their own wraps a made-up key instead, which
    /// the vault must refuse.
    pub async fn onboard(&self, by: &Member, newcomer: &Member) -> hearthkey::Result<()> {
        let household_key = match self.unwrap_for(by).await {
            Ok(Some(key)) => key,
            Ok(None) | Err(_) => HouseholdKey::generate(),
        };
        let public_key = self
            .service
            .registry()
            .get_public_key(newcomer.id())
            .await?
            .public_key;
        let wrapped =
            ClientKeys::wrap_for(&household_key, &public_key).expect("wrap for newcomer");
        self.service
            .vault()
            .add_member_key(&self.household_id, by.id(), newcomer.id(), wrapped)
            .await
    }

    /// The member leaves through the directory. Their entry stays.
    pub async fn leave(&self, member: &Member) {
        self.store
            .remove_member(&self.household_id, member.id())
            .await
            .expect("remove member");
    }

    /// Fetch and unwrap the member's own copy of the household key.
    pub async fn unwrap_for(&self, member: &Member) -> hearthkey::Result<Option<HouseholdKey>> {
        let view = self
            .service
            .vault()
            .get_member_key(&self.household_id, member.id())
            .await?;
        Ok(view
            .wrapped_key
            .map(|wrapped| member.keys.unwrap_key(&wrapped).expect("unwrap own key")))
    }
}

/// Register `member` and set up their keys.
pub async fn setup_member(service: &Hearthkey, member: &Member) {
    service
        .registry()
        .register(&member.caller)
        .await
        .expect("register");
    let setup = member
        .keys
        .key_setup(TEST_PASSPHRASE)
        .expect("client key setup");
    service
        .registry()
        .setup_user_keys(member.id(), setup)
        .await
        .expect("setup user keys");
}
