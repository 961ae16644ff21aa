//! HTTP handlers for `/api/keys` and `/health`.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use hearthkey::{KeyAccessState, KeySetup, MemberKey, PublicKeyInfo};
use hearthkey_core::{
    EncryptedPrivateKey, HouseholdId, KeyStatus, PublicKey, Salt, UserId, UserKeyRecord,
    WrappedKey, WrappedKeyMap,
};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::identity::HeaderIdentity;
use crate::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

/// A user's own key material as returned to them.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserKeysResponse {
    pub public_key: PublicKey,
    pub encrypted_private_key: EncryptedPrivateKey,
    pub salt: Salt,
    pub version: u32,
    pub has_keys: bool,
}

impl From<UserKeyRecord> for UserKeysResponse {
    fn from(record: UserKeyRecord) -> Self {
        let has_keys = record.has_keys();
        Self {
            public_key: record.public_key,
            encrypted_private_key: record.encrypted_private_key,
            salt: record.salt,
            version: record.version,
            has_keys,
        }
    }
}

/// Bulk replacement of a household's vault.
#[derive(Debug, Deserialize)]
pub struct SetHouseholdKeysRequest {
    pub wrapped_keys: BTreeMap<String, WrappedKey>,
}

/// A single wrapped key for one member.
#[derive(Debug, Deserialize)]
pub struct AddMemberKeyRequest {
    pub user_id: String,
    pub wrapped_key: WrappedKey,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Members listed by a workflow report.
#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub household_id: HouseholdId,
    pub members: Vec<UserId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessStateResponse {
    pub household_id: HouseholdId,
    pub user_id: UserId,
    pub state: KeyAccessState,
}

// ============================================================================
// User Keys
// ============================================================================

pub async fn setup_user_keys(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    JsonBody(setup): JsonBody<KeySetup>,
) -> ApiResult<UserKeysResponse> {
    let record = state
        .service
        .registry()
        .setup_user_keys(identity.user_id(), setup)
        .await?;
    Ok(Json(record.into()))
}

pub async fn get_user_keys(
    State(state): State<AppState>,
    identity: HeaderIdentity,
) -> ApiResult<UserKeysResponse> {
    let record = state.service.registry().get_own_keys(identity.user_id()).await?;
    Ok(Json(record.into()))
}

pub async fn get_key_status(
    State(state): State<AppState>,
    identity: HeaderIdentity,
) -> ApiResult<KeyStatus> {
    let status = state.service.registry().get_key_status(identity.user_id()).await?;
    Ok(Json(status))
}

pub async fn get_public_key(
    State(state): State<AppState>,
    _identity: HeaderIdentity,
    Path(user_id): Path<String>,
) -> ApiResult<PublicKeyInfo> {
    let target = UserId::new(user_id)?;
    let info = state.service.registry().get_public_key(&target).await?;
    Ok(Json(info))
}

// ============================================================================
// Household Vault
// ============================================================================

pub async fn get_household_key(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
) -> ApiResult<MemberKey> {
    let household_id = HouseholdId::new(household_id)?;
    let view = state
        .service
        .vault()
        .get_member_key(&household_id, identity.user_id())
        .await?;
    Ok(Json(view))
}

pub async fn set_household_keys(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
    JsonBody(request): JsonBody<SetHouseholdKeysRequest>,
) -> ApiResult<MessageResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let keys = request
        .wrapped_keys
        .into_iter()
        .map(|(user_id, wrapped)| -> Result<_, ApiError> {
            Ok((UserId::new(user_id)?, wrapped))
        })
        .collect::<Result<WrappedKeyMap, _>>()?;

    state
        .service
        .vault()
        .set_all_keys(&household_id, identity.user_id(), keys)
        .await?;
    Ok(MessageResponse::new("Household keys updated successfully"))
}

pub async fn add_member_key(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
    JsonBody(request): JsonBody<AddMemberKeyRequest>,
) -> ApiResult<MessageResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let target = UserId::new(request.user_id)?;

    state
        .service
        .vault()
        .add_member_key(&household_id, identity.user_id(), &target, request.wrapped_key)
        .await?;
    Ok(MessageResponse::new("Member key added successfully"))
}

pub async fn remove_member_key(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path((household_id, member_id)): Path<(String, String)>,
) -> ApiResult<MessageResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let target = UserId::new(member_id)?;

    state
        .service
        .vault()
        .remove_member_key(&household_id, identity.user_id(), &target)
        .await?;
    Ok(MessageResponse::new("Member key removed successfully"))
}

// ============================================================================
// Workflow Reports
// ============================================================================

pub async fn get_access_state(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
) -> ApiResult<AccessStateResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let access = state
        .service
        .workflow()
        .key_access_state(&household_id, identity.user_id())
        .await?;
    Ok(Json(AccessStateResponse {
        household_id,
        user_id: identity.0.user_id,
        state: access,
    }))
}

pub async fn get_pending_members(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
) -> ApiResult<MembersResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let members = state
        .service
        .workflow()
        .pending_members(&household_id, identity.user_id())
        .await?;
    Ok(Json(MembersResponse {
        household_id,
        members,
    }))
}

pub async fn get_stale_entries(
    State(state): State<AppState>,
    identity: HeaderIdentity,
    Path(household_id): Path<String>,
) -> ApiResult<MembersResponse> {
    let household_id = HouseholdId::new(household_id)?;
    let members = state
        .service
        .workflow()
        .stale_entries(&household_id, identity.user_id())
        .await?;
    Ok(Json(MembersResponse {
        household_id,
        members,
    }))
}

// ============================================================================
// Health
// ============================================================================

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "hearthkey",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
