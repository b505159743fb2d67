//! Sharing & access authorization engine.
//!
//! Decides, for a given (item, user) pair, whether the user may read or
//! mutate the item, builds the `sharingInfo` projection returned alongside
//! item data, and manages invitation responses (confirm/decline) on
//! appointment shares. The engine owns no global state: it is constructed
//! with the store handle it operates on.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::models::{ItemKind, ShareWithRecipient};
use crate::db::repository::SharedItemRepository;
use crate::error::{AppError, AppResult};

// ============================================================================
// Invitation response state
// ============================================================================

/// A recipient's answer to an appointment invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareResponse {
    Confirmed,
    Declined,
}

/// The tri-state invitation status of a share record. Stored as two nullable
/// boolean columns for interface compatibility; modeled as a single enum here
/// so mutual exclusivity of confirmed/declined is structural rather than a
/// runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Pending,
    Confirmed,
    Declined,
}

impl ResponseState {
    /// Interpret the stored two-flag shape. NULL flags mean no response yet.
    pub fn from_flags(confirmed: Option<bool>, declined: Option<bool>) -> Self {
        match (confirmed, declined) {
            (Some(true), _) => ResponseState::Confirmed,
            (_, Some(true)) => ResponseState::Declined,
            _ => ResponseState::Pending,
        }
    }

    /// The two-flag shape written back to the store and to API responses.
    pub fn flags(&self) -> (Option<bool>, Option<bool>) {
        match self {
            ResponseState::Pending => (None, None),
            ResponseState::Confirmed => (Some(true), Some(false)),
            ResponseState::Declined => (Some(false), Some(true)),
        }
    }
}

impl From<ShareResponse> for ResponseState {
    fn from(r: ShareResponse) -> Self {
        match r {
            ShareResponse::Confirmed => ResponseState::Confirmed,
            ShareResponse::Declined => ResponseState::Declined,
        }
    }
}

// ============================================================================
// Visibility projection ("sharingInfo")
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SharedBy {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareRecipient {
    pub id: String,
    pub username: String,
    /// Tri-state: Some(true)/Some(false)/None. None means "no response yet"
    /// and is serialized as null, never coerced to false.
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyShareInfo {
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
}

/// Derived, non-persisted summary of an item's sharing state, computed at
/// fetch time from its share records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingInfo {
    pub is_shared: bool,
    pub shared_by: SharedBy,
    pub recipients: Vec<ShareRecipient>,
    /// The requester's own response state, present only when the requester is
    /// a recipient. Owners are never recipients of their own items, so an
    /// owner's fetch always carries null here.
    pub my_share_info: Option<MyShareInfo>,
}

/// Build the visibility projection for one item fetch. Pure function: the
/// share rows have already been loaded, nothing is written.
pub fn build_sharing_info(
    owner: SharedBy,
    shares: &[ShareWithRecipient],
    requester_id: &str,
) -> SharingInfo {
    let recipients: Vec<ShareRecipient> = shares
        .iter()
        .map(|s| ShareRecipient {
            id: s.shared_with.clone(),
            username: s.recipient_username.clone(),
            confirmed: s.confirmed,
            declined: s.declined,
        })
        .collect();

    let my_share_info = shares
        .iter()
        .find(|s| s.shared_with == requester_id)
        .map(|s| MyShareInfo {
            confirmed: s.confirmed,
            declined: s.declined,
        });

    SharingInfo {
        is_shared: !recipients.is_empty(),
        shared_by: owner,
        recipients,
        my_share_info,
    }
}

// ============================================================================
// Access decisions
// ============================================================================

/// Outcome of a visibility check for an (item, requester) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub is_owner: bool,
    pub is_recipient: bool,
}

impl AccessDecision {
    const DENIED: AccessDecision = AccessDecision {
        allowed: false,
        is_owner: false,
        is_recipient: false,
    };
}

/// The authorization engine. Holds the store handle it was constructed with;
/// handlers keep a single instance in the shared application state.
#[derive(Debug, Clone)]
pub struct SharingEngine {
    pool: SqlitePool,
}

impl SharingEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether `requester_id` may read the item. Fails closed: an item with
    /// no matching owner row yields a denial, not an error. Ownership or a
    /// share record are the only relations that grant visibility; there is no
    /// transitive sharing.
    pub async fn can_view(
        &self,
        item_type: ItemKind,
        item_id: &str,
        requester_id: &str,
    ) -> AppResult<AccessDecision> {
        let Some(owner_id) = SharedItemRepository::owner_of(&self.pool, item_type, item_id).await?
        else {
            return Ok(AccessDecision::DENIED);
        };

        let is_owner = owner_id == requester_id;
        let is_recipient = SharedItemRepository::find_by_item_and_recipient(
            &self.pool, item_type, item_id, requester_id,
        )
        .await?
        .is_some();

        Ok(AccessDecision {
            allowed: is_owner || is_recipient,
            is_owner,
            is_recipient,
        })
    }

    /// Whether `requester_id` may update, delete or share the item. Only the
    /// owner may; recipients never gain mutate rights over the item itself
    /// (their own share record's response flags are the one thing they may
    /// change, via `respond_to_share`).
    pub async fn can_mutate(
        &self,
        item_type: ItemKind,
        item_id: &str,
        requester_id: &str,
    ) -> AppResult<bool> {
        let owner = SharedItemRepository::owner_of(&self.pool, item_type, item_id).await?;
        Ok(owner.as_deref() == Some(requester_id))
    }

    /// Share an item with a recipient. The caller must be the owner; sharing
    /// with oneself is rejected; a duplicate (item, recipient) pair is a
    /// Conflict, guaranteed by the store's uniqueness constraint even when
    /// two calls race past the pre-check.
    pub async fn create_share(
        &self,
        item_type: ItemKind,
        item_id: &str,
        owner_id: &str,
        recipient_id: &str,
    ) -> AppResult<String> {
        if recipient_id == owner_id {
            return Err(AppError::BadRequest(
                "You cannot share an item with yourself".to_string(),
            ));
        }

        if !self.can_mutate(item_type, item_id, owner_id).await? {
            return Err(AppError::Forbidden);
        }

        // Pre-check gives the common duplicate case a clean Conflict without
        // burning the insert; the unique constraint catches the racing rest.
        let existing = SharedItemRepository::find_by_item_and_recipient(
            &self.pool, item_type, item_id, recipient_id,
        )
        .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "This {item_type} is already shared with that user"
            )));
        }

        let share = SharedItemRepository::create(
            &self.pool, item_type, item_id, owner_id, recipient_id,
        )
        .await?;

        tracing::info!(
            "User {} shared {} {} with {}",
            owner_id,
            item_type,
            item_id,
            recipient_id
        );

        Ok(share.id)
    }

    /// Load the share records for an item and build its visibility
    /// projection for `requester_id`.
    pub async fn sharing_info(
        &self,
        item_type: ItemKind,
        item_id: &str,
        owner: SharedBy,
        requester_id: &str,
    ) -> AppResult<SharingInfo> {
        let shares = SharedItemRepository::list_for_item(&self.pool, item_type, item_id).await?;
        Ok(build_sharing_info(owner, &shares, requester_id))
    }

    /// Record a recipient's confirm/decline answer on an appointment share.
    /// Last write wins; a confirmed recipient may decline later and vice
    /// versa. NotFound when no share record exists for this caller.
    pub async fn respond_to_share(
        &self,
        item_id: &str,
        recipient_id: &str,
        response: ShareResponse,
    ) -> AppResult<()> {
        let (confirmed, declined) = ResponseState::from(response).flags();

        let updated = SharedItemRepository::set_response(
            &self.pool,
            ItemKind::Appointment,
            item_id,
            recipient_id,
            confirmed,
            declined,
        )
        .await?;

        if !updated {
            return Err(AppError::NotFound(
                "No share record found for this appointment and user".to_string(),
            ));
        }

        tracing::debug!(
            "User {} responded {:?} to appointment {}",
            recipient_id,
            response,
            item_id
        );

        Ok(())
    }
}
