// src/notify/recipients.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{OrgMember, Role};
use crate::store::{StoreError, UserDirectory};

/// Resolves which organization members are eligible to receive a
/// notification. One directory read per dispatch, no write side effects.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn UserDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Active members of the organization, optionally restricted to a role
    /// set, with `exclude` (usually the triggering actor) filtered out.
    pub async fn organization_members(
        &self,
        organization_id: Uuid,
        roles: Option<&[Role]>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<OrgMember>, StoreError> {
        let mut members = self.directory.active_members(organization_id, roles).await?;
        if let Some(skip) = exclude {
            members.retain(|m| m.user_id != skip);
        }
        Ok(members)
    }
}
