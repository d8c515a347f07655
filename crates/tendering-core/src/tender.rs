//! Tender operations: existence and privilege checks in fixed order, then
//! delegation to the entity store.

use crate::authz::Gate;
use crate::error::Result;
use crate::store::{EntityStorePort, Store};
use crate::types::{NewTender, Page, ServiceType, Tender, TenderPatch, TenderStatus};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct TenderOps {
    gate: Gate,
    store: Arc<dyn EntityStorePort>,
}

impl TenderOps {
    pub fn new(store: &Store) -> Self {
        Self {
            gate: Gate::new(store.authorization()),
            store: store.entities(),
        }
    }

    pub async fn create(&self, input: NewTender) -> Result<Tender> {
        self.gate.require_user(&input.creator_username).await?;
        self.gate
            .require_responsible_for_organization(input.organization_id, &input.creator_username)
            .await?;
        self.store.create_tender(input).await
    }

    /// Public listing; only published tenders are visible.
    pub async fn list(&self, service_types: &[ServiceType], page: Page) -> Result<Vec<Tender>> {
        self.store.list_tenders(service_types, page).await
    }

    pub async fn list_user(&self, username: &str, page: Page) -> Result<Vec<Tender>> {
        self.gate.require_user(username).await?;
        self.store.list_user_tenders(username, page).await
    }

    pub async fn status(&self, id: Uuid, username: &str) -> Result<TenderStatus> {
        self.gate.require_tender(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_tender(id, username).await?;
        Ok(self.store.get_tender(id).await?.status)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: TenderStatus,
        username: &str,
    ) -> Result<Tender> {
        self.gate.require_tender(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_tender(id, username).await?;
        self.store.update_tender_status(id, status).await
    }

    pub async fn edit(&self, id: Uuid, patch: TenderPatch, username: &str) -> Result<Tender> {
        self.gate.require_tender(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_tender(id, username).await?;
        self.store.edit_tender(id, patch).await
    }

    pub async fn rollback(&self, id: Uuid, version: i32, username: &str) -> Result<Tender> {
        self.gate.require_tender(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_tender(id, username).await?;
        self.gate.require_tender_version(id, version).await?;
        self.store.rollback_tender(id, version).await
    }
}
