use crate::error::Result;
use crate::types::{
    Bid, BidDecision, BidPatch, BidStatus, DirectoryFixture, NewBid, NewTender, Page, Review,
    ServiceType, Tender, TenderPatch, TenderStatus,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

use memory::MemoryStore;
use postgres::PgStore;

/// Storage backend configuration.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Keep all state in process memory only.
    Memory,
    /// Persist state in PostgreSQL.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Read-only relationship and existence predicates backing the
/// authorization pipeline. Purely query; no side effects.
#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    async fn employee_exists(&self, username: &str) -> Result<bool>;
    async fn employee_by_id_exists(&self, id: Uuid) -> Result<bool>;
    async fn tender_exists(&self, id: Uuid) -> Result<bool>;
    async fn bid_exists(&self, id: Uuid) -> Result<bool>;

    /// True iff the employee is linked to the organization through the
    /// responsibility table.
    async fn is_responsible_for_organization(&self, org_id: Uuid, username: &str) -> Result<bool>;
    /// True iff the employee is responsible for the organization that owns
    /// the tender.
    async fn is_responsible_for_tender(&self, tender_id: Uuid, username: &str) -> Result<bool>;
    /// True iff the employee is responsible for the organization that owns
    /// the bid's tender.
    async fn is_responsible_for_bid(&self, bid_id: Uuid, username: &str) -> Result<bool>;
    /// Same tender relationship, with the employee referenced by id
    /// (bid creation passes an author id, not a username).
    async fn is_responsible_for_tender_by_employee_id(
        &self,
        employee_id: Uuid,
        tender_id: Uuid,
    ) -> Result<bool>;
    /// True iff the bid's recorded author matches the username.
    async fn is_bid_author(&self, bid_id: Uuid, username: &str) -> Result<bool>;

    async fn tender_version_exists(&self, tender_id: Uuid, version: i32) -> Result<bool>;
    async fn bid_version_exists(&self, bid_id: Uuid, version: i32) -> Result<bool>;
}

/// Current/history storage for tenders, bids, and reviews.
///
/// Every mutation is a single atomic unit: the updated current row and the
/// history row for the superseded version take effect together or not at
/// all. Listings are ordered by name ascending and windowed by [`Page`].
#[async_trait]
pub trait EntityStorePort: Send + Sync {
    async fn get_tender(&self, id: Uuid) -> Result<Tender>;
    /// Publicly visible tenders only (status `Published`), optionally
    /// filtered by service type.
    async fn list_tenders(&self, service_types: &[ServiceType], page: Page) -> Result<Vec<Tender>>;
    /// Every tender created by the user, regardless of status.
    async fn list_user_tenders(&self, username: &str, page: Page) -> Result<Vec<Tender>>;
    async fn create_tender(&self, input: NewTender) -> Result<Tender>;
    async fn edit_tender(&self, id: Uuid, patch: TenderPatch) -> Result<Tender>;
    async fn update_tender_status(&self, id: Uuid, status: TenderStatus) -> Result<Tender>;
    async fn rollback_tender(&self, id: Uuid, version: i32) -> Result<Tender>;

    async fn get_bid(&self, id: Uuid) -> Result<Bid>;
    async fn list_user_bids(&self, username: &str, page: Page) -> Result<Vec<Bid>>;
    async fn list_bids_for_tender(&self, tender_id: Uuid, page: Page) -> Result<Vec<Bid>>;
    async fn create_bid(&self, input: NewBid) -> Result<Bid>;
    async fn edit_bid(&self, id: Uuid, patch: BidPatch) -> Result<Bid>;
    async fn update_bid_status(&self, id: Uuid, status: BidStatus) -> Result<Bid>;
    async fn submit_bid_decision(&self, id: Uuid, decision: BidDecision) -> Result<Bid>;
    /// Record feedback as a review row; the bid itself is returned
    /// unchanged (no version bump).
    async fn append_review(&self, bid_id: Uuid, reviewer: &str, description: &str) -> Result<Bid>;
    /// Reviews on bids authored by `bid_author` against `tender_id`.
    async fn list_reviews(
        &self,
        tender_id: Uuid,
        bid_author: &str,
        page: Page,
    ) -> Result<Vec<Review>>;
    async fn rollback_bid(&self, id: Uuid, version: i32) -> Result<Bid>;

    async fn seed_directory(&self, fixture: DirectoryFixture) -> Result<()>;
}

/// Shared handle over a concrete backend, passed into the orchestrators at
/// construction time.
#[derive(Clone)]
pub struct Store {
    authorization: Arc<dyn AuthorizationPort>,
    entities: Arc<dyn EntityStorePort>,
    backend: &'static str,
}

impl Store {
    pub async fn bootstrap(config: StoreConfig) -> Result<Self> {
        match config {
            StoreConfig::Memory => Ok(Self::memory()),
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PgStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                let store = Arc::new(store);
                Ok(Self {
                    authorization: store.clone(),
                    entities: store,
                    backend: "postgres",
                })
            }
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            authorization: store.clone(),
            entities: store,
            backend: "memory",
        }
    }

    pub fn authorization(&self) -> Arc<dyn AuthorizationPort> {
        self.authorization.clone()
    }

    pub fn entities(&self) -> Arc<dyn EntityStorePort> {
        self.entities.clone()
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend
    }

    pub async fn seed_directory(&self, fixture: DirectoryFixture) -> Result<()> {
        self.entities.seed_directory(fixture).await
    }
}
