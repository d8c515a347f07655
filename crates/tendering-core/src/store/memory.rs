//! In-memory store backend.
//!
//! All state lives in `HashMap`s behind a single `tokio::sync::RwLock`, so
//! every mutation runs as one write-lock critical section: the current-row
//! update and the history append take effect together. Not durable; used
//! for local development and tests, and as the fallback when no database
//! is configured.

use crate::error::{Error, Result};
use crate::store::{AuthorizationPort, EntityStorePort};
use crate::types::{
    Bid, BidDecision, BidPatch, BidSnapshot, BidStatus, DirectoryFixture, NewBid, NewTender, Page,
    Review, ServiceType, Tender, TenderPatch, TenderSnapshot, TenderStatus,
};
use crate::version::{self, FIRST_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    organizations: HashMap<Uuid, crate::types::Organization>,
    employees: HashMap<Uuid, crate::types::Employee>,
    responsibles: HashSet<(Uuid, Uuid)>,
    tenders: HashMap<Uuid, Tender>,
    tender_history: HashMap<Uuid, Vec<TenderSnapshot>>,
    bids: HashMap<Uuid, Bid>,
    bid_history: HashMap<Uuid, Vec<BidSnapshot>>,
    reviews: Vec<Review>,
}

impl State {
    fn employee_id_by_username(&self, username: &str) -> Option<Uuid> {
        self.employees
            .values()
            .find(|e| e.username == username)
            .map(|e| e.id)
    }

    fn is_responsible(&self, org_id: Uuid, username: &str) -> bool {
        self.employee_id_by_username(username)
            .map(|employee_id| self.responsibles.contains(&(org_id, employee_id)))
            .unwrap_or(false)
    }
}

pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// History versions recorded for a tender, in append order. Test hook
    /// for the contiguity invariant; not part of the store port.
    pub async fn tender_history_versions(&self, id: Uuid) -> Vec<i32> {
        let state = self.state.read().await;
        state
            .tender_history
            .get(&id)
            .map(|rows| rows.iter().map(|s| s.version).collect())
            .unwrap_or_default()
    }

    pub async fn bid_history_versions(&self, id: Uuid) -> Vec<i32> {
        let state = self.state.read().await;
        state
            .bid_history
            .get(&id)
            .map(|rows| rows.iter().map(|s| s.version).collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Name-ascending order with the id as tiebreaker, so identical
/// filter/offset/limit inputs always produce the same sequence.
fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> (String, Uuid)) {
    items.sort_by_key(name);
}

#[async_trait]
impl AuthorizationPort for MemoryStore {
    async fn employee_exists(&self, username: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.employee_id_by_username(username).is_some())
    }

    async fn employee_by_id_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.employees.contains_key(&id))
    }

    async fn tender_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.tenders.contains_key(&id))
    }

    async fn bid_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.bids.contains_key(&id))
    }

    async fn is_responsible_for_organization(&self, org_id: Uuid, username: &str) -> Result<bool> {
        Ok(self.state.read().await.is_responsible(org_id, username))
    }

    async fn is_responsible_for_tender(&self, tender_id: Uuid, username: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .tenders
            .get(&tender_id)
            .map(|t| state.is_responsible(t.organization_id, username))
            .unwrap_or(false))
    }

    async fn is_responsible_for_bid(&self, bid_id: Uuid, username: &str) -> Result<bool> {
        let state = self.state.read().await;
        let Some(bid) = state.bids.get(&bid_id) else {
            return Ok(false);
        };
        Ok(state
            .tenders
            .get(&bid.tender_id)
            .map(|t| state.is_responsible(t.organization_id, username))
            .unwrap_or(false))
    }

    async fn is_responsible_for_tender_by_employee_id(
        &self,
        employee_id: Uuid,
        tender_id: Uuid,
    ) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .tenders
            .get(&tender_id)
            .map(|t| state.responsibles.contains(&(t.organization_id, employee_id)))
            .unwrap_or(false))
    }

    async fn is_bid_author(&self, bid_id: Uuid, username: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .bids
            .get(&bid_id)
            .map(|b| b.author_username == username)
            .unwrap_or(false))
    }

    async fn tender_version_exists(&self, tender_id: Uuid, version: i32) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .tender_history
            .get(&tender_id)
            .map(|rows| rows.iter().any(|s| s.version == version))
            .unwrap_or(false))
    }

    async fn bid_version_exists(&self, bid_id: Uuid, version: i32) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .bid_history
            .get(&bid_id)
            .map(|rows| rows.iter().any(|s| s.version == version))
            .unwrap_or(false))
    }
}

#[async_trait]
impl EntityStorePort for MemoryStore {
    async fn get_tender(&self, id: Uuid) -> Result<Tender> {
        let state = self.state.read().await;
        state
            .tenders
            .get(&id)
            .cloned()
            .ok_or_else(Error::entity_not_found)
    }

    async fn list_tenders(&self, service_types: &[ServiceType], page: Page) -> Result<Vec<Tender>> {
        let state = self.state.read().await;
        let mut items: Vec<Tender> = state
            .tenders
            .values()
            .filter(|t| t.status == TenderStatus::Published)
            .filter(|t| service_types.is_empty() || service_types.contains(&t.service_type))
            .cloned()
            .collect();
        sort_by_name(&mut items, |t| (t.name.clone(), t.id));
        Ok(page.apply(items))
    }

    async fn list_user_tenders(&self, username: &str, page: Page) -> Result<Vec<Tender>> {
        let state = self.state.read().await;
        let mut items: Vec<Tender> = state
            .tenders
            .values()
            .filter(|t| t.creator_username == username)
            .cloned()
            .collect();
        sort_by_name(&mut items, |t| (t.name.clone(), t.id));
        Ok(page.apply(items))
    }

    async fn create_tender(&self, input: NewTender) -> Result<Tender> {
        let now = Utc::now();
        let tender = Tender {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            service_type: input.service_type,
            status: TenderStatus::Created,
            version: FIRST_VERSION,
            organization_id: input.organization_id,
            creator_username: input.creator_username,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.tenders.insert(tender.id, tender.clone());
        Ok(tender)
    }

    async fn edit_tender(&self, id: Uuid, patch: TenderPatch) -> Result<Tender> {
        let mut state = self.state.write().await;
        let tender = state.tenders.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(tender, |t| patch.apply(t));
        let updated = tender.clone();
        state
            .tender_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn update_tender_status(&self, id: Uuid, status: TenderStatus) -> Result<Tender> {
        let mut state = self.state.write().await;
        let tender = state.tenders.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(tender, |t| t.status = status);
        let updated = tender.clone();
        state
            .tender_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn rollback_tender(&self, id: Uuid, target: i32) -> Result<Tender> {
        let mut state = self.state.write().await;
        let snapshot = state
            .tender_history
            .get(&id)
            .and_then(|rows| rows.iter().find(|s| s.version == target))
            .cloned()
            .ok_or_else(Error::version_not_found)?;

        let tender = state.tenders.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(tender, |t| snapshot.restore(t));
        let updated = tender.clone();
        state
            .tender_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn get_bid(&self, id: Uuid) -> Result<Bid> {
        let state = self.state.read().await;
        state
            .bids
            .get(&id)
            .cloned()
            .ok_or_else(Error::entity_not_found)
    }

    async fn list_user_bids(&self, username: &str, page: Page) -> Result<Vec<Bid>> {
        let state = self.state.read().await;
        let mut items: Vec<Bid> = state
            .bids
            .values()
            .filter(|b| b.author_username == username)
            .cloned()
            .collect();
        sort_by_name(&mut items, |b| (b.name.clone(), b.id));
        Ok(page.apply(items))
    }

    async fn list_bids_for_tender(&self, tender_id: Uuid, page: Page) -> Result<Vec<Bid>> {
        let state = self.state.read().await;
        let mut items: Vec<Bid> = state
            .bids
            .values()
            .filter(|b| b.tender_id == tender_id)
            .cloned()
            .collect();
        sort_by_name(&mut items, |b| (b.name.clone(), b.id));
        Ok(page.apply(items))
    }

    async fn create_bid(&self, input: NewBid) -> Result<Bid> {
        let mut state = self.state.write().await;
        let author_username = state
            .employees
            .get(&input.author_id)
            .map(|e| e.username.clone())
            .ok_or_else(Error::unknown_user)?;

        let now = Utc::now();
        let bid = Bid {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            feedback: None,
            status: BidStatus::Created,
            tender_id: input.tender_id,
            organization_id: None,
            decision: BidDecision::None,
            author_id: input.author_id,
            author_username,
            author_type: input.author_type,
            version: FIRST_VERSION,
            created_at: now,
            updated_at: now,
        };

        state.bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    async fn edit_bid(&self, id: Uuid, patch: BidPatch) -> Result<Bid> {
        let mut state = self.state.write().await;
        let bid = state.bids.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(bid, |b| patch.apply(b));
        let updated = bid.clone();
        state
            .bid_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn update_bid_status(&self, id: Uuid, status: BidStatus) -> Result<Bid> {
        let mut state = self.state.write().await;
        let bid = state.bids.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(bid, |b| b.status = status);
        let updated = bid.clone();
        state
            .bid_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn submit_bid_decision(&self, id: Uuid, decision: BidDecision) -> Result<Bid> {
        let mut state = self.state.write().await;
        let bid = state.bids.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(bid, |b| b.decision = decision);
        let updated = bid.clone();
        state
            .bid_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn append_review(&self, bid_id: Uuid, reviewer: &str, description: &str) -> Result<Bid> {
        let mut state = self.state.write().await;
        let bid = state
            .bids
            .get(&bid_id)
            .cloned()
            .ok_or_else(Error::entity_not_found)?;

        state.reviews.push(Review {
            id: Uuid::new_v4(),
            bid_id,
            author_username: reviewer.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(bid)
    }

    async fn list_reviews(
        &self,
        tender_id: Uuid,
        bid_author: &str,
        page: Page,
    ) -> Result<Vec<Review>> {
        let state = self.state.read().await;
        let mut items: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| {
                state
                    .bids
                    .get(&r.bid_id)
                    .map(|b| b.tender_id == tender_id && b.author_username == bid_author)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        items.sort_by_key(|r| (r.created_at, r.id));
        Ok(page.apply(items))
    }

    async fn rollback_bid(&self, id: Uuid, target: i32) -> Result<Bid> {
        let mut state = self.state.write().await;
        let snapshot = state
            .bid_history
            .get(&id)
            .and_then(|rows| rows.iter().find(|s| s.version == target))
            .cloned()
            .ok_or_else(Error::version_not_found)?;

        let bid = state.bids.get_mut(&id).ok_or_else(Error::entity_not_found)?;
        let superseded = version::advance(bid, |b| snapshot.restore(b));
        let updated = bid.clone();
        state
            .bid_history
            .entry(id)
            .or_default()
            .push(superseded.to_snapshot());
        Ok(updated)
    }

    async fn seed_directory(&self, fixture: DirectoryFixture) -> Result<()> {
        let mut state = self.state.write().await;
        for org in fixture.organizations {
            state.organizations.insert(org.id, org);
        }
        for employee in fixture.employees {
            state.employees.insert(employee.id, employee);
        }
        for link in fixture.responsibles {
            state
                .responsibles
                .insert((link.organization_id, link.employee_id));
        }
        Ok(())
    }
}
