//! Bid operations. Same fixed check pipeline as tenders; the relationship
//! required in step three differs per operation: status, decision, and
//! feedback belong to the responsible parties of the tender's
//! organization, edit and rollback belong to the bid's author.

use crate::authz::Gate;
use crate::error::{Error, Result};
use crate::store::{EntityStorePort, Store};
use crate::types::{AuthorType, Bid, BidDecision, BidPatch, BidStatus, NewBid, Page, Review};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct BidOps {
    gate: Gate,
    store: Arc<dyn EntityStorePort>,
}

impl BidOps {
    pub fn new(store: &Store) -> Self {
        Self {
            gate: Gate::new(store.authorization()),
            store: store.entities(),
        }
    }

    /// Bids are authored on behalf of an organization; user-authored bids
    /// are rejected before any existence check runs.
    pub async fn create(&self, input: NewBid) -> Result<Bid> {
        if input.author_type != AuthorType::Organization {
            return Err(Error::validation(
                "bids may only be created on behalf of an organization",
            ));
        }

        self.gate.require_tender(input.tender_id).await?;
        self.gate.require_user_by_id(input.author_id).await?;
        self.gate
            .require_responsible_for_tender_by_employee_id(input.author_id, input.tender_id)
            .await?;
        self.store.create_bid(input).await
    }

    pub async fn list_user(&self, username: &str, page: Page) -> Result<Vec<Bid>> {
        self.gate.require_user(username).await?;
        self.store.list_user_bids(username, page).await
    }

    pub async fn list_for_tender(
        &self,
        tender_id: Uuid,
        username: &str,
        page: Page,
    ) -> Result<Vec<Bid>> {
        self.gate.require_tender(tender_id).await?;
        self.gate.require_user(username).await?;
        self.gate
            .require_responsible_for_tender(tender_id, username)
            .await?;
        self.store.list_bids_for_tender(tender_id, page).await
    }

    pub async fn status(&self, id: Uuid, username: &str) -> Result<BidStatus> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate
            .require_bid_author_or_responsible(id, username)
            .await?;
        Ok(self.store.get_bid(id).await?.status)
    }

    pub async fn update_status(&self, id: Uuid, status: BidStatus, username: &str) -> Result<Bid> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_bid(id, username).await?;
        self.store.update_bid_status(id, status).await
    }

    pub async fn edit(&self, id: Uuid, patch: BidPatch, username: &str) -> Result<Bid> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_bid_author(id, username).await?;
        self.store.edit_bid(id, patch).await
    }

    pub async fn submit_decision(
        &self,
        id: Uuid,
        decision: BidDecision,
        username: &str,
    ) -> Result<Bid> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_bid(id, username).await?;
        self.store.submit_bid_decision(id, decision).await
    }

    /// Feedback lands as a review row; the bid's version and status are
    /// untouched.
    pub async fn submit_feedback(&self, id: Uuid, feedback: &str, username: &str) -> Result<Bid> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_responsible_for_bid(id, username).await?;
        self.store.append_review(id, username, feedback).await
    }

    pub async fn reviews(
        &self,
        tender_id: Uuid,
        bid_author: &str,
        requester: &str,
        page: Page,
    ) -> Result<Vec<Review>> {
        self.gate.require_tender(tender_id).await?;
        self.gate.require_user(requester).await?;
        self.gate
            .require_responsible_for_tender(tender_id, requester)
            .await?;
        self.store.list_reviews(tender_id, bid_author, page).await
    }

    pub async fn rollback(&self, id: Uuid, version: i32, username: &str) -> Result<Bid> {
        self.gate.require_bid(id).await?;
        self.gate.require_user(username).await?;
        self.gate.require_bid_author(id, username).await?;
        self.gate.require_bid_version(id, version).await?;
        self.store.rollback_bid(id, version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DirectoryFixture, Employee, NewTender, Organization, ResponsibleLink, ServiceType,
    };

    struct Fixture {
        ops: BidOps,
        tender_id: Uuid,
        alice_id: Uuid,
    }

    /// alice is responsible for the tender's organization; mallory belongs
    /// to an unrelated organization.
    async fn fixture() -> Fixture {
        let store = Store::memory();
        let org_id = Uuid::new_v4();
        let other_org = Uuid::new_v4();
        let alice_id = Uuid::new_v4();
        let mallory_id = Uuid::new_v4();
        store
            .seed_directory(DirectoryFixture {
                organizations: vec![
                    Organization {
                        id: org_id,
                        name: "Roads Inc".to_string(),
                        description: String::new(),
                    },
                    Organization {
                        id: other_org,
                        name: "Bridges Ltd".to_string(),
                        description: String::new(),
                    },
                ],
                employees: vec![
                    Employee {
                        id: alice_id,
                        username: "alice".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                    },
                    Employee {
                        id: mallory_id,
                        username: "mallory".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                    },
                ],
                responsibles: vec![
                    ResponsibleLink {
                        organization_id: org_id,
                        employee_id: alice_id,
                    },
                    ResponsibleLink {
                        organization_id: other_org,
                        employee_id: mallory_id,
                    },
                ],
            })
            .await
            .unwrap();

        let tender = store
            .entities()
            .create_tender(NewTender {
                name: "T1".to_string(),
                description: "roadworks".to_string(),
                service_type: ServiceType::Construction,
                organization_id: org_id,
                creator_username: "alice".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            ops: BidOps::new(&store),
            tender_id: tender.id,
            alice_id,
        }
    }

    fn new_bid(tender_id: Uuid, author_id: Uuid) -> NewBid {
        NewBid {
            name: "B1".to_string(),
            description: "our offer".to_string(),
            tender_id,
            author_type: AuthorType::Organization,
            author_id,
        }
    }

    #[tokio::test]
    async fn user_authored_bids_are_rejected_at_creation() {
        let f = fixture().await;
        let mut input = new_bid(f.tender_id, f.alice_id);
        input.author_type = AuthorType::User;

        let err = f.ops.create(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn user_author_rejection_beats_missing_tender() {
        let f = fixture().await;
        let mut input = new_bid(Uuid::new_v4(), Uuid::new_v4());
        input.author_type = AuthorType::User;

        let err = f.ops.create(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn bid_create_requires_existing_tender() {
        let f = fixture().await;
        let err = f
            .ops
            .create(new_bid(Uuid::new_v4(), f.alice_id))
            .await
            .unwrap_err();
        assert_eq!(err, Error::entity_not_found());
    }

    #[tokio::test]
    async fn author_edits_and_rolls_back_own_bid() {
        let f = fixture().await;
        let bid = f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();
        assert_eq!(bid.version, 1);

        let edited = f
            .ops
            .edit(
                bid.id,
                BidPatch {
                    name: Some("B2".to_string()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(edited.name, "B2");

        let rolled = f.ops.rollback(bid.id, 1, "alice").await.unwrap();
        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.name, "B1");
    }

    #[tokio::test]
    async fn non_author_cannot_edit_or_roll_back() {
        let f = fixture().await;
        let bid = f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();

        let err = f
            .ops
            .edit(bid.id, BidPatch::default(), "mallory")
            .await
            .unwrap_err();
        assert_eq!(err, Error::insufficient_privileges());

        let err = f.ops.rollback(bid.id, 1, "mallory").await.unwrap_err();
        assert_eq!(err, Error::insufficient_privileges());
    }

    #[tokio::test]
    async fn decision_requires_tender_org_responsibility() {
        let f = fixture().await;
        let bid = f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();

        let err = f
            .ops
            .submit_decision(bid.id, BidDecision::Approved, "mallory")
            .await
            .unwrap_err();
        assert_eq!(err, Error::insufficient_privileges());

        let decided = f
            .ops
            .submit_decision(bid.id, BidDecision::Approved, "alice")
            .await
            .unwrap();
        assert_eq!(decided.decision, BidDecision::Approved);
        assert_eq!(decided.version, 2);
    }

    #[tokio::test]
    async fn feedback_leaves_bid_version_unchanged_and_is_listed() {
        let f = fixture().await;
        let bid = f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();

        let after = f
            .ops
            .submit_feedback(bid.id, "solid proposal", "alice")
            .await
            .unwrap();
        assert_eq!(after.version, bid.version);

        let reviews = f
            .ops
            .reviews(f.tender_id, "alice", "alice", Page::default())
            .await
            .unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].description, "solid proposal");
    }

    #[tokio::test]
    async fn unknown_bid_reports_not_found_before_unknown_user() {
        let f = fixture().await;
        let err = f
            .ops
            .update_status(Uuid::new_v4(), BidStatus::Published, "nobody")
            .await
            .unwrap_err();
        assert_eq!(err, Error::entity_not_found());
    }

    #[tokio::test]
    async fn bid_listing_for_tender_is_responsible_only() {
        let f = fixture().await;
        f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();

        let listed = f
            .ops
            .list_for_tender(f.tender_id, "alice", Page::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let err = f
            .ops
            .list_for_tender(f.tender_id, "mallory", Page::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::insufficient_privileges());
    }

    #[tokio::test]
    async fn own_bids_listing_spans_all_statuses() {
        let f = fixture().await;
        let bid = f.ops.create(new_bid(f.tender_id, f.alice_id)).await.unwrap();
        f.ops
            .update_status(bid.id, BidStatus::Canceled, "alice")
            .await
            .unwrap();

        let mine = f.ops.list_user("alice", Page::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, BidStatus::Canceled);
    }
}
