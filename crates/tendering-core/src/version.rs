//! Version engine shared by every store backend.
//!
//! All mutating writes follow the same shape: snapshot the current row at
//! its current version, apply the change, bump the counter by exactly one.
//! Rollback re-applies a snapshot's full content through that same path, so
//! the counter never rewinds and the history set for an entity is always
//! the contiguous range `1..current`.

use crate::types::{
    Bid, BidPatch, BidSnapshot, Tender, TenderPatch, TenderSnapshot,
};
use chrono::{DateTime, Utc};

pub const FIRST_VERSION: i32 = 1;

/// An entity carrying a monotonically increasing content generation.
pub trait Versioned {
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

impl Versioned for Tender {
    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Versioned for Bid {
    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Apply a mutation as a new content generation.
///
/// Returns the pre-mutation state, which the caller must persist as the
/// history row for the superseded version in the same transaction as the
/// updated current row.
pub fn advance<T, F>(entity: &mut T, mutate: F) -> T
where
    T: Versioned + Clone,
    F: FnOnce(&mut T),
{
    let superseded = entity.clone();
    mutate(entity);
    entity.set_version(superseded.version() + 1);
    entity.set_updated_at(Utc::now());
    superseded
}

/// Coalescing text update: `None` and `""` both leave the field unchanged.
pub fn coalesce_text(field: &mut String, update: &Option<String>) {
    if let Some(value) = update {
        if !value.is_empty() {
            *field = value.clone();
        }
    }
}

/// Coalescing update for copyable fields: `None` leaves the field unchanged.
pub fn coalesce<T: Copy>(field: &mut T, update: &Option<T>) {
    if let Some(value) = update {
        *field = *value;
    }
}

impl TenderPatch {
    pub fn apply(&self, tender: &mut Tender) {
        coalesce_text(&mut tender.name, &self.name);
        coalesce_text(&mut tender.description, &self.description);
        coalesce(&mut tender.service_type, &self.service_type);
    }
}

impl BidPatch {
    pub fn apply(&self, bid: &mut Bid) {
        coalesce_text(&mut bid.name, &self.name);
        coalesce_text(&mut bid.description, &self.description);
    }
}

impl Tender {
    pub fn to_snapshot(&self) -> TenderSnapshot {
        TenderSnapshot {
            tender_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            service_type: self.service_type,
            status: self.status,
            version: self.version,
            organization_id: self.organization_id,
            creator_username: self.creator_username.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TenderSnapshot {
    /// Restore the snapshot's full content onto the current row. Identity,
    /// ownership, and the version counter are untouched; rollback bypasses
    /// patch coalescing so historically empty fields come back empty.
    pub fn restore(&self, tender: &mut Tender) {
        tender.name = self.name.clone();
        tender.description = self.description.clone();
        tender.service_type = self.service_type;
        tender.status = self.status;
    }
}

impl Bid {
    pub fn to_snapshot(&self) -> BidSnapshot {
        BidSnapshot {
            bid_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            feedback: self.feedback.clone(),
            status: self.status,
            tender_id: self.tender_id,
            organization_id: self.organization_id,
            decision: self.decision,
            author_id: self.author_id,
            author_username: self.author_username.clone(),
            author_type: self.author_type,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl BidSnapshot {
    pub fn restore(&self, bid: &mut Bid) {
        bid.name = self.name.clone();
        bid.description = self.description.clone();
        bid.feedback = self.feedback.clone();
        bid.status = self.status;
        bid.decision = self.decision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServiceType, TenderStatus};
    use uuid::Uuid;

    fn tender(name: &str) -> Tender {
        let now = Utc::now();
        Tender {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: "roadworks".to_string(),
            service_type: ServiceType::Construction,
            status: TenderStatus::Created,
            version: FIRST_VERSION,
            organization_id: Uuid::new_v4(),
            creator_username: "alice".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn advance_bumps_version_and_returns_superseded_state() {
        let mut current = tender("T1");
        let superseded = advance(&mut current, |t| t.name = "T2".to_string());

        assert_eq!(superseded.version, 1);
        assert_eq!(superseded.name, "T1");
        assert_eq!(current.version, 2);
        assert_eq!(current.name, "T2");
    }

    #[test]
    fn empty_patch_fields_leave_content_unchanged() {
        let mut current = tender("T1");
        let patch = TenderPatch {
            name: Some(String::new()),
            description: None,
            service_type: None,
        };
        patch.apply(&mut current);

        assert_eq!(current.name, "T1");
        assert_eq!(current.description, "roadworks");
    }

    #[test]
    fn patch_updates_only_populated_fields() {
        let mut current = tender("T1");
        let patch = TenderPatch {
            name: Some("T2".to_string()),
            description: None,
            service_type: Some(ServiceType::Delivery),
        };
        patch.apply(&mut current);

        assert_eq!(current.name, "T2");
        assert_eq!(current.description, "roadworks");
        assert_eq!(current.service_type, ServiceType::Delivery);
    }

    #[test]
    fn snapshot_restore_brings_back_full_content() {
        let mut current = tender("T1");
        let snapshot = advance(&mut current, |t| {
            t.name = "T2".to_string();
            t.status = TenderStatus::Published;
        })
        .to_snapshot();

        snapshot.restore(&mut current);
        assert_eq!(current.name, "T1");
        assert_eq!(current.status, TenderStatus::Created);
        // Restoring content never rewinds the counter.
        assert_eq!(current.version, 2);
    }
}
