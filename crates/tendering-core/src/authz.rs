//! Authorization gate: the fixed check pipeline in front of every
//! restricted operation.
//!
//! Check order is a correctness contract and is never rearranged by
//! callers: entity existence (NotFound) before actor existence
//! (Unauthorized) before relationship (Forbidden) before, for rollbacks,
//! historical-version existence. A request against a missing tender from a
//! missing user reports NotFound, never Unauthorized.

use crate::error::{Error, Result};
use crate::store::AuthorizationPort;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Gate {
    port: Arc<dyn AuthorizationPort>,
}

impl Gate {
    pub fn new(port: Arc<dyn AuthorizationPort>) -> Self {
        Self { port }
    }

    pub async fn require_tender(&self, id: Uuid) -> Result<()> {
        if self.port.tender_exists(id).await? {
            Ok(())
        } else {
            Err(Error::entity_not_found())
        }
    }

    pub async fn require_bid(&self, id: Uuid) -> Result<()> {
        if self.port.bid_exists(id).await? {
            Ok(())
        } else {
            Err(Error::entity_not_found())
        }
    }

    pub async fn require_user(&self, username: &str) -> Result<()> {
        if self.port.employee_exists(username).await? {
            Ok(())
        } else {
            Err(Error::unknown_user())
        }
    }

    pub async fn require_user_by_id(&self, id: Uuid) -> Result<()> {
        if self.port.employee_by_id_exists(id).await? {
            Ok(())
        } else {
            Err(Error::unknown_user())
        }
    }

    pub async fn require_responsible_for_organization(
        &self,
        org_id: Uuid,
        username: &str,
    ) -> Result<()> {
        if self
            .port
            .is_responsible_for_organization(org_id, username)
            .await?
        {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    pub async fn require_responsible_for_tender(
        &self,
        tender_id: Uuid,
        username: &str,
    ) -> Result<()> {
        if self
            .port
            .is_responsible_for_tender(tender_id, username)
            .await?
        {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    pub async fn require_responsible_for_bid(&self, bid_id: Uuid, username: &str) -> Result<()> {
        if self.port.is_responsible_for_bid(bid_id, username).await? {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    pub async fn require_responsible_for_tender_by_employee_id(
        &self,
        employee_id: Uuid,
        tender_id: Uuid,
    ) -> Result<()> {
        if self
            .port
            .is_responsible_for_tender_by_employee_id(employee_id, tender_id)
            .await?
        {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    pub async fn require_bid_author(&self, bid_id: Uuid, username: &str) -> Result<()> {
        if self.port.is_bid_author(bid_id, username).await? {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    /// Restricted reads on a bid are open to its author and to the
    /// responsible parties of the tender's organization.
    pub async fn require_bid_author_or_responsible(
        &self,
        bid_id: Uuid,
        username: &str,
    ) -> Result<()> {
        if self.port.is_bid_author(bid_id, username).await?
            || self.port.is_responsible_for_bid(bid_id, username).await?
        {
            Ok(())
        } else {
            Err(Error::insufficient_privileges())
        }
    }

    pub async fn require_tender_version(&self, tender_id: Uuid, version: i32) -> Result<()> {
        if self.port.tender_version_exists(tender_id, version).await? {
            Ok(())
        } else {
            Err(Error::version_not_found())
        }
    }

    pub async fn require_bid_version(&self, bid_id: Uuid, version: i32) -> Result<()> {
        if self.port.bid_version_exists(bid_id, version).await? {
            Ok(())
        } else {
            Err(Error::version_not_found())
        }
    }
}
