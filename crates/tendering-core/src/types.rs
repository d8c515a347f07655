use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of work a tender procures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceType {
    Construction,
    Delivery,
    Manufacture,
}

/// Tender lifecycle states. Transitions happen only through explicit
/// status-update calls; there are no automatic transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenderStatus {
    Created,
    Published,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BidStatus {
    Created,
    Published,
    Canceled,
}

/// Decision recorded by the tender's responsible parties, independent of
/// the bid's own status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BidDecision {
    None,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthorType {
    Organization,
    User,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident),+ }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Error> {
                match value {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    other => Err(Error::validation(format!(
                        concat!("invalid ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(ServiceType { Construction, Delivery, Manufacture });
text_enum!(TenderStatus { Created, Published, Closed });
text_enum!(BidStatus { Created, Published, Canceled });
text_enum!(BidDecision { None, Approved, Rejected });
text_enum!(AuthorType { Organization, User });

/// Current row of a tender. `version` starts at 1 and only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub status: TenderStatus,
    pub version: i32,
    pub organization_id: Uuid,
    pub creator_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a tender's content at a superseded version,
/// keyed by `(tender_id, version)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenderSnapshot {
    pub tender_id: Uuid,
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub status: TenderStatus,
    pub version: i32,
    pub organization_id: Uuid,
    pub creator_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub status: BidStatus,
    pub tender_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    pub decision: BidDecision,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_type: AuthorType,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable copy of a bid's content at a superseded version,
/// keyed by `(bid_id, version)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidSnapshot {
    pub bid_id: Uuid,
    pub name: String,
    pub description: String,
    pub feedback: Option<String>,
    pub status: BidStatus,
    pub tender_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub decision: BidDecision,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_type: AuthorType,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Feedback left on a bid. Appended independently of the bid's
/// version and status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub author_username: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// One row of the organization/employee many-to-many responsibility link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponsibleLink {
    pub organization_id: Uuid,
    pub employee_id: Uuid,
}

/// Directory rows seeded into a store at bootstrap. The marketplace itself
/// never mutates the directory; it only reads relationships from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryFixture {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub responsibles: Vec<ResponsibleLink>,
}

/// Input for tender creation. The stored row starts at version 1 with
/// status `Created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTender {
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub organization_id: Uuid,
    pub creator_username: String,
}

/// Coalescing partial update for a tender. `None` and the empty string both
/// mean "leave unchanged"; the patch cannot express "clear the field".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBid {
    pub name: String,
    pub description: String,
    pub tender_id: Uuid,
    pub author_type: AuthorType,
    pub author_id: Uuid,
}

/// Coalescing partial update for a bid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Offset/limit window for listings. A window past the end of the result
/// set, or a zero limit, yields an empty sequence rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 5;

    pub fn new(offset: Option<i64>, limit: Option<i64>) -> Result<Self, Error> {
        let offset = offset.unwrap_or(0);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if offset < 0 {
            return Err(Error::validation("offset must not be negative"));
        }
        if limit < 0 {
            return Err(Error::validation("limit must not be negative"));
        }
        Ok(Self { offset, limit })
    }

    /// Apply the window to an already ordered in-memory sequence.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_text_roundtrip() {
        for status in [
            TenderStatus::Created,
            TenderStatus::Published,
            TenderStatus::Closed,
        ] {
            let parsed: TenderStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }

        for decision in [BidDecision::None, BidDecision::Approved, BidDecision::Rejected] {
            let parsed: BidDecision = decision.to_string().parse().unwrap();
            assert_eq!(decision, parsed);
        }
    }

    #[test]
    fn invalid_enum_text_is_a_validation_error() {
        let err = "Destroyed".parse::<TenderStatus>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn page_window_past_the_end_is_empty() {
        let page = Page::new(Some(1000), Some(5)).unwrap();
        let out = page.apply(vec![1, 2, 3]);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_limit_yields_empty_window() {
        let page = Page::new(None, Some(0)).unwrap();
        let out = page.apply(vec![1, 2, 3]);
        assert!(out.is_empty());
    }

    #[test]
    fn negative_paging_is_rejected() {
        assert!(Page::new(Some(-1), None).is_err());
        assert!(Page::new(None, Some(-5)).is_err());
    }
}
