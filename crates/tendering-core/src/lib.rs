//! Versioned tender/bid lifecycle engine for a procurement marketplace.
//!
//! Each entity keeps a mutable current row plus an append-only history of
//! superseded versions. Every restricted operation runs a fixed check
//! pipeline (entity exists, actor exists, actor holds the required
//! relationship) before touching storage, and rollback always moves the
//! version counter forward.

#![deny(unsafe_code)]

pub mod authz;
pub mod bid;
pub mod error;
pub mod store;
pub mod tender;
pub mod types;
pub mod version;

pub use authz::Gate;
pub use bid::BidOps;
pub use error::{Error, Result};
pub use store::{AuthorizationPort, EntityStorePort, Store, StoreConfig};
pub use tender::TenderOps;
pub use types::{
    AuthorType, Bid, BidDecision, BidPatch, BidSnapshot, BidStatus, DirectoryFixture, Employee,
    NewBid, NewTender, Organization, Page, ResponsibleLink, Review, ServiceType, Tender,
    TenderPatch, TenderSnapshot, TenderStatus,
};
