//! PostgreSQL store backend.
//!
//! Current and history tables per entity plus the directory tables
//! (organization, employee, organization_responsible). Every mutation runs
//! in one transaction: the current row is read `FOR UPDATE`, its pre-edit
//! state is appended to the history table at its current version, and the
//! new content is written at version+1. Both statements commit together or
//! not at all.

use crate::error::{Error, Result};
use crate::store::{AuthorizationPort, EntityStorePort};
use crate::types::{
    Bid, BidDecision, BidPatch, BidStatus, DirectoryFixture, NewBid, NewTender, Page, Review,
    ServiceType, Tender, TenderPatch, TenderStatus,
};
use crate::version::{self, FIRST_VERSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool};
use std::time::Duration;
use uuid::Uuid;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct PgStore {
    pool: PgPool,
}

/// Row shape of the `tender` and `tender_history` tables. Kept separate
/// from the domain type so enum parsing stays localized here.
#[derive(Debug, Clone, FromRow)]
struct TenderRow {
    id: Uuid,
    name: String,
    description: String,
    service_type: String,
    status: String,
    version: i32,
    organization_id: Uuid,
    creator_username: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct BidRow {
    id: Uuid,
    name: String,
    description: String,
    feedback: Option<String>,
    status: String,
    tender_id: Uuid,
    organization_id: Option<Uuid>,
    decision: String,
    author_id: Uuid,
    author_username: String,
    author_type: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct ReviewRow {
    id: Uuid,
    bid_id: Uuid,
    author_username: String,
    description: String,
    created_at: DateTime<Utc>,
}

fn stored<T: std::str::FromStr>(value: &str, column: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::internal(format!("corrupt stored value in column '{column}'")))
}

fn tender_from_row(row: TenderRow) -> Result<Tender> {
    Ok(Tender {
        id: row.id,
        name: row.name,
        description: row.description,
        service_type: stored::<ServiceType>(&row.service_type, "service_type")?,
        status: stored::<TenderStatus>(&row.status, "status")?,
        version: row.version,
        organization_id: row.organization_id,
        creator_username: row.creator_username,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn bid_from_row(row: BidRow) -> Result<Bid> {
    Ok(Bid {
        id: row.id,
        name: row.name,
        description: row.description,
        feedback: row.feedback,
        status: stored::<BidStatus>(&row.status, "status")?,
        tender_id: row.tender_id,
        organization_id: row.organization_id,
        decision: stored::<BidDecision>(&row.decision, "decision")?,
        author_id: row.author_id,
        author_username: row.author_username,
        author_type: stored(&row.author_type, "author_type")?,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn review_from_row(row: ReviewRow) -> Review {
    Review {
        id: row.id,
        bid_id: row.bid_id,
        author_username: row.author_username,
        description: row.description,
        created_at: row.created_at,
    }
}

const TENDER_COLUMNS: &str = "id, name, description, service_type, status, version, \
     organization_id, creator_username, created_at, updated_at";

const BID_COLUMNS: &str = "id, name, description, feedback, status, tender_id, \
     organization_id, decision, author_id, author_username, author_type, version, \
     created_at, updated_at";

impl PgStore {
    /// Connect with bounded retries; new deployments often race the
    /// database container on startup.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut attempt = 1;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect(database_url)
                .await
            {
                Ok(pool) => {
                    tracing::info!("connected to postgres");
                    return Ok(Self { pool });
                }
                Err(err) if attempt < CONNECT_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "postgres connect failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS organization (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS employee (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS organization_responsible (
                organization_id UUID NOT NULL REFERENCES organization (id),
                employee_id UUID NOT NULL REFERENCES employee (id),
                PRIMARY KEY (organization_id, employee_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tender (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                service_type TEXT NOT NULL,
                status TEXT NOT NULL,
                version INT NOT NULL,
                organization_id UUID NOT NULL,
                creator_username TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tender_history (
                tender_id UUID NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                service_type TEXT NOT NULL,
                status TEXT NOT NULL,
                version INT NOT NULL,
                organization_id UUID NOT NULL,
                creator_username TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (tender_id, version)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS bid (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                feedback TEXT NULL,
                status TEXT NOT NULL,
                tender_id UUID NOT NULL,
                organization_id UUID NULL,
                decision TEXT NOT NULL,
                author_id UUID NOT NULL,
                author_username TEXT NOT NULL,
                author_type TEXT NOT NULL,
                version INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS bid_history (
                bid_id UUID NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                feedback TEXT NULL,
                status TEXT NOT NULL,
                tender_id UUID NOT NULL,
                organization_id UUID NULL,
                decision TEXT NOT NULL,
                author_id UUID NOT NULL,
                author_username TEXT NOT NULL,
                author_type TEXT NOT NULL,
                version INT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (bid_id, version)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS review (
                id UUID PRIMARY KEY,
                bid_id UUID NOT NULL,
                author_username TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tender_creator ON tender (creator_username)",
            "CREATE INDEX IF NOT EXISTS idx_bid_tender ON bid (tender_id)",
            "CREATE INDEX IF NOT EXISTS idx_bid_author ON bid (author_username)",
            "CREATE INDEX IF NOT EXISTS idx_review_bid ON review (bid_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_tender_for_update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Tender> {
        let row = sqlx::query_as::<_, TenderRow>(&format!(
            "SELECT {TENDER_COLUMNS} FROM tender WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        row.map(tender_from_row)
            .transpose()?
            .ok_or_else(Error::entity_not_found)
    }

    async fn fetch_bid_for_update(&self, conn: &mut PgConnection, id: Uuid) -> Result<Bid> {
        let row = sqlx::query_as::<_, BidRow>(&format!(
            "SELECT {BID_COLUMNS} FROM bid WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        row.map(bid_from_row)
            .transpose()?
            .ok_or_else(Error::entity_not_found)
    }

    /// Commit a new tender content generation: history append for the
    /// superseded state plus the current-row update, inside the caller's
    /// transaction.
    async fn commit_tender(
        &self,
        conn: &mut PgConnection,
        superseded: &Tender,
        current: &Tender,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tender_history (tender_id, name, description, service_type, status,
                version, organization_id, creator_username, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(superseded.id)
        .bind(&superseded.name)
        .bind(&superseded.description)
        .bind(superseded.service_type.to_string())
        .bind(superseded.status.to_string())
        .bind(superseded.version)
        .bind(superseded.organization_id)
        .bind(&superseded.creator_username)
        .bind(superseded.created_at)
        .bind(superseded.updated_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE tender
            SET name = $2, description = $3, service_type = $4, status = $5,
                version = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(current.id)
        .bind(&current.name)
        .bind(&current.description)
        .bind(current.service_type.to_string())
        .bind(current.status.to_string())
        .bind(current.version)
        .bind(current.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn commit_bid(
        &self,
        conn: &mut PgConnection,
        superseded: &Bid,
        current: &Bid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bid_history (bid_id, name, description, feedback, status, tender_id,
                organization_id, decision, author_id, author_username, author_type, version,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(superseded.id)
        .bind(&superseded.name)
        .bind(&superseded.description)
        .bind(&superseded.feedback)
        .bind(superseded.status.to_string())
        .bind(superseded.tender_id)
        .bind(superseded.organization_id)
        .bind(superseded.decision.to_string())
        .bind(superseded.author_id)
        .bind(&superseded.author_username)
        .bind(superseded.author_type.to_string())
        .bind(superseded.version)
        .bind(superseded.created_at)
        .bind(superseded.updated_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE bid
            SET name = $2, description = $3, feedback = $4, status = $5, decision = $6,
                version = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(current.id)
        .bind(&current.name)
        .bind(&current.description)
        .bind(&current.feedback)
        .bind(current.status.to_string())
        .bind(current.decision.to_string())
        .bind(current.version)
        .bind(current.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn mutate_tender<F>(&self, id: Uuid, mutate: F) -> Result<Tender>
    where
        F: FnOnce(&mut Tender),
    {
        let mut tx = self.pool.begin().await?;
        let mut tender = self.fetch_tender_for_update(&mut tx, id).await?;
        let superseded = version::advance(&mut tender, mutate);
        self.commit_tender(&mut tx, &superseded, &tender).await?;
        tx.commit().await?;
        Ok(tender)
    }

    async fn mutate_bid<F>(&self, id: Uuid, mutate: F) -> Result<Bid>
    where
        F: FnOnce(&mut Bid),
    {
        let mut tx = self.pool.begin().await?;
        let mut bid = self.fetch_bid_for_update(&mut tx, id).await?;
        let superseded = version::advance(&mut bid, mutate);
        self.commit_bid(&mut tx, &superseded, &bid).await?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn exists(&self, query: &str, bind: Uuid) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(query)
            .bind(bind)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AuthorizationPort for PgStore {
    async fn employee_exists(&self, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM employee WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn employee_by_id_exists(&self, id: Uuid) -> Result<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM employee WHERE id = $1)", id)
            .await
    }

    async fn tender_exists(&self, id: Uuid) -> Result<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM tender WHERE id = $1)", id)
            .await
    }

    async fn bid_exists(&self, id: Uuid) -> Result<bool> {
        self.exists("SELECT EXISTS(SELECT 1 FROM bid WHERE id = $1)", id)
            .await
    }

    async fn is_responsible_for_organization(&self, org_id: Uuid, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM organization_responsible r
                JOIN employee e ON r.employee_id = e.id
                WHERE r.organization_id = $1 AND e.username = $2
            )
            "#,
        )
        .bind(org_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn is_responsible_for_tender(&self, tender_id: Uuid, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM organization_responsible r
                JOIN employee e ON r.employee_id = e.id
                JOIN tender t ON t.organization_id = r.organization_id
                WHERE t.id = $1 AND e.username = $2
            )
            "#,
        )
        .bind(tender_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn is_responsible_for_bid(&self, bid_id: Uuid, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM bid b
                JOIN tender t ON b.tender_id = t.id
                JOIN organization_responsible r ON t.organization_id = r.organization_id
                JOIN employee e ON r.employee_id = e.id
                WHERE b.id = $1 AND e.username = $2
            )
            "#,
        )
        .bind(bid_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn is_responsible_for_tender_by_employee_id(
        &self,
        employee_id: Uuid,
        tender_id: Uuid,
    ) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM organization_responsible r
                JOIN tender t ON r.organization_id = t.organization_id
                WHERE r.employee_id = $1 AND t.id = $2
            )
            "#,
        )
        .bind(employee_id)
        .bind(tender_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn is_bid_author(&self, bid_id: Uuid, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bid WHERE id = $1 AND author_username = $2)",
        )
        .bind(bid_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn tender_version_exists(&self, tender_id: Uuid, version: i32) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tender_history WHERE tender_id = $1 AND version = $2)",
        )
        .bind(tender_id)
        .bind(version)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn bid_version_exists(&self, bid_id: Uuid, version: i32) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bid_history WHERE bid_id = $1 AND version = $2)",
        )
        .bind(bid_id)
        .bind(version)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl EntityStorePort for PgStore {
    async fn get_tender(&self, id: Uuid) -> Result<Tender> {
        let row = sqlx::query_as::<_, TenderRow>(&format!(
            "SELECT {TENDER_COLUMNS} FROM tender WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(tender_from_row)
            .transpose()?
            .ok_or_else(Error::entity_not_found)
    }

    async fn list_tenders(&self, service_types: &[ServiceType], page: Page) -> Result<Vec<Tender>> {
        let filter: Option<Vec<String>> = if service_types.is_empty() {
            None
        } else {
            Some(service_types.iter().map(|t| t.to_string()).collect())
        };

        let rows = sqlx::query_as::<_, TenderRow>(&format!(
            r#"
            SELECT {TENDER_COLUMNS}
            FROM tender
            WHERE status = $1
              AND ($2::TEXT[] IS NULL OR service_type = ANY($2))
            ORDER BY name, id
            OFFSET $3 LIMIT $4
            "#
        ))
        .bind(TenderStatus::Published.to_string())
        .bind(filter)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(tender_from_row).collect()
    }

    async fn list_user_tenders(&self, username: &str, page: Page) -> Result<Vec<Tender>> {
        let rows = sqlx::query_as::<_, TenderRow>(&format!(
            r#"
            SELECT {TENDER_COLUMNS}
            FROM tender
            WHERE creator_username = $1
            ORDER BY name, id
            OFFSET $2 LIMIT $3
            "#
        ))
        .bind(username)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(tender_from_row).collect()
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

        sqlx::query(
            r#"
            INSERT INTO tender (id, name, description, service_type, status, version,
                organization_id, creator_username, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(tender.id)
        .bind(&tender.name)
        .bind(&tender.description)
        .bind(tender.service_type.to_string())
        .bind(tender.status.to_string())
        .bind(tender.version)
        .bind(tender.organization_id)
        .bind(&tender.creator_username)
        .bind(tender.created_at)
        .bind(tender.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(tender)
    }

    async fn edit_tender(&self, id: Uuid, patch: TenderPatch) -> Result<Tender> {
        self.mutate_tender(id, |t| patch.apply(t)).await
    }

    async fn update_tender_status(&self, id: Uuid, status: TenderStatus) -> Result<Tender> {
        self.mutate_tender(id, |t| t.status = status).await
    }

    async fn rollback_tender(&self, id: Uuid, target: i32) -> Result<Tender> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, TenderRow>(
            r#"
            SELECT tender_id AS id, name, description, service_type, status, version,
                organization_id, creator_username, created_at, updated_at
            FROM tender_history
            WHERE tender_id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        let snapshot = row
            .map(tender_from_row)
            .transpose()?
            .ok_or_else(Error::version_not_found)?
            .to_snapshot();

        let mut tender = self.fetch_tender_for_update(&mut tx, id).await?;
        let superseded = version::advance(&mut tender, |t| snapshot.restore(t));
        self.commit_tender(&mut tx, &superseded, &tender).await?;
        tx.commit().await?;
        Ok(tender)
    }

    async fn get_bid(&self, id: Uuid) -> Result<Bid> {
        let row =
            sqlx::query_as::<_, BidRow>(&format!("SELECT {BID_COLUMNS} FROM bid WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(bid_from_row)
            .transpose()?
            .ok_or_else(Error::entity_not_found)
    }

    async fn list_user_bids(&self, username: &str, page: Page) -> Result<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM bid
            WHERE author_username = $1
            ORDER BY name, id
            OFFSET $2 LIMIT $3
            "#
        ))
        .bind(username)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bid_from_row).collect()
    }

    async fn list_bids_for_tender(&self, tender_id: Uuid, page: Page) -> Result<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM bid
            WHERE tender_id = $1
            ORDER BY name, id
            OFFSET $2 LIMIT $3
            "#
        ))
        .bind(tender_id)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bid_from_row).collect()
    }

    async fn create_bid(&self, input: NewBid) -> Result<Bid> {
        let mut tx = self.pool.begin().await?;
        let author_username: Option<String> =
            sqlx::query_scalar("SELECT username FROM employee WHERE id = $1")
                .bind(input.author_id)
                .fetch_optional(&mut *tx)
                .await?;
        let author_username = author_username.ok_or_else(Error::unknown_user)?;

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

        sqlx::query(
            r#"
            INSERT INTO bid (id, name, description, feedback, status, tender_id,
                organization_id, decision, author_id, author_username, author_type, version,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(bid.id)
        .bind(&bid.name)
        .bind(&bid.description)
        .bind(&bid.feedback)
        .bind(bid.status.to_string())
        .bind(bid.tender_id)
        .bind(bid.organization_id)
        .bind(bid.decision.to_string())
        .bind(bid.author_id)
        .bind(&bid.author_username)
        .bind(bid.author_type.to_string())
        .bind(bid.version)
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(bid)
    }

    async fn edit_bid(&self, id: Uuid, patch: BidPatch) -> Result<Bid> {
        self.mutate_bid(id, |b| patch.apply(b)).await
    }

    async fn update_bid_status(&self, id: Uuid, status: BidStatus) -> Result<Bid> {
        self.mutate_bid(id, |b| b.status = status).await
    }

    async fn submit_bid_decision(&self, id: Uuid, decision: BidDecision) -> Result<Bid> {
        self.mutate_bid(id, |b| b.decision = decision).await
    }

    async fn append_review(&self, bid_id: Uuid, reviewer: &str, description: &str) -> Result<Bid> {
        let bid = self.get_bid(bid_id).await?;
        sqlx::query(
            r#"
            INSERT INTO review (id, bid_id, author_username, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bid_id)
        .bind(reviewer)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(bid)
    }

    async fn list_reviews(
        &self,
        tender_id: Uuid,
        bid_author: &str,
        page: Page,
    ) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT r.id, r.bid_id, r.author_username, r.description, r.created_at
            FROM review r
            JOIN bid b ON r.bid_id = b.id
            WHERE b.tender_id = $1 AND b.author_username = $2
            ORDER BY r.created_at, r.id
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(tender_id)
        .bind(bid_author)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(review_from_row).collect())
    }

    async fn rollback_bid(&self, id: Uuid, target: i32) -> Result<Bid> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, BidRow>(
            r#"
            SELECT bid_id AS id, name, description, feedback, status, tender_id,
                organization_id, decision, author_id, author_username, author_type, version,
                created_at, updated_at
            FROM bid_history
            WHERE bid_id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        let snapshot = row
            .map(bid_from_row)
            .transpose()?
            .ok_or_else(Error::version_not_found)?
            .to_snapshot();

        let mut bid = self.fetch_bid_for_update(&mut tx, id).await?;
        let superseded = version::advance(&mut bid, |b| snapshot.restore(b));
        self.commit_bid(&mut tx, &superseded, &bid).await?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn seed_directory(&self, fixture: DirectoryFixture) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for org in &fixture.organizations {
            sqlx::query(
                r#"
                INSERT INTO organization (id, name, description)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(org.id)
            .bind(&org.name)
            .bind(&org.description)
            .execute(&mut *tx)
            .await?;
        }
        for employee in &fixture.employees {
            sqlx::query(
                r#"
                INSERT INTO employee (id, username, first_name, last_name)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(employee.id)
            .bind(&employee.username)
            .bind(&employee.first_name)
            .bind(&employee.last_name)
            .execute(&mut *tx)
            .await?;
        }
        for link in &fixture.responsibles {
            sqlx::query(
                r#"
                INSERT INTO organization_responsible (organization_id, employee_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(link.organization_id)
            .bind(link.employee_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
