#![deny(unsafe_code)]

pub mod fixtures;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tendering_core::{
    Bid, BidDecision, BidOps, BidPatch, BidStatus, DirectoryFixture, Error, NewBid, NewTender,
    Page, Review, ServiceType, Store, StoreConfig, Tender, TenderOps, TenderPatch, TenderStatus,
};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub storage: StoreConfig,
    pub directory: Option<DirectoryFixture>,
}

#[derive(Clone)]
pub struct ServiceState {
    pub tenders: TenderOps,
    pub bids: BidOps,
    backend: &'static str,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, Error> {
        let store = Store::bootstrap(config.storage).await?;
        if let Some(directory) = config.directory {
            store.seed_directory(directory).await?;
        }
        Ok(Self {
            tenders: TenderOps::new(&store),
            bids: BidOps::new(&store),
            backend: store.backend_label(),
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/tenders", get(list_tenders))
        .route("/api/tenders/new", post(create_tender))
        .route("/api/tenders/my", get(my_tenders))
        .route("/api/tenders/:tender_id/status", get(tender_status))
        .route("/api/tenders/:tender_id/status", put(update_tender_status))
        .route("/api/tenders/:tender_id/edit", patch(edit_tender))
        .route(
            "/api/tenders/:tender_id/rollback/:version",
            put(rollback_tender),
        )
        .route("/api/bids/new", post(create_bid))
        .route("/api/bids/my", get(my_bids))
        .route("/api/bids/:tender_id/list", get(bids_for_tender))
        .route("/api/bids/:bid_id/status", get(bid_status))
        .route("/api/bids/:bid_id/status", put(update_bid_status))
        .route("/api/bids/:bid_id/edit", patch(edit_bid))
        .route("/api/bids/:bid_id/submit_decision", put(submit_bid_decision))
        .route("/api/bids/:bid_id/feedback", put(submit_bid_feedback))
        .route("/api/bids/:tender_id/reviews", get(bid_reviews))
        .route("/api/bids/:bid_id/rollback/:version", put(rollback_bid))
        .with_state(state)
}

/// Transport-facing error wrapper: maps the core's error kinds onto HTTP
/// status codes with a `{"reason": ...}` body.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match self.0 {
            Error::NotFound(reason) => (StatusCode::NOT_FOUND, reason),
            Error::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason),
            Error::Forbidden(reason) => (StatusCode::FORBIDDEN, reason),
            Error::Validation(reason) => (StatusCode::BAD_REQUEST, reason),
            Error::Internal(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason),
        };
        (status, Json(serde_json::json!({ "reason": reason }))).into_response()
    }
}

async fn ping() -> Json<&'static str> {
    Json("ok")
}

#[derive(Debug, Deserialize)]
struct ListTendersQuery {
    service_type: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_tenders(
    State(state): State<ServiceState>,
    Query(query): Query<ListTendersQuery>,
) -> Result<Json<Vec<Tender>>, ApiError> {
    let service_types = parse_service_types(query.service_type.as_deref())?;
    let page = Page::new(query.offset, query.limit)?;
    Ok(Json(state.tenders.list(&service_types, page).await?))
}

/// `service_type` arrives as a comma-separated list, e.g.
/// `service_type=Construction,Delivery`.
fn parse_service_types(raw: Option<&str>) -> Result<Vec<ServiceType>, Error> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => raw
            .split(',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect(),
    }
}

async fn create_tender(
    State(state): State<ServiceState>,
    Json(input): Json<NewTender>,
) -> Result<Json<Tender>, ApiError> {
    Ok(Json(state.tenders.create(input).await?))
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    username: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn my_tenders(
    State(state): State<ServiceState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<Tender>>, ApiError> {
    let page = Page::new(query.offset, query.limit)?;
    Ok(Json(state.tenders.list_user(&query.username, page).await?))
}

#[derive(Debug, Deserialize)]
struct UsernameQuery {
    username: String,
}

async fn tender_status(
    State(state): State<ServiceState>,
    Path(tender_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<TenderStatus>, ApiError> {
    Ok(Json(
        state.tenders.status(tender_id, &query.username).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusQuery {
    status: String,
    username: String,
}

async fn update_tender_status(
    State(state): State<ServiceState>,
    Path(tender_id): Path<Uuid>,
    Query(query): Query<UpdateStatusQuery>,
) -> Result<Json<Tender>, ApiError> {
    let status: TenderStatus = query.status.parse()?;
    Ok(Json(
        state
            .tenders
            .update_status(tender_id, status, &query.username)
            .await?,
    ))
}

async fn edit_tender(
    State(state): State<ServiceState>,
    Path(tender_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    Json(patch): Json<TenderPatch>,
) -> Result<Json<Tender>, ApiError> {
    Ok(Json(
        state
            .tenders
            .edit(tender_id, patch, &query.username)
            .await?,
    ))
}

async fn rollback_tender(
    State(state): State<ServiceState>,
    Path((tender_id, version)): Path<(Uuid, i32)>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Tender>, ApiError> {
    Ok(Json(
        state
            .tenders
            .rollback(tender_id, version, &query.username)
            .await?,
    ))
}

async fn create_bid(
    State(state): State<ServiceState>,
    Json(input): Json<NewBid>,
) -> Result<Json<Bid>, ApiError> {
    Ok(Json(state.bids.create(input).await?))
}

async fn my_bids(
    State(state): State<ServiceState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<Bid>>, ApiError> {
    let page = Page::new(query.offset, query.limit)?;
    Ok(Json(state.bids.list_user(&query.username, page).await?))
}

async fn bids_for_tender(
    State(state): State<ServiceState>,
    Path(tender_id): Path<Uuid>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<Bid>>, ApiError> {
    let page = Page::new(query.offset, query.limit)?;
    Ok(Json(
        state
            .bids
            .list_for_tender(tender_id, &query.username, page)
            .await?,
    ))
}

async fn bid_status(
    State(state): State<ServiceState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<BidStatus>, ApiError> {
    Ok(Json(state.bids.status(bid_id, &query.username).await?))
}

async fn update_bid_status(
    State(state): State<ServiceState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<UpdateStatusQuery>,
) -> Result<Json<Bid>, ApiError> {
    let status: BidStatus = query.status.parse()?;
    Ok(Json(
        state
            .bids
            .update_status(bid_id, status, &query.username)
            .await?,
    ))
}

async fn edit_bid(
    State(state): State<ServiceState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    Json(patch): Json<BidPatch>,
) -> Result<Json<Bid>, ApiError> {
    Ok(Json(
        state.bids.edit(bid_id, patch, &query.username).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct DecisionQuery {
    decision: String,
    username: String,
}

async fn submit_bid_decision(
    State(state): State<ServiceState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<DecisionQuery>,
) -> Result<Json<Bid>, ApiError> {
    let decision: BidDecision = query.decision.parse()?;
    Ok(Json(
        state
            .bids
            .submit_decision(bid_id, decision, &query.username)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct FeedbackQuery {
    #[serde(rename = "bidFeedback")]
    bid_feedback: String,
    username: String,
}

async fn submit_bid_feedback(
    State(state): State<ServiceState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Bid>, ApiError> {
    Ok(Json(
        state
            .bids
            .submit_feedback(bid_id, &query.bid_feedback, &query.username)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct ReviewsQuery {
    #[serde(rename = "authorUsername")]
    author_username: String,
    #[serde(rename = "requesterUsername")]
    requester_username: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn bid_reviews(
    State(state): State<ServiceState>,
    Path(tender_id): Path<Uuid>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let page = Page::new(query.offset, query.limit)?;
    Ok(Json(
        state
            .bids
            .reviews(
                tender_id,
                &query.author_username,
                &query.requester_username,
                page,
            )
            .await?,
    ))
}

async fn rollback_bid(
    State(state): State<ServiceState>,
    Path((bid_id, version)): Path<(Uuid, i32)>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Bid>, ApiError> {
    Ok(Json(
        state
            .bids
            .rollback(bid_id, version, &query.username)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tendering_core::{Employee, Organization, ResponsibleLink};
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        org_id: Uuid,
        alice_id: Uuid,
    }

    async fn test_app() -> TestApp {
        let org_id = Uuid::new_v4();
        let alice_id = Uuid::new_v4();
        let directory = DirectoryFixture {
            organizations: vec![Organization {
                id: org_id,
                name: "Roads Inc".to_string(),
                description: String::new(),
            }],
            employees: vec![Employee {
                id: alice_id,
                username: "alice".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            }],
            responsibles: vec![ResponsibleLink {
                organization_id: org_id,
                employee_id: alice_id,
            }],
        };
        let state = ServiceState::bootstrap(ServiceConfig {
            storage: StoreConfig::Memory,
            directory: Some(directory),
        })
        .await
        .unwrap();

        TestApp {
            app: build_router(state),
            org_id,
            alice_id,
        }
    }

    async fn request(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn tender_body(org_id: Uuid, name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "description": "roadworks",
            "serviceType": "Construction",
            "organizationId": org_id,
            "creatorUsername": "alice",
        })
    }

    #[tokio::test]
    async fn ping_responds_ok() {
        let t = test_app().await;
        let (status, body) = request(&t.app, "GET", "/api/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!("ok"));
    }

    #[tokio::test]
    async fn tender_create_edit_rollback_over_rest() {
        let t = test_app().await;

        let (status, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["version"], 1);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, edited) = request(
            &t.app,
            "PATCH",
            &format!("/api/tenders/{id}/edit?username=alice"),
            Some(serde_json::json!({"name": "T2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["version"], 2);
        assert_eq!(edited["name"], "T2");

        // Empty string means "leave unchanged", not "clear".
        let (status, unchanged) = request(
            &t.app,
            "PATCH",
            &format!("/api/tenders/{id}/edit?username=alice"),
            Some(serde_json::json!({"name": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unchanged["name"], "T2");
        assert_eq!(unchanged["version"], 3);

        let (status, rolled) = request(
            &t.app,
            "PUT",
            &format!("/api/tenders/{id}/rollback/1?username=alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rolled["version"], 4);
        assert_eq!(rolled["name"], "T1");
    }

    #[tokio::test]
    async fn unknown_tender_maps_to_404_even_for_unknown_user() {
        let t = test_app().await;
        let (status, body) = request(
            &t.app,
            "PUT",
            &format!(
                "/api/tenders/{}/status?status=Published&username=nobody",
                Uuid::new_v4()
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["reason"].is_string());
    }

    #[tokio::test]
    async fn unknown_user_maps_to_401() {
        let t = test_app().await;
        let (_, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = request(
            &t.app,
            "PUT",
            &format!("/api/tenders/{id}/status?status=Published&username=nobody"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_status_value_maps_to_400() {
        let t = test_app().await;
        let (_, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = request(
            &t.app,
            "PUT",
            &format!("/api/tenders/{id}/status?status=Vanished&username=alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_authored_bid_maps_to_400() {
        let t = test_app().await;
        let (_, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        let tender_id = created["id"].as_str().unwrap();

        let (status, _) = request(
            &t.app,
            "POST",
            "/api/bids/new",
            Some(serde_json::json!({
                "name": "B1",
                "description": "offer",
                "tenderId": tender_id,
                "authorType": "User",
                "authorId": t.alice_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn public_listing_only_returns_published_tenders() {
        let t = test_app().await;
        let (_, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (_, listed) = request(&t.app, "GET", "/api/tenders", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 0);

        request(
            &t.app,
            "PUT",
            &format!("/api/tenders/{id}/status?status=Published&username=alice"),
            None,
        )
        .await;

        let (_, listed) = request(&t.app, "GET", "/api/tenders", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (_, mine) = request(&t.app, "GET", "/api/tenders/my?username=alice", None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pagination_past_the_end_returns_an_empty_list() {
        let t = test_app().await;
        let (status, listed) = request(
            &t.app,
            "GET",
            "/api/tenders?offset=1000&limit=5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, serde_json::json!([]));
    }

    #[tokio::test]
    async fn bid_flow_over_rest() {
        let t = test_app().await;
        let (_, created) = request(
            &t.app,
            "POST",
            "/api/tenders/new",
            Some(tender_body(t.org_id, "T1")),
        )
        .await;
        let tender_id = created["id"].as_str().unwrap().to_string();

        let (status, bid) = request(
            &t.app,
            "POST",
            "/api/bids/new",
            Some(serde_json::json!({
                "name": "B1",
                "description": "offer",
                "tenderId": tender_id,
                "authorType": "Organization",
                "authorId": t.alice_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bid["version"], 1);
        let bid_id = bid["id"].as_str().unwrap().to_string();

        let (status, decided) = request(
            &t.app,
            "PUT",
            &format!("/api/bids/{bid_id}/submit_decision?decision=Approved&username=alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decided["decision"], "Approved");
        assert_eq!(decided["version"], 2);

        let (status, after_feedback) = request(
            &t.app,
            "PUT",
            &format!("/api/bids/{bid_id}/feedback?bidFeedback=well+done&username=alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after_feedback["version"], 2);

        let (status, reviews) = request(
            &t.app,
            "GET",
            &format!(
                "/api/bids/{tender_id}/reviews?authorUsername=alice&requesterUsername=alice"
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reviews.as_array().unwrap().len(), 1);

        let (status, rolled) = request(
            &t.app,
            "PUT",
            &format!("/api/bids/{bid_id}/rollback/1?username=alice"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rolled["version"], 3);
        assert_eq!(rolled["decision"], "None");
    }
}
