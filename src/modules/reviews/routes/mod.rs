use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lectern_http::{
    auth::CurrentActor,
    error::AppError,
    extract::{ApiJson, ApiQuery},
    pagination::{PageParams, Paginated},
};
use serde::Serialize;

use super::models::{CreateReview, ReviewResponse, UpdateReview, UserReview};
use super::service::ReviewService;

type Reviews = State<Arc<ReviewService>>;

/// `{"success": true, "data": ...}` body used by the review endpoints.
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    data: T,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            count: None,
            data,
        })
    }
}

#[derive(Serialize)]
struct Empty {}

pub fn router(reviews: Arc<ReviewService>) -> Router {
    Router::new()
        .route("/", post(create_review))
        .route("/book/{book_id}", get(list_for_book))
        .route("/user", get(list_for_user))
        .route(
            "/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/{id}/like", post(toggle_like))
        .with_state(reviews)
}

async fn list_for_book(
    State(reviews): Reviews,
    Path(book_id): Path<String>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> Result<Json<Paginated<ReviewResponse>>, AppError> {
    reviews.list_for_book(&book_id, page.into()).await.map(Json)
}

async fn list_for_user(
    State(reviews): Reviews,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Envelope<Vec<UserReview>>>, AppError> {
    let listed = reviews.list_for_user(&actor.id).await?;
    Ok(Json(Envelope {
        success: true,
        count: Some(listed.len()),
        data: listed,
    }))
}

async fn get_review(
    State(reviews): Reviews,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ReviewResponse>>, AppError> {
    reviews.get_review(&id).await.map(Envelope::ok)
}

async fn create_review(
    State(reviews): Reviews,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<CreateReview>,
) -> Result<(StatusCode, Json<Envelope<ReviewResponse>>), AppError> {
    let review = reviews.create_review(&actor.id, input).await?;
    Ok((StatusCode::CREATED, Envelope::ok(review)))
}

async fn update_review(
    State(reviews): Reviews,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateReview>,
) -> Result<Json<Envelope<ReviewResponse>>, AppError> {
    reviews
        .update_review(&id, &actor, input)
        .await
        .map(Envelope::ok)
}

async fn delete_review(
    State(reviews): Reviews,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Empty>>, AppError> {
    reviews.delete_review(&id, &actor).await?;
    Ok(Envelope::ok(Empty {}))
}

async fn toggle_like(
    State(reviews): Reviews,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ReviewResponse>>, AppError> {
    reviews.toggle_like(&id, &actor.id).await.map(Envelope::ok)
}
