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

use super::models::{Book, BookListQuery, CreateBook, Genre, UpdateBook};
use super::service::CatalogService;
use crate::modules::reviews::aggregator::RatingSummary;

type Catalog = State<Arc<CatalogService>>;

#[derive(Serialize)]
struct Deleted {
    message: &'static str,
}

pub fn router(catalog: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/genres", get(list_genres))
        .route("/genre/{genre}", get(list_by_genre))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/{id}/recompute", post(recompute_ratings))
        .with_state(catalog)
}

async fn list_books(
    State(catalog): Catalog,
    ApiQuery(query): ApiQuery<BookListQuery>,
) -> Result<Json<Paginated<Book>>, AppError> {
    catalog.list_books(query).await.map(Json)
}

async fn list_genres() -> Json<[Genre; 10]> {
    Json(Genre::ALL)
}

async fn list_by_genre(
    State(catalog): Catalog,
    Path(genre): Path<String>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> Result<Json<Paginated<Book>>, AppError> {
    catalog.list_by_genre(&genre, page.into()).await.map(Json)
}

async fn get_book(State(catalog): Catalog, Path(id): Path<String>) -> Result<Json<Book>, AppError> {
    catalog.get_book(&id).await.map(Json)
}

async fn create_book(
    State(catalog): Catalog,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<CreateBook>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = catalog.create_book(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(catalog): Catalog,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateBook>,
) -> Result<Json<Book>, AppError> {
    catalog.update_book(&actor, &id, input).await.map(Json)
}

async fn delete_book(
    State(catalog): Catalog,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, AppError> {
    catalog.delete_book(&actor, &id).await?;
    Ok(Json(Deleted {
        message: "Book deleted successfully",
    }))
}

async fn recompute_ratings(
    State(catalog): Catalog,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<RatingSummary>, AppError> {
    catalog.recompute_ratings(&actor, &id).await.map(Json)
}
