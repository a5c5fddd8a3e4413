pub mod aggregator;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use lectern_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use aggregator::RatingAggregator;
use service::ReviewService;

/// User reviews of catalog books, and the rating aggregates they drive.
pub struct ReviewsModule {
    reviews: Arc<ReviewService>,
    aggregator: Arc<RatingAggregator>,
}

impl ReviewsModule {
    pub fn new(reviews: Arc<ReviewService>, aggregator: Arc<RatingAggregator>) -> Self {
        Self {
            reviews,
            aggregator,
        }
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "reviews module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.reviews.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let review = json!({
            "description": "A review",
            "content": {
                "application/json": { "schema": { "$ref": "#/components/schemas/ReviewEnvelope" } }
            }
        });
        let id = json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } });
        let secured = json!([{ "bearerAuth": [] }]);
        let unauthenticated = error("Not authenticated");
        let forbidden = error("Neither the review's author nor an admin");
        let missing = error("Review not found");

        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Review a book",
                        "description": "At most one review per user and book. Updates the book's rating aggregates.",
                        "tags": ["Reviews"],
                        "security": secured,
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/CreateReview" } }
                            }
                        },
                        "responses": {
                            "201": review,
                            "401": unauthenticated,
                            "404": error("Book not found"),
                            "409": error("Already reviewed"),
                            "422": error("Validation failed")
                        }
                    }
                },
                "/book/{book_id}": {
                    "get": {
                        "summary": "List a book's reviews, newest first",
                        "tags": ["Reviews"],
                        "parameters": [
                            { "name": "book_id", "in": "path", "required": true, "schema": { "type": "string" } },
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
                        ],
                        "responses": {
                            "200": {
                                "description": "A page of reviews",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {
                                                "data": { "type": "array", "items": { "$ref": "#/components/schemas/Review" } },
                                                "count": { "type": "integer" },
                                                "currentPage": { "type": "integer" },
                                                "totalPages": { "type": "integer" },
                                                "total": { "type": "integer" },
                                                "pagination": { "type": "object" }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/user": {
                    "get": {
                        "summary": "List the caller's reviews",
                        "tags": ["Reviews"],
                        "security": secured,
                        "responses": {
                            "200": { "description": "The caller's reviews with book details" },
                            "401": unauthenticated
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a review",
                        "tags": ["Reviews"],
                        "parameters": [id],
                        "responses": { "200": review, "404": missing }
                    },
                    "put": {
                        "summary": "Edit a review",
                        "tags": ["Reviews"],
                        "security": secured,
                        "parameters": [id],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/UpdateReview" } }
                            }
                        },
                        "responses": {
                            "200": review,
                            "401": unauthenticated,
                            "403": forbidden,
                            "404": missing,
                            "422": error("Validation failed")
                        }
                    },
                    "delete": {
                        "summary": "Delete a review",
                        "tags": ["Reviews"],
                        "security": secured,
                        "parameters": [id],
                        "responses": {
                            "200": { "description": "Deleted" },
                            "401": unauthenticated,
                            "403": forbidden,
                            "404": missing
                        }
                    }
                },
                "/{id}/like": {
                    "post": {
                        "summary": "Like or unlike a review",
                        "tags": ["Reviews"],
                        "security": secured,
                        "parameters": [id],
                        "responses": { "200": review, "401": unauthenticated, "404": missing }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "book": { "type": "string" },
                            "user": { "type": "string" },
                            "rating": { "type": "integer", "minimum": models::RATING_MIN, "maximum": models::RATING_MAX },
                            "title": { "type": "string" },
                            "content": { "type": "string" },
                            "likes": { "type": "array", "items": { "type": "string" } },
                            "likeCount": { "type": "integer" },
                            "isEdited": { "type": "boolean" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        }
                    },
                    "ReviewEnvelope": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "data": { "$ref": "#/components/schemas/Review" }
                        }
                    },
                    "CreateReview": {
                        "type": "object",
                        "properties": {
                            "bookId": { "type": "string" },
                            "rating": { "type": "integer", "minimum": models::RATING_MIN, "maximum": models::RATING_MAX },
                            "title": { "type": "string", "minLength": models::TITLE_MIN, "maxLength": models::TITLE_MAX },
                            "content": { "type": "string", "minLength": models::CONTENT_MIN, "maxLength": models::CONTENT_MAX }
                        },
                        "required": ["bookId", "rating", "title", "content"]
                    },
                    "UpdateReview": {
                        "type": "object",
                        "properties": {
                            "rating": { "type": "integer", "minimum": models::RATING_MIN, "maximum": models::RATING_MAX },
                            "title": { "type": "string", "minLength": models::TITLE_MIN, "maxLength": models::TITLE_MAX },
                            "content": { "type": "string", "minLength": models::CONTENT_MIN, "maxLength": models::CONTENT_MAX }
                        }
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: repository::SCHEMA,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.catalog.repair_aggregates_on_start {
            let report = self.aggregator.recompute_all().await?;
            if !report.failed.is_empty() {
                tracing::warn!(
                    module = self.name(),
                    failed = ?report.failed,
                    "some book aggregates could not be repaired"
                );
            }
        }

        tracing::info!(module = self.name(), "reviews module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reviews module stopped");
        Ok(())
    }
}
