pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use lectern_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use service::CatalogService;

/// The book catalog: listing, search and admin-only curation.
pub struct BooksModule {
    catalog: Arc<CatalogService>,
}

impl BooksModule {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.catalog.clone())
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
        let book = json!({
            "description": "A book",
            "content": {
                "application/json": { "schema": { "$ref": "#/components/schemas/Book" } }
            }
        });
        let page = json!({
            "description": "A page of books",
            "content": {
                "application/json": { "schema": { "$ref": "#/components/schemas/BookPage" } }
            }
        });
        let id = json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } });
        let paging = json!([
            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
        ]);
        let secured = json!([{ "bearerAuth": [] }]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            paging[0], paging[1],
                            { "name": "search", "in": "query", "schema": { "type": "string" } },
                            { "name": "genre", "in": "query", "schema": { "$ref": "#/components/schemas/Genre" } },
                            { "name": "sortBy", "in": "query", "schema": {
                                "type": "string",
                                "enum": models::SortField::ALL.map(models::SortField::wire_name)
                            } },
                            { "name": "sortOrder", "in": "query", "schema": { "type": "string", "enum": ["asc", "desc"] } }
                        ],
                        "responses": { "200": page, "422": error("Unknown genre") }
                    },
                    "post": {
                        "summary": "Add a book",
                        "tags": ["Books"],
                        "security": secured,
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/CreateBook" } }
                            }
                        },
                        "responses": {
                            "201": book,
                            "401": error("Not authenticated"),
                            "403": error("Admin role required"),
                            "409": error("ISBN already exists"),
                            "422": error("Validation failed")
                        }
                    }
                },
                "/genres": {
                    "get": {
                        "summary": "List genres",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Every supported genre",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Genre" } }
                                    }
                                }
                            }
                        }
                    }
                },
                "/genre/{genre}": {
                    "get": {
                        "summary": "List books of a genre",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "genre", "in": "path", "required": true, "schema": { "$ref": "#/components/schemas/Genre" } },
                            paging[0], paging[1]
                        ],
                        "responses": { "200": page, "422": error("Unknown genre") }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": [id],
                        "responses": { "200": book, "404": error("Book not found") }
                    },
                    "put": {
                        "summary": "Update a book",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": [id],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/CreateBook" } }
                            }
                        },
                        "responses": {
                            "200": book,
                            "403": error("Admin role required"),
                            "404": error("Book not found"),
                            "422": error("Validation failed")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book and its reviews",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": [id],
                        "responses": {
                            "200": { "description": "Deleted" },
                            "403": error("Admin role required"),
                            "404": error("Book not found")
                        }
                    }
                },
                "/{id}/recompute": {
                    "post": {
                        "summary": "Recompute a book's rating aggregates",
                        "tags": ["Books"],
                        "security": secured,
                        "parameters": [id],
                        "responses": {
                            "200": {
                                "description": "Aggregates written to the book",
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/RatingSummary" } }
                                }
                            },
                            "403": error("Admin role required"),
                            "404": error("Book not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Genre": {
                        "type": "string",
                        "enum": models::Genre::ALL
                    },
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string", "maxLength": models::TITLE_MAX },
                            "author": { "type": "string" },
                            "description": { "type": "string", "maxLength": models::DESCRIPTION_MAX },
                            "coverImage": { "type": "string" },
                            "isbn": { "type": "string" },
                            "genre": { "$ref": "#/components/schemas/Genre" },
                            "publishedYear": { "type": "integer" },
                            "averageRating": { "type": "number", "minimum": 0, "maximum": 5 },
                            "reviewCount": { "type": "integer", "minimum": 0 },
                            "addedBy": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "author", "description", "isbn", "genre", "publishedYear", "averageRating", "reviewCount"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "maxLength": models::TITLE_MAX },
                            "author": { "type": "string" },
                            "description": { "type": "string", "maxLength": models::DESCRIPTION_MAX },
                            "coverImage": { "type": "string", "format": "uri" },
                            "isbn": { "type": "string" },
                            "genre": { "$ref": "#/components/schemas/Genre" },
                            "publishedYear": { "type": "integer" }
                        },
                        "required": ["title", "author", "description", "isbn", "genre", "publishedYear"]
                    },
                    "BookPage": {
                        "type": "object",
                        "properties": {
                            "data": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } },
                            "count": { "type": "integer" },
                            "currentPage": { "type": "integer" },
                            "totalPages": { "type": "integer" },
                            "total": { "type": "integer" },
                            "pagination": { "type": "object" }
                        }
                    },
                    "RatingSummary": {
                        "type": "object",
                        "properties": {
                            "averageRating": { "type": "number" },
                            "reviewCount": { "type": "integer" }
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

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}
