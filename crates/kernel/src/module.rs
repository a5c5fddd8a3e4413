use async_trait::async_trait;
use axum::Router;
use lectern_db::Database;

/// What a module sees during init and start: configuration and the store.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub db: &'a Database,
}

/// A keyed schema change. Applied once per store, tracked as `"{module}:{id}"`.
///
/// `up` holds the SQL statements creating the tables, constraints and
/// indexes the module relies on. They run in one transaction.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static [&'static str],
}

/// A self-contained feature area: its routes, API docs, tables and
/// lifecycle hooks.
///
/// Lifecycle: migrations, then `init` for every module, then `start` for
/// every module. `stop` runs in reverse registration order.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name; also the mount point `/api/{name}`.
    fn name(&self) -> &'static str;

    /// Runs after migrations, before any module starts.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes relative to `/api/{name}`, with their state already applied.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` relative to the mount point and
    /// optional `components.schemas`.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Migrations in the order they must run.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Runs once every module is initialized.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs during shutdown, before the store is persisted.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
