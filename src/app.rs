//! Application bootstrap shared by the server binary, the CLI and tests.

use anyhow::Context;
use axum::Router;
use lectern_db::Database;
use lectern_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{self, Services};

/// A fully wired application: store, modules and services.
pub struct App {
    settings: Settings,
    db: Database,
    registry: ModuleRegistry,
    services: Services,
}

impl App {
    /// Open the configured store, then build and start every module.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let db = open_database(&settings).await?;
        let app = Self::build(settings, db).await?;
        app.start().await?;
        Ok(app)
    }

    /// Register modules, apply pending migrations and initialize modules.
    ///
    /// Modules are not started; call [`App::start`] for that.
    pub async fn build(settings: Settings, db: Database) -> anyhow::Result<Self> {
        let services = Services::new(&db);

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &services);

        let applied = registry.run_migrations(&db).await?;
        tracing::info!(applied, modules = registry.module_count(), "migrations complete");

        let app = Self {
            settings,
            db,
            registry,
            services,
        };
        app.registry.init_modules(&app.ctx()).await?;

        Ok(app)
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.registry.start_modules(&self.ctx()).await
    }

    pub fn router(&self) -> Router {
        lectern_http::build_router(&self.registry, &self.settings)
    }

    /// Serve HTTP until a shutdown signal, then stop modules and close the store.
    pub async fn serve(self) -> anyhow::Result<()> {
        let served = lectern_http::start_server(self.router(), &self.settings).await;
        self.shutdown().await?;
        served
    }

    /// Stop modules in reverse order, then close the store.
    ///
    /// Every write is committed when its request returns, so skipping this
    /// loses no data.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.registry.stop_modules().await?;
        self.db.close().await;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.db,
        }
    }
}

/// The SQLite file at `database.data_path` if set, else a private in-memory store.
pub async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    match &settings.database.data_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening sqlite database");
            Database::open(path, settings.database.max_connections)
                .await
                .with_context(|| format!("failed to open database at {}", path.display()))
        }
        None => {
            tracing::warn!("no database.data_path configured; data will not survive restarts");
            Database::in_memory()
                .await
                .context("failed to open in-memory database")
        }
    }
}
