pub mod books;
pub mod reviews;

use std::sync::Arc;

use lectern_db::Database;
use lectern_kernel::ModuleRegistry;

use books::{repository::BookRepository, service::CatalogService, BooksModule};
use reviews::{
    aggregator::RatingAggregator, repository::ReviewRepository, service::ReviewService,
    ReviewsModule,
};

/// Services shared by the modules, the CLI and the seeder.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewService>,
    pub aggregator: Arc<RatingAggregator>,
}

impl Services {
    pub fn new(db: &Database) -> Self {
        let books = BookRepository::new(db.clone());
        let reviews = ReviewRepository::new(db.clone());
        let aggregator = Arc::new(RatingAggregator::new(db.clone()));

        Self {
            catalog: Arc::new(CatalogService::new(books.clone(), aggregator.clone())),
            reviews: Arc::new(ReviewService::new(reviews, books, aggregator.clone())),
            aggregator,
        }
    }
}

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, services: &Services) {
    registry.register(Arc::new(BooksModule::new(services.catalog.clone())));
    registry.register(Arc::new(ReviewsModule::new(
        services.reviews.clone(),
        services.aggregator.clone(),
    )));
}
