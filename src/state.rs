use std::sync::Arc;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::feed::PostService;
use crate::recommend::Recommender;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub posts: Arc<PostService>,
    pub recommender: Arc<dyn Recommender>,
    pub started_at: Instant,
}
