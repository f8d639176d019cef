//! Post feed aggregation.
//!
//! `store` owns the SQL, `service` composes pages and single-post views with
//! batched interaction counts, `dto` is the JSON surface.

pub mod dto;
pub mod service;
pub mod store;

pub use dto::{PaginatedPostsResponse, PostResponse};
pub use service::{PageRequest, PostService};
pub use store::{PostStore, SqlitePostStore, StoreError};
