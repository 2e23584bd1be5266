mod cache;
mod fetcher;
mod orchestrator;
mod sort;

pub use cache::{merge_items, SnapshotCache, SnapshotKey};
pub use fetcher::{
    fetch_all, fetch_all_children, CatalogError, CatalogItem, CatalogResult, MediaFetcher,
    PageCursor,
};
pub use orchestrator::LibraryOrchestrator;
pub use sort::{apply_sort, SortDescriptor, SortKey, SortOrder};
