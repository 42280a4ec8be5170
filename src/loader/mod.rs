// The hosting API is the primary source
pub mod api;
pub use api::RemoteApiLoader;

// A local clone is the fallback when the API is unavailable
pub mod clone;
pub use clone::LocalCloneLoader;

use crate::error::LoadResult;
use crate::types::CommitRecord;

/// Trait for sources of a repository's commit history
///
/// Implementations return commits newest first, in the order the source
/// reports them, and fail as a whole: a loader never hands back a truncated
/// history.
#[async_trait::async_trait]
pub trait CommitLoader: Send + Sync {
    /// Short name used in logs and failure summaries
    fn name(&self) -> &'static str;

    /// Load the full commit history of `repo` ("owner/name")
    async fn load(&self, repo: &str) -> LoadResult<Vec<CommitRecord>>;
}
