pub mod sort;
pub mod results;
pub mod retriever;
pub mod paged;
pub mod read_operation;
pub mod intersect;
pub mod more_like_this;

pub use more_like_this::{InterestingTerm, MoreLikeThisRequest};
pub use paged::QueryResults;
pub use read_operation::ReadOperation;
pub use results::{QueryOutcome, SearchHit};
pub use retriever::{Candidate, DocumentRetriever, ResultRetriever, Retrieved};
pub use sort::{SortField, SortKind};
