//! HTML parsing and the synchronous extraction stages
//!
//! Listing pages go through [`SelectorResolver`], [`CandidateExtractor`] and
//! [`ArticleFilter`] in that order; article pages go through
//! [`analyze_page`]. Nothing in here performs I/O.

pub mod candidate;
pub mod content;
pub mod dom;
pub mod filter;
pub mod resolver;
pub mod sanitize;
pub mod selectors;

pub use candidate::{normalize_published_at, Candidate, CandidateError, CandidateExtractor};
pub use content::{analyze_page, ContentRules};
pub use dom::{Document, Node};
pub use filter::{ArticleFilter, FilterRules, FilterVerdict, RejectReason};
pub use resolver::{Resolution, ResolvedSelector, SelectorOrigin, SelectorResolver};
