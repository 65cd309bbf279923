pub mod content;
pub mod download;
pub mod link;

pub use content::{Carousel, CastMember, Content, ContentSummary, Episode, MediaType, SearchPage, Season, Trailer};
pub use download::{Download, DownloadPriority, DownloadRequest, DownloadState, QueueEntry, queue_order};
pub use link::{ExtractedLink, LinkKind, Subtitle};
