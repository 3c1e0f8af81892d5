//! Ancillary page services: metadata, pids, links and translations.
//!
//! Each service subscribes itself to the internal after-navigation hook and
//! derives its slice of state from the page resource; none of them are on
//! the navigation critical path.

pub mod links;
pub mod meta;
pub mod pid;
pub mod translation;

pub use links::LinkRepository;
pub use meta::{MetaLink, PageMeta, PageMetaInfo};
pub use pid::{PidRepository, UNKNOWN_PID};
pub use translation::{Translation, LANGUAGE_HEADER};
