// Pedantic: suppress noise for internal crate code.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod github;
pub mod grouping;
pub mod mutation;
pub mod paginate;
pub mod relay;
pub mod store;
pub mod timeline;
pub mod types;
pub mod url;
pub mod util;
pub mod window;
