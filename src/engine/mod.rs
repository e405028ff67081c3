// engine module: owns the session state and talks to GitHub

pub mod github;
mod interface;
mod refresh;
pub mod session;

pub use github::GitHubEngine;
pub use interface::{DetailView, Engine, EngineHandle, Event, ListRow, ListView, Request};
pub use refresh::RefreshScheduler;
