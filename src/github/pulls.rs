use serde::Deserialize;

use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::types::{PrState, PrStatus};

#[derive(Debug, Deserialize)]
struct RawPull {
    state: String,
    #[serde(default)]
    merged: bool,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: Option<RawReviewer>,
    state: String,
}

#[derive(Debug, Deserialize)]
struct RawReviewer {
    login: String,
}

/// Current state of a pull request plus whether `viewer` has approved it.
///
/// Reviews are only consulted while the PR is open.
pub async fn fetch_pr_status<T: Transport>(
    api: &GitHubApi<T>,
    pull_url: &str,
    viewer: &str,
) -> Result<PrStatus, FetchError> {
    let pull: RawPull = api.get_json(pull_url).await?;
    let state = PrState::from_rest(&pull.state, pull.merged);

    let approved = if state == PrState::Open {
        let url = format!("{}/reviews?per_page=100", pull_url.trim_end_matches('/'));
        let reviews: Vec<RawReview> = api.get_json(&url).await?;
        reviews.iter().any(|r| {
            r.state == "APPROVED" && r.user.as_ref().is_some_and(|u| u.login == viewer)
        })
    } else {
        false
    };

    Ok(PrStatus { state, approved })
}
