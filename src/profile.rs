use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::schemas::NewParticipant;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("profile service returned no users")]
    Empty,
}

pub trait ProfileSource: Send + Sync {
    fn fetch_profile(&self) -> BoxFuture<'_, Result<NewParticipant, ProfileError>>;
}

#[derive(Deserialize)]
struct RandomUserResponse {
    results: Vec<RandomUser>,
}

#[derive(Deserialize)]
struct RandomUser {
    name: RandomUserName,
    email: String,
}

#[derive(Deserialize)]
struct RandomUserName {
    first: String,
    last: String,
}

impl RandomUserResponse {
    fn into_profile(self) -> Result<NewParticipant, ProfileError> {
        let user = self.results.into_iter().next().ok_or(ProfileError::Empty)?;
        Ok(NewParticipant {
            display_name: format!("{} {}", user.name.first, user.name.last),
            contact_address: user.email,
        })
    }
}

/// Draws profiles from a randomuser.me compatible endpoint.
#[derive(Clone)]
pub struct RandomUserProfiles {
    client: reqwest::Client,
    endpoint: String,
}

impl RandomUserProfiles {
    pub fn new(endpoint: String) -> Self {
        RandomUserProfiles {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl ProfileSource for RandomUserProfiles {
    fn fetch_profile(&self) -> BoxFuture<'_, Result<NewParticipant, ProfileError>> {
        Box::pin(async move {
            let response: RandomUserResponse = self
                .client
                .get(&self.endpoint)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let profile = response.into_profile()?;
            tracing::debug!(name = %profile.display_name, "fetched participant profile");
            Ok(profile)
        })
    }
}
