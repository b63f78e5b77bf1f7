use reqwest::Client;
use std::time::Duration;
use tracing::info;
use crate::error::SourceError;
use crate::plex::api::PlexHttpClient;

const PLEX_TV_BASE_URL: &str = "https://plex.tv";

const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Verify that a token is valid by making an API call
pub async fn verify_token(token: &str) -> Result<bool, SourceError> {
    verify_token_at(PLEX_TV_BASE_URL, token, VERIFY_TIMEOUT).await
}

async fn verify_token_at(base_url: &str, token: &str, timeout: Duration) -> Result<bool, SourceError> {
    let client = Client::builder().timeout(timeout).build()?;
    let url = format!("{}/api/v2/user", base_url);

    let response = client
        .get(&url)
        .header("X-Plex-Token", token)
        .header("Accept", "application/json")
        .send()
        .await?;

    Ok(response.status().is_success())
}

/// Re-point `client` at a Plex Home user
///
/// `user` matches a home user's title (case-insensitive) or numeric id.
/// The switched account token is used for watchlist calls and the server
/// access token for library calls.
pub async fn switch_to_home_user(
    client: PlexHttpClient,
    user: &str,
    pin: Option<&str>,
) -> Result<PlexHttpClient, SourceError> {
    let users = client.home_users().await?;
    let user_id = users
        .iter()
        .find(|(id, title)| id == user || title.eq_ignore_ascii_case(user))
        .map(|(id, _)| id.clone())
        .ok_or_else(|| SourceError::NotFound(format!("Plex home user '{}' not found", user)))?;

    let user_token = client.switch_home_user(&user_id, pin).await?;
    let machine_id = client.server_identity().await?;
    let server_token = client.server_access_token(&user_token, &machine_id).await?;

    info!("Plex: acting as home user '{}'", user);
    Ok(client.with_user_tokens(user_token, server_token))
}
