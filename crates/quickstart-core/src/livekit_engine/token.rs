use std::time::Duration;

use livekit_api::access_token::{AccessToken, VideoGrants};

use crate::errors::QuickstartError;

/// Lifetime of tokens minted by [`mint_dev_token`].
pub const DEV_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Mint a join token for local testing against a server whose API key and
/// secret are known. Production hosts fetch tokens from their own backend.
pub fn mint_dev_token(
    api_key: &str,
    api_secret: &str,
    channel: &str,
    identity: &str,
) -> Result<String, QuickstartError> {
    if api_key.is_empty() || api_secret.is_empty() {
        return Err(QuickstartError::Config("API key and secret are required".into()));
    }
    if channel.is_empty() || identity.is_empty() {
        return Err(QuickstartError::Config("channel and identity are required".into()));
    }

    AccessToken::with_api_key(api_key, api_secret)
        .with_identity(identity)
        .with_ttl(DEV_TOKEN_TTL)
        .with_grants(VideoGrants {
            room_join: true,
            room: channel.to_string(),
            can_publish: true,
            can_subscribe: true,
            ..Default::default()
        })
        .to_jwt()
        .map_err(|e| QuickstartError::Config(format!("failed to sign token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_is_a_jwt() {
        let token = mint_dev_token("devkey", "devsecret-devsecret-devsecret-00", "demo", "42").unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn missing_inputs_are_config_errors() {
        assert!(matches!(
            mint_dev_token("", "secret", "demo", "42"),
            Err(QuickstartError::Config(_))
        ));
        assert!(matches!(
            mint_dev_token("key", "secret", "", "42"),
            Err(QuickstartError::Config(_))
        ));
    }
}
