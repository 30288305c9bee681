use crate::engine::{ChannelMediaOptions, RtcEngine};
use crate::errors::QuickstartError;
use crate::settings::Credentials;

/// Builds the join request for the configured channel.
#[derive(Debug, Clone)]
pub struct ChannelJoin {
    credentials: Credentials,
    options: ChannelMediaOptions,
}

impl ChannelJoin {
    pub fn new(credentials: Credentials, options: ChannelMediaOptions) -> Self {
        Self {
            credentials,
            options,
        }
    }

    /// Ask the engine to join with uid 0. The outcome arrives as an event.
    pub fn join(&self, engine: &mut dyn RtcEngine) -> Result<(), QuickstartError> {
        tracing::info!(
            channel = %self.credentials.channel_name,
            role = ?self.options.client_role,
            profile = ?self.options.channel_profile,
            "joining channel"
        );
        engine.join_channel(
            &self.credentials.token,
            &self.credentials.channel_name,
            0,
            &self.options,
        )
    }
}
