#![forbid(unsafe_code)]

use rangefeed_events::EventBus;
use rangefeed_net::NetOptions;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Configuration for a loader session.
///
/// Immutable once the session is constructed.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Source resource URL.
    pub url: Url,
    /// Full codec string, used both for the host support probe and the
    /// append buffer attachment.
    pub mime_codec: String,
    /// Byte count per segment. Must be positive.
    pub segment_length: u64,
    /// Network configuration.
    pub net: NetOptions,
    /// Cancellation token for graceful shutdown.
    pub cancel: Option<CancellationToken>,
    /// Event bus the session republishes witnessed signals on (optional -
    /// if not provided, the session creates a private one).
    pub events: Option<EventBus>,
}

impl LoaderConfig {
    /// Create a new config with the mandatory fields.
    pub fn new(url: Url, mime_codec: impl Into<String>, segment_length: u64) -> Self {
        Self {
            url,
            mime_codec: mime_codec.into(),
            segment_length,
            net: NetOptions::default(),
            cancel: None,
            events: None,
        }
    }

    /// Set network options.
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Set cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the event bus for subscribing to witnessed lifecycle signals.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> Url {
        Url::parse("http://example.com/video.mp4").unwrap()
    }

    #[test]
    fn test_loader_config_new() {
        let config = LoaderConfig::new(test_url(), "video/mp4; codecs=\"avc1.42E01E\"", 1000);

        assert_eq!(config.url.as_str(), "http://example.com/video.mp4");
        assert_eq!(config.segment_length, 1000);
        assert!(config.cancel.is_none());
        assert!(config.events.is_none());
    }

    #[test]
    fn test_with_cancel() {
        let cancel = CancellationToken::new();
        let config = LoaderConfig::new(test_url(), "video/mp4", 1000).with_cancel(cancel.clone());

        assert!(config.cancel.is_some());
    }

    #[test]
    fn test_with_events() {
        let bus = EventBus::new(16);
        let config = LoaderConfig::new(test_url(), "video/mp4", 1000).with_events(bus);

        assert!(config.events.is_some());
    }

    #[test]
    fn test_builder_chain() {
        let config = LoaderConfig::new(test_url(), "video/mp4", 1000)
            .with_net(NetOptions::default())
            .with_cancel(CancellationToken::new())
            .with_events(EventBus::new(16));

        assert!(config.cancel.is_some());
        assert!(config.events.is_some());
    }

    #[test]
    fn test_clone() {
        let config = LoaderConfig::new(test_url(), "video/mp4", 1000);
        let cloned = config.clone();

        assert_eq!(cloned.mime_codec, config.mime_codec);
        assert_eq!(cloned.segment_length, config.segment_length);
    }
}
