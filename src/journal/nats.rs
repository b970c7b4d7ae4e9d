//! NATS journal sink
//!
//! Publishes stack events as JSON on `stack.{stack_name}.{event_type}`.

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::{JournalSink, StackEvent};
use crate::errors::{StackError, StackResult};

/// Subject root for stack events
pub const STACK_SUBJECT_ROOT: &str = "stack";

/// Configuration for the NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-network-stack".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl NatsConfig {
    /// Use `url` (comma separated list allowed) instead of the default server
    pub fn with_url(url: &str) -> Self {
        Self {
            servers: url.split(',').map(|s| s.trim().to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Journal that publishes each event to NATS
#[derive(Clone)]
pub struct NatsJournal {
    client: Client,
}

impl NatsJournal {
    /// Connect with the given configuration
    pub async fn connect(config: NatsConfig) -> StackResult<Self> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout);

        let client = async_nats::connect_with_options(config.servers.join(","), options)
            .await
            .map_err(|e| StackError::Journal(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Subject an event is published on
    pub fn subject_for(event: &StackEvent) -> String {
        format!(
            "{}.{}.{}",
            STACK_SUBJECT_ROOT,
            event.stack_name(),
            event.event_type()
        )
    }
}

#[async_trait]
impl JournalSink for NatsJournal {
    async fn record(&self, event: &StackEvent) -> StackResult<()> {
        let subject = Self::subject_for(event);
        let payload = serde_json::to_vec(event)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| StackError::Journal(e.to_string()))?;

        debug!("Published {} to subject: {}", event.event_id(), subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_subject_for_event() {
        let event = StackEvent::applied(Uuid::now_v7(), "my-network", 3);
        assert_eq!(NatsJournal::subject_for(&event), "stack.my-network.applied");
    }

    #[test]
    fn test_config_from_url_list() {
        let config = NatsConfig::with_url("nats://a:4222, nats://b:4222");
        assert_eq!(config.servers, vec!["nats://a:4222", "nats://b:4222"]);
    }
}
