use async_trait::async_trait;
use carpool_core::{BookingEvent, EventPublisher};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    topic,
                    key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Event delivered"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, error = %e, "Failed to deliver event");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        self.send(event.topic(), &event.key(), &payload).await?;
        Ok(())
    }
}
