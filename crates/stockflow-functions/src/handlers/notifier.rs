//! Low-stock notifier, driven by the inventory table's change stream

use serde_json::Value;

use crate::adapters::AlertPublisher;
use crate::low_stock::{StreamEvent, evaluate};

/// Publish one alert per qualifying record and return how many were sent
///
/// Records that fail to evaluate or publish are logged and skipped.
pub async fn handle_stream(event: &Value, publisher: Option<&dyn AlertPublisher>) -> usize {
    let Some(publisher) = publisher else {
        tracing::error!("SNS_TOPIC_ARN is not set; no notifications will be sent");
        return 0;
    };

    let event: StreamEvent = match serde_json::from_value(event.clone()) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Could not parse change-stream event: {}", e);
            return 0;
        }
    };

    let mut sent = 0;
    for record in &event.records {
        let alert = match evaluate(record) {
            Ok(Some(alert)) => alert,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Failed to process change record: {} ({:?})", e, record);
                continue;
            }
        };

        match publisher.publish(&alert.subject(), &alert.message()).await {
            Ok(()) => {
                tracing::info!("Low-stock alert sent for {} at {}", alert.item, alert.store);
                sent += 1;
            }
            Err(e) => tracing::error!("Failed to publish alert for {} at {}: {}", alert.item, alert.store, e),
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::FakePublisher;
    use serde_json::json;

    fn change(event_name: &str, store: &str, item: &str, count: &str) -> Value {
        json!({
            "eventName": event_name,
            "dynamodb": {
                "NewImage": {
                    "Store": {"S": store},
                    "Item": {"S": item},
                    "Count": {"N": count}
                }
            }
        })
    }

    #[tokio::test]
    async fn test_one_alert_per_low_record() {
        let publisher = FakePublisher::default();
        let event = json!({"Records": [
            change("INSERT", "StoreA", "Widget", "4"),
            change("MODIFY", "StoreA", "Gadget", "5"),
            change("REMOVE", "StoreA", "Sprocket", "0"),
            change("MODIFY", "StoreB", "Bolt", "0"),
            {"eventName": "INSERT", "dynamodb": {}},
        ]});

        let sent = handle_stream(&event, Some(&publisher)).await;

        assert_eq!(sent, 2);
        let subjects: Vec<String> = publisher.sent.lock().unwrap().iter().map(|(s, _)| s.clone()).collect();
        assert_eq!(
            subjects,
            vec!["Low stock alert: Widget at StoreA", "Low stock alert: Bolt at StoreB"]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let publisher = FakePublisher {
            fail_on: Some("Widget".to_string()),
            ..Default::default()
        };
        let event = json!({"Records": [
            change("INSERT", "StoreA", "Widget", "1"),
            change("INSERT", "StoreA", "Nut", "many"),
            change("INSERT", "StoreA", "Gadget", "2"),
        ]});

        assert_eq!(handle_stream(&event, Some(&publisher)).await, 1);
    }

    #[tokio::test]
    async fn test_missing_topic_sends_nothing() {
        let event = json!({"Records": [change("INSERT", "StoreA", "Widget", "1")]});
        assert_eq!(handle_stream(&event, None).await, 0);
    }

    #[tokio::test]
    async fn test_unparseable_event_sends_nothing() {
        let publisher = FakePublisher::default();
        assert_eq!(handle_stream(&json!({"Records": "nope"}), Some(&publisher)).await, 0);
    }
}
