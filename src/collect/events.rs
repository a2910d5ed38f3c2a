//! Recent-event collection
//!
//! Keeps events whose last-seen timestamp falls inside the recency window, so
//! the report surfaces clusters that were actively churning when scanned.
//! Events with no timestamp cannot be placed in the window and are dropped.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Event;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

use super::{ClusterRecord, CollectError, Collector, CollectorKind, EventSummary};

/// Lists events across all namespaces and filters them to a recency window
pub struct EventCollector {
    window: Duration,
}

impl EventCollector {
    pub fn new(window_hours: i64) -> Self {
        Self {
            window: Duration::hours(window_hours.max(0)),
        }
    }
}

#[async_trait]
impl Collector for EventCollector {
    fn kind(&self) -> CollectorKind {
        CollectorKind::Events
    }

    async fn collect(
        &self,
        client: &Client,
        record: &mut ClusterRecord,
    ) -> Result<(), CollectError> {
        let api: Api<Event> = Api::all(client.clone());
        let list = api.list(&ListParams::default()).await?;

        record.events = recent_events(&list.items, Utc::now(), self.window);
        debug!(
            "Cluster '{}' reported {} events within the window",
            record.name,
            record.events.len()
        );
        Ok(())
    }
}

/// Filter to events last seen within the window ending at `now`, in a stable
/// order (namespace, then name)
fn recent_events(items: &[Event], now: DateTime<Utc>, window: Duration) -> Vec<EventSummary> {
    let cutoff = now - window;
    let mut events: Vec<EventSummary> = items
        .iter()
        .filter_map(|event| {
            let last_seen = event.last_timestamp.as_ref().map(|t| t.0)?;
            if last_seen < cutoff {
                return None;
            }
            Some(EventSummary {
                name: event.metadata.name.clone().unwrap_or_default(),
                namespace: event.metadata.namespace.clone().unwrap_or_default(),
                reason: event.reason.clone(),
                last_seen: Some(last_seen),
            })
        })
        .collect();
    events.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn event(name: &str, namespace: &str, last_seen: Option<DateTime<Utc>>) -> Event {
        Event {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            reason: Some("Started".to_string()),
            last_timestamp: last_seen.map(Time),
            ..Default::default()
        }
    }

    #[test]
    fn test_events_outside_window_are_dropped() {
        let now = Utc::now();
        let items = vec![
            event("fresh", "ns1", Some(now - Duration::hours(1))),
            event("stale", "ns1", Some(now - Duration::hours(48))),
        ];

        let kept = recent_events(&items, now, Duration::hours(24));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "fresh");
        assert_eq!(kept[0].reason.as_deref(), Some("Started"));
    }

    #[test]
    fn test_events_without_timestamp_are_dropped() {
        let now = Utc::now();
        let items = vec![event("timeless", "ns1", None)];

        assert!(recent_events(&items, now, Duration::hours(24)).is_empty());
    }

    #[test]
    fn test_events_sort_by_namespace_then_name() {
        let now = Utc::now();
        let ts = Some(now - Duration::minutes(5));
        let items = vec![
            event("b", "ns2", ts),
            event("a", "ns2", ts),
            event("z", "ns1", ts),
        ];

        let kept = recent_events(&items, now, Duration::hours(24));
        let order: Vec<(&str, &str)> = kept
            .iter()
            .map(|e| (e.namespace.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(order, vec![("ns1", "z"), ("ns2", "a"), ("ns2", "b")]);
    }
}
