//! Builder wiring tests
//!
//! Verifies that built adapters expose exactly what they were constructed
//! with: topics in listed order with their QoS levels, send timeout,
//! lifecycle flags, and converter/sink wiring.


use inflow::testing::mocks::{MockClientFactory, RecordingSink};
use inflow::{AdapterBuilder, DefaultMessageConverter, QosLevel, TopicSubscription};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::topic;

fn factory() -> Arc<MockClientFactory> {
    Arc::new(MockClientFactory::new())
}

fn sink() -> Arc<RecordingSink> {
    Arc::new(RecordingSink::new())
}

#[test]
fn test_no_topics() {
    let adapter = AdapterBuilder::new()
        .client_id("foo")
        .broker_url("tcp://localhost:1883")
        .auto_startup(false)
        .client_factory(factory())
        .sink(sink())
        .build()
        .unwrap();

    assert_eq!(adapter.broker_url(), "tcp://localhost:1883");
    assert_eq!(adapter.client_id(), "foo");
    assert!(!adapter.auto_startup());
    assert!(adapter.topics().is_empty());
    assert_eq!(adapter.config().recovery_interval_ms, 5000);
    assert!(adapter.owns_container());
}

#[test]
fn test_one_topic() {
    let errors = Arc::new(RecordingSink::new());
    let adapter = AdapterBuilder::new()
        .client_id("foo")
        .broker_url("tcp://localhost:1883")
        .auto_startup(false)
        .phase(25)
        .topic(topic("bar", 1))
        .converter(Arc::new(DefaultMessageConverter))
        .send_timeout(Duration::from_millis(123))
        .client_factory(factory())
        .sink(sink())
        .error_sink(errors)
        .build()
        .unwrap();

    assert_eq!(adapter.client_id(), "foo");
    assert_eq!(adapter.phase(), 25);

    let topics = adapter.topics();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].to_string(), "bar, qos=1");
    assert_eq!(adapter.send_timeout(), Some(Duration::from_millis(123)));
}

#[test]
fn test_two_topics() {
    let adapter = AdapterBuilder::new()
        .client_id("foo")
        .broker_url("tcp://localhost:1883")
        .auto_startup(false)
        .phase(25)
        .topic(topic("bar", 0))
        .topic(topic("baz", 2))
        .send_timeout(Duration::from_millis(123))
        .client_factory(factory())
        .sink(sink())
        .build()
        .unwrap();

    let topics = adapter.topics();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0].to_string(), "bar, qos=0");
    assert_eq!(topics[1].to_string(), "baz, qos=2");
    assert_eq!(adapter.send_timeout(), Some(Duration::from_millis(123)));
}

#[test]
fn test_two_topics_single_qos() {
    let adapter = AdapterBuilder::new()
        .client_id("foo")
        .broker_url("tcp://localhost:1883")
        .topics_with_qos(["bar", "baz"], QosLevel::AtMostOnce)
        .unwrap()
        .client_factory(factory())
        .sink(sink())
        .build()
        .unwrap();

    let topics = adapter.topics();
    assert_eq!(topics[0].to_string(), "bar, qos=0");
    assert_eq!(topics[1].to_string(), "baz, qos=0");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_builder_preserves_topic_order_and_qos(
        entries in proptest::collection::vec(("[a-z]{1,8}/[a-z]{1,8}", 0u8..=2), 1..6)
    ) {
        let subscriptions: Vec<TopicSubscription> = entries
            .iter()
            .map(|(name, qos)| TopicSubscription::with_qos_value(name.clone(), *qos).unwrap())
            .collect();

        let adapter = AdapterBuilder::new()
            .client_id("prop")
            .broker_url("tcp://localhost:1883")
            .topics(subscriptions.clone())
            .client_factory(Arc::new(MockClientFactory::new()))
            .sink(Arc::new(RecordingSink::new()))
            .build()
            .unwrap();

        prop_assert_eq!(adapter.topics(), subscriptions);
    }
}
