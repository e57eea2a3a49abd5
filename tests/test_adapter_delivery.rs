//! Adapter delivery routing tests
//!
//! Conversion failures, sink rejections, and send timeouts are per-message:
//! they reach the error sink (or the fault counter) and never stop the
//! container or leak into the downstream sink.


use inflow::message::headers;
use inflow::testing::mocks::{
    FailingConverter, MockClientFactory, RecordingSink, RejectingSink, StallingSink,
};
use inflow::{AdapterBuilder, ContainerConfig, ContainerState, ListenerContainer, QosLevel};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::topic;

fn wired(factory: &Arc<MockClientFactory>) -> AdapterBuilder {
    AdapterBuilder::new()
        .client_id("delivery")
        .broker_url("tcp://localhost:1883")
        .topic(topic("events", 1))
        .recovery_interval(Duration::from_millis(10))
        .client_factory(factory.clone())
}

#[tokio::test]
async fn test_good_and_bad_payloads_route_without_crosstalk() {
    let factory = Arc::new(MockClientFactory::new());
    let sink = Arc::new(RecordingSink::new());
    let errors = Arc::new(RecordingSink::new());
    let adapter = wired(&factory)
        .converter(Arc::new(FailingConverter::failing_on("bad")))
        .sink(sink.clone())
        .error_sink(errors.clone())
        .build()
        .unwrap();

    adapter.start().await.unwrap();

    factory
        .push_frame("events", "ok", QosLevel::AtLeastOnce)
        .await
        .unwrap();
    factory
        .push_frame("events", "bad", QosLevel::AtLeastOnce)
        .await
        .unwrap();
    factory
        .push_frame("events", "ok", QosLevel::AtLeastOnce)
        .await
        .unwrap();

    assert!(sink.wait_for(2, Duration::from_millis(500)).await);
    assert!(errors.wait_for(1, Duration::from_millis(500)).await);

    let delivered = sink.messages();
    assert_eq!(delivered.len(), 2);
    assert!(delivered
        .iter()
        .all(|message| message.payload().as_ref() == b"ok"));

    let faults = errors.messages();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].payload().as_ref(), b"bad");
    assert_eq!(
        faults[0].header(headers::FAULT_KIND).and_then(Value::as_str),
        Some("conversion")
    );

    // routed faults are not counted as dropped
    assert_eq!(adapter.fault_count(), 0);

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_conversion_failure_without_error_sink_counts_fault() {
    let factory = Arc::new(MockClientFactory::new());
    let sink = Arc::new(RecordingSink::new());
    let adapter = wired(&factory)
        .converter(Arc::new(FailingConverter::failing_on("bad")))
        .sink(sink.clone())
        .build()
        .unwrap();

    adapter.start().await.unwrap();
    factory
        .push_frame("events", "bad", QosLevel::AtLeastOnce)
        .await
        .unwrap();
    factory
        .push_frame("events", "ok", QosLevel::AtLeastOnce)
        .await
        .unwrap();

    // the bad payload is dropped and counted; the container keeps going
    assert!(sink.wait_for(1, Duration::from_millis(500)).await);
    assert_eq!(adapter.fault_count(), 1);
    assert_eq!(sink.messages()[0].payload().as_ref(), b"ok");
    assert_eq!(adapter.container().state(), ContainerState::Running);

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_rejected_delivery_routes_to_error_sink() {
    let factory = Arc::new(MockClientFactory::new());
    let errors = Arc::new(RecordingSink::new());
    let adapter = wired(&factory)
        .sink(Arc::new(RejectingSink::new("queue full")))
        .error_sink(errors.clone())
        .build()
        .unwrap();

    adapter.start().await.unwrap();
    factory
        .push_frame("events", "payload", QosLevel::AtLeastOnce)
        .await
        .unwrap();

    assert!(errors.wait_for(1, Duration::from_millis(500)).await);
    let fault = &errors.messages()[0];
    assert_eq!(
        fault.header(headers::FAULT_KIND).and_then(Value::as_str),
        Some("delivery-rejected")
    );
    assert!(fault
        .header(headers::FAULT_REASON)
        .and_then(Value::as_str)
        .unwrap()
        .contains("queue full"));

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_delivery_timeout_routes_to_error_sink() {
    let factory = Arc::new(MockClientFactory::new());
    let errors = Arc::new(RecordingSink::new());
    let adapter = wired(&factory)
        .sink(Arc::new(StallingSink))
        .send_timeout(Duration::from_millis(30))
        .error_sink(errors.clone())
        .build()
        .unwrap();

    adapter.start().await.unwrap();
    factory
        .push_frame("events", "slow", QosLevel::AtLeastOnce)
        .await
        .unwrap();

    assert!(errors.wait_for(1, Duration::from_secs(1)).await);
    assert_eq!(
        errors.messages()[0]
            .header(headers::FAULT_KIND)
            .and_then(Value::as_str),
        Some("delivery-timeout")
    );

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_single_topic_delivery_order_preserved() {
    let factory = Arc::new(MockClientFactory::new());
    let sink = Arc::new(RecordingSink::new());
    let adapter = wired(&factory).sink(sink.clone()).build().unwrap();

    adapter.start().await.unwrap();
    for i in 0..5 {
        factory
            .push_frame("events", format!("m{i}"), QosLevel::AtLeastOnce)
            .await
            .unwrap();
    }

    assert!(sink.wait_for(5, Duration::from_secs(1)).await);
    let payloads: Vec<_> = sink
        .messages()
        .iter()
        .map(|message| String::from_utf8_lossy(message.payload()).to_string())
        .collect();
    assert_eq!(payloads, vec!["m0", "m1", "m2", "m3", "m4"]);

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_shared_container_survives_nonowning_stop() {
    let factory = Arc::new(MockClientFactory::new());
    let container = Arc::new(
        ListenerContainer::new(
            ContainerConfig::new("shared", "tcp://localhost:1883")
                .with_recovery_interval(Duration::from_millis(10))
                .with_shared(true),
            vec![topic("events", 1)],
            factory.clone(),
        )
        .unwrap(),
    );

    let first_sink = Arc::new(RecordingSink::new());
    let second_sink = Arc::new(RecordingSink::new());
    let first = AdapterBuilder::new()
        .client_id("first")
        .container(container.clone())
        .sink(first_sink.clone())
        .build()
        .unwrap();
    let second = AdapterBuilder::new()
        .client_id("second")
        .container(container.clone())
        .sink(second_sink.clone())
        .build()
        .unwrap();

    assert!(!first.owns_container());
    assert!(!second.owns_container());

    first.start().await.unwrap();
    second.start().await.unwrap();

    factory
        .push_frame("events", "both", QosLevel::AtLeastOnce)
        .await
        .unwrap();
    assert!(first_sink.wait_for(1, Duration::from_millis(500)).await);
    assert!(second_sink.wait_for(1, Duration::from_millis(500)).await);

    // a non-owning stop deregisters only its own callback
    second.stop().await.unwrap();
    assert_eq!(container.state(), ContainerState::Running);

    factory
        .push_frame("events", "only-first", QosLevel::AtLeastOnce)
        .await
        .unwrap();
    assert!(first_sink.wait_for(2, Duration::from_millis(500)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(second_sink.count(), 1);

    first.stop().await.unwrap();
    assert_eq!(container.state(), ContainerState::Running);

    container.stop().await.unwrap();
}
