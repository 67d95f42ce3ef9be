//! Send path: delivery, queueing, rate limiting, hooks and lifecycle

use std::io;
use std::sync::Arc;
use std::time::Duration;

use faultline_client::{ClientError, ReportClient, SendOutcome};
use faultline_core::domain::{AttributeValue, Attributes, Report, SubmissionResult};
use faultline_core::ports::{DeliveryOutcome, IOfflineStore};
use faultline_transport::RateLimiter;

use crate::common::{
    builder_for, client_for, in_memory_store, MockDelivery, Recorder, TokenDelivery, OBJECT_ID,
};

/// Sends one report of every kind: message, error, message report, error report.
async fn send_every_kind(client: &ReportClient) -> Vec<SendOutcome> {
    let error = io::Error::new(io::ErrorKind::Other, "disk full");
    vec![
        client.send_message("test message").await,
        client.send_error(&error).await,
        client
            .send(Report::from_message("report message", Attributes::new()), None)
            .await,
        client
            .send(Report::from_error(&error, Attributes::new()), None)
            .await,
    ]
}

#[tokio::test]
async fn test_valid_token_delivers_every_report_kind() {
    let (_pool, store) = in_memory_store().await;
    let (client, recorder) = client_for(Arc::new(TokenDelivery::new("token", "token")), store.clone());

    let outcomes = send_every_kind(&client).await;

    assert!(outcomes.iter().all(SendOutcome::is_delivered));
    let responses = recorder.responses();
    assert_eq!(responses.len(), 4);
    assert!(responses
        .iter()
        .all(|r| r.object.as_deref() == Some(OBJECT_ID)));
    assert!(recorder.errors().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_queues_every_report_kind() {
    let (_pool, store) = in_memory_store().await;
    let (client, recorder) =
        client_for(Arc::new(TokenDelivery::new("token", "wrong")), store.clone());

    let outcomes = send_every_kind(&client).await;

    assert!(outcomes.iter().all(SendOutcome::is_queued));
    assert!(recorder.responses().is_empty());
    let errors = recorder.errors();
    assert_eq!(errors.len(), 4);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ClientError::TransientNetworkFailure(_))));
    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_rate_limit_drops_excess_reports_without_network() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting());
    let client = builder_for(delivery.clone(), store.clone())
        .rate_limiter(Arc::new(RateLimiter::new(2, Duration::from_secs(60))))
        .build()
        .unwrap();
    let recorder = Recorder::attach(client.hooks());

    assert!(client.send_message("one").await.is_delivered());
    assert!(client.send_message("two").await.is_delivered());
    let third = client.send_message("three").await;

    assert!(matches!(
        third,
        SendOutcome::Rejected(ClientError::RateLimited { .. })
    ));
    assert_eq!(delivery.calls(), 2);
    assert_eq!(recorder.limit_hits(), 1);
    assert_eq!(recorder.responses().len(), 2);
    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ClientError::RateLimited { .. }));
    // rate limited reports are dropped, not queued
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_server_rejection_is_not_queued() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::new(DeliveryOutcome::ServerRejected(
        "invalid token".into(),
    )));
    let (client, recorder) = client_for(delivery, store.clone());

    let outcome = client.send_message("refused").await;

    assert_eq!(
        outcome,
        SendOutcome::Rejected(ClientError::ServerRejected("invalid token".into()))
    );
    assert_eq!(recorder.errors().len(), 1);
    assert!(recorder.responses().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_attribute_precedence_client_report_call() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting());
    let client = builder_for(delivery.clone(), store)
        .attribute("level", "client")
        .attribute("service", "billing")
        .build()
        .unwrap();

    let report = Report::from_message("layered", Attributes::new())
        .with_attribute("level", "report")
        .with_attribute("request", 42);
    let mut call = Attributes::new();
    call.insert("level".into(), "call".into());

    assert!(client.send(report, Some(&call)).await.is_delivered());

    let payloads = delivery.payloads();
    let payload = &payloads[0];
    assert_eq!(payload.attributes.get("level"), Some(&AttributeValue::from("call")));
    assert_eq!(
        payload.attributes.get("service"),
        Some(&AttributeValue::from("billing"))
    );
    assert_eq!(payload.attributes.get("request"), Some(&AttributeValue::Integer(42)));
    assert_eq!(
        payload.attributes.get("system.os"),
        Some(&AttributeValue::from(std::env::consts::OS))
    );
}

#[tokio::test]
async fn test_before_send_changes_what_is_sent() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting());
    let (client, _recorder) = client_for(delivery.clone(), store);

    client.hooks().set_before_send(|payload| {
        payload.message = Some("[redacted]".into());
        payload
            .attributes
            .insert("scrubbed".into(), AttributeValue::from(true));
    });

    client.send_message("password=hunter2").await;

    assert_eq!(delivery.messages(), vec!["[redacted]"]);
    assert_eq!(
        delivery.payloads()[0].attributes.get("scrubbed"),
        Some(&AttributeValue::Bool(true))
    );
}

#[tokio::test]
async fn test_replacing_hook_keeps_only_the_latest() {
    let (_pool, store) = in_memory_store().await;
    let (client, first) = client_for(Arc::new(MockDelivery::accepting()), store);
    let second = Recorder::attach(client.hooks());

    client.send_message("hello").await;

    assert!(first.responses().is_empty());
    assert_eq!(second.responses(), vec![SubmissionResult::ok(OBJECT_ID)]);
}

#[tokio::test]
async fn test_send_error_carries_exception_details() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting());
    let (client, _recorder) = client_for(delivery.clone(), store);

    let error = io::Error::new(io::ErrorKind::NotFound, "config missing");
    client.send_error(&error).await;

    let payloads = delivery.payloads();
    let payload = &payloads[0];
    assert_eq!(payload.exceptions.len(), 1);
    assert_eq!(payload.exceptions[0].message, "config missing");
    assert_eq!(payload.classifiers.len(), 1);
    assert!(payload.classifiers[0].contains("io"));
    assert!(payload.calling_context.file.ends_with("test_send.rs"));
}

#[tokio::test]
async fn test_submission_timeout_queues_report() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting().with_delay(Duration::from_secs(30)));
    let client = builder_for(delivery, store.clone())
        .submit_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let recorder = Recorder::attach(client.hooks());

    let outcome = client.send_message("slow endpoint").await;

    assert!(outcome.is_queued());
    match &recorder.errors()[..] {
        [ClientError::TransientNetworkFailure(reason)] => assert!(reason.contains("timed out")),
        other => panic!("expected one transient failure, got {other:?}"),
    }
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_dropped_send_future_still_settles() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting().with_delay(Duration::from_millis(100)));
    let (client, recorder) = client_for(delivery, store);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), client.send_message("fire and forget"))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(recorder.responses().len(), 1);
}

#[tokio::test]
async fn test_shutdown_moves_in_flight_report_to_queue() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting().with_delay(Duration::from_secs(30)));
    let (client, recorder) = client_for(delivery, store.clone());

    let sender = client.clone();
    let in_flight = tokio::spawn(async move { sender.send_message("interrupted").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    client.shutdown().await;

    let outcome = in_flight.await.unwrap();
    assert!(outcome.is_queued(), "got {outcome:?}");
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(recorder.errors().len(), 1);
    assert!(recorder.responses().is_empty());
}

#[tokio::test]
async fn test_send_after_shutdown_is_rejected() {
    let (_pool, store) = in_memory_store().await;
    let delivery = Arc::new(MockDelivery::accepting());
    let (client, recorder) = client_for(delivery.clone(), store);

    client.shutdown().await;
    // idempotent
    client.shutdown().await;

    assert_eq!(
        client.send_message("too late").await,
        SendOutcome::Rejected(ClientError::ClientShutdown)
    );
    assert_eq!(client.flush().await, Err(ClientError::ClientShutdown));
    assert_eq!(delivery.calls(), 0);
    assert_eq!(recorder.errors(), vec![ClientError::ClientShutdown]);
}
