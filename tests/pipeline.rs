//! End-to-end pipeline scenarios driven through the Operator against
//! in-memory clients.

use dynamo_sync::aws::client::{
    MockStreamsClient, MockTableClient, StreamSpec, StreamsClient, TableClient, TableDescription,
};
use dynamo_sync::config::{Backfill, Input, OperationPlan, Stream};
use dynamo_sync::error::SyncError;
use dynamo_sync::operations::Operator;
use dynamo_sync::shards::Shard;
use dynamo_sync::types::{Item, StreamEvent, StreamRecord, StreamViewType, TableStatus};

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn plan(backfill: Backfill, stream_disabled: bool) -> OperationPlan {
    OperationPlan {
        input: Input {
            region: "us-west-2".into(),
            table_name: "users".into(),
            role_arn: String::new(),
        },
        backfill,
        stream: Stream {
            disabled: stream_disabled,
        },
        ..OperationPlan::default()
    }
    .with_defaults()
}

fn item(key: &str) -> Item {
    Item::from([("pk".to_owned(), AttributeValue::S(key.to_owned()))])
}

fn items(prefix: &str, count: usize) -> Vec<Item> {
    (0..count)
        .map(|index| item(&format!("{prefix}-{index}")))
        .collect()
}

fn streaming_description(view_type: StreamViewType) -> TableDescription {
    TableDescription {
        table_name: "users".into(),
        status: TableStatus::Active,
        item_count: 0,
        size_bytes: 0,
        stream: Some(StreamSpec {
            enabled: true,
            view_type,
            arn: Some("arn:aws:dynamodb:us-west-2:users/stream".into()),
        }),
    }
}

fn operator(
    plan: OperationPlan,
    token: CancellationToken,
    input: Arc<MockTableClient>,
    output: Arc<MockTableClient>,
    streams: Arc<MockStreamsClient>,
) -> Arc<Operator> {
    Arc::new(Operator::with_clients(
        plan,
        token,
        Arc::clone(&input) as Arc<dyn TableClient>,
        Arc::clone(&output) as Arc<dyn TableClient>,
        streams as Arc<dyn StreamsClient>,
        input as Arc<dyn TableClient>,
        output as Arc<dyn TableClient>,
    ))
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn backfill_of_an_empty_source_completes_without_writes() {
    let input = Arc::new(MockTableClient::new());
    let output = Arc::new(MockTableClient::new());

    let operator = operator(
        plan(Backfill::default(), true),
        CancellationToken::new(),
        Arc::clone(&input),
        Arc::clone(&output),
        Arc::new(MockStreamsClient::new()),
    );

    operator.preflight().await.unwrap();
    Arc::clone(&operator).run().await.unwrap();

    assert_eq!(output.stored_len(), 0);
    assert_eq!(output.put_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn segmented_backfill_copies_every_segment() {
    let input = Arc::new(
        MockTableClient::new()
            .set_page_size(7)
            .set_segment(0, items("seg0", 20))
            .set_segment(1, items("seg1", 20))
            .set_segment(2, items("seg2", 20)),
    );
    let output = Arc::new(MockTableClient::new());

    let backfill = Backfill {
        disabled: false,
        segments: Vec::new(),
        total_segments: 3,
    };

    let operator = operator(
        plan(backfill, true),
        CancellationToken::new(),
        Arc::clone(&input),
        Arc::clone(&output),
        Arc::new(MockStreamsClient::new()),
    );

    operator.preflight().await.unwrap();
    Arc::clone(&operator).run().await.unwrap();

    assert_eq!(output.stored_len(), 60);
    for segment in 0..3 {
        for index in 0..20 {
            assert!(output.contains_key(&format!("seg{segment}-{index}")));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_segment_targets_only_scan_those_segments() {
    let input = Arc::new(
        MockTableClient::new()
            .set_segment(0, items("seg0", 10))
            .set_segment(1, items("seg1", 10))
            .set_segment(2, items("seg2", 10)),
    );
    let output = Arc::new(MockTableClient::new());

    let backfill = Backfill {
        disabled: false,
        segments: vec![0, 2],
        total_segments: 3,
    };

    let operator = operator(
        plan(backfill, true),
        CancellationToken::new(),
        Arc::clone(&input),
        Arc::clone(&output),
        Arc::new(MockStreamsClient::new()),
    );

    operator.preflight().await.unwrap();
    Arc::clone(&operator).run().await.unwrap();

    assert_eq!(output.stored_len(), 20);
    assert!(output.contains_key("seg0-0"));
    assert!(!output.contains_key("seg1-0"));
    assert!(output.contains_key("seg2-9"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_follow_replays_inserts_modifies_and_removes() {
    let created = Utc::now() - ChronoDuration::seconds(95);
    let records = vec![
        StreamRecord::new(StreamEvent::Insert, item("k1"), item("k1"), Some(created)),
        StreamRecord::new(StreamEvent::Modify, item("k1"), item("k1"), Some(created)),
        StreamRecord::new(StreamEvent::Remove, item("k1"), Item::default(), Some(created)),
    ];

    let streams = Arc::new(
        MockStreamsClient::new().set_shard(Shard::new::<&str>("shard-1", None), vec![records]),
    );

    let input = Arc::new(
        MockTableClient::new().set_description(streaming_description(StreamViewType::NewImage)),
    );
    let output = Arc::new(MockTableClient::new());
    let token = CancellationToken::new();

    let operator = operator(
        plan(
            Backfill {
                disabled: true,
                ..Backfill::default()
            },
            false,
        ),
        token.clone(),
        input,
        Arc::clone(&output),
        streams,
    );

    operator.preflight().await.unwrap();

    let runner = Arc::clone(&operator);
    let handle = tokio::spawn(async move { runner.run().await });

    // All three events applied: two puts then the delete.
    let sink = Arc::clone(&output);
    wait_for(move || sink.delete_count() == 1).await;
    token.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SyncError::Cancelled)));

    assert_eq!(output.put_count(), 2);
    assert!(!output.contains_key("k1"));
    assert_eq!(output.stored_len(), 0);

    // Write latency was taken from the records' creation time.
    let status = operator.status();
    assert!(status.stream.contains("latent"), "status: {}", status.stream);
    assert!(status.stream.contains("~1m"), "status: {}", status.stream);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_mid_backfill_reports_cancelled_and_joins_workers() {
    let input = Arc::new(MockTableClient::new().set_segment(0, items("user", 10_000)));
    let output = Arc::new(MockTableClient::new());
    let token = CancellationToken::new();

    let operator = operator(
        plan(Backfill::default(), true),
        token.clone(),
        input,
        Arc::clone(&output),
        Arc::new(MockStreamsClient::new()),
    );

    operator.preflight().await.unwrap();

    let runner = Arc::clone(&operator);
    let handle = tokio::spawn(async move { runner.run().await });

    let sink = Arc::clone(&output);
    wait_for(move || sink.stored_len() >= 1).await;
    token.cancel();

    // The join itself proves no worker leaked past the collator.
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not settle after cancellation")
        .unwrap();

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert!(output.stored_len() >= 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn parent_shards_are_drained_before_their_children() {
    let streams = Arc::new(
        MockStreamsClient::new()
            .set_shard(
                Shard::new::<&str>("s1", None),
                vec![vec![
                    StreamRecord::new(StreamEvent::Insert, item("a1"), item("a1"), None),
                    StreamRecord::new(StreamEvent::Insert, item("a2"), item("a2"), None),
                ]],
            )
            .set_shard(
                Shard::new("s2", Some("s1")),
                vec![vec![StreamRecord::new(
                    StreamEvent::Insert,
                    item("b1"),
                    item("b1"),
                    None,
                )]],
            )
            .set_shard(
                Shard::new("s3", Some("s1")),
                vec![vec![StreamRecord::new(
                    StreamEvent::Insert,
                    item("c1"),
                    item("c1"),
                    None,
                )]],
            ),
    );

    let input = Arc::new(
        MockTableClient::new()
            .set_description(streaming_description(StreamViewType::NewAndOldImages)),
    );
    let output = Arc::new(MockTableClient::new());
    let token = CancellationToken::new();

    let operator = operator(
        plan(
            Backfill {
                disabled: true,
                ..Backfill::default()
            },
            false,
        ),
        token.clone(),
        input,
        Arc::clone(&output),
        Arc::clone(&streams),
    );

    operator.preflight().await.unwrap();

    let runner = Arc::clone(&operator);
    let handle = tokio::spawn(async move { runner.run().await });

    let sink = Arc::clone(&output);
    wait_for(move || sink.put_count() == 4).await;
    token.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SyncError::Cancelled)));

    // The first dispatch cycle hands out only the parent; the children run
    // once it completes.
    let requests = streams.iterator_requests();
    assert_eq!(requests[0], "s1");
    assert_eq!(requests.len(), 3);
    assert!(requests[1..].contains(&"s2".to_owned()));
    assert!(requests[1..].contains(&"s3".to_owned()));

    for key in ["a1", "a2", "b1", "c1"] {
        assert!(output.contains_key(key));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_follow_fails_when_the_stream_has_vanished() {
    let streams = Arc::new(MockStreamsClient::new().set_describe_error("ResourceNotFoundException"));
    let input = Arc::new(
        MockTableClient::new().set_description(streaming_description(StreamViewType::NewImage)),
    );

    let operator = operator(
        plan(
            Backfill {
                disabled: true,
                ..Backfill::default()
            },
            false,
        ),
        CancellationToken::new(),
        input,
        Arc::new(MockTableClient::new()),
        streams,
    );

    operator.preflight().await.unwrap();
    let result = Arc::clone(&operator).run().await;
    assert!(matches!(result, Err(SyncError::OperationFailed)));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_follow_fails_when_the_stream_is_not_enabled() {
    use dynamo_sync::types::StreamStatus;

    let streams = Arc::new(MockStreamsClient::new().set_status(StreamStatus::Disabled));
    let input = Arc::new(
        MockTableClient::new().set_description(streaming_description(StreamViewType::NewImage)),
    );

    let operator = operator(
        plan(
            Backfill {
                disabled: true,
                ..Backfill::default()
            },
            false,
        ),
        CancellationToken::new(),
        input,
        Arc::new(MockTableClient::new()),
        streams,
    );

    operator.preflight().await.unwrap();
    let result = Arc::clone(&operator).run().await;
    assert!(matches!(result, Err(SyncError::OperationFailed)));
}

#[tokio::test(flavor = "multi_thread")]
async fn preflight_rejects_streams_without_new_images() {
    let input = Arc::new(
        MockTableClient::new().set_description(streaming_description(StreamViewType::KeysOnly)),
    );

    let operator = operator(
        plan(Backfill::default(), false),
        CancellationToken::new(),
        input,
        Arc::new(MockTableClient::new()),
        Arc::new(MockStreamsClient::new()),
    );

    let err = operator.preflight().await.unwrap_err();
    assert!(err
        .to_string()
        .contains("stream is not a correct type 'NEW_IMAGE' or 'NEW_AND_OLD_IMAGES'"));
}
