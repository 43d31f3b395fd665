// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatched numbers become rows once the worker has run.

use tally_test_utils::TestHarness;
use tally_worker::{Outcome, Worker, WorkerSettings};

async fn drain(worker: &Worker) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    while let Some(outcome) = worker.process_next().await.unwrap() {
        outcomes.push(outcome);
    }
    outcomes
}

#[tokio::test]
async fn chats_and_messages_flow_through_the_queue() {
    let harness = TestHarness::new().await.unwrap();
    let worker = Worker::new(harness.sequencer.clone(), WorkerSettings::default());
    let app = harness.application("acme").await.unwrap();

    assert_eq!(harness.sequencer.create_chat(&app).await.unwrap().number, 1);
    assert_eq!(harness.sequencer.create_chat(&app).await.unwrap().number, 2);
    assert_eq!(drain(&worker).await, vec![Outcome::Done, Outcome::Done]);

    let chat = harness.sequencer.find_chat(&app.token, 1).await.unwrap();
    for body in ["first", "second", "third"] {
        harness
            .sequencer
            .create_message(&chat, Some(body))
            .await
            .unwrap();
    }
    assert_eq!(drain(&worker).await.len(), 3);

    let messages = harness.sequencer.list_messages(&chat).await.unwrap();
    let pairs: Vec<(i64, &str)> = messages.iter().map(|m| (m.number, m.body.as_str())).collect();
    assert_eq!(pairs, vec![(1, "first"), (2, "second"), (3, "third")]);

    let other = harness.sequencer.find_chat(&app.token, 2).await.unwrap();
    let issued = harness
        .sequencer
        .create_message(&other, Some("hello"))
        .await
        .unwrap();
    assert_eq!(issued.number, 1);
}

#[tokio::test]
async fn redelivered_job_does_not_duplicate_rows() {
    let harness = TestHarness::new().await.unwrap();
    let worker = Worker::new(harness.sequencer.clone(), WorkerSettings::default());
    let app = harness.application("acme").await.unwrap();
    harness.sequencer.create_chat(&app).await.unwrap();

    let item = harness.drain_queue().await.unwrap().remove(0);
    harness.sequencer.dispatcher().push(&item).await.unwrap();
    harness.sequencer.dispatcher().push(&item).await.unwrap();

    assert_eq!(drain(&worker).await, vec![Outcome::Done, Outcome::Dropped]);
    assert_eq!(harness.sequencer.list_chats(&app).await.unwrap().len(), 1);
}
