//! Shared-object transactions ordered by the simulated consensus.

use vireo_congestion::CongestionConfig;
use vireo_core::{PollResponse, SubmitResponse};
use vireo_simulation::{Cluster, ClusterConfig};
use vireo_types::test_utils::{test_account, test_coin, test_counter, test_increment, test_transfer};
use vireo_types::{
    Address, Certificate, ExecutionStatus, FailureReason, InputObject, Object, ObjectData,
    SignedTransaction, TransactionData, TransactionKind, Version,
};

fn counter_value(object: &Object) -> u64 {
    match object.data {
        ObjectData::Counter { value } => value,
        _ => panic!("not a counter: {object:?}"),
    }
}

fn increments(counter: &Object, senders: u8) -> Vec<SignedTransaction> {
    (1..=senders)
        .map(|seed| test_increment(&test_account(seed), counter, seed as u64, vec![]))
        .collect()
}

fn delete(counter: &Object) -> SignedTransaction {
    let sender = test_account(99);
    let data = TransactionData::new(
        sender.address(),
        TransactionKind::DeleteObject { object: counter.id },
        vec![InputObject::Shared {
            id: counter.id,
            initial_version: counter.version,
            mutable: true,
        }],
    );
    SignedTransaction::sign(data, &sender)
}

fn pending_certificate(response: SubmitResponse) -> Certificate {
    match response {
        SubmitResponse::Pending { certificate } => certificate,
        other => panic!("expected consensus path, got {other:?}"),
    }
}

async fn run_increments(seed: u64, senders: u8) -> Cluster {
    let counter = test_counter(1);
    let cluster = Cluster::new(
        ClusterConfig::new(4)
            .with_genesis(vec![counter.clone()])
            .with_seed(seed)
            .with_max_commit_size(3),
    )
    .unwrap();
    for (i, tx) in increments(&counter, senders).into_iter().enumerate() {
        cluster.submit(i % cluster.size(), tx).await.unwrap();
    }
    while cluster.consensus().queued() > 0 {
        cluster.run_commit().unwrap();
    }
    cluster
}

#[tokio::test]
async fn test_shared_transaction_goes_through_consensus() {
    let counter = test_counter(1);
    let cluster = Cluster::new(ClusterConfig::new(4).with_genesis(vec![counter.clone()])).unwrap();

    let tx = test_increment(&test_account(1), &counter, 5, vec![]);
    let digest = tx.digest();
    let response = cluster.submit(0, tx).await.unwrap();
    assert!(matches!(response, SubmitResponse::Pending { .. }));
    assert_eq!(cluster.poll(0, &digest).unwrap(), PollResponse::Pending);

    cluster.run_commit().unwrap();

    let PollResponse::Executed(effects) = cluster.poll(0, &digest).unwrap() else {
        panic!("not executed after commit");
    };
    assert!(effects.is_success());
    assert_eq!(effects.shared_inputs, vec![(counter.id, Version(1))]);
    assert_eq!(effects.lamport_version, Version(2));
    for object in cluster.object_everywhere(&counter.id) {
        assert_eq!(counter_value(&object.unwrap()), 5);
    }
}

#[tokio::test]
async fn test_replicas_agree_on_every_effect() {
    let counter = test_counter(1);
    let cluster = run_increments(7, 8).await;

    for tx in increments(&counter, 8) {
        let effects = cluster.effects_everywhere(&tx.digest());
        assert!(effects[0].is_some());
        assert!(effects.iter().all(|e| e == &effects[0]));
    }
    let objects = cluster.object_everywhere(&counter.id);
    assert!(objects.iter().all(|o| o == &objects[0]));
    let object = objects[0].clone().unwrap();
    assert_eq!(counter_value(&object), (1..=8).sum::<u64>());
    assert_eq!(object.version, Version(9));
}

#[tokio::test]
async fn test_seed_changes_order_not_outcome() {
    let counter = test_counter(1);
    let a = run_increments(1, 6).await;
    let b = run_increments(2, 6).await;

    let final_a = a.replica(0).store.get_object(&counter.id, None).unwrap();
    let final_b = b.replica(0).store.get_object(&counter.id, None).unwrap();
    assert_eq!(final_a, final_b);
    assert_eq!(a.replica(0).store.history(&counter.id).len(), 7);
}

#[tokio::test]
async fn test_same_certificate_sequenced_once() {
    let counter = test_counter(1);
    let cluster = Cluster::new(ClusterConfig::new(4).with_genesis(vec![counter.clone()])).unwrap();

    let tx = test_increment(&test_account(1), &counter, 3, vec![]);
    let certificate = pending_certificate(cluster.submit(0, tx).await.unwrap());
    // A second validator proposes the same certificate.
    cluster.authority(1).handle_certificate(certificate.clone()).unwrap();
    assert_eq!(cluster.consensus().queued(), 2);

    cluster.run_commit().unwrap();

    let object = cluster.replica(2).store.get_object(&counter.id, None).unwrap();
    assert_eq!(counter_value(&object), 3);
    assert_eq!(object.version, Version(2));
    assert_eq!(
        cluster.poll(1, &certificate.digest()).unwrap(),
        cluster.poll(0, &certificate.digest()).unwrap()
    );
}

#[tokio::test]
async fn test_resubmitting_executed_transaction_returns_effects() {
    let counter = test_counter(1);
    let cluster = Cluster::new(ClusterConfig::new(4).with_genesis(vec![counter.clone()])).unwrap();

    let tx = test_increment(&test_account(1), &counter, 3, vec![]);
    cluster.submit(0, tx.clone()).await.unwrap();
    cluster.run_commit().unwrap();

    let response = cluster.submit(3, tx.clone()).await.unwrap();
    let SubmitResponse::Executed {
        certificate: None,
        effects,
    } = response
    else {
        panic!("expected stored effects, got {response:?}");
    };
    assert_eq!(Some(effects), cluster.replica(0).store.get_effects(&tx.digest()));
    assert_eq!(cluster.consensus().queued(), 0);
}

#[tokio::test]
async fn test_deleted_shared_object_fails_later_reader() {
    let counter = test_counter(1);
    let cluster = Cluster::new(ClusterConfig::new(4).with_genesis(vec![counter.clone()])).unwrap();

    cluster.submit(0, delete(&counter)).await.unwrap();
    // Certify an increment but keep it out of the first commit.
    cluster.consensus().set_drop_probability(1.0);
    let increment = pending_certificate(
        cluster
            .submit(1, test_increment(&test_account(1), &counter, 1, vec![]))
            .await
            .unwrap(),
    );
    cluster.consensus().set_drop_probability(0.0);
    cluster.run_commit().unwrap();
    assert!(cluster.replica(0).store.get_object(&counter.id, None).is_none());

    cluster.authority(1).handle_certificate(increment.clone()).unwrap();
    cluster.run_commit().unwrap();

    for effects in cluster.effects_everywhere(&increment.digest()) {
        let effects = effects.unwrap();
        assert_eq!(
            effects.status,
            ExecutionStatus::Failure(FailureReason::ObjectNotFound(counter.id))
        );
        assert_eq!(effects.shared_inputs, vec![(counter.id, Version(2))]);
    }
}

#[tokio::test]
async fn test_dropped_proposal_can_be_resubmitted() {
    let counter = test_counter(1);
    let cluster = Cluster::new(
        ClusterConfig::new(4)
            .with_genesis(vec![counter.clone()])
            .with_drop_probability(1.0),
    )
    .unwrap();

    let tx = test_increment(&test_account(1), &counter, 2, vec![]);
    let digest = tx.digest();
    let certificate = pending_certificate(cluster.submit(0, tx).await.unwrap());
    cluster.run_commits(3).unwrap();
    assert_eq!(cluster.consensus().dropped(), 1);
    assert_eq!(cluster.poll(0, &digest).unwrap(), PollResponse::Pending);

    cluster.consensus().set_drop_probability(0.0);
    cluster.authority(2).handle_certificate(certificate).unwrap();
    cluster.run_commit().unwrap();

    assert!(matches!(cluster.poll(0, &digest).unwrap(), PollResponse::Executed(_)));
    assert!(matches!(cluster.poll(2, &digest).unwrap(), PollResponse::Executed(_)));
}

#[tokio::test]
async fn test_congested_object_spreads_over_commits() {
    let counter = test_counter(1);
    let cluster = Cluster::new(
        ClusterConfig::new(4)
            .with_genesis(vec![counter.clone()])
            .with_congestion(CongestionConfig::with_max_transactions(2)),
    )
    .unwrap();

    let txs = increments(&counter, 4);
    for tx in &txs {
        cluster.submit(0, tx.clone()).await.unwrap();
    }

    cluster.run_commit().unwrap();
    let executed = txs
        .iter()
        .filter(|tx| cluster.replica(0).store.is_executed(&tx.digest()))
        .count();
    assert_eq!(executed, 2);
    assert_eq!(
        cluster.replica(0).store.get_object(&counter.id, None).unwrap().version,
        Version(3)
    );

    // An empty commit runs the deferred certificates first.
    cluster.run_commit().unwrap();
    let object = cluster.replica(3).store.get_object(&counter.id, None).unwrap();
    assert_eq!(counter_value(&object), 1 + 2 + 3 + 4);
    assert_eq!(object.version, Version(5));
    for tx in &txs {
        assert!(cluster.effects_everywhere(&tx.digest()).iter().all(Option::is_some));
    }
}

#[tokio::test]
async fn test_coin_spendable_after_congestion_cancellation() {
    let alice = test_account(1);
    let coin = test_coin(1, alice.address(), 100);
    let counter = test_counter(2);
    let cluster = Cluster::new(
        ClusterConfig::new(4)
            .with_genesis(vec![coin.clone(), counter.clone()])
            .with_congestion(CongestionConfig::with_max_transactions(1).with_max_deferral_rounds(0)),
    )
    .unwrap();

    let owned = InputObject::Owned {
        id: coin.id,
        expected_version: coin.version,
    };
    let with_coin = test_increment(&alice, &counter, 1, vec![owned]);
    // The counter admits one certificate per commit, taken in digest order.
    let blocker = (2..=40)
        .map(|seed| test_increment(&test_account(seed), &counter, 1, vec![]))
        .find(|tx| tx.digest() < with_coin.digest())
        .expect("an increment sorting first");
    cluster.submit(0, with_coin.clone()).await.unwrap();
    cluster.submit(1, blocker).await.unwrap();
    cluster.run_commit().unwrap();

    for effects in cluster.effects_everywhere(&with_coin.digest()) {
        assert!(matches!(
            effects.unwrap().status,
            ExecutionStatus::Failure(FailureReason::CancelledByCongestion { .. })
        ));
    }
    for replica in cluster.replicas() {
        assert!(replica.authority.locks().is_empty());
    }
    let coin_now = cluster.authority(0).get_object(&coin.id, None).unwrap();
    assert_eq!(coin_now.version, Version(2));
    assert_eq!(coin_now.coin_value(), Some(100));

    let response = cluster
        .submit(2, test_transfer(&alice, &coin_now, Address::new([7; 32]), 30))
        .await
        .unwrap();
    assert!(response.effects().unwrap().is_success());
    for object in cluster.object_everywhere(&coin.id) {
        assert_eq!(object.unwrap().coin_value(), Some(70));
    }
}
