//! Governance and epoch boundaries across the cluster.

use vireo_core::{PollResponse, SubmitResponse};
use vireo_simulation::{Cluster, ClusterConfig};
use vireo_types::test_utils::{
    test_account, test_coin, test_counter, test_governance, test_governance_account,
    test_increment, test_protocol_config, test_transfer,
};
use vireo_types::{Address, EpochId, GovernanceAction, LedgerError, SignedTransaction, ValidatorId};

fn config() -> ClusterConfig {
    ClusterConfig::new(4).with_protocol(test_protocol_config())
}

fn end_of_epoch(epoch: u64) -> SignedTransaction {
    test_governance(
        &test_governance_account(),
        GovernanceAction::EndOfEpoch {
            epoch: EpochId(epoch),
            next_protocol_version: Some(2),
        },
    )
}

#[tokio::test]
async fn test_stake_change_applies_in_next_epoch() {
    let cluster = Cluster::new(config()).unwrap();

    let add = test_governance(
        &test_governance_account(),
        GovernanceAction::AddStake {
            validator: ValidatorId(0),
            amount: 2,
        },
    );
    let add_digest = add.digest();
    assert!(matches!(
        cluster.submit(0, add).await.unwrap(),
        SubmitResponse::Pending { .. }
    ));
    cluster.submit(1, end_of_epoch(0)).await.unwrap();
    cluster.run_commit().unwrap();

    for replica in cluster.replicas() {
        let info = replica.authority.get_epoch_info();
        assert_eq!(info.epoch, EpochId(1));
        assert_eq!(info.protocol_config.protocol_version, 2);
        let committee = replica.epoch.current().committee().clone();
        assert_eq!(committee.stake_of(ValidatorId(0)), 3);
        assert_eq!(committee.total_stake(), 6);
        assert!(replica.store.epoch_snapshot(EpochId(1)).is_some());
    }
    let PollResponse::Executed(effects) = cluster.poll(0, &add_digest).unwrap() else {
        panic!("governance effects missing");
    };
    assert!(effects.is_success());
    assert_eq!(effects.epoch, EpochId(0));
}

#[tokio::test]
async fn test_cluster_keeps_working_after_epoch_change() {
    let alice = test_account(1);
    let coin = test_coin(1, alice.address(), 100);
    let counter = test_counter(2);
    let cluster =
        Cluster::new(config().with_genesis(vec![coin.clone(), counter.clone()]))
            .unwrap();

    cluster.submit(0, end_of_epoch(0)).await.unwrap();
    cluster.run_commit().unwrap();
    assert_eq!(cluster.authority(2).get_epoch_info().epoch, EpochId(1));

    let response = cluster
        .submit(1, test_transfer(&alice, &coin, Address::new([7; 32]), 40))
        .await
        .unwrap();
    assert_eq!(response.effects().unwrap().epoch, EpochId(1));
    assert_eq!(response.certificate().unwrap().epoch, EpochId(1));

    let tx = test_increment(&alice, &counter, 1, vec![]);
    cluster.submit(3, tx.clone()).await.unwrap();
    let commit = cluster.run_commit().unwrap();
    assert_eq!(commit.epoch, EpochId(1));
    for effects in cluster.effects_everywhere(&tx.digest()) {
        assert!(effects.unwrap().is_success());
    }
}

#[tokio::test]
async fn test_certificate_from_ended_epoch_is_refused() {
    let counter = test_counter(1);
    let cluster = Cluster::new(config().with_genesis(vec![counter.clone()])).unwrap();

    // Certified in epoch 0 but never sequenced there.
    cluster.consensus().set_drop_probability(1.0);
    let stale = cluster
        .submit(0, test_increment(&test_account(1), &counter, 1, vec![]))
        .await
        .unwrap();
    let stale = stale.certificate().unwrap().clone();
    cluster.consensus().set_drop_probability(0.0);

    cluster.submit(0, end_of_epoch(0)).await.unwrap();
    cluster.run_commit().unwrap();

    let err = cluster.authority(1).handle_certificate(stale.clone()).unwrap_err();
    assert_eq!(
        err,
        LedgerError::EpochEnded {
            certified: EpochId(0),
            current: EpochId(1),
        }
    );
    assert!(cluster.effects_everywhere(&stale.digest()).iter().all(Option::is_none));
}

#[tokio::test]
async fn test_rejected_withdrawal_records_failure() {
    let cluster = Cluster::new(config()).unwrap();

    let withdraw = test_governance(
        &test_governance_account(),
        GovernanceAction::WithdrawStake {
            validator: ValidatorId(3),
            amount: 5,
        },
    );
    let digest = withdraw.digest();
    cluster.submit(0, withdraw).await.unwrap();
    cluster.run_commit().unwrap();

    for effects in cluster.effects_everywhere(&digest) {
        assert!(!effects.unwrap().is_success());
    }
    assert_eq!(cluster.authority(0).get_epoch_info().epoch, EpochId(0));
}

#[tokio::test]
async fn test_governance_from_outsider_is_rejected() {
    let alice = test_account(1);
    let coin = test_coin(1, alice.address(), 100);
    let cluster = Cluster::new(config().with_genesis(vec![coin.clone()])).unwrap();

    let outsider = test_account(66);
    for action in [
        GovernanceAction::AddStake {
            validator: ValidatorId(0),
            amount: u64::MAX,
        },
        GovernanceAction::WithdrawStake {
            validator: ValidatorId(1),
            amount: 1,
        },
        GovernanceAction::EndOfEpoch {
            epoch: EpochId(0),
            next_protocol_version: None,
        },
    ] {
        let err = cluster
            .submit(0, test_governance(&outsider, action))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::UnauthorizedGovernance {
                sender: outsider.address(),
            }
        );
    }
    assert_eq!(cluster.consensus().queued(), 0);
    cluster.run_commit().unwrap();

    for replica in cluster.replicas() {
        let info = replica.authority.get_epoch_info();
        assert_eq!(info.epoch, EpochId(0));
        assert_eq!(info.committee.total_stake(), 4);
    }
    let response = cluster
        .submit(2, test_transfer(&alice, &coin, Address::new([7; 32]), 5))
        .await
        .unwrap();
    assert!(response.effects().unwrap().is_success());
}

#[tokio::test]
async fn test_governance_disabled_without_senders() {
    let cluster = Cluster::new(ClusterConfig::new(4)).unwrap();

    let err = cluster.submit(1, end_of_epoch(0)).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::UnauthorizedGovernance {
            sender: test_governance_account().address(),
        }
    );
    cluster.run_commit().unwrap();
    assert_eq!(cluster.authority(1).get_epoch_info().epoch, EpochId(0));
}

#[tokio::test]
async fn test_unfinished_spend_lock_released_at_epoch_change() {
    let alice = test_account(1);
    let coin = test_coin(1, alice.address(), 100);
    let cluster = Cluster::new(config().with_genesis(vec![coin.clone()])).unwrap();

    // Validators 1 and 2 sign a spend that never reaches a quorum.
    let stuck = test_transfer(&alice, &coin, Address::new([0xDD; 32]), 10);
    cluster.authority(1).handle_vote_request(&stuck).unwrap();
    cluster.authority(2).handle_vote_request(&stuck).unwrap();

    let retry = test_transfer(&alice, &coin, Address::new([0xEE; 32]), 20);
    assert_eq!(
        cluster.submit(0, retry.clone()).await.unwrap_err(),
        LedgerError::QuorumNotReached {
            collected: 2,
            required: 3,
        }
    );

    cluster.submit(3, end_of_epoch(0)).await.unwrap();
    cluster.run_commit().unwrap();
    for replica in cluster.replicas() {
        assert_eq!(replica.authority.locks().epoch(), EpochId(1));
        assert!(replica.authority.locks().is_empty());
    }

    let response = cluster.submit(0, retry).await.unwrap();
    let effects = response.effects().unwrap();
    assert!(effects.is_success());
    assert_eq!(effects.epoch, EpochId(1));
    for object in cluster.object_everywhere(&coin.id) {
        assert_eq!(object.unwrap().coin_value(), Some(80));
    }
}
