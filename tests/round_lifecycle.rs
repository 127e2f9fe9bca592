
use alloy::primitives::U256;
use chain_utils::{easy, unwinnable, Harness, LAST_HASH, MINED_TX, PARTICIPANT};
use doomsday_miner::chain::{ChainClient, SettleReceipt};
use doomsday_miner::miner::solution::solution_for;
use doomsday_miner::miner::{DifficultyParams, Round, SearchOutcome};
use std::sync::Arc;
use std::time::Duration;

fn first_winner(params: &DifficultyParams, supply: U256, elapsed: u64) -> U256 {
    let threshold = params.threshold(supply, elapsed);
    (1u64..)
        .map(U256::from)
        .find(|candidate| solution_for(PARTICIPANT, LAST_HASH, *candidate) < threshold)
        .expect("easy params always produce a winner")
}

async fn join(search: tokio::task::JoinHandle<SearchOutcome>) -> SearchOutcome {
    tokio::time::timeout(Duration::from_secs(30), search)
        .await
        .expect("search finished in time")
        .expect("search task did not panic")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_settle_event_opens_round_and_submits_first_winner() {
    let params = easy(4);
    let harness = Harness::new(params);
    harness.chain.settle_at(100);

    let launched = harness
        .monitor
        .on_new_block(100)
        .await
        .expect("block processed")
        .expect("settle event opens a round");
    assert_eq!(
        launched.round,
        Round {
            start_block: 100,
            last_hash: LAST_HASH
        }
    );
    assert_eq!(harness.state.latest_round(), 100);

    // Tip stays at the round start, so the full cooldown divisor applies.
    let expected = first_winner(&params, U256::ZERO, 0);
    match join(launched.search).await {
        SearchOutcome::Won { candidate, .. } => assert_eq!(candidate, expected),
        other => panic!("expected a win, got {other:?}"),
    }
    assert_eq!(harness.chain.submissions(), vec![expected]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_after_cooldown_uses_base_threshold() {
    let params = easy(4);
    let harness = Harness::new(params);
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(125);

    let expected = first_winner(&params, U256::ZERO, 25);
    let outcome = harness
        .engine
        .search(Round {
            start_block: 100,
            last_hash: LAST_HASH,
        })
        .await;

    assert_eq!(
        outcome,
        SearchOutcome::Won {
            candidate: expected,
            receipt: SettleReceipt::Confirmed {
                tx_hash: MINED_TX,
                block_number: Some(0),
                success: true,
            },
        }
    );
    assert_eq!(harness.chain.submissions(), vec![expected]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_newer_settle_supersedes_running_search() {
    let harness = Harness::new(unwinnable());
    harness.chain.settle_at(100);
    harness.chain.settle_at(103);

    let first = harness
        .monitor
        .on_new_block(100)
        .await
        .expect("block processed")
        .expect("round #100 opens");
    harness.monitor.on_new_block(101).await.expect("quiet block");
    let second = harness
        .monitor
        .on_new_block(103)
        .await
        .expect("block processed")
        .expect("round #103 opens");

    assert!(matches!(
        join(first.search).await,
        SearchOutcome::Superseded { .. }
    ));
    assert_eq!(harness.state.latest_round(), 103);

    harness.stop_all_searches();
    assert!(matches!(
        join(second.search).await,
        SearchOutcome::Superseded { .. }
    ));
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_every_block_refreshes_supply_and_tip() {
    let harness = Harness::new(unwinnable());
    harness.chain.set_snapshot(LAST_HASH, U256::from(42u64));
    assert!(harness.monitor.on_new_block(100).await.expect("ok").is_none());
    assert_eq!(harness.state.supply(), U256::from(42u64));
    assert_eq!(harness.state.last_hash(), LAST_HASH);

    harness.chain.set_snapshot(LAST_HASH, U256::from(43u64));
    assert!(harness.monitor.on_new_block(101).await.expect("ok").is_none());
    assert_eq!(harness.state.supply(), U256::from(43u64));
    assert_eq!(harness.state.chain_tip(), 101);
    assert_eq!(harness.state.latest_round(), 0, "no settle, no round");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_winner_is_not_submitted_once_round_is_superseded() {
    let harness = Harness::new(easy(3));
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(125);

    let state = Arc::clone(&harness.state);
    let outcome = harness
        .engine
        .search_with(
            Round {
                start_block: 100,
                last_hash: LAST_HASH,
            },
            move |evaluation| {
                if evaluation.wins() {
                    state.try_begin_round(101);
                }
            },
        )
        .await;

    assert!(
        matches!(outcome, SearchOutcome::Superseded { evaluated } if evaluated > 0),
        "unexpected outcome {outcome:?}"
    );
    assert!(harness.chain.simulations().is_empty());
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_submission_aborts_round() {
    let params = easy(4);
    let harness = Harness::new(params);
    harness
        .chain
        .fail_simulations("execution reverted: location already settled");
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(130);

    let expected = first_winner(&params, U256::ZERO, 30);
    let outcome = harness
        .engine
        .search(Round {
            start_block: 100,
            last_hash: LAST_HASH,
        })
        .await;

    match outcome {
        SearchOutcome::Aborted { candidate, reason } => {
            assert_eq!(candidate, expected);
            assert!(reason.contains("already settled"), "reason: {reason}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(harness.chain.simulations(), vec![expected]);
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_settle_reverted_on_chain_aborts_round() {
    let params = easy(4);
    let harness = Harness::new(params);
    harness.chain.revert_on_chain();
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(130);

    let expected = first_winner(&params, U256::ZERO, 30);
    let outcome = harness
        .engine
        .search(Round {
            start_block: 100,
            last_hash: LAST_HASH,
        })
        .await;

    match outcome {
        SearchOutcome::Aborted { candidate, reason } => {
            assert_eq!(candidate, expected);
            assert!(reason.contains("reverted on-chain"), "reason: {reason}");
        }
        other => panic!("a reverted settle is not a win: {other:?}"),
    }
    assert_eq!(harness.chain.submissions(), vec![expected]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_round_superseded_during_simulation_is_never_sent() {
    let params = easy(4);
    let harness = Harness::new(params);
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(130);
    harness
        .chain
        .supersede_during_simulation(&harness.state, 101);

    let expected = first_winner(&params, U256::ZERO, 30);
    let outcome = harness
        .engine
        .search(Round {
            start_block: 100,
            last_hash: LAST_HASH,
        })
        .await;

    assert!(
        matches!(outcome, SearchOutcome::Superseded { .. }),
        "unexpected outcome {outcome:?}"
    );
    assert_eq!(harness.chain.simulations(), vec![expected]);
    assert!(harness.chain.submissions().is_empty());
    assert_eq!(harness.state.latest_round(), 101);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dead_search_worker_is_reported_as_failed() {
    let harness = Harness::new(unwinnable());
    assert!(harness.state.try_begin_round(100));
    harness.state.observe_block(130);

    let outcome = harness
        .engine
        .search_with(
            Round {
                start_block: 100,
                last_hash: LAST_HASH,
            },
            |_| panic!("hasher blew up"),
        )
        .await;

    assert!(
        matches!(&outcome, SearchOutcome::Failed { reason } if reason.contains("search worker failed")),
        "unexpected outcome {outcome:?}"
    );
    assert!(harness.chain.simulations().is_empty());
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transient_log_failures_are_retried() {
    let harness = Harness::new(unwinnable());
    harness.chain.settle_at(100);
    harness.chain.fail_logs(100, 2);

    let launched = harness
        .monitor
        .on_new_block(100)
        .await
        .expect("third attempt succeeds");
    assert!(launched.is_some());
    assert_eq!(harness.state.latest_round(), 100);
    harness.stop_all_searches();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_block_is_skipped_after_retries_and_feed_continues() {
    let harness = Harness::new(unwinnable());
    harness.chain.settle_at(100);
    harness.chain.fail_logs(100, 10);
    harness.chain.settle_at(101);

    let err = harness
        .monitor
        .on_new_block(100)
        .await
        .err()
        .expect("logs never load");
    assert!(err.to_string().contains("failed after 3 attempt(s)"), "{err}");
    assert_eq!(harness.state.latest_round(), 0);

    harness.chain.set_feed(vec![100, 101]);
    let blocks = harness
        .chain
        .subscribe_new_blocks()
        .await
        .expect("scripted feed");
    harness.monitor.run(blocks).await;

    assert_eq!(harness.state.latest_round(), 101);
    assert_eq!(harness.state.chain_tip(), 101);
    harness.stop_all_searches();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_and_stale_settles_do_not_restart_round() {
    let harness = Harness::new(unwinnable());
    harness.chain.settle_at(99);
    harness.chain.settle_at(100);

    assert!(harness.monitor.on_new_block(100).await.expect("ok").is_some());
    assert!(
        harness.monitor.on_new_block(100).await.expect("ok").is_none(),
        "same settle twice must not restart"
    );
    assert!(
        harness.monitor.on_new_block(99).await.expect("ok").is_none(),
        "late delivery of an older settle must not rewind"
    );

    assert_eq!(harness.state.latest_round(), 100);
    assert_eq!(harness.state.chain_tip(), 100);
    harness.stop_all_searches();
}
