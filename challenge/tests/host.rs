mod common;

use std::{sync::Arc, thread};

use assert2::check;
use challenge::{
    ChallengeError, ChallengeId, DisputeConfig, DisputeHost, NoOracle, Outcome, Party,
    PreimageOracle, Role, SessionStatus, Verdict,
};
use common::{final_claims, fixture, Withholding, BUDGET};
use preimage_trie::SharedPreimages;

#[test]
fn host_asks_for_golden_nodes_until_the_challenge_is_registered() {
    let f = fixture(10);
    let mut host = DisputeHost::new(
        f.golden.state,
        Arc::new(SharedPreimages::new()),
        DisputeConfig::default(),
    );
    check!(host.next_missing_digest() == None);

    let mut requested = Vec::new();
    let id = loop {
        match host.initiate_challenge(f.block_number, &f.header, f.start, f.start, BUDGET) {
            Ok(id) => break id,
            Err(ChallengeError::MissingNode(digest)) => {
                check!(host.next_missing_digest() == Some(digest));
                check!(!requested.contains(&digest), "{:#x} requested twice", digest);
                requested.push(digest);

                host.supply_preimage(digest, f.golden.fetch(digest).unwrap())
                    .unwrap();
                check!(host.next_missing_digest() == None);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    };

    // The golden snapshot comes first, then its memory nodes.
    check!(requested[0] == f.golden.state);
    check!(requested.len() >= 2);
    check!(host.next_missing_digest() == None);

    let session = host.session(id).unwrap();
    check!(session.start_digest() == f.start);
    check!(session.block_number() == f.block_number);
    check!(session.status() == SessionStatus::Initiated);
}

#[test]
fn zero_step_budget_is_rejected_up_front() {
    let f = fixture(11);
    let mut host = DisputeHost::new(f.golden.state, f.shared(), DisputeConfig::default());

    let res = host.initiate_challenge(f.block_number, &f.header, f.start, f.start, 0);

    check!(res == Err(ChallengeError::InvalidStepBudget));
    check!(host.next_missing_digest() == None);
    check!(host.sessions().count() == 0);
}

#[test]
fn host_runs_registered_disputes() {
    let f = fixture(12);
    let mut host = DisputeHost::new(f.golden.state, f.shared(), DisputeConfig::default());
    let mut defender = f.honest(Role::Defender);
    let mut challenger = f.faulty(Role::Challenger, 57);
    let (assertion, counter) = final_claims(&mut defender, &mut challenger);

    let id = host
        .initiate_challenge(f.block_number, &f.header, assertion, counter, BUDGET)
        .unwrap();
    check!(host.session(id).unwrap().start_digest() == f.start);

    let outcome = host
        .run_dispute(id, &mut defender, &mut challenger, &f.golden)
        .unwrap();

    check!(matches!(
        outcome,
        Outcome::Resolved {
            step: 57,
            verdict: Verdict::DefenderWins,
            ..
        }
    ));
    check!(host.session(id).unwrap().status() == SessionStatus::Resolved(Verdict::DefenderWins));

    let unknown = ChallengeId(id.0 + 1);
    check!(
        host.run_dispute(unknown, &mut defender, &mut challenger, &f.golden)
            == Err(ChallengeError::UnknownChallenge(unknown))
    );
}

#[test]
fn host_asks_for_what_a_dispute_is_missing() {
    let f = fixture(15);
    let mut host = DisputeHost::new(f.golden.state, f.shared(), DisputeConfig::default());
    let mut defender = Withholding(f.honest(Role::Defender));
    let mut challenger = Withholding(f.faulty(Role::Challenger, 42));
    let (assertion, counter) = final_claims(&mut defender, &mut challenger);

    let id = host
        .initiate_challenge(f.block_number, &f.header, assertion, counter, BUDGET)
        .unwrap();

    let mut requested = Vec::new();
    let outcome = loop {
        match host.run_dispute(id, &mut defender, &mut challenger, &NoOracle) {
            Ok(outcome) => break outcome,
            Err(ChallengeError::MissingNode(digest)) => {
                check!(host.next_missing_digest() == Some(digest));
                check!(!requested.contains(&digest), "{:#x} requested twice", digest);
                requested.push(digest);

                let bytes = defender.0.store().get(&digest).unwrap();
                host.supply_preimage(digest, bytes).unwrap();
                check!(host.next_missing_digest() == None);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    };

    // Nobody shares the agreed pre-state, so it is the first thing asked for.
    check!(requested.first() == Some(&defender.claim_at(42).unwrap()));
    check!(matches!(
        outcome,
        Outcome::Resolved {
            step: 42,
            verdict: Verdict::DefenderWins,
            ..
        }
    ));
    check!(host.session(id).unwrap().status() == SessionStatus::Resolved(Verdict::DefenderWins));
}

#[test]
fn concurrent_sessions_share_one_cache() {
    let f = fixture(13);
    let shared = f.shared();
    let cached = shared.len();

    let cases = [
        (Role::Challenger, 5),
        (Role::Defender, 42),
        (Role::Challenger, 77),
        (Role::Defender, 99),
    ];
    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = cases
            .iter()
            .map(|&(liar, fault)| {
                let f = &f;
                let shared = Arc::clone(&shared);
                s.spawn(move || {
                    let (mut defender, mut challenger) = match liar {
                        Role::Defender => (f.faulty(Role::Defender, fault), f.honest(Role::Challenger)),
                        Role::Challenger => (f.honest(Role::Defender), f.faulty(Role::Challenger, fault)),
                    };
                    let (assertion, counter) = final_claims(&mut defender, &mut challenger);

                    let mut host = DisputeHost::new(f.golden.state, shared, DisputeConfig::default());
                    let id = host
                        .initiate_challenge(f.block_number, &f.header, assertion, counter, BUDGET)
                        .unwrap();
                    host.run_dispute(id, &mut defender, &mut challenger, &f.golden)
                        .unwrap()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ((liar, fault), outcome) in cases.iter().zip(outcomes) {
        let expected = match liar {
            Role::Defender => Verdict::ChallengerWins,
            Role::Challenger => Verdict::DefenderWins,
        };
        check!(
            matches!(outcome, Outcome::Resolved { step, verdict, .. } if step == *fault && verdict == expected),
            "{} faulty at {}: {:?}",
            liar,
            fault,
            outcome
        );
    }

    // Sessions only ever write to their own stores.
    check!(shared.len() == cached);
}

#[test]
fn peers_serve_what_they_know() {
    let f = fixture(14);
    let mut party = f.honest(Role::Defender);
    let digest = party.claim_at(30).unwrap();

    check!(challenge::Peer(&party).fetch(digest).is_some());
    check!(challenge::Peer(&party).fetch(dispute_common::keccak(b"nope")).is_none());
}
