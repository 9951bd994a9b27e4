//! TAGE-SC-L tests: learning behavior and the prediction/update protocol.

use engine_core::units::bru::tagescl::{TageScl, TageSclModule};
use engine_core::units::bru::{BranchKind, ConditionalPredictor};

/// A heavily biased branch is learned almost immediately.
#[test]
fn learns_biased_branch() {
    let mut module = TageSclModule::new(64);
    let ip = 0x40_1000;

    let mut late_wrong = 0;
    for i in 0..500 {
        let predicted = module.predict(ip);
        if i >= 100 && !predicted {
            late_wrong += 1;
        }
        module.last_branch_result(ip, ip + 0x40, true, BranchKind::Conditional);
    }
    assert_eq!(late_wrong, 0, "always-taken branch mispredicted after warmup");
}

/// An alternating branch becomes predictable from its history.
#[test]
fn learns_alternating_branch() {
    let mut module = TageSclModule::new(64);
    let ip = 0x40_2000;

    let mut late_wrong = 0;
    for i in 0..2000 {
        let taken = i % 2 == 0;
        let predicted = module.predict(ip);
        if i >= 1000 && predicted != taken {
            late_wrong += 1;
        }
        module.last_branch_result(ip, ip + 0x40, taken, BranchKind::Conditional);
    }
    assert!(
        late_wrong < 50,
        "alternating branch should be nearly perfect after warmup ({late_wrong} wrong)"
    );
}

/// Non-conditional branches advance history without needing predictions.
#[test]
fn unconditional_branches_need_no_prediction() {
    let mut module = TageSclModule::new(64);
    module.last_branch_result(0x50_0000, 0x51_0000, true, BranchKind::DirectCall);
    module.last_branch_result(0x51_0040, 0x50_0004, true, BranchKind::Return);
    // A conditional still works afterwards.
    module.predict(0x40_0000);
    module.last_branch_result(0x40_0000, 0x40_0080, false, BranchKind::Conditional);
}

/// Each prediction's checkpoint is consumed by exactly one update.
#[test]
fn checkpoints_are_consumed() {
    let mut core = TageScl::new(16);
    core.predict(1, 0x1000);
    assert_eq!(core.in_flight(), 1);
    core.update(1, 0x1000, true, 0x1040, true);
    assert_eq!(core.in_flight(), 0);
}

/// A second update for the same sequence id is a host protocol bug.
#[test]
#[should_panic(expected = "without matching prediction")]
fn double_update_is_fatal() {
    let mut core = TageScl::new(16);
    core.predict(7, 0x1000);
    core.update(7, 0x1000, true, 0x1040, true);
    core.update(7, 0x1000, true, 0x1040, true);
}

/// Exhausting the checkpoint store is fatal, not silent.
#[test]
#[should_panic(expected = "checkpoint capacity exceeded")]
fn checkpoint_capacity_is_fatal() {
    let mut core = TageScl::new(4);
    for seq in 0..5 {
        core.predict(seq, 0x1000 + seq * 4);
    }
}

/// Predicting the same sequence id twice is a host protocol bug.
#[test]
#[should_panic(expected = "duplicate prediction")]
fn duplicate_sequence_id_is_fatal() {
    let mut core = TageScl::new(16);
    core.predict(3, 0x1000);
    core.predict(3, 0x2000);
}
