//! End-to-end scenarios across the engine, recovery units and the store.

use std::sync::atomic::Ordering;
use tessera_core::{
    encode_counter, CoreError, KvRecoveryUnit, OperationContext, RecoveryUnit, WriteUnitOfWork,
};
use tessera_testkit::prelude::*;

#[test]
fn counter_bumps_coalesce_into_one_persisted_total() {
    init_tracing();
    let engine = TestEngine::new();
    engine.seed([(b"x", encode_counter(100))]);
    let counter = engine.load_counter(b"x").unwrap();
    let batches_before = engine.stats().logged_batches;

    let mut unit = engine.recovery_unit();
    unit.begin_unit_of_work();
    unit.increment_counter(b"x", &counter, 3).unwrap();
    unit.increment_counter(b"x", &counter, 2).unwrap();
    assert_eq!(unit.delta_counter(b"x"), 5);
    assert_eq!(engine.committed(b"x"), Some(encode_counter(100).to_vec()));

    unit.commit_unit_of_work().unwrap();
    unit.end_unit_of_work().unwrap();

    assert_eq!(engine.stats().logged_batches, batches_before + 1);
    assert_eq!(engine.committed(b"x"), Some(encode_counter(105).to_vec()));
    assert_eq!(counter.load(Ordering::SeqCst), 105);
    assert_eq!(engine.load_counter(b"x").unwrap().load(Ordering::SeqCst), 105);
}

#[test]
fn pending_write_is_private_until_commit() {
    init_tracing();
    let engine = TestEngine::new();
    let mut a = engine.recovery_unit();
    let mut b = engine.recovery_unit();

    a.begin_unit_of_work();
    a.put(b"k", b"v1".to_vec()).unwrap();
    assert_eq!(a.get(b"k").unwrap(), Some(b"v1".to_vec()));

    b.begin_unit_of_work();
    assert_eq!(b.get(b"k").unwrap(), None);

    a.commit_unit_of_work().unwrap();
    a.end_unit_of_work().unwrap();

    // Still inside its first unit of work, b keeps its snapshot.
    assert_eq!(b.get(b"k").unwrap(), None);
    b.end_unit_of_work().unwrap();

    b.begin_unit_of_work();
    assert_eq!(b.get(b"k").unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn abort_rolls_back_change_once_and_leaves_store() {
    init_tracing();
    let engine = TestEngine::new();
    engine.seed([(b"k", b"original")]);
    let recorder = ChangeRecorder::new();

    {
        let mut unit = engine.recovery_unit();
        unit.begin_unit_of_work();
        unit.register_change(recorder.change("c"));
        unit.put(b"k", b"changed".to_vec()).unwrap();
        unit.end_unit_of_work().unwrap();
    }

    assert_eq!(recorder.events(), vec![ChangeEvent::RolledBack("c".into())]);
    assert_eq!(engine.committed(b"k"), Some(b"original".to_vec()));
    assert_eq!(engine.memory_store().live_snapshots(), 0);
}

#[test]
fn dropping_unit_mid_work_matches_abort() {
    let engine = TestEngine::new();
    engine.seed([(b"k", b"original")]);
    let recorder = ChangeRecorder::new();

    {
        let mut unit = engine.recovery_unit();
        unit.begin_unit_of_work();
        unit.begin_unit_of_work();
        unit.register_change(recorder.change("first"));
        unit.register_change(recorder.change("second"));
        unit.delete(b"k").unwrap();
        assert_eq!(unit.get(b"k").unwrap(), None);
        assert_eq!(unit.get(b"other").unwrap(), None);
        assert_eq!(engine.memory_store().live_snapshots(), 1);
    }

    assert_eq!(recorder.rolled_back(), vec!["second", "first"]);
    assert!(recorder.committed().is_empty());
    assert_eq!(engine.committed(b"k"), Some(b"original".to_vec()));
    assert_eq!(engine.memory_store().live_snapshots(), 0);
    assert_eq!(engine.tracker().claimed_keys(), 0);
}

#[test]
fn write_unit_of_work_guard() {
    let engine = TestEngine::new();
    let recorder = ChangeRecorder::new();
    let mut unit = engine.recovery_unit();

    {
        let mut wuow = WriteUnitOfWork::new(&mut unit);
        wuow.put(b"kept", b"1".to_vec()).unwrap();
        wuow.register_change(recorder.change("kept"));
        wuow.commit().unwrap();
    }
    {
        let mut wuow = WriteUnitOfWork::new(&mut unit);
        wuow.put(b"dropped", b"2".to_vec()).unwrap();
        wuow.register_change(recorder.change("dropped"));
    }

    assert_eq!(unit.depth(), 0);
    assert_eq!(engine.committed(b"kept"), Some(b"1".to_vec()));
    assert_eq!(engine.committed(b"dropped"), None);
    assert_eq!(
        recorder.events(),
        vec![
            ChangeEvent::Committed("kept".into()),
            ChangeEvent::RolledBack("dropped".into()),
        ]
    );
}

#[test]
fn nested_guards_commit_once() {
    let engine = TestEngine::new();
    let mut unit = engine.recovery_unit();

    let mut outer = WriteUnitOfWork::new(&mut unit);
    outer.put(b"outer", b"1".to_vec()).unwrap();
    {
        let mut inner = WriteUnitOfWork::new(&mut *outer);
        inner.put(b"inner", b"2".to_vec()).unwrap();
        inner.commit().unwrap();
    }
    assert_eq!(engine.committed(b"inner"), None);
    assert_eq!(outer.pending_ops(), 2);

    outer.commit().unwrap();
    assert_eq!(engine.committed(b"outer"), Some(b"1".to_vec()));
    assert_eq!(engine.committed(b"inner"), Some(b"2".to_vec()));
    assert_eq!(engine.stats().logged_batches, 1);
}

#[test]
fn conflict_is_retryable_and_retry_succeeds() {
    let engine = TestEngine::new();
    let mut first = engine.recovery_unit();
    let mut second = engine.recovery_unit();
    first.begin_unit_of_work();
    second.begin_unit_of_work();

    first.put(b"k", b"first".to_vec()).unwrap();
    let err = second.put(b"k", b"second".to_vec()).unwrap_err();
    assert!(err.is_retryable());
    second.end_unit_of_work().unwrap();

    first.commit_unit_of_work().unwrap();
    first.end_unit_of_work().unwrap();

    second.begin_unit_of_work();
    second.put(b"k", b"second".to_vec()).unwrap();
    second.commit_unit_of_work().unwrap();
    second.end_unit_of_work().unwrap();
    assert_eq!(engine.committed(b"k"), Some(b"second".to_vec()));
}

#[test]
fn scan_sees_own_writes_over_snapshot() {
    let engine = TestEngine::new();
    engine.seed([(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

    let mut unit = engine.recovery_unit();
    unit.begin_unit_of_work();
    assert_eq!(unit.get(b"c").unwrap(), Some(b"3".to_vec()));
    unit.delete(b"a").unwrap();
    unit.put(b"bb", b"new".to_vec()).unwrap();
    engine.seed([(b"z", b"late")]);

    let keys: Vec<Vec<u8>> = unit.new_iterator().unwrap().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![b"b".to_vec(), b"bb".to_vec(), b"c".to_vec()]);
}

#[test]
fn non_durable_commit_waits_for_wal_flush() {
    let engine = TestEngine::non_durable();
    let mut unit = engine.recovery_unit();
    unit.begin_unit_of_work();
    unit.put(b"k", b"v".to_vec()).unwrap();
    unit.commit_unit_of_work().unwrap();
    unit.end_unit_of_work().unwrap();

    assert_eq!(engine.stats().unlogged_batches, 1);
    assert_eq!(engine.stats().pending_unlogged, 1);
    assert!(unit.await_commit());
    assert_eq!(engine.stats().pending_unlogged, 0);
    assert_eq!(engine.stats().wal_flushes, 1);
}

#[test]
#[should_panic(expected = "storage fault")]
fn rejected_commit_reaches_fault_handler() {
    let engine = TestEngine::new();
    let mut unit = engine.recovery_unit();
    unit.begin_unit_of_work();
    unit.put(b"k", b"v".to_vec()).unwrap();
    engine.memory_store().fail_next_write("disk full");
    let _ = unit.commit_unit_of_work();
}

#[test]
fn context_exposes_kv_unit() {
    let engine = TestEngine::new();
    let mut ctx = engine.operation_context();

    ctx.recovery_unit_mut().begin_unit_of_work();
    {
        let unit = KvRecoveryUnit::from_context(&mut ctx).unwrap();
        unit.put(b"k", b"v".to_vec()).unwrap();
    }
    ctx.recovery_unit_mut().commit_unit_of_work().unwrap();
    ctx.recovery_unit_mut().end_unit_of_work().unwrap();

    assert_eq!(engine.committed(b"k"), Some(b"v".to_vec()));
}

#[test]
fn storage_free_context_rejects_kv_access() {
    let recorder = ChangeRecorder::new();
    let mut ctx = OperationContext::without_storage();

    assert!(matches!(
        KvRecoveryUnit::from_context(&mut ctx),
        Err(CoreError::RecoveryUnitMismatch { expected: "kv", found: "noop" })
    ));

    let unit = ctx.recovery_unit_mut();
    unit.begin_unit_of_work();
    unit.register_change(recorder.change("noop"));
    unit.commit_unit_of_work().unwrap();
    unit.end_unit_of_work().unwrap();
    assert_eq!(recorder.committed(), vec!["noop"]);
}
