use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use rand::Rng;

use snapdex::core::error::{Error, ErrorKind, Result};
use snapdex::mvcc::controller::TxId;
use snapdex::reader::{ReaderFactory, SnapshotHolder};

struct CountingReader {
    as_of: TxId,
    dropped: Arc<AtomicUsize>,
}

impl Drop for CountingReader {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CountingFactory {
    built: AtomicUsize,
    dropped: Arc<AtomicUsize>,
    fail_next: AtomicBool,
}

impl CountingFactory {
    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl ReaderFactory for CountingFactory {
    type Reader = CountingReader;
    type Context = ();

    fn open(&self, as_of: TxId, _ctx: &()) -> Result<CountingReader> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Internal, "disk on fire".to_string()));
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(CountingReader {
            as_of,
            dropped: self.dropped.clone(),
        })
    }
}

fn holder() -> SnapshotHolder<CountingFactory> {
    SnapshotHolder::new(CountingFactory::default())
}

#[test]
fn test_acquire_resolves_newest_generation_at_or_below() -> Result<()> {
    let holder = holder();
    for tx in [1, 3, 5] {
        holder.publish(TxId(tx), TxId(0))?;
    }
    assert_eq!(holder.chain(), vec![TxId(5), TxId(3), TxId(1)]);

    assert_eq!(holder.acquire(TxId(4), &())?.as_of(), TxId(3));
    assert_eq!(holder.acquire(TxId(5), &())?.as_of(), TxId(5));
    assert_eq!(holder.acquire(TxId(100), &())?.reader().as_of, TxId(5));

    let err = holder.acquire(TxId(0), &()).err().unwrap();
    assert!(err.is(ErrorKind::NoSnapshotAvailable));
    Ok(())
}

#[test]
fn test_publish_rejects_non_increasing_ids() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(2), TxId(0))?;

    for tx in [1, 2] {
        let err = holder.publish(TxId(tx), TxId(0)).unwrap_err();
        assert!(err.is(ErrorKind::InvalidState));
    }
    assert_eq!(holder.chain(), vec![TxId(2)]);
    Ok(())
}

#[test]
fn test_reclamation_keeps_floor() -> Result<()> {
    let holder = holder();
    let steps = [(1, 1), (2, 1), (3, 1), (4, 3), (5, 3), (6, 6), (7, 6)];
    let expected: [&[u64]; 7] = [&[1], &[2, 1], &[3, 2, 1], &[4, 3], &[5, 4, 3], &[6], &[7, 6]];

    for ((tx, oldest), want) in steps.into_iter().zip(expected) {
        holder.publish(TxId(tx), TxId(oldest))?;
        let chain: Vec<u64> = holder.chain().into_iter().map(|t| t.0).collect();
        assert_eq!(chain, want, "after publishing {} with boundary {}", tx, oldest);
        assert!(chain.last().is_some_and(|floor| *floor <= oldest));
    }
    Ok(())
}

#[test]
fn test_removed_states_are_disposed_when_unused() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    drop(holder.acquire(TxId(1), &())?);
    let old = holder.states();

    holder.publish(TxId(2), TxId(2))?;

    assert!(old[0].is_disposal_requested());
    assert!(old[0].is_disposed());
    assert!(!old[0].is_reader_built());
    assert_eq!(holder.factory().dropped(), 1);
    Ok(())
}

#[test]
fn test_reader_is_built_lazily_once() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    assert!(!holder.states()[0].is_reader_built());
    assert_eq!(holder.factory().built(), 0);

    let handles: Vec<_> = (0..5).map(|_| holder.acquire(TxId(1), &())).collect::<Result<_>>()?;
    assert_eq!(holder.factory().built(), 1);
    assert_eq!(holder.states()[0].usage_count(), 5);

    drop(handles);
    assert_eq!(holder.states()[0].usage_count(), 0);
    assert!(!holder.states()[0].is_disposed());
    Ok(())
}

#[test]
fn test_failed_construction_rolls_back_and_retries() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    holder.factory().fail_next.store(true, Ordering::SeqCst);

    let err = holder.acquire(TxId(1), &()).err().unwrap();
    assert!(err.is(ErrorKind::ReaderConstructionFailed));
    assert!(err.context.contains("disk on fire"));

    let state = holder.states()[0].clone();
    assert_eq!(state.usage_count(), 0);
    assert!(!state.is_reader_built());

    let handle = holder.acquire(TxId(1), &())?;
    assert_eq!(handle.as_of(), TxId(1));
    assert_eq!(holder.factory().built(), 1);
    assert_eq!(state.usage_count(), 1);
    Ok(())
}

#[test]
fn test_handle_outlives_removal_from_chain() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    let handle = holder.acquire(TxId(1), &())?;

    holder.publish(TxId(2), TxId(2))?;
    assert_eq!(holder.chain(), vec![TxId(2)]);

    assert!(handle.state().is_disposal_requested());
    assert!(!handle.state().is_disposed());
    assert_eq!(handle.reader().as_of, TxId(1));
    assert_eq!(holder.factory().dropped(), 0);

    handle.release();
    assert_eq!(holder.factory().dropped(), 1);
    Ok(())
}

#[test]
fn test_concurrent_holders_dispose_after_last_release() -> Result<()> {
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    let barrier = Barrier::new(3);

    let mut handles = crossbeam::thread::scope(|s| {
        let workers: Vec<_> = (0..3)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    holder.acquire(TxId(1), &())
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Result<Vec<_>>>()
    })
    .unwrap()?;

    let state = holder.states()[0].clone();
    assert_eq!(state.usage_count(), 3);
    assert_eq!(holder.factory().built(), 1);

    holder.publish(TxId(2), TxId(2))?;
    assert!(state.is_disposal_requested());

    for remaining in (0..3).rev() {
        assert_eq!(holder.factory().dropped(), 0);
        assert!(!state.is_disposed());
        drop(handles.pop());
        assert_eq!(state.usage_count(), remaining);
    }

    assert!(state.is_disposed());
    assert_eq!(holder.factory().dropped(), 1);
    Ok(())
}

#[test]
fn test_randomized_publish_acquire_release() -> Result<()> {
    const LAST_TX: u64 = 300;
    let holder = holder();
    holder.publish(TxId(1), TxId(0))?;
    let latest = AtomicUsize::new(1);
    let finished = AtomicBool::new(false);

    crossbeam::thread::scope(|s| {
        s.spawn(|_| {
            let mut rng = rand::thread_rng();
            for tx in 2..=LAST_TX {
                let oldest = tx.saturating_sub(rng.gen_range(0..4));
                holder.publish(TxId(tx), TxId(oldest)).unwrap();
                latest.store(tx as usize, Ordering::SeqCst);

                let chain = holder.chain();
                assert!(!chain.is_empty());
                assert!(chain.windows(2).all(|w| w[0] > w[1]));
            }
            finished.store(true, Ordering::SeqCst);
        });

        for _ in 0..4 {
            s.spawn(|_| {
                let mut rng = rand::thread_rng();
                let mut held = Vec::new();
                while !finished.load(Ordering::SeqCst) {
                    let newest = latest.load(Ordering::SeqCst) as u64;
                    let tx = TxId(newest.saturating_sub(rng.gen_range(0..3)));
                    match holder.acquire(tx, &()) {
                        Ok(handle) => {
                            assert!(handle.as_of() <= tx);
                            assert_eq!(handle.reader().as_of, handle.as_of());
                            held.push(handle);
                        }
                        Err(err) => assert!(err.is(ErrorKind::NoSnapshotAvailable)),
                    }

                    for handle in &held {
                        assert!(!handle.state().is_disposed());
                    }
                    while held.len() > rng.gen_range(0..4) {
                        let victim = rng.gen_range(0..held.len());
                        held.swap_remove(victim);
                    }
                }
            });
        }
    })
    .unwrap();

    holder.publish(TxId(LAST_TX + 1), TxId(LAST_TX + 1))?;
    let factory = holder.factory();
    let newest_built = usize::from(holder.states()[0].is_reader_built());
    assert_eq!(factory.dropped(), factory.built() - newest_built);
    Ok(())
}
