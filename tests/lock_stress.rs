use amorph_refine::runtime::lock::{LockManager, LockSet};
use amorph_refine::runtime::node::{IterationId, NodeId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const NODES: u64 = 64;

fn nid(raw: u64) -> NodeId {
    NodeId::new(raw).unwrap()
}

#[test]
#[serial]
fn no_node_is_ever_owned_twice() {
    let locks = LockManager::new();
    // holder[i] mirrors the owner of node i + 1; 0 means free.
    let holder: Vec<AtomicU64> = (0..NODES).map(|_| AtomicU64::new(0)).collect();
    let violations = AtomicUsize::new(0);
    let commits = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for t in 0..8u64 {
            let (locks, holder, violations, commits) = (&locks, &holder, &violations, &commits);
            s.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(t);
                for round in 0..2_000u64 {
                    let id = IterationId::new(t * 1_000_000 + round + 1);
                    let mut set = LockSet::new(id);
                    let want = rng.gen_range(1..6);
                    let picks = rand::seq::index::sample(&mut rng, NODES as usize, want);
                    let mut ok = true;
                    for raw in picks.iter() {
                        let node = nid(raw as u64 + 1);
                        if !locks.try_acquire(node, &mut set) {
                            ok = false;
                            break;
                        }
                        if holder[raw]
                            .compare_exchange(0, id.get(), Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                        {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    if ok {
                        commits.fetch_add(1, Ordering::Relaxed);
                    }
                    for node in set.held() {
                        holder[(node.get() - 1) as usize].store(0, Ordering::SeqCst);
                    }
                    locks.release(&mut set);
                    assert!(set.is_empty());
                }
            });
        }
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(commits.load(Ordering::Relaxed) > 0);
    assert_eq!(locks.owned_count(), 0);
}

#[test]
fn reacquire_is_idempotent_and_release_is_total() {
    let locks = LockManager::new();
    let mut a = LockSet::new(IterationId::new(1));
    let mut b = LockSet::new(IterationId::new(2));
    for raw in 1..=4 {
        assert!(locks.try_acquire(nid(raw), &mut a));
        assert!(locks.try_acquire(nid(raw), &mut a));
    }
    assert_eq!(a.len(), 4);
    assert!(!locks.try_acquire(nid(2), &mut b));
    assert!(b.is_empty());
    locks.release(&mut a);
    assert!(locks.try_acquire(nid(2), &mut b));
    assert_eq!(locks.owner_of(nid(2)), Some(IterationId::new(2)));
}
