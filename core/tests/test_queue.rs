#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use framecrypt_core::pipeline::{BlockingQueue, PopTimeoutError, TryPushError};

    #[test]
    fn fifo_order_single_thread() {
        let q = BlockingQueue::new();
        for i in 0..10 {
            q.push(i).unwrap();
        }
        let out: Vec<i32> = std::iter::from_fn(|| q.try_pop()).collect();
        assert_eq!(out, (0..10).collect::<Vec<_>>());
        assert!(q.is_empty());
    }

    #[test]
    fn concurrent_pushers_then_concurrent_poppers() {
        const PUSHERS: usize = 8;
        const PER: usize = 500;
        let q = Arc::new(BlockingQueue::new());

        let handles: Vec<_> = (0..PUSHERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER {
                        q.push(p * PER + i).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), PUSHERS * PER);
        q.close();

        let poppers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(v) = q.pop() {
                        got.push(v);
                    }
                    got
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for h in poppers {
            for v in h.join().unwrap() {
                assert!(seen.insert(v), "item {v} popped twice");
                total += 1;
            }
        }
        assert_eq!(total, PUSHERS * PER);
        assert!(q.is_drained());
    }

    #[test]
    fn per_producer_order_is_preserved() {
        let q = Arc::new(BlockingQueue::new());
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..1000u64 {
                        q.push((p, i)).unwrap();
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }

        let mut last = [None::<u64>; 4];
        while let Some((p, i)) = q.try_pop() {
            if let Some(prev) = last[p as usize] {
                assert!(i > prev);
            }
            last[p as usize] = Some(i);
        }
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(BlockingQueue::new());
        let q2 = Arc::clone(&q);
        let popper = thread::spawn(move || q2.pop());

        thread::sleep(Duration::from_millis(20));
        q.push(7u32).unwrap();
        assert_eq!(popper.join().unwrap(), Some(7));
    }

    #[test]
    fn close_wakes_blocked_poppers() {
        let q: Arc<BlockingQueue<u8>> = Arc::new(BlockingQueue::new());
        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || q.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        q.close();
        for h in poppers {
            assert_eq!(h.join().unwrap(), None);
        }
    }

    #[test]
    fn closed_queue_refuses_push_and_hands_item_back() {
        let q = BlockingQueue::new();
        q.push(1).unwrap();
        q.close();

        let err = q.push(2).unwrap_err();
        assert_eq!(err.0, 2);
        assert!(matches!(q.try_push(3), Err(TryPushError::Closed(3))));

        // Already queued items stay poppable.
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn pop_timeout_reports_timeout_and_closed() {
        let q: BlockingQueue<u8> = BlockingQueue::new();
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(10)), Err(PopTimeoutError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(10));

        q.push(5).unwrap();
        assert_eq!(q.pop_timeout(Duration::from_millis(10)), Ok(5));

        q.close();
        assert_eq!(q.pop_timeout(Duration::from_secs(5)), Err(PopTimeoutError::Closed));
    }

    #[test]
    fn try_pop_never_blocks() {
        let q: BlockingQueue<u8> = BlockingQueue::new();
        let start = Instant::now();
        assert!(q.try_pop().is_none());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn bounded_try_push_reports_full() {
        let q = BlockingQueue::bounded(2);
        assert_eq!(q.capacity(), Some(2));
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();

        let err = q.try_push(3).unwrap_err();
        assert!(matches!(err, TryPushError::Full(_)));
        assert_eq!(err.into_inner(), 3);
    }

    #[test]
    fn bounded_push_blocks_until_space() {
        let q = Arc::new(BlockingQueue::bounded(1));
        q.push(0u32).unwrap();

        let pushed = Arc::new(AtomicBool::new(false));
        let pusher = {
            let q = Arc::clone(&q);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                q.push(1).unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!pushed.load(Ordering::SeqCst), "push must wait while full");

        assert_eq!(q.pop(), Some(0));
        pusher.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(q.pop(), Some(1));
    }

    #[test]
    fn close_releases_blocked_pusher() {
        let q = Arc::new(BlockingQueue::bounded(1));
        q.push(0u32).unwrap();

        let pusher = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push(1).map_err(|e| e.0))
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(pusher.join().unwrap(), Err(1));
    }

    #[test]
    fn zero_capacity_is_treated_as_one() {
        let q = BlockingQueue::bounded(0);
        assert_eq!(q.capacity(), Some(1));
        q.try_push(1u8).unwrap();
        assert!(matches!(q.try_push(2), Err(TryPushError::Full(2))));
    }
}
