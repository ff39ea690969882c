//! Bounded fan-out for stages that call rate-limited collaborators.

/// Apply `f` to every item, at most `width` at a time, preserving input order.
///
/// `width <= 1` runs inline on the calling thread. A panicking worker yields
/// `on_panic(item)` for its slot instead of tearing down the batch.
pub(crate) fn bounded_map<T, R, F, P>(items: &[T], width: usize, f: F, on_panic: P) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    P: Fn(&T) -> R,
{
    if width <= 1 {
        return items.iter().map(&f).collect();
    }
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(width) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk.iter().map(|item| scope.spawn(|| f(item))).collect();
            for (handle, item) in handles.into_iter().zip(chunk) {
                out.push(handle.join().unwrap_or_else(|_| on_panic(item)));
            }
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn preserves_order() {
        let items: Vec<u32> = (0..10).collect();
        let out = bounded_map(&items, 4, |n| n * 2, |_| 0);
        assert_eq!(out, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_width() {
        let live = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<u32> = (0..9).collect();
        bounded_map(
            &items,
            3,
            |_| {
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                live.fetch_sub(1, Ordering::SeqCst);
            },
            |_| (),
        );
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
