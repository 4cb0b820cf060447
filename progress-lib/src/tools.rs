use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if another thread panicked while
/// holding it. Everything guarded in this crate is plain data, so the
/// value is still usable and the host call path must never panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Round `value` to `decimals` places and return it as a scaled integer,
/// e.g. `round_scaled(440.04, 1) == 4400`.
pub(crate) fn round_scaled(value: f64, decimals: i32) -> i64 {
    (value * 10_f64.powi(decimals)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_scaled_rounds_half_away_from_zero() {
        assert_eq!(round_scaled(440.04, 1), 4400);
        assert_eq!(round_scaled(440.06, 1), 4401);
        assert_eq!(round_scaled(0.404, 2), 40);
        assert_eq!(round_scaled(-1.25, 1), -13);
    }

    #[test]
    fn lock_recovers_poisoned_mutex() {
        let mutex = std::sync::Arc::new(Mutex::new(7_u32));
        let clone = mutex.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*lock(&mutex), 7);
    }
}
