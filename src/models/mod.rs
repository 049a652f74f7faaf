pub mod booking;
pub mod driver;
pub mod names;
pub mod passenger;

use std::time::Duration;

use rand::Rng;

pub(crate) fn bounded_delay(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::bounded_delay;

    #[test]
    fn zero_bound_yields_zero_delay() {
        assert_eq!(bounded_delay(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn delay_never_exceeds_bound() {
        let bound = Duration::from_millis(25);
        for _ in 0..200 {
            assert!(bounded_delay(bound) <= bound);
        }
    }
}
