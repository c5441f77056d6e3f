//! Synthetic reading generator, for exercising an appliance without hardware.

use crate::storage::{self, Pool};
use anyhow::Result;
use rand::Rng;

/// Write `count` synthetic samples for a device. With `leak`, the final
/// quarter of the run ramps toward leak-level concentrations so the
/// pipeline has something to alert on.
pub fn generate(pool: &Pool, device_id: &str, count: usize, leak: bool) -> Result<usize> {
    let mut rng = rand::thread_rng();
    let ramp_start = count - count / 4;

    for i in 0..count {
        let base = if leak && i >= ramp_start {
            // climb from ambient toward ~700 ppm over the ramp
            let progress = (i - ramp_start) as f64 / (count - ramp_start).max(1) as f64;
            100.0 + 600.0 * progress
        } else {
            100.0
        };

        let value = (base + rng.gen_range(-5.0..5.0)).max(0.0);
        let raw_signal = value * 4.0 + rng.gen_range(-10.0..10.0);
        storage::save_reading(pool, device_id, value, Some(raw_signal))?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::open_pool;

    #[test]
    fn test_generate_counts_and_ramp() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path().join("sim.db").to_str().unwrap()).unwrap();

        let written = generate(&pool, "sim-01", 100, true).unwrap();
        assert_eq!(written, 100);

        let window = storage::recent_window(&pool, Some("sim-01"), 100).unwrap();
        assert_eq!(window.len(), 100);
        // the tail of a leak run sits well above ambient
        assert!(window.last().unwrap().value > 400.0);
        assert!(window.first().unwrap().value < 200.0);
    }
}
