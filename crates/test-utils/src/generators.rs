//! Test data generators for creating synthetic weather-like data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates `n` values where value `i` is `offset + i`.
///
/// Every value is an exact integer, so data survives simple packing with
/// zero scale factors and can be compared bit for bit.
///
/// # Example
///
/// ```
/// use test_utils::create_sequential_values;
///
/// let values = create_sequential_values(3, 10.0);
/// assert_eq!(values, vec![10.0, 11.0, 12.0]);
/// ```
pub fn create_sequential_values(n: usize, offset: f64) -> Vec<f64> {
    (0..n).map(|i| offset + i as f64).collect()
}

/// Creates temperature-like values in Kelvin for a grid with `n` points.
///
/// The values range from approximately 250K to 310K and are not integers,
/// which makes them useful for checking IEEE round trips.
pub fn create_temperature_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let phase = i as f64 / n.max(1) as f64;
            280.0 + 30.0 * (phase * std::f64::consts::TAU).sin() + 0.125
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_values() {
        let values = create_sequential_values(4, -1.0);
        assert_eq!(values, vec![-1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_temperature_values_range() {
        let values = create_temperature_values(100);
        assert_eq!(values.len(), 100);
        assert!(values.iter().all(|v| (249.0..=311.0).contains(v)));
    }
}
