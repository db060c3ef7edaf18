//! GRIB2 data unpacking algorithms.
//!
//! Implements the packing methods needed to recover a flat values array:
//! - Simple packing (template 5.0)
//! - IEEE floating point (template 5.4)
//!
//! Points masked out by a bitmap decode to `f64::NAN`.

use crate::Grib2Error;

/// Unpack simple packed GRIB2 data into `out`.
///
/// Simple packing formula: value = (reference_value + packed_value * 2^binary_scale) * 10^(-decimal_scale)
#[allow(clippy::too_many_arguments)]
pub fn unpack_simple(
    packed_data: &[u8],
    out: &mut [f64],
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<(), Grib2Error> {
    let reference = reference_value as f64;
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));
    let bits_per_value = bits_per_value as usize;
    let mut bit_position = 0;

    for (i, slot) in out.iter_mut().enumerate() {
        if !bitmap_has_value(bitmap, i) {
            *slot = f64::NAN;
            continue;
        }

        if bits_per_value == 0 {
            // All values are the reference value
            *slot = reference * decimal_scale;
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value)
            .map_err(|e| Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e)))?;
        bit_position += bits_per_value;

        *slot = (reference + packed_value as f64 * binary_scale) * decimal_scale;
    }

    Ok(())
}

/// Unpack IEEE floating point GRIB2 data into `out`.
///
/// `precision` follows Code Table 5.7: 1 = 32-bit, 2 = 64-bit.
pub fn unpack_ieee(
    packed_data: &[u8],
    out: &mut [f64],
    precision: u8,
    bitmap: Option<&[u8]>,
) -> Result<(), Grib2Error> {
    let width = match precision {
        1 => 4,
        2 => 8,
        other => {
            return Err(Grib2Error::UnpackingError(format!(
                "Unsupported IEEE precision {}",
                other
            )))
        }
    };

    let mut chunks = packed_data.chunks_exact(width);
    for (i, slot) in out.iter_mut().enumerate() {
        if !bitmap_has_value(bitmap, i) {
            *slot = f64::NAN;
            continue;
        }

        let chunk = chunks
            .next()
            .ok_or_else(|| Grib2Error::UnpackingError("Not enough IEEE data".to_string()))?;
        *slot = match width {
            4 => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
            _ => f64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]),
        };
    }

    Ok(())
}

/// Bitmap: 1 bit per data point, 1 = value present, 0 = missing
fn bitmap_has_value(bitmap: Option<&[u8]>, i: usize) -> bool {
    match bitmap {
        Some(bm) => {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8);
            byte_idx >= bm.len() || (bm[byte_idx] >> bit_idx) & 1 == 1
        }
        None => true,
    }
}

/// Extract bits from a byte array
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8); // MSB first

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        // Test with simple byte: 0b10110101
        let data = vec![0b10110101];

        // Extract first 2 bits (should be 0b10 = 2)
        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);

        // Extract bits 2-4 (should be 0b11 = 3)
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);

        // Extract all 8 bits
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);

        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let packed = vec![100, 200];
        let mut values = vec![0.0; 2];
        unpack_simple(&packed, &mut values, 8, 0.0, 0, 0, None).unwrap();
        assert_eq!(values, vec![100.0, 200.0]);
    }

    #[test]
    fn test_simple_unpacking_with_scales() {
        // (1 + 3 * 2^1) * 10^-1 = 0.7
        let packed = vec![3];
        let mut values = vec![0.0; 1];
        unpack_simple(&packed, &mut values, 8, 1.0, 1, 1, None).unwrap();
        assert!((values[0] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_constant_field() {
        let mut values = vec![0.0; 3];
        unpack_simple(&[], &mut values, 0, 288.5, 0, 0, None).unwrap();
        assert_eq!(values, vec![288.5; 3]);
    }

    #[test]
    fn test_bitmap_masks_points() {
        // Points 0 and 2 present, point 1 missing
        let bitmap = [0b1010_0000];
        let packed = vec![7, 9];
        let mut values = vec![0.0; 3];
        unpack_simple(&packed, &mut values, 8, 0.0, 0, 0, Some(&bitmap)).unwrap();
        assert_eq!(values[0], 7.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
    }

    #[test]
    fn test_ieee_64_bit() {
        let mut packed = Vec::new();
        for v in [1.5f64, -2.25, 1e-300] {
            packed.extend_from_slice(&v.to_be_bytes());
        }
        let mut values = vec![0.0; 3];
        unpack_ieee(&packed, &mut values, 2, None).unwrap();
        assert_eq!(values, vec![1.5, -2.25, 1e-300]);
    }

    #[test]
    fn test_ieee_32_bit_and_short_data() {
        let packed = 0.5f32.to_be_bytes();
        let mut values = vec![0.0; 1];
        unpack_ieee(&packed, &mut values, 1, None).unwrap();
        assert_eq!(values, vec![0.5]);

        let mut values = vec![0.0; 2];
        assert!(unpack_ieee(&packed, &mut values, 1, None).is_err());
        assert!(unpack_ieee(&packed, &mut values, 3, None).is_err());
    }
}
