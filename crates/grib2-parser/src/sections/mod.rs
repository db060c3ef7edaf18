//! GRIB2 section parsing.
//!
//! This module handles parsing of individual GRIB2 message sections.
//! Each GRIB2 message consists of multiple sections containing
//! metadata, grid information, and compressed data.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Value GRIB2 uses for "missing" in 4-octet unsigned fields.
pub const MISSING_U32: u32 = 0xFFFF_FFFF;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub num_data_points: u32,
    pub template_number: u16,
    pub grid_shape: u8,
    /// Ni, `None` for grids with a variable number of points per row.
    pub ni: Option<u32>,
    pub nj: Option<u32>,
    pub first_latitude_microdegrees: i32,
    pub first_longitude_microdegrees: i32,
    pub last_latitude_microdegrees: i32,
    pub last_longitude_microdegrees: i32,
    /// Number of parallels between a pole and the equator (Gaussian templates only).
    pub gaussian_n: Option<u32>,
    pub scanning_mode: u8,
    /// Number of points along each row for reduced grids.
    pub points_per_row: Vec<u32>,
}

impl GridDefinition {
    /// Whether this is one of the Gaussian templates (3.40 and 3.41).
    pub fn is_gaussian(&self) -> bool {
        matches!(self.template_number, 40 | 41)
    }

    /// Whether the grid has a variable number of points per row.
    pub fn is_reduced(&self) -> bool {
        self.ni.is_none() && !self.points_per_row.is_empty()
    }

    /// Octahedral reduced Gaussian grids start with 20 points at the pole
    /// and add 4 points per latitude up to the equator.
    pub fn is_octahedral(&self) -> bool {
        if !self.is_gaussian() || !self.is_reduced() {
            return false;
        }
        let pl = &self.points_per_row;
        let half = pl.len() / 2;
        if half == 0 || pl[0] != 20 {
            return false;
        }
        pl[..half].windows(2).all(|w| w[1] == w[0] + 4)
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_scale_factor: i8,
    /// Scaled value of the first fixed surface, `None` when missing.
    pub level_scaled_value: Option<u32>,
}

impl ProductDefinition {
    /// Physical value of the first fixed surface (scaled value / 10^scale factor).
    pub fn level_value(&self) -> Option<f64> {
        self.level_scaled_value
            .map(|v| v as f64 * 10f64.powi(-(self.level_scale_factor as i32)))
    }
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_packed_values: u32,
    pub template_number: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    /// Precision code of template 5.4 (1 = 32 bit, 2 = 64 bit).
    pub ieee_precision: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub enum Bitmap {
    /// Indicator 255: every grid point has a value.
    None,
    /// Indicator 0: one bit per grid point follows.
    Present(Bytes),
    /// Indicator 254: the bitmap of an earlier message applies.
    PreviouslyDefined,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, octet 7 discipline, octet 8 edition,
    // octets 9-16 total message length.
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::UnsupportedEdition(edition));
    }

    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline: data[6],
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let offset = find_section(data, 1)?;
    let section_data = &data[offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec_data = &section_data[5..];

    let year = u16::from_be_bytes([sec_data[7], sec_data[8]]);
    let (month, day, hour, minute, second) =
        (sec_data[9], sec_data[10], sec_data[11], sec_data[12], sec_data[13]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center: u16::from_be_bytes([sec_data[0], sec_data[1]]),
        sub_center: u16::from_be_bytes([sec_data[2], sec_data[3]]),
        table_version: sec_data[4],
        local_table_version: sec_data[5],
        significance_of_reference_time: sec_data[6],
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: sec_data[14],
        data_type: sec_data[15],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_offset = find_section(data, 3)?;
    let section_length = section_length_at(data, section_offset);
    let section_data = &data[section_offset..section_offset + section_length];

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 6-9: number of data points
    // Byte 10: octets per entry of the optional list
    // Byte 11: interpretation of the optional list
    // Bytes 12-13: grid definition template number
    let num_data_points = read_u32(section_data, 6);
    let list_octets = section_data[10] as usize;
    let template_number = u16::from_be_bytes([section_data[12], section_data[13]]);

    let gd = &section_data[14..];
    let has_common_layout = matches!(template_number, 0 | 1 | 10 | 20 | 30 | 40 | 41);

    if !has_common_layout || gd.len() < 58 {
        // Only the point count and the template are known for other layouts.
        return Ok(GridDefinition {
            num_data_points,
            template_number,
            grid_shape: gd.first().copied().unwrap_or(255),
            ni: None,
            nj: None,
            first_latitude_microdegrees: 0,
            first_longitude_microdegrees: 0,
            last_latitude_microdegrees: 0,
            last_longitude_microdegrees: 0,
            gaussian_n: None,
            scanning_mode: 0,
            points_per_row: Vec::new(),
        });
    }

    // Template 3.0 / 3.40 layout, relative to the template start:
    // 0: shape of the earth, 16-19: Ni, 20-23: Nj, 32-35: La1, 36-39: Lo1,
    // 41-44: La2, 45-48: Lo2, 49-52: Di, 53-56: Dj (3.0) or N (3.40),
    // 57: scanning mode. Signed values are sign-magnitude.
    let ni = read_u32(gd, 16);
    let nj = read_u32(gd, 20);
    let gaussian_n = if matches!(template_number, 40 | 41) {
        Some(read_u32(gd, 53))
    } else {
        None
    };

    let points_per_row = if list_octets > 0 {
        let list_start = 14 + 58 + template_extra_octets(template_number);
        parse_optional_list(section_data, list_start, list_octets)?
    } else {
        Vec::new()
    };

    Ok(GridDefinition {
        num_data_points,
        template_number,
        grid_shape: gd[0],
        ni: (ni != MISSING_U32).then_some(ni),
        nj: (nj != MISSING_U32).then_some(nj),
        first_latitude_microdegrees: decode_grib2_signed(&gd[32..36]),
        first_longitude_microdegrees: decode_grib2_signed(&gd[36..40]),
        last_latitude_microdegrees: decode_grib2_signed(&gd[41..45]),
        last_longitude_microdegrees: decode_grib2_signed(&gd[45..49]),
        gaussian_n,
        scanning_mode: gd[57],
        points_per_row,
    })
}

/// Rotated templates carry 12 extra octets (south pole and rotation angle)
/// before the optional list.
fn template_extra_octets(template_number: u16) -> usize {
    match template_number {
        1 | 41 => 12,
        _ => 0,
    }
}

fn parse_optional_list(
    section_data: &[u8],
    start: usize,
    octets: usize,
) -> Result<Vec<u32>, Grib2Error> {
    if octets > 4 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Unsupported optional list entry width {}", octets),
        });
    }
    let list = section_data.get(start..).unwrap_or_default();
    Ok(list
        .chunks_exact(octets)
        .map(|chunk| chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
        .collect())
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(data: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    let section_offset = find_section(data, 4)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 28 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // GRIB2 Section 4 structure shared by the horizontal-level templates:
    // Bytes 7-8: Product definition template number
    // Byte 9: Parameter category
    // Byte 10: Parameter number
    // Bytes 18-21: Forecast time
    // Byte 22: Type of first fixed surface
    // Byte 23: Scale factor of first fixed surface
    // Bytes 24-27: Scaled value of first fixed surface
    let scale_byte = section_data[23];
    let level_scale_factor = if scale_byte == 0xFF {
        0
    } else if scale_byte & 0x80 != 0 {
        -((scale_byte & 0x7F) as i8)
    } else {
        scale_byte as i8
    };
    let scaled_value = read_u32(section_data, 24);

    Ok(ProductDefinition {
        template_number: u16::from_be_bytes([section_data[7], section_data[8]]),
        parameter_category: section_data[9],
        parameter_number: section_data[10],
        forecast_time: read_u32(section_data, 18),
        level_type: section_data[22],
        level_scale_factor,
        level_scaled_value: (scaled_value != MISSING_U32).then_some(scaled_value),
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_offset = find_section(data, 5)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 12 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9 [5-8]: Number of packed values
    // Octets 10-11 [9-10]: Data representation template number
    // Template 5.0 and friends:
    //   [11-14] reference value (IEEE 32-bit), [15-16] binary scale factor,
    //   [17-18] decimal scale factor, [19] bits per value
    // Template 5.4:
    //   [11] precision
    let num_packed_values = read_u32(section_data, 5);
    let template_number = u16::from_be_bytes([section_data[9], section_data[10]]);
    let template_data = &section_data[11..];

    let mut repr = DataRepresentation {
        num_packed_values,
        template_number,
        reference_value: 0.0,
        binary_scale_factor: 0,
        decimal_scale_factor: 0,
        bits_per_value: 0,
        ieee_precision: 0,
    };

    if template_number == 4 {
        repr.ieee_precision = template_data[0];
    } else if template_data.len() >= 9 {
        repr.reference_value = f32::from_be_bytes([
            template_data[0],
            template_data[1],
            template_data[2],
            template_data[3],
        ]);
        repr.binary_scale_factor = decode_grib2_signed_i16(&template_data[4..6]);
        repr.decimal_scale_factor = decode_grib2_signed_i16(&template_data[6..8]);
        repr.bits_per_value = template_data[8];
    }

    Ok(repr)
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(data: &[u8]) -> Result<Bitmap, Grib2Error> {
    let section_offset = find_section(data, 6)?;
    let section_length = section_length_at(data, section_offset);
    let section_data = &data[section_offset..section_offset + section_length];

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    match section_data[5] {
        255 => Ok(Bitmap::None),
        254 => Ok(Bitmap::PreviouslyDefined),
        0 => Ok(Bitmap::Present(Bytes::copy_from_slice(&section_data[6..]))),
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Predefined bitmap {} is not supported", other),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_offset = find_section(data, 7)?;
    let section_length = section_length_at(data, section_offset);

    let data_bytes = if section_length > 5 {
        Bytes::copy_from_slice(&data[section_offset + 5..section_offset + section_length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data: data_bytes })
}

// ===== Helper Functions =====

/// Decode a 4-byte GRIB2 sign-magnitude integer (MSB is the sign bit).
///
/// Returns 0 when the slice is not exactly 4 bytes long.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 2-byte GRIB2 sign-magnitude integer.
pub fn decode_grib2_signed_i16(bytes: &[u8]) -> i16 {
    if bytes.len() != 2 {
        return 0;
    }
    let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn section_length_at(data: &[u8], offset: usize) -> usize {
    read_u32(data, offset) as usize
}

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        // Section 8 is the 4-byte "7777" end marker
        if &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        let section_length = section_length_at(data, offset);

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}
