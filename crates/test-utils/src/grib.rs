//! GRIB2 test data generator.
//!
//! Creates minimal synthetic GRIB2 messages for testing the parser and the
//! conversion pipeline. The generated messages have valid structure and,
//! with the default IEEE packing, carry their values exactly.

/// Horizontal grid written to Section 3.
#[derive(Debug, Clone)]
pub enum GridLayout {
    /// Template 3.0 with `ni` x `nj` points.
    LatLon { ni: u32, nj: u32 },
    /// Template 3.40 with 4N points on each of 2N latitudes.
    RegularGaussian { n: u32 },
    /// Template 3.40 with a variable number of points per latitude.
    ReducedGaussian { n: u32, pl: Vec<u32> },
}

impl GridLayout {
    /// Octahedral reduced Gaussian grid: 20 points at the pole, 4 more per latitude.
    pub fn octahedral(n: u32) -> Self {
        let north: Vec<u32> = (1..=n).map(|i| 16 + 4 * i).collect();
        let pl = north.iter().chain(north.iter().rev()).copied().collect();
        GridLayout::ReducedGaussian { n, pl }
    }

    /// Number of grid points described by the layout.
    pub fn num_points(&self) -> usize {
        match self {
            GridLayout::LatLon { ni, nj } => (*ni as usize) * (*nj as usize),
            GridLayout::RegularGaussian { n } => 8 * (*n as usize) * (*n as usize),
            GridLayout::ReducedGaussian { pl, .. } => pl.iter().map(|p| *p as usize).sum(),
        }
    }
}

/// Data representation written to Section 5.
#[derive(Debug, Clone, Copy)]
pub enum Packing {
    /// Template 5.4, 64-bit IEEE values (lossless).
    Ieee64,
    /// Template 5.4, 32-bit IEEE values.
    Ieee32,
    /// Template 5.0 with the given bits per value and zero scale factors.
    Simple { bits_per_value: u8 },
}

/// Bitmap written to Section 6.
#[derive(Debug, Clone)]
pub enum BitmapSpec {
    None,
    Present(Vec<bool>),
    PreviouslyDefined,
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    layout: GridLayout,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_scale_factor: u8,
    level_value: u32,
    forecast_hour: u32,
    // Data
    packing: Packing,
    bitmap: BitmapSpec,
    previous_mask_len: Option<usize>,
    data_values: Vec<f64>,
}

impl Grib2Builder {
    /// Create a new builder for a small 10x10 lat/lon temperature field.
    pub fn new_latlon() -> Self {
        Self::with_layout(GridLayout::LatLon { ni: 10, nj: 10 })
    }

    /// Create a builder for a regular Gaussian grid `F<n>`.
    pub fn new_regular_gaussian(n: u32) -> Self {
        Self::with_layout(GridLayout::RegularGaussian { n })
    }

    /// Create a builder for an octahedral reduced Gaussian grid `O<n>`.
    pub fn new_octahedral(n: u32) -> Self {
        Self::with_layout(GridLayout::octahedral(n))
    }

    /// Create a builder for any grid layout. Values default to `0, 1, 2, ...`.
    pub fn with_layout(layout: GridLayout) -> Self {
        let n = layout.num_points();
        Self {
            discipline: 0, // Meteorological
            center: 98,    // ECMWF
            year: 2025,
            month: 12,
            day: 10,
            hour: 12,
            layout,
            param_category: 0,
            param_number: 0, // Temperature
            level_type: 100, // Isobaric surface (Pa)
            level_scale_factor: 0,
            level_value: 85_000,
            forecast_hour: 0,
            packing: Packing::Ieee64,
            bitmap: BitmapSpec::None,
            previous_mask_len: None,
            data_values: (0..n).map(|i| i as f64).collect(),
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    /// Set the first fixed surface (type and unscaled value).
    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale_factor = 0;
        self.level_value = level_value;
        self
    }

    /// Set an isobaric level given in hPa.
    pub fn with_isobaric_hpa(self, hpa: u32) -> Self {
        self.with_level(100, hpa * 100)
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    /// Replace the values. The message then declares `data.len()` grid points
    /// regardless of the layout, which keeps small hand-written fixtures short.
    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data_values = data;
        self
    }

    /// Mark points as present (`true`) or missing (`false`). Only the values
    /// of present points are encoded.
    pub fn with_bitmap(mut self, mask: Vec<bool>) -> Self {
        self.bitmap = BitmapSpec::Present(mask);
        self
    }

    /// Refer to the bitmap of a previous message (indicator 254). The mask is
    /// still needed to decide which values to encode.
    pub fn with_previous_bitmap(mut self, mask: Vec<bool>) -> Self {
        self.data_values = self
            .data_values
            .iter()
            .zip(mask.iter())
            .filter(|(_, present)| **present)
            .map(|(v, _)| *v)
            .collect();
        self.bitmap = BitmapSpec::PreviouslyDefined;
        self.previous_mask_len = Some(mask.len());
        self
    }

    fn num_data_points(&self) -> u32 {
        match (&self.bitmap, self.previous_mask_len) {
            (BitmapSpec::Present(mask), _) => mask.len() as u32,
            (BitmapSpec::PreviouslyDefined, Some(len)) => len as u32,
            _ => self.data_values.len() as u32,
        }
    }

    /// Values that are actually packed into Section 7.
    fn packed_values(&self) -> Vec<f64> {
        match &self.bitmap {
            BitmapSpec::Present(mask) => self
                .data_values
                .iter()
                .zip(mask.iter())
                .filter(|(_, present)| **present)
                .map(|(v, _)| *v)
                .collect(),
            _ => self.data_values.clone(),
        }
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        for section in &sections {
            message.extend_from_slice(section);
        }

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1); // Section number

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(28); // Master table version
        section.push(0); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let (template, ni, nj, increment_or_n, pl): (u16, u32, u32, u32, &[u32]) =
            match &self.layout {
                GridLayout::LatLon { ni, nj } => (0, *ni, *nj, 1_000_000, &[]),
                GridLayout::RegularGaussian { n } => (40, 4 * n, 2 * n, *n, &[]),
                GridLayout::ReducedGaussian { n, pl } => (40, u32::MAX, 2 * n, *n, pl),
            };

        let list_octets: u8 = if pl.is_empty() { 0 } else { 2 };
        let section_length = 14 + 58 + pl.len() as u32 * list_octets as u32;

        let mut section = Vec::new();
        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3); // Section number
        section.push(0); // Source of grid definition
        section.extend_from_slice(&self.num_data_points().to_be_bytes());
        section.push(list_octets);
        section.push(if pl.is_empty() { 0 } else { 1 }); // Interpretation of list
        section.extend_from_slice(&template.to_be_bytes());

        // Shared 58-byte template body of 3.0 and 3.40
        section.push(6); // Shape of Earth (spherical with radius 6371229m)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&ni.to_be_bytes());
        section.extend_from_slice(&nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&u32::MAX.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&encode_signed(89_000_000)); // La1
        section.extend_from_slice(&encode_signed(0)); // Lo1
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&encode_signed(-89_000_000)); // La2
        section.extend_from_slice(&encode_signed(359_000_000)); // Lo2
        let di = if ni == u32::MAX { u32::MAX } else { 360_000_000 / ni.max(1) };
        section.extend_from_slice(&di.to_be_bytes()); // Di
        section.extend_from_slice(&increment_or_n.to_be_bytes()); // Dj or N
        section.push(0); // Scanning mode: +i, -j, i consecutive

        for p in pl {
            section.extend_from_slice(&(*p as u16).to_be_bytes());
        }

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 4.0: Analysis or forecast at horizontal level
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4); // Section number

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Product definition template (0)

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(1); // Time range unit (hours)
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type);
        section.push(self.level_scale_factor);
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // Type of second fixed surface (none)
        section.push(255);
        section.extend_from_slice(&u32::MAX.to_be_bytes());

        section
    }

    fn build_section5(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let num_packed = self.packed_values().len() as u32;

        match self.packing {
            Packing::Ieee64 | Packing::Ieee32 => {
                section.extend_from_slice(&12u32.to_be_bytes());
                section.push(5);
                section.extend_from_slice(&num_packed.to_be_bytes());
                section.extend_from_slice(&4u16.to_be_bytes()); // Template 5.4
                section.push(if matches!(self.packing, Packing::Ieee64) { 2 } else { 1 });
            }
            Packing::Simple { bits_per_value } => {
                section.extend_from_slice(&21u32.to_be_bytes());
                section.push(5);
                section.extend_from_slice(&num_packed.to_be_bytes());
                section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
                section.extend_from_slice(&(self.reference_value() as f32).to_be_bytes());
                section.extend_from_slice(&0u16.to_be_bytes()); // Binary scale factor
                section.extend_from_slice(&0u16.to_be_bytes()); // Decimal scale factor
                section.push(bits_per_value);
                section.push(0); // Original field type (floating point)
            }
        }

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        match &self.bitmap {
            BitmapSpec::None | BitmapSpec::PreviouslyDefined => {
                section.extend_from_slice(&6u32.to_be_bytes());
                section.push(6);
                section.push(if matches!(self.bitmap, BitmapSpec::None) { 255 } else { 254 });
            }
            BitmapSpec::Present(mask) => {
                let mut bits = vec![0u8; mask.len().div_ceil(8)];
                for (i, present) in mask.iter().enumerate() {
                    if *present {
                        bits[i / 8] |= 0x80 >> (i % 8);
                    }
                }
                section.extend_from_slice(&(6 + bits.len() as u32).to_be_bytes());
                section.push(6);
                section.push(0);
                section.extend_from_slice(&bits);
            }
        }
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed_data = self.pack();

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed_data.len() as u32).to_be_bytes());
        section.push(7); // Section number
        section.extend_from_slice(&packed_data);
        section
    }

    fn reference_value(&self) -> f64 {
        self.packed_values()
            .into_iter()
            .fold(f64::INFINITY, f64::min)
            .min(f64::MAX)
    }

    fn pack(&self) -> Vec<u8> {
        let values = self.packed_values();
        match self.packing {
            Packing::Ieee64 => values.iter().flat_map(|v| v.to_be_bytes()).collect(),
            Packing::Ieee32 => values
                .iter()
                .flat_map(|v| (*v as f32).to_be_bytes())
                .collect(),
            Packing::Simple { bits_per_value } => {
                if bits_per_value == 0 {
                    return Vec::new();
                }
                // packed_value = value - reference_value, MSB first
                let reference = self.reference_value() as f32 as f64;
                let bits = bits_per_value as usize;
                let mut out = vec![0u8; (values.len() * bits).div_ceil(8)];
                for (i, v) in values.iter().enumerate() {
                    let packed = (v - reference).round() as u64;
                    for b in 0..bits {
                        if (packed >> (bits - 1 - b)) & 1 == 1 {
                            let pos = i * bits + b;
                            out[pos / 8] |= 0x80 >> (pos % 8);
                        }
                    }
                }
                out
            }
        }
    }
}

/// Encode a GRIB2 sign-magnitude 4-byte integer.
pub fn encode_signed(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}
