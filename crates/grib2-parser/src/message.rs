//! A decoded GRIB2 message and its keyed metadata.

use bytes::Bytes;
use chrono::{Datelike, Timelike};

use crate::sections::{
    parse_bitmap, parse_data_representation, parse_data_section, parse_grid_definition,
    parse_identification, parse_indicator, parse_product_definition, Bitmap, DataRepresentation,
    DataSection, GridDefinition, Identification, Indicator, ProductDefinition,
};
use crate::tables;
use crate::unpacking::{unpack_ieee, unpack_simple};
use crate::Grib2Error;

/// Typed value of a metadata key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Long(i64),
    Str(String),
}

/// One GRIB2 message with all sections needed to decode its values.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Bitmap,
    pub data_section: DataSection,
}

impl Grib2Message {
    /// Parse a complete message (Section 0 through the "7777" end marker).
    pub fn parse(data: Bytes) -> Result<Self, Grib2Error> {
        let indicator = parse_indicator(&data)?;

        if (indicator.message_length as usize) != data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message length {} does not match {} bytes read",
                indicator.message_length,
                data.len()
            )));
        }
        if !data.ends_with(b"7777") {
            return Err(Grib2Error::InvalidFormat(
                "Missing end-of-message marker".to_string(),
            ));
        }

        Ok(Self {
            identification: parse_identification(&data)?,
            grid_definition: parse_grid_definition(&data)?,
            product_definition: parse_product_definition(&data)?,
            data_representation: parse_data_representation(&data)?,
            bitmap: parse_bitmap(&data)?,
            data_section: parse_data_section(&data)?,
            indicator,
        })
    }

    /// Number of grid points, i.e. the length of the decoded values array.
    pub fn num_data_points(&self) -> usize {
        self.grid_definition.num_data_points as usize
    }

    /// Look up a metadata key by its ecCodes name.
    ///
    /// Returns `None` when the key does not exist for this message, e.g. `N`
    /// on a non-Gaussian grid.
    pub fn key(&self, key: &str) -> Option<KeyValue> {
        let grid = &self.grid_definition;
        let product = &self.product_definition;
        let repr = &self.data_representation;
        let level_value = product.level_value();
        let reference_time = self.identification.reference_time;

        let value = match key {
            "edition" => KeyValue::Long(self.indicator.edition as i64),
            "discipline" => KeyValue::Long(self.indicator.discipline as i64),
            "centre" => KeyValue::Long(self.identification.center as i64),
            "dataDate" => KeyValue::Long(
                reference_time.year() as i64 * 10_000
                    + reference_time.month() as i64 * 100
                    + reference_time.day() as i64,
            ),
            "dataTime" => KeyValue::Long(
                reference_time.hour() as i64 * 100 + reference_time.minute() as i64,
            ),
            "gridType" => KeyValue::Str(
                tables::grid_type(grid.template_number, grid.is_reduced()).to_string(),
            ),
            "gridDefinitionTemplateNumber" => KeyValue::Long(grid.template_number as i64),
            "N" => KeyValue::Long(grid.gaussian_n? as i64),
            "isOctahedral" => KeyValue::Long(grid.is_octahedral() as i64),
            "Ni" => KeyValue::Long(grid.ni? as i64),
            "Nj" => KeyValue::Long(grid.nj? as i64),
            "numberOfDataPoints" => KeyValue::Long(grid.num_data_points as i64),
            "numberOfValues" => KeyValue::Long(repr.num_packed_values as i64),
            "parameterCategory" => KeyValue::Long(product.parameter_category as i64),
            "parameterNumber" => KeyValue::Long(product.parameter_number as i64),
            "shortName" => KeyValue::Str(self.parameter_names().short_name.to_string()),
            "name" => KeyValue::Str(self.parameter_names().name.to_string()),
            "typeOfLevel" => KeyValue::Str(
                tables::type_of_level(product.level_type, level_value).to_string(),
            ),
            "level" => KeyValue::Long(tables::level(product.level_type, level_value)),
            "forecastTime" => KeyValue::Long(product.forecast_time as i64),
            "bitsPerValue" => KeyValue::Long(repr.bits_per_value as i64),
            "packingType" => {
                KeyValue::Str(tables::packing_type(repr.template_number).to_string())
            }
            _ => return None,
        };
        Some(value)
    }

    /// Read a key as an integer.
    pub fn get_long(&self, key: &str) -> Result<i64, Grib2Error> {
        match self.key(key) {
            Some(KeyValue::Long(v)) => Ok(v),
            Some(KeyValue::Str(_)) => Err(Grib2Error::WrongKeyType {
                key: key.to_string(),
                expected: "long",
            }),
            None => Err(Grib2Error::KeyNotFound(key.to_string())),
        }
    }

    /// Read a key as a string. Integer keys are formatted in decimal.
    pub fn get_string(&self, key: &str) -> Result<String, Grib2Error> {
        match self.key(key) {
            Some(KeyValue::Str(s)) => Ok(s),
            Some(KeyValue::Long(v)) => Ok(v.to_string()),
            None => Err(Grib2Error::KeyNotFound(key.to_string())),
        }
    }

    /// Decode the values array into `out`, which must hold exactly
    /// [`num_data_points`](Self::num_data_points) elements.
    ///
    /// `previous_bitmap` is used when Section 6 refers to the bitmap of an
    /// earlier message in the same file.
    pub fn unpack_into(
        &self,
        out: &mut [f64],
        previous_bitmap: Option<&Bytes>,
    ) -> Result<(), Grib2Error> {
        if out.len() != self.num_data_points() {
            return Err(Grib2Error::UnpackingError(format!(
                "Output holds {} values, message has {} points",
                out.len(),
                self.num_data_points()
            )));
        }

        let bitmap = match &self.bitmap {
            Bitmap::None => None,
            Bitmap::Present(bits) => Some(bits.as_ref()),
            Bitmap::PreviouslyDefined => Some(
                previous_bitmap
                    .ok_or_else(|| {
                        Grib2Error::UnpackingError(
                            "Message refers to a previously defined bitmap, none was seen"
                                .to_string(),
                        )
                    })?
                    .as_ref(),
            ),
        };

        let repr = &self.data_representation;
        match repr.template_number {
            0 => unpack_simple(
                &self.data_section.data,
                out,
                repr.bits_per_value,
                repr.reference_value,
                repr.binary_scale_factor,
                repr.decimal_scale_factor,
                bitmap,
            ),
            4 => unpack_ieee(&self.data_section.data, out, repr.ieee_precision, bitmap),
            other => Err(Grib2Error::UnsupportedPacking(other)),
        }
    }

    /// Decode the values array into a new vector.
    pub fn unpack_data(&self, previous_bitmap: Option<&Bytes>) -> Result<Vec<f64>, Grib2Error> {
        let mut values = vec![0.0; self.num_data_points()];
        self.unpack_into(&mut values, previous_bitmap)?;
        Ok(values)
    }

    /// The explicit bitmap of this message, if it carries one.
    pub fn explicit_bitmap(&self) -> Option<&Bytes> {
        match &self.bitmap {
            Bitmap::Present(bits) => Some(bits),
            _ => None,
        }
    }

    fn parameter_names(&self) -> tables::ParameterNames {
        let product = &self.product_definition;
        tables::parameter_names(
            self.indicator.discipline,
            product.parameter_category,
            product.parameter_number,
            product.level_type,
            product.level_value(),
        )
    }
}
