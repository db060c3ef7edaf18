//! GRIB2 parameter, level and template lookup tables.
//!
//! Translates numeric GRIB2 codes into the short names, descriptions and
//! type names used as message metadata. Naming follows the ecCodes
//! conventions (`t`, `2t`, `isobaricInhPa`, `reduced_gg`, ...), so the
//! values read back from a converted file match what other GRIB tools show.

/// Names of a GRIB2 parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterNames {
    /// Short name (e.g. "t", "u", "2t")
    pub short_name: &'static str,
    /// Long description (e.g. "Temperature")
    pub name: &'static str,
}

const UNKNOWN_PARAMETER: ParameterNames = ParameterNames {
    short_name: "unknown",
    name: "unknown",
};

/// Level type codes with special-cased parameter names.
pub mod level_types {
    pub const SURFACE: u8 = 1;
    pub const ISOBARIC: u8 = 100;
    pub const MEAN_SEA: u8 = 101;
    pub const HEIGHT_ABOVE_GROUND: u8 = 103;
}

/// Look up the names of a parameter.
///
/// Some parameters get a level-specific name (2 m temperature, 10 m wind,
/// mean sea level pressure), so the first fixed surface takes part in the
/// lookup.
pub fn parameter_names(
    discipline: u8,
    category: u8,
    number: u8,
    level_type: u8,
    level_value: Option<f64>,
) -> ParameterNames {
    use level_types::*;

    let at_height = |h: f64| level_type == HEIGHT_ABOVE_GROUND && level_value == Some(h);
    let names = |short_name, name| ParameterNames { short_name, name };

    match (discipline, category, number) {
        // Discipline 0, category 0: temperature
        (0, 0, 0) if at_height(2.0) => names("2t", "2 metre temperature"),
        (0, 0, 0) => names("t", "Temperature"),
        (0, 0, 2) => names("pt", "Potential temperature"),
        (0, 0, 6) if at_height(2.0) => names("2d", "2 metre dewpoint temperature"),
        (0, 0, 6) => names("dpt", "Dew point temperature"),

        // Category 1: moisture
        (0, 1, 0) => names("q", "Specific humidity"),
        (0, 1, 1) if at_height(2.0) => names("2r", "2 metre relative humidity"),
        (0, 1, 1) => names("r", "Relative humidity"),
        (0, 1, 3) => names("pwat", "Precipitable water"),
        (0, 1, 8) => names("tp", "Total precipitation"),

        // Category 2: momentum
        (0, 2, 2) if at_height(10.0) => names("10u", "10 metre U wind component"),
        (0, 2, 2) => names("u", "U component of wind"),
        (0, 2, 3) if at_height(10.0) => names("10v", "10 metre V wind component"),
        (0, 2, 3) => names("v", "V component of wind"),
        (0, 2, 8) => names("w", "Vertical velocity"),
        (0, 2, 10) => names("absv", "Absolute vorticity"),
        (0, 2, 12) => names("vo", "Vorticity (relative)"),
        (0, 2, 13) => names("d", "Divergence"),
        (0, 2, 22) => names("gust", "Wind speed (gust)"),

        // Category 3: mass
        (0, 3, 0) if level_type == MEAN_SEA => names("msl", "Mean sea level pressure"),
        (0, 3, 0) if level_type == SURFACE => names("sp", "Surface pressure"),
        (0, 3, 0) => names("pres", "Pressure"),
        (0, 3, 1) => names("prmsl", "Pressure reduced to MSL"),
        (0, 3, 4) => names("z", "Geopotential"),
        (0, 3, 5) => names("gh", "Geopotential height"),

        // Category 6: cloud
        (0, 6, 1) => names("tcc", "Total cloud cover"),

        // Category 7: thermodynamic stability
        (0, 7, 6) => names("cape", "Convective available potential energy"),
        (0, 7, 7) => names("cin", "Convective inhibition"),

        // Category 19: physical atmospheric properties
        (0, 19, 0) => names("vis", "Visibility"),

        // Discipline 2: land surface
        (2, 0, 0) => names("lsm", "Land-sea mask"),

        // Discipline 10: oceanographic
        (10, 3, 0) => names("sst", "Sea surface temperature"),

        _ => UNKNOWN_PARAMETER,
    }
}

/// ecCodes-style name of a fixed surface type (Code Table 4.5).
pub fn type_of_level(level_type: u8, level_value: Option<f64>) -> &'static str {
    match level_type {
        1 => "surface",
        2 => "cloudBase",
        3 => "cloudTop",
        4 => "isothermZero",
        7 => "tropopause",
        8 => "nominalTop",
        10 | 200 => "entireAtmosphere",
        100 => match level_value {
            Some(pa) if pa < 100.0 => "isobaricInPa",
            _ => "isobaricInhPa",
        },
        101 => "meanSea",
        102 => "heightAboveSea",
        103 => "heightAboveGround",
        104 => "sigma",
        105 => "hybrid",
        106 => "depthBelowLand",
        107 => "theta",
        108 => "pressureFromGroundLayer",
        109 => "potentialVorticity",
        150 => "generalVertical",
        151 => "soil",
        160 => "depthBelowSea",
        _ => "unknown",
    }
}

/// Integer level as reported by ecCodes' `level` key.
///
/// Isobaric levels are reported in hPa unless they are below 1 hPa;
/// missing surfaces report 0.
pub fn level(level_type: u8, level_value: Option<f64>) -> i64 {
    match (level_type, level_value) {
        (_, None) => 0,
        (level_types::ISOBARIC, Some(pa)) if pa >= 100.0 => (pa / 100.0).round() as i64,
        (_, Some(v)) => v.round() as i64,
    }
}

/// ecCodes `gridType` of a grid definition template (Code Table 3.1).
pub fn grid_type(template_number: u16, reduced: bool) -> &'static str {
    match (template_number, reduced) {
        (0, false) => "regular_ll",
        (0, true) => "reduced_ll",
        (1, _) => "rotated_ll",
        (10, _) => "mercator",
        (20, _) => "polar_stereographic",
        (30, _) => "lambert",
        (40, false) => "regular_gg",
        (40, true) => "reduced_gg",
        (41, false) => "rotated_gg",
        (41, true) => "reduced_rotated_gg",
        (50, _) => "sh",
        (90, _) => "space_view",
        (101, _) => "unstructured_grid",
        (140, _) => "lambert_azimuthal_equal_area",
        _ => "unknown",
    }
}

/// ecCodes `packingType` of a data representation template (Code Table 5.0).
pub fn packing_type(template_number: u16) -> &'static str {
    match template_number {
        0 => "grid_simple",
        2 => "grid_complex",
        3 => "grid_complex_spatial_differencing",
        4 => "grid_ieee",
        40 => "grid_jpeg",
        41 => "grid_png",
        42 => "grid_ccsds",
        50 => "spectral_simple",
        51 => "spectral_complex",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_names() {
        assert_eq!(parameter_names(0, 0, 0, 100, Some(85000.0)).short_name, "t");
        assert_eq!(parameter_names(0, 0, 0, 103, Some(2.0)).short_name, "2t");
        assert_eq!(parameter_names(0, 2, 2, 103, Some(10.0)).short_name, "10u");
        assert_eq!(parameter_names(0, 2, 2, 100, Some(50000.0)).name, "U component of wind");
        assert_eq!(parameter_names(0, 3, 0, 101, None).short_name, "msl");
        assert_eq!(parameter_names(0, 250, 250, 1, None), UNKNOWN_PARAMETER);
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(level(100, Some(85000.0)), 850);
        assert_eq!(level(100, Some(50.0)), 50);
        assert_eq!(level(103, Some(2.0)), 2);
        assert_eq!(level(1, None), 0);
        assert_eq!(type_of_level(100, Some(50.0)), "isobaricInPa");
        assert_eq!(type_of_level(100, Some(50000.0)), "isobaricInhPa");
    }

    #[test]
    fn test_grid_type() {
        assert_eq!(grid_type(40, true), "reduced_gg");
        assert_eq!(grid_type(40, false), "regular_gg");
        assert_eq!(grid_type(0, false), "regular_ll");
        assert_eq!(grid_type(999, false), "unknown");
    }
}
