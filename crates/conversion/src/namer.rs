//! Canonical grid identifiers from GRIB metadata.
//!
//! | gridType     | isOctahedral | identifier |
//! |--------------|--------------|------------|
//! | `reduced_gg` | yes          | `O<N>`     |
//! | `reduced_gg` | no           | `N<N>`     |
//! | `regular_gg` | any          | `F<N>`     |
//! | anything else| any          | gridType   |
//!
//! Identifiers of other families are passed through unchanged; whether they
//! can be turned into a mesh is decided by the mesh builder.

use crate::error::Result;
use crate::stream::MessageStream;

/// Identifier for a grid family, octahedral flag and Gaussian number `n`.
pub fn grid_name(family: &str, is_octahedral: bool, n: i64) -> String {
    match family {
        "reduced_gg" if is_octahedral => format!("O{}", n),
        "reduced_gg" => format!("N{}", n),
        "regular_gg" => format!("F{}", n),
        other => other.to_string(),
    }
}

/// Identifier of the grid of the stream's current message.
///
/// `N` and `isOctahedral` are only looked up for Gaussian families.
pub fn grid_name_for(stream: &MessageStream) -> Result<String> {
    let family = stream.current_string("gridType")?;
    match family.as_str() {
        "reduced_gg" => {
            let octahedral = stream.current_long("isOctahedral")? != 0;
            Ok(grid_name(&family, octahedral, stream.current_long("N")?))
        }
        "regular_gg" => Ok(grid_name(&family, false, stream.current_long("N")?)),
        _ => Ok(grid_name(&family, false, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_families() {
        assert_eq!(grid_name("reduced_gg", true, 1280), "O1280");
        assert_eq!(grid_name("reduced_gg", false, 640), "N640");
        assert_eq!(grid_name("regular_gg", false, 640), "F640");
        assert_eq!(grid_name("regular_gg", true, 640), "F640");
    }

    #[test]
    fn test_other_families_pass_through() {
        assert_eq!(grid_name("rotated_ll", false, 0), "rotated_ll");
        assert_eq!(grid_name("regular_ll", true, 99), "regular_ll");
        assert_eq!(grid_name("", false, 1), "");
    }
}
