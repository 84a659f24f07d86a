//! Conversion factor lookup between two unit symbols.
//!
//! Categories are scanned in table order. When more than one category holds
//! both symbols the candidates must agree on the factor; otherwise the tag is
//! reported as ambiguous instead of picking one silently.

use crate::errors::PreprocessError;

use super::UnitTable;

/// Relative tolerance under which two candidate factors count as equal.
const AGREEMENT_TOLERANCE: f64 = 1e-12;

/// Resolves `[from->to]` conversion factors against a [`UnitTable`].
#[derive(Debug, Clone, Copy)]
pub struct ConversionResolver<'a> {
    table: &'a UnitTable,
}

impl<'a> ConversionResolver<'a> {
    pub fn new(table: &'a UnitTable) -> Self {
        ConversionResolver { table }
    }

    /// Factor that converts a value expressed in `from` into `to`.
    ///
    /// # Errors
    ///
    /// * `PreprocessError::UnitNotFound` - no category contains both symbols
    /// * `PreprocessError::AmbiguousUnit` - several categories contain both
    ///   symbols and their factors disagree
    ///
    /// # Example
    ///
    /// ```rust
    /// use eqn_core::units::UnitTable;
    ///
    /// let table = UnitTable::bundled().unwrap();
    /// let resolver = table.resolver();
    /// let to_kpa = resolver.resolve("psi", "kPa").unwrap();
    /// assert!((100.0 * to_kpa - 689.476).abs() < 1e-3);
    /// ```
    pub fn resolve(&self, from: &str, to: &str) -> Result<f64, PreprocessError> {
        let candidates: Vec<(&str, f64)> = self
            .table
            .categories()
            .iter()
            .filter_map(|category| {
                let from_factor = category.get(from)?;
                let to_factor = category.get(to)?;
                Some((category.name(), to_factor / from_factor))
            })
            .collect();

        let Some(&(_, factor)) = candidates.first() else {
            return Err(PreprocessError::unit_not_found(from, to));
        };

        let agree = candidates
            .iter()
            .all(|(_, other)| ((other - factor) / factor).abs() <= AGREEMENT_TOLERANCE);
        if !agree {
            return Err(PreprocessError::AmbiguousUnit {
                from: from.to_string(),
                to: to.to_string(),
                categories: candidates.iter().map(|(name, _)| name.to_string()).collect(),
            });
        }

        Ok(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_basic_conversion() {
        let table = UnitTable::bundled().unwrap();
        let resolver = table.resolver();
        assert_relative_eq!(resolver.resolve("m", "ft").unwrap(), 3.280839895013123);
        assert_relative_eq!(resolver.resolve("ft", "in").unwrap(), 12.0, max_relative = 1e-12);
        assert_relative_eq!(resolver.resolve("kip", "lbf").unwrap(), 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_self_conversion_of_derived_force_units() {
        let table = UnitTable::bundled().unwrap();
        let resolver = table.resolver();
        let symbols: Vec<String> = {
            let time = table.category("TIME").unwrap();
            let length = table.category("LENGTH").unwrap();
            let mass = table.category("MASS").unwrap();
            let mut out = Vec::new();
            for (t, _) in time.units() {
                for (l, _) in length.units() {
                    for (m, _) in mass.units() {
                        out.push(format!("{}-{}/{}^2", m, l, t));
                    }
                }
            }
            out
        };

        for symbol in &symbols {
            assert_eq!(resolver.resolve(symbol, symbol).unwrap(), 1.0, "{}", symbol);
        }
    }

    #[test]
    fn test_reciprocal_pairs() {
        let table = UnitTable::bundled().unwrap();
        let resolver = table.resolver();
        for category in table.categories().iter().filter(|c| c.len() < 50) {
            let symbols: Vec<&str> = category.units().map(|(s, _)| s).collect();
            for a in &symbols {
                for b in &symbols {
                    let there = resolver.resolve(a, b).unwrap();
                    let back = resolver.resolve(b, a).unwrap();
                    assert_relative_eq!(there * back, 1.0, max_relative = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_derived_matches_base_unit() {
        let table = UnitTable::bundled().unwrap();
        let resolver = table.resolver();
        assert_relative_eq!(resolver.resolve("kg-m/s^2", "N").unwrap(), 1.0);
        assert_relative_eq!(resolver.resolve("N/m^2", "Pa").unwrap(), 1.0);
        assert_relative_eq!(resolver.resolve("lbf/in^2", "psi").unwrap(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_unit_not_found() {
        let table = UnitTable::bundled().unwrap();
        let err = table.resolver().resolve("m", "kg").unwrap_err();
        assert_eq!(err, PreprocessError::unit_not_found("m", "kg"));

        let err = table.resolver().resolve("furlong", "m").unwrap_err();
        assert_eq!(err.error_code(), "UNIT_NOT_FOUND");
    }

    #[test]
    fn test_ambiguous_categories_must_agree() {
        let config = json!({
            "LENGTH": { "m": 1.0 },
            "MASS": { "kg": 1.0 },
            "TIME": { "s": 1.0 },
            "FORCE": { "N": 1.0 },
            "PRESSURE": { "Pa": 1.0 },
            "ENERGY": { "J": 1.0, "N-m": 1.0, "erg": 1e7 },
            "WORK": { "N-m": 1.0, "erg": 2e7 }
        });
        let table = UnitTable::load(&config).unwrap();
        let resolver = table.resolver();

        // TORQUE also holds N-m, but only ENERGY holds J
        assert_relative_eq!(resolver.resolve("J", "N-m").unwrap(), 1.0);

        let err = resolver.resolve("N-m", "erg").unwrap_err();
        match err {
            PreprocessError::AmbiguousUnit { categories, .. } => {
                assert_eq!(categories, vec!["ENERGY".to_string(), "WORK".to_string()]);
            }
            other => panic!("expected AmbiguousUnit, got {:?}", other),
        }
    }

    #[test]
    fn test_agreeing_categories_resolve() {
        let config = json!({
            "LENGTH": { "m": 1.0 },
            "MASS": { "kg": 1.0 },
            "TIME": { "s": 1.0 },
            "FORCE": { "N": 1.0 },
            "PRESSURE": { "Pa": 1.0 },
            "ENERGY": { "N-m": 1.0, "m-N": 1.0 }
        });
        let table = UnitTable::load(&config).unwrap();
        assert_relative_eq!(table.resolver().resolve("N-m", "m-N").unwrap(), 1.0);
    }
}
