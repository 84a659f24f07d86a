//! # Unit Table
//!
//! Category-organised unit catalog used to resolve inline conversion tags
//! such as `[psi->kPa]`.
//!
//! ## Structure
//!
//! ```text
//! UnitTable
//! ├── LENGTH:   { m: 1.0, ft: 3.2808, ... }
//! ├── MASS:     { kg: 1.0, lbm: 2.2046, ... }
//! ├── TIME:     { s: 1.0, min: 0.01667, ... }
//! ├── FORCE:    { N: 1.0, lbf: 0.2248, ..., kg-m/s^2: 1.0, ... }   (base + derived)
//! ├── PRESSURE: { Pa: 1.0, ..., N/m^2: 1.0, ... }                 (base + derived)
//! ├── TORQUE:   { N-m: 1.0, m-N: 1.0, ... }                        (derived)
//! └── ...
//! ```
//!
//! Every factor in a category is "units per category reference unit", so a
//! value in `a` becomes a value in `b` by multiplying with
//! `factor(b) / factor(a)`.
//!
//! Derived force, pressure and torque units are generated once when the table
//! is loaded. After that the table is read-only; reloading means building a
//! new table.
//!
//! ## Example
//!
//! ```rust
//! use eqn_core::units::UnitTable;
//!
//! let table = UnitTable::bundled().unwrap();
//! let factor = table.resolver().resolve("m", "ft").unwrap();
//! assert!((factor - 3.28084).abs() < 1e-5);
//!
//! // Composite units are synthesized from MASS x LENGTH x TIME
//! assert!(table.factor("FORCE", "kg-m/s^2").is_some());
//! ```

pub mod resolver;

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::errors::{EqnError, EqnResult};

pub use resolver::ConversionResolver;

/// Unit catalog shipped with the crate.
pub const BUNDLED_UNITS_JSON: &str = include_str!("default_units.json");

/// Categories the derived-unit generation reads from or writes into.
pub const REQUIRED_CATEGORIES: [&str; 5] = ["LENGTH", "MASS", "TIME", "FORCE", "PRESSURE"];

/// Name of the category holding generated torque units.
pub const TORQUE: &str = "TORQUE";

/// One named group of mutually convertible units.
///
/// Symbols keep their insertion order; inserting an existing symbol replaces
/// its factor in place.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCategory {
    name: String,
    units: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl UnitCategory {
    fn new(name: impl Into<String>) -> Self {
        UnitCategory {
            name: name.into(),
            units: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, symbol: String, factor: f64) {
        match self.index.get(&symbol) {
            Some(&i) => self.units[i].1 = factor,
            None => {
                self.index.insert(symbol.clone(), self.units.len());
                self.units.push((symbol, factor));
            }
        }
    }

    /// Category name as written in the configuration (e.g. `"LENGTH"`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scale factor of a symbol, if the category has it
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.index.get(symbol).map(|&i| self.units[i].1)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// Symbols and factors in insertion order
    pub fn units(&self) -> impl Iterator<Item = (&str, f64)> {
        self.units.iter().map(|(s, f)| (s.as_str(), *f))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Immutable unit catalog with generated composite units.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTable {
    categories: Vec<UnitCategory>,
}

impl UnitTable {
    /// Build a table from a parsed JSON configuration.
    ///
    /// The configuration is an object of categories, each an object mapping
    /// unit symbols to positive scale factors. Category order follows the
    /// document.
    ///
    /// # Errors
    ///
    /// * `EqnError::Config` - a required category is missing, a category is
    ///   not an object, or a factor is non-numeric or not positive
    pub fn load(config: &Value) -> EqnResult<Self> {
        let root = config
            .as_object()
            .ok_or_else(|| EqnError::config("unit configuration must be a JSON object of categories"))?;

        let mut categories = Vec::with_capacity(root.len() + 1);
        for (name, entries) in root {
            let entries = entries.as_object().ok_or_else(|| {
                EqnError::config(format!("category '{}' must be an object of unit factors", name))
            })?;

            let mut category = UnitCategory::new(name.as_str());
            for (symbol, value) in entries {
                let factor = value.as_f64().ok_or_else(|| {
                    EqnError::config(format!("unit '{}' in '{}' has non-numeric factor {}", symbol, name, value))
                })?;
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(EqnError::config(format!(
                        "unit '{}' in '{}' must have a positive factor, got {}",
                        symbol, name, factor
                    )));
                }
                category.insert(symbol.clone(), factor);
            }
            categories.push(category);
        }

        for required in REQUIRED_CATEGORIES {
            if !categories.iter().any(|c| c.name == required) {
                return Err(EqnError::config(format!("missing required unit category '{}'", required)));
            }
        }

        let mut table = UnitTable { categories };
        table.generate_force_units();
        table.generate_pressure_torque_units();

        debug!(
            categories = table.categories.len(),
            units = table.len(),
            "unit table loaded"
        );
        Ok(table)
    }

    /// Build a table from JSON text.
    ///
    /// # Errors
    ///
    /// * `EqnError::SerializationError` - the text is not JSON
    /// * `EqnError::Config` - as for [`UnitTable::load`]
    pub fn from_json_str(text: &str) -> EqnResult<Self> {
        let config: Value = serde_json::from_str(text)
            .map_err(|e| EqnError::serialization(format!("Invalid unit configuration JSON: {}", e)))?;
        Self::load(&config)
    }

    /// Build a fresh table from the catalog shipped with the crate.
    pub fn bundled() -> EqnResult<Self> {
        Self::from_json_str(BUNDLED_UNITS_JSON)
    }

    /// Conversion resolver borrowing this table
    pub fn resolver(&self) -> ConversionResolver<'_> {
        ConversionResolver::new(self)
    }

    /// Categories in table order
    pub fn categories(&self) -> &[UnitCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&UnitCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Scale factor of `symbol` within `category`
    pub fn factor(&self, category: &str, symbol: &str) -> Option<f64> {
        self.category(category).and_then(|c| c.get(symbol))
    }

    /// Total number of unit entries across all categories
    pub fn len(&self) -> usize {
        self.categories.iter().map(UnitCategory::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, name: &str) -> Vec<(String, f64)> {
        self.category(name)
            .map(|c| c.units.clone())
            .unwrap_or_default()
    }

    fn category_mut(&mut self, name: &str) -> &mut UnitCategory {
        let position = match self.categories.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                self.categories.push(UnitCategory::new(name));
                self.categories.len() - 1
            }
        };
        &mut self.categories[position]
    }

    /// `<m>-<l>/<t>^2` for every (time, length, mass) triple.
    fn generate_force_units(&mut self) {
        let time = self.snapshot("TIME");
        let length = self.snapshot("LENGTH");
        let mass = self.snapshot("MASS");

        let force = self.category_mut("FORCE");
        for (t, t_factor) in &time {
            for (l, l_factor) in &length {
                for (m, m_factor) in &mass {
                    force.insert(
                        format!("{}-{}/{}^2", m, l, t),
                        m_factor * l_factor / (t_factor * t_factor),
                    );
                }
            }
        }
    }

    /// `<f>/<l>^2` pressures plus `<f>-<l>` and `<l>-<f>` torque aliases.
    fn generate_pressure_torque_units(&mut self) {
        let length = self.snapshot("LENGTH");
        let force = self.snapshot("FORCE");

        let mut pressure = Vec::with_capacity(length.len() * force.len());
        let mut torque = Vec::with_capacity(2 * length.len() * force.len());
        for (l, l_factor) in &length {
            for (f, f_factor) in &force {
                pressure.push((format!("{}/{}^2", f, l), f_factor / (l_factor * l_factor)));
                torque.push((format!("{}-{}", f, l), f_factor * l_factor));
                torque.push((format!("{}-{}", l, f), f_factor * l_factor));
            }
        }

        let category = self.category_mut("PRESSURE");
        for (symbol, factor) in pressure {
            category.insert(symbol, factor);
        }
        let category = self.category_mut(TORQUE);
        for (symbol, factor) in torque {
            category.insert(symbol, factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn small_config() -> Value {
        json!({
            "LENGTH": { "m": 1.0, "ft": 3.28084 },
            "MASS": { "kg": 1.0, "lbm": 2.20462 },
            "TIME": { "s": 1.0, "min": 1.0 / 60.0 },
            "FORCE": { "N": 1.0 },
            "PRESSURE": { "Pa": 1.0 }
        })
    }

    #[test]
    fn test_force_units_generated() {
        let table = UnitTable::load(&small_config()).unwrap();
        let force = table.category("FORCE").unwrap();

        // 1 base + 2 time x 2 length x 2 mass
        assert_eq!(force.len(), 9);
        assert_relative_eq!(force.get("kg-m/s^2").unwrap(), 1.0);
        assert_relative_eq!(
            force.get("lbm-ft/min^2").unwrap(),
            2.20462 * 3.28084 / (1.0 / 60.0_f64).powi(2)
        );
    }

    #[test]
    fn test_generation_order_is_time_length_mass() {
        let table = UnitTable::load(&small_config()).unwrap();
        let symbols: Vec<&str> = table.category("FORCE").unwrap().units().map(|(s, _)| s).collect();
        assert_eq!(&symbols[..3], &["N", "kg-m/s^2", "lbm-m/s^2"]);
        assert_eq!(symbols[3], "kg-ft/s^2");
    }

    #[test]
    fn test_pressure_and_torque_generated() {
        let table = UnitTable::load(&small_config()).unwrap();

        assert_relative_eq!(table.factor("PRESSURE", "N/ft^2").unwrap(), 1.0 / (3.28084 * 3.28084));
        assert_relative_eq!(table.factor("PRESSURE", "kg-m/s^2/m^2").unwrap(), 1.0);

        let torque = table.category(TORQUE).unwrap();
        assert_eq!(torque.get("N-ft"), torque.get("ft-N"));
        assert_relative_eq!(torque.get("N-ft").unwrap(), 3.28084);
        // 2 lengths x 9 forces x 2 spellings
        assert_eq!(torque.len(), 36);
    }

    #[test]
    fn test_missing_required_category() {
        let config = json!({
            "LENGTH": { "m": 1.0 },
            "MASS": { "kg": 1.0 },
            "TIME": { "s": 1.0 },
            "FORCE": { "N": 1.0 }
        });
        let err = UnitTable::load(&config).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("PRESSURE"));
    }

    #[test]
    fn test_rejects_bad_factors() {
        let mut config = small_config();
        config["LENGTH"]["mm"] = json!("a thousand");
        assert!(UnitTable::load(&config).is_err());

        let mut config = small_config();
        config["LENGTH"]["mm"] = json!(0.0);
        assert!(UnitTable::load(&config).is_err());

        let mut config = small_config();
        config["LENGTH"]["mm"] = json!(-1000.0);
        assert!(UnitTable::load(&config).is_err());
    }

    #[test]
    fn test_json_text_errors() {
        let err = UnitTable::from_json_str("{ \"LENGTH\": ").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");

        let err = UnitTable::from_json_str("[1, 2]").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_non_object_category() {
        let mut config = small_config();
        config["ANGLES"] = json!([1.0, 2.0]);
        assert!(UnitTable::load(&config).is_err());
    }

    #[test]
    fn test_category_order_follows_document() {
        let table = UnitTable::load(&small_config()).unwrap();
        let names: Vec<&str> = table.categories().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["LENGTH", "MASS", "TIME", "FORCE", "PRESSURE", "TORQUE"]);
    }

    #[test]
    fn test_bundled_table_loads() {
        let table = UnitTable::bundled().unwrap();
        assert!(table.category("ENERGY").is_some());
        assert!(table.factor("FORCE", "lbm-ft/s^2").is_some());
        assert!(table.factor(TORQUE, "ft-lbf").is_some());
        assert!(!table.is_empty());
    }
}
