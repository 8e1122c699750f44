//! # Reference Catalog
//!
//! Library values for every chromatography method: the internal standards
//! spiked into each sample (per polarity) and the targeted-metabolite panel of
//! each biological standard. Every delta computed by msqc is measured against
//! an entry in this catalog.
//!
//! The catalog is built once, either from the builtin panels
//! ([`ReferenceCatalog::builtin`]) or from a TOML file, validated, and then
//! shared read-only (`Arc<ReferenceCatalog>`) across requests.
//!
//! ## TOML layout
//!
//! ```toml
//! [[HILIC.internal_standards.positive]]
//! name = "Methionine d8"
//! retention_time = 7.479
//! precursor_mz = 158.1085
//!
//! [[HILIC.biological_standards.Urine.positive]]
//! name = "Creatinine"
//! inchikey = "DDRJAANPRJIHGJ-UHFFFAOYSA-N"
//! retention_time = 4.25
//! precursor_mz = 114.0662
//! ```

mod builtin;
mod error;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QcError;
use crate::table::ScalarMap;

pub use error::CatalogError;

/// Chromatography method of an instrument run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chromatography {
    /// Hydrophilic interaction chromatography
    #[serde(rename = "HILIC")]
    Hilic,
    /// Reversed phase C18
    C18,
    /// Lipidomics method
    Lipidomics,
}

impl Chromatography {
    /// All known methods
    pub const ALL: [Chromatography; 3] =
        [Chromatography::Hilic, Chromatography::C18, Chromatography::Lipidomics];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Chromatography::Hilic => "HILIC",
            Chromatography::C18 => "C18",
            Chromatography::Lipidomics => "Lipidomics",
        }
    }
}

impl fmt::Display for Chromatography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chromatography {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chromatography::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownChromatography(s.to_string()))
    }
}

/// Electrospray ionization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarity {
    /// Positive mode
    #[serde(rename = "pos")]
    Positive,
    /// Negative mode
    #[serde(rename = "neg")]
    Negative,
}

impl Polarity {
    /// Both polarities, positive first
    pub const BOTH: [Polarity; 2] = [Polarity::Positive, Polarity::Negative];

    /// Short name used in table and file names (`pos` / `neg`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "pos",
            Polarity::Negative => "neg",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Polarity {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pos" | "positive" | "+" => Ok(Polarity::Positive),
            "neg" | "negative" | "-" => Ok(Polarity::Negative),
            _ => Err(CatalogError::UnknownPolarity(s.to_string())),
        }
    }
}

/// Library reference for one internal standard or targeted metabolite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Compound name, as used for table column headers
    pub name: String,
    /// Library retention time (minutes)
    pub retention_time: f64,
    /// Library precursor m/z
    pub precursor_mz: f64,
    /// InChIKey (targeted metabolites)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inchikey: Option<String>,
}

impl LibraryEntry {
    /// Create an entry without an InChIKey
    pub fn new(name: impl Into<String>, retention_time: f64, precursor_mz: f64) -> Self {
        Self {
            name: name.into(),
            retention_time,
            precursor_mz,
            inchikey: None,
        }
    }
}

/// An internal standard is a library entry scoped to a method and polarity
pub type InternalStandard = LibraryEntry;

/// A targeted metabolite of a biological standard panel
pub type TargetedMetabolite = LibraryEntry;

/// Positive and negative mode panels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolarityPanels {
    /// Positive mode entries, in display order
    #[serde(default)]
    pub positive: Vec<LibraryEntry>,
    /// Negative mode entries, in display order
    #[serde(default)]
    pub negative: Vec<LibraryEntry>,
}

impl PolarityPanels {
    /// Entries for one polarity
    pub fn panel(&self, polarity: Polarity) -> &[LibraryEntry] {
        match polarity {
            Polarity::Positive => &self.positive,
            Polarity::Negative => &self.negative,
        }
    }

    fn validate(&self, context: &str) -> Result<(), CatalogError> {
        for polarity in Polarity::BOTH {
            let mut seen = BTreeSet::new();
            for entry in self.panel(polarity) {
                if !seen.insert(entry.name.as_str()) {
                    return Err(CatalogError::DuplicateEntry {
                        context: format!("{} ({})", context, polarity),
                        name: entry.name.clone(),
                    });
                }
                if !(entry.retention_time.is_finite() && entry.retention_time >= 0.0)
                    || !(entry.precursor_mz.is_finite() && entry.precursor_mz > 0.0)
                {
                    return Err(CatalogError::InvalidEntry {
                        context: context.to_string(),
                        name: entry.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Reference data for one chromatography method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodCatalog {
    /// Internal standards spiked into every sample
    #[serde(default)]
    pub internal_standards: PolarityPanels,
    /// Targeted-metabolite panels, keyed by biological standard name
    #[serde(default)]
    pub biological_standards: BTreeMap<String, PolarityPanels>,
}

/// Which library panel a measurement table is compared against
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Panel {
    /// Internal standards of the method
    InternalStandards,
    /// Targeted metabolites of a biological standard
    BiologicalStandard(String),
}

impl Panel {
    /// Header of the name column in per-sample metric tables
    pub fn name_column(&self) -> &'static str {
        match self {
            Panel::InternalStandards => "Internal Standard",
            Panel::BiologicalStandard(_) => "Metabolite",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Panel::InternalStandards => write!(f, "internal standards"),
            Panel::BiologicalStandard(name) => write!(f, "{} panel", name),
        }
    }
}

/// Immutable library reference catalog, keyed by chromatography method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceCatalog {
    methods: BTreeMap<Chromatography, MethodCatalog>,
}

impl ReferenceCatalog {
    /// Build and validate a catalog from per-method data
    pub fn new(methods: BTreeMap<Chromatography, MethodCatalog>) -> Result<Self, CatalogError> {
        let catalog = Self { methods };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The panels shipped with msqc
    pub fn builtin() -> Self {
        Self {
            methods: builtin::methods(),
        }
    }

    /// Load a catalog from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a catalog from TOML (top-level tables are method names)
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let raw: BTreeMap<String, MethodCatalog> = toml::from_str(content)?;
        let methods = raw
            .into_iter()
            .map(|(name, method)| Ok((name.parse::<Chromatography>()?, method)))
            .collect::<Result<BTreeMap<_, _>, CatalogError>>()?;
        Self::new(methods)
    }

    /// Serialize the catalog back to TOML
    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        let raw: BTreeMap<&str, &MethodCatalog> =
            self.methods.iter().map(|(c, m)| (c.as_str(), m)).collect();
        Ok(toml::to_string(&raw)?)
    }

    /// Check entry names are unique per panel and that positive and negative
    /// internal standard sets are disjoint for every method.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (chromatography, method) in &self.methods {
            let context = format!("{} internal standards", chromatography);
            method.internal_standards.validate(&context)?;

            let positive: BTreeSet<&str> = method
                .internal_standards
                .positive
                .iter()
                .map(|e| e.name.as_str())
                .collect();
            if let Some(shared) = method
                .internal_standards
                .negative
                .iter()
                .find(|e| positive.contains(e.name.as_str()))
            {
                return Err(CatalogError::OverlappingPolarity {
                    chromatography: *chromatography,
                    name: shared.name.clone(),
                });
            }

            for (standard, panels) in &method.biological_standards {
                panels.validate(&format!("{} {}", chromatography, standard))?;
            }
        }
        Ok(())
    }

    /// Methods present in the catalog
    pub fn methods(&self) -> impl Iterator<Item = Chromatography> + '_ {
        self.methods.keys().copied()
    }

    /// Reference data for one method
    pub fn method(&self, chromatography: Chromatography) -> Option<&MethodCatalog> {
        self.methods.get(&chromatography)
    }

    /// Internal standards for a method and polarity (empty when unknown)
    pub fn internal_standards(&self, chromatography: Chromatography, polarity: Polarity) -> &[InternalStandard] {
        self.method(chromatography)
            .map(|m| m.internal_standards.panel(polarity))
            .unwrap_or(&[])
    }

    /// Look up one internal standard
    pub fn internal_standard(
        &self,
        chromatography: Chromatography,
        polarity: Polarity,
        name: &str,
    ) -> Result<&InternalStandard, QcError> {
        find_entry(self.internal_standards(chromatography, polarity), name).ok_or_else(|| {
            QcError::ReferenceNotFound {
                name: name.to_string(),
                chromatography,
                polarity,
            }
        })
    }

    /// Biological standards configured for a method
    pub fn biological_standards(&self, chromatography: Chromatography) -> Vec<&str> {
        self.method(chromatography)
            .map(|m| m.biological_standards.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Targeted-metabolite panel of a biological standard
    pub fn targeted_metabolites(
        &self,
        chromatography: Chromatography,
        biological_standard: &str,
        polarity: Polarity,
    ) -> Option<&[TargetedMetabolite]> {
        self.method(chromatography)?
            .biological_standards
            .get(biological_standard)
            .map(|panels| panels.panel(polarity))
    }

    /// Look up one targeted metabolite
    pub fn targeted_metabolite(
        &self,
        chromatography: Chromatography,
        biological_standard: &str,
        polarity: Polarity,
        name: &str,
    ) -> Result<&TargetedMetabolite, QcError> {
        self.targeted_metabolites(chromatography, biological_standard, polarity)
            .and_then(|panel| find_entry(panel, name))
            .ok_or_else(|| QcError::ReferenceNotFound {
                name: name.to_string(),
                chromatography,
                polarity,
            })
    }

    /// Entries of any panel (empty when unknown)
    pub fn panel(&self, chromatography: Chromatography, panel: &Panel, polarity: Polarity) -> &[LibraryEntry] {
        match panel {
            Panel::InternalStandards => self.internal_standards(chromatography, polarity),
            Panel::BiologicalStandard(name) => self
                .targeted_metabolites(chromatography, name, polarity)
                .unwrap_or(&[]),
        }
    }

    /// Look up one entry of any panel
    pub fn entry(
        &self,
        chromatography: Chromatography,
        panel: &Panel,
        polarity: Polarity,
        name: &str,
    ) -> Result<&LibraryEntry, QcError> {
        match panel {
            Panel::InternalStandards => self.internal_standard(chromatography, polarity, name),
            Panel::BiologicalStandard(standard) => {
                self.targeted_metabolite(chromatography, standard, polarity, name)
            }
        }
    }

    /// Map a targeted-metabolite InChIKey to its panel name
    pub fn metabolite_by_inchikey(
        &self,
        chromatography: Chromatography,
        biological_standard: &str,
        polarity: Polarity,
        inchikey: &str,
    ) -> Option<&TargetedMetabolite> {
        self.targeted_metabolites(chromatography, biological_standard, polarity)?
            .iter()
            .find(|e| e.inchikey.as_deref() == Some(inchikey))
    }

    /// Flatten the catalog into a scalar map.
    ///
    /// Keys look like `HILIC.pos.Methionine d8.retention_time` and
    /// `HILIC.Urine.pos.Creatinine.precursor_mz`. Restrict to one method with
    /// `only`.
    pub fn to_scalar_map(&self, only: Option<Chromatography>) -> ScalarMap {
        let mut map = ScalarMap::new();
        for (chromatography, method) in &self.methods {
            if only.is_some_and(|c| c != *chromatography) {
                continue;
            }
            let prefix = chromatography.as_str().to_string();
            flatten_panels(&mut map, &prefix, &method.internal_standards);
            for (standard, panels) in &method.biological_standards {
                flatten_panels(&mut map, &format!("{}.{}", prefix, standard), panels);
            }
        }
        map
    }
}

fn find_entry<'a>(panel: &'a [LibraryEntry], name: &str) -> Option<&'a LibraryEntry> {
    panel.iter().find(|e| e.name == name)
}

fn flatten_panels(map: &mut ScalarMap, prefix: &str, panels: &PolarityPanels) {
    for polarity in Polarity::BOTH {
        for entry in panels.panel(polarity) {
            let base = format!("{}.{}.{}", prefix, polarity, entry.name);
            map.insert(format!("{}.retention_time", base), Value::from(entry.retention_time));
            map.insert(format!("{}.precursor_mz", base), Value::from(entry.precursor_mz));
            if let Some(inchikey) = &entry.inchikey {
                map.insert(format!("{}.inchikey", base), Value::from(inchikey.clone()));
            }
        }
    }
}
