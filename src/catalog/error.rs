use super::Chromatography;

/// Errors that can occur while loading or validating a reference catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// I/O error reading a catalog file
    #[error("Failed to read catalog: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Catalog TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Catalog TOML serialization error: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    /// Method name not recognised
    #[error("Unknown chromatography method: {0}")]
    UnknownChromatography(String),

    /// Polarity name not recognised
    #[error("Unknown polarity: {0}")]
    UnknownPolarity(String),

    /// The same name appears twice in one panel
    #[error("Duplicate entry '{name}' in {context}")]
    DuplicateEntry {
        /// Panel description
        context: String,
        /// Repeated name
        name: String,
    },

    /// A standard is listed for both polarities of one method
    #[error("Internal standard '{name}' is listed in both polarities for {chromatography}")]
    OverlappingPolarity {
        /// Method
        chromatography: Chromatography,
        /// Shared name
        name: String,
    },

    /// Non-finite or negative library value
    #[error("Invalid library values for '{name}' in {context}")]
    InvalidEntry {
        /// Panel description
        context: String,
        /// Entry name
        name: String,
    },
}
