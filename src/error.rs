use thiserror::Error;

/// Errors surfaced by the packing core
///
/// There is no partial-success mode: any of these aborts the whole emission.
/// Unresolvable prescribed-order entries are *not* errors; they are dropped
/// and logged by the order loader.
#[derive(Error, Debug)]
pub enum DexpackError {
    /// The emitted container sequence would violate a structural rule of the
    /// dex container format or of the prescribed-order walk.
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    /// The configuration or the prescribed-order input is malformed.
    #[error("configuration violation: {0}")]
    ConfigViolation(String),

    /// A plugin contradicted an earlier decision of the driver.
    #[error("plugin conflict: {0}")]
    PluginConflict(String),
}

pub type Result<T> = std::result::Result<T, DexpackError>;
