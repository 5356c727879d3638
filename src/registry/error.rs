use thiserror::Error;

use crate::bridge::BridgeError;
use crate::catalog::CatalogError;
use crate::config::SettingsError;
use crate::metadata::SchemaError;
use crate::table::TableError;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
