use std::result;

use thiserror::Error;

use super::SymbolKey;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketStateError {
    #[error("Symbol `{0}` already exists")]
    DuplicateSymbol(SymbolKey),

    #[error("Symbol `{0}` not found")]
    SymbolNotFound(SymbolKey),

    #[error("Folder `{0}` already exists")]
    DuplicateFolder(String),

    #[error("Folder `{0}` not found")]
    FolderNotFound(String),

    #[error("Market `{field}` is immutable, changed from `{from}` to `{to}`")]
    IdentityChanged {
        field: &'static str,
        from: String,
        to: String,
    },
}

pub(crate) type Result<T> = result::Result<T, MarketStateError>;
