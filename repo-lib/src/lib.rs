mod name;
mod object;
mod store;
mod store_db;
mod trie;

pub use name::*;
pub use object::*;
pub use store::*;
pub use store_db::*;
pub use trie::*;

use thiserror::Error;

#[macro_use]
extern crate log;

#[cfg(test)]
mod store_tests;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("internal error: {0}")]
    Internal(String),
    #[error("failed to open storage: {0}")]
    Open(String),
    #[error("write rejected: {0}")]
    Write(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("header too short: {0}")]
    HeaderParse(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid param: {0}")]
    InvalidParam(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(err: rusqlite::Error) -> Self {
        RepoError::Db(err.to_string())
    }
}
