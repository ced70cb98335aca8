//! CLI commands

pub mod checksums;
pub mod compose;
pub mod differential;
pub mod extract;
pub mod inspect;
pub mod keygen;
pub mod pull;
pub mod sign;
pub mod verify;

use std::path::Path;

use skiff_core::SkiffConfig;
use skiff_repo::SourceOptions;

use crate::error::Result;

/// Flags shared by every command that reads a package source
pub struct SourceArgs<'a> {
    pub source: &'a str,
    pub key: Option<&'a Path>,
    pub shasum: Option<&'a str>,
    pub plain_http: bool,
}

impl SourceArgs<'_> {
    pub fn options(&self, config: &SkiffConfig) -> Result<SourceOptions> {
        let mut options = SourceOptions::from_config(config, self.source)?;
        options.shasum = self.shasum.map(str::to_string);
        options.plain_http = self.plain_http;
        if let Some(key) = self.key {
            options.public_key = Some(key.to_path_buf());
        }
        Ok(options)
    }
}
