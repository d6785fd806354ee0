//! Cargo registry publish request encoding.
//!
//! `PUT /api/v1/crates/new` takes a single binary body:
//!
//! ```text
//! u32 LE  length of the JSON metadata
//! [u8]    JSON metadata
//! u32 LE  length of the .crate tarball
//! [u8]    .crate tarball
//! ```

use std::collections::BTreeMap;

use otlp_bindings_core::LibraryArtifact;
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};

/// Metadata part of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrate {
    /// Crate name.
    pub name: String,
    /// Crate version.
    pub vers: String,
    /// Dependencies.
    pub deps: Vec<NewCrateDependency>,
    /// Feature table.
    pub features: BTreeMap<String, Vec<String>>,
    /// Authors.
    pub authors: Vec<String>,
    /// Description.
    pub description: Option<String>,
    /// Documentation URL.
    pub documentation: Option<String>,
    /// Homepage URL.
    pub homepage: Option<String>,
    /// README contents.
    pub readme: Option<String>,
    /// README path inside the crate.
    pub readme_file: Option<String>,
    /// Keywords.
    pub keywords: Vec<String>,
    /// Categories.
    pub categories: Vec<String>,
    /// SPDX license expression.
    pub license: Option<String>,
    /// License file path.
    pub license_file: Option<String>,
    /// Repository URL.
    pub repository: Option<String>,
    /// Badges (deprecated, always empty).
    pub badges: BTreeMap<String, BTreeMap<String, String>>,
    /// Native library linked, if any.
    pub links: Option<String>,
}

/// A dependency entry of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrateDependency {
    /// Dependency name.
    pub name: String,
    /// Version requirement.
    pub version_req: String,
    /// Enabled features.
    pub features: Vec<String>,
    /// Whether the dependency is optional.
    pub optional: bool,
    /// Whether default features are enabled.
    pub default_features: bool,
    /// Target platform, if conditional.
    pub target: Option<String>,
    /// Dependency kind: `normal`, `dev` or `build`.
    pub kind: String,
}

impl NewCrate {
    /// Builds publish metadata from an artifact.
    ///
    /// The README contents are taken from the artifact's declared README file.
    #[must_use]
    pub fn from_artifact(artifact: &LibraryArtifact) -> Self {
        let m = &artifact.metadata;
        let readme = m
            .readme_file
            .as_deref()
            .and_then(|path| artifact.file(path))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        Self {
            name: artifact.name.clone(),
            vers: artifact.version.clone(),
            deps: m
                .dependencies
                .iter()
                .map(|d| NewCrateDependency {
                    name: d.name.clone(),
                    version_req: d.version_req.clone(),
                    features: d.features.clone(),
                    optional: false,
                    default_features: d.default_features,
                    target: None,
                    kind: "normal".to_string(),
                })
                .collect(),
            features: BTreeMap::new(),
            authors: m.authors.clone(),
            description: m.description.clone(),
            documentation: None,
            homepage: None,
            readme,
            readme_file: m.readme_file.clone(),
            keywords: m.keywords.clone(),
            categories: m.categories.clone(),
            license: m.license.clone(),
            license_file: None,
            repository: m.repository.clone(),
            badges: BTreeMap::new(),
            links: None,
        }
    }
}

/// Frames metadata and tarball into a publish body.
///
/// # Errors
///
/// Returns an error if the metadata cannot be serialized or either part
/// exceeds 4 GiB.
pub fn encode_publish_body(metadata: &NewCrate, crate_bytes: &[u8]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(metadata)?;
    let json_len = frame_len(json.len())?;
    let crate_len = frame_len(crate_bytes.len())?;

    let mut body = Vec::with_capacity(8 + json.len() + crate_bytes.len());
    body.extend_from_slice(&json_len.to_le_bytes());
    body.extend_from_slice(&json);
    body.extend_from_slice(&crate_len.to_le_bytes());
    body.extend_from_slice(crate_bytes);
    Ok(body)
}

/// Splits a publish body into metadata and tarball.
///
/// # Errors
///
/// Returns an error if the framing is truncated or the metadata is not
/// valid JSON.
pub fn decode_publish_body(body: &[u8]) -> Result<(NewCrate, Vec<u8>)> {
    let (json, rest) = read_frame(body)?;
    let (crate_bytes, rest) = read_frame(rest)?;
    if !rest.is_empty() {
        return Err(malformed(format!("{} trailing byte(s)", rest.len())));
    }
    Ok((serde_json::from_slice(json)?, crate_bytes.to_vec()))
}

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PublishError::InvalidConfig {
        message: format!("publish body part of {len} bytes exceeds the 4 GiB frame limit"),
    })
}

fn read_frame(input: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = input
        .split_first_chunk::<4>()
        .ok_or_else(|| malformed("truncated length prefix".to_string()))?;
    let len = u32::from_le_bytes(*len) as usize;
    if rest.len() < len {
        return Err(malformed(format!(
            "frame declares {len} bytes but {} remain",
            rest.len()
        )));
    }
    Ok(rest.split_at(len))
}

const fn malformed(message: String) -> PublishError {
    PublishError::InvalidConfig { message }
}
