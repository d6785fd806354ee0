//! API compatibility check against a baseline schema version.
//!
//! The API surface is the set of declared messages, enums, services and RPC
//! signatures. Anything present in the baseline but missing now is a breaking
//! change; additions are reported but allowed.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::compiler::SchemaCompiler;
use crate::error::{CompilerError, Result};
use crate::parser::ProtoFile;

/// Declared API items of a schema version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiSurface {
    items: BTreeSet<String>,
}

impl ApiSurface {
    /// Collects the surface of parsed files.
    #[must_use]
    pub fn from_protos(protos: &[ProtoFile]) -> Self {
        let mut items = BTreeSet::new();
        for proto in protos {
            for message in &proto.messages {
                items.insert(format!("message {}", proto.qualify(&message.name)));
            }
            for e in &proto.enums {
                items.insert(format!("enum {}", proto.qualify(&e.name)));
            }
            for service in &proto.services {
                let service_name = proto.qualify(&service.name);
                items.insert(format!("service {service_name}"));
                for rpc in &service.rpcs {
                    items.insert(format!(
                        "rpc {service_name}/{}({}{}) returns ({}{})",
                        rpc.name,
                        if rpc.client_streaming { "stream " } else { "" },
                        rpc.request,
                        if rpc.server_streaming { "stream " } else { "" },
                        rpc.response,
                    ));
                }
            }
        }
        Self { items }
    }

    /// Parses every proto under `root` and collects its surface.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or parsing fails.
    pub fn from_root(root: &Path) -> Result<Self> {
        let paths = SchemaCompiler::discover(root)?;
        let protos = SchemaCompiler::parse_all(root, &paths)?;
        Ok(Self::from_protos(&protos))
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the surface is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Compares this surface against a baseline.
    #[must_use]
    pub fn diff(&self, baseline: &Self, baseline_version: impl Into<String>) -> CompatReport {
        CompatReport {
            baseline: baseline_version.into(),
            removed: baseline.items.difference(&self.items).cloned().collect(),
            added: self.items.difference(&baseline.items).cloned().collect(),
        }
    }
}

/// Result of a compatibility check.
#[derive(Debug, Clone, Serialize)]
pub struct CompatReport {
    /// Baseline version compared against.
    pub baseline: String,
    /// Items in the baseline missing from the current surface.
    pub removed: Vec<String>,
    /// Items new in the current surface.
    pub added: Vec<String>,
}

impl CompatReport {
    /// Returns true if nothing was removed.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.removed.is_empty()
    }

    /// Converts breaking changes into an error.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::IncompatibleApi`] if anything was removed.
    pub fn into_result(self) -> Result<Self> {
        info!(
            baseline = %self.baseline,
            removed = self.removed.len(),
            added = self.added.len(),
            "API compatibility check"
        );
        if self.is_compatible() {
            Ok(self)
        } else {
            Err(CompilerError::IncompatibleApi {
                baseline: self.baseline,
                count: self.removed.len(),
            })
        }
    }
}
