//! Verification of generated code.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::compiler::CompileOutput;
use crate::error::{CompilerError, Result};

/// Findings of a verification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Packages checked.
    pub packages: usize,
    /// Services checked.
    pub services: usize,
    /// Problems found, one line each.
    pub failures: Vec<String>,
}

impl VerificationReport {
    /// Returns true if nothing is missing.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::VerificationError`] if anything is missing.
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(CompilerError::VerificationError {
                message: self.failures.join("; "),
            })
        }
    }
}

/// Checks that every parsed package produced a generated file included from
/// `lib.rs`, and that every service produced client and server modules.
///
/// # Errors
///
/// Returns an error if a generated file exists but cannot be read.
pub fn verify_generated(output: &CompileOutput, src_dir: &Path) -> Result<VerificationReport> {
    let mut report = VerificationReport::default();

    let lib_path = src_dir.join("lib.rs");
    let lib = read_optional(&lib_path)?;
    if lib.is_none() {
        report.failures.push("src/lib.rs is missing".to_string());
    }

    let mut services_by_file: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for proto in &output.protos {
        services_by_file
            .entry(proto.generated_file_name())
            .or_default()
            .extend(proto.services.iter().map(|s| s.name.as_str()));
    }

    for (file_name, services) in &services_by_file {
        report.packages += 1;
        let Some(generated) = read_optional(&src_dir.join(file_name))? else {
            report.failures.push(format!("{file_name} was not generated"));
            continue;
        };

        if let Some(lib) = &lib {
            if !lib.contains(&format!("include!(\"{file_name}\")")) {
                report
                    .failures
                    .push(format!("{file_name} is not included from lib.rs"));
            }
        }

        for service in services {
            report.services += 1;
            let module = to_snake_case(service);
            for side in ["client", "server"] {
                if !generated.contains(&format!("pub mod {module}_{side}")) {
                    report
                        .failures
                        .push(format!("{file_name}: {service} has no {side} module"));
                }
            }
        }
    }

    debug!(
        packages = report.packages,
        services = report.services,
        failures = report.failures.len(),
        "Verified generated code"
    );
    Ok(report)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .map_err(|e| CompilerError::io(path, e))
}

/// Converts a service name to the module name the stub generator uses.
///
/// An underscore goes before every uppercase character except the first,
/// so acronyms are split letter by letter (`TraceService` -> `trace_service`,
/// `HTTPService` -> `h_t_t_p_service`).
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c.to_ascii_lowercase());
        if chars.peek().is_some_and(|next| next.is_uppercase()) {
            out.push('_');
        }
    }
    out
}
