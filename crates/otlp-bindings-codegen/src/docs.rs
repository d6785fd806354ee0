//! README generation for the bindings crate.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use otlp_bindings_core::SchemaVersion;

use crate::parser::ProtoFile;
use crate::scaffold::module_path;
use crate::verify::to_snake_case;

/// Renders a README indexing every package and service.
#[must_use]
pub fn render_readme(crate_name: &str, version: &SchemaVersion, protos: &[ProtoFile]) -> String {
    let mut packages: BTreeMap<&str, Vec<&ProtoFile>> = BTreeMap::new();
    for proto in protos {
        packages
            .entry(proto.package.as_deref().unwrap_or("(no package)"))
            .or_default()
            .push(proto);
    }

    let mut out = String::new();
    let _ = writeln!(out, "# {crate_name}\n");
    let _ = writeln!(
        out,
        "Rust bindings for the OpenTelemetry Protocol (OTLP), generated from \
         [opentelemetry-proto {}](https://github.com/open-telemetry/opentelemetry-proto/tree/{}).\n",
        version,
        version.tag()
    );
    out.push_str("Messages are generated with `prost`; gRPC clients and servers with `tonic`.\n\n");

    out.push_str("## Packages\n\n");
    out.push_str("| Package | Messages | Enums | Services |\n");
    out.push_str("|---|---|---|---|\n");
    for (package, files) in &packages {
        let messages: usize = files.iter().map(|f| f.messages.len()).sum();
        let enums: usize = files.iter().map(|f| f.enums.len()).sum();
        let services: usize = files.iter().map(|f| f.services.len()).sum();
        let _ = writeln!(out, "| `{package}` | {messages} | {enums} | {services} |");
    }

    let services: Vec<_> = packages
        .iter()
        .flat_map(|(package, files)| {
            files
                .iter()
                .flat_map(|f| f.services.iter().map(move |s| (f.package.as_deref(), s)))
                .map(move |(path, s)| (*package, path, s))
        })
        .collect();

    if !services.is_empty() {
        out.push_str("\n## Services\n");
        for (package, path, service) in services {
            let module = path.map_or_else(String::new, |p| format!("{}::", module_path(p)));
            let snake = to_snake_case(&service.name);
            let _ = writeln!(out, "\n### `{package}.{}`\n", service.name);
            let _ = writeln!(
                out,
                "Client: `{module}{snake}_client`, server: `{module}{snake}_server`.\n"
            );
            for rpc in &service.rpcs {
                let _ = writeln!(
                    out,
                    "- `{}({}{}) -> {}{}`",
                    rpc.name,
                    if rpc.client_streaming { "stream " } else { "" },
                    rpc.request,
                    if rpc.server_streaming { "stream " } else { "" },
                    rpc.response
                );
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_indexes_packages_and_services() {
        let protos = vec![
            ProtoFile::parse_source(
                "syntax = \"proto3\";\npackage opentelemetry.proto.common.v1;\nmessage AnyValue {}\nmessage KeyValue {}\n",
                "opentelemetry/proto/common/v1/common.proto",
            )
            .unwrap(),
            ProtoFile::parse_source(
                "syntax = \"proto3\";\npackage opentelemetry.proto.collector.metrics.v1;\n\
                 service MetricsService {\n  rpc Export(Req) returns (Resp) {}\n}\n",
                "opentelemetry/proto/collector/metrics/v1/metrics_service.proto",
            )
            .unwrap(),
        ];

        let readme = render_readme("otlp", &SchemaVersion::new(1, 0, 0), &protos);

        assert!(readme.starts_with("# otlp\n"));
        assert!(readme.contains("/tree/v1.0.0"));
        assert!(readme.contains("| `opentelemetry.proto.common.v1` | 2 | 0 | 0 |"));
        assert!(readme.contains(
            "`opentelemetry::proto::collector::metrics::v1::metrics_service_client`"
        ));
        assert!(readme.contains("- `Export(Req) -> Resp`"));
    }

    #[test]
    fn test_readme_module_paths_match_generated_modules() {
        let protos = vec![ProtoFile::parse_source(
            "syntax = \"proto3\";\npackage acme.type.v1;\n\
             service HTTPService {\n  rpc Get(Req) returns (Resp) {}\n}\n",
            "acme/type/v1/http.proto",
        )
        .unwrap()];

        let readme = render_readme("otlp", &SchemaVersion::new(1, 0, 0), &protos);

        assert!(readme.contains("`acme::r#type::v1::h_t_t_p_service_client`"));
        assert!(readme.contains("`acme::r#type::v1::h_t_t_p_service_server`"));
    }

    #[test]
    fn test_readme_without_services() {
        let protos = vec![ProtoFile::parse_source("package a.v1;", "a/v1/a.proto").unwrap()];
        let readme = render_readme("otlp", &SchemaVersion::new(1, 0, 0), &protos);
        assert!(!readme.contains("## Services"));
    }
}
