//! Blueprints compiled into the binary, used when no disk source is configured.

/// `(path, contents)` pairs relative to the collection root.
pub const BUNDLE: &[(&str, &str)] = &[
    (
        "simple/README.md.tmpl",
        include_str!("../../../blueprints/simple/README.md.tmpl"),
    ),
    (
        "simple/gitignore",
        include_str!("../../../blueprints/simple/gitignore"),
    ),
    (
        "simple/main.go.tmpl",
        include_str!("../../../blueprints/simple/main.go.tmpl"),
    ),
    (
        "simple/template.yaml",
        include_str!("../../../blueprints/simple/template.yaml"),
    ),
    (
        "api/Dockerfile.tmpl",
        include_str!("../../../blueprints/api/Dockerfile.tmpl"),
    ),
    (
        "api/README.md.tmpl",
        include_str!("../../../blueprints/api/README.md.tmpl"),
    ),
    (
        "api/cmd/server/main.go.tmpl",
        include_str!("../../../blueprints/api/cmd/server/main.go.tmpl"),
    ),
    (
        "api/fragments/dependencies.yaml",
        include_str!("../../../blueprints/api/fragments/dependencies.yaml"),
    ),
    (
        "api/fragments/variables.yaml",
        include_str!("../../../blueprints/api/fragments/variables.yaml"),
    ),
    (
        "api/internal/config/config.go.tmpl",
        include_str!("../../../blueprints/api/internal/config/config.go.tmpl"),
    ),
    (
        "api/internal/database/database.go.tmpl",
        include_str!("../../../blueprints/api/internal/database/database.go.tmpl"),
    ),
    (
        "api/internal/logger/logger.go.tmpl",
        include_str!("../../../blueprints/api/internal/logger/logger.go.tmpl"),
    ),
    (
        "api/template.yaml",
        include_str!("../../../blueprints/api/template.yaml"),
    ),
    (
        "cli/cmd/root.go.tmpl",
        include_str!("../../../blueprints/cli/cmd/root.go.tmpl"),
    ),
    (
        "cli/main.go.tmpl",
        include_str!("../../../blueprints/cli/main.go.tmpl"),
    ),
    (
        "cli/template.yaml",
        include_str!("../../../blueprints/cli/template.yaml"),
    ),
];
