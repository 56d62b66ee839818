//! Compatibility shims injected at the top of ESM output.
//!
//! Node's ESM loader does not provide `__dirname`, `__filename` or `require`.
//! Code bundled from CommonJS-era sources often relies on them, so the
//! packager can prepend small snippets that recreate them from
//! `import.meta.url`.

/// One import a shim needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimImport {
    /// Local binding name.
    pub alias: &'static str,
    /// Module specifier.
    pub module: &'static str,
    /// `import X from 'm'` when true, `import * as X from 'm'` otherwise.
    pub default_import: bool,
}

impl ShimImport {
    /// Render as a single import statement.
    pub fn statement(&self) -> String {
        if self.default_import {
            format!("import {} from '{}';", self.alias, self.module)
        } else {
            format!("import * as {} from '{}';", self.alias, self.module)
        }
    }
}

/// A named block of code plus the imports it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shim {
    pub name: &'static str,
    pub imports: &'static [ShimImport],
    pub code: &'static str,
}

/// Defines `__dirname` and `__filename`.
pub const DIRNAME_SHIM: Shim = Shim {
    name: "dirname",
    imports: &[
        ShimImport {
            alias: "__azf_shim_import_PATH",
            module: "path",
            default_import: true,
        },
        ShimImport {
            alias: "__azf_shim_import_URL",
            module: "url",
            default_import: true,
        },
    ],
    code: "const __dirname = __azf_shim_import_PATH.dirname(__azf_shim_import_URL.fileURLToPath(import.meta.url));\nconst __filename = __azf_shim_import_URL.fileURLToPath(import.meta.url);",
};

/// Defines a CommonJS `require` bound to the current module.
pub const REQUIRE_SHIM: Shim = Shim {
    name: "require",
    imports: &[ShimImport {
        alias: "__azf_shim_import_MODULE",
        module: "module",
        default_import: true,
    }],
    code: "const require = __azf_shim_import_MODULE.createRequire(import.meta.url);",
};

/// Render shims as one block of text.
///
/// Every import of every shim comes first, in order, one per line. The code
/// bodies follow, also in order. Bindings are therefore all in scope before
/// any shim body runs.
pub fn build_shim_text(shims: &[&Shim]) -> String {
    let imports = shims
        .iter()
        .flat_map(|shim| shim.imports.iter())
        .map(ShimImport::statement)
        .collect::<Vec<_>>()
        .join("\n");

    let code = shims
        .iter()
        .map(|shim| shim.code)
        .collect::<Vec<_>>()
        .join("\n");

    format!("{imports}\n{code}")
}
