use std::path::Path;
use swc_core::ecma::parser::{EsSyntax, Syntax, TsSyntax};

// -----------------------------------------------------------------------------
// Language variants
// -----------------------------------------------------------------------------

/// Source dialect of a file, picked from its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageVariant {
    Script,
    Jsx,
    TypeScript,
    Tsx,
}

impl LanguageVariant {
    pub const ALL: [LanguageVariant; 4] = [
        LanguageVariant::Script,
        LanguageVariant::Jsx,
        LanguageVariant::TypeScript,
        LanguageVariant::Tsx,
    ];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "js" | "mjs" | "cjs" => Some(LanguageVariant::Script),
            "jsx" => Some(LanguageVariant::Jsx),
            "ts" | "mts" | "cts" => Some(LanguageVariant::TypeScript),
            "tsx" => Some(LanguageVariant::Tsx),
            _ => None,
        }
    }

    pub fn is_typed(self) -> bool {
        matches!(self, LanguageVariant::TypeScript | LanguageVariant::Tsx)
    }

    /// Plain `.js` still gets JSX enabled: most React projects put markup in `.js` files.
    pub fn allows_markup(self) -> bool {
        !matches!(self, LanguageVariant::TypeScript)
    }

    fn index(self) -> usize {
        match self {
            LanguageVariant::Script => 0,
            LanguageVariant::Jsx => 1,
            LanguageVariant::TypeScript => 2,
            LanguageVariant::Tsx => 3,
        }
    }

    fn build_syntax(self) -> Syntax {
        if self.is_typed() {
            Syntax::Typescript(TsSyntax {
                tsx: self.allows_markup(),
                decorators: true,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: self.allows_markup(),
                decorators: true,
                ..Default::default()
            })
        }
    }
}

pub fn is_supported_path(path: &Path) -> bool {
    LanguageVariant::from_path(path).is_some()
}

// -----------------------------------------------------------------------------
// Language services
// -----------------------------------------------------------------------------

/// Parser configuration for every variant, built once by [`LanguageServices::init`]
/// and read-only afterwards. Passed down explicitly instead of living in a global.
#[derive(Debug, Clone)]
pub struct LanguageServices {
    syntaxes: [Syntax; 4],
    fragment: Syntax,
}

impl LanguageServices {
    pub fn init() -> Self {
        let syntaxes = LanguageVariant::ALL.map(LanguageVariant::build_syntax);
        tracing::debug!("language services ready for {} variants", syntaxes.len());
        Self {
            syntaxes,
            // Edited fragments may contain markup and type syntax.
            fragment: LanguageVariant::Tsx.build_syntax(),
        }
    }

    pub fn syntax(&self, variant: LanguageVariant) -> Syntax {
        self.syntaxes[variant.index()]
    }

    pub fn fragment_syntax(&self) -> Syntax {
        self.fragment
    }
}

impl Default for LanguageServices {
    fn default() -> Self {
        Self::init()
    }
}

// -----------------------------------------------------------------------------
// Path helpers
// -----------------------------------------------------------------------------

/// Normalize watcher/bundler style paths: forward slashes, no `file://` scheme.
pub fn normalize_path(path: &str) -> String {
    let mut s = path.replace('\\', "/");
    if let Some(rest) = s.strip_prefix("file:///") {
        s = format!("/{rest}");
    } else if let Some(rest) = s.strip_prefix("file://") {
        s = rest.to_string();
    }
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    s
}
