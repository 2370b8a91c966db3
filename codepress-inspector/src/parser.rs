use std::path::{Path, PathBuf};
use swc_core::{
    common::{sync::Lrc, BytePos, FileName, SourceMap, SourceMapper, Span, Spanned},
    ecma::{
        ast::{EsVersion, Expr, Module},
        codegen::{to_code_default, Node},
        parser::{error::Error as SwcError, parse_file_as_expr, parse_file_as_module},
    },
};

use crate::error::{Diagnostic, ParseError};
use crate::language::{normalize_path, LanguageServices, LanguageVariant};

// -----------------------------------------------------------------------------
// Syntax tree
// -----------------------------------------------------------------------------

/// One parsed source file. Cloning deep-copies the module and shares the
/// source map, so a clone can be mutated without touching the original.
#[derive(Clone)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub variant: LanguageVariant,
    pub module: Module,
    cm: Lrc<SourceMap>,
}

impl SyntaxTree {
    pub fn source_map(&self) -> &Lrc<SourceMap> {
        &self.cm
    }

    /// Regenerated source text for the whole module.
    pub fn print(&self) -> String {
        print_node(&self.cm, &self.module)
    }

    pub fn with_module(&self, module: Module) -> Self {
        Self {
            path: self.path.clone(),
            variant: self.variant,
            module,
            cm: self.cm.clone(),
        }
    }

    /// `start-end` line range of a span, `None` for synthesized nodes.
    pub fn line_range(&self, span: Span) -> Option<(usize, usize)> {
        line_range(&self.cm, span)
    }
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.path)
            .field("variant", &self.variant)
            .field("items", &self.module.body.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

/// Parse a whole file. Recoverable errors are logged and the best-effort tree is
/// returned; only an unrecoverable error fails.
pub fn parse(services: &LanguageServices, text: &str, path: &Path) -> Result<SyntaxTree, ParseError> {
    let shown_path = normalize_path(&path.to_string_lossy());
    let variant = LanguageVariant::from_path(path)
        .ok_or_else(|| ParseError::UnsupportedFile { path: shown_path.clone() })?;

    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(shown_path.clone()).into(), text.to_string());

    let mut recovered = vec![];
    let result = parse_file_as_module(
        &fm,
        services.syntax(variant),
        EsVersion::EsNext,
        None,
        &mut recovered,
    );

    match result {
        Ok(module) => {
            for err in &recovered {
                let d = to_diagnostic(&cm, err);
                tracing::warn!("{}: recovered from syntax error at {}", shown_path, d);
            }
            Ok(SyntaxTree {
                path: path.to_path_buf(),
                variant,
                module,
                cm,
            })
        }
        Err(fatal) => {
            let mut diagnostics: Vec<Diagnostic> =
                recovered.iter().map(|e| to_diagnostic(&cm, e)).collect();
            diagnostics.push(to_diagnostic(&cm, &fatal));
            Err(ParseError::Syntax {
                path: shown_path,
                diagnostics,
            })
        }
    }
}

/// Parse a standalone expression fragment (an edited `{code}` value) into the
/// given source map. Trailing input after the expression is an error.
pub fn parse_expression(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    code: &str,
) -> Result<Box<Expr>, ParseError> {
    let fragment = code.trim();
    if fragment.is_empty() {
        return Err(ParseError::Fragment {
            message: "empty expression".into(),
        });
    }
    let fm = cm.new_source_file(
        FileName::Custom("<fragment>".into()).into(),
        fragment.to_string(),
    );

    let mut recovered = vec![];
    let expr = parse_file_as_expr(
        &fm,
        services.fragment_syntax(),
        EsVersion::EsNext,
        None,
        &mut recovered,
    )
    .map_err(|e| ParseError::Fragment {
        message: e.kind().msg().to_string(),
    })?;

    // A repaired fragment is not the code that was typed.
    if let Some(err) = recovered.first() {
        return Err(ParseError::Fragment {
            message: err.kind().msg().to_string(),
        });
    }

    if expr.span().hi() < fm.end_pos {
        let rest = trailing_text(cm, expr.span().hi(), fm.end_pos);
        return Err(ParseError::Fragment {
            message: format!("unexpected trailing input {rest:?}"),
        });
    }
    Ok(expr)
}

fn trailing_text(cm: &Lrc<SourceMap>, lo: BytePos, hi: BytePos) -> String {
    cm.span_to_snippet(Span::new(lo, hi)).unwrap_or_default()
}

fn to_diagnostic(cm: &Lrc<SourceMap>, err: &SwcError) -> Diagnostic {
    let span = err.span();
    let (line, column) = if span.is_dummy() {
        (0, 0)
    } else {
        let loc = cm.lookup_char_pos(span.lo());
        (loc.line, loc.col.0)
    };
    Diagnostic {
        line,
        column,
        message: err.kind().msg().to_string(),
    }
}

pub fn line_range(cm: &Lrc<SourceMap>, span: Span) -> Option<(usize, usize)> {
    if span.is_dummy() {
        return None;
    }
    let lo = cm.lookup_char_pos(span.lo());
    let hi = cm.lookup_char_pos(span.hi());
    Some((lo.line, hi.line))
}

// -----------------------------------------------------------------------------
// Printing
// -----------------------------------------------------------------------------

pub fn print_node<N: Node>(cm: &Lrc<SourceMap>, node: &N) -> String {
    to_code_default(cm.clone(), None, node)
}

pub fn print_expr(cm: &Lrc<SourceMap>, expr: &Expr) -> String {
    print_node(cm, expr)
}
