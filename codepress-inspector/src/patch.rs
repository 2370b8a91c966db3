use swc_core::{
    common::{sync::Lrc, SourceMap, SyntaxContext, DUMMY_SP},
    ecma::ast::*,
};

use crate::error::PatchError;
use crate::language::LanguageServices;
use crate::parser::parse_expression;
use crate::props::{attr_display_name, PropValue, TEXT_CONTENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchAction {
    Inserted,
    Replaced,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub action: PatchAction,
    /// Set when a `{code}` value did not parse and a placeholder literal was written.
    pub fallback: Option<PatchError>,
}

impl PatchOutcome {
    fn done(action: PatchAction) -> Self {
        Self { action, fallback: None }
    }
}

/// Mutates `element` in place. Callers patch a clone they intend to keep.
pub fn apply_property_patch(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    element: &mut JSXElement,
    name: &str,
    value: &PropValue,
) -> Result<PatchOutcome, PatchError> {
    if name.starts_with("...") {
        return Err(PatchError::ReadOnly(name.to_string()));
    }
    if name == TEXT_CONTENT {
        return patch_text_content(services, cm, element, value);
    }

    let attrs = &mut element.opening.attrs;
    let existing = attrs.iter().position(|a| match a {
        JSXAttrOrSpread::JSXAttr(attr) => attr_display_name(&attr.name) == name,
        JSXAttrOrSpread::SpreadElement(_) => false,
    });

    if *value == PropValue::Undefined {
        return Ok(match existing {
            Some(idx) => {
                attrs.remove(idx);
                tracing::debug!("removed prop '{}'", name);
                PatchOutcome::done(PatchAction::Removed)
            }
            None => PatchOutcome::done(PatchAction::Unchanged),
        });
    }

    if existing.is_none() && !is_valid_attr_name(name) {
        return Err(PatchError::InvalidName(name.to_string()));
    }

    let (new_value, fallback) = attr_value_node(services, cm, name, value);

    let action = match existing {
        Some(idx) => {
            if let JSXAttrOrSpread::JSXAttr(attr) = &mut attrs[idx] {
                attr.value = new_value;
            }
            tracing::debug!("updated prop '{}'", name);
            PatchAction::Replaced
        }
        None => {
            attrs.push(JSXAttrOrSpread::JSXAttr(JSXAttr {
                span: DUMMY_SP,
                name: JSXAttrName::Ident(IdentName::new(name.into(), DUMMY_SP)),
                value: new_value,
            }));
            tracing::debug!("added prop '{}'", name);
            PatchAction::Inserted
        }
    };

    Ok(PatchOutcome { action, fallback })
}

/// Plain identifier-like names, hyphens allowed (`data-foo`, `aria-label`).
fn is_valid_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-'))
}

// -----------------------------------------------------------------------------
// Value nodes
// -----------------------------------------------------------------------------

fn container(expr: Expr) -> JSXExprContainer {
    JSXExprContainer {
        span: DUMMY_SP,
        expr: JSXExpr::Expr(Box::new(expr)),
    }
}

fn str_lit(value: &str) -> Lit {
    Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    })
}

fn ident_expr(sym: &str) -> Expr {
    Expr::Ident(Ident::new(sym.into(), DUMMY_SP, SyntaxContext::empty()))
}

fn number_expr(n: f64) -> Expr {
    if n.is_nan() {
        return ident_expr("NaN");
    }
    let magnitude = if n.is_infinite() {
        ident_expr("Infinity")
    } else {
        Expr::Lit(Lit::Num(Number {
            span: DUMMY_SP,
            value: n.abs(),
            raw: None,
        }))
    };
    if n.is_sign_negative() && n != 0.0 {
        Expr::Unary(UnaryExpr {
            span: DUMMY_SP,
            op: UnaryOp::Minus,
            arg: Box::new(magnitude),
        })
    } else {
        magnitude
    }
}

/// JSX attribute strings have no escapes and decode `&` entities, so quotes,
/// backslashes, ampersands and line breaks need an expression container.
fn fits_attr_string(s: &str) -> bool {
    !s.contains(['"', '\\', '&', '\n', '\r'])
}

fn string_attr(s: &str) -> JSXAttrValue {
    if fits_attr_string(s) {
        JSXAttrValue::Lit(str_lit(s))
    } else {
        JSXAttrValue::JSXExprContainer(container(Expr::Lit(str_lit(s))))
    }
}

/// Expression for a non-string value, with a placeholder for code that does not parse.
fn value_expr(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    name: &str,
    value: &PropValue,
) -> (Expr, Option<PatchError>) {
    match value {
        PropValue::Undefined => (ident_expr("undefined"), None),
        PropValue::Null => (Expr::Lit(Lit::Null(Null { span: DUMMY_SP })), None),
        PropValue::Bool(b) => (
            Expr::Lit(Lit::Bool(Bool {
                span: DUMMY_SP,
                value: *b,
            })),
            None,
        ),
        PropValue::Number(n) => (number_expr(*n), None),
        PropValue::String(s) => (Expr::Lit(str_lit(s)), None),
        PropValue::Code(c) => code_expr(services, cm, name, &c.code),
        PropValue::Style(map) => code_expr(services, cm, name, &map.to_code().code),
    }
}

fn code_expr(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    name: &str,
    code: &str,
) -> (Expr, Option<PatchError>) {
    match parse_expression(services, cm, code) {
        Ok(expr) => (*expr, None),
        Err(e) => {
            tracing::warn!("error parsing expression code for '{}' {:?}: {}", name, code, e);
            let placeholder = format!("/* Invalid Code: {code} */");
            (
                Expr::Lit(str_lit(&placeholder)),
                Some(PatchError::InvalidCode {
                    name: name.to_string(),
                    code: code.to_string(),
                    message: e.to_string(),
                }),
            )
        }
    }
}

fn attr_value_node(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    name: &str,
    value: &PropValue,
) -> (Option<JSXAttrValue>, Option<PatchError>) {
    match value {
        PropValue::Bool(true) => (None, None),
        PropValue::String(s) => (Some(string_attr(s)), None),
        other => {
            let (expr, fallback) = value_expr(services, cm, name, other);
            let node = match expr {
                Expr::Lit(Lit::Str(s)) if fallback.is_some() => string_attr(&s.value.to_string()),
                expr => JSXAttrValue::JSXExprContainer(container(expr)),
            };
            (Some(node), fallback)
        }
    }
}

// -----------------------------------------------------------------------------
// Text content
// -----------------------------------------------------------------------------

fn meaningful_children(element: &JSXElement) -> Vec<&JSXElementChild> {
    element
        .children
        .iter()
        .filter(|c| match c {
            JSXElementChild::JSXText(t) => !t.value.trim().is_empty(),
            JSXElementChild::JSXExprContainer(JSXExprContainer {
                expr: JSXExpr::JSXEmptyExpr(_),
                ..
            }) => false,
            _ => true,
        })
        .collect()
}

/// Text that can sit between tags verbatim and survive trimming on re-extraction.
/// Entities are decoded on parse, so `&` goes through a container too.
fn fits_jsx_text(s: &str) -> bool {
    !s.is_empty() && s.trim() == s && !s.contains(['{', '}', '<', '>', '&'])
}

fn patch_text_content(
    services: &LanguageServices,
    cm: &Lrc<SourceMap>,
    element: &mut JSXElement,
    value: &PropValue,
) -> Result<PatchOutcome, PatchError> {
    // Nested markup is edited through its own identifier, never as text.
    let was_empty = match meaningful_children(element).as_slice() {
        [] => true,
        [JSXElementChild::JSXText(_) | JSXElementChild::JSXExprContainer(_)] => false,
        _ => return Err(PatchError::ReadOnly(TEXT_CONTENT.to_string())),
    };

    if *value == PropValue::Undefined {
        if element.children.is_empty() {
            return Ok(PatchOutcome::done(PatchAction::Unchanged));
        }
        element.children.clear();
        return Ok(PatchOutcome::done(PatchAction::Removed));
    }

    let (child, fallback) = match value {
        PropValue::String(s) if fits_jsx_text(s) => (
            JSXElementChild::JSXText(JSXText {
                span: DUMMY_SP,
                value: s.as_str().into(),
                raw: s.as_str().into(),
            }),
            None,
        ),
        other => {
            let (expr, fallback) = value_expr(services, cm, TEXT_CONTENT, other);
            (JSXElementChild::JSXExprContainer(container(expr)), fallback)
        }
    };

    let action = if was_empty {
        PatchAction::Inserted
    } else {
        PatchAction::Replaced
    };
    element.children = vec![child];

    if element.opening.self_closing || element.closing.is_none() {
        element.opening.self_closing = false;
        element.closing = Some(JSXClosingElement {
            span: DUMMY_SP,
            name: element.opening.name.clone(),
        });
    }

    Ok(PatchOutcome { action, fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{with_element, with_element_mut};
    use crate::parser::{parse, SyntaxTree};
    use crate::props::{extract_properties, CodeValue, ExtractedProperty, StyleValue, STYLE};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    struct Fixture {
        services: LanguageServices,
        tree: SyntaxTree,
    }

    impl Fixture {
        fn new(src: &str) -> Self {
            let services = LanguageServices::init();
            let tree = parse(&services, src, Path::new("/p/src/View.tsx")).unwrap();
            Self { services, tree }
        }

        fn patch(&mut self, name: &str, value: PropValue) -> Result<PatchOutcome, PatchError> {
            let cm = self.tree.source_map().clone();
            let services = &self.services;
            with_element_mut(&mut self.tree.module, "data-uid", "t", |el| {
                apply_property_patch(services, &cm, el, name, &value)
            })
            .unwrap()
        }

        fn props(&self) -> Vec<ExtractedProperty> {
            with_element(&self.tree.module, "data-uid", "t", |el| {
                extract_properties(Some(el), self.tree.source_map())
            })
            .unwrap()
        }

        fn value(&self, name: &str) -> Option<PropValue> {
            self.props().into_iter().find(|p| p.name == name).map(|p| p.value)
        }

        /// Re-parse the printed output so the result is checked as real source.
        fn reparsed(&self) -> Fixture {
            Fixture::new(&self.tree.print())
        }
    }

    #[test]
    fn test_round_trip_every_value_kind() {
        let src = r#"const a = <div data-uid="t" hidden title="Hi" tabIndex={2} offset={-4} on={false} ref={null} onClick={() => go(1)} style={{color: 'red', padding: 8}}>Text</div>;"#;
        let fx = Fixture::new(src);
        for prop in fx.props() {
            if prop.read_only {
                continue;
            }
            let mut patched = Fixture::new(src);
            patched.patch(&prop.name, prop.value.clone()).unwrap();
            let again = patched.reparsed();
            assert_eq!(again.value(&prop.name), Some(prop.value.clone()), "prop {}", prop.name);
        }
    }

    #[test]
    fn test_true_becomes_valueless_attribute() {
        let mut fx = Fixture::new(r#"const a = <input data-uid="t" />;"#);
        let out = fx.patch("disabled", PropValue::Bool(true)).unwrap();
        assert_eq!(out.action, PatchAction::Inserted);
        assert!(fx.tree.print().contains("disabled"));
        assert!(!fx.tree.print().contains("disabled="));
    }

    #[test]
    fn test_undefined_removes_or_is_noop() {
        let mut fx = Fixture::new(r#"const a = <input data-uid="t" disabled />;"#);
        assert_eq!(fx.patch("disabled", PropValue::Undefined).unwrap().action, PatchAction::Removed);
        assert_eq!(fx.value("disabled"), None);
        assert_eq!(fx.patch("disabled", PropValue::Undefined).unwrap().action, PatchAction::Unchanged);
    }

    #[test]
    fn test_new_attribute_is_appended() {
        let mut fx = Fixture::new(r#"const a = <a data-uid="t" href="/" />;"#);
        fx.patch("aria-label", PropValue::String("home".into())).unwrap();
        let names: Vec<_> = fx.props().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["data-uid", "href", "aria-label"]);
    }

    #[test]
    fn test_string_needing_escape_uses_container() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t" />;"#);
        let tricky = "say \"hi\"\nthen \\ leave".to_string();
        fx.patch("title", PropValue::String(tricky.clone())).unwrap();
        assert_eq!(fx.reparsed().value("title"), Some(PropValue::String(tricky)));
    }

    #[test]
    fn test_invalid_code_writes_placeholder() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t" />;"#);
        let out = fx.patch("onClick", PropValue::code("() => {")).unwrap();
        assert!(matches!(out.fallback, Some(PatchError::InvalidCode { .. })));
        assert_eq!(
            fx.reparsed().value("onClick"),
            Some(PropValue::String("/* Invalid Code: () => { */".into()))
        );
    }

    #[test]
    fn test_style_key_edit_through_whole_object() {
        let mut fx = Fixture::new(r#"const a = <div data-uid="t" style={{color: 'red', padding: 8}} />;"#);
        let mut map = fx.value(STYLE).unwrap().as_style().unwrap().clone();
        map.set("color", StyleValue::String("blue".into()));
        fx.patch(STYLE, PropValue::Code(map.to_code())).unwrap();

        let style = fx.reparsed().value(STYLE).unwrap();
        let map = style.as_style().unwrap();
        assert_eq!(map.get("color"), Some(&StyleValue::String("blue".into())));
        assert_eq!(map.get("padding"), Some(&StyleValue::Number(8.0)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_style_code_entries_survive() {
        let mut fx = Fixture::new(r#"const a = <div data-uid="t" style={{...base, width: w}} />;"#);
        let map = fx.value(STYLE).unwrap();
        fx.patch(STYLE, map.clone()).unwrap();
        let after = fx.reparsed().value(STYLE).unwrap();
        assert_eq!(after, map);
        assert_eq!(
            after.as_style().unwrap().get("width"),
            Some(&StyleValue::Code(CodeValue::new("w")))
        );
    }

    #[test]
    fn test_spread_is_refused() {
        let mut fx = Fixture::new(r#"const a = <Comp data-uid="t" {...props} />;"#);
        let before = fx.tree.print();
        let spread = fx.props().into_iter().find(|p| p.read_only).unwrap();
        assert_eq!(
            fx.patch(&spread.name, PropValue::code("other")),
            Err(PatchError::ReadOnly("...props".into()))
        );
        assert_eq!(fx.tree.print(), before);
    }

    #[test]
    fn test_invalid_name_is_refused() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t" />;"#);
        assert_eq!(
            fx.patch("bad name", PropValue::Bool(true)),
            Err(PatchError::InvalidName("bad name".into()))
        );
    }

    #[test]
    fn test_text_content_on_self_closing_element() {
        let mut fx = Fixture::new(r#"const a = <button data-uid="t" />;"#);
        let out = fx.patch(TEXT_CONTENT, PropValue::String("Save".into())).unwrap();
        assert_eq!(out.action, PatchAction::Inserted);
        let printed = fx.tree.print();
        assert!(printed.contains(">Save</button>"));
        assert_eq!(fx.reparsed().value(TEXT_CONTENT), Some(PropValue::String("Save".into())));
    }

    #[test]
    fn test_text_content_replace_and_clear() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t">{label}</p>;"#);
        fx.patch(TEXT_CONTENT, PropValue::String("a < b".into())).unwrap();
        assert_eq!(fx.reparsed().value(TEXT_CONTENT), Some(PropValue::String("a < b".into())));

        assert_eq!(fx.patch(TEXT_CONTENT, PropValue::Undefined).unwrap().action, PatchAction::Removed);
        assert_eq!(fx.value(TEXT_CONTENT), None);
    }

    #[test]
    fn test_multi_child_text_is_read_only() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t">Hi <b>there</b></p>;"#);
        assert_eq!(
            fx.patch(TEXT_CONTENT, PropValue::String("x".into())),
            Err(PatchError::ReadOnly(TEXT_CONTENT.into()))
        );
    }

    #[test]
    fn test_text_content_over_nested_element_is_refused() {
        let mut fx = Fixture::new(r#"const a = <div data-uid="t"><span>inner</span></div>;"#);
        let before = fx.tree.print();
        assert_eq!(fx.value(TEXT_CONTENT), None);
        assert_eq!(
            fx.patch(TEXT_CONTENT, PropValue::String("x".into())),
            Err(PatchError::ReadOnly(TEXT_CONTENT.into()))
        );
        assert_eq!(fx.tree.print(), before);
    }

    #[test]
    fn test_ampersand_strings_keep_their_entities() {
        let mut fx = Fixture::new(r#"const a = <p data-uid="t" />;"#);
        let title = PropValue::String("AT&amp;T".into());
        fx.patch("title", title.clone()).unwrap();
        fx.patch(TEXT_CONTENT, PropValue::String("&lt;b&gt;".into())).unwrap();

        let again = fx.reparsed();
        assert_eq!(again.value("title"), Some(title));
        assert_eq!(again.value(TEXT_CONTENT), Some(PropValue::String("&lt;b&gt;".into())));
    }
}
