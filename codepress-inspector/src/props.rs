//! Typed, editable view of a markup element's properties.
//!
//! Attributes come first in source order, then (optionally) the element's
//! text content under [`TEXT_CONTENT`]. `style={{...}}` object literals are
//! decomposed key by key so each entry stays independently editable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use swc_core::{
    common::{sync::Lrc, SourceMap},
    ecma::ast::*,
};

use crate::parser::{print_expr, print_node};

/// Reserved property name for an element's simple text/expression child.
pub const TEXT_CONTENT: &str = "textContent";

pub const STYLE: &str = "style";

const SPREAD_PREVIEW_LEN: usize = 15;
const STYLE_SPREAD_PREVIEW_LEN: usize = 10;

// -----------------------------------------------------------------------------
// Values
// -----------------------------------------------------------------------------

/// Raw source for a value this crate does not model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeValue {
    pub code: String,
}

impl CodeValue {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Number(f64),
    String(String),
    Code(CodeValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleEntry {
    pub key: String,
    pub value: StyleValue,
}

/// Inline style keys in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleMap {
    entries: Vec<StyleEntry>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StyleValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// Replace in place, or append a new key at the end.
    pub fn set(&mut self, key: impl Into<String>, value: StyleValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(StyleEntry { key, value }),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<StyleValue> {
        let idx = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleValue)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the object literal source, e.g. `{ color: "red", padding: 8 }`.
    /// Spread entries (keys starting with `...`) are emitted as their code.
    pub fn to_code(&self) -> CodeValue {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| match (&e.value, e.key.starts_with("...")) {
                (StyleValue::Code(c), true) => c.code.clone(),
                (value, _) => format!("{}: {}", style_key_source(&e.key), style_value_source(value)),
            })
            .collect();
        if parts.is_empty() {
            CodeValue::new("{}")
        } else {
            CodeValue::new(format!("{{ {} }}", parts.join(", ")))
        }
    }
}

impl<K: Into<String>> FromIterator<(K, StyleValue)> for StyleMap {
    fn from_iter<T: IntoIterator<Item = (K, StyleValue)>>(iter: T) -> Self {
        let mut map = StyleMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

fn style_key_source(key: &str) -> String {
    if is_js_identifier(key) {
        key.to_string()
    } else {
        js_string(key)
    }
}

fn style_value_source(value: &StyleValue) -> String {
    match value {
        StyleValue::Number(n) => js_number(*n),
        StyleValue::String(s) => js_string(s),
        StyleValue::Code(c) => c.code.clone(),
    }
}

pub(crate) fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

pub(crate) fn js_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum PropValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Code(CodeValue),
    Style(StyleMap),
}

impl PropValue {
    pub fn code(code: impl Into<String>) -> Self {
        PropValue::Code(CodeValue::new(code))
    }

    pub fn as_style(&self) -> Option<&StyleMap> {
        match self {
            PropValue::Style(map) => Some(map),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Type inference
// -----------------------------------------------------------------------------

/// UI affordance hint; never used for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropType {
    String,
    Number,
    Boolean,
    Color,
    Unit,
    Code,
    Null,
    Undefined,
    InlineStyleObject,
}

fn color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:#(?:[0-9a-fA-F]{3}){1,2}$|rgba?\(|hsla?\()").expect("valid color regex")
    })
}

fn unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d*\.?\d+)(px|rem|em|%|vh|vw|s|ms)$").expect("valid unit regex"))
}

pub fn infer_type(value: &PropValue, name: &str) -> PropType {
    match value {
        PropValue::Style(_) if name == STYLE => PropType::InlineStyleObject,
        PropValue::Style(_) => PropType::Code,
        PropValue::Undefined => PropType::Undefined,
        PropValue::Null => PropType::Null,
        PropValue::Bool(_) => PropType::Boolean,
        PropValue::Number(_) => PropType::Number,
        PropValue::Code(_) => PropType::Code,
        PropValue::String(_) if name == "className" => PropType::String,
        PropValue::String(s) if color_re().is_match(s) => PropType::Color,
        PropValue::String(s) if unit_re().is_match(s) => PropType::Unit,
        PropValue::String(_) => PropType::String,
    }
}

// -----------------------------------------------------------------------------
// Extraction
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertySource {
    Attribute { index: usize },
    Spread { index: usize },
    TextContent,
    Children,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedProperty {
    pub name: String,
    pub value: PropValue,
    pub inferred_type: PropType,
    pub source: PropertySource,
    pub read_only: bool,
}

impl ExtractedProperty {
    fn new(name: String, value: PropValue, source: PropertySource, read_only: bool) -> Self {
        let inferred_type = infer_type(&value, &name);
        Self {
            name,
            value,
            inferred_type,
            source,
            read_only,
        }
    }
}

pub fn attr_display_name(name: &JSXAttrName) -> String {
    match name {
        JSXAttrName::Ident(ident) => ident.sym.to_string(),
        JSXAttrName::JSXNamespacedName(n) => format!("{}:{}", n.ns.sym, n.name.sym),
    }
}

/// Properties of `element`, or nothing when there is no element.
pub fn extract_properties(element: Option<&JSXElement>, cm: &Lrc<SourceMap>) -> Vec<ExtractedProperty> {
    let Some(element) = element else {
        return vec![];
    };
    let mut out = vec![];

    for (index, attr) in element.opening.attrs.iter().enumerate() {
        match attr {
            JSXAttrOrSpread::JSXAttr(attr) => {
                let name = attr_display_name(&attr.name);
                let value = match &attr.value {
                    None => Some(PropValue::Bool(true)),
                    Some(value) if name == STYLE => {
                        style_object(value, cm).map(PropValue::Style).or_else(|| attr_value(value, cm))
                    }
                    Some(value) => attr_value(value, cm),
                };
                if let Some(value) = value {
                    out.push(ExtractedProperty::new(
                        name,
                        value,
                        PropertySource::Attribute { index },
                        false,
                    ));
                }
            }
            JSXAttrOrSpread::SpreadElement(spread) => {
                let code = print_expr(cm, &spread.expr);
                out.push(ExtractedProperty::new(
                    spread_preview(&code),
                    PropValue::code(format!("value: {code}")),
                    PropertySource::Spread { index },
                    true,
                ));
            }
        }
    }

    let children: Vec<&JSXElementChild> = element
        .children
        .iter()
        .filter(|c| is_meaningful_child(c))
        .collect();

    match children.as_slice() {
        [] => {}
        [child] => {
            if let Some(value) = child_value(child, cm) {
                out.push(ExtractedProperty::new(
                    TEXT_CONTENT.to_string(),
                    value,
                    PropertySource::TextContent,
                    false,
                ));
            }
        }
        many => {
            // No per-child granularity for mixed content.
            let code = many
                .iter()
                .map(|c| match c {
                    JSXElementChild::JSXText(t) => t.value.trim().to_string(),
                    other => print_node(cm, *other),
                })
                .collect::<Vec<_>>()
                .join("\n");
            out.push(ExtractedProperty::new(
                TEXT_CONTENT.to_string(),
                PropValue::code(code),
                PropertySource::Children,
                true,
            ));
        }
    }

    out
}

fn spread_preview(code: &str) -> String {
    let preview: String = code.chars().take(SPREAD_PREVIEW_LEN).collect();
    if code.chars().count() > SPREAD_PREVIEW_LEN {
        format!("...{preview}...")
    } else {
        format!("...{preview}")
    }
}

fn is_meaningful_child(child: &JSXElementChild) -> bool {
    match child {
        JSXElementChild::JSXText(t) => !t.value.trim().is_empty(),
        JSXElementChild::JSXExprContainer(JSXExprContainer {
            expr: JSXExpr::JSXEmptyExpr(_),
            ..
        }) => false,
        _ => true,
    }
}

/// Value of the single meaningful child. Nested elements are inspectable on
/// their own and are not surfaced as text.
fn child_value(child: &JSXElementChild, cm: &Lrc<SourceMap>) -> Option<PropValue> {
    match child {
        JSXElementChild::JSXText(t) => Some(PropValue::String(t.value.trim().to_string())),
        JSXElementChild::JSXExprContainer(JSXExprContainer {
            expr: JSXExpr::Expr(expr),
            ..
        }) => match expr_value(expr, cm) {
            PropValue::Undefined => None,
            value => Some(value),
        },
        _ => None,
    }
}

fn attr_value(value: &JSXAttrValue, cm: &Lrc<SourceMap>) -> Option<PropValue> {
    match value {
        JSXAttrValue::Lit(lit) => Some(lit_value(lit).unwrap_or_else(|| PropValue::code(print_node(cm, lit)))),
        JSXAttrValue::JSXExprContainer(container) => match &container.expr {
            JSXExpr::JSXEmptyExpr(_) => None,
            JSXExpr::Expr(expr) => Some(expr_value(expr, cm)),
        },
        JSXAttrValue::JSXElement(el) => Some(PropValue::code(print_node(cm, &**el))),
        JSXAttrValue::JSXFragment(frag) => Some(PropValue::code(print_node(cm, frag))),
    }
}

fn lit_value(lit: &Lit) -> Option<PropValue> {
    match lit {
        Lit::Str(s) => Some(PropValue::String(s.value.to_string())),
        Lit::Num(n) => Some(PropValue::Number(n.value)),
        Lit::Bool(b) => Some(PropValue::Bool(b.value)),
        Lit::Null(_) => Some(PropValue::Null),
        _ => None,
    }
}

fn literal_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Lit(Lit::Num(n)) => Some(n.value),
        Expr::Unary(UnaryExpr {
            op: UnaryOp::Minus,
            arg,
            ..
        }) => match &**arg {
            Expr::Lit(Lit::Num(n)) => Some(-n.value),
            _ => None,
        },
        _ => None,
    }
}

/// Literal expressions unwrap to their value; anything else becomes `{code}`.
pub(crate) fn expr_value(expr: &Expr, cm: &Lrc<SourceMap>) -> PropValue {
    if let Some(n) = literal_number(expr) {
        return PropValue::Number(n);
    }
    match expr {
        Expr::Paren(p) => expr_value(&p.expr, cm),
        Expr::Lit(lit) => lit_value(lit).unwrap_or_else(|| PropValue::code(print_expr(cm, expr))),
        Expr::Ident(i) if i.sym.as_ref() == "undefined" => PropValue::Undefined,
        _ => PropValue::code(print_expr(cm, expr)),
    }
}

fn style_object(value: &JSXAttrValue, cm: &Lrc<SourceMap>) -> Option<StyleMap> {
    let JSXAttrValue::JSXExprContainer(JSXExprContainer {
        expr: JSXExpr::Expr(expr),
        ..
    }) = value
    else {
        return None;
    };
    let Expr::Object(obj) = &**expr else {
        return None;
    };

    let mut map = StyleMap::new();
    for prop in &obj.props {
        match prop {
            PropOrSpread::Prop(p) => match &**p {
                Prop::KeyValue(kv) => {
                    let key = match &kv.key {
                        PropName::Ident(i) => i.sym.to_string(),
                        PropName::Str(s) => s.value.to_string(),
                        _ => continue,
                    };
                    map.set(key, style_value(&kv.value, cm));
                }
                Prop::Shorthand(ident) => {
                    map.set(ident.sym.to_string(), StyleValue::Code(CodeValue::new(ident.sym.to_string())));
                }
                _ => continue,
            },
            PropOrSpread::Spread(spread) => {
                let code = print_expr(cm, &spread.expr);
                let preview: String = code.chars().take(STYLE_SPREAD_PREVIEW_LEN).collect();
                map.set(
                    format!("...{preview}"),
                    StyleValue::Code(CodeValue::new(format!("...{code}"))),
                );
            }
        }
    }
    Some(map)
}

fn style_value(expr: &Expr, cm: &Lrc<SourceMap>) -> StyleValue {
    if let Some(n) = literal_number(expr) {
        return StyleValue::Number(n);
    }
    match expr {
        Expr::Lit(Lit::Str(s)) => StyleValue::String(s.value.to_string()),
        _ => StyleValue::Code(CodeValue::new(print_expr(cm, expr))),
    }
}
