use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::collections::HashMap;
use swc_core::{
    common::{sync::Lrc, SourceMap, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

use crate::parser::{line_range, SyntaxTree};

/// Attribute carried by every instrumented element unless configured otherwise.
pub const DEFAULT_IDENTIFIER_ATTR: &str = "data-uid";

const UID_LEN: usize = 10;

// -----------------------------------------------------------------------------
// Element arena
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ElementId(pub u32);

/// One instrumented element. Parent/child links are arena indices.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ElementNode {
    pub uid: String,
    pub tag: String,
    pub is_component: bool,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
    pub lines: Option<(usize, usize)>,
}

/// Flat store of a file's markup elements in pre-order, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct ElementArena {
    nodes: Vec<ElementNode>,
    by_uid: HashMap<String, ElementId>,
}

impl ElementArena {
    fn push(&mut self, node: ElementNode) -> ElementId {
        let id = ElementId(self.nodes.len() as u32);
        if let Some(parent) = node.parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        self.by_uid.insert(node.uid.clone(), id);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn lookup(&self, uid: &str) -> Option<ElementId> {
        self.by_uid.get(uid).copied()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &ElementNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (ElementId(i as u32), n))
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.uid.as_str())
    }

    pub fn roots(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.iter().filter(|(_, n)| n.parent.is_none()).map(|(id, _)| id)
    }

    /// Enclosing elements, nearest first.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = vec![];
        let mut cur = self.get(id).and_then(|n| n.parent);
        while let Some(p) = cur {
            out.push(p);
            cur = self.get(p).and_then(|n| n.parent);
        }
        out
    }
}

// -----------------------------------------------------------------------------
// Identifier generation
// -----------------------------------------------------------------------------

pub fn generate_uid() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut encoded = URL_SAFE_NO_PAD.encode(bytes);
    encoded.truncate(UID_LEN);
    encoded
}

// -----------------------------------------------------------------------------
// Attribute helpers
// -----------------------------------------------------------------------------

pub fn attr_name_is(attr: &JSXAttr, key: &str) -> bool {
    matches!(&attr.name, JSXAttrName::Ident(ident) if ident.sym.as_ref() == key)
}

fn string_attr_value(value: &Option<JSXAttrValue>) -> Option<String> {
    match value {
        Some(JSXAttrValue::Lit(Lit::Str(s))) => Some(s.value.to_string()),
        Some(JSXAttrValue::JSXExprContainer(JSXExprContainer {
            expr: JSXExpr::Expr(expr),
            ..
        })) => match &**expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Identifier carried by an opening tag, if any.
pub fn uid_of(opening: &JSXOpeningElement, attr_name: &str) -> Option<String> {
    opening.attrs.iter().find_map(|a| match a {
        JSXAttrOrSpread::JSXAttr(attr) if attr_name_is(attr, attr_name) => {
            string_attr_value(&attr.value)
        }
        _ => None,
    })
}

fn string_value(val: String) -> Option<JSXAttrValue> {
    Some(JSXAttrValue::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: val.into(),
        raw: None,
    })))
}

pub fn element_name(name: &JSXElementName) -> String {
    fn object(obj: &JSXObject) -> String {
        match obj {
            JSXObject::Ident(i) => i.sym.to_string(),
            JSXObject::JSXMemberExpr(m) => format!("{}.{}", object(&m.obj), m.prop.sym),
        }
    }
    match name {
        JSXElementName::Ident(ident) => ident.sym.to_string(),
        JSXElementName::JSXMemberExpr(m) => format!("{}.{}", object(&m.obj), m.prop.sym),
        JSXElementName::JSXNamespacedName(n) => format!("{}:{}", n.ns.sym, n.name.sym),
    }
}

fn is_custom_component_name(name: &JSXElementName) -> bool {
    match name {
        JSXElementName::Ident(ident) => ident
            .sym
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false),
        JSXElementName::JSXMemberExpr(_) => true,
        JSXElementName::JSXNamespacedName(_) => false,
    }
}

// -----------------------------------------------------------------------------
// Instrumenter
// -----------------------------------------------------------------------------

pub struct Instrumented {
    pub tree: SyntaxTree,
    pub arena: ElementArena,
    /// Identifiers created by this run (empty when the input was already instrumented).
    pub assigned: Vec<String>,
}

/// Give every markup element an identifier. Works on a clone; `tree` is untouched.
pub fn instrument(tree: &SyntaxTree, attr_name: &str) -> Instrumented {
    let mut module = tree.module.clone();
    let mut pass = InstrumentPass {
        attr_name,
        cm: tree.source_map().clone(),
        arena: ElementArena::default(),
        stack: vec![],
        assigned: vec![],
    };
    module.visit_mut_with(&mut pass);

    tracing::debug!(
        "{}: instrumented {} elements ({} new identifiers)",
        tree.path.display(),
        pass.arena.len(),
        pass.assigned.len()
    );

    Instrumented {
        tree: tree.with_module(module),
        arena: pass.arena,
        assigned: pass.assigned,
    }
}

struct InstrumentPass<'a> {
    attr_name: &'a str,
    cm: Lrc<SourceMap>,
    arena: ElementArena,
    stack: Vec<ElementId>,
    assigned: Vec<String>,
}

impl InstrumentPass<'_> {
    fn fresh_uid(&mut self) -> String {
        loop {
            let uid = generate_uid();
            if !self.arena.contains(&uid) {
                self.assigned.push(uid.clone());
                return uid;
            }
        }
    }

    /// Reuse the tag's identifier, or write a fresh one. Duplicates within the
    /// file and non-string values are rewritten so identifiers stay unique.
    fn identify(&mut self, opening: &mut JSXOpeningElement) -> String {
        let existing = opening.attrs.iter().position(|a| {
            matches!(a, JSXAttrOrSpread::JSXAttr(attr) if attr_name_is(attr, self.attr_name))
        });

        match existing {
            Some(idx) => {
                let current = match &opening.attrs[idx] {
                    JSXAttrOrSpread::JSXAttr(attr) => string_attr_value(&attr.value),
                    JSXAttrOrSpread::SpreadElement(_) => None,
                };
                if let Some(uid) = current.filter(|u| !u.is_empty() && !self.arena.contains(u)) {
                    return uid;
                }
                let uid = self.fresh_uid();
                if let JSXAttrOrSpread::JSXAttr(attr) = &mut opening.attrs[idx] {
                    attr.value = string_value(uid.clone());
                }
                uid
            }
            None => {
                let uid = self.fresh_uid();
                opening.attrs.push(JSXAttrOrSpread::JSXAttr(JSXAttr {
                    span: DUMMY_SP,
                    name: JSXAttrName::Ident(IdentName::new(self.attr_name.into(), DUMMY_SP)),
                    value: string_value(uid.clone()),
                }));
                uid
            }
        }
    }
}

impl VisitMut for InstrumentPass<'_> {
    fn visit_mut_jsx_element(&mut self, node: &mut JSXElement) {
        let uid = self.identify(&mut node.opening);
        let id = self.arena.push(ElementNode {
            uid,
            tag: element_name(&node.opening.name),
            is_component: is_custom_component_name(&node.opening.name),
            parent: self.stack.last().copied(),
            children: vec![],
            lines: line_range(&self.cm, node.span),
        });

        self.stack.push(id);
        node.visit_mut_children_with(self);
        self.stack.pop();
    }
}

// -----------------------------------------------------------------------------
// Stripping
// -----------------------------------------------------------------------------

/// Remove identifier attributes everywhere, e.g. before writing user files back.
pub fn strip_identifiers(module: &mut Module, attr_name: &str) {
    struct Strip<'a>(&'a str);
    impl VisitMut for Strip<'_> {
        fn visit_mut_jsx_opening_element(&mut self, n: &mut JSXOpeningElement) {
            n.attrs.retain(|a| {
                !matches!(a, JSXAttrOrSpread::JSXAttr(attr) if attr_name_is(attr, self.0))
            });
            n.visit_mut_children_with(self);
        }
    }
    module.visit_mut_with(&mut Strip(attr_name));
}

// -----------------------------------------------------------------------------
// Lookup by identifier
// -----------------------------------------------------------------------------

/// Run `f` on the element carrying `uid`.
pub fn with_element<R>(
    module: &Module,
    attr_name: &str,
    uid: &str,
    f: impl FnOnce(&JSXElement) -> R,
) -> Option<R> {
    struct Finder<'a, F, R> {
        attr_name: &'a str,
        uid: &'a str,
        f: Option<F>,
        out: Option<R>,
    }
    impl<F: FnOnce(&JSXElement) -> R, R> Visit for Finder<'_, F, R> {
        fn visit_jsx_element(&mut self, n: &JSXElement) {
            if self.f.is_none() {
                return;
            }
            if uid_of(&n.opening, self.attr_name).as_deref() == Some(self.uid) {
                if let Some(f) = self.f.take() {
                    self.out = Some(f(n));
                }
                return;
            }
            n.visit_children_with(self);
        }
    }

    let mut finder = Finder {
        attr_name,
        uid,
        f: Some(f),
        out: None,
    };
    module.visit_with(&mut finder);
    finder.out
}

/// Run `f` on the element carrying `uid`, mutably.
pub fn with_element_mut<R>(
    module: &mut Module,
    attr_name: &str,
    uid: &str,
    f: impl FnOnce(&mut JSXElement) -> R,
) -> Option<R> {
    struct Finder<'a, F, R> {
        attr_name: &'a str,
        uid: &'a str,
        f: Option<F>,
        out: Option<R>,
    }
    impl<F: FnOnce(&mut JSXElement) -> R, R> VisitMut for Finder<'_, F, R> {
        fn visit_mut_jsx_element(&mut self, n: &mut JSXElement) {
            if self.f.is_none() {
                return;
            }
            if uid_of(&n.opening, self.attr_name).as_deref() == Some(self.uid) {
                if let Some(f) = self.f.take() {
                    self.out = Some(f(n));
                }
                return;
            }
            n.visit_mut_children_with(self);
        }
    }

    let mut finder = Finder {
        attr_name,
        uid,
        f: Some(f),
        out: None,
    };
    module.visit_mut_with(&mut finder);
    finder.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageServices;
    use crate::parser::parse;
    use std::collections::BTreeSet;
    use std::path::Path;

    const SRC: &str = r#"
export default function Card({ title }) {
  return (
    <section className="card">
      <h2>{title}</h2>
      <Button.Primary onClick={() => {}}>Go</Button.Primary>
      <>
        <p>fragment child</p>
      </>
    </section>
  );
}
"#;

    fn parsed(src: &str) -> SyntaxTree {
        parse(&LanguageServices::init(), src, Path::new("/p/src/Card.jsx")).unwrap()
    }

    fn uid_set(arena: &ElementArena) -> BTreeSet<String> {
        arena.uids().map(str::to_string).collect()
    }

    #[test]
    fn test_every_element_gets_an_identifier() {
        let tree = parsed(SRC);
        let out = instrument(&tree, DEFAULT_IDENTIFIER_ATTR);
        assert_eq!(out.arena.len(), 4);
        assert_eq!(out.assigned.len(), 4);
        assert!(out.arena.uids().all(|u| u.len() == UID_LEN));
        assert_eq!(out.tree.print().matches("data-uid=").count(), 4);
    }

    #[test]
    fn test_original_tree_untouched() {
        let tree = parsed(SRC);
        let before = tree.print();
        let _ = instrument(&tree, DEFAULT_IDENTIFIER_ATTR);
        assert_eq!(tree.print(), before);
        assert!(!before.contains("data-uid"));
    }

    #[test]
    fn test_reinstrumenting_is_idempotent() {
        let tree = parsed(SRC);
        let first = instrument(&tree, DEFAULT_IDENTIFIER_ATTR);
        let second = instrument(&first.tree, DEFAULT_IDENTIFIER_ATTR);
        assert!(second.assigned.is_empty());
        assert_eq!(uid_set(&first.arena), uid_set(&second.arena));
        assert_eq!(first.tree.print(), second.tree.print());
    }

    #[test]
    fn test_existing_identifier_reused() {
        let tree = parsed(r#"const a = <div data-uid="keep-me"><span /></div>;"#);
        let out = instrument(&tree, DEFAULT_IDENTIFIER_ATTR);
        assert!(out.arena.contains("keep-me"));
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.tree.print().matches("keep-me").count(), 1);
    }

    #[test]
    fn test_duplicate_identifier_is_rewritten() {
        let tree = parsed(r#"const a = <div data-uid="dup"><span data-uid="dup" /></div>;"#);
        let out = instrument(&tree, DEFAULT_IDENTIFIER_ATTR);
        assert_eq!(out.arena.len(), 2);
        assert_eq!(uid_set(&out.arena).len(), 2);
        assert_eq!(out.tree.print().matches("\"dup\"").count(), 1);
    }

    #[test]
    fn test_arena_links_parents_and_children() {
        let out = instrument(&parsed(SRC), DEFAULT_IDENTIFIER_ATTR);
        let roots: Vec<_> = out.arena.roots().collect();
        assert_eq!(roots.len(), 1);
        let section = out.arena.get(roots[0]).unwrap();
        assert_eq!(section.tag, "section");
        assert_eq!(section.children.len(), 3);

        let (button_id, button) = out.arena.iter().find(|(_, n)| n.tag == "Button.Primary").unwrap();
        assert!(button.is_component);
        assert_eq!(out.arena.ancestors(button_id), vec![roots[0]]);

        // elements inside a fragment still hang off the enclosing element
        let (p_id, _) = out.arena.iter().find(|(_, n)| n.tag == "p").unwrap();
        assert_eq!(out.arena.ancestors(p_id), vec![roots[0]]);
    }

    #[test]
    fn test_strip_identifiers() {
        let out = instrument(&parsed(SRC), DEFAULT_IDENTIFIER_ATTR);
        let mut module = out.tree.module.clone();
        strip_identifiers(&mut module, DEFAULT_IDENTIFIER_ATTR);
        assert!(!out.tree.with_module(module).print().contains("data-uid"));
    }

    #[test]
    fn test_with_element_finds_by_identifier() {
        let out = instrument(&parsed(SRC), DEFAULT_IDENTIFIER_ATTR);
        let (_, h2) = out.arena.iter().find(|(_, n)| n.tag == "h2").unwrap();
        let tag = with_element(&out.tree.module, DEFAULT_IDENTIFIER_ATTR, &h2.uid, |el| {
            element_name(&el.opening.name)
        });
        assert_eq!(tag.as_deref(), Some("h2"));
        assert!(with_element(&out.tree.module, DEFAULT_IDENTIFIER_ATTR, "nope", |_| ()).is_none());
    }
}
