use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use swc_core::ecma::ast::*;

use crate::error::MapGenerationError;
use crate::language::normalize_path;
use crate::props::{is_js_identifier, js_string};

/// Import alias the preview bundler resolves to the project root.
pub const DEFAULT_IMPORT_ALIAS: &str = "@user-project";

/// Directory names too generic to name an `index` file after.
const GENERIC_DIRS: [&str; 5] = ["src", "lib", "components", "pages", "utils"];

/// Two files deriving the same component name; `kept` replaced `dropped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub name: String,
    pub dropped: PathBuf,
    pub kept: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMap {
    pub by_name: BTreeMap<String, PathBuf>,
    pub by_path: BTreeMap<PathBuf, String>,
    pub collisions: Vec<Collision>,
}

impl ComponentMap {
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn path_for(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(PathBuf::as_path)
    }

    pub fn name_for(&self, path: &Path) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }
}

/// Top-level default export of any shape.
pub fn is_default_export(item: &ModuleItem) -> bool {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(_))
        | ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(_)) => true,
        ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => {
            named.specifiers.iter().any(|s| match s {
                ExportSpecifier::Named(n) => matches!(
                    &n.exported,
                    Some(ModuleExportName::Ident(id)) if &*id.sym == "default"
                ),
                _ => false,
            })
        }
        _ => false,
    }
}

pub fn has_default_export(module: &Module) -> bool {
    module.body.iter().any(is_default_export)
}

/// Each `-` or `_` is dropped and the character after it upper-cased, then the
/// first character is upper-cased. A separator consumed that way is kept as is,
/// so `a--b` becomes `A-b`.
pub fn to_pascal_case(name: &str) -> String {
    let mut joined = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '-' || c == '_' {
            match chars.next() {
                Some(next) => joined.extend(next.to_uppercase()),
                None => joined.push(c),
            }
        } else {
            joined.push(c);
        }
    }

    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => joined,
    }
}

/// File stem, or the parent directory's name for `index` files.
pub fn derive_component_name(path: &Path) -> Result<String, MapGenerationError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MapGenerationError::NoFileStem {
            path: path.to_path_buf(),
        })?;

    if !stem.eq_ignore_ascii_case("index") {
        return Ok(stem.to_string());
    }

    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|p| p.to_str())
        .unwrap_or_default();

    if parent.is_empty() || GENERIC_DIRS.iter().any(|g| g.eq_ignore_ascii_case(parent)) {
        tracing::warn!(
            "Using generic name '{}' for index file in '{}': {}",
            stem,
            parent,
            path.display()
        );
        Ok(stem.to_string())
    } else {
        Ok(parent.to_string())
    }
}

/// Entries are processed in the order given; on a name collision the later
/// path wins.
pub fn build_component_map<'a, I>(entries: I) -> ComponentMap
where
    I: IntoIterator<Item = (&'a Path, &'a Module)>,
{
    let mut map = ComponentMap::default();

    for (path, module) in entries {
        if !has_default_export(module) {
            continue;
        }
        let name = match derive_component_name(path) {
            Ok(name) => to_pascal_case(&name),
            Err(e) => {
                tracing::warn!("Skipping {} for component map: {}", path.display(), e);
                continue;
            }
        };
        tracing::debug!("default export in {}, component name {}", path.display(), name);

        if let Some(previous) = map.by_name.insert(name.clone(), path.to_path_buf()) {
            tracing::warn!(
                "Duplicate component name \"{}\". Overwriting mapping from {} to {}",
                name,
                previous.display(),
                path.display()
            );
            map.by_path.remove(&previous);
            map.collisions.push(Collision {
                name: name.clone(),
                dropped: previous,
                kept: path.to_path_buf(),
            });
        }
        map.by_path.insert(path.to_path_buf(), name);
    }

    tracing::info!("Generated component map with {} entries", map.len());
    map
}

/// Generated module exporting `componentMap`, with paths relative to the
/// project root behind `alias`.
pub fn render_component_map_module(map: &ComponentMap, project_root: &Path, alias: &str) -> String {
    let alias = alias.trim_end_matches('/');
    let entries: Vec<String> = map
        .by_name
        .iter()
        .map(|(name, path)| {
            let relative = path.strip_prefix(project_root).unwrap_or(path);
            let relative = normalize_path(&relative.to_string_lossy());
            let key = if is_js_identifier(name) {
                name.clone()
            } else {
                js_string(name)
            };
            format!(
                "  {}: {}",
                key,
                js_string(&format!("{}/{}", alias, relative.trim_start_matches('/')))
            )
        })
        .collect();

    if entries.is_empty() {
        return "export const componentMap = {};\n".to_string();
    }
    format!("export const componentMap = {{\n{}\n}};\n", entries.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageServices;
    use crate::parser::{parse, SyntaxTree};
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn tree(path: &str, src: &str) -> SyntaxTree {
        parse(&LanguageServices::init(), src, Path::new(path)).unwrap()
    }

    fn build(trees: &[SyntaxTree]) -> ComponentMap {
        build_component_map(trees.iter().map(|t| (t.path.as_path(), &t.module)))
    }

    #[test]
    fn test_default_export_shapes() {
        let yes = [
            "export default function App() { return <div/>; }",
            "export default class Page {}",
            "const Card = () => <div/>; export default Card;",
            "export default memo(Card);",
            "export default () => null;",
            "const X = 1; export { X as default };",
        ];
        for src in yes {
            assert!(has_default_export(&tree("/p/a.tsx", src).module), "{src}");
        }
        let no = [
            "export function App() {}",
            "export const x = 1;",
            "function f() { return 1; }",
        ];
        for src in no {
            assert!(!has_default_export(&tree("/p/a.tsx", src).module), "{src}");
        }
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("button"), "Button");
        assert_eq!(to_pascal_case("nav-bar"), "NavBar");
        assert_eq!(to_pascal_case("user_profile_card"), "UserProfileCard");
        assert_eq!(to_pascal_case("Header"), "Header");
        assert_eq!(to_pascal_case("trailing-"), "Trailing-");
        assert_eq!(to_pascal_case("a--b"), "A-b");
        assert_eq!(to_pascal_case("a_-b"), "A-b");
        assert_eq!(to_pascal_case("_private"), "Private");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn test_index_naming() {
        assert_eq!(derive_component_name(Path::new("/p/src/Button/index.tsx")).unwrap(), "Button");
        assert_eq!(derive_component_name(Path::new("/p/src/index.tsx")).unwrap(), "index");
        assert_eq!(derive_component_name(Path::new("/p/Components/index.jsx")).unwrap(), "index");
        assert_eq!(derive_component_name(Path::new("/p/src/nav-bar.jsx")).unwrap(), "nav-bar");
    }

    #[test]
    fn test_collision_last_path_wins() {
        let src = "export default function X() { return <div/>; }";
        let map = build(&[
            tree("/p/src/Button/index.tsx", src),
            tree("/p/src/button.tsx", src),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.path_for("Button"), Some(Path::new("/p/src/button.tsx")));
        assert_eq!(map.name_for(Path::new("/p/src/Button/index.tsx")), None);
        assert_eq!(map.name_for(Path::new("/p/src/button.tsx")), Some("Button"));
        assert_eq!(
            map.collisions,
            vec![Collision {
                name: "Button".into(),
                dropped: PathBuf::from("/p/src/Button/index.tsx"),
                kept: PathBuf::from("/p/src/button.tsx"),
            }]
        );
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_collision_logs_warning() {
        let src = "export default function X() { return <div/>; }";
        let trees = [tree("/p/src/nav-bar.tsx", src), tree("/p/src/nav_bar.tsx", src)];

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let map = tracing::subscriber::with_default(subscriber, || build(&trees));

        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(map.collisions.len(), 1);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(
            logs.contains("Duplicate component name \"NavBar\". Overwriting mapping from /p/src/nav-bar.tsx to /p/src/nav_bar.tsx"),
            "{logs}"
        );
    }

    #[test]
    fn test_files_without_default_export_are_skipped() {
        let map = build(&[
            tree("/p/src/util.ts", "export const add = (a: number, b: number) => a + b;"),
            tree("/p/src/card.jsx", "export default () => <div/>;"),
        ]);
        assert_eq!(map.by_name.keys().collect::<Vec<_>>(), vec!["Card"]);
    }

    #[test]
    fn test_render_module() {
        let map = build(&[
            tree("/p/src/card.jsx", "export default () => <div/>;"),
            tree("/p/src/index.tsx", "export default 1;"),
            tree("/p/src/nav-bar.tsx", "export default 1;"),
        ]);
        let text = render_component_map_module(&map, Path::new("/p"), DEFAULT_IMPORT_ALIAS);
        assert_eq!(
            text,
            "export const componentMap = {\n  Card: \"@user-project/src/card.jsx\",\n  Index: \"@user-project/src/index.tsx\",\n  NavBar: \"@user-project/src/nav-bar.tsx\"\n};\n"
        );
    }

    #[test]
    fn test_render_quotes_odd_keys_and_handles_empty() {
        let mut map = ComponentMap::default();
        assert_eq!(
            render_component_map_module(&map, Path::new("/p"), "@app/"),
            "export const componentMap = {};\n"
        );
        map.by_name.insert("My.Widget".into(), PathBuf::from("/p/My.Widget.tsx"));
        let text = render_component_map_module(&map, Path::new("/p"), "@app/");
        assert!(text.contains("\"My.Widget\": \"@app/My.Widget.tsx\""));
    }
}
