use tree_sitter::{Node, Parser};

use crate::error::{CkgError, Result};
use crate::language::Language;
use crate::records::{ClassRecord, Definition, FunctionRecord};

/// Parse `source` and extract every function, class, and method definition.
/// Bodies are recorded verbatim; line numbers are 1-based. Constructs the
/// grammars have no definition node for (arrow functions, lambdas) are not
/// indexed.
pub fn extract_definitions(
    language: Language,
    source: &str,
    file_path: &str,
) -> Result<Vec<Definition>> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|err| CkgError::Parse(format!("failed to set parser language: {err}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CkgError::Parse(format!("failed to parse {file_path}")))?;

    let mut out = Vec::new();
    let root = tree.root_node();
    match language {
        Language::Python => visit_python(root, source, file_path, None, None, &mut out),
        Language::Java => visit_java(root, source, file_path, None, &mut out),
        Language::C => visit_c(root, source, file_path, &mut out),
        Language::Cpp => visit_cpp(root, source, file_path, None, &mut out),
        Language::TypeScript | Language::JavaScript => {
            visit_js_like(root, source, file_path, None, &mut out)
        }
    }
    Ok(out)
}

/// Name and span of an enclosing definition, used to wire up parent links.
#[derive(Debug, Clone)]
struct Scope {
    name: String,
    start_line: usize,
    end_line: usize,
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

fn span(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

fn function_record(
    name_node: Node,
    node: Node,
    source: &str,
    file_path: &str,
) -> FunctionRecord {
    let (start_line, end_line) = span(node);
    FunctionRecord {
        name: text(name_node, source).to_string(),
        file_path: file_path.to_string(),
        body: text(node, source).to_string(),
        start_line,
        end_line,
        parent_function: None,
        parent_class: None,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Everything before the body node, as a one-line signature.
fn signature_before(node: Node, source: &str, body_kind: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut cursor = node.walk();
    for part in node.children(&mut cursor) {
        if part.kind() == body_kind {
            break;
        }
        parts.push(text(part, source).to_string());
    }
    parts.join(" ").trim().to_string()
}

fn visit_python(
    node: Node,
    source: &str,
    file_path: &str,
    mut parent_class: Option<Scope>,
    mut parent_function: Option<Scope>,
    out: &mut Vec<Definition>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let mut record = function_record(name_node, node, source, file_path);
                // A function nested in both a class and a function belongs to
                // whichever encloses it more tightly.
                match (&parent_function, &parent_class) {
                    (Some(func), Some(class)) => {
                        if func.start_line >= class.start_line && func.end_line <= class.end_line {
                            record.parent_function = Some(func.name.clone());
                        } else {
                            record.parent_class = Some(class.name.clone());
                        }
                    }
                    (Some(func), None) => record.parent_function = Some(func.name.clone()),
                    (None, Some(class)) => record.parent_class = Some(class.name.clone()),
                    (None, None) => {}
                }
                parent_function = Some(Scope {
                    name: record.name.clone(),
                    start_line: record.start_line,
                    end_line: record.end_line,
                });
                out.push(Definition::Function(record));
            }
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let (start_line, end_line) = span(node);
                let mut methods = String::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        let def = match child.kind() {
                            "decorated_definition" => child.child_by_field_name("definition"),
                            "function_definition" => Some(child),
                            _ => None,
                        };
                        let Some(def) = def else { continue };
                        let Some(method_name) = def.child_by_field_name("name") else {
                            continue;
                        };
                        let mut info = text(method_name, source).to_string();
                        if let Some(params) = def.child_by_field_name("parameters") {
                            info.push_str(text(params, source));
                        }
                        if let Some(ret) = def.child_by_field_name("return_type") {
                            info.push_str(&format!(" -> {}", text(ret, source)));
                        }
                        methods.push_str(&format!("- {info}\n"));
                    }
                }
                let record = ClassRecord {
                    name: text(name_node, source).to_string(),
                    file_path: file_path.to_string(),
                    body: text(node, source).to_string(),
                    start_line,
                    end_line,
                    fields: None,
                    methods: non_empty(methods),
                };
                parent_class = Some(Scope {
                    name: record.name.clone(),
                    start_line,
                    end_line,
                });
                out.push(Definition::Class(record));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_python(
            child,
            source,
            file_path,
            parent_class.clone(),
            parent_function.clone(),
            out,
        );
    }
}

fn visit_java(
    node: Node,
    source: &str,
    file_path: &str,
    mut parent_class: Option<Scope>,
    out: &mut Vec<Definition>,
) {
    match node.kind() {
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let (start_line, end_line) = span(node);
                let mut fields = String::new();
                let mut methods = String::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        match child.kind() {
                            "field_declaration" => {
                                fields.push_str(&format!("- {}\n", text(child, source)));
                            }
                            "method_declaration" => {
                                let sig = signature_before(child, source, "block");
                                methods.push_str(&format!("- {sig}\n"));
                            }
                            _ => {}
                        }
                    }
                }
                let record = ClassRecord {
                    name: text(name_node, source).to_string(),
                    file_path: file_path.to_string(),
                    body: text(node, source).to_string(),
                    start_line,
                    end_line,
                    fields: non_empty(fields),
                    methods: non_empty(methods),
                };
                parent_class = Some(Scope {
                    name: record.name.clone(),
                    start_line,
                    end_line,
                });
                out.push(Definition::Class(record));
            }
        }
        "method_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let mut record = function_record(name_node, node, source, file_path);
                record.parent_class = parent_class.as_ref().map(|class| class.name.clone());
                out.push(Definition::Function(record));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_java(child, source, file_path, parent_class.clone(), out);
    }
}

fn visit_c(node: Node, source: &str, file_path: &str, out: &mut Vec<Definition>) {
    if node.kind() == "function_definition" {
        if let Some(name_node) = function_declarator_name(node) {
            out.push(Definition::Function(function_record(
                name_node, node, source, file_path,
            )));
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_c(child, source, file_path, out);
    }
}

fn visit_cpp(
    node: Node,
    source: &str,
    file_path: &str,
    mut parent_class: Option<Scope>,
    out: &mut Vec<Definition>,
) {
    match node.kind() {
        "class_specifier" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let (start_line, end_line) = span(node);
                let mut fields = String::new();
                let mut methods = String::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        match child.kind() {
                            "function_definition" => {
                                let sig = signature_before(child, source, "compound_statement");
                                methods.push_str(&format!("- {sig}\n"));
                            }
                            "field_declaration" => {
                                // A field_declaration holding a
                                // function_declarator is a method prototype.
                                if has_child_of_kind(child, "function_declarator") {
                                    methods.push_str(&format!("- {}\n", text(child, source)));
                                } else {
                                    fields.push_str(&format!("- {}\n", text(child, source)));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                let record = ClassRecord {
                    name: text(name_node, source).to_string(),
                    file_path: file_path.to_string(),
                    body: text(node, source).to_string(),
                    start_line,
                    end_line,
                    fields: non_empty(fields),
                    methods: non_empty(methods),
                };
                parent_class = Some(Scope {
                    name: record.name.clone(),
                    start_line,
                    end_line,
                });
                out.push(Definition::Class(record));
            }
        }
        "function_definition" => {
            if let Some(name_node) = function_declarator_name(node) {
                let mut record = function_record(name_node, node, source, file_path);
                record.parent_class = parent_class.as_ref().map(|class| class.name.clone());
                out.push(Definition::Function(record));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_cpp(child, source, file_path, parent_class.clone(), out);
    }
}

fn visit_js_like(
    node: Node,
    source: &str,
    file_path: &str,
    mut parent_class: Option<Scope>,
    out: &mut Vec<Definition>,
) {
    match node.kind() {
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let (start_line, end_line) = span(node);
                let mut fields = String::new();
                let mut methods = String::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        match child.kind() {
                            "method_definition" => {
                                let sig = signature_before(child, source, "statement_block");
                                methods.push_str(&format!("- {sig}\n"));
                            }
                            "public_field_definition" => {
                                fields.push_str(&format!("- {}\n", text(child, source)));
                            }
                            _ => {}
                        }
                    }
                }
                let record = ClassRecord {
                    name: text(name_node, source).to_string(),
                    file_path: file_path.to_string(),
                    body: text(node, source).to_string(),
                    start_line,
                    end_line,
                    fields: non_empty(fields),
                    methods: non_empty(methods),
                };
                parent_class = Some(Scope {
                    name: record.name.clone(),
                    start_line,
                    end_line,
                });
                out.push(Definition::Class(record));
            }
        }
        "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let mut record = function_record(name_node, node, source, file_path);
                record.parent_class = parent_class.as_ref().map(|class| class.name.clone());
                out.push(Definition::Function(record));
            }
        }
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                out.push(Definition::Function(function_record(
                    name_node, node, source, file_path,
                )));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_js_like(child, source, file_path, parent_class.clone(), out);
    }
}

/// `function_definition > declarator (function_declarator) > declarator`
/// is where C and C++ keep the function name.
fn function_declarator_name(node: Node) -> Option<Node> {
    let declarator = node.child_by_field_name("declarator")?;
    declarator.child_by_field_name("declarator")
}

fn has_child_of_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|child| child.kind() == kind);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn functions(defs: &[Definition]) -> Vec<&FunctionRecord> {
        defs.iter()
            .filter_map(|def| match def {
                Definition::Function(record) => Some(record),
                Definition::Class(_) => None,
            })
            .collect()
    }

    fn classes(defs: &[Definition]) -> Vec<&ClassRecord> {
        defs.iter()
            .filter_map(|def| match def {
                Definition::Class(record) => Some(record),
                Definition::Function(_) => None,
            })
            .collect()
    }

    #[test]
    fn python_top_level_function() {
        let src = "def f(): return 1\n";
        let defs = extract_definitions(Language::Python, src, "/w/a.py").unwrap();
        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "f");
        assert_eq!(funcs[0].start_line, 1);
        assert_eq!(funcs[0].end_line, 1);
        assert_eq!(funcs[0].parent_class, None);
        assert_eq!(funcs[0].body, "def f(): return 1");
    }

    #[test]
    fn python_duplicate_top_level_definitions_both_appear() {
        let src = "def f(): return 1\ndef f(): return 1\n";
        let defs = extract_definitions(Language::Python, src, "/w/a.py").unwrap();
        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].start_line, 1);
        assert_eq!(funcs[1].start_line, 2);
    }

    #[test]
    fn python_methods_carry_parent_class_and_signatures() {
        let src = r#"class Greeter:
    def __init__(self, name):
        self.name = name

    def greet(self, loud: bool) -> str:
        return self.name
"#;
        let defs = extract_definitions(Language::Python, src, "/w/g.py").unwrap();

        let class_records = classes(&defs);
        assert_eq!(class_records.len(), 1);
        assert_eq!(class_records[0].name, "Greeter");
        let methods = class_records[0].methods.as_deref().unwrap();
        assert!(methods.contains("- __init__(self, name)"));
        assert!(methods.contains("- greet(self, loud: bool) -> str"));

        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 2);
        assert!(funcs
            .iter()
            .all(|f| f.parent_class.as_deref() == Some("Greeter")));
    }

    #[test]
    fn python_nested_function_links_to_enclosing_function() {
        let src = r#"def outer():
    def inner():
        pass
    return inner
"#;
        let defs = extract_definitions(Language::Python, src, "/w/n.py").unwrap();
        let funcs = functions(&defs);
        let inner = funcs.iter().find(|f| f.name == "inner").unwrap();
        assert_eq!(inner.parent_function.as_deref(), Some("outer"));
        assert_eq!(inner.parent_class, None);
    }

    #[test]
    fn java_class_with_fields_and_methods() {
        let src = r#"public class Account {
    private int balance;

    public int getBalance() {
        return balance;
    }
}
"#;
        let defs = extract_definitions(Language::Java, src, "/w/Account.java").unwrap();

        let class_records = classes(&defs);
        assert_eq!(class_records.len(), 1);
        assert!(class_records[0]
            .fields
            .as_deref()
            .unwrap()
            .contains("private int balance;"));
        let methods = class_records[0].methods.as_deref().unwrap();
        assert!(methods.starts_with("- public int getBalance"));

        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "getBalance");
        assert_eq!(funcs[0].parent_class.as_deref(), Some("Account"));
    }

    #[test]
    fn c_function_names_come_from_the_declarator() {
        let src = "int add(int a, int b) {\n    return a + b;\n}\n";
        let defs = extract_definitions(Language::C, src, "/w/math.c").unwrap();
        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "add");
        assert_eq!(funcs[0].start_line, 1);
        assert_eq!(funcs[0].end_line, 3);
    }

    #[test]
    fn cpp_class_separates_fields_from_method_prototypes() {
        let src = r#"class Point {
    int x;
    int y;
    int norm();
    int dot(Point other) { return x * other.x + y * other.y; }
};
"#;
        let defs = extract_definitions(Language::Cpp, src, "/w/point.cpp").unwrap();
        let class_records = classes(&defs);
        assert_eq!(class_records.len(), 1);
        let fields = class_records[0].fields.as_deref().unwrap();
        assert!(fields.contains("int x;"));
        assert!(fields.contains("int y;"));
        let methods = class_records[0].methods.as_deref().unwrap();
        assert!(methods.contains("norm"));
        assert!(methods.contains("dot"));
    }

    #[test]
    fn typescript_class_methods_and_top_level_functions() {
        let src = r#"function helper(x: number): number {
    return x * 2;
}

class Service {
    run(): void {
    }
}
"#;
        let defs = extract_definitions(Language::TypeScript, src, "/w/svc.ts").unwrap();
        let funcs = functions(&defs);
        let helper = funcs.iter().find(|f| f.name == "helper").unwrap();
        assert_eq!(helper.parent_class, None);
        let run = funcs.iter().find(|f| f.name == "run").unwrap();
        assert_eq!(run.parent_class.as_deref(), Some("Service"));
    }

    #[test]
    fn javascript_class_methods_are_indexed() {
        let src = r#"class Queue {
    push(item) {
        this.items.push(item);
    }
}
"#;
        let defs = extract_definitions(Language::JavaScript, src, "/w/queue.js").unwrap();
        let funcs = functions(&defs);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "push");
        assert_eq!(funcs[0].parent_class.as_deref(), Some("Queue"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let src = "def f(): return 1\n\nclass A:\n    def m(self): pass\n";
        let first = extract_definitions(Language::Python, src, "/w/a.py").unwrap();
        let second = extract_definitions(Language::Python, src, "/w/a.py").unwrap();
        assert_eq!(functions(&first), functions(&second));
    }
}
