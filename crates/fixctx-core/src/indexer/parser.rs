//! Function-boundary parser for C and C++ sources.
//!
//! Uses the native tree-sitter grammars. A function's `start_line` is the line
//! of its name (not of a leading return type or storage class on an earlier
//! line), which is also where the code database anchors a function, so the
//! two sides agree on function identity.

use tree_sitter::Node;

use crate::errors::{FixctxError, FixctxResult};

const C_EXTENSIONS: &[&str] = &["c", "h"];
const CPP_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "c++", "hh", "hpp", "hxx", "h++", "inl"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLanguage {
    C,
    Cpp,
}

/// A function definition found in a full source file. Lines are 1-based and
/// inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    pub start_line: i64,
    pub end_line: i64,
}

pub fn detect_language(filename: &str) -> Option<SourceLanguage> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    if C_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceLanguage::C)
    } else if CPP_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceLanguage::Cpp)
    } else {
        None
    }
}

/// List every function definition in `source`, ordered by start line.
pub fn functions_in(filename: &str, source: &str) -> FixctxResult<Vec<FunctionSpan>> {
    let language = detect_language(filename)
        .ok_or_else(|| FixctxError::Parse(format!("Unsupported source file: {filename}")))?;

    let ts_language = match language {
        SourceLanguage::C => tree_sitter_c::LANGUAGE,
        SourceLanguage::Cpp => tree_sitter_cpp::LANGUAGE,
    };

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&ts_language.into())
        .map_err(|e| FixctxError::Parse(format!("Failed to set language: {e}")))?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| FixctxError::Parse(format!("Failed to parse {filename}")))?;

    let mut spans = Vec::new();
    collect_functions(tree.root_node(), source.as_bytes(), &mut spans);
    spans.sort_by_key(|s| (s.start_line, s.end_line));
    Ok(spans)
}

fn collect_functions(node: Node<'_>, source: &[u8], spans: &mut Vec<FunctionSpan>) {
    if node.kind() == "function_definition" {
        let name_node = function_name_node(node);
        let anchor = name_node.unwrap_or(node);
        let name = name_node
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("(anonymous)")
            .to_string();
        spans.push(FunctionSpan {
            name,
            start_line: anchor.start_position().row as i64 + 1,
            end_line: node.end_position().row as i64 + 1,
        });
        // C has no nested definitions; local classes in C++ bodies are rare
        // enough that their methods are not reported separately.
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_functions(child, source, spans);
    }
}

/// Walk the declarator chain of a definition down to the name node
/// (`identifier`, `qualified_identifier`, `field_identifier`, `operator_name`,
/// `destructor_name`, ...).
fn function_name_node(definition: Node<'_>) -> Option<Node<'_>> {
    let mut current = definition.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => return current.child_by_field_name("declarator"),
            "pointer_declarator"
            | "reference_declarator"
            | "parenthesized_declarator"
            | "attributed_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| last_named_child(current))?;
            }
            _ => return None,
        }
    }
}

fn last_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let last = node.named_children(&mut cursor).last();
    last
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("src/a.c"), Some(SourceLanguage::C));
        assert_eq!(detect_language("inc/a.H"), Some(SourceLanguage::C));
        assert_eq!(detect_language("net/ip6.cpp"), Some(SourceLanguage::Cpp));
        assert_eq!(detect_language("x.hpp"), Some(SourceLanguage::Cpp));
        assert_eq!(detect_language("README.md"), None);
        assert_eq!(detect_language("Makefile"), None);
    }

    #[test]
    fn test_unsupported_file_is_parse_error() {
        let err = functions_in("main.rs", "fn main() {}").unwrap_err();
        assert!(matches!(err, FixctxError::Parse(_)));
    }

    #[test]
    fn test_c_functions() {
        let source = "\
#include <stdio.h>

static int
add(int a, int b)
{
    return a + b;
}

int *lookup(int key) {
    return 0;
}
";
        let spans = functions_in("math.c", source).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "add");
        assert_eq!(spans[0].start_line, 4);
        assert_eq!(spans[0].end_line, 7);
        assert_eq!(spans[1].name, "lookup");
        assert_eq!(spans[1].start_line, 9);
        assert_eq!(spans[1].end_line, 11);
    }

    #[test]
    fn test_cpp_methods_and_qualified_names() {
        let source = "\
namespace ot {
bool Address::IsLoopback(void) const
{
    return true;
}

class Foo {
  public:
    int Get() { return 1; }
};
}
";
        let spans = functions_in("ip6_address.cpp", source).unwrap();
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Address::IsLoopback", "Get"]);
        assert_eq!(spans[0].start_line, 2);
        assert_eq!(spans[0].end_line, 5);
        assert_eq!(spans[1].start_line, 9);
        assert_eq!(spans[1].end_line, 9);
    }

    #[test]
    fn test_declarations_are_not_functions() {
        let source = "int add(int a, int b);\nextern void run(void);\n";
        assert!(functions_in("decl.h", source).unwrap().is_empty());
    }
}
