//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! # lrtree-ttcn3
//!
//! A TTCN-3 grammar package for the **lrtree** incremental parsing runtime.
//!
//! The package bundles the grammar definition ([`grammar`]), the external
//! scanner for character strings ([`CharstringScanner`]) and a ready-to-use
//! [`Language`] built from both.
//!
//! ## Example
//!
//! ```rust
//! use lrtree::Parser;
//!
//! let language = lrtree_ttcn3::language().unwrap();
//! let mut parser = Parser::new(&language);
//! let tree = parser.parse("module M { const integer x := 1 }", None);
//! let module = tree.root_node().named_child(0).unwrap();
//! assert_eq!(module.kind(), "module");
//! assert!(!tree.root_node().has_error());
//! ```

mod grammar;
mod scanner;

pub use grammar::grammar;
pub use scanner::CharstringScanner;

use lrtree::{CompileOptions, ConflictPolicy, Grammar, GrammarError, Language};
use once_cell::sync::Lazy;

static LANGUAGE: Lazy<Result<Language, GrammarError>> = Lazy::new(build);

fn build() -> Result<Language, GrammarError> {
    let grammar = Grammar::load(&grammar())?;
    // Optional semicolons leave shift/reduce conflicts outside the declared
    // sets; those are settled in favor of shifting.
    let options = CompileOptions::default().conflict_policy(ConflictPolicy::PreferShift);
    let language = Language::compile(&grammar, &options)?;
    log::debug!(
        "TTCN-3 language: {} symbols, {} states",
        language.table().symbol_count(),
        language.table().state_count()
    );
    with_charstring_scanner(language)
}

/// Attaches [`CharstringScanner`] to the language's `charstring` external.
fn with_charstring_scanner(language: Language) -> Result<Language, GrammarError> {
    let Some(charstring) = language.symbol_for_name("charstring", true) else {
        return Err(GrammarError::InvalidTable(format!(
            "language `{}` has no `charstring` external",
            language.name()
        )));
    };
    Ok(language.with_external_scanner(CharstringScanner::new(charstring)))
}

/// Returns the TTCN-3 language, compiling it on first use.
///
/// # Errors
/// Returns the [`GrammarError`] raised while compiling the grammar.
pub fn language() -> Result<Language, GrammarError> {
    LANGUAGE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrtree::{InputEdit, ParseStatus, Parser};
    use proptest::prelude::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sexp(text: &str) -> String {
        let mut parser = Parser::new(&language().unwrap());
        parser.parse(text, None).root_node().to_sexp()
    }

    const MODULE: &str = "module Demo {\n  const integer answer := 6 * 7;\n  function add(in integer a, integer b) return integer {\n    return a + b\n  }\n}";

    #[test]
    fn module_with_definitions() {
        init_logger();
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(MODULE, None);
        assert_eq!(tree.status(), ParseStatus::Complete);
        assert!(!tree.root_node().has_error());
        assert_eq!(
            tree.root_node().to_sexp(),
            "(source_file (module name: (name) \
             (const_decl type: (nested_type (reference)) \
             declarators: (declarator name: (name) value: (binary_expression left: (number) right: (number)))) \
             (func name: (name) \
             parameters: (parameters \
             (parameter type: (nested_type (reference)) name: (name)) \
             (parameter type: (nested_type (reference)) name: (name))) \
             return_type: (return_type type: (nested_type (reference))) \
             body: (block (return_stmt (binary_expression left: (reference) right: (reference)))))))"
        );
        let module = tree.root_node().named_child(0).unwrap();
        let name = module.child_by_field_name("name").unwrap();
        assert_eq!(name.utf8_text(MODULE.as_bytes()).unwrap(), "Demo");
    }

    #[test]
    fn jump_statement_without_semicolon_forks() {
        init_logger();
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse("function f() {\n  break\n  g()\n}", None);
        assert_eq!(
            tree.root_node().to_sexp(),
            "(source_file (func name: (name) parameters: (parameters) \
             body: (block (break_stmt) \
             (reference (function_call_expression function: (reference))))))"
        );
        assert!(parser.stats().ambigs > 0);
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn charstring_with_doubled_quotes() {
        init_logger();
        let text = r#"log("say ""hi"" now")"#;
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        assert_eq!(
            tree.root_node().to_sexp(),
            "(source_file (reference (function_call_expression \
             function: (reference) arguments: (charstring))))"
        );
        let call = tree.root_node().named_child(0).unwrap().named_child(0).unwrap();
        let string = call.child_by_field_name("arguments").unwrap();
        assert_eq!(string.kind(), "charstring");
        assert_eq!(string.byte_range(), 4..text.len() - 1);
    }

    #[test]
    fn unterminated_charstring_is_an_error() {
        init_logger();
        let text = r#"log("open"#;
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        assert!(tree.root_node().has_error());
        assert_eq!(tree.root_node().byte_range(), 0..text.len());
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        init_logger();
        assert_eq!(
            sexp("iffy and not done"),
            "(source_file (binary_expression left: (reference) \
             right: (unary_expression operand: (reference))))"
        );
    }

    #[test]
    fn operator_precedence() {
        init_logger();
        assert_eq!(
            sexp("a or b and c == 1 + 2 * 3"),
            "(source_file (binary_expression left: (reference) \
             right: (binary_expression left: (reference) \
             right: (binary_expression left: (reference) \
             right: (binary_expression left: (number) \
             right: (binary_expression left: (number) right: (number)))))))"
        );
    }

    #[test]
    fn comments_are_extras() {
        init_logger();
        assert_eq!(
            sexp("// header\nconst integer x := 1; /* trailing */"),
            "(source_file (comment) \
             (const_decl type: (nested_type (reference)) \
             declarators: (declarator name: (name) value: (number))) \
             (comment))"
        );
    }

    #[test]
    fn alt_block_with_guards() {
        init_logger();
        let text = "testcase tc() runs on C system S {\n  \
                    alt {\n    \
                    [] p.receive(m) -> value v { setverdict(pass) }\n    \
                    [else] { stop }\n  \
                    }\n}";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        assert!(!tree.root_node().has_error(), "{}", tree.root_node().to_sexp());
        let testcase = tree.root_node().named_child(0).unwrap();
        assert_eq!(testcase.kind(), "testcase");
        let body = testcase.child_by_field_name("body").unwrap();
        let alt = body.named_child(0).unwrap();
        assert_eq!(alt.kind(), "alt_stmt");
        let block = alt.child_by_field_name("body").unwrap();
        let kinds: Vec<&str> = block.named_children().map(|n| n.kind()).collect();
        assert_eq!(kinds, ["guarded_stmt", "guarded_else_stmt"]);
        let guarded = block.named_child(0).unwrap();
        assert!(guarded.child_by_field_name("condition").is_none());
        assert_eq!(guarded.child_by_field_name("stmt").unwrap().kind(), "redirection_expr");
    }

    #[test]
    fn type_definitions() {
        init_logger();
        let text = "module Types {\n  \
                    type record Point { integer x, integer y optional }\n  \
                    type record length(1..10) of Point Path;\n  \
                    type enumerated Color { red, green(2) }\n  \
                    type port P message { in Point; out Color }\n  \
                    type component C { port P p }\n\
                    } with { encode \"JSON\" }";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        let root = tree.root_node();
        assert!(!root.has_error(), "{}", root.to_sexp());
        let module = root.named_child(0).unwrap();
        let kinds: Vec<&str> = module.named_children().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            [
                "name",
                "record_type",
                "record_of_type",
                "enumerated_type",
                "port_type",
                "component_type",
                "attributes"
            ]
        );
    }

    #[test]
    fn definition_forms() {
        init_logger();
        let cases = [
            ("external function ef(integer x) return integer;", "external_function"),
            ("type function F(integer x) return integer;", "function_type"),
            ("type altstep A() runs on C;", "altstep_type"),
            ("type testcase T() runs on C system S;", "testcase_type"),
            ("type class C { var integer x; }", "class_type"),
            ("friend module K;", "friend"),
            ("private friend module K, L;", "friend"),
            ("type map from charstring to integer M;", "map_type"),
            ("configuration Cfg() runs on C { }", "configuration"),
            ("mode M { }", "mode_definition"),
            ("constructor (integer x) : Base(x) { }", "constructor"),
            ("type record R<in type T> { T value }", "record_type"),
            ("import from M all except { const all; type T, U }", "import_definition"),
            (
                "import from M { group G except { type T }; function all except f; import all }",
                "import_definition",
            ),
            ("function f() runs on C mtc M system S return integer exception (E) { }", "func"),
            ("testcase tc() execute on H { }", "testcase"),
        ];
        let mut parser = Parser::new(&language().unwrap());
        for (text, kind) in cases {
            let tree = parser.parse(text, None);
            let root = tree.root_node();
            assert!(!root.has_error(), "{text}: {}", root.to_sexp());
            assert_eq!(root.named_child(0).unwrap().kind(), kind, "{text}");
        }
    }

    #[test]
    fn statement_forms() {
        init_logger();
        let cases = [
            ("select union (u) { case (a) { } }", "select_union_stmt"),
            ("select class (o) { case (C) { } case else { } }", "select_class_stmt"),
            ("select type (t) { case (integer) { } }", "select_type_stmt"),
            ("for (var integer i in l) { }", "for_range_stmt"),
            ("for (e in l) { log(e) }", "for_range_stmt"),
            ("for (i := 0; i < 10; i := i + 1) { }", "for_stmt"),
            ("if (var integer n := f(); n > 0) { }", "if_stmt"),
            ("{ f() } catch { g() } finally { h() }", "block"),
        ];
        let mut parser = Parser::new(&language().unwrap());
        for (stmt, kind) in cases {
            let text = format!("function f() {{ {stmt} }}");
            let tree = parser.parse(&text, None);
            let root = tree.root_node();
            assert!(!root.has_error(), "{text}: {}", root.to_sexp());
            let body = root.named_child(0).unwrap().child_by_field_name("body").unwrap();
            assert_eq!(body.named_child(0).unwrap().kind(), kind, "{text}");
        }
    }

    #[test]
    fn class_with_clauses() {
        init_logger();
        let text = "type external class @abstract C extends B runs on CT {\n  \
                    var integer x;\n  \
                    function f() { }\n\
                    } finally { log(x) }";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        let root = tree.root_node();
        assert!(!root.has_error(), "{}", root.to_sexp());
        let class = root.named_child(0).unwrap();
        assert_eq!(class.kind(), "class_type");
        let named = |field: &str| -> Vec<&str> {
            class
                .children_by_field_name(field)
                .into_iter()
                .filter(|n| n.is_named())
                .map(|n| n.kind())
                .collect()
        };
        assert_eq!(named("super_class"), ["reference"]);
        assert_eq!(named("runs_on"), ["reference"]);
        assert_eq!(named("destructor"), ["block"]);
        assert_eq!(named("modifiers"), ["modifiers"]);
        let kinds: Vec<&str> = class.named_children().map(|n| n.kind()).collect();
        assert!(kinds.contains(&"var_decl") && kinds.contains(&"func"), "{kinds:?}");
    }

    #[test]
    fn block_clauses_are_labelled() {
        init_logger();
        let text = "function f() { } catch { g() } catch { h() } finally { }";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        assert!(!tree.root_node().has_error(), "{}", tree.root_node().to_sexp());
        let body = tree.root_node().named_child(0).unwrap().child_by_field_name("body").unwrap();
        let catches: Vec<&str> = body
            .children_by_field_name("catches")
            .into_iter()
            .map(|n| n.kind())
            .collect();
        assert_eq!(catches, ["catch_clause", "catch_clause"]);
        assert_eq!(body.child_by_field_name("finally").unwrap().kind(), "finally_clause");
    }

    #[test]
    fn port_type_attributes() {
        init_logger();
        let text = "type port P map to Q message realtime {\n  \
                    in A to B with f();\n  \
                    address Addr;\n  \
                    map param (integer p);\n  \
                    unmap param ()\n\
                    }";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        let root = tree.root_node();
        assert!(!root.has_error(), "{}", root.to_sexp());
        let port = root.named_child(0).unwrap();
        let attributes = port.child_by_field_name("port_attributes").unwrap();
        let kinds: Vec<&str> = attributes.named_children().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            ["port_message_types", "port_address", "port_map_param", "port_unmap_param"]
        );
    }

    #[test]
    fn angle_brackets_after_an_identifier() {
        init_logger();
        assert_eq!(
            sexp("a < b"),
            "(source_file (binary_expression left: (reference) right: (reference)))"
        );
        assert_eq!(
            sexp("f(R<integer>)"),
            "(source_file (reference (function_call_expression function: (reference) \
             arguments: (reference (type_instantiation_expression (nested_type (reference)))))))"
        );
    }

    #[test]
    fn expression_forms() {
        init_logger();
        assert_eq!(
            sexp("f(x : 1, -)"),
            "(source_file (reference (function_call_expression function: (reference) \
             arguments: (inline_template (reference) (number)))))"
        );
        let text = "const F c := function (integer x) return integer { return x }";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        assert!(!tree.root_node().has_error(), "{}", tree.root_node().to_sexp());
        let declarator = tree
            .root_node()
            .named_child(0)
            .unwrap()
            .child_by_field_name("declarators")
            .unwrap();
        let value: Vec<&str> = declarator
            .children_by_field_name("value")
            .into_iter()
            .filter(|n| n.is_named())
            .map(|n| n.kind())
            .collect();
        assert_eq!(value, ["function_literal"]);
    }

    #[test]
    fn missing_paren_is_recovered() {
        init_logger();
        let text = "function f() {\n  g(1, 2\n}";
        let mut parser = Parser::new(&language().unwrap());
        let tree = parser.parse(text, None);
        let root = tree.root_node();
        assert!(root.has_error());
        assert_eq!(root.kind(), "source_file");
        assert_eq!(root.byte_range(), 0..text.len());
        assert_eq!(tree.status(), ParseStatus::Complete);
    }

    #[test]
    fn editing_one_constant_reuses_the_other() {
        init_logger();
        let mut text = String::from("module M {\n  const integer a := 1;\n  const integer b := 2;\n}\n");
        let language = language().unwrap();
        let mut parser = Parser::new(&language);
        let old = parser.parse(&text, None);
        assert!(!old.root_node().has_error());

        let at = text.find('2').unwrap();
        let edit = InputEdit::replace(text.as_bytes(), at..at + 1, b"20");
        text.replace_range(at..at + 1, "20");
        let new = parser.reparse(&old, &edit, &text);
        assert!(parser.stats().reused > 0);
        assert_eq!(
            new.root_node().to_sexp(),
            Parser::new(&language).parse(&text, None).root_node().to_sexp()
        );

        let first = |tree: &lrtree::Tree| {
            tree.root_node().named_child(0).unwrap().named_child(1).unwrap().id()
        };
        assert_eq!(first(&new), first(&old));
    }

    #[test]
    fn scanner_needs_a_charstring_external() {
        init_logger();
        let def = lrtree::GrammarDef::new("bare").rule("source_file", lrtree::pat("[a-z]+"));
        let bare = Language::load(&def).unwrap();
        assert!(matches!(
            with_charstring_scanner(bare),
            Err(GrammarError::InvalidTable(_))
        ));
        let ttcn3 = language().unwrap();
        assert!(ttcn3.symbol_for_name("charstring", true).is_some());
    }

    const SAMPLE: &str = "module M {\n  var integer i := 0;\n  function f(integer x) return integer { if (x > 0) { return x } else { return -x } }\n}\n";

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn every_input_yields_a_spanning_tree(text in "[a-z0-9 (){};:=\"+*\n-]{0,48}") {
            let mut parser = Parser::new(&language().unwrap());
            let tree = parser.parse(&text, None);
            prop_assert_eq!(tree.root_node().kind(), "source_file");
            prop_assert_eq!(tree.root_node().byte_range(), 0..text.len());
        }

        #[test]
        fn inserting_whitespace_reparses_like_a_fresh_parse(pick in 0usize..64, extra in "[ \n]{1,3}") {
            let spaces: Vec<usize> = SAMPLE.match_indices(' ').map(|(i, _)| i).collect();
            let at = spaces[pick % spaces.len()];
            let language = language().unwrap();
            let mut parser = Parser::new(&language);
            let old = parser.parse(SAMPLE, None);
            let edit = InputEdit::replace(SAMPLE.as_bytes(), at..at, extra.as_bytes());
            let mut text = SAMPLE.to_string();
            text.insert_str(at, &extra);
            let incremental = parser.reparse(&old, &edit, &text);
            let fresh = Parser::new(&language).parse(&text, None);
            prop_assert!(!fresh.root_node().has_error());
            prop_assert_eq!(incremental.root_node().to_sexp(), fresh.root_node().to_sexp());
        }
    }
}
