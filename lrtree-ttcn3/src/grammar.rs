//! The TTCN-3 grammar definition.
//!
//! The grammar covers the module structure of TTCN-3 (modules, groups,
//! imports with exceptions, friends), the type, data and behaviour
//! definitions including classes, maps, behaviour types and configurations,
//! the statement language with `alt` blocks, `select` variants, range loops
//! and `catch`/`finally` clauses, and the full operator precedence table.
//! Semicolons between definitions and statements are optional, as in the
//! standard; the resulting local ambiguities are declared as conflicts and
//! explored at parse time.

use lrtree::{
    GrammarDef, Rule, blank, choice, field, lit, optional, pat, prec_left, prec_right, repeat,
    repeat1, sep_by, sep_by1, seq, sym, token,
};

mod prec {
    pub const PRIMARY: i32 = 150;
    pub const UNARY: i32 = 145;
    pub const MULTIPLICATIVE: i32 = 140;
    pub const ADDITIVE: i32 = 130;
    pub const BITWISE_NOT: i32 = 120;
    pub const BITWISE_AND: i32 = 110;
    pub const BITWISE_XOR: i32 = 100;
    pub const BITWISE_OR: i32 = 90;
    pub const SHIFT: i32 = 80;
    pub const RELATIONAL: i32 = 70;
    pub const EQUALITY: i32 = 60;
    pub const LOGICAL_NOT: i32 = 50;
    pub const LOGICAL_AND: i32 = 40;
    pub const LOGICAL_XOR: i32 = 30;
    pub const LOGICAL_OR: i32 = 20;
}

fn lits<const N: usize>(texts: [&str; N]) -> Rule {
    choice(texts.map(lit))
}

fn comma_sep(rule: Rule) -> Rule {
    sep_by(lit(","), rule)
}

fn comma_sep1(rule: Rule) -> Rule {
    sep_by1(lit(","), rule)
}

/// Items separated by optional semicolons.
fn with_semicolons(rule: Rule) -> Rule {
    repeat(seq([rule, optional(lit(";"))]))
}

fn visibility() -> Rule {
    field("visibility", optional(sym("visibility")))
}

fn attributes() -> Rule {
    field("attributes", optional(sym("attributes")))
}

fn name() -> Rule {
    field("name", sym("name"))
}

fn keyword_clause(name: &str, keywords: &[&str], rule: Rule) -> Rule {
    let mut items: Vec<Rule> = keywords.iter().map(|k| lit(k)).collect();
    items.push(rule);
    field(name, optional(seq(items)))
}

fn runs_on() -> Rule {
    keyword_clause("runs_on", &["runs", "on"], sym("reference"))
}

fn extends() -> Rule {
    keyword_clause("extends", &["extends"], sym("reference"))
}

fn exception() -> Rule {
    field(
        "exception",
        optional(seq([lit("exception"), lit("("), sym("references"), lit(")")])),
    )
}

/// `runs on` with an optional `system`, as required by test cases and
/// configurations.
fn runs_on_system() -> Rule {
    seq([
        field("runs_on", seq([lit("runs"), lit("on"), sym("reference")])),
        keyword_clause("system", &["system"], sym("reference")),
    ])
}

fn binary(level: i32, operators: Rule) -> Rule {
    prec_left(
        level,
        seq([
            field("left", sym("_expression")),
            field("operator", operators),
            field("right", sym("_expression")),
        ]),
    )
}

fn unary(level: i32, operators: Rule) -> Rule {
    prec_right(
        level,
        seq([
            field("operator", operators),
            field("operand", sym("_expression")),
        ]),
    )
}

fn structured_type(keyword: &str) -> Rule {
    seq([
        visibility(),
        lit("type"),
        lit(keyword),
        sym("_parameterized_name"),
        lit("{"),
        field("fields", comma_sep(sym("field"))),
        lit("}"),
        attributes(),
    ])
}

fn list_type(keyword: &str) -> Rule {
    seq([
        visibility(),
        lit("type"),
        lit(keyword),
        field("length_constraint", optional(sym("length_spec"))),
        lit("of"),
        field("element_type", sym("nested_type")),
        sym("_parameterized_name"),
        field("element_value_constraint", optional(sym("template_values"))),
        field("element_length_constraint", optional(sym("length_spec"))),
        attributes(),
    ])
}

fn declaration(keyword: &str, template: bool, typed: Rule) -> Rule {
    let restriction = if template {
        field("template_restriction", optional(sym("nested_template")))
    } else {
        blank()
    };
    seq([
        visibility(),
        lit(keyword),
        restriction,
        field("type", typed),
        field("declarators", comma_sep1(sym("declarator"))),
        attributes(),
    ])
}

fn alt_like(keyword: &str) -> Rule {
    seq([
        lit(keyword),
        field("nodefault", optional(lit("@nodefault"))),
        field("body", sym("alt_block")),
    ])
}

/// `select`, `select union`, `select class` and `select type`.
fn select_like(kind: Option<&str>) -> Rule {
    seq([
        lit("select"),
        kind.map_or_else(blank, lit),
        lit("("),
        field("init", optional(seq([sym("_init_stmt"), lit(";")]))),
        field("expression", sym("_expression")),
        lit(")"),
        lit("{"),
        field(
            "clauses",
            repeat1(choice([sym("select_case_clause"), sym("select_else_clause")])),
        ),
        lit("}"),
    ])
}

/// An optional `init;` prefix in conditions.
fn init() -> Rule {
    field("init", optional(seq([sym("_init_stmt"), lit(";")])))
}

fn except_block(spec: Rule) -> Rule {
    seq([lit("except"), lit("{"), with_semicolons(spec), lit("}")])
}

const IMPORT_KINDS: [&str; 8] = [
    "type",
    "template",
    "const",
    "testcase",
    "altstep",
    "function",
    "signature",
    "modulepar",
];

/// Builds the TTCN-3 grammar definition.
pub fn grammar() -> GrammarDef {
    GrammarDef::new("ttcn3")
        // Source files hold definitions, or a single expression such as a
        // module parameter value.
        .rule(
            "source_file",
            choice([with_semicolons(sym("_definition")), sym("_expression")]),
        )
        .rule(
            "_definition",
            choice(
                [
                    "altstep",
                    "altstep_type",
                    "class_type",
                    "component_type",
                    "configuration",
                    "const_decl",
                    "constructor",
                    "control",
                    "enumerated_type",
                    "external_function",
                    "friend",
                    "func",
                    "function_type",
                    "group",
                    "import_definition",
                    "map_type",
                    "mode_definition",
                    "module",
                    "module_parameter",
                    "port_type",
                    "record_of_type",
                    "record_type",
                    "set_of_type",
                    "set_type",
                    "signature",
                    "subtype",
                    "template",
                    "testcase",
                    "testcase_type",
                    "union_type",
                    "var_decl",
                    "timer_decl",
                    "port_decl",
                ]
                .map(sym),
            ),
        )
        .rule(
            "module",
            seq([
                lit("module"),
                sym("_parameterized_name"),
                field("language_spec", optional(sym("language_spec"))),
                sym("_definition_body"),
                attributes(),
            ]),
        )
        .rule(
            "group",
            seq([
                visibility(),
                lit("group"),
                sym("_parameterized_name"),
                sym("_definition_body"),
                attributes(),
            ]),
        )
        .rule(
            "_definition_body",
            seq([lit("{"), with_semicolons(sym("_definition")), lit("}")]),
        )
        .rule(
            "_parameterized_name",
            seq([name(), field("type_parameters", optional(sym("type_parameters")))]),
        )
        // `runs on`, `mtc` and `system` clauses of behaviour definitions.
        .rule(
            "_component_clauses",
            seq([
                runs_on(),
                keyword_clause("mtc", &["mtc"], sym("reference")),
                keyword_clause("system", &["system"], sym("reference")),
            ]),
        )
        .rule(
            "import_definition",
            seq([
                visibility(),
                lit("import"),
                lit("from"),
                field("module_id", sym("reference")),
                keyword_clause("local_name", &["->"], sym("name")),
                field(
                    "body",
                    choice([
                        seq([lit("all"), optional(except_block(sym("except_spec")))]),
                        seq([lit("{"), with_semicolons(sym("import_spec")), lit("}")]),
                    ]),
                ),
                attributes(),
            ]),
        )
        .rule(
            "import_spec",
            choice([
                seq([
                    field("kind", lit("group")),
                    comma_sep1(seq([
                        sym("reference"),
                        optional(except_block(sym("except_spec"))),
                    ])),
                ]),
                seq([
                    field(
                        "kind",
                        choice([lits(IMPORT_KINDS), lit("import")]),
                    ),
                    field(
                        "refs",
                        choice([
                            sym("references"),
                            seq([
                                lit("all"),
                                optional(seq([lit("except"), sym("references")])),
                            ]),
                        ]),
                    ),
                ]),
            ]),
        )
        .rule(
            "except_spec",
            seq([
                field("kind", choice([lit("group"), lits(IMPORT_KINDS)])),
                field("refs", choice([sym("references"), lit("all")])),
            ]),
        )
        .rule(
            "func",
            seq([
                visibility(),
                lit("function"),
                field("modifiers", optional(sym("modifiers"))),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                extends(),
                sym("_component_clauses"),
                field("return_type", optional(sym("return_type"))),
                exception(),
                field("body", optional(sym("block"))),
                attributes(),
            ]),
        )
        .rule(
            "external_function",
            seq([
                visibility(),
                lit("external"),
                lit("function"),
                field("modifiers", optional(sym("modifiers"))),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                field("return_type", optional(sym("return_type"))),
                exception(),
                attributes(),
            ]),
        )
        .rule(
            "altstep",
            seq([
                visibility(),
                lit("altstep"),
                field("modifiers", optional(sym("modifiers"))),
                field("interleave", optional(lit("interleave"))),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                sym("_component_clauses"),
                exception(),
                field("body", sym("alt_block")),
                attributes(),
            ]),
        )
        .rule(
            "testcase",
            seq([
                visibility(),
                lit("testcase"),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                optional(choice([
                    field("execute_on", seq([lit("execute"), lit("on"), sym("reference")])),
                    runs_on_system(),
                ])),
                field("body", sym("block")),
                attributes(),
            ]),
        )
        .rule(
            "configuration",
            seq([
                visibility(),
                lit("configuration"),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                runs_on_system(),
                field("body", optional(sym("block"))),
                attributes(),
            ]),
        )
        .rule(
            "control",
            seq([
                visibility(),
                lit("control"),
                field("body", sym("block")),
                attributes(),
            ]),
        )
        .rule(
            "altstep_type",
            seq([
                visibility(),
                lit("type"),
                lit("altstep"),
                field("interleave", optional(lit("interleave"))),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                sym("_component_clauses"),
                attributes(),
            ]),
        )
        .rule(
            "testcase_type",
            seq([
                visibility(),
                lit("type"),
                lit("testcase"),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                runs_on_system(),
                attributes(),
            ]),
        )
        .rule(
            "function_type",
            seq([
                visibility(),
                lit("type"),
                lit("function"),
                field("modifiers", optional(sym("modifiers"))),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                extends(),
                sym("_component_clauses"),
                field("return_type", optional(sym("return_type"))),
                attributes(),
            ]),
        )
        .rule(
            "class_type",
            seq([
                visibility(),
                lit("type"),
                field("external", optional(lit("external"))),
                lit("class"),
                field("modifiers", optional(sym("modifiers"))),
                sym("_parameterized_name"),
                keyword_clause("super_class", &["extends"], sym("reference")),
                sym("_component_clauses"),
                sym("_definition_body"),
                keyword_clause("destructor", &["finally"], sym("block")),
                attributes(),
            ]),
        )
        .rule(
            "constructor",
            seq([
                visibility(),
                lit("constructor"),
                field("parameters", sym("parameters")),
                keyword_clause("superclass_constructor", &[":"], sym("reference")),
                field("body", optional(sym("block"))),
                attributes(),
            ]),
        )
        .rule(
            "signature",
            seq([
                visibility(),
                lit("signature"),
                sym("_parameterized_name"),
                field("parameters", sym("parameters")),
                field("return_type", optional(sym("return_type"))),
                exception(),
                attributes(),
            ]),
        )
        .rule(
            "const_decl",
            declaration("const", false, optional(sym("nested_type"))),
        )
        .rule(
            "var_decl",
            declaration("var", true, optional(sym("nested_type"))),
        )
        .rule(
            "module_parameter",
            declaration("modulepar", true, sym("nested_type")),
        )
        .rule(
            "timer_decl",
            seq([
                visibility(),
                lit("timer"),
                field("declarators", comma_sep1(sym("declarator"))),
                attributes(),
            ]),
        )
        .rule(
            "port_decl",
            declaration("port", false, sym("nested_type")),
        )
        .rule(
            "map_type",
            seq([
                visibility(),
                lit("type"),
                lit("map"),
                field("key_type", seq([lit("from"), sym("nested_type")])),
                field("value_type", seq([lit("to"), sym("nested_type")])),
                sym("_parameterized_name"),
                attributes(),
            ]),
        )
        .rule(
            "friend",
            seq([
                field("private", optional(lit("private"))),
                lit("friend"),
                lit("module"),
                sym("references"),
                attributes(),
            ]),
        )
        .rule(
            "mode_definition",
            seq([
                visibility(),
                lit("mode"),
                sym("_parameterized_name"),
                field("parameters", optional(sym("parameters"))),
                runs_on(),
                lit("{"),
                lit("}"),
                attributes(),
            ]),
        )
        .rule(
            "template",
            seq([
                visibility(),
                lit("template"),
                field(
                    "restriction",
                    optional(seq([lit("("), sym("template_restriction"), lit(")")])),
                ),
                field("modifiers", optional(sym("modifiers"))),
                field("type", sym("reference")),
                sym("_parameterized_name"),
                field("parameters", optional(sym("parameters"))),
                keyword_clause("modifies", &["modifies"], sym("reference")),
                lit(":="),
                field("value", sym("_expression")),
                attributes(),
            ]),
        )
        .rule("record_type", structured_type("record"))
        .rule("set_type", structured_type("set"))
        .rule("union_type", structured_type("union"))
        .rule("record_of_type", list_type("record"))
        .rule("set_of_type", list_type("set"))
        .rule(
            "enumerated_type",
            seq([
                visibility(),
                lit("type"),
                lit("enumerated"),
                sym("_parameterized_name"),
                lit("{"),
                field("values", comma_sep(sym("enumerated_value"))),
                lit("}"),
                attributes(),
            ]),
        )
        .rule(
            "port_type",
            seq([
                visibility(),
                lit("type"),
                lit("port"),
                sym("_parameterized_name"),
                keyword_clause("map_to", &["map", "to"], sym("references")),
                keyword_clause("connect_to", &["connect", "to"], sym("references")),
                field("kind", lits(["message", "procedure", "stream", "mixed"])),
                field("realtime", optional(lit("realtime"))),
                field("port_attributes", optional(sym("port_attributes"))),
                attributes(),
            ]),
        )
        .rule(
            "component_type",
            seq([
                visibility(),
                lit("type"),
                lit("component"),
                sym("_parameterized_name"),
                keyword_clause("extends", &["extends"], sym("references")),
                field("body", optional(sym("block"))),
                attributes(),
            ]),
        )
        .rule(
            "subtype",
            seq([
                visibility(),
                lit("type"),
                field("super_type", sym("nested_type")),
                sym("_parameterized_name"),
                field("value_constraint", optional(sym("template_values"))),
                field("length_constraint", optional(sym("length_spec"))),
                attributes(),
            ]),
        )
        .rule(
            "field",
            seq([
                field("default", optional(lit("@default"))),
                field("type", sym("nested_type")),
                name(),
                field("array_def", optional(sym("array_def"))),
                field("value_constraint", optional(sym("template_values"))),
                field("length_constraint", optional(sym("length_spec"))),
                field("optional", optional(lit("optional"))),
            ]),
        )
        .rule(
            "array_def",
            repeat1(seq([lit("["), sym("_expression"), lit("]")])),
        )
        .rule(
            "enumerated_value",
            seq([
                name(),
                field(
                    "value",
                    optional(seq([lit("("), comma_sep1(sym("_expression")), lit(")")])),
                ),
            ]),
        )
        .rule(
            "port_attributes",
            seq([
                lit("{"),
                with_semicolons(sym("_port_attribute")),
                lit("}"),
            ]),
        )
        .rule(
            "_port_attribute",
            choice(
                [
                    "var_decl",
                    "const_decl",
                    "port_address",
                    "port_map_param",
                    "port_unmap_param",
                    "port_message_types",
                ]
                .map(sym),
            ),
        )
        .rule(
            "port_address",
            seq([lit("address"), sym("_port_translation_spec")]),
        )
        .rule(
            "port_map_param",
            seq([lit("map"), lit("param"), field("parameters", sym("parameters"))]),
        )
        .rule(
            "port_unmap_param",
            seq([lit("unmap"), lit("param"), field("parameters", sym("parameters"))]),
        )
        .rule(
            "port_message_types",
            seq([
                field("direction", lits(["in", "out", "inout"])),
                field("messages", comma_sep1(sym("_port_translation_spec"))),
            ]),
        )
        .rule(
            "_port_translation_spec",
            seq([
                field("type", sym("reference")),
                field(
                    "translate",
                    optional(seq([
                        field("direction", lits(["from", "to"])),
                        field("outer_type", sym("reference")),
                        lit("with"),
                        field("translator", sym("reference")),
                        lit("("),
                        lit(")"),
                    ])),
                ),
            ]),
        )
        .rule(
            "declarator",
            seq([
                name(),
                field("value", optional(seq([lit(":="), sym("_expression")]))),
            ]),
        )
        .rule(
            "parameters",
            seq([lit("("), comma_sep(sym("parameter")), lit(")")]),
        )
        .rule(
            "parameter",
            seq([
                field("direction", optional(lits(["in", "out", "inout"]))),
                field("type", sym("nested_type")),
                name(),
                field("array_def", optional(sym("array_def"))),
                field("variadic", optional(lit("..."))),
                field("default", optional(seq([lit(":="), sym("_expression")]))),
            ]),
        )
        .rule(
            "type_parameters",
            seq([lit("<"), comma_sep(sym("type_parameter")), lit(">")]),
        )
        .rule(
            "type_parameter",
            seq([
                lit("in"),
                field(
                    "type",
                    choice([sym("nested_type"), lit("type"), lit("signature")]),
                ),
                name(),
                field("default", optional(seq([lit(":="), sym("nested_type")]))),
            ]),
        )
        .rule(
            "return_type",
            seq([
                lit("return"),
                field("template_restriction", optional(sym("nested_template"))),
                field("type", sym("nested_type")),
            ]),
        )
        .rule(
            "nested_template",
            choice([
                seq([
                    lit("template"),
                    optional(seq([lit("("), sym("template_restriction"), lit(")")])),
                ]),
                sym("template_restriction"),
            ]),
        )
        .rule("template_restriction", lits(["omit", "value", "present"]))
        .rule("nested_type", sym("reference"))
        .rule(
            "length_spec",
            seq([
                lit("length"),
                lit("("),
                field("lower", optional(seq([sym("_boundary"), lit("..")]))),
                field("upper", sym("_boundary")),
                lit(")"),
            ]),
        )
        .rule(
            "_boundary",
            seq([
                field("exclusive", optional(lit("!"))),
                field("boundary", choice([sym("number"), sym("reference")])),
            ]),
        )
        .rule(
            "attributes",
            seq([
                lit("with"),
                lit("{"),
                with_semicolons(sym("attribute")),
                lit("}"),
            ]),
        )
        .rule(
            "attribute",
            seq([
                field(
                    "kind",
                    lits(["extension", "encode", "variant", "display", "optional"]),
                ),
                field("modifier", optional(lits(["override", "@local"]))),
                field(
                    "specifier",
                    optional(seq([
                        lit("("),
                        comma_sep1(seq([
                            sym("reference"),
                            optional(seq([lit("except"), lit("{"), sym("references"), lit("}")])),
                        ])),
                        lit(")"),
                    ])),
                ),
                field(
                    "encodings",
                    optional(seq([lit("{"), comma_sep1(sym("charstring")), lit("}")])),
                ),
                field("value", sym("charstring")),
            ]),
        )
        .rule(
            "language_spec",
            seq([lit("language"), comma_sep1(sym("charstring"))]),
        )
        // Statements
        .rule(
            "block",
            seq([
                sym("_basic_block"),
                field("catches", repeat(sym("catch_clause"))),
                field("finally", optional(sym("finally_clause"))),
            ]),
        )
        .rule(
            "_basic_block",
            seq([lit("{"), with_semicolons(sym("_statement")), lit("}")]),
        )
        .rule("catch_clause", seq([lit("catch"), sym("_basic_block")]))
        .rule("finally_clause", seq([lit("finally"), sym("_basic_block")]))
        .rule(
            "_statement",
            choice(
                [
                    "block",
                    "reference",
                    "redirection_expr",
                    "assignment",
                    "var_decl",
                    "timer_decl",
                    "port_decl",
                    "const_decl",
                    "template",
                    "label_stmt",
                    "goto_stmt",
                    "break_stmt",
                    "continue_stmt",
                    "return_stmt",
                    "if_stmt",
                    "select_stmt",
                    "select_union_stmt",
                    "select_class_stmt",
                    "select_type_stmt",
                    "for_stmt",
                    "for_range_stmt",
                    "while_stmt",
                    "do_while_stmt",
                    "alt_stmt",
                    "interleave_stmt",
                ]
                .map(sym),
            ),
        )
        .rule(
            "_init_stmt",
            choice(
                [
                    "assignment",
                    "var_decl",
                    "timer_decl",
                    "port_decl",
                    "const_decl",
                    "template",
                ]
                .map(sym),
            ),
        )
        .rule(
            "assignment",
            seq([
                field("left", sym("reference")),
                lit(":="),
                field("right", sym("_expression")),
            ]),
        )
        .rule(
            "redirection_expr",
            seq([
                sym("reference"),
                lit("->"),
                keyword_clause("value", &["value"], sym("_expression")),
                keyword_clause("sender", &["sender"], sym("_expression")),
                keyword_clause("verdict", &["verdict"], sym("_expression")),
                keyword_clause("param", &["param"], sym("_expression")),
                keyword_clause("timestamp", &["timestamp"], sym("_expression")),
                keyword_clause("index", &["@index", "value"], sym("_expression")),
            ]),
        )
        .rule("label_stmt", seq([lit("label"), sym("name")]))
        .rule("goto_stmt", seq([lit("goto"), sym("name")]))
        .rule("break_stmt", seq([lit("break"), optional(sym("name"))]))
        .rule("continue_stmt", seq([lit("continue"), optional(sym("name"))]))
        .rule(
            "return_stmt",
            seq([lit("return"), optional(sym("_expression"))]),
        )
        .rule(
            "if_stmt",
            seq([
                lit("if"),
                lit("("),
                init(),
                field("condition", sym("_expression")),
                lit(")"),
                field("then", sym("block")),
                field(
                    "else",
                    optional(seq([lit("else"), choice([sym("if_stmt"), sym("block")])])),
                ),
            ]),
        )
        .rule(
            "for_stmt",
            seq([
                lit("for"),
                lit("("),
                field("init", optional(sym("_init_stmt"))),
                lit(";"),
                field("condition", optional(sym("_expression"))),
                lit(";"),
                field("post", optional(sym("assignment"))),
                lit(")"),
                field("body", sym("block")),
            ]),
        )
        .rule(
            "for_range_stmt",
            seq([
                lit("for"),
                lit("("),
                field(
                    "iterator",
                    seq([
                        optional(lits(["var", "const"])),
                        optional(sym("nested_type")),
                        sym("name"),
                    ]),
                ),
                lit("in"),
                field("range", sym("_expression")),
                lit(")"),
                field("body", sym("block")),
            ]),
        )
        .rule(
            "while_stmt",
            seq([
                lit("while"),
                lit("("),
                init(),
                field("condition", sym("_expression")),
                lit(")"),
                field("body", sym("block")),
            ]),
        )
        .rule(
            "do_while_stmt",
            seq([
                lit("do"),
                field("body", sym("block")),
                lit("while"),
                lit("("),
                field("condition", sym("_expression")),
                lit(")"),
            ]),
        )
        .rule("select_stmt", select_like(None))
        .rule("select_union_stmt", select_like(Some("union")))
        .rule("select_class_stmt", select_like(Some("class")))
        .rule("select_type_stmt", select_like(Some("type")))
        .rule(
            "select_case_clause",
            seq([
                lit("case"),
                lit("("),
                field("values", comma_sep1(sym("_expression"))),
                lit(")"),
                field("body", sym("block")),
            ]),
        )
        .rule(
            "select_else_clause",
            seq([lit("case"), lit("else"), field("body", sym("block"))]),
        )
        .rule("alt_stmt", alt_like("alt"))
        .rule("interleave_stmt", alt_like("interleave"))
        .rule(
            "alt_block",
            seq([
                sym("_basic_alt_block"),
                field("catches", repeat(sym("catch_clause"))),
                field("finally", optional(sym("finally_clause"))),
            ]),
        )
        .rule(
            "_basic_alt_block",
            seq([
                lit("{"),
                with_semicolons(choice(
                    [
                        "var_decl",
                        "const_decl",
                        "timer_decl",
                        "port_decl",
                        "template",
                        "guarded_stmt",
                        "guarded_else_stmt",
                    ]
                    .map(sym),
                )),
                lit("}"),
            ]),
        )
        .rule(
            "guarded_stmt",
            seq([
                lit("["),
                field("condition", optional(sym("_expression"))),
                lit("]"),
                field("stmt", sym("_communication_stmt")),
                field("body", optional(sym("block"))),
            ]),
        )
        .rule(
            "_communication_stmt",
            choice([sym("reference"), sym("redirection_expr")]),
        )
        .rule(
            "guarded_else_stmt",
            seq([lit("["), lit("else"), lit("]"), field("body", sym("block"))]),
        )
        // Expressions
        .rule(
            "_expression",
            choice([
                sym("unary_expression"),
                sym("binary_expression"),
                lit("null"),
                lit("omit"),
                lit("-"),
                sym("boolean_literal"),
                sym("verdict_literal"),
                sym("number"),
                sym("charstring"),
                sym("bitstring"),
                sym("hexstring"),
                sym("octetstring"),
                sym("template_values"),
                sym("composite_literal"),
                sym("function_literal"),
                sym("inline_template"),
                sym("reference"),
            ]),
        )
        .rule(
            "unary_expression",
            choice([
                unary(prec::UNARY, lits(["+", "-", "!", "++", "--"])),
                unary(prec::BITWISE_NOT, lit("not4b")),
                unary(prec::LOGICAL_NOT, lit("not")),
            ]),
        )
        .rule(
            "binary_expression",
            choice([
                prec_left(
                    prec::PRIMARY,
                    seq([
                        field("left", sym("reference")),
                        field("operator", lit("=>")),
                        field("right", sym("_expression")),
                    ]),
                ),
                binary(prec::MULTIPLICATIVE, lits(["*", "/", "mod", "rem"])),
                binary(prec::ADDITIVE, lits(["+", "-", "&"])),
                binary(prec::BITWISE_AND, lit("and4b")),
                binary(prec::BITWISE_XOR, lit("xor4b")),
                binary(prec::BITWISE_OR, lit("or4b")),
                binary(prec::SHIFT, lits(["<<", ">>", "<@", "@>"])),
                binary(prec::RELATIONAL, lits(["<", ">", "<=", ">="])),
                binary(prec::EQUALITY, lits(["==", "!="])),
                binary(prec::LOGICAL_AND, lit("and")),
                binary(prec::LOGICAL_XOR, lit("xor")),
                binary(prec::LOGICAL_OR, lit("or")),
            ]),
        )
        .rule(
            "template_values",
            seq([lit("("), comma_sep1(sym("_expression")), lit(")")]),
        )
        .rule(
            "composite_literal",
            seq([lit("{"), comma_sep(sym("_expression")), lit("}")]),
        )
        .rule(
            "function_literal",
            seq([
                lit("function"),
                field("modifiers", optional(sym("modifiers"))),
                field("parameters", sym("parameters")),
                sym("_component_clauses"),
                field("return_type", optional(sym("return_type"))),
                exception(),
                field("body", sym("block")),
            ]),
        )
        .rule(
            "inline_template",
            seq([sym("reference"), lit(":"), sym("_expression")]),
        )
        .rule("references", comma_sep1(sym("reference")))
        .rule(
            "reference",
            choice([
                sym("type_instantiation_expression"),
                sym("selector_expression"),
                sym("index_expression"),
                sym("function_call_expression"),
                sym("_identifier"),
                lit("this"),
                lit("self"),
                lit("???"),
                seq([
                    lits(["any", "all"]),
                    lits(["port", "timer", "component"]),
                ]),
            ]),
        )
        .rule(
            "type_instantiation_expression",
            seq([
                field("type", sym("_identifier")),
                lit("<"),
                comma_sep(sym("nested_type")),
                lit(">"),
            ]),
        )
        .rule(
            "selector_expression",
            prec_left(
                prec::PRIMARY,
                seq([
                    field("operand", sym("reference")),
                    lit("."),
                    field("field", sym("reference")),
                ]),
            ),
        )
        .rule(
            "index_expression",
            prec_left(
                prec::PRIMARY,
                seq([
                    field("operand", sym("reference")),
                    lit("["),
                    field("index", comma_sep(sym("_expression"))),
                    lit("]"),
                ]),
            ),
        )
        .rule(
            "function_call_expression",
            prec_left(
                prec::PRIMARY,
                choice([
                    seq([
                        field("function", sym("reference")),
                        lit("("),
                        field("arguments", comma_sep(sym("_expression"))),
                        field("variadic", optional(lit("..."))),
                        lit(")"),
                    ]),
                    seq([
                        field("function", seq([lits(["any", "all"]), lit("from")])),
                        field("arguments", sym("reference")),
                    ]),
                ]),
            ),
        )
        // Terminals
        .rule("modifiers", repeat1(sym("modifier")))
        .rule("name", sym("_identifier"))
        .rule("visibility", lits(["public", "private", "friend"]))
        .rule("boolean_literal", lits(["true", "false"]))
        .rule(
            "verdict_literal",
            lits(["none", "pass", "inconc", "fail", "error"]),
        )
        .rule("_identifier", pat(r"[a-zA-Z_]\w*"))
        .rule("modifier", pat(r"@\w+"))
        .rule("bitstring", pat(r"'[01*? ]+'[bB]"))
        .rule("hexstring", pat(r"'[0-9A-Fa-f*? ]+'[hH]"))
        .rule("octetstring", pat(r"'[0-9A-Fa-f*? ]+'[oO]"))
        .rule(
            "number",
            token(seq([
                pat(r"\d+(\.\d+)?"),
                optional(pat(r"[eE][+-]?[0-9][0-9_]*")),
            ])),
        )
        .rule(
            "comment",
            token(choice([
                seq([lit("//"), pat(r"[^\n\r]*")]),
                seq([lit("/*"), pat(r"[^*]*\*+([^/*][^*]*\*+)*"), lit("/")]),
            ])),
        )
        .word("_identifier")
        // Whitespace includes the UTF-8 encodings of U+00A0, U+FEFF and U+3000.
        .extras([
            sym("comment"),
            pat(r"(\s|\xC2\xA0|\xEF\xBB\xBF|\xE3\x80\x80)+"),
        ])
        .externals(["charstring"])
        // A jump statement's optional operand and an expression statement on
        // the next line both start with an identifier.
        .conflict(["break_stmt"])
        .conflict(["continue_stmt"])
        .conflict(["return_stmt"])
        // The optional type of a declaration and the declared name; an
        // identifier followed by `<` starts a type instantiation or a
        // comparison.
        .conflict(["reference", "name"])
        .conflict(["reference", "name", "type_instantiation_expression"])
        .conflict(["var_decl"])
        .conflict(["const_decl"])
}
