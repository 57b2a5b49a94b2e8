#![forbid(unsafe_code)]

//! C# code generation for analyzed GP-λ programs.
//!
//! The emitter produces one deterministic source file: a static `Program`
//! class holding the built-in functions, the user's declarations in source
//! order, and a `Main` shim when the user declared `main`. It must only be
//! called after analysis reported zero errors.

use frontend::analyze::analyze;
use frontend::ast::*;
use frontend::diag::{Category, Diagnostic, Pos};
use frontend::parser::Parser;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsgenError {
    #[error("{message}")]
    Unsupported { pos: Pos, message: String },
    #[error("internal code generator error: {0}")]
    Internal(String),
    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl CsgenError {
    /// Unsupported constructs surface as ordinary diagnostics; the other
    /// variants are contract violations with no source position.
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        match self {
            CsgenError::Unsupported { pos, .. } => {
                Some(Diagnostic::semantic(*pos, self.to_string()))
            }
            _ => None,
        }
    }
}

/// Run the whole pipeline over source text and return the emitted C#.
/// Errors come back in reporting order, ready for the driver to print.
pub fn generate_csharp_from_source(src: &str) -> Result<String, Vec<Diagnostic>> {
    let mut parser = Parser::new(src).map_err(|e| vec![e.to_diagnostic()])?;
    let mut program = parser
        .parse_program()
        .map_err(|e| vec![e.to_diagnostic()])?;
    let analysis = analyze(&mut program);
    if analysis.has_errors() {
        return Err(analysis.into_diagnostics());
    }
    generate_csharp(&program).map_err(|e| {
        vec![e.to_diagnostic().unwrap_or_else(|| {
            Diagnostic::new(Pos::new(1, 1), Category::Internal, e.to_string())
        })]
    })
}

pub fn generate_csharp(program: &Program) -> Result<String, CsgenError> {
    let mut out = String::new();
    writeln!(out, "// Generated by gplc. Do not edit.")?;
    writeln!(out, "using System;")?;
    writeln!(out)?;
    writeln!(out, "public static class Program")?;
    writeln!(out, "{{")?;
    emit_builtins(&mut out)?;

    // one pass, declarations in source order
    for decl in &program.decls {
        match decl {
            Stmt::Func(f) => emit_function(f, &mut out)?,
            Stmt::VarDecl(v) => emit_static_field(v, &mut out)?,
            other => {
                return Err(CsgenError::Unsupported {
                    pos: other.pos(),
                    message: "top-level statements are not supported by the code generator"
                        .to_string(),
                })
            }
        }
    }

    if declares_main(program) {
        writeln!(out)?;
        writeln!(out, "    public static void Main(string[] args)")?;
        writeln!(out, "    {{")?;
        writeln!(out, "        main();")?;
        writeln!(out, "    }}")?;
    }

    writeln!(out, "}}")?;
    Ok(out)
}

fn declares_main(program: &Program) -> bool {
    program
        .decls
        .iter()
        .any(|d| matches!(d, Stmt::Func(f) if f.name == "main"))
}

fn emit_builtins(out: &mut String) -> Result<(), CsgenError> {
    writeln!(out, "    public static void println(string value)")?;
    writeln!(out, "    {{")?;
    writeln!(out, "        Console.WriteLine(value);")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    public static string readLine()")?;
    writeln!(out, "    {{")?;
    writeln!(out, "        return Console.ReadLine() ?? \"\";")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    public static string toString(int value)")?;
    writeln!(out, "    {{")?;
    writeln!(out, "        return value.ToString();")?;
    writeln!(out, "    }}")?;
    Ok(())
}

/// GP-λ allows an inner scope to shadow a name; C# rejects a local that
/// shadows another local or parameter of the same method (CS0136). Every
/// declaration inside a method therefore goes through this map, which hands
/// shadowed names a numbered replacement and rewrites their references.
struct LocalNames {
    scopes: Vec<HashMap<String, String>>,
    taken: HashSet<String>,
}

impl LocalNames {
    fn new() -> Self {
        LocalNames {
            scopes: Vec::new(),
            taken: HashSet::new(),
        }
    }

    fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn exit(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) -> String {
        let mut chosen = name.to_string();
        let mut n = 1;
        while self.taken.contains(&chosen) {
            chosen = format!("{name}_{n}");
            n += 1;
        }
        self.taken.insert(chosen.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), chosen.clone());
        }
        chosen
    }

    /// The emitted name for a reference: the nearest local binding, or the
    /// name itself for globals, functions and built-ins.
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        for scope in self.scopes.iter().rev() {
            if let Some(mapped) = scope.get(name) {
                return mapped;
            }
        }
        name
    }
}

fn emit_static_field(v: &VarDeclStmt, out: &mut String) -> Result<(), CsgenError> {
    let ty = resolved_type(v)?;
    let mut names = LocalNames::new();
    writeln!(out)?;
    write!(out, "    public static {} {} = ", map_type(ty), v.name)?;
    match &v.init {
        Some(init) => emit_expr(init, out, &mut names)?,
        None => write!(out, "{}", zero_value(ty))?,
    }
    writeln!(out, ";")?;
    Ok(())
}

fn emit_function(f: &FuncDecl, out: &mut String) -> Result<(), CsgenError> {
    let ret = f.ret.clone().unwrap_or(Type::VOID);
    let mut names = LocalNames::new();
    names.enter();
    writeln!(out)?;
    write!(out, "    public static {} {}(", map_type(&ret), f.name)?;
    for (i, p) in f.params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        let cs_name = names.declare(&p.name);
        write!(out, "{} {cs_name}", map_type(&p.ty))?;
    }
    writeln!(out, ")")?;
    writeln!(out, "    {{")?;
    for stmt in &f.body.stmts {
        emit_stmt(stmt, out, 2, &mut names)?;
    }
    writeln!(out, "    }}")?;
    names.exit();
    Ok(())
}

fn emit_stmt(
    stmt: &Stmt,
    out: &mut String,
    indent: usize,
    names: &mut LocalNames,
) -> Result<(), CsgenError> {
    let pad = "    ".repeat(indent);
    match stmt {
        Stmt::VarDecl(v) => {
            let ty = resolved_type(v)?;
            // render the initializer before declaring: it cannot see the
            // variable it initializes
            let mut init_src = String::new();
            match &v.init {
                Some(init) => emit_expr(init, &mut init_src, names)?,
                None => write!(init_src, "{}", zero_value(ty))?,
            }
            let cs_name = names.declare(&v.name);
            writeln!(out, "{pad}{} {cs_name} = {init_src};", map_type(ty))?;
        }
        Stmt::Assign(a) => {
            write!(out, "{pad}{} = ", names.resolve(&a.name))?;
            emit_expr(&a.value, out, names)?;
            writeln!(out, ";")?;
        }
        Stmt::If(i) => {
            write!(out, "{pad}if (")?;
            emit_expr(&i.cond, out, names)?;
            writeln!(out, ")")?;
            writeln!(out, "{pad}{{")?;
            names.enter();
            for s in &i.then_block.stmts {
                emit_stmt(s, out, indent + 1, names)?;
            }
            names.exit();
            writeln!(out, "{pad}}}")?;
            if let Some(else_block) = &i.else_block {
                writeln!(out, "{pad}else")?;
                writeln!(out, "{pad}{{")?;
                names.enter();
                for s in &else_block.stmts {
                    emit_stmt(s, out, indent + 1, names)?;
                }
                names.exit();
                writeln!(out, "{pad}}}")?;
            }
        }
        Stmt::Return(r) => match &r.value {
            Some(value) => {
                write!(out, "{pad}return ")?;
                emit_expr(value, out, names)?;
                writeln!(out, ";")?;
            }
            None => writeln!(out, "{pad}return;")?,
        },
        Stmt::Assert(a) => {
            // never elided; an explicit conditional throw survives any
            // host build mode
            write!(out, "{pad}if (!(")?;
            emit_expr(&a.cond, out, names)?;
            writeln!(out, "))")?;
            writeln!(out, "{pad}{{")?;
            let message = match &a.message {
                Some(m) => format!("Assertion failed: {m}"),
                None => "Assertion failed".to_string(),
            };
            writeln!(
                out,
                "{pad}    throw new Exception(\"{}\");",
                escape_csharp_string(&message)
            )?;
            writeln!(out, "{pad}}}")?;
        }
        Stmt::Expr(e) => {
            // C# only accepts calls as bare statements (CS0201); anything
            // else is evaluated into a discard
            match &e.expr {
                Expr::Call(_) => write!(out, "{pad}")?,
                _ => write!(out, "{pad}_ = ")?,
            }
            emit_expr(&e.expr, out, names)?;
            writeln!(out, ";")?;
        }
        Stmt::Block(b) => {
            writeln!(out, "{pad}{{")?;
            names.enter();
            for s in &b.stmts {
                emit_stmt(s, out, indent + 1, names)?;
            }
            names.exit();
            writeln!(out, "{pad}}}")?;
        }
        Stmt::Func(f) => {
            return Err(CsgenError::Internal(format!(
                "nested function declaration '{}' cannot be emitted",
                f.name
            )))
        }
    }
    Ok(())
}

fn emit_expr(expr: &Expr, out: &mut String, names: &mut LocalNames) -> Result<(), CsgenError> {
    match expr {
        Expr::Int(i) => write!(out, "{}", i.value)?,
        Expr::Str(s) => write!(out, "\"{}\"", escape_csharp_string(&s.value))?,
        Expr::Bool(b) => write!(out, "{}", if b.value { "true" } else { "false" })?,
        Expr::Var(v) => write!(out, "{}", names.resolve(&v.name))?,
        Expr::Call(c) => {
            write!(out, "{}(", names.resolve(&c.callee))?;
            for (i, arg) in c.args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                emit_expr(arg, out, names)?;
            }
            write!(out, ")")?;
        }
        Expr::Binary(b) => {
            // full parenthesization keeps the source precedence intact
            write!(out, "(")?;
            emit_expr(&b.left, out, names)?;
            write!(out, " {} ", b.op.symbol())?;
            emit_expr(&b.right, out, names)?;
            write!(out, ")")?;
        }
        Expr::Unary(u) => {
            write!(out, "({}", u.op.symbol())?;
            emit_expr(&u.expr, out, names)?;
            write!(out, ")")?;
        }
        Expr::Lambda(l) => {
            let LambdaBody::Expr(body) = &l.body else {
                return Err(CsgenError::Unsupported {
                    pos: l.pos,
                    message: "block-bodied lambdas are not supported by the code generator"
                        .to_string(),
                });
            };
            names.enter();
            write!(out, "(")?;
            for (i, p) in l.params.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                let cs_name = names.declare(&p.name);
                write!(out, "{} {cs_name}", map_type(&p.ty))?;
            }
            write!(out, ") => ")?;
            emit_expr(body, out, names)?;
            names.exit();
        }
    }
    Ok(())
}

fn resolved_type(v: &VarDeclStmt) -> Result<&Type, CsgenError> {
    v.resolved_ty.as_ref().ok_or_else(|| {
        CsgenError::Internal(format!(
            "variable '{}' has no resolved type; the emitter was invoked on an unanalyzed program",
            v.name
        ))
    })
}

fn map_type(ty: &Type) -> String {
    match ty {
        Type::Primitive(Primitive::Int) => "int".to_string(),
        Type::Primitive(Primitive::String) => "string".to_string(),
        Type::Primitive(Primitive::Bool) => "bool".to_string(),
        Type::Primitive(Primitive::Void) => "void".to_string(),
        Type::Function { params, ret } => {
            let mapped: Vec<String> = params.iter().map(map_type).collect();
            if **ret == Type::VOID {
                if mapped.is_empty() {
                    "Action".to_string()
                } else {
                    format!("Action<{}>", mapped.join(", "))
                }
            } else {
                let mut all = mapped;
                all.push(map_type(ret));
                format!("Func<{}>", all.join(", "))
            }
        }
    }
}

fn zero_value(ty: &Type) -> &'static str {
    match ty {
        Type::Primitive(Primitive::Int) => "0",
        Type::Primitive(Primitive::String) => "\"\"",
        Type::Primitive(Primitive::Bool) => "false",
        Type::Primitive(Primitive::Void) => "default",
        Type::Function { .. } => "null",
    }
}

/// Escape a string for inclusion in a C# string literal.
pub fn escape_csharp_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(src: &str) -> String {
        generate_csharp_from_source(src).expect("generation should succeed")
    }

    fn generate_err(src: &str) -> Vec<Diagnostic> {
        generate_csharp_from_source(src).expect_err("expected generation to fail")
    }

    #[test]
    fn empty_program_emits_the_shell() {
        let expected = "\
// Generated by gplc. Do not edit.
using System;

public static class Program
{
    public static void println(string value)
    {
        Console.WriteLine(value);
    }

    public static string readLine()
    {
        return Console.ReadLine() ?? \"\";
    }

    public static string toString(int value)
    {
        return value.ToString();
    }
}
";
        assert_eq!(generate(""), expected);
    }

    #[test]
    fn hello_world_emits_main_and_shim() {
        let cs = generate(r#"func main() { println("Hello, World!"); }"#);
        assert!(cs.contains("    public static void main()\n"));
        assert!(cs.contains("        println(\"Hello, World!\");\n"));
        assert!(cs.contains("    public static void Main(string[] args)\n"));
        assert!(cs.contains("        main();\n"));
    }

    #[test]
    fn emits_functions_in_source_order_with_mapped_types() {
        let cs = generate(
            r#"
            func add(x: Int, y: Int) -> Int { return x + y; }
            func main() { println(toString(add(15, 25))); }
            "#,
        );
        assert!(cs.contains("    public static int add(int x, int y)\n"));
        assert!(cs.contains("        return (x + y);\n"));
        assert!(cs.contains("        println(toString(add(15, 25)));\n"));
        let add_at = cs.find("static int add").expect("add is emitted");
        let main_at = cs.find("static void main").expect("main is emitted");
        assert!(add_at < main_at);
    }

    #[test]
    fn declarations_keep_their_source_order() {
        let cs = generate(
            r#"
            func first() { }
            let mid: Int = 1;
            func last() { mid; }
            "#,
        );
        let first_at = cs.find("static void first").expect("first is emitted");
        let mid_at = cs.find("static int mid").expect("field is emitted");
        let last_at = cs.find("static void last").expect("last is emitted");
        assert!(first_at < mid_at);
        assert!(mid_at < last_at);
    }

    #[test]
    fn program_without_main_has_no_entry_shim() {
        let cs = generate("func helper() { }");
        assert!(!cs.contains("Main(string[] args)"));
    }

    #[test]
    fn output_is_deterministic() {
        let src = r#"
        func add(x: Int, y: Int) -> Int { return x + y; }
        func main() { println(toString(add(1, 2))); }
        "#;
        assert_eq!(generate(src), generate(src));
    }

    #[test]
    fn lambda_emits_a_typed_delegate() {
        let cs = generate(
            r#"
            func main() {
              let d = (x: Int, y: Int) => x + y;
              println(toString(d(7, 3)));
            }
            "#,
        );
        assert!(cs.contains("        Func<int, int, int> d = (int x, int y) => (x + y);\n"));
        assert!(cs.contains("        println(toString(d(7, 3)));\n"));
    }

    #[test]
    fn void_function_types_map_to_actions() {
        let cs = generate(
            r#"
            func main() {
              let log: Func<String, Void> = (s: String) => println(s);
              log("hi");
              let tick: Func<Void> = () => println("tick");
              tick();
            }
            "#,
        );
        assert!(cs.contains("Action<string> log = (string s) => println(s);"));
        assert!(cs.contains("Action tick = () => println(\"tick\");"));
    }

    #[test]
    fn uninitialized_variables_get_zero_values() {
        let cs = generate(
            r#"
            func main() {
              let a: Int;
              let s: String;
              let b: Bool;
              let f: Func<Int, Int>;
              a = 1; s = "x"; b = true; f = (n: Int) => n;
              a; s; b; f;
            }
            "#,
        );
        assert!(cs.contains("        int a = 0;\n"));
        assert!(cs.contains("        string s = \"\";\n"));
        assert!(cs.contains("        bool b = false;\n"));
        assert!(cs.contains("        Func<int, int> f = null;\n"));
    }

    #[test]
    fn non_call_expression_statements_are_discarded() {
        let cs = generate("func main() { let x = 1; x; x + 1; toString(x); }");
        assert!(cs.contains("        _ = x;\n"));
        assert!(cs.contains("        _ = (x + 1);\n"));
        assert!(cs.contains("        toString(x);\n"));
        assert!(!cs.contains("_ = toString"));
    }

    #[test]
    fn shadowed_locals_are_renamed() {
        let cs = generate(
            r#"
            func main() {
              let x = 1;
              { let x = "inner"; println(x); }
              println(toString(x));
            }
            "#,
        );
        assert!(cs.contains("        int x = 1;\n"));
        assert!(cs.contains("            string x_1 = \"inner\";\n"));
        assert!(cs.contains("            println(x_1);\n"));
        assert!(cs.contains("        println(toString(x));\n"));
    }

    #[test]
    fn locals_shadowing_parameters_are_renamed() {
        let cs = generate(
            r#"
            func wrap(x: Int) -> Int {
              if (x > 0) { let x = 0; x = x + 1; return x; }
              return x;
            }
            "#,
        );
        assert!(cs.contains("    public static int wrap(int x)\n"));
        assert!(cs.contains("            int x_1 = 0;\n"));
        assert!(cs.contains("            x_1 = (x_1 + 1);\n"));
        assert!(cs.contains("            return x_1;\n"));
        assert!(cs.contains("        return x;\n"));
    }

    #[test]
    fn lambda_parameters_shadowing_locals_are_renamed() {
        let cs = generate(
            r#"
            func main() {
              let x = "outer";
              let f = (x: Int) => x + 1;
              println(x);
              f(1);
            }
            "#,
        );
        assert!(cs.contains("Func<int, int> f = (int x_1) => (x_1 + 1);"));
        assert!(cs.contains("        println(x);\n"));
    }

    #[test]
    fn nested_lambda_parameters_get_distinct_names() {
        let cs = generate(
            r#"
            func apply(f: Func<Int, Int>, v: Int) -> Int { return f(v); }
            func main() {
              let n = apply((x: Int) => x + apply((x: Int) => x, 1), 2);
              println(toString(n));
            }
            "#,
        );
        assert!(cs.contains("(int x) => (x + apply((int x_1) => x_1, 1))"));
    }

    #[test]
    fn renamed_names_never_collide_with_user_names() {
        let cs = generate(
            r#"
            func consume(v: Int) { }
            func main() {
              let x = 1;
              let x_1 = 2;
              { let x = x_1; consume(x); }
            }
            "#,
        );
        // x_1 is taken by the user, so the shadowed x becomes x_2
        assert!(cs.contains("            int x_2 = x_1;\n"));
        assert!(cs.contains("            consume(x_2);\n"));
    }

    #[test]
    fn top_level_variables_become_static_fields() {
        let cs = generate(
            r#"
            let greeting: String = "hi";
            func main() { println(greeting); }
            "#,
        );
        assert!(cs.contains("    public static string greeting = \"hi\";\n"));
    }

    #[test]
    fn other_top_level_statements_are_rejected() {
        let diags = generate_err(r#"println("top");"#);
        assert!(diags[0]
            .message
            .contains("top-level statements are not supported"));
    }

    #[test]
    fn if_else_emits_braced_blocks() {
        let cs = generate(
            r#"
            func main() {
              if (10 > 5) { println("yes"); } else { println("no"); }
            }
            "#,
        );
        assert!(cs.contains("        if ((10 > 5))\n"));
        assert!(cs.contains("        {\n            println(\"yes\");\n        }\n"));
        assert!(cs.contains("        else\n"));
        assert!(cs.contains("            println(\"no\");\n"));
    }

    #[test]
    fn assert_emits_an_explicit_conditional_throw() {
        let cs = generate(
            r#"
            func main() {
              let x = 3;
              assert(x > 0, "x must be positive");
              assert(x < 10);
            }
            "#,
        );
        assert!(cs.contains("        if (!((x > 0)))\n"));
        assert!(cs
            .contains("            throw new Exception(\"Assertion failed: x must be positive\");\n"));
        assert!(cs.contains("            throw new Exception(\"Assertion failed\");\n"));
    }

    #[test]
    fn operators_are_fully_parenthesized() {
        let cs = generate("func f() -> Int { return 1 + 2 * 3 - -4 % 5; }");
        assert!(cs.contains("return ((1 + (2 * 3)) - ((-4) % 5));"));
    }

    #[test]
    fn string_literals_are_reescaped() {
        let cs = generate(r#"func main() { println("a\"b\n\tc\\"); }"#);
        assert!(cs.contains(r#"println("a\"b\n\tc\\");"#));
    }

    #[test]
    fn unescape_then_escape_round_trips() {
        use frontend::parser::unescape;
        for raw in [r"\n", r"\r", r"\t", r#"\""#, r"\\"] {
            let decoded = unescape(raw);
            assert_eq!(escape_csharp_string(&decoded), raw);
        }
    }

    #[test]
    fn method_calls_emit_as_plain_calls() {
        let cs = generate("func main() { let x = 5; println(x.toString()); }");
        assert!(cs.contains("println(toString(x));"));
    }

    #[test]
    fn block_bodied_lambdas_are_rejected() {
        let diags = generate_err(
            r#"
            func main() {
              let f = (x: Int) => { return x + 1; };
              f(1);
            }
            "#,
        );
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("block-bodied lambdas"));
        assert_eq!(diags[0].category, Category::Semantic);
    }

    #[test]
    fn type_errors_block_generation() {
        let diags = generate_err(r#"func main() { let x: Int = "hello"; }"#);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].category, Category::Type);
        assert!(diags[0]
            .message
            .contains("Cannot initialize variable 'x' of type Int with value of type String"));
    }

    #[test]
    fn error_stream_is_deterministic() {
        let src = r#"func main() { let x: Int = "a"; let y: Bool = 3; missing(); }"#;
        assert_eq!(generate_err(src), generate_err(src));
    }

    #[test]
    fn emitter_fails_fast_on_unanalyzed_programs() {
        let mut parser = Parser::new("func main() { let x = 1; x; }").expect("lex");
        let program = parser.parse_program().expect("parse");
        // analysis skipped: no resolved types anywhere
        let err = generate_csharp(&program).expect_err("must fail fast");
        assert!(matches!(err, CsgenError::Internal(_)));
    }

    #[test]
    fn maps_nested_function_types() {
        assert_eq!(
            map_type(&Type::function(
                vec![Type::function(vec![Type::INT], Type::INT)],
                Type::BOOL
            )),
            "Func<Func<int, int>, bool>"
        );
        assert_eq!(map_type(&Type::function(vec![], Type::STRING)), "Func<string>");
    }
}
