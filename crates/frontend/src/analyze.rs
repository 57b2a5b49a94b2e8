use crate::ast::*;
use crate::diag::{Diagnostic, Pos};
use crate::symbol::{FunctionSymbol, ScopeKind, Symbol, SymbolTable, VariableSymbol};

/// Non-fatal finding, surfaced by the driver under `--verbose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub pos: Pos,
    pub message: String,
}

/// Result of the combined name-resolution and type-checking pass. The two
/// error lists are kept separate so callers can categorize diagnostics.
#[derive(Debug)]
pub struct Analysis {
    pub semantic_errors: Vec<Diagnostic>,
    pub type_errors: Vec<Diagnostic>,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        !self.semantic_errors.is_empty() || !self.type_errors.is_empty()
    }

    /// All errors in reporting order: semantic first, then type, each list
    /// in detection order.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut all = self.semantic_errors;
        all.extend(self.type_errors);
        all
    }
}

/// Analyze a program in a single traversal, resolving names and checking
/// types together. Errors never abort the traversal; they accumulate so the
/// user sees as many as possible. Inferred variable types are written back
/// into the tree for the code generator.
pub fn analyze(program: &mut Program) -> Analysis {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(program);
    Analysis {
        semantic_errors: analyzer.semantic_errors,
        type_errors: analyzer.type_errors,
        warnings: analyzer.warnings,
    }
}

#[derive(Debug, Clone)]
enum ReturnCtx {
    /// Inside a named function with a declared (or defaulted) return type.
    Function { name: String, ret: Type },
    /// Inside a block-bodied lambda; the first `return` fixes the slot.
    Lambda { first: Option<Type> },
}

struct Analyzer {
    table: SymbolTable,
    semantic_errors: Vec<Diagnostic>,
    type_errors: Vec<Diagnostic>,
    warnings: Vec<Warning>,
    returns: Vec<ReturnCtx>,
}

impl Analyzer {
    fn new() -> Self {
        Analyzer {
            table: SymbolTable::new(),
            semantic_errors: Vec::new(),
            type_errors: Vec::new(),
            warnings: Vec::new(),
            returns: Vec::new(),
        }
    }

    fn semantic_error(&mut self, pos: Pos, message: String) {
        self.semantic_errors.push(Diagnostic::semantic(pos, message));
    }

    fn type_error(&mut self, pos: Pos, message: String) {
        self.type_errors.push(Diagnostic::type_error(pos, message));
    }

    fn check_program(&mut self, program: &mut Program) {
        for decl in &mut program.decls {
            self.check_stmt(decl);
        }
        for sym in self.table.global().symbols() {
            if let Symbol::Variable(var) = sym {
                if !var.used {
                    self.warnings.push(Warning {
                        pos: var.pos,
                        message: format!("Variable '{}' is never used", var.name),
                    });
                }
            }
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Func(f) => self.check_func(f),
            Stmt::Block(b) => self.check_block(b),
            Stmt::VarDecl(v) => self.check_var_decl(v),
            Stmt::Assign(a) => self.check_assign(a),
            Stmt::If(i) => self.check_if(i),
            Stmt::Return(r) => self.check_return(r),
            Stmt::Assert(a) => self.check_assert(a),
            Stmt::Expr(e) => {
                self.check_expr(&mut e.expr);
            }
        }
    }

    fn check_func(&mut self, f: &mut FuncDecl) {
        if self.table.is_defined_locally(&f.name) {
            self.semantic_error(f.pos, format!("Function '{}' is already defined", f.name));
            // do not descend into the duplicate's body
            return;
        }
        let ret = f.ret.clone().unwrap_or(Type::VOID);
        let param_types = f.params.iter().map(|p| p.ty.clone()).collect();
        let symbol = FunctionSymbol {
            name: f.name.clone(),
            ty: Type::function(param_types, ret.clone()),
            params: f.params.clone(),
            pos: f.pos,
            defined: true,
        };
        // the local check above makes this collision-free
        let _ = self.table.define(Symbol::Function(symbol));

        self.table.enter_scope(ScopeKind::Function);
        for p in &f.params {
            let var = VariableSymbol {
                name: p.name.clone(),
                ty: p.ty.clone(),
                pos: p.pos,
                initialized: true,
                used: false,
            };
            if self.table.define(Symbol::Variable(var)).is_err() {
                self.semantic_error(p.pos, format!("Parameter '{}' is already defined", p.name));
            }
        }
        self.returns.push(ReturnCtx::Function {
            name: f.name.clone(),
            ret: ret.clone(),
        });
        self.check_block(&mut f.body);
        self.returns.pop();
        self.table.exit_scope();

        if ret != Type::VOID && !block_definitely_returns(&f.body) {
            self.type_error(
                f.pos,
                format!("Function '{}' must return a value of type {ret}", f.name),
            );
        }
    }

    fn check_block(&mut self, block: &mut BlockStmt) {
        self.table.enter_scope(ScopeKind::Block);
        for stmt in &mut block.stmts {
            self.check_stmt(stmt);
        }
        self.finish_block_scope();
    }

    fn finish_block_scope(&mut self) {
        let scope = self.table.exit_scope();
        for sym in scope.symbols() {
            if let Symbol::Variable(var) = sym {
                if !var.used {
                    self.warnings.push(Warning {
                        pos: var.pos,
                        message: format!("Variable '{}' is never used", var.name),
                    });
                }
            }
        }
    }

    fn check_var_decl(&mut self, v: &mut VarDeclStmt) {
        let redefined = self.table.is_defined_locally(&v.name);
        if redefined {
            self.semantic_error(v.pos, format!("Variable '{}' is already defined", v.name));
        }
        // the initializer cannot see the variable it initializes
        let init_ty = v.init.as_mut().map(|init| self.check_expr(init));
        let resolved = match (&v.ty, init_ty) {
            (Some(declared), Some(Some(found))) => {
                if *declared != found {
                    self.type_error(
                        v.pos,
                        format!(
                            "Cannot initialize variable '{}' of type {declared} with value of type {found}",
                            v.name
                        ),
                    );
                }
                Some(declared.clone())
            }
            (Some(declared), _) => Some(declared.clone()),
            (None, Some(Some(found))) => Some(found),
            (None, Some(None)) => None,
            (None, None) => {
                self.semantic_error(
                    v.pos,
                    format!("Variable '{}' must have a type annotation or initializer", v.name),
                );
                None
            }
        };
        v.resolved_ty = resolved.clone();
        if redefined {
            return;
        }
        if let Some(ty) = resolved {
            let var = VariableSymbol {
                name: v.name.clone(),
                ty,
                pos: v.pos,
                initialized: v.init.is_some(),
                used: false,
            };
            let _ = self.table.define(Symbol::Variable(var));
        }
    }

    fn check_assign(&mut self, a: &mut AssignStmt) {
        let value_ty = self.check_expr(&mut a.value);
        let target_ty = match self.table.resolve(&a.name) {
            None => {
                self.semantic_error(a.pos, format!("Undefined variable '{}'", a.name));
                return;
            }
            Some(Symbol::Function(_)) => {
                self.semantic_error(a.pos, format!("'{}' is not a variable", a.name));
                return;
            }
            Some(Symbol::Variable(var)) => var.ty.clone(),
        };
        if let Some(found) = value_ty {
            if found != target_ty {
                self.type_error(
                    a.pos,
                    format!(
                        "Cannot assign value of type {found} to variable '{}' of type {target_ty}",
                        a.name
                    ),
                );
            }
        }
        if let Some(Symbol::Variable(var)) = self.table.resolve_mut(&a.name) {
            var.initialized = true;
        }
    }

    fn check_if(&mut self, i: &mut IfStmt) {
        self.check_condition(&mut i.cond, "If");
        self.check_block(&mut i.then_block);
        if let Some(else_block) = &mut i.else_block {
            self.check_block(else_block);
        }
    }

    fn check_assert(&mut self, a: &mut AssertStmt) {
        self.check_condition(&mut a.cond, "Assert");
    }

    fn check_condition(&mut self, cond: &mut Expr, what: &str) {
        if let Some(ty) = self.check_expr(cond) {
            if ty != Type::BOOL {
                self.type_error(
                    cond.pos(),
                    format!("{what} condition must be of type Bool, found {ty}"),
                );
            }
        }
    }

    fn check_return(&mut self, r: &mut ReturnStmt) {
        let value_ty = match &mut r.value {
            Some(e) => self.check_expr(e),
            None => Some(Type::VOID),
        };
        match self.returns.last().cloned() {
            None => {
                self.type_error(r.pos, "Return statement outside of function".to_string());
            }
            Some(ReturnCtx::Function { name, ret }) => {
                if let Some(found) = value_ty {
                    if found != ret {
                        self.type_error(
                            r.pos,
                            format!(
                                "Cannot return value of type {found} from function '{name}' returning {ret}"
                            ),
                        );
                    }
                }
            }
            Some(ReturnCtx::Lambda { .. }) => {
                if let Some(ReturnCtx::Lambda { first }) = self.returns.last_mut() {
                    if first.is_none() {
                        *first = value_ty;
                    }
                }
            }
        }
    }

    // --- expressions ---

    /// Type of an expression, or `None` when a diagnostic was already
    /// recorded for it; enclosing constructs stay silent on `None` instead
    /// of piling up follow-on errors.
    fn check_expr(&mut self, expr: &mut Expr) -> Option<Type> {
        match expr {
            Expr::Int(_) => Some(Type::INT),
            Expr::Str(_) => Some(Type::STRING),
            Expr::Bool(_) => Some(Type::BOOL),
            Expr::Var(v) => self.check_var(v),
            Expr::Lambda(l) => self.check_lambda(l),
            Expr::Call(c) => self.check_call(c),
            Expr::Binary(b) => self.check_binary(b),
            Expr::Unary(u) => self.check_unary(u),
        }
    }

    fn check_var(&mut self, v: &VarExpr) -> Option<Type> {
        let (ty, uninitialized) = match self.table.resolve(&v.name) {
            None => {
                self.semantic_error(v.pos, format!("Undefined variable '{}'", v.name));
                return None;
            }
            Some(Symbol::Variable(var)) => (var.ty.clone(), !var.initialized),
            Some(Symbol::Function(f)) => (f.ty.clone(), false),
        };
        if uninitialized {
            self.semantic_error(v.pos, format!("Variable '{}' may not be initialized", v.name));
        }
        if let Some(Symbol::Variable(var)) = self.table.resolve_mut(&v.name) {
            var.used = true;
        }
        Some(ty)
    }

    fn check_lambda(&mut self, l: &mut LambdaExpr) -> Option<Type> {
        self.table.enter_scope(ScopeKind::Lambda);
        for p in &l.params {
            let var = VariableSymbol {
                name: p.name.clone(),
                ty: p.ty.clone(),
                pos: p.pos,
                initialized: true,
                used: false,
            };
            if self.table.define(Symbol::Variable(var)).is_err() {
                self.semantic_error(p.pos, format!("Parameter '{}' is already defined", p.name));
            }
        }
        let ret = match &mut l.body {
            LambdaBody::Expr(e) => self.check_expr(e),
            LambdaBody::Block(b) => {
                self.returns.push(ReturnCtx::Lambda { first: None });
                self.check_block(b);
                match self.returns.pop() {
                    Some(ReturnCtx::Lambda { first }) => Some(first.unwrap_or(Type::VOID)),
                    _ => Some(Type::VOID),
                }
            }
        };
        self.table.exit_scope();
        let ret = ret?;
        Some(Type::function(
            l.params.iter().map(|p| p.ty.clone()).collect(),
            ret,
        ))
    }

    fn check_call(&mut self, c: &mut CallExpr) -> Option<Type> {
        let fty = match self.table.resolve(&c.callee) {
            None => {
                self.semantic_error(c.pos, format!("Undefined function '{}'", c.callee));
                self.check_args_only(c);
                return None;
            }
            Some(Symbol::Function(f)) => f.ty.clone(),
            Some(Symbol::Variable(var)) => {
                if var.ty.is_function() {
                    var.ty.clone()
                } else {
                    self.semantic_error(c.pos, format!("'{}' is not a function", c.callee));
                    self.check_args_only(c);
                    return None;
                }
            }
        };
        if let Some(Symbol::Variable(var)) = self.table.resolve_mut(&c.callee) {
            var.used = true;
        }
        let Type::Function { params, ret } = fty else {
            return None;
        };
        let arg_types: Vec<Option<Type>> = c
            .args
            .iter_mut()
            .map(|arg| self.check_expr(arg))
            .collect();
        if params.len() != c.args.len() {
            self.type_error(
                c.pos,
                format!(
                    "Function '{}' expects {} argument(s), found {}",
                    c.callee,
                    params.len(),
                    c.args.len()
                ),
            );
        } else {
            for (i, (expected, found)) in params.iter().zip(&arg_types).enumerate() {
                if let Some(found) = found {
                    if found != expected {
                        self.type_error(
                            c.args[i].pos(),
                            format!(
                                "Argument {} to '{}' must be of type {expected}, found {found}",
                                i + 1,
                                c.callee
                            ),
                        );
                    }
                }
            }
        }
        Some(*ret)
    }

    fn check_args_only(&mut self, c: &mut CallExpr) {
        for arg in &mut c.args {
            self.check_expr(arg);
        }
    }

    fn check_binary(&mut self, b: &mut BinaryExpr) -> Option<Type> {
        let left = self.check_expr(&mut b.left);
        let right = self.check_expr(&mut b.right);
        use BinaryOp::*;
        match b.op {
            Add => {
                let (l, r) = (left?, right?);
                if l == Type::INT && r == Type::INT {
                    Some(Type::INT)
                } else if l == Type::STRING || r == Type::STRING {
                    // concatenation; the non-string side converts at runtime
                    Some(Type::STRING)
                } else {
                    self.binary_op_error(b, &l, &r);
                    None
                }
            }
            Sub | Mul | Div | Mod => {
                let (l, r) = (left?, right?);
                if l == Type::INT && r == Type::INT {
                    Some(Type::INT)
                } else {
                    self.binary_op_error(b, &l, &r);
                    None
                }
            }
            Lt | Gt | Le | Ge => {
                if let (Some(l), Some(r)) = (left, right) {
                    if l != Type::INT || r != Type::INT {
                        self.binary_op_error(b, &l, &r);
                    }
                }
                Some(Type::BOOL)
            }
            Eq | Ne => {
                if let (Some(l), Some(r)) = (left, right) {
                    if l != r {
                        self.binary_op_error(b, &l, &r);
                    }
                }
                Some(Type::BOOL)
            }
            And | Or => {
                if let (Some(l), Some(r)) = (left, right) {
                    if l != Type::BOOL || r != Type::BOOL {
                        self.binary_op_error(b, &l, &r);
                    }
                }
                Some(Type::BOOL)
            }
        }
    }

    fn binary_op_error(&mut self, b: &BinaryExpr, l: &Type, r: &Type) {
        self.type_error(
            b.pos,
            format!(
                "Operator '{}' cannot be applied to operands of type {l} and {r}",
                b.op.symbol()
            ),
        );
    }

    fn check_unary(&mut self, u: &mut UnaryExpr) -> Option<Type> {
        let operand = self.check_expr(&mut u.expr);
        match u.op {
            UnaryOp::Neg => {
                let ty = operand?;
                if ty == Type::INT {
                    Some(Type::INT)
                } else {
                    self.type_error(
                        u.pos,
                        format!("Operator '-' cannot be applied to operand of type {ty}"),
                    );
                    None
                }
            }
            UnaryOp::Not => {
                if let Some(ty) = operand {
                    if ty != Type::BOOL {
                        self.type_error(
                            u.pos,
                            format!("Operator '!' cannot be applied to operand of type {ty}"),
                        );
                    }
                }
                Some(Type::BOOL)
            }
        }
    }
}

fn block_definitely_returns(block: &BlockStmt) -> bool {
    block.stmts.iter().any(stmt_definitely_returns)
}

fn stmt_definitely_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(_) => true,
        Stmt::If(i) => match &i.else_block {
            Some(else_block) => {
                block_definitely_returns(&i.then_block) && block_definitely_returns(else_block)
            }
            None => false,
        },
        Stmt::Block(b) => block_definitely_returns(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn analyze_src(src: &str) -> Analysis {
        let mut parser = Parser::new(src).expect("lexing should succeed");
        let mut program = parser.parse_program().expect("parsing should succeed");
        analyze(&mut program)
    }

    fn check_ok(src: &str) -> Analysis {
        let analysis = analyze_src(src);
        assert!(
            !analysis.has_errors(),
            "expected no errors, got semantic {:?} / type {:?}",
            analysis.semantic_errors,
            analysis.type_errors
        );
        analysis
    }

    fn first_semantic(src: &str) -> String {
        let analysis = analyze_src(src);
        analysis
            .semantic_errors
            .first()
            .expect("expected a semantic error")
            .message
            .clone()
    }

    fn first_type(src: &str) -> String {
        let analysis = analyze_src(src);
        analysis
            .type_errors
            .first()
            .expect("expected a type error")
            .message
            .clone()
    }

    #[test]
    fn accepts_hello_world() {
        check_ok(r#"func main() { println("Hello, World!"); }"#);
    }

    #[test]
    fn accepts_functions_and_calls() {
        check_ok(
            r#"
            func add(x: Int, y: Int) -> Int { return x + y; }
            func main() { println(toString(add(15, 25))); }
            "#,
        );
    }

    #[test]
    fn accepts_lambda_with_inferred_variable_type() {
        check_ok(
            r#"
            func main() {
              let d = (x: Int, y: Int) => x + y;
              println(toString(d(7, 3)));
            }
            "#,
        );
    }

    #[test]
    fn infers_variable_types_into_the_tree() {
        let src = "func main() { let d = (x: Int) => x + 1; d(1); }";
        let mut parser = Parser::new(src).expect("lexing should succeed");
        let mut program = parser.parse_program().expect("parsing should succeed");
        let analysis = analyze(&mut program);
        assert!(!analysis.has_errors());
        let Stmt::Func(f) = &program.decls[0] else {
            panic!("expected function");
        };
        let Stmt::VarDecl(v) = &f.body.stmts[0] else {
            panic!("expected variable declaration");
        };
        assert_eq!(
            v.resolved_ty,
            Some(Type::function(vec![Type::INT], Type::INT))
        );
    }

    #[test]
    fn rejects_initializer_of_wrong_type() {
        let msg = first_type(r#"func main() { let x: Int = "hello"; }"#);
        assert_eq!(
            msg,
            "Cannot initialize variable 'x' of type Int with value of type String"
        );
    }

    #[test]
    fn rejects_function_that_may_not_return() {
        let msg = first_type(
            r#"
            func getValue(c: Bool) -> Int {
              if (c) { return 5; }
            }
            "#,
        );
        assert_eq!(msg, "Function 'getValue' must return a value of type Int");
    }

    #[test]
    fn accepts_if_else_where_both_branches_return() {
        check_ok(
            r#"
            func pick(c: Bool) -> Int {
              if (c) { return 1; } else { return 2; }
            }
            "#,
        );
    }

    #[test]
    fn return_inside_nested_block_counts() {
        check_ok("func f() -> Int { { return 1; } }");
    }

    #[test]
    fn rejects_undefined_variable() {
        assert_eq!(
            first_semantic("func main() { let x = missing; }"),
            "Undefined variable 'missing'"
        );
    }

    #[test]
    fn rejects_undefined_function() {
        assert_eq!(
            first_semantic("func main() { helper(); }"),
            "Undefined function 'helper'"
        );
    }

    #[test]
    fn functions_must_be_declared_before_use() {
        // declarations are processed in source order; no hoisting
        assert_eq!(
            first_semantic("func main() { later(); } func later() { }"),
            "Undefined function 'later'"
        );
    }

    #[test]
    fn accepts_recursion() {
        check_ok(
            r#"
            func fact(n: Int) -> Int {
              if (n < 2) { return 1; }
              return n * fact(n - 1);
            }
            "#,
        );
    }

    #[test]
    fn rejects_use_before_initialization() {
        assert_eq!(
            first_semantic("func main() { let x: Int; let y = x; y; }"),
            "Variable 'x' may not be initialized"
        );
    }

    #[test]
    fn assignment_initializes_the_variable() {
        check_ok("func main() { let x: Int; x = 1; let y = x; y; }");
    }

    #[test]
    fn variable_is_not_visible_to_its_own_initializer() {
        assert_eq!(
            first_semantic("func main() { let x = x; }"),
            "Undefined variable 'x'"
        );
    }

    #[test]
    fn rejects_assignment_to_function() {
        assert_eq!(
            first_semantic("func f() { } func main() { f = 1; }"),
            "'f' is not a variable"
        );
    }

    #[test]
    fn rejects_assignment_of_wrong_type() {
        assert_eq!(
            first_type(r#"func main() { let x = 1; x = "s"; }"#),
            "Cannot assign value of type String to variable 'x' of type Int"
        );
    }

    #[test]
    fn rejects_variable_redefinition_in_same_scope() {
        assert_eq!(
            first_semantic("func main() { let x = 1; let x = 2; }"),
            "Variable 'x' is already defined"
        );
    }

    #[test]
    fn shadowing_in_inner_block_is_allowed() {
        check_ok(
            r#"
            func main() {
              let x = 1;
              { let x = "inner"; println(x); }
              let y = x + 1;
              y;
            }
            "#,
        );
    }

    #[test]
    fn rejects_declaration_without_type_or_initializer() {
        assert_eq!(
            first_semantic("func main() { let x; }"),
            "Variable 'x' must have a type annotation or initializer"
        );
    }

    #[test]
    fn duplicate_function_reports_exactly_one_error() {
        let analysis = analyze_src(
            r#"
            func f() { }
            func f() { completelyUndefined(); }
            "#,
        );
        assert_eq!(analysis.semantic_errors.len(), 1);
        assert_eq!(
            analysis.semantic_errors[0].message,
            "Function 'f' is already defined"
        );
        assert!(analysis.type_errors.is_empty());
    }

    #[test]
    fn builtins_cannot_be_redefined() {
        assert_eq!(
            first_semantic("func println(s: String) { }"),
            "Function 'println' is already defined"
        );
    }

    #[test]
    fn rejects_non_bool_if_condition() {
        assert_eq!(
            first_type("func main() { if (1) { } }"),
            "If condition must be of type Bool, found Int"
        );
    }

    #[test]
    fn rejects_non_bool_assert_condition() {
        assert_eq!(
            first_type(r#"func main() { assert("yes"); }"#),
            "Assert condition must be of type Bool, found String"
        );
    }

    #[test]
    fn accepts_assert_with_message() {
        check_ok(r#"func main() { assert(1 < 2, "math still works"); }"#);
    }

    #[test]
    fn rejects_return_outside_function() {
        assert_eq!(
            first_type("return 1;"),
            "Return statement outside of function"
        );
    }

    #[test]
    fn rejects_return_of_wrong_type() {
        assert_eq!(
            first_type(r#"func f() -> Int { return "s"; }"#),
            "Cannot return value of type String from function 'f' returning Int"
        );
    }

    #[test]
    fn rejects_value_return_from_void_function() {
        assert_eq!(
            first_type("func f() { return 1; }"),
            "Cannot return value of type Int from function 'f' returning Void"
        );
    }

    #[test]
    fn bare_return_in_void_function_is_fine() {
        check_ok("func f() { return; }");
    }

    #[test]
    fn rejects_wrong_argument_count() {
        assert_eq!(
            first_type("func main() { toString(1, 2); }"),
            "Function 'toString' expects 1 argument(s), found 2"
        );
    }

    #[test]
    fn rejects_wrong_argument_type() {
        assert_eq!(
            first_type(r#"func main() { toString("s"); }"#),
            "Argument 1 to 'toString' must be of type Int, found String"
        );
    }

    #[test]
    fn reports_each_bad_argument_once() {
        let analysis = analyze_src(
            r#"
            func two(a: Int, b: Int) { }
            func main() { two("x", "y"); }
            "#,
        );
        assert_eq!(analysis.type_errors.len(), 2);
    }

    #[test]
    fn calls_through_function_typed_variables() {
        check_ok(
            r#"
            func main() {
              let twice = (x: Int) => x * 2;
              let n: Int = twice(21);
              n;
            }
            "#,
        );
    }

    #[test]
    fn rejects_calling_a_non_function() {
        assert_eq!(
            first_semantic("func main() { let x = 1; x(); }"),
            "'x' is not a function"
        );
    }

    #[test]
    fn string_concatenation_accepts_mixed_operands() {
        check_ok(
            r#"
            func main() {
              let a: String = "n = " + 42;
              let b: String = 42 + "!";
              let c: String = a + b;
              c;
            }
            "#,
        );
    }

    #[test]
    fn rejects_addition_of_int_and_bool() {
        assert_eq!(
            first_type("func main() { 1 + true; }"),
            "Operator '+' cannot be applied to operands of type Int and Bool"
        );
    }

    #[test]
    fn rejects_string_comparison() {
        assert_eq!(
            first_type(r#"func main() { let b: Bool = "a" < "b"; b; }"#),
            "Operator '<' cannot be applied to operands of type String and String"
        );
    }

    #[test]
    fn equality_requires_matching_types() {
        assert_eq!(
            first_type(r#"func main() { 1 == "one"; }"#),
            "Operator '==' cannot be applied to operands of type Int and String"
        );
        check_ok(r#"func main() { let b: Bool = "a" == "a"; b; }"#);
    }

    #[test]
    fn equality_works_on_function_types() {
        check_ok(
            r#"
            func main() {
              let f = (x: Int) => x;
              let g = (x: Int) => x + 1;
              let same: Bool = f == g;
              same;
            }
            "#,
        );
    }

    #[test]
    fn logic_requires_bool_operands() {
        assert_eq!(
            first_type("func main() { 1 && true; }"),
            "Operator '&&' cannot be applied to operands of type Int and Bool"
        );
    }

    #[test]
    fn unary_operators_check_their_operand() {
        assert_eq!(
            first_type("func main() { -true; }"),
            "Operator '-' cannot be applied to operand of type Bool"
        );
        assert_eq!(
            first_type("func main() { !1; }"),
            "Operator '!' cannot be applied to operand of type Int"
        );
    }

    #[test]
    fn broken_operand_does_not_cascade() {
        // `missing` is undefined; the surrounding addition stays silent
        let analysis = analyze_src("func main() { let x: Int = missing + 1; x; }");
        assert_eq!(analysis.semantic_errors.len(), 1);
        assert!(analysis.type_errors.is_empty());
    }

    #[test]
    fn lambda_block_body_infers_from_first_return() {
        check_ok(
            r#"
            func main() {
              let f = (x: Int) => { return x + 1; };
              let y: Int = f(2);
              y;
            }
            "#,
        );
    }

    #[test]
    fn lambda_block_without_return_is_void() {
        check_ok(
            r#"
            func main() {
              let f: Func<Void> = () => { println("side effect"); };
              f();
            }
            "#,
        );
    }

    #[test]
    fn lambda_parameters_shadow_enclosing_names() {
        check_ok(
            r#"
            func main() {
              let x = "outer";
              let f = (x: Int) => x + 1;
              println(x);
              f(1);
            }
            "#,
        );
    }

    #[test]
    fn global_variables_are_visible_in_functions() {
        check_ok(
            r#"
            let greeting: String = "hi";
            func main() { println(greeting); }
            "#,
        );
    }

    #[test]
    fn warns_about_unused_variables() {
        let analysis = check_ok("func main() { let unused = 1; }");
        assert_eq!(analysis.warnings.len(), 1);
        assert!(analysis.warnings[0]
            .message
            .contains("Variable 'unused' is never used"));
    }

    #[test]
    fn used_variables_produce_no_warning() {
        let analysis = check_ok("func main() { let x = 1; println(toString(x)); }");
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn empty_program_is_accepted() {
        check_ok("");
    }

    #[test]
    fn errors_carry_positions_within_the_source() {
        let analysis = analyze_src("func main() {\n  let x: Int = \"s\";\n}");
        let diag = &analysis.type_errors[0];
        assert_eq!(diag.pos, Pos::new(2, 3));
    }
}
