//! AST to three-address code lowering.
//!
//! Each function body flattens into quads while its frame hands out
//! stack slots; type checks run inline and record into the unit's
//! diagnostics instead of stopping, so one pass reports everything. The
//! lowering keeps a strict jump discipline: every synthesized label is
//! only ever entered through an explicit `Goto` or `CondGoto`, never by
//! falling off the previous quad. Later passes rely on that to treat
//! the jump edges as the complete control flow of a unit.
//!
//! Comparison operators beyond `<` and `==` are rewritten here from the
//! two primitives: `a > b` is `b < a`, `a <= b` is `a < b or a == b`,
//! and `a != b` is `a < b or b < a`.

use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use colored::Colorize;

use crate::{
    diagnostics::Diagnostics,
    frontend::{
        ast::{
            BinaryOperator, BinaryOperatorKind, Block, Expression, ExpressionKind,
            FunctionDefinition, Identifier, IfArm, LiteralKind, Module, Statement, StatementKind,
            TypeAnnotation, UnaryOperatorKind,
        },
        intern::InternedSymbol,
        lexer::Span,
    },
    middle::{
        frame::Frame,
        tac::{Opcode, Quad, Session, TacUnit},
        ty::Type,
    },
};

/// Label the linker resolves the executable entry point against.
pub const ENTRY_LABEL: &str = "_start";

/// Runtime helpers the `print` statement lowers to. They are defined in
/// the unit that defines `main` and imported as undefined symbols
/// everywhere else.
pub const PRINT_INT: &str = "_print_int";
pub const PRINT_BOOL: &str = "_print_bool";

/// Function signatures for the whole compilation, collected before any
/// unit is lowered. Calls resolve against this table, so a function
/// defined in one module is callable from every other module in the
/// same run.
#[derive(Debug, Default)]
pub struct SignatureTable {
    functions: BTreeMap<InternedSymbol, FunctionSignature>,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: InternedSymbol,
    pub parameters: Rc<[Type]>,
    pub return_type: Type,
}

impl SignatureTable {
    /// Scans every parsed module. A function name may only be defined
    /// once per run; later definitions are reported into their own
    /// module's diagnostics.
    pub fn collect(modules: &[Module], diagnostics: &mut [Diagnostics]) -> Self {
        let mut table = Self::default();

        for (module, diagnostics) in modules.iter().zip(diagnostics.iter_mut()) {
            for function in &module.function_definitions {
                if table.functions.contains_key(&function.name.symbol) {
                    diagnostics.report(
                        module
                            .source_file
                            .row_for_position(function.name.span.start),
                        format!(
                            "function `{}` is defined more than once in this program",
                            function.name.symbol.value()
                        ),
                    );
                    continue;
                }

                let signature = FunctionSignature {
                    name: function.name.symbol,
                    parameters: function
                        .parameters
                        .iter()
                        .map(|parameter| Type::from_annotation(parameter.ty.kind))
                        .collect(),
                    return_type: Type::from_annotation(function.return_type.kind),
                };

                table.functions.insert(function.name.symbol, signature);
            }
        }

        table
    }

    pub fn get(&self, name: InternedSymbol) -> Option<&FunctionSignature> {
        self.functions.get(&name)
    }
}

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .expect("Short function name")
    }};
}

macro_rules! report_error {
    ($self:expr, $span:expr, $message:expr $(,)?) => {{
        let message = format!("{}", $message);

        #[cfg(feature = "error-backtrace")]
        let message = format!(
            "{}: {}\n{}",
            "backtrace".blue(),
            format!(
                "{}::{} {}",
                module_path!(),
                function!(),
                format!("(at {}:{}:{})", file!(), line!(), column!()).white()
            ),
            message
        );

        $self.report_error($span, message)
    }};
}

/// A fully lowered compilation unit, ready for the optimizer and code
/// generator. The frames map is keyed by function name; their scope
/// stacks are drained but the flat offset tables remain.
#[derive(Debug)]
pub struct LoweredUnit {
    pub tac: TacUnit,
    pub frames: BTreeMap<String, Frame>,
    pub defines_main: bool,
}

/// Result of lowering one expression: the operand that now holds its
/// value (a temporary, a constant, or a variable slot) and its type.
#[derive(Debug)]
struct EmitResult {
    operand: String,
    ty: Type,
}

pub struct AstLowering<'module, 'run> {
    module: &'module Module<'module>,
    signatures: &'run SignatureTable,
    module_names: &'run BTreeSet<InternedSymbol>,
    session: &'run mut Session,
    diagnostics: &'run mut Diagnostics,
    unit: TacUnit,
    frames: BTreeMap<String, Frame>,
    frame: Frame,
    return_type: Option<Type>,
}

impl<'module, 'run> AstLowering<'module, 'run> {
    pub fn lower_module(
        module: &'module Module,
        signatures: &'run SignatureTable,
        module_names: &'run BTreeSet<InternedSymbol>,
        session: &'run mut Session,
        diagnostics: &'run mut Diagnostics,
    ) -> LoweredUnit {
        let mut lowering = Self {
            module,
            signatures,
            module_names,
            session,
            diagnostics,
            unit: TacUnit::new(),
            frames: BTreeMap::new(),
            frame: Frame::new(),
            return_type: None,
        };

        lowering.check_imports();

        let defines_main = module
            .function_definitions
            .iter()
            .any(|function| function.name.symbol.value() == "main");

        if defines_main {
            lowering.emit_entry_preamble();
        }

        for function in &module.function_definitions {
            lowering.lower_function(function);
        }

        LoweredUnit {
            tac: lowering.unit,
            frames: lowering.frames,
            defines_main,
        }
    }

    fn check_imports(&mut self) {
        for import in &self.module.imports {
            if !self.module_names.contains(&import.name.symbol) {
                report_error!(
                    self,
                    import.span,
                    format!(
                        "imported module `{}` is not part of this compilation",
                        import.name.symbol.value()
                    ),
                );
            }
        }
    }

    /// The process entry point calls `main` and hands its result to the
    /// exit syscall as the process status.
    fn emit_entry_preamble(&mut self) {
        self.unit
            .push_labeled(Quad::new("", "", "", Opcode::Entry), ENTRY_LABEL);
        self.unit.push(Quad::new("", "main", "", Opcode::CallNil));
        self.unit.push(Quad::new("", "", "", Opcode::Exit));
    }

    fn report_error(&mut self, span: Span, message: String) {
        let line = self.module.source_file.row_for_position(span.start);
        self.diagnostics.report(line, message);
    }

    fn lower_function(&mut self, function: &FunctionDefinition) {
        self.frame = Frame::new();
        self.frame.begin_scope();
        self.return_type = Some(Type::from_annotation(function.return_type.kind));

        for (index, parameter) in function.parameters.iter().enumerate() {
            let ty = Type::from_annotation(parameter.ty.kind);

            if self
                .frame
                .declare_parameter(parameter.name.symbol, ty, index)
                .is_none()
            {
                report_error!(
                    self,
                    parameter.span,
                    format!(
                        "parameter `{}` is declared twice",
                        parameter.name.symbol.value()
                    ),
                );
            }
        }

        let begin = self.unit.push_labeled(
            Quad::new("", "", "", Opcode::FunBegin),
            function.name.symbol.value(),
        );

        for statement in &function.body.statements {
            self.lower_statement(statement);
        }

        self.unit.push(Quad::new("", "", "", Opcode::FunEnd));

        // The prologue reserves one 4-byte slot per temporary the body
        // consumed; the count is only known now
        self.unit.quads[begin].opd2 = (4 * self.frame.temps_consumed()).to_string();

        self.frame.end_scope();
        self.frames.insert(
            function.name.symbol.value().to_string(),
            std::mem::take(&mut self.frame),
        );
    }

    fn lower_block(&mut self, block: &Block) {
        self.frame.begin_scope();

        for statement in &block.statements {
            self.lower_statement(statement);
        }

        self.frame.end_scope();
    }

    fn lower_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Declaration { name, ty, value } => {
                self.lower_declaration(name, ty, value)
            }
            StatementKind::Assignment { name, value } => self.lower_assignment(name, value),
            StatementKind::Print(value) => self.lower_print(value),
            StatementKind::If { arms, alternative } => self.lower_if(arms, alternative.as_ref()),
            StatementKind::While { condition, body } => self.lower_while(condition, body),
            StatementKind::Return(value) => self.lower_return(statement.span, value.as_deref()),
            StatementKind::Expression(expression) => self.lower_expression_statement(expression),
        }
    }

    fn lower_declaration(&mut self, name: &Identifier, ty: &TypeAnnotation, value: &Expression) {
        let declared = Type::from_annotation(ty.kind);

        // The initializer is evaluated before the name is bound, so
        // `x: int = x` refers to an outer `x` (or is an error)
        let result = self.emit_expression(value);

        if result.ty != declared {
            report_error!(
                self,
                value.span,
                format!(
                    "`{}` is declared {} but its initializer is {}",
                    name.symbol.value(),
                    declared,
                    result.ty
                ),
            );
        }

        match self.frame.declare_local(name.symbol, declared) {
            Some(symbol) => {
                self.unit
                    .push(Quad::new(symbol.ir_name, result.operand, "", Opcode::Assign));
            }
            None => report_error!(
                self,
                name.span,
                format!(
                    "`{}` is already declared in this scope",
                    name.symbol.value()
                ),
            ),
        }
    }

    fn lower_assignment(&mut self, name: &Identifier, value: &Expression) {
        let result = self.emit_expression(value);

        let Some(symbol) = self.frame.resolve(name.symbol).cloned() else {
            report_error!(
                self,
                name.span,
                format!("`{}` is not declared", name.symbol.value()),
            );
            return;
        };

        if result.ty != symbol.ty {
            report_error!(
                self,
                value.span,
                format!(
                    "`{}` is {} but the assigned value is {}",
                    name.symbol.value(),
                    symbol.ty,
                    result.ty
                ),
            );
        }

        self.unit
            .push(Quad::new(symbol.ir_name, result.operand, "", Opcode::Assign));
    }

    fn lower_print(&mut self, value: &Expression) {
        let result = self.emit_expression(value);

        let helper = match result.ty {
            Type::Int => PRINT_INT,
            Type::Bool => PRINT_BOOL,
            _ => {
                report_error!(
                    self,
                    value.span,
                    format!("print expects an int or bool value, found {}", result.ty),
                );
                return;
            }
        };

        self.unit
            .push(Quad::new("", result.operand, "", Opcode::PushArg));
        self.unit.push(Quad::new("", helper, "", Opcode::CallNil));
        self.unit.push(Quad::new("", "4", "", Opcode::PopArgs));
    }

    fn lower_if(&mut self, arms: &[IfArm], alternative: Option<&Block>) {
        let end_label = self.session.new_label();

        for (index, arm) in arms.iter().enumerate() {
            let condition = self.emit_condition(&arm.condition);
            let true_label = self.session.new_label();

            // The last arm of an else-less chain falls out to the end
            // label directly
            let is_final_exit = index + 1 == arms.len() && alternative.is_none();
            let false_label = if is_final_exit {
                end_label.clone()
            } else {
                self.session.new_label()
            };

            self.unit.push(Quad::new(
                condition,
                true_label.clone(),
                false_label.clone(),
                Opcode::CondGoto,
            ));

            self.unit.mark_label(true_label);
            self.lower_block(&arm.block);
            self.unit
                .push(Quad::new("", end_label.clone(), "", Opcode::Goto));

            if !is_final_exit {
                self.unit.mark_label(false_label);
            }
        }

        if let Some(alternative) = alternative {
            self.lower_block(alternative);
            self.unit
                .push(Quad::new("", end_label.clone(), "", Opcode::Goto));
        }

        self.unit.mark_label(end_label);
    }

    fn lower_while(&mut self, condition: &Expression, body: &Block) {
        let condition_label = self.session.new_label();
        let body_label = self.session.new_label();
        let end_label = self.session.new_label();

        // The condition label is re-entered from the bottom of the loop,
        // so its first entry is an explicit jump too
        self.unit
            .push(Quad::new("", condition_label.clone(), "", Opcode::Goto));
        self.unit.mark_label(condition_label.clone());

        let condition = self.emit_condition(condition);
        self.unit.push(Quad::new(
            condition,
            body_label.clone(),
            end_label.clone(),
            Opcode::CondGoto,
        ));

        self.unit.mark_label(body_label);
        self.lower_block(body);
        self.unit
            .push(Quad::new("", condition_label, "", Opcode::Goto));

        self.unit.mark_label(end_label);
    }

    fn lower_return(&mut self, statement_span: Span, value: Option<&Expression>) {
        let return_type = self.return_type.clone().unwrap_or(Type::Nil);

        match value {
            Some(expression) => {
                let result = self.emit_expression(expression);

                if result.ty != return_type {
                    report_error!(
                        self,
                        expression.span,
                        format!(
                            "return value is {} but the function returns {}",
                            result.ty, return_type
                        ),
                    );
                }

                self.unit
                    .push(Quad::new("", result.operand, "", Opcode::Return));
            }
            None => {
                if return_type != Type::Nil {
                    report_error!(
                        self,
                        statement_span,
                        format!("bare return in a function that returns {return_type}"),
                    );
                }

                self.unit.push(Quad::new("", "", "", Opcode::Return));
            }
        }
    }

    fn lower_expression_statement(&mut self, expression: &Expression) {
        if !matches!(expression.kind, ExpressionKind::FunctionCall { .. }) {
            report_error!(
                self,
                expression.span,
                "expression statement has no effect; only calls may stand alone",
            );
        }

        self.emit_expression(expression);
    }

    fn emit_condition(&mut self, expression: &Expression) -> String {
        let result = self.emit_expression(expression);

        if result.ty != Type::Bool {
            report_error!(
                self,
                expression.span,
                format!("condition must be bool, found {}", result.ty),
            );
        }

        result.operand
    }

    fn emit_expression(&mut self, expression: &Expression) -> EmitResult {
        match &expression.kind {
            ExpressionKind::Literal(literal) => match literal.kind {
                LiteralKind::Integer => EmitResult {
                    operand: literal.symbol.value().to_string(),
                    ty: Type::Int,
                },
                LiteralKind::Boolean => EmitResult {
                    operand: if literal.symbol.value() == "true" {
                        "1"
                    } else {
                        "0"
                    }
                    .to_string(),
                    ty: Type::Bool,
                },
            },
            ExpressionKind::Variable(identifier) => {
                match self.frame.resolve(identifier.symbol).cloned() {
                    Some(symbol) => EmitResult {
                        operand: symbol.ir_name,
                        ty: symbol.ty,
                    },
                    None => {
                        report_error!(
                            self,
                            identifier.span,
                            format!("`{}` is not declared", identifier.symbol.value()),
                        );

                        EmitResult {
                            operand: "0".to_string(),
                            ty: Type::Int,
                        }
                    }
                }
            }
            ExpressionKind::Grouping(inner) => self.emit_expression(inner),
            ExpressionKind::Unary { operator, operand } => match operator.kind {
                UnaryOperatorKind::Negate => {
                    let result = self.emit_expression(operand);

                    if result.ty != Type::Int {
                        report_error!(
                            self,
                            operand.span,
                            format!("unary `-` needs an int operand, found {}", result.ty),
                        );
                    }

                    // 0 - x
                    let target = self.frame.new_temp();
                    self.unit.push(Quad::new(
                        target.clone(),
                        "0",
                        result.operand,
                        Opcode::Minus,
                    ));

                    EmitResult {
                        operand: target,
                        ty: Type::Int,
                    }
                }
            },
            ExpressionKind::Binary { lhs, operator, rhs } => self.emit_binary(lhs, operator, rhs),
            ExpressionKind::FunctionCall { target, arguments } => {
                self.emit_call(expression.span, target, arguments)
            }
        }
    }

    fn emit_binary(
        &mut self,
        lhs: &Expression,
        operator: &BinaryOperator,
        rhs: &Expression,
    ) -> EmitResult {
        let lhs_result = self.emit_expression(lhs);
        let rhs_result = self.emit_expression(rhs);

        match operator.kind {
            BinaryOperatorKind::Add
            | BinaryOperatorKind::Subtract
            | BinaryOperatorKind::Multiply
            | BinaryOperatorKind::Divide => {
                self.check_int_operands(operator, &lhs_result, &rhs_result);

                let op = match operator.kind {
                    BinaryOperatorKind::Add => Opcode::Plus,
                    BinaryOperatorKind::Subtract => Opcode::Minus,
                    BinaryOperatorKind::Multiply => Opcode::Star,
                    BinaryOperatorKind::Divide => Opcode::Slash,
                    _ => unreachable!(),
                };

                let target = self.frame.new_temp();
                self.unit.push(Quad::new(
                    target.clone(),
                    lhs_result.operand,
                    rhs_result.operand,
                    op,
                ));

                EmitResult {
                    operand: target,
                    ty: Type::Int,
                }
            }
            BinaryOperatorKind::LessThan => {
                self.check_int_operands(operator, &lhs_result, &rhs_result);
                self.emit_less(lhs_result.operand, rhs_result.operand)
            }
            BinaryOperatorKind::GreaterThan => {
                self.check_int_operands(operator, &lhs_result, &rhs_result);
                // a > b is b < a
                self.emit_less(rhs_result.operand, lhs_result.operand)
            }
            BinaryOperatorKind::LessThanOrEqualTo => {
                self.check_int_operands(operator, &lhs_result, &rhs_result);

                // a <= b is (a < b) or (a == b)
                let less = self.emit_less(lhs_result.operand.clone(), rhs_result.operand.clone());
                let equal = self.emit_equal(lhs_result.operand, rhs_result.operand);
                self.emit_or(less.operand, equal.operand)
            }
            BinaryOperatorKind::GreaterThanOrEqualTo => {
                self.check_int_operands(operator, &lhs_result, &rhs_result);

                // a >= b is (b < a) or (a == b)
                let less = self.emit_less(rhs_result.operand.clone(), lhs_result.operand.clone());
                let equal = self.emit_equal(lhs_result.operand, rhs_result.operand);
                self.emit_or(less.operand, equal.operand)
            }
            BinaryOperatorKind::Equals => {
                self.check_matching_operands(operator, &lhs_result, &rhs_result);
                self.emit_equal(lhs_result.operand, rhs_result.operand)
            }
            BinaryOperatorKind::NotEquals => {
                self.check_matching_operands(operator, &lhs_result, &rhs_result);

                // a != b is (a < b) or (b < a); both sides are 4-byte
                // scalars so the ordering trick holds for bools too
                let below = self.emit_less(lhs_result.operand.clone(), rhs_result.operand.clone());
                let above = self.emit_less(rhs_result.operand, lhs_result.operand);
                self.emit_or(below.operand, above.operand)
            }
            BinaryOperatorKind::LogicalAnd => {
                self.check_bool_operands(operator, &lhs_result, &rhs_result);

                let target = self.frame.new_temp();
                self.unit.push(Quad::new(
                    target.clone(),
                    lhs_result.operand,
                    rhs_result.operand,
                    Opcode::And,
                ));

                EmitResult {
                    operand: target,
                    ty: Type::Bool,
                }
            }
            BinaryOperatorKind::LogicalOr => {
                self.check_bool_operands(operator, &lhs_result, &rhs_result);
                self.emit_or(lhs_result.operand, rhs_result.operand)
            }
        }
    }

    fn emit_less(&mut self, lhs: String, rhs: String) -> EmitResult {
        let target = self.frame.new_temp();
        self.unit
            .push(Quad::new(target.clone(), lhs, rhs, Opcode::Less));

        EmitResult {
            operand: target,
            ty: Type::Bool,
        }
    }

    fn emit_equal(&mut self, lhs: String, rhs: String) -> EmitResult {
        let target = self.frame.new_temp();
        self.unit
            .push(Quad::new(target.clone(), lhs, rhs, Opcode::EqualEqual));

        EmitResult {
            operand: target,
            ty: Type::Bool,
        }
    }

    fn emit_or(&mut self, lhs: String, rhs: String) -> EmitResult {
        let target = self.frame.new_temp();
        self.unit
            .push(Quad::new(target.clone(), lhs, rhs, Opcode::Or));

        EmitResult {
            operand: target,
            ty: Type::Bool,
        }
    }

    fn emit_call(
        &mut self,
        span: Span,
        target: &Identifier,
        arguments: &[Expression],
    ) -> EmitResult {
        let Some(signature) = self.signatures.get(target.symbol).cloned() else {
            report_error!(
                self,
                target.span,
                format!(
                    "`{}` is not a function in this program",
                    target.symbol.value()
                ),
            );

            // Still walk the arguments so their own errors surface
            for argument in arguments {
                self.emit_expression(argument);
            }

            return EmitResult {
                operand: "0".to_string(),
                ty: Type::Int,
            };
        };

        if arguments.len() != signature.parameters.len() {
            report_error!(
                self,
                span,
                format!(
                    "`{}` takes {} argument(s) but {} were supplied",
                    target.symbol.value(),
                    signature.parameters.len(),
                    arguments.len()
                ),
            );
        }

        let mut operands = Vec::with_capacity(arguments.len());

        for (index, argument) in arguments.iter().enumerate() {
            let result = self.emit_expression(argument);

            if let Some(expected) = signature.parameters.get(index) {
                if result.ty != *expected {
                    report_error!(
                        self,
                        argument.span,
                        format!(
                            "argument {} of `{}` is {} but {} was supplied",
                            index + 1,
                            target.symbol.value(),
                            expected,
                            result.ty
                        ),
                    );
                }
            }

            operands.push(result.operand);
        }

        // Arguments are pushed right to left so the first parameter ends
        // up nearest the saved frame pointer
        let pushed = operands.len();
        for operand in operands.into_iter().rev() {
            self.unit.push(Quad::new("", operand, "", Opcode::PushArg));
        }

        let result = match &signature.return_type {
            Type::Nil => {
                self.unit.push(Quad::new(
                    "",
                    target.symbol.value(),
                    "",
                    Opcode::CallNil,
                ));

                EmitResult {
                    operand: "0".to_string(),
                    ty: Type::Nil,
                }
            }
            ty => {
                let temp = self.frame.new_temp();
                self.unit.push(Quad::new(
                    temp.clone(),
                    target.symbol.value(),
                    "",
                    Opcode::CallResult,
                ));

                EmitResult {
                    operand: temp,
                    ty: ty.clone(),
                }
            }
        };

        if pushed > 0 {
            self.unit.push(Quad::new(
                "",
                (4 * pushed).to_string(),
                "",
                Opcode::PopArgs,
            ));
        }

        result
    }

    fn check_int_operands(
        &mut self,
        operator: &BinaryOperator,
        lhs: &EmitResult,
        rhs: &EmitResult,
    ) {
        for operand in [lhs, rhs] {
            if operand.ty != Type::Int {
                report_error!(
                    self,
                    operator.span,
                    format!(
                        "operands of `{}` must be int, found {}",
                        operator_text(operator.kind),
                        operand.ty
                    ),
                );
            }
        }
    }

    fn check_bool_operands(
        &mut self,
        operator: &BinaryOperator,
        lhs: &EmitResult,
        rhs: &EmitResult,
    ) {
        for operand in [lhs, rhs] {
            if operand.ty != Type::Bool {
                report_error!(
                    self,
                    operator.span,
                    format!(
                        "operands of `{}` must be bool, found {}",
                        operator_text(operator.kind),
                        operand.ty
                    ),
                );
            }
        }
    }

    fn check_matching_operands(
        &mut self,
        operator: &BinaryOperator,
        lhs: &EmitResult,
        rhs: &EmitResult,
    ) {
        if lhs.ty != rhs.ty || lhs.ty.is_function() || lhs.ty == Type::Nil {
            report_error!(
                self,
                operator.span,
                format!(
                    "`{}` needs two int or two bool operands, found {} and {}",
                    operator_text(operator.kind),
                    lhs.ty,
                    rhs.ty
                ),
            );
        }
    }
}

fn operator_text(kind: BinaryOperatorKind) -> &'static str {
    match kind {
        BinaryOperatorKind::Add => "+",
        BinaryOperatorKind::Subtract => "-",
        BinaryOperatorKind::Multiply => "*",
        BinaryOperatorKind::Divide => "/",
        BinaryOperatorKind::Equals => "==",
        BinaryOperatorKind::NotEquals => "!=",
        BinaryOperatorKind::LessThan => "<",
        BinaryOperatorKind::LessThanOrEqualTo => "<=",
        BinaryOperatorKind::GreaterThan => ">",
        BinaryOperatorKind::GreaterThanOrEqualTo => ">=",
        BinaryOperatorKind::LogicalAnd => "and",
        BinaryOperatorKind::LogicalOr => "or",
    }
}
