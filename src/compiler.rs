//! Модуль `compiler`
//!
//! Архитектура frontend/backend:
//! - Frontend: повторная проверка контракта проверенной программы
//!   (нет узлов типа `Error`, все имена объявлены, дерево цельное)
//! - Backend: один обход в глубину, порождающий линейный поток инструкций
//!   FIS-25 с уникальными метками
//!
//! Проверка всегда завершается до начала генерации: для дефектного дерева
//! не порождается ни одной инструкции.

use crate::ast::{Ast, ExprId, ExprKind, StmtKind, StmtList};
use crate::builder::{ValidatedProgram, KEY_LINES};
use crate::error::{MeowError, MeowResult};
use crate::symtab::SymbolTable;
use crate::target::{Instr, Operand, TargetProgram};

/// Скомпилировать проверенную программу без строк заголовка.
pub fn compile(program: &ValidatedProgram) -> MeowResult<TargetProgram> {
    compile_with_header(program, Vec::new())
}

/// Скомпилировать проверенную программу с заданными строками заголовка.
pub fn compile_with_header(
    program: &ValidatedProgram,
    header: Vec<String>,
) -> MeowResult<TargetProgram> {
    verify_program(program)?;
    let generator = CodeGenerator::new(program.ast(), program.symbols());
    generator.generate(program.root(), header)
}

// === Frontend: проверка контракта ===

/// Убедиться, что дерево пригодно для генерации.
///
/// Любое нарушение — дефект построителя, а не ошибка пользователя.
pub fn verify_program(program: &ValidatedProgram) -> MeowResult<()> {
    let verifier = Verifier {
        ast: program.ast(),
        symbols: program.symbols(),
    };
    verifier.verify_list(program.root())
}

struct Verifier<'a> {
    ast: &'a Ast,
    symbols: &'a SymbolTable,
}

impl Verifier<'_> {
    fn verify_list(&self, list: &StmtList) -> MeowResult<()> {
        let mut cursor = list.head();
        while let Some(id) = cursor {
            let stmt = self.ast.stmt(id)?;
            self.verify_stmt(&stmt.kind)?;
            cursor = stmt.next();
        }
        Ok(())
    }

    fn verify_stmt(&self, kind: &StmtKind) -> MeowResult<()> {
        match kind {
            StmtKind::Decl { ty, name, init } => {
                if ty.is_error() {
                    return Err(MeowError::MalformedTree(format!(
                        "declaration of '{}' has error type",
                        name
                    )));
                }
                self.verify_name(name)?;
                if let Some(init) = init {
                    self.verify_expr(init)?;
                }
                Ok(())
            }
            StmtKind::ArrayDecl { name, .. } => self.verify_name(name),
            StmtKind::Assign { name, expr } => {
                self.verify_name(name)?;
                self.verify_expr(expr)
            }
            StmtKind::While { cond, body } => {
                self.verify_expr(cond)?;
                self.verify_list(body)
            }
            StmtKind::If { cond, then_branch } => {
                self.verify_expr(cond)?;
                self.verify_list(then_branch)
            }
            StmtKind::Pixel { x, y, color } => {
                self.verify_expr(x)?;
                self.verify_expr(y)?;
                self.verify_expr(color)
            }
            StmtKind::Key { code, dest } => {
                if !(0..KEY_LINES).contains(code) {
                    return Err(MeowError::MalformedTree(format!(
                        "key code {} reached the generator",
                        code
                    )));
                }
                self.verify_name(dest)
            }
            StmtKind::Input { dest } => self.verify_name(dest),
            StmtKind::Print { expr } => self.verify_expr(expr),
            StmtKind::Block { body } => self.verify_list(body),
        }
    }

    fn verify_expr(&self, id: &ExprId) -> MeowResult<()> {
        let expr = self.ast.expr(id)?;
        if expr.ty.is_error() {
            return Err(MeowError::MalformedTree(format!(
                "expression #{} has error type",
                id.index()
            )));
        }
        match &expr.kind {
            ExprKind::Var(name) => self.verify_name(name),
            ExprKind::Int(_) | ExprKind::Bool(_) => Ok(()),
            ExprKind::Binary { left, right, .. } => {
                self.verify_expr(left)?;
                self.verify_expr(right)
            }
        }
    }

    fn verify_name(&self, name: &str) -> MeowResult<()> {
        if self.symbols.contains(name) {
            Ok(())
        } else {
            Err(MeowError::MalformedTree(format!(
                "undeclared name '{}' reached the generator",
                name
            )))
        }
    }
}

// === Backend: генерация кода ===

/// Генератор кода FIS-25.
///
/// Счётчики меток и временных переменных живут ровно один проход генерации.
/// Все `VAR` собираются в пролог: область видимости одна, и переменная,
/// объявленная в невыполненной ветви, всё равно должна существовать.
pub struct CodeGenerator<'a> {
    ast: &'a Ast,
    symbols: &'a SymbolTable,
    /// Тело программы
    instrs: Vec<Instr>,
    /// Пользовательские переменные в порядке объявления
    declared: Vec<String>,
    /// Временные переменные
    temps: Vec<String>,
    temp_counter: usize,
    label_counter: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(ast: &'a Ast, symbols: &'a SymbolTable) -> Self {
        Self {
            ast,
            symbols,
            instrs: Vec::new(),
            declared: Vec::new(),
            temps: Vec::new(),
            temp_counter: 0,
            label_counter: 0,
        }
    }

    /// Сгенерировать программу для списка операторов `root`.
    pub fn generate(mut self, root: &StmtList, header: Vec<String>) -> MeowResult<TargetProgram> {
        self.compile_list(root)?;

        let mut instrs: Vec<Instr> = self
            .declared
            .into_iter()
            .chain(self.temps)
            .map(Instr::Var)
            .collect();
        instrs.append(&mut self.instrs);
        log::info!(
            "generated {} instructions ({} labels, {} temporaries)",
            instrs.len(),
            self.label_counter,
            self.temp_counter
        );
        Ok(TargetProgram { header, instrs })
    }

    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    /// Новая временная переменная, не совпадающая с пользовательскими именами.
    fn new_temp(&mut self) -> String {
        loop {
            let name = format!("_t{}", self.temp_counter);
            self.temp_counter += 1;
            if !self.symbols.contains(&name) {
                self.temps.push(name.clone());
                return name;
            }
        }
    }

    /// Новый номер для меток одной конструкции.
    fn new_label_id(&mut self) -> usize {
        let id = self.label_counter;
        self.label_counter += 1;
        id
    }

    fn compile_list(&mut self, list: &StmtList) -> MeowResult<()> {
        let ast = self.ast;
        let mut cursor = list.head();
        while let Some(id) = cursor {
            let stmt = ast.stmt(id)?;
            self.compile_stmt(&stmt.kind)?;
            cursor = stmt.next();
        }
        Ok(())
    }

    fn compile_stmt(&mut self, kind: &StmtKind) -> MeowResult<()> {
        match kind {
            StmtKind::Decl { name, init, .. } => {
                self.declared.push(name.clone());
                if let Some(init) = init {
                    let src = self.compile_expr(init)?;
                    self.emit(Instr::Assign {
                        src,
                        dst: name.clone(),
                    });
                }
            }
            StmtKind::ArrayDecl { name, .. } => self.declared.push(name.clone()),
            StmtKind::Assign { name, expr } => {
                let src = self.compile_expr(expr)?;
                self.emit(Instr::Assign {
                    src,
                    dst: name.clone(),
                });
            }
            StmtKind::While { cond, body } => self.compile_while(cond, body)?,
            StmtKind::If { cond, then_branch } => self.compile_if(cond, then_branch)?,
            StmtKind::Pixel { x, y, color } => {
                let x = self.compile_expr(x)?;
                let y = self.compile_expr(y)?;
                let color = self.compile_expr(color)?;
                self.emit(Instr::Pixel { x, y, color });
            }
            StmtKind::Key { code, dest } => self.emit(Instr::Key {
                code: *code,
                dst: dest.clone(),
            }),
            StmtKind::Input { dest } => self.emit(Instr::Input(dest.clone())),
            StmtKind::Print { expr } => {
                let value = self.compile_expr(expr)?;
                self.emit(Instr::Print(value));
            }
            StmtKind::Block { body } => self.compile_list(body)?,
        }
        Ok(())
    }

    /// `while`: голова цикла, условие, переход в тело или за цикл,
    /// тело, обратный переход к голове.
    fn compile_while(&mut self, cond: &ExprId, body: &StmtList) -> MeowResult<()> {
        let id = self.new_label_id();
        let head = format!("WHILE_{}", id);
        let body_label = format!("WHILE_BODY_{}", id);
        let end = format!("WHILE_END_{}", id);
        log::debug!("lowering while loop {}", head);

        self.emit(Instr::Label(head.clone()));
        let cond = self.compile_expr(cond)?;
        self.emit(Instr::IfGoto {
            cond,
            label: body_label.clone(),
        });
        self.emit(Instr::Goto(end.clone()));
        self.emit(Instr::Label(body_label));
        self.compile_list(body)?;
        self.emit(Instr::Goto(head));
        self.emit(Instr::Label(end));
        Ok(())
    }

    /// `if` без `else`: как `while`, но без обратного перехода.
    fn compile_if(&mut self, cond: &ExprId, then_branch: &StmtList) -> MeowResult<()> {
        let id = self.new_label_id();
        let then_label = format!("IF_THEN_{}", id);
        let end = format!("IF_END_{}", id);
        log::debug!("lowering if {}", then_label);

        let cond = self.compile_expr(cond)?;
        self.emit(Instr::IfGoto {
            cond,
            label: then_label.clone(),
        });
        self.emit(Instr::Goto(end.clone()));
        self.emit(Instr::Label(then_label));
        self.compile_list(then_branch)?;
        self.emit(Instr::Label(end));
        Ok(())
    }

    /// Выражение превращается в операнд; бинарная операция пишет результат
    /// в свежую временную переменную.
    fn compile_expr(&mut self, id: &ExprId) -> MeowResult<Operand> {
        let ast = self.ast;
        let expr = ast.expr(id)?;
        if expr.ty.is_error() {
            return Err(MeowError::MalformedTree(format!(
                "expression #{} has error type",
                id.index()
            )));
        }
        match &expr.kind {
            ExprKind::Var(name) => Ok(Operand::Var(name.clone())),
            ExprKind::Int(value) => Ok(Operand::Const(*value)),
            ExprKind::Bool(value) => Ok(Operand::Const(i64::from(*value))),
            ExprKind::Binary { op, left, right } => {
                let a = self.compile_expr(left)?;
                let b = self.compile_expr(right)?;
                let dst = self.new_temp();
                self.emit(Instr::Binary {
                    op: (*op).into(),
                    a,
                    b,
                    dst: dst.clone(),
                });
                Ok(Operand::Var(dst))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::ast::BinOp;
    use crate::builder::ProgramBuilder;
    use crate::machine::{Halt, Machine};
    use crate::target::Opcode;
    use crate::types::MeowType;

    fn run(program: &TargetProgram) -> Machine {
        let mut machine = Machine::new(program.instructions()).unwrap();
        assert_eq!(machine.run(10_000).unwrap(), Halt::Finished);
        machine
    }

    /// Все метки уникальны, каждый переход ведёт на метку, определённую ровно один раз.
    fn assert_well_formed_jumps(program: &TargetProgram) {
        let mut defined: HashMap<&str, usize> = HashMap::new();
        for label in program.labels() {
            *defined.entry(label).or_default() += 1;
        }
        assert!(defined.values().all(|&n| n == 1), "duplicate labels");
        for instr in program.instructions() {
            if let Some(target) = instr.jump_target() {
                assert_eq!(defined.get(target), Some(&1), "dangling jump to {}", target);
            }
        }
    }

    #[test]
    fn test_declare_and_decrement() {
        let mut b = ProgramBuilder::new();
        let two = b.int(2);
        let three = b.int(3);
        let sum = b.binary(BinOp::Add, two, three);
        let decl = b.declare(MeowType::Integer, "x", Some(sum));
        let x = b.var("x");
        let one = b.int(1);
        let dec = b.binary(BinOp::Sub, x, one);
        let assign = b.assign("x", dec);
        let root = b.list([decl, assign]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        let machine = run(&program);
        assert_eq!(machine.var("x"), Some(4));
    }

    #[test]
    fn test_single_pixel() {
        let mut b = ProgramBuilder::new();
        let x = b.int(10);
        let y = b.int(20);
        let c = b.int(1);
        let px = b.pixel(x, y, c);
        let root = b.list([px]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_eq!(
            program.instructions(),
            &[Instr::Pixel {
                x: Operand::Const(10),
                y: Operand::Const(20),
                color: Operand::Const(1),
            }]
        );
        assert_eq!(run(&program).pixel(10, 20), 1);
    }

    #[test]
    fn test_use_before_declaration_suppresses_generation() {
        let mut b = ProgramBuilder::new();
        let y = b.var("y");
        let print = b.print(y);
        let decl = b.declare(MeowType::Integer, "y", None);
        let root = b.list([print, decl]);

        let diags = b.finish(root).unwrap_err();
        assert_eq!(
            diags.errors(),
            &[MeowError::UndeclaredVariable { name: "y".into() }]
        );
    }

    #[test]
    fn test_false_while_never_runs_body() {
        let mut b = ProgramBuilder::new();
        let no = b.bool(false);
        let x = b.int(1);
        let y = b.int(1);
        let c = b.int(1);
        let px = b.pixel(x, y, c);
        let seven = b.int(7);
        let print = b.print(seven);
        let body = b.list([px, print]);
        let w = b.while_loop(no, body);
        let root = b.list([w]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_well_formed_jumps(&program);
        let machine = run(&program);
        assert_eq!(machine.pixel(1, 1), 0);
        assert!(machine.output().is_empty());
    }

    #[test]
    fn test_counting_loop() {
        // int i = 0; while (i < 5) { print(i); i = i + 1; }
        let mut b = ProgramBuilder::new();
        let zero = b.int(0);
        let decl = b.declare(MeowType::Integer, "i", Some(zero));
        let i = b.var("i");
        let five = b.int(5);
        let cond = b.binary(BinOp::Lt, i, five);
        let i = b.var("i");
        let print = b.print(i);
        let i = b.var("i");
        let one = b.int(1);
        let inc = b.binary(BinOp::Add, i, one);
        let step = b.assign("i", inc);
        let body = b.list([print, step]);
        let w = b.while_loop(cond, body);
        let root = b.list([decl, w]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        let machine = run(&program);
        assert_eq!(machine.output(), &[0, 1, 2, 3, 4]);
        assert_eq!(machine.var("i"), Some(5));
    }

    #[test]
    fn test_nested_if_in_while_labels() {
        // int n = 0; int hits = 0;
        // while (n < 6) { if (n > 2) { if (n == 4) { hits = hits + 1; } } n = n + 1; }
        let mut b = ProgramBuilder::new();
        let zero = b.int(0);
        let n_decl = b.declare(MeowType::Integer, "n", Some(zero));
        let zero = b.int(0);
        let hits_decl = b.declare(MeowType::Integer, "hits", Some(zero));

        let hits = b.var("hits");
        let one = b.int(1);
        let bump = b.binary(BinOp::Add, hits, one);
        let bump = b.assign("hits", bump);
        let inner_body = b.list([bump]);
        let n = b.var("n");
        let four = b.int(4);
        let is_four = b.binary(BinOp::Eq, n, four);
        let inner = b.if_then(is_four, inner_body);

        let outer_body = b.list([inner]);
        let n = b.var("n");
        let two = b.int(2);
        let above = b.binary(BinOp::Gt, n, two);
        let outer = b.if_then(above, outer_body);

        let n = b.var("n");
        let one = b.int(1);
        let next = b.binary(BinOp::Add, n, one);
        let step = b.assign("n", next);
        let loop_body = b.list([outer, step]);
        let n = b.var("n");
        let six = b.int(6);
        let cond = b.binary(BinOp::Lt, n, six);
        let w = b.while_loop(cond, loop_body);
        let root = b.list([n_decl, hits_decl, w]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_well_formed_jumps(&program);
        assert_eq!(program.labels().len(), 3 + 2 + 2);
        assert_eq!(run(&program).var("hits"), Some(1));
    }

    #[test]
    fn test_temporaries_are_never_reused() {
        // print((1 + 2) - (3 * 4))
        let mut b = ProgramBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let l = b.binary(BinOp::Add, one, two);
        let three = b.int(3);
        let four = b.int(4);
        let r = b.binary(BinOp::Mul, three, four);
        let diff = b.binary(BinOp::Sub, l, r);
        let print = b.print(diff);
        let root = b.list([print]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        let dsts: Vec<&str> = program
            .instructions()
            .iter()
            .filter_map(|instr| match instr {
                Instr::Binary { dst, .. } => Some(dst.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(dsts.len(), 3);
        assert_eq!(dsts.iter().collect::<HashSet<_>>().len(), 3);
        assert!(matches!(
            program.instructions().last(),
            Some(Instr::Print(Operand::Var(_)))
        ));
        assert_eq!(run(&program).output(), &[-9]);
    }

    #[test]
    fn test_temporaries_avoid_user_names() {
        let mut b = ProgramBuilder::new();
        let decl = b.declare(MeowType::Integer, "_t0", None);
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinOp::Add, one, two);
        let assign = b.assign("_t0", sum);
        let root = b.list([decl, assign]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_eq!(program.instructions()[0], Instr::Var("_t0".into()));
        assert_eq!(program.instructions()[1], Instr::Var("_t1".into()));
        assert_eq!(run(&program).var("_t0"), Some(3));
    }

    #[test]
    fn test_key_poll_and_input() {
        let mut b = ProgramBuilder::new();
        let k = b.declare(MeowType::Integer, "k", None);
        let v = b.declare(MeowType::Integer, "v", None);
        let poll = b.key(3, "k");
        let read = b.input("v");
        let k_ref = b.var("k");
        let v_ref = b.var("v");
        let sum = b.binary(BinOp::Add, k_ref, v_ref);
        let print = b.print(sum);
        let root = b.list([k, v, poll, read, print]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert!(program.instructions().contains(&Instr::Key {
            code: 3,
            dst: "k".into()
        }));
        assert!(program.instructions().contains(&Instr::Input("v".into())));

        let mut machine = Machine::new(program.instructions()).unwrap();
        machine.set_key(3, true);
        machine.push_input(41);
        assert_eq!(machine.run(100).unwrap(), Halt::Finished);
        assert_eq!(machine.output(), &[42]);
    }

    #[test]
    fn test_block_and_bool_lowering() {
        let mut b = ProgramBuilder::new();
        let yes = b.bool(true);
        let flag = b.declare(MeowType::Boolean, "flag", Some(yes));
        let f = b.var("flag");
        let print = b.print(f);
        let inner = b.list([print]);
        let block = b.block(inner);
        let root = b.list([flag, block]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instr::Var("flag".into()),
                Instr::Assign {
                    src: Operand::Const(1),
                    dst: "flag".into()
                },
                Instr::Print(Operand::var("flag")),
            ]
        );
    }

    #[test]
    fn test_comparison_opcodes() {
        let mut b = ProgramBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let gt = b.binary(BinOp::Gt, one, two);
        let print = b.print(gt);
        let root = b.list([print]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert!(matches!(
            program.instructions()[1],
            Instr::Binary { op: Opcode::Gt, .. }
        ));
        assert_eq!(run(&program).output(), &[0]);
    }

    #[test]
    fn test_error_typed_node_is_fatal() {
        // Тип `Error` без диагностики — дефект фронтенда
        let mut ast = Ast::new();
        let e = ast.make_var("e", MeowType::Error);
        let print = ast.make_print(e);
        let root = ast.append_stmt(StmtList::empty(), Some(print));
        let mut symbols = SymbolTable::new();
        symbols.insert("e", MeowType::Integer).unwrap();

        let program = ValidatedProgram::assemble_unchecked(ast, root, symbols);
        assert!(matches!(
            compile(&program),
            Err(MeowError::MalformedTree(_))
        ));
    }

    #[test]
    fn test_foreign_node_is_fatal() {
        let mut other = ProgramBuilder::new();
        for v in 0..4 {
            let _ = other.int(v);
        }
        let foreign = other.int(99);

        let mut b = ProgramBuilder::new();
        let print = b.print(foreign);
        let root = b.list([print]);

        let program = b.finish(root).unwrap();
        assert!(matches!(
            compile(&program),
            Err(MeowError::MalformedTree(_))
        ));
    }

    #[test]
    fn test_foreign_node_with_valid_index_is_fatal() {
        let mut other = ProgramBuilder::new();
        let foreign = other.int(99);

        let mut b = ProgramBuilder::new();
        let seven = b.int(7);
        let own = b.print(seven);
        let stray = b.print(foreign);
        let root = b.list([own, stray]);

        let program = b.finish(root).unwrap();
        assert!(matches!(
            compile(&program),
            Err(MeowError::MalformedTree(_))
        ));
    }

    #[test]
    fn test_declaration_in_skipped_branch_still_exists() {
        // if (false) { int x; } x = 5; print(x);
        let mut b = ProgramBuilder::new();
        let no = b.bool(false);
        let decl = b.declare(MeowType::Integer, "x", None);
        let body = b.list([decl]);
        let skipped = b.if_then(no, body);
        let five = b.int(5);
        let assign = b.assign("x", five);
        let x = b.var("x");
        let print = b.print(x);
        let root = b.list([skipped, assign, print]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_eq!(program.instructions()[0], Instr::Var("x".into()));
        assert_eq!(run(&program).output(), &[5]);
    }

    #[test]
    fn test_prologue_declares_users_then_temporaries() {
        // int a = 1 + 2; while (false) { int b = 3; }
        let mut b = ProgramBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinOp::Add, one, two);
        let a = b.declare(MeowType::Integer, "a", Some(sum));
        let no = b.bool(false);
        let three = b.int(3);
        let inner = b.declare(MeowType::Integer, "b", Some(three));
        let body = b.list([inner]);
        let w = b.while_loop(no, body);
        let root = b.list([a, w]);

        let program = compile(&b.finish(root).unwrap()).unwrap();
        assert_eq!(
            &program.instructions()[..3],
            &[
                Instr::Var("a".into()),
                Instr::Var("b".into()),
                Instr::Var("_t0".into()),
            ]
        );
        let vars = program
            .instructions()
            .iter()
            .filter(|instr| matches!(instr, Instr::Var(_)))
            .count();
        assert_eq!(vars, 3);

        let machine = run(&program);
        assert_eq!(machine.var("a"), Some(3));
        assert_eq!(machine.var("b"), Some(0));
    }

    #[test]
    fn test_header_is_kept() {
        let b = ProgramBuilder::new();
        let program = b.finish(StmtList::empty()).unwrap();
        let target = compile_with_header(&program, vec!["empty unit".into()]).unwrap();
        assert!(target.is_empty());
        assert_eq!(target.to_string(), "// empty unit\n\n");
    }
}
