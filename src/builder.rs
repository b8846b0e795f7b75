//! Модуль `builder`
//!
//! Граница между фронтендом и ядром компилятора. Парсер (внешний) строит
//! программу вызовами [`ProgramBuilder`]: каждый конструктор разрешает имена
//! через таблицу символов, вычисляет тип узла и сообщает о семантических
//! ошибках ровно один раз. Построение дерева продолжается и после ошибки
//! (узел получает тип `Error`), но [`ProgramBuilder::finish`] отдаёт
//! [`ValidatedProgram`] только для единицы компиляции без ошибок.

use crate::ast::{Ast, BinOp, ExprId, StmtId, StmtList};
use crate::error::{Diagnostics, MeowError};
use crate::symtab::SymbolTable;
use crate::types::{arithmetic_result_type, comparison_result_type, MeowType};

/// Число дискретных линий ввода целевой машины.
pub const KEY_LINES: i64 = 8;

/// Построитель программы для одной единицы компиляции.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    ast: Ast,
    symbols: SymbolTable,
    diagnostics: Diagnostics,
}

/// Программа, прошедшая семантическую проверку.
///
/// Создаётся только через [`ProgramBuilder::finish`]; генератор кода
/// принимает исключительно этот тип.
#[derive(Debug)]
pub struct ValidatedProgram {
    ast: Ast,
    root: StmtList,
    symbols: SymbolTable,
}

impl ValidatedProgram {
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn root(&self) -> &StmtList {
        &self.root
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Собрать программу в обход проверок, чтобы испытать проверку генератора.
    #[cfg(test)]
    pub(crate) fn assemble_unchecked(ast: Ast, root: StmtList, symbols: SymbolTable) -> Self {
        Self { ast, root, symbols }
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn expr_type(&self, id: &ExprId) -> MeowType {
        self.ast.expr(id).map(|e| e.ty).unwrap_or(MeowType::Error)
    }

    fn mismatch(&mut self, context: String, left: MeowType, right: MeowType) {
        self.diagnostics.report(MeowError::TypeMismatch {
            context,
            left,
            right,
        });
    }

    // === Выражения ===

    /// Ссылка на переменную. Необъявленное имя даёт узел типа `Error`.
    pub fn var(&mut self, name: &str) -> ExprId {
        let ty = match self.symbols.type_of(name) {
            Ok(ty) => ty,
            Err(err) => {
                self.diagnostics.report(err);
                MeowType::Error
            }
        };
        self.ast.make_var(name, ty)
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.ast.make_int(value)
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.ast.make_bool(value)
    }

    /// Бинарная операция с проверкой типов операндов.
    pub fn binary(&mut self, op: BinOp, left: ExprId, right: ExprId) -> ExprId {
        let lt = self.expr_type(&left);
        let rt = self.expr_type(&right);
        let ty = if op.is_comparison() {
            comparison_result_type(lt, rt, op == BinOp::Eq)
        } else {
            arithmetic_result_type(lt, rt)
        };
        // Ошибка в операнде уже была сообщена
        if ty.is_error() && !lt.is_error() && !rt.is_error() {
            self.mismatch(format!("'{}'", op), lt, rt);
        }
        self.ast.make_binop(op, left, right, ty)
    }

    // === Операторы ===

    /// Объявление переменной.
    ///
    /// Инициализатор построен до вызова, то есть проверен по состоянию таблицы
    /// без нового имени: ссылка переменной на саму себя в инициализаторе
    /// даёт `UndeclaredVariable`. Типы `void` и `ERROR` объявить нельзя;
    /// имя всё равно попадает в таблицу, чтобы не плодить ошибки при использовании.
    pub fn declare(&mut self, ty: MeowType, name: &str, init: Option<ExprId>) -> StmtId {
        if ty.is_error() || ty == MeowType::Void {
            self.diagnostics.report(MeowError::InvalidDeclarationType {
                name: name.to_string(),
                ty,
            });
        }
        if let Some(init) = &init {
            let it = self.expr_type(init);
            if !it.is_error() && !ty.accepts(it) {
                self.mismatch(format!("initializer of '{}'", name), ty, it);
            }
        }
        if let Err(err) = self.symbols.insert(name, ty) {
            self.diagnostics.report(err);
        }
        self.ast.make_decl(ty, name, init)
    }

    /// Объявление одномерного массива.
    pub fn declare_array(&mut self, name: &str, element: MeowType, length: i64) -> StmtId {
        if let Err(err) = self.symbols.insert_array(name, element, length) {
            self.diagnostics.report(err);
        }
        self.ast.make_array_decl(name, element, length)
    }

    /// Присваивание `name = expr`.
    pub fn assign(&mut self, name: &str, expr: ExprId) -> StmtId {
        let et = self.expr_type(&expr);
        match self.symbols.lookup(name).map(|entry| entry.ty) {
            None => self.diagnostics.report(MeowError::UndeclaredVariable {
                name: name.to_string(),
            }),
            Some(target) if !et.is_error() && (target == MeowType::Array || !target.accepts(et)) => {
                self.mismatch(format!("assignment to '{}'", name), target, et)
            }
            Some(_) => {}
        }
        self.ast.make_assign(name, expr)
    }

    pub fn while_loop(&mut self, cond: ExprId, body: StmtList) -> StmtId {
        self.check_condition(&cond, "while condition");
        self.ast.make_while(cond, body)
    }

    /// `if` без `else`.
    pub fn if_then(&mut self, cond: ExprId, then_branch: StmtList) -> StmtId {
        self.check_condition(&cond, "if condition");
        self.ast.make_if(cond, then_branch)
    }

    pub fn pixel(&mut self, x: ExprId, y: ExprId, color: ExprId) -> StmtId {
        self.check_integer(&x, "pixel x");
        self.check_integer(&y, "pixel y");
        self.check_integer(&color, "pixel color");
        self.ast.make_pixel(x, y, color)
    }

    /// Опрос линии ввода `code` (0..=7) в переменную `dest`.
    pub fn key(&mut self, code: i64, dest: &str) -> StmtId {
        if !(0..KEY_LINES).contains(&code) {
            self.diagnostics.report(MeowError::InvalidKeyCode { code });
        }
        self.check_destination(dest, "key destination");
        self.ast.make_key(code, dest)
    }

    pub fn input(&mut self, dest: &str) -> StmtId {
        self.check_destination(dest, "input destination");
        self.ast.make_input(dest)
    }

    pub fn print(&mut self, expr: ExprId) -> StmtId {
        self.ast.make_print(expr)
    }

    pub fn block(&mut self, body: StmtList) -> StmtId {
        self.ast.make_block(body)
    }

    /// Добавить оператор в конец списка.
    pub fn append(&mut self, list: StmtList, stmt: Option<StmtId>) -> StmtList {
        self.ast.append_stmt(list, stmt)
    }

    /// Собрать список из последовательности операторов.
    pub fn list<I>(&mut self, stmts: I) -> StmtList
    where
        I: IntoIterator<Item = StmtId>,
    {
        stmts
            .into_iter()
            .fold(StmtList::empty(), |list, stmt| self.ast.append_stmt(list, Some(stmt)))
    }

    /// Завершить построение.
    ///
    /// Любая семантическая ошибка подавляет генерацию: возвращаются
    /// накопленные диагностики, а дерево и таблица уничтожаются.
    pub fn finish(self, root: StmtList) -> Result<ValidatedProgram, Diagnostics> {
        if !self.diagnostics.is_empty() {
            log::info!(
                "validation failed with {} error(s); code generation suppressed",
                self.diagnostics.len()
            );
            return Err(self.diagnostics);
        }
        log::info!(
            "validated unit: {} statements, {} expressions, {} symbols",
            self.ast.stmt_count(),
            self.ast.expr_count(),
            self.symbols.len()
        );
        Ok(ValidatedProgram {
            ast: self.ast,
            root,
            symbols: self.symbols,
        })
    }

    // === Вспомогательные проверки ===

    fn check_condition(&mut self, cond: &ExprId, context: &str) {
        let ty = self.expr_type(cond);
        if !ty.is_error() && ty != MeowType::Boolean {
            self.mismatch(context.to_string(), MeowType::Boolean, ty);
        }
    }

    fn check_integer(&mut self, expr: &ExprId, context: &str) {
        let ty = self.expr_type(expr);
        if !ty.is_error() && ty != MeowType::Integer {
            self.mismatch(context.to_string(), MeowType::Integer, ty);
        }
    }

    fn check_destination(&mut self, dest: &str, context: &str) {
        match self.symbols.lookup(dest).map(|entry| entry.ty) {
            None => self.diagnostics.report(MeowError::UndeclaredVariable {
                name: dest.to_string(),
            }),
            Some(ty) if ty == MeowType::Array || !ty.accepts(MeowType::Integer) => {
                self.mismatch(format!("{} '{}'", context, dest), ty, MeowType::Integer)
            }
            Some(_) => {}
        }
    }
}
