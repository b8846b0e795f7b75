//! Абстрактное синтаксическое дерево (AST) языка Meow.
//!
//! Все узлы живут в арене [`Ast`] и ссылаются на детей по индексу.
//! Идентификаторы [`ExprId`] и [`StmtId`] не реализуют `Clone`/`Copy`:
//! конструктор забирает идентификатор ребёнка по значению, поэтому каждый
//! узел принадлежит ровно одному родителю и поддерево нельзя разделить.
//! Каждый идентификатор помечен номером арены, поэтому узел чужой арены
//! не может подменить собой узел этой.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{MeowError, MeowResult};
use crate::types::MeowType;

/// Счётчик арен: у каждой [`Ast`] свой номер.
static NEXT_ARENA: AtomicU32 = AtomicU32::new(0);

/// Идентификатор выражения в арене.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ExprId {
    arena: u32,
    index: usize,
}

/// Идентификатор оператора в арене.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct StmtId {
    arena: u32,
    index: usize,
}

impl ExprId {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl StmtId {
    pub fn index(&self) -> usize {
        self.index
    }
}

// === Выражения ===

/// Бинарные операторы.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Lt,
    Gt,
    Eq,
}

impl BinOp {
    /// Оператор сравнения (результат bool).
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Gt | BinOp::Eq)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Eq => "==",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    /// Ссылка на переменную
    Var(String),
    /// Целочисленный литерал
    Int(i64),
    /// Булев литерал
    Bool(bool),
    /// Бинарная операция
    Binary {
        op: BinOp,
        left: ExprId,
        right: ExprId,
    },
}

/// Узел выражения вместе с его типом.
#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: MeowType,
}

// === Операторы ===

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    /// Объявление с необязательной инициализацией
    Decl {
        ty: MeowType,
        name: String,
        init: Option<ExprId>,
    },
    /// Объявление одномерного массива
    ArrayDecl {
        name: String,
        element: MeowType,
        length: Option<usize>,
    },
    /// Присваивание `name = expr`
    Assign { name: String, expr: ExprId },
    While { cond: ExprId, body: StmtList },
    /// `if` без `else`
    If { cond: ExprId, then_branch: StmtList },
    /// `miau_pixel(x, y, color)`
    Pixel {
        x: ExprId,
        y: ExprId,
        color: ExprId,
    },
    /// `miau_key(code, dest)`
    Key { code: i64, dest: String },
    /// `miau_input(dest)`
    Input { dest: String },
    /// `miau_print(expr)`
    Print { expr: ExprId },
    /// Блок `{ ... }`
    Block { body: StmtList },
}

/// Узел оператора. Операторы образуют односвязный список через `next`.
#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    next: Option<StmtId>,
}

impl Stmt {
    /// Следующий оператор в списке.
    pub fn next(&self) -> Option<&StmtId> {
        self.next.as_ref()
    }
}

/// Упорядоченный список операторов (голова односвязного списка).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StmtList {
    head: Option<StmtId>,
}

impl StmtList {
    /// Пустой список.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<&StmtId> {
        self.head.as_ref()
    }
}

// === Арена ===

/// Арена узлов одной единицы компиляции.
///
/// Уничтожение арены освобождает все узлы разом.
#[derive(Debug)]
pub struct Ast {
    id: u32,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl Default for Ast {
    fn default() -> Self {
        Self {
            id: NEXT_ARENA.fetch_add(1, Ordering::Relaxed),
            exprs: Vec::new(),
            stmts: Vec::new(),
        }
    }
}

impl Ast {
    /// Создать пустую арену.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_expr(&mut self, kind: ExprKind, ty: MeowType) -> ExprId {
        self.exprs.push(Expr { kind, ty });
        ExprId {
            arena: self.id,
            index: self.exprs.len() - 1,
        }
    }

    fn push_stmt(&mut self, kind: StmtKind) -> StmtId {
        self.stmts.push(Stmt { kind, next: None });
        StmtId {
            arena: self.id,
            index: self.stmts.len() - 1,
        }
    }

    // --- Выражения ---

    pub fn make_var(&mut self, name: &str, ty: MeowType) -> ExprId {
        self.push_expr(ExprKind::Var(name.to_string()), ty)
    }

    pub fn make_int(&mut self, value: i64) -> ExprId {
        self.push_expr(ExprKind::Int(value), MeowType::Integer)
    }

    pub fn make_bool(&mut self, value: bool) -> ExprId {
        self.push_expr(ExprKind::Bool(value), MeowType::Boolean)
    }

    pub fn make_binop(&mut self, op: BinOp, left: ExprId, right: ExprId, ty: MeowType) -> ExprId {
        self.push_expr(ExprKind::Binary { op, left, right }, ty)
    }

    // --- Операторы ---

    pub fn make_decl(&mut self, ty: MeowType, name: &str, init: Option<ExprId>) -> StmtId {
        self.push_stmt(StmtKind::Decl {
            ty,
            name: name.to_string(),
            init,
        })
    }

    /// Объявление массива. Длина `<= 0` означает «неизвестна».
    pub fn make_array_decl(&mut self, name: &str, element: MeowType, length: i64) -> StmtId {
        let length = usize::try_from(length).ok().filter(|len| *len > 0);
        self.push_stmt(StmtKind::ArrayDecl {
            name: name.to_string(),
            element,
            length,
        })
    }

    pub fn make_assign(&mut self, name: &str, expr: ExprId) -> StmtId {
        self.push_stmt(StmtKind::Assign {
            name: name.to_string(),
            expr,
        })
    }

    pub fn make_while(&mut self, cond: ExprId, body: StmtList) -> StmtId {
        self.push_stmt(StmtKind::While { cond, body })
    }

    pub fn make_if(&mut self, cond: ExprId, then_branch: StmtList) -> StmtId {
        self.push_stmt(StmtKind::If { cond, then_branch })
    }

    pub fn make_pixel(&mut self, x: ExprId, y: ExprId, color: ExprId) -> StmtId {
        self.push_stmt(StmtKind::Pixel { x, y, color })
    }

    pub fn make_key(&mut self, code: i64, dest: &str) -> StmtId {
        self.push_stmt(StmtKind::Key {
            code,
            dest: dest.to_string(),
        })
    }

    pub fn make_input(&mut self, dest: &str) -> StmtId {
        self.push_stmt(StmtKind::Input {
            dest: dest.to_string(),
        })
    }

    pub fn make_print(&mut self, expr: ExprId) -> StmtId {
        self.push_stmt(StmtKind::Print { expr })
    }

    pub fn make_block(&mut self, body: StmtList) -> StmtId {
        self.push_stmt(StmtKind::Block { body })
    }

    /// Добавить оператор в конец списка.
    ///
    /// Пустое добавление возвращает исходный список без изменений, добавление
    /// к пустому списку даёт список из одного элемента. Линейно по длине списка.
    pub fn append_stmt(&mut self, list: StmtList, stmt: Option<StmtId>) -> StmtList {
        let Some(stmt) = stmt else {
            return list;
        };
        let Some(head) = list.head else {
            return StmtList { head: Some(stmt) };
        };

        // Чужой список не трогаем: его голову отвергнет проверка перед генерацией
        if head.arena != self.id {
            return StmtList { head: Some(head) };
        }

        let mut tail = head.index;
        while let Some(next) = self
            .stmts
            .get(tail)
            .and_then(|s| s.next.as_ref())
            .filter(|next| next.arena == self.id)
        {
            tail = next.index;
        }
        if let Some(last) = self.stmts.get_mut(tail) {
            if last.next.is_none() {
                last.next = Some(stmt);
            }
        }
        StmtList { head: Some(head) }
    }

    // --- Доступ ---

    /// Получить выражение по идентификатору.
    ///
    /// Идентификатор другой арены — `MalformedTree`, даже если индекс в диапазоне.
    pub fn expr(&self, id: &ExprId) -> MeowResult<&Expr> {
        if id.arena != self.id {
            return Err(MeowError::MalformedTree(format!(
                "expression #{} belongs to another tree",
                id.index
            )));
        }
        self.exprs
            .get(id.index)
            .ok_or_else(|| MeowError::MalformedTree(format!("expression #{} not found", id.index)))
    }

    /// Получить оператор по идентификатору.
    pub fn stmt(&self, id: &StmtId) -> MeowResult<&Stmt> {
        if id.arena != self.id {
            return Err(MeowError::MalformedTree(format!(
                "statement #{} belongs to another tree",
                id.index
            )));
        }
        self.stmts
            .get(id.index)
            .ok_or_else(|| MeowError::MalformedTree(format!("statement #{} not found", id.index)))
    }

    /// Обход операторов списка по порядку.
    pub fn iter<'a>(&'a self, list: &'a StmtList) -> StmtIter<'a> {
        StmtIter {
            ast: self,
            current: list.head.as_ref(),
        }
    }

    /// Количество операторов в списке (без вложенных).
    pub fn list_len(&self, list: &StmtList) -> usize {
        self.iter(list).count()
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

/// Итератор по списку операторов.
pub struct StmtIter<'a> {
    ast: &'a Ast,
    current: Option<&'a StmtId>,
}

impl<'a> Iterator for StmtIter<'a> {
    type Item = &'a Stmt;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let stmt = self.ast.stmt(id).ok()?;
        self.current = stmt.next.as_ref();
        Some(stmt)
    }
}
