//! # Meow Core
//!
//! Ядро компилятора языка Meow для пиксельной машины FIS-25.
//!
//! ## Основные модули
//!
//! - [`types`] - Система типов и правила вывода результата операций
//! - [`symtab`] - Плоская таблица символов
//! - [`ast`] - Арена синтаксического дерева
//! - [`builder`] - Построение и семантическая проверка программы
//! - [`compiler`] - Генерация трёхадресного кода FIS-25
//! - [`target`] - Инструкции FIS-25 и их текстовый формат
//! - [`machine`] - Эталонная машина для проверки сгенерированного кода
//! - [`marquee`] - Программа «бегущая строка»
//!
//! ## Пример использования
//!
//! ```rust,ignore
//! use meow_lang::{compile, BinOp, Machine, MeowType, ProgramBuilder};
//!
//! // int x = 2 + 3;
//! let mut b = ProgramBuilder::new();
//! let two = b.int(2);
//! let three = b.int(3);
//! let sum = b.binary(BinOp::Add, two, three);
//! let decl = b.declare(MeowType::Integer, "x", Some(sum));
//! let root = b.list([decl]);
//!
//! let program = compile(&b.finish(root).unwrap()).unwrap();
//! let mut machine = Machine::new(program.instructions()).unwrap();
//! machine.run(1_000).unwrap();
//! assert_eq!(machine.var("x"), Some(5));
//! ```

// === Основные модули ===
pub mod ast;
pub mod builder;
pub mod error;
pub mod symtab;
pub mod types;

// === Генерация кода ===
pub mod compiler;
pub mod machine;
pub mod target;

// === Бегущая строка ===
pub mod config;
pub mod marquee;

// === Re-exports для удобства ===
pub use ast::{Ast, BinOp, ExprId, StmtId, StmtList};
pub use builder::{ProgramBuilder, ValidatedProgram};
pub use compiler::{compile, compile_with_header};
pub use config::MarqueeConfig;
pub use error::{Diagnostics, MeowError, MeowResult};
pub use machine::{Halt, Machine};
pub use symtab::SymbolTable;
pub use target::{Instr, Operand, TargetProgram};
pub use types::MeowType;
