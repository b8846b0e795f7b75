//! Модуль `target`
//!
//! Трёхадресный язык машины FIS-25: одна инструкция на строку, операнды
//! разделены пробелами, метки явные.
//!
//! ```text
//! VAR x
//! ASSIGN 20 x
//! LABEL L0
//!     ADD x 1 x
//!     LT x 64 COND
//!     IF COND GOTO L0
//! ```

use std::fmt;
use std::str::FromStr;

use crate::ast::BinOp;
use crate::error::{MeowError, MeowResult};

/// Операнд: целая константа или имя переменной.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Const(i64),
    Var(String),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(v) => write!(f, "{}", v),
            Operand::Var(name) => f.write_str(name),
        }
    }
}

/// Допустимое имя переменной или метки.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl FromStr for Operand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(v) = s.parse::<i64>() {
            Ok(Operand::Const(v))
        } else if is_identifier(s) {
            Ok(Operand::Var(s.to_string()))
        } else {
            Err(())
        }
    }
}

/// Арифметические инструкции и сравнения (`dst = a op b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Lt,
    Gt,
    Eq,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Eq => "EQ",
        }
    }

    /// Вычислить инструкцию. Сравнения дают 1 или 0.
    pub fn apply(self, a: i64, b: i64) -> i64 {
        match self {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            Opcode::Lt => i64::from(a < b),
            Opcode::Gt => i64::from(a > b),
            Opcode::Eq => i64::from(a == b),
        }
    }

    fn from_mnemonic(text: &str) -> Option<Self> {
        match text {
            "ADD" => Some(Opcode::Add),
            "SUB" => Some(Opcode::Sub),
            "MUL" => Some(Opcode::Mul),
            "LT" => Some(Opcode::Lt),
            "GT" => Some(Opcode::Gt),
            "EQ" => Some(Opcode::Eq),
            _ => None,
        }
    }
}

impl From<BinOp> for Opcode {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Add => Opcode::Add,
            BinOp::Sub => Opcode::Sub,
            BinOp::Mul => Opcode::Mul,
            BinOp::Lt => Opcode::Lt,
            BinOp::Gt => Opcode::Gt,
            BinOp::Eq => Opcode::Eq,
        }
    }
}

/// Инструкция целевой машины.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// `VAR name`
    Var(String),
    /// `ASSIGN src dst`
    Assign { src: Operand, dst: String },
    /// `ADD/SUB/MUL/LT/GT/EQ a b dst`
    Binary {
        op: Opcode,
        a: Operand,
        b: Operand,
        dst: String,
    },
    /// `IF cond GOTO label`
    IfGoto { cond: Operand, label: String },
    /// `GOTO label`
    Goto(String),
    /// `LABEL name`
    Label(String),
    /// `PIXEL x y color`
    Pixel {
        x: Operand,
        y: Operand,
        color: Operand,
    },
    /// `KEY code dst`
    Key { code: i64, dst: String },
    /// `INPUT dst`
    Input(String),
    /// `PRINT value`
    Print(Operand),
}

impl Instr {
    /// Метка, на которую может перейти инструкция.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instr::IfGoto { label, .. } | Instr::Goto(label) => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Var(name) => write!(f, "VAR {}", name),
            Instr::Assign { src, dst } => write!(f, "ASSIGN {} {}", src, dst),
            Instr::Binary { op, a, b, dst } => write!(f, "{} {} {} {}", op.mnemonic(), a, b, dst),
            Instr::IfGoto { cond, label } => write!(f, "IF {} GOTO {}", cond, label),
            Instr::Goto(label) => write!(f, "GOTO {}", label),
            Instr::Label(name) => write!(f, "LABEL {}", name),
            Instr::Pixel { x, y, color } => write!(f, "PIXEL {} {} {}", x, y, color),
            Instr::Key { code, dst } => write!(f, "KEY {} {}", code, dst),
            Instr::Input(dst) => write!(f, "INPUT {}", dst),
            Instr::Print(value) => write!(f, "PRINT {}", value),
        }
    }
}

impl FromStr for Instr {
    type Err = MeowError;

    /// Разобрать одну строку без комментария. Номер строки проставляет
    /// [`parse_listing`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MeowError::InvalidInstruction {
            line: 0,
            text: s.trim().to_string(),
        };
        let words: Vec<&str> = s.split_whitespace().collect();
        let operand = |w: &str| w.parse::<Operand>().map_err(|_| invalid());
        let name = |w: &str| {
            if is_identifier(w) {
                Ok(w.to_string())
            } else {
                Err(invalid())
            }
        };

        match words.as_slice() {
            ["VAR", n] => Ok(Instr::Var(name(*n)?)),
            ["ASSIGN", src, dst] => Ok(Instr::Assign {
                src: operand(*src)?,
                dst: name(*dst)?,
            }),
            ["IF", cond, "GOTO", label] => Ok(Instr::IfGoto {
                cond: operand(*cond)?,
                label: name(*label)?,
            }),
            ["GOTO", label] => Ok(Instr::Goto(name(*label)?)),
            ["LABEL", label] => Ok(Instr::Label(name(*label)?)),
            ["PIXEL", x, y, color] => Ok(Instr::Pixel {
                x: operand(*x)?,
                y: operand(*y)?,
                color: operand(*color)?,
            }),
            ["KEY", code, dst] => Ok(Instr::Key {
                code: code.parse::<i64>().map_err(|_| invalid())?,
                dst: name(*dst)?,
            }),
            ["INPUT", dst] => Ok(Instr::Input(name(*dst)?)),
            ["PRINT", value] => Ok(Instr::Print(operand(*value)?)),
            [op, a, b, dst] => {
                let op = Opcode::from_mnemonic(*op).ok_or_else(|| invalid())?;
                Ok(Instr::Binary {
                    op,
                    a: operand(*a)?,
                    b: operand(*b)?,
                    dst: name(*dst)?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Разобрать текстовый листинг: комментарии `//` и пустые строки пропускаются.
pub fn parse_listing(text: &str) -> MeowResult<Vec<Instr>> {
    let mut instrs = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let code = raw.split("//").next().unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }
        let instr = code.parse::<Instr>().map_err(|err| match err {
            MeowError::InvalidInstruction { text, .. } => {
                MeowError::InvalidInstruction { line: i + 1, text }
            }
            other => other,
        })?;
        instrs.push(instr);
    }
    Ok(instrs)
}

/// Сгенерированная программа: строки заголовка и поток инструкций.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetProgram {
    pub header: Vec<String>,
    pub instrs: Vec<Instr>,
}

impl TargetProgram {
    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    /// Все определённые метки в порядке появления.
    pub fn labels(&self) -> Vec<&str> {
        self.instrs
            .iter()
            .filter_map(|instr| match instr {
                Instr::Label(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

impl fmt::Display for TargetProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "// {}", line)?;
        }
        if !self.header.is_empty() {
            writeln!(f)?;
        }
        for instr in &self.instrs {
            match instr {
                Instr::Label(_) | Instr::Var(_) => writeln!(f, "{}", instr)?,
                _ => writeln!(f, "    {}", instr)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shapes() {
        let add = Instr::Binary {
            op: Opcode::Add,
            a: Operand::var("x"),
            b: Operand::Const(1),
            dst: "x".into(),
        };
        assert_eq!(add.to_string(), "ADD x 1 x");

        let jump = Instr::IfGoto {
            cond: Operand::var("COND"),
            label: "L3".into(),
        };
        assert_eq!(jump.to_string(), "IF COND GOTO L3");
        assert_eq!(jump.jump_target(), Some("L3"));

        let px = Instr::Pixel {
            x: Operand::Const(10),
            y: Operand::Const(20),
            color: Operand::Const(1),
        };
        assert_eq!(px.to_string(), "PIXEL 10 20 1");
    }

    #[test]
    fn test_parse_listing_skips_comments() {
        let text = "// header\n\nVAR x            // offset\nASSIGN -4 x\n    KEY 6 x\nLABEL L0\n    GT x 63 x\n";
        let instrs = parse_listing(text).unwrap();
        assert_eq!(
            instrs,
            vec![
                Instr::Var("x".into()),
                Instr::Assign {
                    src: Operand::Const(-4),
                    dst: "x".into()
                },
                Instr::Key {
                    code: 6,
                    dst: "x".into()
                },
                Instr::Label("L0".into()),
                Instr::Binary {
                    op: Opcode::Gt,
                    a: Operand::var("x"),
                    b: Operand::Const(63),
                    dst: "x".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_listing_reports_line() {
        let err = parse_listing("VAR x\nJUMP somewhere\n").unwrap_err();
        assert_eq!(
            err,
            MeowError::InvalidInstruction {
                line: 2,
                text: "JUMP somewhere".into()
            }
        );
        assert!(parse_listing("ASSIGN 1 2").is_err());
        assert!(parse_listing("FOO a b c").is_err());
    }

    #[test]
    fn test_opcode_semantics() {
        assert_eq!(Opcode::Sub.apply(5, 1), 4);
        assert_eq!(Opcode::Lt.apply(1, 2), 1);
        assert_eq!(Opcode::Gt.apply(1, 2), 0);
        assert_eq!(Opcode::Eq.apply(3, 3), 1);
    }

    #[test]
    fn test_program_text_layout() {
        let program = TargetProgram {
            header: vec!["demo".into()],
            instrs: vec![
                Instr::Var("x".into()),
                Instr::Label("L0".into()),
                Instr::Goto("L0".into()),
            ],
        };
        assert_eq!(program.to_string(), "// demo\n\nVAR x\nLABEL L0\n    GOTO L0\n");
        assert_eq!(program.labels(), vec!["L0"]);

        let reparsed = parse_listing(&program.to_string()).unwrap();
        assert_eq!(reparsed, program.instrs);
    }
}
