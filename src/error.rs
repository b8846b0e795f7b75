//! Определения ошибок для компилятора Meow.

use std::fmt;

use thiserror::Error;

use crate::types::MeowType;

/// Основной тип `Result` для библиотеки.
pub type MeowResult<T> = Result<T, MeowError>;

/// Перечисление всех возможных ошибок.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeowError {
    // === Семантические ошибки (не фатальны для построения дерева) ===
    #[error("Duplicate declaration of '{name}'")]
    DuplicateName { name: String },

    #[error("Use of undeclared variable '{name}'")]
    UndeclaredVariable { name: String },

    #[error("'{name}' is not an array or does not exist")]
    NotAnArray { name: String },

    #[error("Type mismatch in {context}: incompatible types {left} and {right}")]
    TypeMismatch {
        context: String,
        left: MeowType,
        right: MeowType,
    },

    #[error("Key code {code} is out of range (expected 0..=7)")]
    InvalidKeyCode { code: i64 },

    #[error("Cannot declare '{name}' with type {ty}")]
    InvalidDeclarationType { name: String, ty: MeowType },

    // === Нарушение контракта между фронтендом и генератором ===
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    // === Эталонная машина и текстовый формат ===
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid instruction on line {line}: '{text}'")]
    InvalidInstruction { line: usize, text: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl MeowError {
    /// Является ли ошибка семантической (пользовательской), а не дефектом конвейера.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. }
                | Self::UndeclaredVariable { .. }
                | Self::NotAnArray { .. }
                | Self::TypeMismatch { .. }
                | Self::InvalidKeyCode { .. }
                | Self::InvalidDeclarationType { .. }
        )
    }
}

impl From<std::io::Error> for MeowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Набор семантических ошибок одной единицы компиляции, в порядке обнаружения.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<MeowError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать ошибку. Каждая ошибка сообщается ровно один раз.
    pub fn report(&mut self, err: MeowError) {
        log::warn!("semantic error: {}", err);
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[MeowError] {
        &self.errors
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeowError> {
        self.errors.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "error: {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_classification() {
        assert!(MeowError::DuplicateName { name: "x".into() }.is_semantic());
        assert!(MeowError::InvalidKeyCode { code: 9 }.is_semantic());
        assert!(MeowError::InvalidDeclarationType {
            name: "v".into(),
            ty: MeowType::Void
        }
        .is_semantic());
        assert!(!MeowError::MalformedTree("missing".into()).is_semantic());
        assert!(!MeowError::Runtime("boom".into()).is_semantic());
    }

    #[test]
    fn test_type_mismatch_message_names_types() {
        let err = MeowError::TypeMismatch {
            context: "'+'".into(),
            left: MeowType::Boolean,
            right: MeowType::Integer,
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch in '+': incompatible types bool and int"
        );
    }

    #[test]
    fn test_diagnostics_display() {
        let mut diags = Diagnostics::new();
        diags.report(MeowError::UndeclaredVariable { name: "y".into() });
        diags.report(MeowError::DuplicateName { name: "x".into() });
        assert_eq!(diags.len(), 2);
        assert_eq!(
            diags.to_string(),
            "error: Use of undeclared variable 'y'\nerror: Duplicate declaration of 'x'"
        );
    }
}
