//! Модуль `types`
//!
//! Система типов Meow и правила продвижения для операторов.
//!
//! Тип `Error` поглощающий: любая операция с таким операндом даёт `Error`
//! и не порождает повторной диагностики.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Типы языка Meow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeowType {
    Integer,
    Float,
    Boolean,
    String,
    /// Массив (тип элемента и длина хранятся в таблице символов)
    Array,
    Void,
    /// Результат ошибочного выражения
    Error,
}

impl MeowType {
    /// Числовой ли тип (int или float).
    pub fn is_numeric(self) -> bool {
        matches!(self, MeowType::Integer | MeowType::Float)
    }

    pub fn is_error(self) -> bool {
        self == MeowType::Error
    }

    /// Можно ли присвоить значение типа `value` переменной типа `self`.
    ///
    /// Разрешены совпадающие типы и расширение int -> float.
    pub fn accepts(self, value: MeowType) -> bool {
        self == value || (self == MeowType::Float && value == MeowType::Integer)
    }
}

impl fmt::Display for MeowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeowType::Integer => "int",
            MeowType::Float => "float",
            MeowType::Boolean => "bool",
            MeowType::String => "string",
            MeowType::Array => "array",
            MeowType::Void => "void",
            MeowType::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Тип результата арифметической операции.
///
/// Тотальная функция: никогда не сообщает об ошибке сама, решение о
/// диагностике принимает вызывающий код по возвращённому `Error`.
pub fn arithmetic_result_type(t1: MeowType, t2: MeowType) -> MeowType {
    if t1.is_error() || t2.is_error() {
        return MeowType::Error;
    }
    if !t1.is_numeric() || !t2.is_numeric() {
        return MeowType::Error;
    }
    if t1 == MeowType::Float || t2 == MeowType::Float {
        MeowType::Float
    } else {
        MeowType::Integer
    }
}

/// Тип результата сравнения.
///
/// `<` и `>` требуют числовых операндов, `==` допускает также пару bool.
pub fn comparison_result_type(t1: MeowType, t2: MeowType, allow_bool: bool) -> MeowType {
    if t1.is_error() || t2.is_error() {
        return MeowType::Error;
    }
    let numeric = t1.is_numeric() && t2.is_numeric();
    let booleans = allow_bool && t1 == MeowType::Boolean && t2 == MeowType::Boolean;
    if numeric || booleans {
        MeowType::Boolean
    } else {
        MeowType::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MeowType; 7] = [
        MeowType::Integer,
        MeowType::Float,
        MeowType::Boolean,
        MeowType::String,
        MeowType::Array,
        MeowType::Void,
        MeowType::Error,
    ];

    #[test]
    fn test_arithmetic_promotion() {
        use MeowType::*;
        assert_eq!(arithmetic_result_type(Integer, Integer), Integer);
        assert_eq!(arithmetic_result_type(Integer, Float), Float);
        assert_eq!(arithmetic_result_type(Float, Integer), Float);
        assert_eq!(arithmetic_result_type(Float, Float), Float);
    }

    #[test]
    fn test_error_is_absorbing() {
        for t in ALL {
            assert_eq!(arithmetic_result_type(t, MeowType::Error), MeowType::Error);
            assert_eq!(arithmetic_result_type(MeowType::Error, t), MeowType::Error);
            assert_eq!(
                comparison_result_type(t, MeowType::Error, true),
                MeowType::Error
            );
        }
    }

    #[test]
    fn test_non_numeric_operands() {
        use MeowType::*;
        assert_eq!(arithmetic_result_type(Boolean, Integer), Error);
        assert_eq!(arithmetic_result_type(Integer, String), Error);
        assert_eq!(arithmetic_result_type(Array, Array), Error);
    }

    #[test]
    fn test_comparisons() {
        use MeowType::*;
        assert_eq!(comparison_result_type(Integer, Float, false), Boolean);
        assert_eq!(comparison_result_type(Boolean, Boolean, false), Error);
        assert_eq!(comparison_result_type(Boolean, Boolean, true), Boolean);
        assert_eq!(comparison_result_type(Boolean, Integer, true), Error);
    }

    #[test]
    fn test_accepts() {
        assert!(MeowType::Float.accepts(MeowType::Integer));
        assert!(!MeowType::Integer.accepts(MeowType::Float));
        assert!(MeowType::Boolean.accepts(MeowType::Boolean));
    }
}
