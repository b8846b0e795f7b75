//! Таблица символов.
//!
//! Одна плоская область видимости на единицу компиляции, как и модель
//! переменных целевой машины. Таблица — обычная структура, которую конвейер
//! передаёт по ссылке; между компиляциями её сбрасывают через [`SymbolTable::clear`].

use std::collections::HashMap;

use crate::error::{MeowError, MeowResult};
use crate::types::MeowType;

/// Запись таблицы символов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    /// Имя идентификатора
    pub name: String,
    /// Объявленный тип (`Array` для массивов)
    pub ty: MeowType,
    /// Для массивов: тип элемента и длина (если известна)
    pub array: Option<ArrayInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayInfo {
    pub element: MeowType,
    pub length: Option<usize>,
}

impl SymbolEntry {
    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }
}

/// Таблица символов одной компиляции.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Найти запись. Сама по себе об ошибках не сообщает.
    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.index.get(name).and_then(|&i| self.entries.get(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Вставить скалярный символ. Повторное имя — `DuplicateName`, таблица не меняется.
    pub fn insert(&mut self, name: &str, ty: MeowType) -> MeowResult<&SymbolEntry> {
        self.insert_entry(SymbolEntry {
            name: name.to_string(),
            ty,
            array: None,
        })
    }

    /// Вставить одномерный массив. Длина `<= 0` хранится как «неизвестна».
    pub fn insert_array(
        &mut self,
        name: &str,
        element: MeowType,
        length: i64,
    ) -> MeowResult<&SymbolEntry> {
        let length = usize::try_from(length).ok().filter(|len| *len > 0);
        self.insert_entry(SymbolEntry {
            name: name.to_string(),
            ty: MeowType::Array,
            array: Some(ArrayInfo { element, length }),
        })
    }

    fn insert_entry(&mut self, entry: SymbolEntry) -> MeowResult<&SymbolEntry> {
        if self.contains(&entry.name) {
            return Err(MeowError::DuplicateName { name: entry.name });
        }
        log::debug!("symbol '{}' ({}) inserted", entry.name, entry.ty);

        let slot = self.entries.len();
        self.index.insert(entry.name.clone(), slot);
        self.entries.push(entry);
        Ok(&self.entries[slot])
    }

    /// Тип идентификатора или `UndeclaredVariable`.
    pub fn type_of(&self, name: &str) -> MeowResult<MeowType> {
        self.lookup(name)
            .map(|entry| entry.ty)
            .ok_or_else(|| MeowError::UndeclaredVariable {
                name: name.to_string(),
            })
    }

    /// Тип элемента массива или `NotAnArray`.
    pub fn element_type_of(&self, name: &str) -> MeowResult<MeowType> {
        self.lookup(name)
            .and_then(|entry| entry.array)
            .map(|info| info.element)
            .ok_or_else(|| MeowError::NotAnArray {
                name: name.to_string(),
            })
    }

    /// Длина массива, если она известна.
    pub fn array_length_of(&self, name: &str) -> Option<usize> {
        self.lookup(name)
            .and_then(|entry| entry.array)
            .and_then(|info| info.length)
    }

    /// Записи в порядке объявления.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Сбросить таблицу перед следующей компиляцией.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
