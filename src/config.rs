//! Настройки бегущей строки.
//!
//! Все поля необязательны: отсутствующие берутся из [`MarqueeConfig::default`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::builder::KEY_LINES;
use crate::error::{MeowError, MeowResult};
use crate::machine::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Параметры генерируемой программы-бегущей строки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    /// Расстояние между соседними символами в столбцах
    pub char_spacing: i64,
    /// Начальная позиция первого символа
    pub start_x: i64,
    /// Строка экрана, в которой рисуется текст
    pub row: i64,
    pub color: i64,
    /// Сдвиг за одно нажатие
    pub step: i64,
    /// Линия ввода «влево» (A)
    pub left_key: i64,
    /// Линия ввода «вправо» (D)
    pub right_key: i64,
    /// Правая граница для x
    pub max_x: i64,
    /// Максимальная длина сообщения после фильтрации
    pub max_message_len: usize,
}

impl Default for MarqueeConfig {
    fn default() -> Self {
        Self {
            char_spacing: 2,
            start_x: 20,
            row: 30,
            color: 1,
            step: 1,
            left_key: 6,
            right_key: 7,
            max_x: SCREEN_WIDTH as i64 - 1,
            max_message_len: 63,
        }
    }
}

impl MarqueeConfig {
    /// Разобрать JSON и проверить значения.
    pub fn from_json_str(text: &str) -> MeowResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| MeowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Загрузить настройки из JSON-файла.
    pub fn load(path: impl AsRef<Path>) -> MeowResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("loaded marquee config from {}", path.display());
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> MeowResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MeowError::Config(e.to_string()))
    }

    pub fn validate(&self) -> MeowResult<()> {
        for (what, code) in [("left_key", self.left_key), ("right_key", self.right_key)] {
            if !(0..KEY_LINES).contains(&code) {
                return Err(MeowError::Config(format!(
                    "{} = {} is not an input line (expected 0..=7)",
                    what, code
                )));
            }
        }
        if self.left_key == self.right_key {
            return Err(MeowError::Config("left_key and right_key must differ".into()));
        }
        let columns = 1..=SCREEN_WIDTH as i64;
        if !columns.contains(&self.char_spacing) {
            return Err(MeowError::Config(format!(
                "char_spacing = {} is outside 1..={}",
                self.char_spacing, SCREEN_WIDTH
            )));
        }
        if !columns.contains(&self.step) {
            return Err(MeowError::Config(format!(
                "step = {} is outside 1..={}",
                self.step, SCREEN_WIDTH
            )));
        }
        if !(0..SCREEN_HEIGHT as i64).contains(&self.row) {
            return Err(MeowError::Config(format!(
                "row {} is outside the screen",
                self.row
            )));
        }
        if self.max_message_len == 0 {
            return Err(MeowError::Config("max_message_len must be positive".into()));
        }
        Ok(())
    }
}
