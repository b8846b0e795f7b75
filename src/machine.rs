//! Эталонная машина FIS-25.
//!
//! Нужна для проверки сгенерированного кода: кадровый буфер 64×64, восемь
//! линий ввода, целочисленные переменные без типов. Выполнение можно
//! прерывать по бюджету шагов и продолжать с того же места, что позволяет
//! гонять бесконечные главные циклы и менять состояние клавиш между запусками.

use std::collections::{HashMap, VecDeque};

use crate::error::{MeowError, MeowResult};
use crate::target::{Instr, Operand};

/// Ширина экрана в пикселях.
pub const SCREEN_WIDTH: usize = 64;
/// Высота экрана в пикселях.
pub const SCREEN_HEIGHT: usize = 64;
/// Число линий ввода.
pub const KEY_COUNT: usize = 8;

/// Причина остановки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Управление дошло до конца программы
    Finished,
    /// Исчерпан бюджет шагов
    StepLimit,
}

/// Состояние машины.
#[derive(Debug, Clone)]
pub struct Machine {
    program: Vec<Instr>,
    labels: HashMap<String, usize>,
    pc: usize,
    vars: HashMap<String, i64>,
    framebuffer: Vec<i64>,
    keys: [bool; KEY_COUNT],
    input: VecDeque<i64>,
    output: Vec<i64>,
    steps: u64,
}

impl Machine {
    /// Загрузить программу. Повторное определение метки — ошибка.
    pub fn new(program: &[Instr]) -> MeowResult<Self> {
        let mut labels = HashMap::new();
        for (pc, instr) in program.iter().enumerate() {
            if let Instr::Label(name) = instr {
                if labels.insert(name.clone(), pc).is_some() {
                    return Err(MeowError::Runtime(format!("label '{}' defined twice", name)));
                }
            }
        }
        Ok(Self {
            program: program.to_vec(),
            labels,
            pc: 0,
            vars: HashMap::new(),
            framebuffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            keys: [false; KEY_COUNT],
            input: VecDeque::new(),
            output: Vec::new(),
            steps: 0,
        })
    }

    // === Внешний мир ===

    /// Нажать (`true`) или отпустить линию ввода. Номера вне 0..8 игнорируются.
    pub fn set_key(&mut self, code: usize, pressed: bool) {
        if let Some(key) = self.keys.get_mut(code) {
            *key = pressed;
        }
    }

    /// Поставить значение в очередь для `INPUT`.
    pub fn push_input(&mut self, value: i64) {
        self.input.push_back(value);
    }

    /// Значения, выведенные `PRINT`.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    pub fn var(&self, name: &str) -> Option<i64> {
        self.vars.get(name).copied()
    }

    /// Цвет пикселя; за пределами экрана — 0.
    pub fn pixel(&self, x: i64, y: i64) -> i64 {
        Self::offset(x, y)
            .and_then(|i| self.framebuffer.get(i).copied())
            .unwrap_or(0)
    }

    /// Координаты (x) включённых пикселей строки `y`.
    pub fn lit_in_row(&self, y: i64) -> Vec<i64> {
        (0..SCREEN_WIDTH as i64)
            .filter(|&x| self.pixel(x, y) != 0)
            .collect()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Текстовое изображение экрана: `#` — включён, `.` — выключен.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((SCREEN_WIDTH + 1) * SCREEN_HEIGHT);
        for y in 0..SCREEN_HEIGHT as i64 {
            for x in 0..SCREEN_WIDTH as i64 {
                out.push(if self.pixel(x, y) != 0 { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }

    fn offset(x: i64, y: i64) -> Option<usize> {
        let x = usize::try_from(x).ok().filter(|&x| x < SCREEN_WIDTH)?;
        let y = usize::try_from(y).ok().filter(|&y| y < SCREEN_HEIGHT)?;
        Some(y * SCREEN_WIDTH + x)
    }

    // === Выполнение ===

    /// Выполнить не более `max_steps` инструкций.
    pub fn run(&mut self, max_steps: u64) -> MeowResult<Halt> {
        for _ in 0..max_steps {
            if !self.step()? {
                return Ok(Halt::Finished);
            }
        }
        if self.is_finished() {
            Ok(Halt::Finished)
        } else {
            Ok(Halt::StepLimit)
        }
    }

    /// Выполнить одну инструкцию. Возвращает `false`, если программа завершена.
    pub fn step(&mut self) -> MeowResult<bool> {
        let Some(instr) = self.program.get(self.pc).cloned() else {
            return Ok(false);
        };
        self.pc += 1;
        self.steps += 1;

        match instr {
            Instr::Var(name) => {
                self.vars.entry(name).or_insert(0);
            }
            Instr::Assign { src, dst } => {
                let value = self.read(&src)?;
                self.write(&dst, value)?;
            }
            Instr::Binary { op, a, b, dst } => {
                let value = op.apply(self.read(&a)?, self.read(&b)?);
                self.write(&dst, value)?;
            }
            Instr::IfGoto { cond, label } => {
                if self.read(&cond)? != 0 {
                    self.jump(&label)?;
                }
            }
            Instr::Goto(label) => self.jump(&label)?,
            Instr::Label(_) => {}
            Instr::Pixel { x, y, color } => {
                let (x, y, color) = (self.read(&x)?, self.read(&y)?, self.read(&color)?);
                // Запись за пределы экрана отсекается
                if let Some(i) = Self::offset(x, y) {
                    self.framebuffer[i] = color;
                }
            }
            Instr::Key { code, dst } => {
                let pressed = usize::try_from(code)
                    .ok()
                    .and_then(|i| self.keys.get(i).copied())
                    .ok_or_else(|| MeowError::Runtime(format!("no input line {}", code)))?;
                self.write(&dst, i64::from(pressed))?;
            }
            Instr::Input(dst) => {
                let value = self.input.pop_front().unwrap_or(0);
                self.write(&dst, value)?;
            }
            Instr::Print(value) => {
                let value = self.read(&value)?;
                self.output.push(value);
            }
        }
        Ok(true)
    }

    fn read(&self, operand: &Operand) -> MeowResult<i64> {
        match operand {
            Operand::Const(v) => Ok(*v),
            Operand::Var(name) => self
                .vars
                .get(name)
                .copied()
                .ok_or_else(|| MeowError::Runtime(format!("read of undeclared variable '{}'", name))),
        }
    }

    fn write(&mut self, name: &str, value: i64) -> MeowResult<()> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MeowError::Runtime(format!(
                "write to undeclared variable '{}'",
                name
            ))),
        }
    }

    fn jump(&mut self, label: &str) -> MeowResult<()> {
        let target = self
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| MeowError::Runtime(format!("jump to unknown label '{}'", label)))?;
        self.pc = target;
        Ok(())
    }
}
