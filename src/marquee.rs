//! Бегущая строка.
//!
//! Сообщение из цифр, `.` и `$` рисуется на экране FIS-25 полосой пикселей,
//! по одному на символ. Клавиши A и D сдвигают строку на один шаг за
//! нажатие: в каждом кадре опрашиваются обе линии, и сдвиг происходит только
//! на переходе 0 → 1. За кадр возможен не более чем один сдвиг: если сработала
//! A, фронт D в этом кадре не проверяется. Программа строится как обычное дерево через
//! [`ProgramBuilder`] и проходит ту же проверку и генерацию, что и любой
//! исходный текст.

use crate::ast::{BinOp, ExprId, StmtId, StmtList};
use crate::builder::{ProgramBuilder, ValidatedProgram};
use crate::compiler::compile_with_header;
use crate::config::MarqueeConfig;
use crate::error::{Diagnostics, MeowError, MeowResult};
use crate::machine::SCREEN_WIDTH;
use crate::target::TargetProgram;
use crate::types::MeowType;

/// Сообщение, если после фильтрации ничего не осталось.
pub const DEFAULT_MESSAGE: &str = "0";

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '$'
}

/// Оставить только `0-9`, `.` и `$`, не длиннее `max_len` символов.
///
/// Переводы строк отбрасываются молча, прочие символы — с предупреждением.
pub fn filter_message(raw: &str, max_len: usize) -> String {
    let mut message = String::new();
    for c in raw.chars() {
        if message.len() >= max_len {
            break;
        }
        match c {
            '\n' | '\r' => {}
            c if is_allowed(c) => message.push(c),
            c => log::warn!("ignoring disallowed character {:?}", c),
        }
    }
    if message.is_empty() {
        log::warn!("message is empty after filtering, using '{}'", DEFAULT_MESSAGE);
        message.push_str(DEFAULT_MESSAGE);
    }
    message
}

/// Построить и проверить программу бегущей строки для `message`.
pub fn build_marquee(
    message: &str,
    config: &MarqueeConfig,
) -> Result<ValidatedProgram, Diagnostics> {
    let text_len = message.chars().count() as i64;
    let width = text_len.saturating_mul(config.char_spacing);
    let mut b = ProgramBuilder::new();

    let mut decls = vec![
        declare_int(&mut b, "x", config.start_x),
        declare_int(&mut b, "y", config.row),
        declare_int(&mut b, "color", config.color),
        declare_int(&mut b, "step", config.step),
        declare_int(&mut b, "min_x", width.saturating_neg()),
        declare_int(&mut b, "max_x", config.max_x),
        declare_int(&mut b, "text_len", text_len),
    ];
    for name in [
        "left_now", "right_now", "left_prev", "right_prev", "moved", "clr_x", "idx", "pix_x",
    ] {
        decls.push(declare_int(&mut b, name, 0));
    }

    let frame = frame(&mut b, config);
    let forever = b.bool(true);
    let main_loop = b.while_loop(forever, frame);
    decls.push(main_loop);

    let root = b.list(decls);
    b.finish(root)
}

/// Скомпилировать бегущую строку вместе с заголовком-комментарием.
pub fn marquee_program(message: &str, config: &MarqueeConfig) -> MeowResult<TargetProgram> {
    config.validate()?;
    let program = build_marquee(message, config).map_err(|diags| {
        MeowError::MalformedTree(format!("marquee failed validation:\n{}", diags))
    })?;
    let width = (message.chars().count() as i64).saturating_mul(config.char_spacing);
    let header = vec![
        "Dynamic marquee".to_string(),
        format!("Message: \"{}\"", message),
        format!(
            "Each character takes 1 pixel + {} gap -> total width = {}",
            config.char_spacing - 1,
            width
        ),
        format!(
            "Controls: A = left (KEY {}), D = right (KEY {})",
            config.left_key, config.right_key
        ),
    ];
    compile_with_header(&program, header)
}

// === Части программы ===

fn declare_int(b: &mut ProgramBuilder, name: &str, value: i64) -> StmtId {
    let value = b.int(value);
    b.declare(MeowType::Integer, name, Some(value))
}

fn set_int(b: &mut ProgramBuilder, name: &str, value: i64) -> StmtId {
    let value = b.int(value);
    b.assign(name, value)
}

fn var_op_int(b: &mut ProgramBuilder, op: BinOp, name: &str, value: i64) -> ExprId {
    let left = b.var(name);
    let right = b.int(value);
    b.binary(op, left, right)
}

fn var_op_var(b: &mut ProgramBuilder, op: BinOp, left: &str, right: &str) -> ExprId {
    let left = b.var(left);
    let right = b.var(right);
    b.binary(op, left, right)
}

fn increment(b: &mut ProgramBuilder, name: &str) -> StmtId {
    let next = var_op_int(b, BinOp::Add, name, 1);
    b.assign(name, next)
}

/// Один кадр: очистка строки, отрисовка, опрос клавиш, сдвиг.
fn frame(b: &mut ProgramBuilder, config: &MarqueeConfig) -> StmtList {
    let reset_clr = set_int(b, "clr_x", 0);
    let reset_idx = set_int(b, "idx", 0);

    // Очистка строки
    let more = var_op_int(b, BinOp::Lt, "clr_x", SCREEN_WIDTH as i64);
    let x = b.var("clr_x");
    let y = b.var("y");
    let off = b.int(0);
    let blank = b.pixel(x, y, off);
    let next = increment(b, "clr_x");
    let body = b.list([blank, next]);
    let clear = b.while_loop(more, body);

    // Отрисовка: pix_x = x + idx * char_spacing
    let more = var_op_var(b, BinOp::Lt, "idx", "text_len");
    let offset = var_op_int(b, BinOp::Mul, "idx", config.char_spacing);
    let origin = b.var("x");
    let column = b.binary(BinOp::Add, origin, offset);
    let place = b.assign("pix_x", column);
    let x = b.var("pix_x");
    let y = b.var("y");
    let color = b.var("color");
    let lit = b.pixel(x, y, color);
    let next = increment(b, "idx");
    let body = b.list([place, lit, next]);
    let draw = b.while_loop(more, body);

    let poll_left = b.key(config.left_key, "left_now");
    let poll_right = b.key(config.right_key, "right_now");
    let settle = set_int(b, "moved", 0);
    let left = on_press(b, "left_prev", "left_now", BinOp::Sub, BinOp::Lt, "min_x");
    let right = on_press(b, "right_prev", "right_now", BinOp::Add, BinOp::Gt, "max_x");
    let still = var_op_int(b, BinOp::Eq, "moved", 0);
    let right_body = b.list([right]);
    let right = b.if_then(still, right_body);

    let now = b.var("left_now");
    let latch_left = b.assign("left_prev", now);
    let now = b.var("right_now");
    let latch_right = b.assign("right_prev", now);

    b.list([
        reset_clr,
        reset_idx,
        clear,
        draw,
        poll_left,
        poll_right,
        settle,
        left,
        right,
        latch_left,
        latch_right,
    ])
}

/// `if (prev == 0) { if (now == 1) { x = x ± step; if (x cmp bound) { x = bound; } moved = 1; } }`
fn on_press(
    b: &mut ProgramBuilder,
    prev: &str,
    now: &str,
    shift: BinOp,
    beyond: BinOp,
    bound: &str,
) -> StmtId {
    let moved = var_op_var(b, shift, "x", "step");
    let advance = b.assign("x", moved);

    let past = var_op_var(b, beyond, "x", bound);
    let limit = b.var(bound);
    let clamp = b.assign("x", limit);
    let clamp_body = b.list([clamp]);
    let clamp = b.if_then(past, clamp_body);

    let mark = set_int(b, "moved", 1);
    let pressed = var_op_int(b, BinOp::Eq, now, 1);
    let move_body = b.list([advance, clamp, mark]);
    let on_press = b.if_then(pressed, move_body);

    let released = var_op_int(b, BinOp::Eq, prev, 0);
    let edge_body = b.list([on_press]);
    b.if_then(released, edge_body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{Halt, Machine};

    /// Дойти до конца отрисовки следующего кадра.
    fn next_frame(machine: &mut Machine, text_len: i64) {
        let drawn = |m: &Machine| m.var("clr_x") == Some(64) && m.var("idx") == Some(text_len);
        let mut budget = 100_000;
        while drawn(&*machine) {
            assert!(machine.step().unwrap());
            budget -= 1;
        }
        while !drawn(&*machine) {
            assert!(machine.step().unwrap());
            budget -= 1;
            assert!(budget > 0, "frame never finished");
        }
    }

    fn start(message: &str, config: &MarqueeConfig) -> Machine {
        let program = marquee_program(message, config).unwrap();
        Machine::new(program.instructions()).unwrap()
    }

    #[test]
    fn test_filter_message() {
        assert_eq!(filter_message("12.5$\r\n", 63), "12.5$");
        assert_eq!(filter_message("a1b2 3", 63), "123");
        assert_eq!(filter_message("hello\n", 63), "0");
        assert_eq!(filter_message("", 63), "0");
        assert_eq!(filter_message("123456", 4), "1234");
    }

    #[test]
    fn test_marquee_validates() {
        let program = build_marquee("1$2", &MarqueeConfig::default()).unwrap();
        assert_eq!(program.symbols().type_of("text_len"), Ok(MeowType::Integer));
        assert_eq!(program.symbols().len(), 15);
    }

    #[test]
    fn test_header_and_runs_forever() {
        let program = marquee_program("42", &MarqueeConfig::default()).unwrap();
        assert_eq!(program.header[1], "Message: \"42\"");
        assert!(program.to_string().starts_with("// Dynamic marquee\n"));

        let mut machine = Machine::new(program.instructions()).unwrap();
        assert_eq!(machine.run(10_000).unwrap(), Halt::StepLimit);
    }

    #[test]
    fn test_draws_message_at_start() {
        let mut machine = start("1$2", &MarqueeConfig::default());
        next_frame(&mut machine, 3);
        assert_eq!(machine.lit_in_row(30), vec![20, 22, 24]);
        assert!(machine.lit_in_row(29).is_empty());
    }

    #[test]
    fn test_one_step_per_press() {
        let mut machine = start("1$2", &MarqueeConfig::default());
        next_frame(&mut machine, 3);

        machine.set_key(7, true);
        next_frame(&mut machine, 3);
        assert_eq!(machine.var("x"), Some(21));
        assert_eq!(machine.lit_in_row(30), vec![21, 23, 25]);

        // Удержание клавиши не двигает строку дальше
        next_frame(&mut machine, 3);
        next_frame(&mut machine, 3);
        assert_eq!(machine.var("x"), Some(21));

        machine.set_key(7, false);
        next_frame(&mut machine, 3);
        machine.set_key(6, true);
        next_frame(&mut machine, 3);
        assert_eq!(machine.var("x"), Some(20));
    }

    #[test]
    fn test_left_wins_when_both_pressed() {
        let mut machine = start("1", &MarqueeConfig::default());
        next_frame(&mut machine, 1);
        machine.set_key(6, true);
        machine.set_key(7, true);
        next_frame(&mut machine, 1);
        assert_eq!(machine.var("x"), Some(19));

        next_frame(&mut machine, 1);
        assert_eq!(machine.var("x"), Some(19));
        assert_eq!(machine.lit_in_row(30), vec![19]);
    }

    #[test]
    fn test_huge_spacing_does_not_overflow() {
        let config = MarqueeConfig {
            char_spacing: i64::MAX / 2,
            ..MarqueeConfig::default()
        };
        let program = build_marquee("123", &config).unwrap();
        assert_eq!(program.symbols().type_of("min_x"), Ok(MeowType::Integer));
        assert!(matches!(
            marquee_program("123", &config),
            Err(MeowError::Config(_))
        ));
    }

    #[test]
    fn test_clamping() {
        let config = MarqueeConfig {
            start_x: 20,
            max_x: 22,
            step: 5,
            ..MarqueeConfig::default()
        };
        let mut machine = start("1$2", &config);
        next_frame(&mut machine, 3);
        machine.set_key(7, true);
        next_frame(&mut machine, 3);
        assert_eq!(machine.var("x"), Some(22));

        let config = MarqueeConfig {
            start_x: 0,
            step: 10,
            ..MarqueeConfig::default()
        };
        let mut machine = start("1$2", &config);
        next_frame(&mut machine, 3);
        machine.set_key(6, true);
        next_frame(&mut machine, 3);
        assert_eq!(machine.var("x"), Some(-6));
        assert!(machine.lit_in_row(30).is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MarqueeConfig {
            left_key: 9,
            ..MarqueeConfig::default()
        };
        assert!(matches!(
            marquee_program("1", &config),
            Err(MeowError::Config(_))
        ));
    }
}
