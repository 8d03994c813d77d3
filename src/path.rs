//! SVG path data parsing, translation and serialization.
//!
//! SVG path syntax: https://www.w3.org/TR/SVG/paths.html

use crate::error::SvgcrushError;
use crate::number::{format_compact, needs_separator, round_to};

/// The drawing operation of a path command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// M/m
    MoveTo,
    /// L/l
    LineTo,
    /// H/h
    HorizontalTo,
    /// V/v
    VerticalTo,
    /// C/c
    CurveTo,
    /// S/s
    SmoothCurveTo,
    /// Q/q
    QuadTo,
    /// T/t
    SmoothQuadTo,
    /// A/a
    Arc,
    /// Z/z
    ClosePath,
}

impl CommandKind {
    fn from_letter(c: char) -> Option<Self> {
        Some(match c.to_ascii_lowercase() {
            'm' => Self::MoveTo,
            'l' => Self::LineTo,
            'h' => Self::HorizontalTo,
            'v' => Self::VerticalTo,
            'c' => Self::CurveTo,
            's' => Self::SmoothCurveTo,
            'q' => Self::QuadTo,
            't' => Self::SmoothQuadTo,
            'a' => Self::Arc,
            'z' => Self::ClosePath,
            _ => return None,
        })
    }

    /// Number of operands one command of this kind takes.
    pub fn arity(self) -> usize {
        match self {
            Self::MoveTo | Self::LineTo | Self::SmoothQuadTo => 2,
            Self::HorizontalTo | Self::VerticalTo => 1,
            Self::CurveTo => 6,
            Self::SmoothCurveTo | Self::QuadTo => 4,
            Self::Arc => 7,
            Self::ClosePath => 0,
        }
    }

    fn absolute_letter(self) -> char {
        match self {
            Self::MoveTo => 'M',
            Self::LineTo => 'L',
            Self::HorizontalTo => 'H',
            Self::VerticalTo => 'V',
            Self::CurveTo => 'C',
            Self::SmoothCurveTo => 'S',
            Self::QuadTo => 'Q',
            Self::SmoothQuadTo => 'T',
            Self::Arc => 'A',
            Self::ClosePath => 'Z',
        }
    }
}

/// A single path command with its operands in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    pub kind: CommandKind,
    pub absolute: bool,
    pub operands: Vec<f64>,
}

impl PathCommand {
    pub fn new(kind: CommandKind, absolute: bool, operands: Vec<f64>) -> Self {
        Self {
            kind,
            absolute,
            operands,
        }
    }

    pub fn letter(&self) -> char {
        let c = self.kind.absolute_letter();
        if self.absolute {
            c
        } else {
            c.to_ascii_lowercase()
        }
    }
}

/// Parse SVG path data into commands.
///
/// Repeated operand groups expand into repeated commands; extra pairs after
/// a moveto become linetos of the same absoluteness.
pub fn parse_path(d: &str) -> Result<Vec<PathCommand>, SvgcrushError> {
    PathParser::new(d).parse()
}

/// Shift the coordinates of absolute commands by `(dx, dy)`.
///
/// Relative commands are translation-invariant, with one exception: a
/// leading `m` is measured from the origin and moves with the path.
pub fn translate(commands: &[PathCommand], dx: f64, dy: f64) -> Vec<PathCommand> {
    commands
        .iter()
        .enumerate()
        .map(|(i, cmd)| {
            let anchored = cmd.absolute || (i == 0 && cmd.kind == CommandKind::MoveTo);
            if !anchored {
                return cmd.clone();
            }

            let mut shifted = cmd.clone();
            match cmd.kind {
                CommandKind::HorizontalTo => shifted.operands[0] += dx,
                CommandKind::VerticalTo => shifted.operands[0] += dy,
                CommandKind::Arc => {
                    shifted.operands[5] += dx;
                    shifted.operands[6] += dy;
                }
                CommandKind::ClosePath => {}
                _ => {
                    for (j, v) in shifted.operands.iter_mut().enumerate() {
                        *v += if j % 2 == 0 { dx } else { dy };
                    }
                }
            }
            shifted
        })
        .collect()
}

/// Render commands in the same compact form as [`minify`], without
/// rounding.
pub fn serialize_commands(commands: &[PathCommand]) -> String {
    write_commands(commands, format_compact)
}

/// Make path data safe to append to another path's data.
///
/// A leading relative `m` is rewritten to an absolute `M`; the pairs that
/// followed it stay relative linetos. Returns `None` for empty or
/// malformed data, or data that does not start with a moveto.
pub fn normalize_start(d: &str) -> Option<String> {
    let mut commands = parse_path(d).ok()?;
    let first = commands.first_mut()?;
    if first.kind != CommandKind::MoveTo {
        return None;
    }
    if first.absolute {
        return Some(d.trim().to_string());
    }
    first.absolute = true;
    Some(serialize_commands(&commands))
}

/// Rewrite every command in absolute coordinates.
pub fn to_absolute(commands: &[PathCommand]) -> Vec<PathCommand> {
    let mut out = Vec::with_capacity(commands.len());
    let (mut cx, mut cy) = (0.0, 0.0);
    let (mut sx, mut sy) = (0.0, 0.0);

    for cmd in commands {
        let mut abs = cmd.clone();
        abs.absolute = true;
        if !cmd.absolute {
            match cmd.kind {
                CommandKind::HorizontalTo => abs.operands[0] += cx,
                CommandKind::VerticalTo => abs.operands[0] += cy,
                CommandKind::Arc => {
                    abs.operands[5] += cx;
                    abs.operands[6] += cy;
                }
                CommandKind::ClosePath => {}
                _ => {
                    for (j, v) in abs.operands.iter_mut().enumerate() {
                        *v += if j % 2 == 0 { cx } else { cy };
                    }
                }
            }
        }

        match abs.kind {
            CommandKind::HorizontalTo => cx = abs.operands[0],
            CommandKind::VerticalTo => cy = abs.operands[0],
            CommandKind::ClosePath => {
                cx = sx;
                cy = sy;
            }
            _ => {
                let n = abs.operands.len();
                cx = abs.operands[n - 2];
                cy = abs.operands[n - 1];
                if abs.kind == CommandKind::MoveTo {
                    sx = cx;
                    sy = cy;
                }
            }
        }
        out.push(abs);
    }

    out
}

/// Serialize commands as compactly as possible at the given precision.
///
/// Command letters implied by the previous command are omitted and
/// separators are only written where two numbers would otherwise fuse.
pub fn minify(commands: &[PathCommand], precision: u8) -> String {
    write_commands(commands, |v| format_number(v, precision))
}

fn write_commands(commands: &[PathCommand], number: impl Fn(f64) -> String) -> String {
    let mut out = String::new();
    let mut prev_letter: Option<char> = None;
    let mut last_token: Option<String> = None;

    for cmd in commands {
        let letter = cmd.letter();
        let implied = match prev_letter {
            Some('M') => letter == 'L',
            Some('m') => letter == 'l',
            Some(prev) => {
                prev == letter
                    && cmd.kind != CommandKind::MoveTo
                    && cmd.kind != CommandKind::ClosePath
            }
            None => false,
        };
        if !implied {
            out.push(letter);
            last_token = None;
        }

        for (i, v) in cmd.operands.iter().enumerate() {
            let token = if cmd.kind == CommandKind::Arc && (i == 3 || i == 4) {
                if *v != 0.0 { "1".to_string() } else { "0".to_string() }
            } else {
                number(*v)
            };
            if let Some(prev) = &last_token
                && needs_separator(prev, &token)
            {
                out.push(' ');
            }
            out.push_str(&token);
            last_token = Some(token);
        }

        prev_letter = Some(letter);
    }

    out
}

/// Format a number with the given precision, removing unnecessary zeros.
pub fn format_number(n: f64, precision: u8) -> String {
    format_compact(round_to(n, precision))
}

struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<Vec<PathCommand>, SvgcrushError> {
        let mut commands = Vec::new();

        self.skip_whitespace();

        while let Some(c) = self.next() {
            let kind = CommandKind::from_letter(c).ok_or_else(|| {
                SvgcrushError::path(self.input, format!("Unknown command: {}", c))
            })?;
            let absolute = c.is_ascii_uppercase();

            let operands = self.parse_operands(kind)?;
            let arity = kind.arity();

            if arity == 0 {
                if !operands.is_empty() {
                    return Err(SvgcrushError::path(
                        self.input,
                        format!("'{}' takes no operands", c),
                    ));
                }
                commands.push(PathCommand::new(kind, absolute, Vec::new()));
            } else {
                if operands.is_empty() || operands.len() % arity != 0 {
                    return Err(SvgcrushError::path(
                        self.input,
                        format!(
                            "'{}' expects a multiple of {} operands, got {}",
                            c,
                            arity,
                            operands.len()
                        ),
                    ));
                }
                for (i, chunk) in operands.chunks(arity).enumerate() {
                    let kind = if kind == CommandKind::MoveTo && i > 0 {
                        CommandKind::LineTo
                    } else {
                        kind
                    };
                    commands.push(PathCommand::new(kind, absolute, chunk.to_vec()));
                }
            }

            self.skip_whitespace_and_comma();
        }

        Ok(commands)
    }

    fn parse_operands(&mut self, kind: CommandKind) -> Result<Vec<f64>, SvgcrushError> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace_and_comma();
            match self.peek() {
                None => break,
                Some(c) if c.is_ascii_alphabetic() => break,
                Some(_) => {}
            }
            let flag_slot = kind == CommandKind::Arc && matches!(operands.len() % 7, 3 | 4);
            let value = if flag_slot {
                self.parse_flag()?
            } else {
                self.parse_number()?
            };
            operands.push(value);
        }
        Ok(operands)
    }

    fn parse_number(&mut self) -> Result<f64, SvgcrushError> {
        let start = self.pos;

        // Optional sign
        if self.peek() == Some('-') || self.peek() == Some('+') {
            self.next();
        }

        // Integer part
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.next();
        }

        // Decimal part
        if self.peek() == Some('.') {
            self.next();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.next();
            }
        }

        // Exponent, only when digits follow
        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.next();
            if self.peek() == Some('-') || self.peek() == Some('+') {
                self.next();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.next();
                }
            } else {
                self.pos = mark;
            }
        }

        let s = &self.input[start..self.pos];
        if s.is_empty() {
            return Err(SvgcrushError::path(self.input, "Expected number"));
        }

        s.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| SvgcrushError::path(self.input, format!("Invalid number: {}", s)))
    }

    fn parse_flag(&mut self) -> Result<f64, SvgcrushError> {
        match self.next() {
            Some('0') => Ok(0.0),
            Some('1') => Ok(1.0),
            Some(c) => Err(SvgcrushError::path(
                self.input,
                format!("Expected flag (0 or 1), got: {}", c),
            )),
            None => Err(SvgcrushError::path(self.input, "Expected flag")),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.next();
        }
    }

    fn skip_whitespace_and_comma(&mut self) {
        self.skip_whitespace();
        if self.peek() == Some(',') {
            self.next();
        }
        self.skip_whitespace();
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}
