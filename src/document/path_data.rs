use crate::types::{PathCommand, Point};

/// Error raised by [`parse_path_data`]. Commands read before the error are
/// returned alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct PathDataError {
    pub position: usize,
    pub message: String,
    pub parsed: Vec<PathCommand>,
}

impl std::fmt::Display for PathDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

struct Scanner {
    chars: Vec<char>,
    i: usize,
}

impl Scanner {
    fn skip_separators(&mut self) {
        while self.i < self.chars.len() && (self.chars[self.i].is_whitespace() || self.chars[self.i] == ',')
        {
            self.i += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.i >= self.chars.len()
    }

    /// True if the next token starts a number
    fn number_ahead(&mut self) -> bool {
        self.skip_separators();
        matches!(self.chars.get(self.i), Some(ch) if ch.is_ascii_digit() || *ch == '-' || *ch == '+' || *ch == '.')
    }

    fn number(&mut self) -> Result<f64, String> {
        self.skip_separators();
        let start = self.i;
        let len = self.chars.len();

        if self.i < len && (self.chars[self.i] == '-' || self.chars[self.i] == '+') {
            self.i += 1;
        }
        let mut seen_dot = false;
        let mut seen_digit = false;
        while self.i < len {
            let ch = self.chars[self.i];
            if ch.is_ascii_digit() {
                seen_digit = true;
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
            } else {
                break;
            }
            self.i += 1;
        }
        if seen_digit && self.i < len && (self.chars[self.i] == 'e' || self.chars[self.i] == 'E') {
            let mark = self.i;
            self.i += 1;
            if self.i < len && (self.chars[self.i] == '-' || self.chars[self.i] == '+') {
                self.i += 1;
            }
            let exp_start = self.i;
            while self.i < len && self.chars[self.i].is_ascii_digit() {
                self.i += 1;
            }
            if self.i == exp_start {
                // Not an exponent after all
                self.i = mark;
            }
        }

        let num_str: String = self.chars[start..self.i].iter().collect();
        num_str.parse().map_err(|_| {
            self.i = start;
            format!("Expected number, found \"{}\"", num_str)
        })
    }

    fn flag(&mut self) -> Result<bool, String> {
        self.skip_separators();
        match self.chars.get(self.i) {
            Some('0') => {
                self.i += 1;
                Ok(false)
            }
            Some('1') => {
                self.i += 1;
                Ok(true)
            }
            other => Err(format!("Expected arc flag, found {:?}", other)),
        }
    }

    fn point(&mut self) -> Result<Point, String> {
        let x = self.number()?;
        let y = self.number()?;
        Ok(Point::new(x, y))
    }
}

/// Parse an SVG path `d` attribute into absolute move/line/cubic commands.
///
/// Relative commands are resolved, `H`/`V` become lines, `S`/`Q`/`T` become
/// cubics and `Z` becomes a line back to the subpath start (skipped when the
/// path is already there). Arcs are passed through.
pub fn parse_path_data(d: &str) -> Result<Vec<PathCommand>, PathDataError> {
    let mut s = Scanner {
        chars: d.chars().collect(),
        i: 0,
    };
    let mut commands = Vec::new();

    let mut current = Point::default();
    let mut subpath_start = Point::default();
    // Reflection sources for smooth curves
    let mut last_cubic_ctrl: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;
    let mut command: Option<char> = None;

    macro_rules! fail {
        ($msg:expr) => {
            return Err(PathDataError {
                position: s.i,
                message: $msg,
                parsed: commands,
            })
        };
    }
    macro_rules! read {
        ($e:expr) => {
            match $e {
                Ok(v) => v,
                Err(msg) => fail!(msg),
            }
        };
    }

    while !s.at_end() {
        let ch = s.chars[s.i];
        if ch.is_ascii_alphabetic() {
            s.i += 1;
            command = Some(ch);
        } else if command.is_none() {
            fail!(format!("Path data must start with a command, found '{}'", ch));
        } else if !s.number_ahead() {
            fail!(format!("Unexpected character '{}'", ch));
        }

        let Some(cmd) = command else { break };
        let relative = cmd.is_ascii_lowercase();
        let base = if relative { current } else { Point::default() };

        match cmd.to_ascii_uppercase() {
            'M' => {
                let p = read!(s.point()) + base;
                commands.push(PathCommand::Move(p));
                current = p;
                subpath_start = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
                // Further coordinate pairs are implicit lines
                command = Some(if relative { 'l' } else { 'L' });
            }
            'L' => {
                let p = read!(s.point()) + base;
                commands.push(PathCommand::Line(p));
                current = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'H' => {
                let x = read!(s.number()) + base.x;
                let p = Point::new(x, current.y);
                commands.push(PathCommand::Line(p));
                current = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'V' => {
                let y = read!(s.number()) + base.y;
                let p = Point::new(current.x, y);
                commands.push(PathCommand::Line(p));
                current = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'C' => {
                let c1 = read!(s.point()) + base;
                let c2 = read!(s.point()) + base;
                let p = read!(s.point()) + base;
                commands.push(PathCommand::Cubic(c1, c2, p));
                current = p;
                last_cubic_ctrl = Some(c2);
                last_quad_ctrl = None;
            }
            'S' => {
                let c1 = match last_cubic_ctrl {
                    Some(c) => current + (current - c),
                    None => current,
                };
                let c2 = read!(s.point()) + base;
                let p = read!(s.point()) + base;
                commands.push(PathCommand::Cubic(c1, c2, p));
                current = p;
                last_cubic_ctrl = Some(c2);
                last_quad_ctrl = None;
            }
            'Q' => {
                let q = read!(s.point()) + base;
                let p = read!(s.point()) + base;
                commands.push(quad_to_cubic(current, q, p));
                current = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = Some(q);
            }
            'T' => {
                let q = match last_quad_ctrl {
                    Some(c) => current + (current - c),
                    None => current,
                };
                let p = read!(s.point()) + base;
                commands.push(quad_to_cubic(current, q, p));
                current = p;
                last_cubic_ctrl = None;
                last_quad_ctrl = Some(q);
            }
            'A' => {
                let rx = read!(s.number());
                let ry = read!(s.number());
                let x_axis_rotation = read!(s.number());
                let large_arc = read!(s.flag());
                let sweep = read!(s.flag());
                let to = read!(s.point()) + base;
                commands.push(PathCommand::Arc {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    to,
                });
                current = to;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            'Z' => {
                if current != subpath_start {
                    commands.push(PathCommand::Line(subpath_start));
                }
                current = subpath_start;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
                // Z takes no arguments; a number right after it is an error.
                command = None;
            }
            other => fail!(format!("Unknown path command '{}'", other)),
        }
    }

    Ok(commands)
}

/// Parse a whitespace/comma separated number list (`points`, `viewBox`,
/// transform arguments). Stops at the first token that is not a number.
pub fn parse_number_list(value: &str) -> Vec<f64> {
    let mut s = Scanner {
        chars: value.chars().collect(),
        i: 0,
    };
    let mut numbers = Vec::new();
    while s.number_ahead() {
        match s.number() {
            Ok(n) => numbers.push(n),
            Err(_) => break,
        }
    }
    numbers
}

/// Degree elevation of a quadratic segment
fn quad_to_cubic(p0: Point, q: Point, p: Point) -> PathCommand {
    let c1 = p0.lerp(q, 2.0 / 3.0);
    let c2 = p.lerp(q, 2.0 / 3.0);
    PathCommand::Cubic(c1, c2, p)
}
