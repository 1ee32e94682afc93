//! Minimal reader for the HTML fragments the server sends as prompts.
//!
//! Only what a character terminal can show survives: line breaks, emphasis
//! and entities. Every other tag is dropped.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

pub type Line = Vec<Run>;

/// Splits `markup` into lines of runs. Always returns at least one line.
pub fn parse(markup: &str) -> Vec<Line> {
    let mut parser = Parser::default();
    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '<' => rest.find('>').map(|end| {
                parser.tag(&rest[1..end]);
                end + 1
            }),
            '&' => rest[1..]
                .find(';')
                .filter(|&end| end <= 8)
                .and_then(|end| decode_entity(&rest[1..end + 1]).map(|decoded| (decoded, end + 2)))
                .map(|(decoded, len)| {
                    parser.push(decoded);
                    len
                }),
            '\n' => {
                parser.line_break();
                Some(1)
            }
            '\r' => Some(1),
            _ => None,
        };
        let consumed = consumed.unwrap_or_else(|| {
            parser.push(c);
            c.len_utf8()
        });
        rest = &rest[consumed..];
    }
    parser.finish()
}

/// Text content with line breaks as `\n`.
pub fn to_plain(markup: &str) -> String {
    parse(markup)
        .iter()
        .map(|line| line.iter().map(|run| run.text.as_str()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Default)]
struct Parser {
    lines: Vec<Line>,
    line: Line,
    bold_depth: usize,
}

impl Parser {
    fn push(&mut self, c: char) {
        let bold = self.bold_depth > 0;
        match self.line.last_mut() {
            Some(run) if run.bold == bold => run.text.push(c),
            _ => self.line.push(Run {
                text: c.to_string(),
                bold,
            }),
        }
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.line));
    }

    fn tag(&mut self, raw: &str) {
        let raw = raw.trim();
        let closing = raw.starts_with('/');
        let name: String = raw
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match name.as_str() {
            "br" => self.line_break(),
            "b" | "strong" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if closing {
                    self.bold_depth = self.bold_depth.saturating_sub(1);
                } else if !raw.ends_with('/') {
                    self.bold_depth += 1;
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line> {
        self.lines.push(self.line);
        self.lines
    }
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "nbsp" => Some(' '),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(|c| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
