use super::encode::decode_string;
use super::lex::{lex, Token};
use crate::errors::{XsonError, XsonErrorKind};
use bitflags::bitflags;
use std::borrow::Cow;
use std::ops::{ControlFlow, Range};

bitflags! {
    /// Parser behavior switches. Each is independent of the others.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParseOptions: u32 {
        /// Skip UTF-8 validation of strings; invalid bytes are replaced when delivered
        const DONT_VALIDATE_STRINGS = 0x01;
        /// Ignore whatever follows the first complete value
        const ALLOW_TRAILING_GARBAGE = 0x02;
        /// Accept a stream of whitespace separated values
        const ALLOW_MULTIPLE_VALUES = 0x04;
        /// Do not report premature EOF when the input stops inside a value
        const ALLOW_PARTIAL_VALUES = 0x08;
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Receives parse events. Returning `ControlFlow::Break` cancels the parse, which is reported
/// as `XsonErrorKind::Canceled` rather than a syntax error.
///
/// Numbers are delivered to `integer` or `double`. When `raw_numbers` returns true, or when the
/// value does not fit an `i64` / finite `f64`, the token text goes to `number` instead.
pub trait Callbacks {
    fn raw_numbers(&self) -> bool {
        false
    }

    fn null(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn boolean(&mut self, _value: bool) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn integer(&mut self, _value: i64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn double(&mut self, _value: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn number(&mut self, _raw: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn string(&mut self, _value: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn start_map(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn map_key(&mut self, _key: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn end_map(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn start_array(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn end_array(&mut self) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    ParseComplete,
    ParseError,
    LexicalError,
    MapStart,
    MapSep,
    MapNeedVal,
    MapGotVal,
    MapNeedKey,
    ArrayStart,
    ArrayGotVal,
    ArrayNeedVal,
    GotValue,
}

/// Streaming, event driven JSON parser.
///
/// Input may arrive in any number of chunks; a token split across chunks is carried over.
/// Nesting is tracked on an explicit state stack bounded by `max_depth`, so deep documents
/// fail with an error instead of exhausting the call stack.
///
/// ```
/// use ncollectd_core::xson::{Callbacks, ParseOptions, Parser};
/// use std::ops::ControlFlow;
///
/// #[derive(Default)]
/// struct Sum(i64);
///
/// impl Callbacks for Sum {
///     fn integer(&mut self, value: i64) -> ControlFlow<()> {
///         self.0 += value;
///         ControlFlow::Continue(())
///     }
/// }
///
/// let mut sum = Sum::default();
/// let mut parser = Parser::new(ParseOptions::empty());
/// parser.parse(b"[1, 2", &mut sum).unwrap();
/// parser.parse(b"0, 3]", &mut sum).unwrap();
/// parser.complete(&mut sum).unwrap();
/// assert_eq!(sum.0, 24);
/// ```
#[derive(Debug)]
pub struct Parser {
    options: ParseOptions,
    max_depth: usize,
    states: Vec<State>,
    pending: Vec<u8>,
    consumed: usize,
    error: Option<XsonError>,
}

enum Event {
    Continue,
    Canceled,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Self {
        Parser {
            options,
            max_depth: DEFAULT_MAX_DEPTH,
            states: vec![State::Start],
            pending: Vec::new(),
            consumed: 0,
            error: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Total number of input bytes consumed, including bytes held back for an unfinished token.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed + self.pending.len()
    }

    /// Feeds a chunk of input, invoking callbacks for every complete token.
    pub fn parse<C: Callbacks>(&mut self, chunk: &[u8], callbacks: &mut C) -> Result<(), XsonError> {
        if let Some(ref err) = self.error {
            return Err(err.clone());
        }

        let mut buf = std::mem::take(&mut self.pending);
        let base = self.consumed;
        buf.extend_from_slice(chunk);

        let mut pos = 0;
        let result = self.run(&buf, &mut pos, callbacks);

        self.consumed = base + pos;
        if result.is_ok() && pos < buf.len() {
            self.pending = buf[pos..].to_vec();
        }

        result.map_err(|kind| {
            let err = XsonError {
                kind,
                offset: base + pos,
            };
            self.error = Some(err.clone());
            err
        })
    }

    /// Signals the end of input. A value left open, or no value at all, is a premature EOF
    /// unless `ALLOW_PARTIAL_VALUES` is set.
    pub fn complete<C: Callbacks>(&mut self, callbacks: &mut C) -> Result<(), XsonError> {
        self.parse(b" ", callbacks)?;

        match self.top() {
            State::ParseComplete | State::GotValue => Ok(()),
            _ if self.options.contains(ParseOptions::ALLOW_PARTIAL_VALUES) => Ok(()),
            _ => {
                self.set_state(State::ParseError);
                let err = XsonError {
                    kind: XsonErrorKind::Parse("premature EOF"),
                    offset: self.bytes_consumed(),
                };
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn top(&self) -> State {
        self.states.last().copied().unwrap_or(State::ParseError)
    }

    fn set_state(&mut self, state: State) {
        match self.states.last_mut() {
            Some(top) => *top = state,
            None => self.states.push(state),
        }
    }

    /// State after a complete value has been read in the current container.
    fn value_done(&mut self) {
        let next = match self.top() {
            State::Start | State::GotValue => State::ParseComplete,
            State::MapNeedVal => State::MapGotVal,
            State::ArrayStart | State::ArrayNeedVal => State::ArrayGotVal,
            other => other,
        };
        self.set_state(next);
    }

    fn push_container(&mut self, state: State) -> Result<(), XsonErrorKind> {
        if self.states.len() > self.max_depth {
            return Err(self.parse_error("maximum nesting depth exceeded"));
        }
        self.value_done();
        self.states.push(state);
        Ok(())
    }

    fn pop_container(&mut self) {
        self.states.pop();
        if self.states.is_empty() {
            self.states.push(State::ParseComplete);
        }
    }

    fn parse_error(&mut self, msg: &'static str) -> XsonErrorKind {
        self.set_state(State::ParseError);
        XsonErrorKind::Parse(msg)
    }

    fn run<C: Callbacks>(
        &mut self,
        buf: &[u8],
        pos: &mut usize,
        cb: &mut C,
    ) -> Result<(), XsonErrorKind> {
        let validate = !self.options.contains(ParseOptions::DONT_VALIDATE_STRINGS);

        loop {
            match self.top() {
                State::ParseComplete => {
                    if self.options.contains(ParseOptions::ALLOW_MULTIPLE_VALUES) {
                        self.set_state(State::GotValue);
                        continue;
                    }
                    if !self.options.contains(ParseOptions::ALLOW_TRAILING_GARBAGE) {
                        if lex(buf, pos, validate) != Ok(Token::Eof) {
                            return Err(self.parse_error("trailing garbage"));
                        }
                    } else {
                        *pos = buf.len();
                    }
                    return Ok(());
                }
                State::ParseError | State::LexicalError => {
                    return Err(XsonErrorKind::Parse("parse already failed"));
                }
                State::Start
                | State::GotValue
                | State::MapNeedVal
                | State::ArrayNeedVal
                | State::ArrayStart => {
                    let tok = self.next_token(buf, pos, validate)?;
                    let event = match tok {
                        Token::Eof => return Ok(()),
                        Token::String { body, escaped } => {
                            let s = string_text(buf, body, escaped);
                            self.value_done();
                            into_event(cb.string(&s))
                        }
                        Token::Bool(b) => {
                            self.value_done();
                            into_event(cb.boolean(b))
                        }
                        Token::Null => {
                            self.value_done();
                            into_event(cb.null())
                        }
                        Token::Integer(range) => {
                            self.value_done();
                            deliver_integer(&buf[range], cb)
                        }
                        Token::Double(range) => {
                            self.value_done();
                            deliver_double(&buf[range], cb)
                        }
                        Token::LeftBrace => {
                            self.push_container(State::MapStart)?;
                            into_event(cb.start_map())
                        }
                        Token::LeftBracket => {
                            self.push_container(State::ArrayStart)?;
                            into_event(cb.start_array())
                        }
                        Token::RightBracket if self.top() == State::ArrayStart => {
                            self.pop_container();
                            into_event(cb.end_array())
                        }
                        _ => {
                            return Err(
                                self.parse_error("unallowed token at this point in JSON text")
                            )
                        }
                    };
                    self.check(event)?;
                }
                State::MapStart | State::MapNeedKey => {
                    let tok = self.next_token(buf, pos, validate)?;
                    let event = match tok {
                        Token::Eof => return Ok(()),
                        Token::String { body, escaped } => {
                            let s = string_text(buf, body, escaped);
                            self.set_state(State::MapSep);
                            into_event(cb.map_key(&s))
                        }
                        Token::RightBrace if self.top() == State::MapStart => {
                            self.pop_container();
                            into_event(cb.end_map())
                        }
                        _ => return Err(self.parse_error("invalid object key (must be a string)")),
                    };
                    self.check(event)?;
                }
                State::MapSep => match self.next_token(buf, pos, validate)? {
                    Token::Eof => return Ok(()),
                    Token::Colon => self.set_state(State::MapNeedVal),
                    _ => {
                        return Err(self.parse_error(
                            "object key and value must be separated by a colon (':')",
                        ))
                    }
                },
                State::MapGotVal => match self.next_token(buf, pos, validate)? {
                    Token::Eof => return Ok(()),
                    Token::RightBrace => {
                        self.pop_container();
                        let event = into_event(cb.end_map());
                        self.check(event)?;
                    }
                    Token::Comma => self.set_state(State::MapNeedKey),
                    _ => {
                        return Err(
                            self.parse_error("after key and value, inside map, I expect ',' or '}'")
                        )
                    }
                },
                State::ArrayGotVal => match self.next_token(buf, pos, validate)? {
                    Token::Eof => return Ok(()),
                    Token::RightBracket => {
                        self.pop_container();
                        let event = into_event(cb.end_array());
                        self.check(event)?;
                    }
                    Token::Comma => self.set_state(State::ArrayNeedVal),
                    _ => return Err(self.parse_error("after array element, I expect ',' or ']'")),
                },
            }
        }
    }

    fn next_token(
        &mut self,
        buf: &[u8],
        pos: &mut usize,
        validate: bool,
    ) -> Result<Token, XsonErrorKind> {
        lex(buf, pos, validate).map_err(|(e, at)| {
            *pos = at;
            self.set_state(State::LexicalError);
            XsonErrorKind::Lexical(e)
        })
    }

    fn check(&mut self, event: Event) -> Result<(), XsonErrorKind> {
        match event {
            Event::Continue => Ok(()),
            Event::Canceled => {
                self.set_state(State::ParseError);
                Err(XsonErrorKind::Canceled)
            }
        }
    }
}

fn into_event(flow: ControlFlow<()>) -> Event {
    match flow {
        ControlFlow::Continue(()) => Event::Continue,
        ControlFlow::Break(()) => Event::Canceled,
    }
}

fn string_text(buf: &[u8], body: Range<usize>, escaped: bool) -> Cow<'_, str> {
    let raw = &buf[body];
    if escaped {
        Cow::Owned(decode_string(raw))
    } else {
        String::from_utf8_lossy(raw)
    }
}

// Number tokens are ASCII by construction.
fn number_text(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(raw)
}

fn deliver_integer<C: Callbacks>(raw: &[u8], cb: &mut C) -> Event {
    let text = number_text(raw);
    if cb.raw_numbers() {
        return into_event(cb.number(&text));
    }
    match text.parse::<i64>() {
        Ok(v) => into_event(cb.integer(v)),
        Err(_) => into_event(cb.number(&text)),
    }
}

fn deliver_double<C: Callbacks>(raw: &[u8], cb: &mut C) -> Event {
    let text = number_text(raw);
    if cb.raw_numbers() {
        return into_event(cb.number(&text));
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => into_event(cb.double(v)),
        _ => into_event(cb.number(&text)),
    }
}
