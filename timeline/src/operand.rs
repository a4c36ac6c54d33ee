// operand.rs — Instruction classification and register operand extraction
//
// Classifies a retired instruction by opcode prefix into a closed set of
// instruction classes, then runs the operand strategy of that class to
// extract the destination register and the source registers.
//
// Preconditions: none; any text is accepted.
// Postconditions: returns an `OperandParse` whose operands are the longest
//                 well-formed prefix of the operand list.
// Failure modes: malformed operand text produces `OperandIssue` entries;
//                parsing never fails outright.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::lexer::{lex, Span, Token};

// ── Register names ──────────────────────────────────────────────────────────

/// An opaque register name. Equality is exact string match; `ft0` and `f0`
/// are unrelated names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RegName(String);

impl RegName {
    pub fn new(name: impl Into<String>) -> Self {
        RegName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegName {
    fn from(name: &str) -> Self {
        RegName::new(name)
    }
}

// ── Instruction classes ─────────────────────────────────────────────────────

/// Closed set of instruction classes. Each class owns one operand strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrClass {
    /// `rd, rs1, rs2|imm`: operand 1 written, the rest read.
    Arithmetic,
    /// `rd, offset(rs1)`: only the base register is read.
    IndexedLoad,
    /// `vd, rs1, vs2`: operand 1 written, the rest read. The accumulate
    /// read of `vd` is not reported.
    FusedMultiplyAccumulate,
    /// `rs1[, rs2], target`: nothing written, only `rs1` reported.
    ConditionalBranch,
    Unclassified,
}

impl InstrClass {
    pub const ALL: [InstrClass; 5] = [
        InstrClass::Arithmetic,
        InstrClass::IndexedLoad,
        InstrClass::FusedMultiplyAccumulate,
        InstrClass::ConditionalBranch,
        InstrClass::Unclassified,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InstrClass::Arithmetic => "arithmetic",
            InstrClass::IndexedLoad => "indexed_load",
            InstrClass::FusedMultiplyAccumulate => "fused_multiply_accumulate",
            InstrClass::ConditionalBranch => "conditional_branch",
            InstrClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for InstrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opcode prefixes, checked in order. The first matching prefix decides.
const CLASS_PREFIXES: &[(&str, InstrClass)] = &[
    ("add", InstrClass::Arithmetic),
    ("addi", InstrClass::Arithmetic),
    ("sub", InstrClass::Arithmetic),
    ("slli", InstrClass::Arithmetic),
    ("ori", InstrClass::Arithmetic),
    ("flw", InstrClass::IndexedLoad),
    ("vle32.v", InstrClass::IndexedLoad),
    ("vfmacc.vf", InstrClass::FusedMultiplyAccumulate),
    ("beqz", InstrClass::ConditionalBranch),
    ("bgeu", InstrClass::ConditionalBranch),
    ("bne", InstrClass::ConditionalBranch),
];

/// Classify an opcode (first word of the instruction text).
pub fn classify(opcode: &str) -> InstrClass {
    CLASS_PREFIXES
        .iter()
        .find(|(prefix, _)| opcode.starts_with(prefix))
        .map(|&(_, class)| class)
        .unwrap_or(InstrClass::Unclassified)
}

// ── Parse result ────────────────────────────────────────────────────────────

/// What went wrong in a malformed operand list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// An operand the class requires is absent.
    MissingOperand,
    /// Nothing between two commas, or a trailing comma.
    EmptyOperand,
    /// Two operands with no comma between them.
    MissingComma,
    /// A token that cannot appear at this position.
    UnexpectedToken,
    /// A load address without a `(reg)` part.
    MissingBaseRegister,
    UnmatchedParen,
    /// A character the lexer does not accept.
    BadCharacter,
}

/// A recovered operand problem, located in the instruction text.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandIssue {
    pub kind: IssueKind,
    pub span: Span,
    pub message: String,
}

/// Operands extracted from one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandParse {
    /// First word of the text; empty when the text has none.
    pub opcode: String,
    pub class: InstrClass,
    pub destination: Option<RegName>,
    /// Read registers in operand order, without duplicates.
    pub sources: Vec<RegName>,
    pub issues: Vec<OperandIssue>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Classify `text` and extract its register operands.
pub fn parse_operands(text: &str) -> OperandParse {
    let lexed = lex(text);
    let (opcode, opcode_end, rest) = match lexed.tokens.split_first() {
        Some(((Token::Word, span), rest)) => (span.slice(text), span.end, rest),
        _ => ("", 0, &lexed.tokens[..]),
    };
    let class = classify(opcode);

    let mut ctx = OperandCtx {
        source: text,
        destination: None,
        sources: Vec::new(),
        issues: Vec::new(),
    };

    if class != InstrClass::Unclassified {
        for err in &lexed.errors {
            ctx.issue(IssueKind::BadCharacter, err.span, err.message.clone());
        }
        let groups = split_operands(rest, opcode_end, text.len());
        let tail = Span {
            start: text.len(),
            end: text.len(),
        };
        match class {
            InstrClass::Arithmetic | InstrClass::FusedMultiplyAccumulate => {
                ctx.destination_and_sources(&groups, tail)
            }
            InstrClass::IndexedLoad => ctx.destination_and_base(&groups, tail),
            InstrClass::ConditionalBranch => ctx.first_source(&groups, tail),
            InstrClass::Unclassified => {}
        }
    }

    OperandParse {
        opcode: opcode.to_string(),
        class,
        destination: ctx.destination,
        sources: ctx.sources,
        issues: ctx.issues,
    }
}

// ── Operand groups ──────────────────────────────────────────────────────────

/// Tokens between two commas.
struct Group {
    tokens: Vec<(Token, Span)>,
    /// Text between the surrounding separators; used to locate empty groups.
    span: Span,
}

fn split_operands(tokens: &[(Token, Span)], start: usize, end: usize) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut group_start = start;
    for &(token, span) in tokens {
        if token == Token::Comma {
            groups.push(Group {
                tokens: std::mem::take(&mut current),
                span: Span {
                    start: group_start,
                    end: span.start,
                },
            });
            group_start = span.end;
        } else {
            current.push((token, span));
        }
    }
    if !current.is_empty() || !groups.is_empty() {
        groups.push(Group {
            tokens: current,
            span: Span {
                start: group_start,
                end,
            },
        });
    }
    groups
}

/// Outcome of reading one register operand.
enum Take {
    /// Well-formed; keep reading.
    Reg(RegName),
    /// A register followed by a malformation; keep it and stop.
    Last(RegName),
    /// Nothing usable; stop.
    Stop,
}

struct OperandCtx<'s> {
    source: &'s str,
    destination: Option<RegName>,
    sources: Vec<RegName>,
    issues: Vec<OperandIssue>,
}

impl<'s> OperandCtx<'s> {
    fn issue(&mut self, kind: IssueKind, span: Span, message: String) {
        self.issues.push(OperandIssue {
            kind,
            span,
            message,
        });
    }

    fn push_source(&mut self, reg: RegName) {
        if !self.sources.contains(&reg) {
            self.sources.push(reg);
        }
    }

    fn register(&mut self, group: &Group) -> Take {
        match group.tokens.as_slice() {
            [] => {
                self.issue(
                    IssueKind::EmptyOperand,
                    group.span,
                    "empty operand".to_string(),
                );
                Take::Stop
            }
            [(Token::Word, span)] => Take::Reg(RegName::new(span.slice(self.source))),
            [(Token::Word, span), (next, next_span), ..] => {
                let reg = RegName::new(span.slice(self.source));
                if *next == Token::Word {
                    self.issue(
                        IssueKind::MissingComma,
                        *next_span,
                        format!(
                            "missing ',' between '{}' and '{}'",
                            reg,
                            next_span.slice(self.source)
                        ),
                    );
                } else {
                    self.issue(
                        IssueKind::UnexpectedToken,
                        *next_span,
                        format!("unexpected '{}' after register '{}'", next, reg),
                    );
                }
                Take::Last(reg)
            }
            [(token, span), ..] => {
                self.issue(
                    IssueKind::UnexpectedToken,
                    *span,
                    format!("expected a register, found '{}'", token),
                );
                Take::Stop
            }
        }
    }

    /// Operand 1 is the destination. Returns false when extraction must stop.
    fn destination(&mut self, groups: &[Group], tail: Span) -> bool {
        let Some(first) = groups.first() else {
            self.issue(
                IssueKind::MissingOperand,
                tail,
                "missing destination operand".to_string(),
            );
            return false;
        };
        match self.register(first) {
            Take::Reg(reg) => {
                self.destination = Some(reg);
                true
            }
            Take::Last(reg) => {
                self.destination = Some(reg);
                false
            }
            Take::Stop => false,
        }
    }

    /// Arithmetic and fused multiply-accumulate: `rd, rs...`.
    fn destination_and_sources(&mut self, groups: &[Group], tail: Span) {
        if !self.destination(groups, tail) {
            return;
        }
        if groups.len() < 2 {
            self.issue(
                IssueKind::MissingOperand,
                tail,
                "missing source operands".to_string(),
            );
            return;
        }
        for group in &groups[1..] {
            match self.register(group) {
                Take::Reg(reg) => self.push_source(reg),
                Take::Last(reg) => {
                    self.push_source(reg);
                    return;
                }
                Take::Stop => return,
            }
        }
    }

    /// Indexed loads: `rd, offset(rs1)`. Operands past the address are ignored.
    fn destination_and_base(&mut self, groups: &[Group], tail: Span) {
        if !self.destination(groups, tail) {
            return;
        }
        let Some(address) = groups.get(1) else {
            self.issue(
                IssueKind::MissingOperand,
                tail,
                "missing 'offset(reg)' address operand".to_string(),
            );
            return;
        };
        if let Some(base) = self.base_register(address) {
            self.push_source(base);
        }
    }

    fn base_register(&mut self, group: &Group) -> Option<RegName> {
        let tokens = group.tokens.as_slice();
        let Some(open) = tokens.iter().position(|(t, _)| *t == Token::LParen) else {
            if let Some((_, span)) = tokens.iter().find(|(t, _)| *t == Token::RParen) {
                self.issue(
                    IssueKind::UnmatchedParen,
                    *span,
                    "')' without matching '('".to_string(),
                );
            } else {
                self.issue(
                    IssueKind::MissingBaseRegister,
                    group.span,
                    "address operand has no '(reg)' part".to_string(),
                );
            }
            return None;
        };
        let open_span = tokens[open].1;
        match &tokens[open + 1..] {
            [(Token::Word, span), (Token::RParen, _), rest @ ..] => {
                if let Some((token, extra)) = rest.first() {
                    self.issue(
                        IssueKind::UnexpectedToken,
                        *extra,
                        format!("unexpected '{}' after address operand", token),
                    );
                }
                Some(RegName::new(span.slice(self.source)))
            }
            [(Token::RParen, close), ..] => {
                self.issue(
                    IssueKind::EmptyOperand,
                    open_span.join(*close),
                    "empty base register".to_string(),
                );
                None
            }
            [] | [(Token::Word, _)] => {
                self.issue(
                    IssueKind::UnmatchedParen,
                    open_span,
                    "'(' without matching ')'".to_string(),
                );
                None
            }
            [_, (token, span), ..] | [(token, span), ..] => {
                self.issue(
                    IssueKind::UnexpectedToken,
                    *span,
                    format!("unexpected '{}' in base register", token),
                );
                None
            }
        }
    }

    /// Conditional branches: only the first operand is reported.
    fn first_source(&mut self, groups: &[Group], tail: Span) {
        let Some(first) = groups.first() else {
            self.issue(
                IssueKind::MissingOperand,
                tail,
                "missing compared register".to_string(),
            );
            return;
        };
        match self.register(first) {
            Take::Reg(reg) | Take::Last(reg) => self.push_source(reg),
            Take::Stop => {}
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
