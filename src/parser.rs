use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::lexer::{Lexeme, Lexer};
use std::io::BufRead;
use std::mem;

/// Sink for recoverable parser findings. Malformed declarations are counted
/// and logged here instead of failing the ingestion pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: u64,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of malformed declarations reported so far.
    #[must_use]
    pub fn warning_count(&self) -> u64 {
        self.warnings
    }

    fn report(&mut self, msg: &str) {
        log::warn!("{msg}");
        self.warnings += 1;
    }
}

/// A well-formed declaration: the subject page, its optional redirect target
/// and the pages its body links to, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub subject: Vec<u8>,
    pub redirect: Option<Vec<u8>>,
    pub links: Vec<Vec<u8>>,
}

impl Declaration {
    /// Whether the subject counts as a declared page. Redirect-only
    /// declarations leave their subject undeclared.
    #[must_use]
    pub fn declares_subject(&self) -> bool {
        self.redirect.is_none() || !self.links.is_empty()
    }
}

/// Parser state between lexemes. `AwaitSubject` and `AwaitRedirectTarget`
/// are handled inline (they consume the very next lexeme), so the fields
/// below carry the remaining states: empty subject is `Idle`, a subject
/// without body content is `AwaitBody`, anything after that is `InBody`.
#[derive(Debug, Default)]
struct Current {
    subject: Vec<u8>,
    links: Vec<Vec<u8>>,
    redirect: Vec<u8>,
}

impl Current {
    fn is_empty(&self) -> bool {
        self.subject.is_empty() && self.links.is_empty() && self.redirect.is_empty()
    }

    fn clear(&mut self) {
        self.subject.clear();
        self.links.clear();
        self.redirect.clear();
    }
}

/// Parse a declaration stream, feeding each completed declaration to `emit`.
///
/// The parser is lenient: a `*` before the previous declaration terminated
/// resets it with a warning, a missing subject skips the rule, a missing
/// redirect target retries on `->` and aborts the declaration on `;`, and an
/// empty subject at `;` is reported and discarded. Only lexical errors, I/O
/// errors and a `*` followed by neither a name nor `=` are fatal.
pub fn parse_declarations<R, F>(input: R, diagnostics: &mut Diagnostics, mut emit: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(Declaration) -> Result<()>,
{
    let mut lexer = Lexer::new(input);
    let mut current = Current::default();

    while let Some(lexeme) = lexer.next_lexeme()? {
        match lexeme {
            Lexeme::StartRule => {
                if !current.is_empty() {
                    diagnostics.report(&format!(
                        "declaration not terminated before a new one on line {}",
                        lexer.lines_read()
                    ));
                    current.clear();
                }
                match lexer.next_lexeme()? {
                    Some(Lexeme::Name(name)) => current.subject = name,
                    Some(Lexeme::Equal) => {
                        diagnostics.report(&format!(
                            "skipping declaration with empty subject on line {}",
                            lexer.lines_read()
                        ));
                        while let Some(lexeme) = lexer.next_lexeme()? {
                            if lexeme == Lexeme::EndRule {
                                break;
                            }
                        }
                    }
                    _ => {
                        return Err(Error::Parse(format!(
                            "link source expected after '*' on line {}",
                            lexer.lines_read()
                        )));
                    }
                }
            }
            Lexeme::Name(name) => current.links.push(name),
            Lexeme::Equal => {}
            Lexeme::Redirect => loop {
                match lexer.next_lexeme()? {
                    Some(Lexeme::Name(name)) => {
                        current.redirect = name;
                        break;
                    }
                    // The target may follow a later arrow; retry.
                    Some(Lexeme::Redirect) => {}
                    // Terminator without a target: drop the whole declaration.
                    Some(Lexeme::EndRule) => {
                        current.clear();
                        break;
                    }
                    Some(_) => {
                        diagnostics.report(&format!(
                            "redirect target expected after '->' on line {}",
                            lexer.lines_read()
                        ));
                        current.redirect.clear();
                        break;
                    }
                    None => break,
                }
            },
            Lexeme::EndRule => {
                if current.subject.is_empty() {
                    diagnostics.report(&format!(
                        "empty declaration found on line {}",
                        lexer.lines_read()
                    ));
                    current.clear();
                } else {
                    let declaration = Declaration {
                        subject: mem::take(&mut current.subject),
                        redirect: if current.redirect.is_empty() {
                            None
                        } else {
                            Some(mem::take(&mut current.redirect))
                        },
                        links: mem::take(&mut current.links),
                    };
                    emit(declaration)?;
                }
            }
        }
    }
    // End of input inside a declaration: the partial declaration is dropped.
    Ok(())
}

impl Graph {
    /// Ingest a declaration stream into the graph. Subjects are interned
    /// first, then redirect targets, then link targets in source order, so
    /// page ids are stable for a given input.
    pub fn ingest<R: BufRead>(&mut self, input: R, diagnostics: &mut Diagnostics) -> Result<()> {
        parse_declarations(input, diagnostics, |declaration| {
            let subject = self.get_or_create(&declaration.subject, declaration.declares_subject());
            if let Some(target) = &declaration.redirect {
                let target = self.get_or_create(target, false);
                self.define_redirect(subject, target)?;
            }
            for link in &declaration.links {
                let target = self.get_or_create(link, false);
                self.add_link(subject, target, 1)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_declarations, Declaration, Diagnostics};
    use crate::error::Error;

    fn parse(input: &[u8]) -> (Vec<Declaration>, u64) {
        let mut diagnostics = Diagnostics::new();
        let mut declarations = Vec::new();
        parse_declarations(input, &mut diagnostics, |declaration| {
            declarations.push(declaration);
            Ok(())
        })
        .unwrap();
        (declarations, diagnostics.warning_count())
    }

    fn decl(subject: &[u8], redirect: Option<&[u8]>, links: &[&[u8]]) -> Declaration {
        Declaration {
            subject: subject.to_vec(),
            redirect: redirect.map(<[u8]>::to_vec),
            links: links.iter().map(|l| l.to_vec()).collect(),
        }
    }

    #[test]
    fn plain_declarations() {
        let (declarations, warnings) = parse(b"*A = B C ;\n*B = ;\n");
        assert_eq!(
            declarations,
            vec![decl(b"A", None, &[b"B", b"C"]), decl(b"B", None, &[])]
        );
        assert_eq!(warnings, 0);
    }

    #[test]
    fn redirect_and_links_in_one_declaration() {
        let (declarations, _) = parse(b"*A = -> B C D ;");
        assert_eq!(declarations, vec![decl(b"A", Some(b"B"), &[b"C", b"D"])]);
    }

    #[test]
    fn unterminated_declaration_is_reset_with_a_warning() {
        let (declarations, warnings) = parse(b"*A = B *C = D ;");
        assert_eq!(declarations, vec![decl(b"C", None, &[b"D"])]);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn empty_subject_rule_is_skipped_with_a_warning() {
        let (declarations, warnings) = parse(b"* = X Y ;\n*A = B ;\n");
        assert_eq!(declarations, vec![decl(b"A", None, &[b"B"])]);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn empty_declaration_at_terminator_is_discarded() {
        let (declarations, warnings) = parse(b"; X Y ; *A = B ;");
        assert_eq!(declarations, vec![decl(b"A", None, &[b"B"])]);
        assert_eq!(warnings, 2);
    }

    #[test]
    fn double_arrow_retries_against_the_next_token() {
        let (declarations, warnings) = parse(b"*A = -> -> B ;");
        assert_eq!(declarations, vec![decl(b"A", Some(b"B"), &[])]);
        assert_eq!(warnings, 0);
    }

    #[test]
    fn arrow_before_terminator_aborts_the_declaration_silently() {
        let (declarations, warnings) = parse(b"*A = B -> ;\n*C = D ;\n");
        assert_eq!(declarations, vec![decl(b"C", None, &[b"D"])]);
        assert_eq!(warnings, 0);
    }

    #[test]
    fn arrow_before_equal_swallows_it_with_a_warning() {
        let (declarations, warnings) = parse(b"*A = -> = B ;");
        assert_eq!(declarations, vec![decl(b"A", None, &[b"B"])]);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn later_redirect_target_wins() {
        let (declarations, _) = parse(b"*A = -> B -> C ;");
        assert_eq!(declarations, vec![decl(b"A", Some(b"C"), &[])]);
    }

    #[test]
    fn end_of_input_discards_partial_declaration() {
        let (declarations, warnings) = parse(b"*A = B ;\n*C = D");
        assert_eq!(declarations, vec![decl(b"A", None, &[b"B"])]);
        assert_eq!(warnings, 0);
    }

    #[test]
    fn end_of_input_after_arrow_terminates() {
        let (declarations, _) = parse(b"*A = ->");
        assert_eq!(declarations, vec![]);
    }

    #[test]
    fn start_rule_without_subject_or_equal_is_fatal() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_declarations(&b"* ;"[..], &mut diagnostics, |_| Ok(()));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn redirect_only_declaration_does_not_declare_subject() {
        let (declarations, _) = parse(b"*A = -> B ;");
        assert!(!declarations[0].declares_subject());
        let (declarations, _) = parse(b"*A = ;");
        assert!(declarations[0].declares_subject());
        let (declarations, _) = parse(b"*A = -> B C ;");
        assert!(declarations[0].declares_subject());
    }
}
