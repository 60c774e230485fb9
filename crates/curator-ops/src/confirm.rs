//! Operator confirmation.

use std::io::{BufRead, Write};

use curator_core::{Operation, OperationKind};

/// An operator's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Apply this one.
    Yes,
    /// Apply everything remaining in this class without further prompts.
    YesToAll,
    /// Skip this one.
    No,
    /// Abandon this class and every later class.
    Cancel,
    /// Print details, then ask again.
    Show,
}

/// Source of confirmation decisions.
///
/// The executor asks once per action class and then, unless the class
/// answer was yes-to-all, once per item. [`Show`](Answer::Show) is handled
/// by the executor (it prints and re-asks), so implementations may return
/// it freely.
pub trait Confirmer {
    fn confirm_class(&mut self, kind: OperationKind, count: usize, bytes: u64) -> Answer;
    fn confirm_item(&mut self, op: &Operation) -> Answer;
}

/// Non-interactive confirmer: everything is approved.
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm_class(&mut self, _kind: OperationKind, _count: usize, _bytes: u64) -> Answer {
        Answer::YesToAll
    }

    fn confirm_item(&mut self, _op: &Operation) -> Answer {
        Answer::Yes
    }
}

/// Interactive confirmer reading `y / a / n / c / s` from standard input.
pub struct StdinConfirmer;

impl StdinConfirmer {
    fn ask(&self, prompt: &str) -> Answer {
        let stdin = std::io::stdin();
        loop {
            eprint!("{prompt} [y]es / yes-to-[a]ll / [n]o / [c]ancel / [s]how: ");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return Answer::Cancel;
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Answer::Yes,
                "a" | "all" => return Answer::YesToAll,
                "n" | "no" => return Answer::No,
                "c" | "cancel" => return Answer::Cancel,
                "s" | "show" => return Answer::Show,
                "" => return Answer::No,
                other => eprintln!("unrecognized answer '{other}'"),
            }
        }
    }
}

impl Confirmer for StdinConfirmer {
    fn confirm_class(&mut self, kind: OperationKind, count: usize, bytes: u64) -> Answer {
        self.ask(&format!(
            "{kind}: {count} operation(s), {bytes} bytes affected. Proceed?"
        ))
    }

    fn confirm_item(&mut self, op: &Operation) -> Answer {
        let prompt = match op.move_to() {
            Some(dest) => format!("{} -> {}", op.path().display(), dest.display()),
            None => op.path().display().to_string(),
        };
        self.ask(&prompt)
    }
}

/// Replays a fixed sequence of answers; used by tests and batch scripts.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    answers: std::vec::IntoIter<Answer>,
    /// Returned when the script runs out.
    pub fallback: Answer,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: answers.into_iter(),
            fallback: Answer::No,
        }
    }

    fn next(&mut self) -> Answer {
        self.answers.next().unwrap_or(self.fallback)
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm_class(&mut self, _kind: OperationKind, _count: usize, _bytes: u64) -> Answer {
        self.next()
    }

    fn confirm_item(&mut self, _op: &Operation) -> Answer {
        self.next()
    }
}
