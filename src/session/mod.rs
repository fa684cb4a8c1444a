//! Interactive feedback loop
//!
//! Architecture: Application Service - the session drives one conversation with a moderator
//! - Each turn screens a message, reports the outcome and asks for a verdict
//! - Verdicts become learning calls on the `Moderator`
//! - Rejected verdicts are reported and the turn ends without touching any store

use crate::domain::feedback::{answer_is, Correction};
use crate::domain::violations::{ModerationResult, Screening, ScreeningOutcome, Severity};
use crate::report::{OutputFormat, ReportFormatter};
use crate::Moderator;
use std::io::{BufRead, Write};

const SEPARATOR_WIDTH: usize = 50;

/// How a single turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnEnd {
    /// Feedback was asked for; a separator follows
    Reviewed,
    /// The message was cleared before, so the next prompt follows directly
    Skipped,
    /// Input closed while an answer was awaited
    InputClosed,
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Messages screened
    pub turns: usize,
    /// Examples added to the example store
    pub violations_learned: usize,
    /// Texts added to the non-violation store
    pub clearances_learned: usize,
    /// Feedback answers rejected as invalid
    pub rejected_feedback: usize,
}

impl SessionSummary {
    /// Format summary for display
    pub fn format_display(&self) -> String {
        format!(
            "📊 {} messages screened, {} violations learned, {} clearances learned, {} answers rejected",
            self.turns, self.violations_learned, self.clearances_learned, self.rejected_feedback
        )
    }
}

/// Line-oriented conversation over any reader and writer
pub struct FeedbackSession<'m, R, W> {
    moderator: &'m mut Moderator,
    input: R,
    output: W,
    formatter: ReportFormatter,
    summary: SessionSummary,
}

impl<'m, R: BufRead, W: Write> FeedbackSession<'m, R, W> {
    /// Create a session reading answers from `input`
    pub fn new(moderator: &'m mut Moderator, input: R, output: W) -> Self {
        Self {
            moderator,
            input,
            output,
            formatter: ReportFormatter::default(),
            summary: SessionSummary::default(),
        }
    }

    /// Use a custom formatter for session output
    pub fn with_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Run until the exit keyword or end of input
    pub fn run(mut self) -> ModerationResult<SessionSummary> {
        writeln!(self.output, "\n🤖 Moderation assistant is ready.")?;
        writeln!(
            self.output,
            "Type '{}' to quit.\n",
            self.moderator.config().session.exit_keyword
        )?;

        loop {
            let Some(line) = self.prompt("👤 User: ")? else {
                tracing::debug!("Input closed; ending session");
                break;
            };

            let raw = line.trim();
            if self.moderator.config().is_exit(raw) {
                writeln!(self.output, "👋 Goodbye!")?;
                break;
            }
            if raw.is_empty() {
                continue;
            }

            match self.turn(raw)? {
                TurnEnd::Reviewed => {
                    writeln!(self.output, "\n{}\n", "-".repeat(SEPARATOR_WIDTH))?
                }
                TurnEnd::Skipped => {}
                TurnEnd::InputClosed => break,
            }
        }

        tracing::info!("{}", self.summary.format_display());
        Ok(self.summary)
    }

    /// Screen one message and collect feedback
    fn turn(&mut self, raw: &str) -> ModerationResult<TurnEnd> {
        let screening = self.moderator.screen(raw)?;
        self.summary.turns += 1;
        self.formatter.write_screening(&screening, OutputFormat::Human, &mut self.output)?;

        let answered = match &screening.outcome {
            ScreeningOutcome::Cleared => return Ok(TurnEnd::Skipped),
            ScreeningOutcome::NoMatch { .. } => self.review_missed(&screening)?,
            ScreeningOutcome::Matched(_) => self.review_warning(&screening)?,
        };
        Ok(if answered { TurnEnd::Reviewed } else { TurnEnd::InputClosed })
    }

    fn review_missed(&mut self, screening: &Screening) -> ModerationResult<bool> {
        let Some(answer) = self.prompt("❓ Does this message actually violate the rules? (y/n): ")?
        else {
            return Ok(false);
        };

        if !answer_is(&answer, "y") {
            self.clear(&screening.expanded)?;
            return Ok(true);
        }

        let Some(level) = self.prompt("👉 Enter the correct level (1-5): ")? else {
            return Ok(false);
        };
        match Severity::parse_level(&level) {
            Ok(severity) => self.learn(&screening.expanded, severity)?,
            Err(e) => self.reject(&format!("{e}; expected a level from 1 to 5"))?,
        }
        Ok(true)
    }

    fn review_warning(&mut self, screening: &Screening) -> ModerationResult<bool> {
        let Some(answer) = self.prompt("🤔 Is this warning correct? (y/n): ")? else {
            return Ok(false);
        };

        if !answer_is(&answer, "n") {
            return Ok(true);
        }

        let Some(level) =
            self.prompt("👉 Enter the correct level (1-5), or 0 if it is NOT a violation: ")?
        else {
            return Ok(false);
        };
        match Correction::parse(&level) {
            Ok(Correction::NotViolation) => self.clear(&screening.expanded)?,
            Ok(Correction::Violation(severity)) => self.learn(&screening.expanded, severity)?,
            Err(e) => self.reject(&e.to_string())?,
        }
        Ok(true)
    }

    fn learn(&mut self, text: &str, severity: Severity) -> ModerationResult<()> {
        self.moderator.learn_violation(text, severity)?;
        self.summary.violations_learned += 1;
        writeln!(
            self.output,
            "{}",
            self.formatter.learned_notice(&format!("Learned a new violation example ({severity})."))
        )?;
        Ok(())
    }

    fn clear(&mut self, text: &str) -> ModerationResult<()> {
        if self.moderator.learn_non_violation(text)? {
            self.summary.clearances_learned += 1;
            writeln!(
                self.output,
                "{}",
                self.formatter.learned_notice("Learned that this message is acceptable.")
            )?;
        } else {
            writeln!(self.output, "ℹ️  This message was already marked as acceptable.")?;
        }
        Ok(())
    }

    fn reject(&mut self, message: &str) -> ModerationResult<()> {
        self.summary.rejected_feedback += 1;
        writeln!(self.output, "{}", self.formatter.error_notice(message))?;
        Ok(())
    }

    /// Print `prompt` and read one line; `None` at end of input
    fn prompt(&mut self, prompt: &str) -> ModerationResult<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
