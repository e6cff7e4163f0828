//! Colored terminal output on stderr.

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    ok: Style,
    warn: Style,
    err: Style,
    heading: Style,
    muted: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            err: Style::new().red(),
            heading: Style::new().cyan().bold(),
            muted: Style::new().dim(),
        }
    }

    fn styled(&self, style: &Style, msg: &str) {
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.styled(&self.ok, msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.styled(&self.warn, msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.styled(&self.err, msg);
    }

    /// Section heading (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        self.styled(&self.heading, msg);
    }

    /// Secondary detail such as request bodies (dim).
    pub(crate) fn detail(&self, msg: &str) {
        self.styled(&self.muted, msg);
    }

    pub(crate) fn separator(&self) {
        self.styled(&self.muted, &"-".repeat(60));
    }

    /// Ask a yes/no question; anything but `y`/`yes` is no.
    pub(crate) fn confirm(&self, question: &str) -> std::io::Result<bool> {
        self.term.write_str(&format!("{question} [y/N] "))?;
        let answer = self.term.read_line()?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}
