//! How much decoration the terminal gets

use console::Term;

/// Variables set by the CI systems we care about
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
    "BUILDKITE",
];

/// Output settings for one command run
#[derive(Debug, Clone, Copy, Default)]
pub struct UiContext {
    fancy: bool,
    quiet: bool,
}

impl UiContext {
    /// Spinners and symbols when stderr is a terminal outside CI
    pub fn detect() -> Self {
        let in_ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            fancy: Term::stderr().is_term() && !in_ci,
            quiet: false,
        }
    }

    /// Plain line-oriented output
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn is_fancy(&self) -> bool {
        self.fancy
    }

    /// Warnings are suppressed
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
