use crate::error::{HashBakerError, UserFriendlyError};
use crate::extractor::{ExtractionResult, ResultReporter};
use console::{style, Emoji, Term};

pub const BANNER: &str = concat!(
    "HashBaker v",
    env!("CARGO_PKG_VERSION"),
    " - protected file hash extractor"
);

static INFO: Emoji = Emoji("ℹ️  ", "i ");

/// Writes the stdout contract: the banner followed by exactly one result template.
/// Suggestions and other hints go to stderr.
pub struct OutputFormatter {
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        let use_colors = Term::stdout().features().colors_supported() && !quiet;

        Self {
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn banner(&self) -> String {
        if self.use_colors {
            style(BANNER).bold().cyan().to_string()
        } else {
            BANNER.to_string()
        }
    }

    pub fn format_result(&self, reporter: &ResultReporter, result: &ExtractionResult) -> String {
        let rendered = reporter.render(result);
        let (headline, detail) = rendered.split_once('\n').unwrap_or((rendered.as_str(), ""));

        let headline = match (self.use_colors, result.is_success()) {
            (false, _) => headline.to_string(),
            (true, true) => style(headline).green().bold().to_string(),
            (true, false) => style(headline).red().bold().to_string(),
        };

        format!("{}\n{}\n{}", self.banner(), headline, detail)
    }

    pub fn print_result(&self, reporter: &ResultReporter, result: &ExtractionResult) {
        println!("{}", self.format_result(reporter, result));

        if let Some(error) = result.error() {
            self.print_suggestion(error);
        }
    }

    /// Failures that happen before an extraction starts, such as a bad config file.
    pub fn print_startup_error(&self, error: HashBakerError) {
        let result = ExtractionResult::Failure { error };
        self.print_result(&ResultReporter::new(), &result);
    }

    fn print_suggestion(&self, error: &HashBakerError) {
        if self.quiet || self.verbose_level == 0 {
            return;
        }

        if let Some(suggestion) = error.suggestion() {
            if self.use_colors {
                eprintln!(
                    "{}{}",
                    INFO,
                    style(format!("Suggestion: {}", suggestion)).cyan()
                );
            } else {
                eprintln!("Suggestion: {}", suggestion);
            }
        }
    }
}
