use dotenvy::dotenv;
use dropbox_stream_bot::config::Settings;
use dropbox_stream_bot::health;
use dropbox_stream_bot::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    dropbox_secret: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            dropbox_secret: Regex::new(
                r#"((?:refresh_token|access_token|client_secret|DROPBOX_REFRESH_TOKEN|DROPBOX_APP_SECRET)["']?\s*[:=]\s*["']?)[^\s"'&,}]+"#,
            )?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .dropbox_secret
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output = self.bearer.replace_all(&output, "$1[MASKED]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's byte count is reported even though redaction may change the length.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting the bot...");

    let settings = init_settings();

    // Liveness probe for the hosting platform, independent of the bot
    health::spawn(settings.port);

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "dropbox_stream_bot=info,teloxide=info,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,axum=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!(mode = ?s.bot_mode, "Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("FATAL ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RedactionPatterns;

    #[test]
    fn test_redacts_telegram_token_in_url() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let line = "GET https://api.telegram.org/bot1234567890:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw/getMe ";
        let redacted = patterns.redact(line);
        assert!(redacted.contains("/bot[TELEGRAM_TOKEN]/getMe"));
        assert!(!redacted.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"));
    }

    #[test]
    fn test_redacts_dropbox_secrets() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let cases = [
            (
                "grant_type=refresh_token&refresh_token=abcDEF123-xyz&client_id=k",
                "abcDEF123-xyz",
            ),
            (r#"{"access_token": "sl.B0abc-def", "token_type": "bearer"}"#, "sl.B0abc-def"),
            ("Authorization: Bearer sl.u.AbC_123", "sl.u.AbC_123"),
            ("DROPBOX_APP_SECRET=topsecret", "topsecret"),
        ];
        for (line, secret) in cases {
            let redacted = patterns.redact(line);
            assert!(!redacted.contains(secret), "{line} -> {redacted}");
            assert!(redacted.contains("[MASKED]"));
        }
    }

    #[test]
    fn test_leaves_plain_lines_alone() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let line = "Uploaded file to Dropbox path=/Telegram Videos/clip.mov size=42";
        assert_eq!(patterns.redact(line), line);
    }
}
