use regex::Regex;
use std::borrow::Cow;
use std::io;
use std::sync::LazyLock;
use tracing_subscriber::fmt::MakeWriter;

// OpenAI keys: sk-..., sk-proj-...
static API_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9_\-]{16,}").expect("static pattern"));

static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-_\.~+/]+=*").expect("static pattern"));

// Google OAuth access (ya29.) and refresh (1//) tokens
static GOOGLE_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:ya29\.[A-Za-z0-9_\-\.]+|1//[A-Za-z0-9_\-]{10,})").expect("static pattern")
});

static TOKEN_FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\b(?:api_key|apikey|access_token|refresh_token|client_secret|token|secret|_sid)["']?\s*[:=]\s*)["']?[^"'\s,&}]+["']?"#,
    )
    .expect("static pattern")
});

static PASSWORD_FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\b(?:password|passwd|pass)["']?\s*[:=]\s*)["']?[^"'\s,&}]+["']?"#)
        .expect("static pattern")
});

/// Redact credentials from a log line.
///
/// Returns the input unchanged (borrowed) when nothing matched.
pub fn scrub_secrets(message: &str) -> Cow<'_, str> {
    let mut scrubbed = Cow::Borrowed(message);

    for (pattern, replacement) in [
        (&*API_KEY_PATTERN, "[API_KEY_REDACTED]"),
        (&*BEARER_PATTERN, "Bearer [TOKEN_REDACTED]"),
        (&*GOOGLE_TOKEN_PATTERN, "[TOKEN_REDACTED]"),
        (&*TOKEN_FIELD_PATTERN, "${1}[REDACTED]"),
        (&*PASSWORD_FIELD_PATTERN, "${1}[REDACTED]"),
    ] {
        let replaced = match pattern.replace_all(&scrubbed, replacement) {
            Cow::Owned(replaced) => Some(replaced),
            Cow::Borrowed(_) => None,
        };
        if let Some(replaced) = replaced {
            scrubbed = Cow::Owned(replaced);
        }
    }

    scrubbed
}

/// `MakeWriter` wrapper that scrubs every formatted event before it
/// reaches the underlying writer.
#[derive(Debug, Clone)]
pub struct ScrubbingMakeWriter<M> {
    inner: M,
}

impl<M> ScrubbingMakeWriter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for ScrubbingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = ScrubbingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ScrubbingWriter {
            inner: self.inner.make_writer(),
        }
    }
}

/// Writer produced by [`ScrubbingMakeWriter`]
#[derive(Debug)]
pub struct ScrubbingWriter<W> {
    inner: W,
}

impl<W: io::Write> io::Write for ScrubbingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(scrub_secrets(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
