//! Streams enriched messages into a standalone HTML page.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use tracing::debug;

use crate::core::models::{EnrichedMessage, ResolvedUser};
use crate::errors::ArchiveError;
use crate::text::escape_html;

pub const UNKNOWN_USER: &str = "Unknown user";

const HEADER: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Slack Message History</title>
        <style media="screen">
            body {
                font-family: Arial, Helvetica, sans-serif;
                font-size: 18px;
                height: 100vh;
                margin: 0;
                padding: 0;
                width: 100vw;
            }

            .container, .message, .content {
                box-sizing: border-box;
                display: flex;
            }

            .container {
                flex-direction: column;
                padding: 3% 5%;
                width: 100%;
            }

            .message {
                flex-direction: row;
                padding-bottom: 30px;
                width: 70%;
            }

            .avatar {
                height: 60px;
                width: 60px;
            }

            .content {
                flex-direction: column;
                padding-left: 20px;
            }

            .top {
                padding-bottom: 5px;
            }

            a, .tag {
                color: #0074D9;
                text-decoration: underline;
            }

            .name {
                font-weight: bold;
            }

            .unresolved {
                font-style: italic;
            }

            .time {
                color: #777777;
            }
        </style>
    </head>
    <body>
        <main class="container">
"#;

const FOOTER: &str = "        </main>
    </body>
</html>
";

/// Order of messages in the output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderOrder {
    /// As delivered by the API: newest message first.
    #[default]
    AsRetrieved,
    /// Oldest message first.
    Chronological,
}

impl FromStr for RenderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "as-retrieved" | "newest-first" => Ok(RenderOrder::AsRetrieved),
            "chronological" | "oldest-first" => Ok(RenderOrder::Chronological),
            other => Err(format!(
                "unknown order {other:?} (expected \"as-retrieved\" or \"chronological\")"
            )),
        }
    }
}

impl fmt::Display for RenderOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderOrder::AsRetrieved => write!(f, "as-retrieved"),
            RenderOrder::Chronological => write!(f, "chronological"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    order: RenderOrder,
}

impl Renderer {
    #[must_use]
    pub fn new(order: RenderOrder) -> Self {
        Self { order }
    }

    #[must_use]
    pub fn order(&self) -> RenderOrder {
        self.order
    }

    /// Write the whole document to `sink`, one message at a time.
    ///
    /// `messages` yields messages in retrieval order and is consumed lazily,
    /// forwards or backwards depending on the configured [`RenderOrder`].
    /// The first `Err` it yields stops the document.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the sink rejects a write, or the first error
    /// yielded by `messages`.
    pub fn render<W, I>(&self, messages: I, mut sink: W) -> Result<(), ArchiveError>
    where
        W: Write,
        I: IntoIterator<Item = Result<EnrichedMessage, ArchiveError>>,
        I::IntoIter: DoubleEndedIterator,
    {
        sink.write_all(HEADER.as_bytes())?;

        let messages = messages.into_iter();
        let written = match self.order {
            RenderOrder::AsRetrieved => write_messages(&mut sink, messages)?,
            RenderOrder::Chronological => write_messages(&mut sink, messages.rev())?,
        };
        debug!("Rendered {} messages", written);

        sink.write_all(FOOTER.as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

fn write_messages<W, I>(sink: &mut W, messages: I) -> Result<usize, ArchiveError>
where
    W: Write,
    I: Iterator<Item = Result<EnrichedMessage, ArchiveError>>,
{
    let mut written = 0;
    for message in messages {
        write_fragment(sink, &message?)?;
        written += 1;
    }
    Ok(written)
}

fn write_fragment<W: Write>(sink: &mut W, message: &EnrichedMessage) -> std::io::Result<()> {
    let avatar = message.user.avatar().unwrap_or_default();
    let name = author_label(&message.user);
    let name_class = if message.user.is_resolved() {
        "name"
    } else {
        "name unresolved"
    };

    write!(
        sink,
        r#"            <article class="message">
                <img class="avatar" src="{avatar}" alt="{name}">
                <section class="content">
                    <header class="top">
                        <span class="{name_class}">{name}</span>&nbsp;&nbsp;<time class="time">{time}</time>
                    </header>
                    <main>
                        {text}
                    </main>
                </section>
            </article>
"#,
        avatar = escape_html(avatar),
        name = escape_html(&name),
        time = message.time,
        text = message.text,
    )
}

/// Name shown for an author; unresolved authors get a placeholder.
#[must_use]
pub fn author_label(user: &ResolvedUser) -> String {
    match (user.display_name(), user) {
        (Some(name), _) => name.to_string(),
        (None, ResolvedUser::Unresolved { referenced_id: Some(id) }) => format!("{UNKNOWN_USER} ({id})"),
        (None, _) => UNKNOWN_USER.to_string(),
    }
}
