//! Streaming parser for `<boltAction>` blocks.
//!
//! ```text
//! <boltArtifact id="todo" title="Todo app">
//!   <boltAction type="file" filePath="src/App.tsx">
//!   ...file content...
//!   </boltAction>
//!   <boltAction type="shell">
//!   npm install && npm run dev
//!   </boltAction>
//! </boltArtifact>
//! ```
//!
//! The parser is a two-state machine (scanning, action open) over a growing
//! buffer with an explicit cursor. Text behind the cursor is never examined
//! again. A complete action is handed to the dispatch callback, then the
//! buffer is drained through its closing marker.
//!
//! Lexical rules:
//! - an opening marker is `<boltAction` followed by whitespace or `>`, ending
//!   at the first `>` outside a quoted attribute value; it never spans lines
//! - `type` is `file` (needs `filePath`, or its alias `path`) or `shell`
//! - if the rest of the opening line is blank the body starts on the next
//!   line, otherwise right after the `>`
//! - one trailing line break before `</boltAction>` is not part of the body
//! - malformed openings are skipped through their `>`; closing markers with
//!   no open action are skipped

use bolty_core::Action;
use tracing::{debug, warn};

use crate::attributes::{self, TagEnd};

const OPEN: &str = "<boltAction";
const CLOSE: &str = "</boltAction>";

/// Longest opening tag accepted, in bytes.
const MAX_TAG_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Header {
    File { path: String },
    Shell,
}

#[derive(Debug)]
enum State {
    Scanning,
    /// An opening tag was accepted; waiting for `</boltAction>`.
    ActionOpen {
        header: Header,
        /// Byte offset just past the opening tag's `>`
        body_start: usize,
    },
}

/// An action whose closing marker never arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unfinished {
    /// "file" or "shell"
    pub kind: &'static str,
    pub path: Option<String>,
    /// Body bytes received before the stream ended
    pub received_bytes: usize,
}

#[derive(Debug)]
pub struct ArtifactParser {
    buffer: String,
    cursor: usize,
    state: State,
    dispatched: usize,
}

impl Default for ArtifactParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            state: State::Scanning,
            dispatched: 0,
        }
    }

    /// Append a chunk and dispatch every action it completes, in order.
    /// Returns how many actions this chunk completed.
    pub fn push(&mut self, chunk: &str, mut dispatch: impl FnMut(Action)) -> usize {
        self.buffer.push_str(chunk);
        let mut emitted = 0;
        while let Some(action) = self.advance() {
            debug!(action = %action, "Action complete");
            dispatch(action);
            emitted += 1;
        }
        self.dispatched += emitted;
        emitted
    }

    /// `push` that collects the completed actions.
    pub fn feed(&mut self, chunk: &str) -> Vec<Action> {
        let mut actions = Vec::new();
        self.push(chunk, |a| actions.push(a));
        actions
    }

    /// End of stream. An action still open is dropped and reported.
    pub fn finish(&mut self) -> Option<Unfinished> {
        let unfinished = match &self.state {
            State::Scanning => {
                let rest = &self.buffer[self.cursor..];
                if rest.starts_with(OPEN) {
                    warn!(
                        tag = %rest.lines().next().unwrap_or_default(),
                        "Stream ended inside an opening tag; dropping it"
                    );
                }
                None
            }
            State::ActionOpen { header, body_start } => {
                let (kind, path) = match header {
                    Header::File { path } => ("file", Some(path.clone())),
                    Header::Shell => ("shell", None),
                };
                let unfinished = Unfinished {
                    kind,
                    path,
                    received_bytes: self.buffer.len().saturating_sub(*body_start),
                };
                warn!(
                    kind = unfinished.kind,
                    path = ?unfinished.path,
                    received_bytes = unfinished.received_bytes,
                    "Stream ended inside an action; dropping it"
                );
                Some(unfinished)
            }
        };
        self.buffer.clear();
        self.cursor = 0;
        self.state = State::Scanning;
        unfinished
    }

    /// Text received but not yet consumed by a dispatched action.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Whether an opening marker is waiting for its closing marker.
    pub fn is_action_open(&self) -> bool {
        matches!(self.state, State::ActionOpen { .. })
    }

    /// Total actions dispatched by this parser.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Run the state machine until it needs more input or completes an action.
    fn advance(&mut self) -> Option<Action> {
        loop {
            if self.is_action_open() {
                return self.close();
            }
            self.scan()?;
        }
    }

    /// Move the cursor past the next marker or stretch of prose. `None`
    /// means more input is needed before anything else can be decided.
    fn scan(&mut self) -> Option<()> {
        let rel = match self.buffer[self.cursor..].find('<') {
            Some(rel) => rel,
            None => {
                self.cursor = self.buffer.len();
                return None;
            }
        };
        let lt = self.cursor + rel;
        let rest = &self.buffer[lt..];

        if let Some(after) = rest.strip_prefix(OPEN) {
            match after.chars().next() {
                None => {
                    self.cursor = lt;
                    return None;
                }
                Some(c) if c.is_whitespace() || c == '>' => {}
                Some(_) => {
                    // e.g. `<boltActions`
                    self.cursor = lt + 1;
                    return Some(());
                }
            }

            let attrs_start = lt + OPEN.len();
            match attributes::find_tag_end(&self.buffer[attrs_start..], MAX_TAG_LEN) {
                TagEnd::Incomplete => {
                    self.cursor = lt;
                    return None;
                }
                TagEnd::TooLong => {
                    warn!(offset = lt, "Opening tag never terminated; skipping it");
                    self.cursor = lt + 1;
                }
                TagEnd::Malformed => {
                    let line = self.buffer[lt..].lines().next().unwrap_or_default();
                    warn!(tag = %line, "Opening tag broken by a line break; skipping it");
                    self.cursor = lt + 1;
                }
                TagEnd::At(rel_end) => {
                    let tag_end = attrs_start + rel_end + 1;
                    let attrs = &self.buffer[attrs_start..attrs_start + rel_end];
                    match Self::header(attrs) {
                        Ok(header) => {
                            debug!(header = ?header, "Action opened");
                            self.state = State::ActionOpen {
                                header,
                                body_start: tag_end,
                            };
                        }
                        Err(reason) => {
                            warn!(tag = %&self.buffer[lt..tag_end], reason, "Skipping malformed action tag");
                        }
                    }
                    self.cursor = tag_end;
                }
            }
            return Some(());
        }

        if rest.starts_with(CLOSE) {
            debug!(offset = lt, "Skipping unmatched closing tag");
            self.cursor = lt + CLOSE.len();
            return Some(());
        }

        if OPEN.starts_with(rest) || CLOSE.starts_with(rest) {
            // could still become a marker
            self.cursor = lt;
            return None;
        }

        self.cursor = lt + 1;
        Some(())
    }

    /// Complete the open action if its closing marker has arrived.
    fn close(&mut self) -> Option<Action> {
        let State::ActionOpen { header, body_start } = &self.state else {
            return None;
        };
        let body_start = *body_start;

        let Some(rel) = self.buffer[self.cursor..].find(CLOSE) else {
            // keep enough tail to catch a marker split across chunks
            let mut resume = self.buffer.len().saturating_sub(CLOSE.len() - 1).max(self.cursor);
            while !self.buffer.is_char_boundary(resume) {
                resume -= 1;
            }
            self.cursor = resume;
            return None;
        };
        let close = self.cursor + rel;
        let body = Self::body(&self.buffer[body_start..close]);

        let action = match header {
            Header::File { path } => Some(Action::file(path.clone(), body)),
            Header::Shell if body.trim().is_empty() => {
                warn!("Skipping shell action with empty command");
                None
            }
            Header::Shell => Some(Action::shell(body)),
        };

        self.buffer.drain(..close + CLOSE.len());
        self.cursor = 0;
        self.state = State::Scanning;

        match action {
            Some(action) => Some(action),
            None => self.advance(),
        }
    }

    fn header(attrs: &str) -> Result<Header, &'static str> {
        let attrs = attributes::parse(attrs);
        let get = |name: &str| {
            attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        match get("type") {
            Some("file") => match get("filePath").or_else(|| get("path")) {
                Some(path) if !path.trim().is_empty() => Ok(Header::File {
                    path: path.trim().to_string(),
                }),
                _ => Err("file action without filePath"),
            },
            Some("shell") => Ok(Header::Shell),
            Some(_) => Err("unknown action type"),
            None => Err("action without type"),
        }
    }

    /// Body text between the opening tag and the closing marker.
    fn body(region: &str) -> String {
        let body = match region.find('\n') {
            Some(nl) if region[..nl].trim().is_empty() => &region[nl + 1..],
            _ => region,
        };
        let body = body
            .strip_suffix("\r\n")
            .or_else(|| body.strip_suffix('\n'))
            .unwrap_or(body);
        body.to_string()
    }
}
