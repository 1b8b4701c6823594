use std::collections::VecDeque;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::errors::{OffboardError, Result};

/// Where operator input lines come from.
#[allow(async_fn_in_trait)]
pub trait LineSource {
    /// The next line, or `None` when the operator is done (end of input or
    /// interrupt).
    async fn next_line(&mut self, prompt: &str) -> Option<String>;
}

/// Interactive terminal input with in-memory history.
///
/// Reading blocks the calling worker, so this needs the multi-threaded tokio
/// runtime.
pub struct Terminal {
    editor: DefaultEditor
}

impl Terminal {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| OffboardError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(Self { editor })
    }
}

impl LineSource for Terminal {
    async fn next_line(&mut self, prompt: &str) -> Option<String> {
        // rustyline blocks, keep it off the other tasks' workers
        let readline = tokio::task::block_in_place(|| self.editor.readline(prompt));
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Some(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => None,
            Err(err) => {
                log::error!("unhandled terminal error: {err:?}");
                None
            }
        }
    }
}

/// Input lines known up front.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedInput {
    async fn next_line(&mut self, prompt: &str) -> Option<String> {
        let line = self.lines.pop_front()?;
        println!("{prompt}{line}");
        Some(line)
    }
}
