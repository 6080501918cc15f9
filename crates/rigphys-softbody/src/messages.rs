//! Per-vehicle build log. Reference errors in a definition skip the
//! offending declaration and land here instead of aborting the build;
//! the caller inspects the log afterwards.

use tracing::{error, info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
    InternalError,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self { Self::default() }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(target: "rig_build", "{text}");
        self.messages.push(Message { kind: MessageKind::Info, text });
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(target: "rig_build", "{text}");
        self.messages.push(Message { kind: MessageKind::Warning, text });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!(target: "rig_build", "{text}");
        self.messages.push(Message { kind: MessageKind::Error, text });
    }

    pub fn internal_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!(target: "rig_build", "internal: {text}");
        self.messages.push(Message { kind: MessageKind::InternalError, text });
    }

    pub fn messages(&self) -> &[Message] { &self.messages }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|m| m.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| {
            m.kind == MessageKind::Error || m.kind == MessageKind::InternalError
        })
    }
}
