use strum::AsRefStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NonFatalFailure,
    FatalFailure,
}

impl OutcomeKind {
    /// Integer code used on the wire.
    pub fn code(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::NonFatalFailure => 1,
            Self::FatalFailure => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::NonFatalFailure),
            2 => Some(Self::FatalFailure),
            _ => None,
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Both failure kinds read the same in a report.
    pub fn label(self) -> &'static str {
        if self.is_failure() {
            "Failure"
        } else {
            "Success"
        }
    }
}

/// One evaluated assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    kind: OutcomeKind,
    file: String,
    line: u32,
    message: String,
}

impl OutcomeRecord {
    pub fn new(
        kind: OutcomeKind,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_failure(&self) -> bool {
        self.kind.is_failure()
    }
}
