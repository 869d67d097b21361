//! What the display shows for the current tick

/// Conversation activity shown next to the question/answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Ready,
    Listening,
    Thinking,
    Speaking,
    Waiting,
}

impl Activity {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Listening => "Listening...",
            Self::Thinking => "Thinking...",
            Self::Speaking => "Speaking...",
            Self::Waiting => "Please wait...",
        }
    }
}

/// Render instruction produced by every session tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    AwaitingWake,
    Identifying,
    Greeting {
        name: String,
    },
    Conversing {
        activity: Activity,
        question: Option<String>,
        answer: Option<String>,
    },
}

impl Overlay {
    /// Text lines to draw over the frame
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::AwaitingWake => vec!["Say the wake phrase to begin".to_string()],
            Self::Identifying => vec!["Looking for a face...".to_string()],
            Self::Greeting { name } => vec![
                format!("Welcome, {name}!"),
                "ADA system is ready".to_string(),
            ],
            Self::Conversing {
                activity,
                question,
                answer,
            } => {
                let mut lines = vec![activity.label().to_string()];
                if let Some(question) = question {
                    lines.push(format!("Q: {question}"));
                }
                if let Some(answer) = answer {
                    lines.push(format!("A: {answer}"));
                }
                lines
            }
        }
    }
}
