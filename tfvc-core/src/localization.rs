use crate::error::{FaultKind, TfvcError};

/// User-facing strings, keyed by what they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Message {
    AuthFailed,
    ToolNotFound,
    EulaNotAccepted,
    UnreadableOutput,
    Interrupted,
    ContextFailed,
    NameEmpty,
    MappingsEmpty,
    LoadFailureTitle,
    SaveSuccessTitle,
    SaveSuccess,
    SyncSuccess,
    SaveFailureTitle,
    SyncFollowUp,
}

impl Message {
    pub fn text(self) -> &'static str {
        match self {
            Self::AuthFailed => "Authentication failed. Sign in again and retry.",
            Self::ToolNotFound => {
                "The tf command line client could not be found. Check the tf_executable setting."
            }
            Self::EulaNotAccepted => {
                "The tf license agreement has not been accepted. Run 'tf eula' and retry."
            }
            Self::UnreadableOutput => "The output of tf could not be understood.",
            Self::Interrupted => "The operation was interrupted.",
            Self::ContextFailed => "Could not determine the TFVC repository for this project.",
            Self::NameEmpty => "The workspace name cannot be empty.",
            Self::MappingsEmpty => "The workspace needs at least one working folder.",
            Self::LoadFailureTitle => "Loading workspace failed",
            Self::SaveSuccessTitle => "Workspace saved",
            Self::SaveSuccess => "The workspace was updated. Sync it to bring files up to date.",
            Self::SyncSuccess => "The workspace files were synced.",
            Self::SaveFailureTitle => "Updating workspace failed",
            Self::SyncFollowUp => "Sync now",
        }
    }
}

/// Text shown to the user for `err`.
pub fn error_message(err: &TfvcError) -> String {
    let message = match err.fault_kind() {
        Some(FaultKind::AuthExpired) => Message::AuthFailed,
        Some(FaultKind::ToolNotFound) => Message::ToolNotFound,
        Some(FaultKind::EulaNotAccepted) => Message::EulaNotAccepted,
        Some(FaultKind::ParseFailure) => {
            return format!("{} {err}", Message::UnreadableOutput.text());
        }
        Some(FaultKind::NonZeroExit) | None => match err {
            TfvcError::Interrupted(_) => Message::Interrupted,
            _ => return err.to_string(),
        },
    };
    message.text().to_string()
}
