use core::fmt;

/// Out-of-band control codes carried in place of a payload length.
///
/// Every code is negative on the wire. Codes this build does not know about
/// are preserved in [`Signal::Unknown`] so they can be logged and forwarded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Signal {
    #[doc(alias = "BNET_EOD")]
    /// End of data stream, new data may follow.
    EndOfData,
    #[doc(alias = "BNET_EOD_POLL")]
    /// End of data and poll all in one.
    EndOfDataPoll,
    #[doc(alias = "BNET_STATUS")]
    /// Send full status.
    Status,
    #[doc(alias = "BNET_TERMINATE")]
    /// Conversation terminated, the socket should be closed.
    Terminate,
    #[doc(alias = "BNET_POLL")]
    /// Poll request.
    Poll,
    #[doc(alias = "BNET_HEARTBEAT")]
    /// Heartbeat response requested.
    Heartbeat,
    #[doc(alias = "BNET_HB_RESPONSE")]
    /// Only response permitted to a heartbeat.
    HeartbeatResponse,
    #[doc(alias = "BNET_xxxxxxPROMPT")]
    /// Retired prompt code, kept so old peers stay decodable.
    RetiredPrompt,
    #[doc(alias = "BNET_BTIME")]
    /// Send UTC btime.
    Btime,
    #[doc(alias = "BNET_BREAK")]
    /// Stop current command.
    Break,
    #[doc(alias = "BNET_START_SELECT")]
    /// Start of a selection list.
    StartSelect,
    #[doc(alias = "BNET_END_SELECT")]
    /// End of a selection list.
    EndSelect,
    #[doc(alias = "BNET_INVALID_CMD")]
    /// Invalid command sent.
    InvalidCommand,
    #[doc(alias = "BNET_CMD_FAILED")]
    /// Command failed.
    CommandFailed,
    #[doc(alias = "BNET_CMD_OK")]
    /// Command succeeded.
    CommandOk,
    #[doc(alias = "BNET_CMD_BEGIN")]
    /// Start command execution.
    CommandBegin,
    #[doc(alias = "BNET_MSGS_PENDING")]
    /// Messages pending.
    MessagesPending,
    #[doc(alias = "BNET_MAIN_PROMPT")]
    /// Server ready and waiting.
    MainPrompt,
    #[doc(alias = "BNET_SELECT_INPUT")]
    /// Return selection input.
    SelectInput,
    #[doc(alias = "BNET_WARNING_MSG")]
    /// Warning message follows.
    WarningMessage,
    #[doc(alias = "BNET_ERROR_MSG")]
    /// Error message follows.
    ErrorMessage,
    #[doc(alias = "BNET_INFO_MSG")]
    /// Info message follows.
    InfoMessage,
    #[doc(alias = "BNET_RUN_CMD")]
    /// Run command follows.
    RunCommand,
    #[doc(alias = "BNET_YESNO")]
    /// Request yes/no answer.
    YesNo,
    #[doc(alias = "BNET_START_RTREE")]
    /// Start restore tree mode.
    StartRestoreTree,
    #[doc(alias = "BNET_END_RTREE")]
    /// End restore tree mode.
    EndRestoreTree,
    #[doc(alias = "BNET_SUB_PROMPT")]
    /// Indicate we are at a subprompt.
    SubPrompt,
    #[doc(alias = "BNET_TEXT_INPUT")]
    /// Get text input from user.
    TextInput,
    #[doc(alias = "BNET_EXT_TERMINATE")]
    /// A Terminate was received during a read.
    ExtTerminate,
    #[doc(alias = "BNET_FDCALLED")]
    /// The client connected to the director and is waiting for commands.
    FdCalled,
    #[doc(alias = "BNET_ISALIVE")]
    /// Keepalive check used by the connection rendezvous.
    IsAlive,
    /// A code outside the known table.
    Unknown(i32),
}

const KNOWN: [(Signal, i32, &str); 31] = [
    (Signal::EndOfData, -1, "BNET_EOD"),
    (Signal::EndOfDataPoll, -2, "BNET_EOD_POLL"),
    (Signal::Status, -3, "BNET_STATUS"),
    (Signal::Terminate, -4, "BNET_TERMINATE"),
    (Signal::Poll, -5, "BNET_POLL"),
    (Signal::Heartbeat, -6, "BNET_HEARTBEAT"),
    (Signal::HeartbeatResponse, -7, "BNET_HB_RESPONSE"),
    (Signal::RetiredPrompt, -8, "BNET_xxxxxxPROMPT"),
    (Signal::Btime, -9, "BNET_BTIME"),
    (Signal::Break, -10, "BNET_BREAK"),
    (Signal::StartSelect, -11, "BNET_START_SELECT"),
    (Signal::EndSelect, -12, "BNET_END_SELECT"),
    (Signal::InvalidCommand, -13, "BNET_INVALID_CMD"),
    (Signal::CommandFailed, -14, "BNET_CMD_FAILED"),
    (Signal::CommandOk, -15, "BNET_CMD_OK"),
    (Signal::CommandBegin, -16, "BNET_CMD_BEGIN"),
    (Signal::MessagesPending, -17, "BNET_MSGS_PENDING"),
    (Signal::MainPrompt, -18, "BNET_MAIN_PROMPT"),
    (Signal::SelectInput, -19, "BNET_SELECT_INPUT"),
    (Signal::WarningMessage, -20, "BNET_WARNING_MSG"),
    (Signal::ErrorMessage, -21, "BNET_ERROR_MSG"),
    (Signal::InfoMessage, -22, "BNET_INFO_MSG"),
    (Signal::RunCommand, -23, "BNET_RUN_CMD"),
    (Signal::YesNo, -24, "BNET_YESNO"),
    (Signal::StartRestoreTree, -25, "BNET_START_RTREE"),
    (Signal::EndRestoreTree, -26, "BNET_END_RTREE"),
    (Signal::SubPrompt, -27, "BNET_SUB_PROMPT"),
    (Signal::TextInput, -28, "BNET_TEXT_INPUT"),
    (Signal::ExtTerminate, -29, "BNET_EXT_TERMINATE"),
    (Signal::FdCalled, -30, "BNET_FDCALLED"),
    (Signal::IsAlive, -31, "BNET_ISALIVE"),
];

impl Signal {
    /// Returns the wire code.
    #[must_use]
    pub fn code(self) -> i32 {
        if let Self::Unknown(code) = self {
            return code;
        }
        KNOWN
            .iter()
            .find(|(signal, _, _)| *signal == self)
            .map_or(0, |(_, code, _)| *code)
    }

    /// Maps a wire code to a signal, preserving unknown codes.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        KNOWN
            .iter()
            .find(|(_, known, _)| *known == code)
            .map_or(Self::Unknown(code), |(signal, _, _)| *signal)
    }

    /// Returns the mnemonic used in diagnostics, e.g. `BNET_EOD`.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        KNOWN
            .iter()
            .find(|(signal, _, _)| *signal == self)
            .map(|(_, _, name)| *name)
    }

    /// Reports whether the peer asked to end the conversation.
    #[must_use]
    pub const fn is_terminate(self) -> bool {
        matches!(self, Self::Terminate)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown sig {}", self.code()),
        }
    }
}

impl From<i32> for Signal {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}
