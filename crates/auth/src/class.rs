use std::fmt;

/// Kind of daemon on one end of a connection.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DaemonClass {
    /// Not known.
    #[default]
    Unknown,
    /// Console.
    Console,
    /// File daemon.
    FileDaemon,
    /// Storage daemon.
    StorageDaemon,
    /// Director.
    Director,
    /// Graphical monitor.
    Gui,
}

impl DaemonClass {
    /// Abbreviation used in messages.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Unknown => "UNK",
            Self::Console => "CON",
            Self::FileDaemon => "FD",
            Self::StorageDaemon => "SD",
            Self::Director => "DIR",
            Self::Gui => "GUI",
        }
    }

    /// Full name used in messages.
    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Console => "Console",
            Self::FileDaemon => "File Daemon",
            Self::StorageDaemon => "Storage Daemon",
            Self::Director => "Director",
            Self::Gui => "Gui",
        }
    }
}

impl fmt::Display for DaemonClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Which side of the connection this daemon is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DaemonRole {
    /// Made the connection.
    Client,
    /// Accepted the connection.
    Server,
}
