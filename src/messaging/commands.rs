/// Command types for the application
///
/// Commands represent requests to perform actions (imperative).
/// They are executed by the command executor.

/// Player commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select and play the track at a queue index
    PlayTrack { index: usize },

    /// Toggle play/pause of the active track
    TogglePlay,

    /// Move forward (shuffled when shuffle is on)
    Next,

    /// Move back sequentially
    Prev,

    /// Stop playback, keeping the track loaded
    Stop,

    ToggleShuffle,

    ToggleRepeat,

    /// Save the track at a queue index outside the cache and share it
    Download { index: usize },

    /// Play or toggle the sermon at a list index
    PlaySermon { index: usize },

    /// Stop the sermon that is playing
    StopSermon,

    /// Save the sermon at a list index and share it
    DownloadSermon { index: usize },

    /// Quit the application
    Quit,
}

/// Result of command execution
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Command executed successfully
    Success,

    /// Command executed with a specific result
    SuccessWithValue(String),

    /// Command failed with an error
    Error(String),
}

impl Command {
    /// Parse one line of user input. Track numbers are 1-based.
    pub fn parse(input: &str) -> Result<Self, String> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let Some((verb, rest)) = words.split_first() else {
            return Err("Empty command".to_string());
        };

        let index = |usage: &str, argument: Option<&&str>| -> Result<usize, String> {
            let raw = argument.ok_or_else(|| format!("Usage: {} <number>", usage))?;
            match raw.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n - 1),
                _ => Err(format!("Invalid number: {}", raw)),
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "play" => Ok(Command::PlayTrack {
                index: index("play", rest.first())?,
            }),
            "toggle" | "pause" => Ok(Command::TogglePlay),
            "next" => Ok(Command::Next),
            "prev" | "previous" => Ok(Command::Prev),
            "stop" => Ok(Command::Stop),
            "shuffle" => Ok(Command::ToggleShuffle),
            "repeat" => Ok(Command::ToggleRepeat),
            "download" => Ok(Command::Download {
                index: index("download", rest.first())?,
            }),
            "sermon" => {
                let action = rest.first().map(|a| a.to_ascii_lowercase());
                match action.as_deref() {
                    Some("play") => Ok(Command::PlaySermon {
                        index: index("sermon play", rest.get(1))?,
                    }),
                    Some("stop") => Ok(Command::StopSermon),
                    Some("download") => Ok(Command::DownloadSermon {
                        index: index("sermon download", rest.get(1))?,
                    }),
                    _ => Err("Usage: sermon play|stop|download [number]".to_string()),
                }
            }
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: {}", other)),
        }
    }

    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::PlayTrack { index } => format!("Play track {}", index + 1),
            Command::TogglePlay => "Toggle play/pause".to_string(),
            Command::Next => "Next track".to_string(),
            Command::Prev => "Previous track".to_string(),
            Command::Stop => "Stop playback".to_string(),
            Command::ToggleShuffle => "Toggle shuffle".to_string(),
            Command::ToggleRepeat => "Toggle repeat".to_string(),
            Command::Download { index } => format!("Download track {}", index + 1),
            Command::PlaySermon { index } => format!("Play sermon {}", index + 1),
            Command::StopSermon => "Stop sermon".to_string(),
            Command::DownloadSermon { index } => format!("Download sermon {}", index + 1),
            Command::Quit => "Quit application".to_string(),
        }
    }
}
