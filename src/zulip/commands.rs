#[derive(clap::Parser, Debug, PartialEq, Eq)]
#[clap(name = "@redmine", disable_version_flag = true)]
pub enum ChatCommand {
    /// Create a Redmine issue.
    CreateIssue {
        /// Issue subject. Quote it if it contains spaces.
        subject: String,
        /// Project id, name or identifier.
        #[clap(long)]
        project: Option<String>,
        /// Tracker id or name.
        #[clap(long)]
        tracker: Option<String>,
        /// Take project and tracker from an alias registered with `alias`.
        #[clap(long)]
        alias: Option<String>,
    },
    /// Register a project/tracker shortcut usable with `create-issue --alias`.
    Alias {
        name: String,
        #[clap(long)]
        project: String,
        #[clap(long)]
        tracker: Option<String>,
    },
    /// Report new issues of a project/tracker here, optionally assigning them in turn.
    Watch {
        #[clap(long)]
        project: String,
        #[clap(long)]
        tracker: String,
        /// Redmine user id to include in the rotation. Repeat or separate with commas.
        #[clap(long = "assignee", value_delimiter = ',')]
        assignees: Vec<u64>,
    },
    /// List registered watches.
    Watches,
    /// Stop a watch.
    Unwatch {
        /// Watch id, as shown by `watches`.
        id: u64,
    },
    /// Associate a Redmine user id with a Zulip name.
    Associate {
        external_id: u64,
        /// Zulip name to mention. Quote it if it contains spaces.
        chat_handle: String,
    },
    /// Stop assigning new issues to a user.
    Absent { external_id: u64 },
    /// Resume assigning new issues to a user.
    Present { external_id: u64 },
    /// List users who are not being assigned.
    Absentees,
}

impl ChatCommand {
    /// Parses already split words (without the bot mention).
    pub fn parse_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Result<Self, clap::Error> {
        use clap::Parser;
        ChatCommand::try_parse_from(std::iter::once("").chain(words))
    }
}

/// Splits a message into words. Words can be quoted with `"` or `'` to
/// include spaces.
pub fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut rest = text.trim_start();
    while let Some(first) = rest.chars().next() {
        let (word, remaining) = if first == '"' || first == '\'' {
            match rest[1..].find(first) {
                Some(end) => (&rest[1..end + 1], &rest[end + 2..]),
                // Unterminated quote, take the rest of the line.
                None => (&rest[1..], ""),
            }
        } else {
            match rest.find(char::is_whitespace) {
                Some(end) => (&rest[..end], &rest[end..]),
                None => (rest, ""),
            }
        };
        words.push(word);
        rest = remaining.trim_start();
    }
    words
}
