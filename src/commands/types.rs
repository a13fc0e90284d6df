//! Command types and definitions.

use std::fmt;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BotCommand {
    // admin
    Cfban,
    CfbanProof,
    AddFed,
    DelFed,
    ListFeds,
    Dkick,
    Title,

    // ai
    Ask,

    // android
    CheckFirmware,
    SamsungName,
    SamsungSpecs,
    WhatIs,
    Codename,
    Specs,
    OrangeFox,
    Twrp,
    Magisk,
    KernelSu,
    KernelSuNext,

    // fun
    Decide,
    Slap,
    Joke,
    Tts,
    Ascii,

    // misc
    Translate,
    Song,
    CheckUpdate,
    ModRepo,
    ExtUpdate,
    ModGrade,

    // system
    Hash,

    // tg_tools
    Quote,
    FetchCreator,
    Lock,
    Unlock,
    LockTypes,
    FedStat,
    JoinInfo,
    SaveNote,
    GetNote,
    DelNote,
    Notes,
    Permissions,

    // tools
    Cut,

    Help,
}

/// Registry row: command, accepted names (first is canonical), usage, help text.
struct CommandSpec {
    command: BotCommand,
    names: &'static [&'static str],
    usage: &'static str,
    about: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: BotCommand::Cfban,
        names: &["cfban"],
        usage: "<user> [reason]",
        about: "Fban a user in chosen feds",
    },
    CommandSpec {
        command: BotCommand::CfbanProof,
        names: &["cfbanp"],
        usage: "<user> [reason] (reply)",
        about: "Fban with the replied message as proof",
    },
    CommandSpec {
        command: BotCommand::AddFed,
        names: &["addfed"],
        usage: "[name]",
        about: "Add this chat to the fed list",
    },
    CommandSpec {
        command: BotCommand::DelFed,
        names: &["delfed"],
        usage: "[chat_id]",
        about: "Remove a chat from the fed list",
    },
    CommandSpec {
        command: BotCommand::ListFeds,
        names: &["listfeds"],
        usage: "",
        about: "Show the fed list",
    },
    CommandSpec {
        command: BotCommand::Dkick,
        names: &["dkick"],
        usage: "[reason] (reply)",
        about: "Delete a message and kick its sender",
    },
    CommandSpec {
        command: BotCommand::Title,
        names: &["title"],
        usage: "<user> [title]",
        about: "Set or clear an admin title",
    },
    CommandSpec {
        command: BotCommand::Ask,
        names: &["ask"],
        usage: "[question]",
        about: "Ask the Cloudflare AI model",
    },
    CommandSpec {
        command: BotCommand::CheckFirmware,
        names: &["checkfw"],
        usage: "<model> <csc>",
        about: "Latest Samsung firmware",
    },
    CommandSpec {
        command: BotCommand::SamsungName,
        names: &["sm"],
        usage: "<model>",
        about: "Samsung marketing name",
    },
    CommandSpec {
        command: BotCommand::SamsungSpecs,
        names: &["sspecs"],
        usage: "<model>",
        about: "Samsung device specifications",
    },
    CommandSpec {
        command: BotCommand::WhatIs,
        names: &["whatis"],
        usage: "<codename>",
        about: "Xiaomi device behind a codename",
    },
    CommandSpec {
        command: BotCommand::Codename,
        names: &["codename"],
        usage: "<name>",
        about: "Xiaomi codenames matching a name",
    },
    CommandSpec {
        command: BotCommand::Specs,
        names: &["specs"],
        usage: "<codename|name>",
        about: "Xiaomi device specifications",
    },
    CommandSpec {
        command: BotCommand::OrangeFox,
        names: &["orangefox"],
        usage: "<codename>",
        about: "Latest OrangeFox recovery",
    },
    CommandSpec {
        command: BotCommand::Twrp,
        names: &["twrp"],
        usage: "<codename>",
        about: "TWRP recovery for a device",
    },
    CommandSpec {
        command: BotCommand::Magisk,
        names: &["magisk"],
        usage: "",
        about: "Latest Magisk releases",
    },
    CommandSpec {
        command: BotCommand::KernelSu,
        names: &["ksu", "kernelsu"],
        usage: "",
        about: "Latest KernelSU releases",
    },
    CommandSpec {
        command: BotCommand::KernelSuNext,
        names: &["ksun", "kernelsunext"],
        usage: "",
        about: "Latest KernelSU-Next release",
    },
    CommandSpec {
        command: BotCommand::Decide,
        names: &["decide"],
        usage: "",
        about: "Random answer",
    },
    CommandSpec {
        command: BotCommand::Slap,
        names: &["slap"],
        usage: "[user|text]",
        about: "Slap someone",
    },
    CommandSpec {
        command: BotCommand::Joke,
        names: &["joke"],
        usage: "",
        about: "Random joke",
    },
    CommandSpec {
        command: BotCommand::Tts,
        names: &["tts"],
        usage: "[-xx] <text>",
        about: "Text to speech",
    },
    CommandSpec {
        command: BotCommand::Ascii,
        names: &["ascii"],
        usage: "<text>",
        about: "Render text as ASCII art",
    },
    CommandSpec {
        command: BotCommand::Translate,
        names: &["tr", "translate"],
        usage: "[-lang] <text>",
        about: "Translate text",
    },
    CommandSpec {
        command: BotCommand::Song,
        names: &["song", "sg"],
        usage: "<name|link> (or reply to a link)",
        about: "Download a song as MP3",
    },
    CommandSpec {
        command: BotCommand::CheckUpdate,
        names: &["checkupdate", "cupdate"],
        usage: "",
        about: "Check for module updates",
    },
    CommandSpec {
        command: BotCommand::ModRepo,
        names: &["modrepo", "mods"],
        usage: "",
        about: "Extras repository info",
    },
    CommandSpec {
        command: BotCommand::ExtUpdate,
        names: &["extupdate"],
        usage: "",
        about: "Pull module updates (owner only)",
    },
    CommandSpec {
        command: BotCommand::ModGrade,
        names: &["modgrade"],
        usage: "",
        about: "Compare local and upstream commits",
    },
    CommandSpec {
        command: BotCommand::Hash,
        names: &["hash"],
        usage: "(reply to file)",
        about: "MD5, SHA1 and SHA256 of a file",
    },
    CommandSpec {
        command: BotCommand::Quote,
        names: &["q", "quote"],
        usage: "[count] (reply)",
        about: "Make a quote sticker",
    },
    CommandSpec {
        command: BotCommand::FetchCreator,
        names: &["fc", "fcreator", "fetchcreator"],
        usage: "(reply to forward)",
        about: "Origin of a forwarded message",
    },
    CommandSpec {
        command: BotCommand::Lock,
        names: &["lock"],
        usage: "<types|all>",
        about: "Restrict chat permissions",
    },
    CommandSpec {
        command: BotCommand::Unlock,
        names: &["unlock"],
        usage: "<types|all>",
        about: "Allow chat permissions",
    },
    CommandSpec {
        command: BotCommand::LockTypes,
        names: &["locktypes"],
        usage: "",
        about: "List lock types",
    },
    CommandSpec {
        command: BotCommand::FedStat,
        names: &["fstat", "fedstat"],
        usage: "[user]",
        about: "Fed ban status across fed bots",
    },
    CommandSpec {
        command: BotCommand::JoinInfo,
        names: &["joininfo", "joindate"],
        usage: "[user]",
        about: "When a member joined",
    },
    CommandSpec {
        command: BotCommand::SaveNote,
        names: &["save", "addnote"],
        usage: "<name> [text] (or reply)",
        about: "Save a note",
    },
    CommandSpec {
        command: BotCommand::GetNote,
        names: &["get"],
        usage: "<name>",
        about: "Send a note",
    },
    CommandSpec {
        command: BotCommand::DelNote,
        names: &["delnote", "clear"],
        usage: "<name>",
        about: "Delete a note",
    },
    CommandSpec {
        command: BotCommand::Notes,
        names: &["notes"],
        usage: "",
        about: "List notes",
    },
    CommandSpec {
        command: BotCommand::Permissions,
        names: &["perms", "permissions"],
        usage: "[chat] [user]",
        about: "Member status and rights",
    },
    CommandSpec {
        command: BotCommand::Cut,
        names: &["cut"],
        usage: "<start-end> (reply)",
        about: "Cut audio or video",
    },
    CommandSpec {
        command: BotCommand::Help,
        names: &["help"],
        usage: "",
        about: "Show this help message",
    },
];

/// A command found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: BotCommand,
    /// Everything after the command name, trimmed.
    pub input: String,
}

impl BotCommand {
    fn spec(self) -> Option<&'static CommandSpec> {
        COMMANDS.iter().find(|s| s.command == self)
    }

    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not a valid command.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<ParsedCommand> {
        let text = text.trim();
        let after_prefix = text.strip_prefix(prefix)?;

        // "." followed by a space is plain text, not a command.
        if after_prefix.starts_with(char::is_whitespace) {
            return None;
        }

        let (cmd, input) = match after_prefix.split_once(char::is_whitespace) {
            Some((cmd, input)) => (cmd.to_lowercase(), input.trim()),
            None => (after_prefix.to_lowercase(), ""),
        };

        let spec = COMMANDS.iter().find(|s| s.names.contains(&cmd.as_str()))?;
        Some(ParsedCommand {
            command: spec.command,
            input: input.to_owned(),
        })
    }

    /// Returns the canonical command name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().and_then(|s| s.names.first()).copied().unwrap_or("?")
    }

    /// Returns true for commands only the account owner may run.
    #[must_use]
    pub const fn owner_only(self) -> bool {
        matches!(self, Self::ExtUpdate)
    }

    /// Builds the help text for `prefix`.
    #[must_use]
    pub fn help_text(prefix: &str) -> String {
        let mut lines = vec!["<b>Available commands:</b>".to_owned()];
        for spec in COMMANDS {
            let aliases = if spec.names.len() > 1 {
                format!(" ({})", spec.names[1..].join(", "))
            } else {
                String::new()
            };
            let usage = if spec.usage.is_empty() {
                String::new()
            } else {
                format!(" {}", crate::telegram::html::escape(spec.usage))
            };
            lines.push(format!(
                "<code>{prefix}{}{usage}</code>{aliases} - {}",
                spec.names[0], spec.about
            ));
        }
        lines.join("\n")
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = ".";

    fn parse(text: &str) -> Option<ParsedCommand> {
        BotCommand::parse(text, PREFIX)
    }

    #[test]
    fn test_parse_plain_command() {
        assert_eq!(
            parse(".magisk"),
            Some(ParsedCommand {
                command: BotCommand::Magisk,
                input: String::new(),
            })
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse(".ksu").unwrap().command, BotCommand::KernelSu);
        assert_eq!(parse(".kernelsu").unwrap().command, BotCommand::KernelSu);
        assert_eq!(parse(".fetchcreator").unwrap().command, BotCommand::FetchCreator);
        assert_eq!(parse(".clear x").unwrap().command, BotCommand::DelNote);
        assert_eq!(parse(".sg never gonna").unwrap().command, BotCommand::Song);
    }

    #[test]
    fn test_parse_input_keeps_inner_whitespace() {
        let parsed = parse(".cfban @spammer  sends   scam links ").unwrap();
        assert_eq!(parsed.command, BotCommand::Cfban);
        assert_eq!(parsed.input, "@spammer  sends   scam links");
    }

    #[test]
    fn test_parse_multiline_input() {
        let parsed = parse(".save rules\nline one\nline two").unwrap();
        assert_eq!(parsed.command, BotCommand::SaveNote);
        assert_eq!(parsed.input, "rules\nline one\nline two");
    }

    #[test]
    fn test_parse_wrong_prefix() {
        assert_eq!(parse("!magisk"), None);
        assert_eq!(parse("magisk"), None);
        assert_eq!(parse(". magisk"), None);
        assert_eq!(parse(".unknowncmd"), None);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(parse(".TR -de hi").unwrap().command, BotCommand::Translate);
    }

    #[test]
    fn test_parse_with_extra_whitespace() {
        assert_eq!(parse("  .notes  ").unwrap().command, BotCommand::Notes);
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(
            BotCommand::parse("!!hash", "!!").unwrap().command,
            BotCommand::Hash
        );
    }

    #[test]
    fn test_every_command_is_registered_once() {
        let mut names: Vec<&str> = COMMANDS.iter().flat_map(|s| s.names.iter().copied()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate command name");
        assert_eq!(BotCommand::Specs.name(), "specs");
        assert_eq!(BotCommand::SamsungSpecs.name(), "sspecs");
    }

    #[test]
    fn test_help_lists_aliases() {
        let help = BotCommand::help_text(".");
        assert!(help.contains("<code>.q [count] (reply)</code> (quote)"));
        assert!(help.contains("<code>.extupdate</code>"));
    }
}
