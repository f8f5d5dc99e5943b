//! Control-channel `add-file` / `add-dir` argument parsing (spec.md §6).
//!
//! Grounded on `reader-scheme.c:arkime_scheme_cmd_add` / `_cmd_add_file` /
//! `_cmd_add_dir`: a short run of `--flag`/`--noflag` toggles and any number
//! of `--op field=value` pairs (capped at [`crate::actions::MAX_OPS`]),
//! followed by the path itself as the last argument. A leading `--` on an
//! option is optional, exactly as the original accepts both `-monitor` and
//! `--monitor`.

use std::fmt;

use crate::actions::{ActionSet, OpParseError};
use crate::flags::SchemeFlags;
use crate::uri::OwnedUri;

/// One parsed `add-file` or `add-dir` control-channel request, ready to be
/// handed to [`crate::worker::WorkerHandle::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub uri: OwnedUri,
    pub flags: SchemeFlags,
    pub actions: ActionSet,
}

/// Why an `add-file`/`add-dir` command was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No path argument was supplied.
    Usage(&'static str),
    /// An option token wasn't recognized.
    UnknownOption(String),
    /// `--op` appeared as the final argument, with nothing after it.
    MissingOpArgument,
    OpParse(OpParseError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Usage(usage) => write!(f, "{usage}"),
            CommandError::UnknownOption(opt) => write!(f, "Unknown option {opt}"),
            CommandError::MissingOpArgument => write!(f, "Missing argument to -op"),
            CommandError::OpParse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<OpParseError> for CommandError {
    fn from(e: OpParseError) -> Self {
        CommandError::OpParse(e)
    }
}

/// Parse `add-file [options] <file>`.
pub fn parse_add_file(args: &[&str], defaults: SchemeFlags) -> Result<AddRequest, CommandError> {
    parse_add(args, defaults, "Usage: add-file [<file options>] <file>")
}

/// Parse `add-dir [options] <dir>`. The `DIR_HINT` bit is always set,
/// mirroring `ARKIME_SCHEME_FLAG_DIRHINT` being passed unconditionally by
/// `arkime_scheme_cmd_add_dir`.
pub fn parse_add_dir(args: &[&str], defaults: SchemeFlags) -> Result<AddRequest, CommandError> {
    let mut request = parse_add(args, defaults, "Usage: add-dir [<dir options>] [<file options>] <dir>")?;
    request.flags |= SchemeFlags::DIR_HINT;
    Ok(request)
}

fn parse_add(args: &[&str], defaults: SchemeFlags, usage: &'static str) -> Result<AddRequest, CommandError> {
    if args.is_empty() {
        return Err(CommandError::Usage(usage));
    }

    let (path, options) = args.split_last().expect("checked non-empty above");
    let mut flags = defaults;
    let mut ops: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < options.len() {
        let token = options[i];
        let name = token.strip_prefix("--").unwrap_or(token);

        match name {
            "monitor" => flags.insert(SchemeFlags::MONITOR),
            "nomonitor" => flags.remove(SchemeFlags::MONITOR),
            "recursive" => flags.insert(SchemeFlags::RECURSIVE),
            "norecursive" => flags.remove(SchemeFlags::RECURSIVE),
            "skip" => flags.insert(SchemeFlags::SKIP_PROCESSED),
            "noskip" => flags.remove(SchemeFlags::SKIP_PROCESSED),
            "delete" => flags.insert(SchemeFlags::DELETE_AFTER),
            "nodelete" => flags.remove(SchemeFlags::DELETE_AFTER),
            "op" => {
                i += 1;
                let value = options.get(i).ok_or(CommandError::MissingOpArgument)?;
                ops.push(value);
            }
            _ => return Err(CommandError::UnknownOption(token.to_string())),
        }
        i += 1;
    }

    let actions = ActionSet::parse(&ops)?;
    Ok(AddRequest {
        uri: OwnedUri::new(*path),
        flags,
        actions,
    })
}
