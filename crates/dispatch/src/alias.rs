use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use derive_more::Error;

use crate::node::CommandNode;

/// Unable to find a command for a token sequence.
#[derive(Debug, Error)]
pub struct UnresolvedCommandError {
    /// Tokens that were resolved successfully before the failure.
    pub resolved: Vec<String>,

    /// Token that didn't match any command, or [`None`] if the token sequence
    /// ended at a router command.
    pub token: Option<String>,
}

impl Display for UnresolvedCommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let resolved = self.resolved.join(" ");

        match (&self.token, resolved.is_empty()) {
            (Some(token), true) => write!(f, "unknown command `{token}`"),
            (Some(token), false) => write!(f, "unknown subcommand `{token}` of `{resolved}`"),
            (None, _) => write!(f, "`{resolved}` requires a subcommand"),
        }
    }
}

/// Every token the command can be invoked with: the name first, aliases after.
///
/// Empty and repeated tokens are skipped.
pub fn tokens(command: &CommandNode) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::with_capacity(command.aliases.len() + 1);

    for token in std::iter::once(&command.name).chain(&command.aliases) {
        if !token.is_empty() && !tokens.contains(&token.as_str()) {
            tokens.push(token);
        }
    }

    tokens
}

/// Check if the command can be invoked with the provided token.
pub fn matches(command: &CommandNode, token: &str) -> bool {
    tokens(command).contains(&token)
}

/// Resolve a sequence of command tokens to a leaf command.
///
/// The first command at each level that accepts a token wins. Returns the leaf
/// command along with the primary names of every command on its path.
pub fn find_command<S: AsRef<str>>(
    roots: &[Arc<CommandNode>],
    tokens: &[S],
) -> Result<(Arc<CommandNode>, Vec<String>), UnresolvedCommandError> {
    let mut level = roots;
    let mut path: Vec<String> = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.iter().map(AsRef::as_ref);

    loop {
        let Some(token) = tokens.next() else {
            return Err(UnresolvedCommandError {
                resolved: path,
                token: None,
            });
        };

        let command = level
            .iter()
            .find(|command| matches(command, token))
            .ok_or_else(|| UnresolvedCommandError {
                resolved: path.clone(),
                token: Some(token.to_owned()),
            })?;

        path.push(command.name.clone());

        if !command.is_router() {
            if let Some(extra) = tokens.next() {
                return Err(UnresolvedCommandError {
                    resolved: path,
                    token: Some(extra.to_owned()),
                });
            }

            return Ok((command.clone(), path));
        }

        level = &command.subcommands;
    }
}
