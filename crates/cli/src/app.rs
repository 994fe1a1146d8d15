use std::{path::PathBuf, sync::Arc};

use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches};
use dispatch::{
    alias, find_command, CallFrame, CommandNode, ParamKind, ParamSpec, CHAIN_PARAM,
};
use serde_json::Value;

/// Parameter that carries the configuration file path.
pub(crate) const CONFIG_PARAM: &str = "config";

/// Arguments accepted by every command.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub(crate) struct GlobalArgs {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Platform name from the [chains] configuration.
    #[arg(long, global = true)]
    pub chain: Option<String>,
}

/// Leaf command selected by the terminal arguments.
pub(crate) struct Selection {
    pub command: Arc<CommandNode>,
    pub path: String,
    pub frame: CallFrame,
    pub globals: GlobalArgs,
}

/// Build the clap command from the command trees.
pub(crate) fn build(roots: &[Arc<CommandNode>]) -> Command {
    let command = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chain commands for the terminal and the HTTP API")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands(roots.iter().map(|root| subcommand(root)));

    GlobalArgs::augment_args(command)
}

fn subcommand(node: &CommandNode) -> Command {
    let mut command = Command::new(node.name.clone())
        .about(node.description.clone())
        .visible_aliases(
            alias::tokens(node)
                .into_iter()
                .skip(1)
                .map(str::to_owned)
                .collect::<Vec<_>>(),
        );

    for (index, argument) in node.arguments.iter().enumerate() {
        command = command.arg(
            Arg::new(argument.key(index))
                .help(argument.description.clone())
                .required(argument.required),
        );
    }

    for param in node.params.iter().filter(|param| param.name != CHAIN_PARAM) {
        command = command.arg(param_arg(param));
    }

    if node.is_router() {
        command = command
            .subcommand_required(true)
            .subcommands(node.subcommands.iter().map(|node| subcommand(node)));
    }

    command
}

fn param_arg(param: &ParamSpec) -> Arg {
    let mut arg = Arg::new(param.name.clone())
        .long(param.name.clone())
        .help(param.description.clone());

    if let Some(short) = param.short {
        arg = arg.short(short);
    }

    match param.kind {
        ParamKind::Flag => arg.action(ArgAction::SetTrue),
        ParamKind::Value => arg.action(ArgAction::Set).required(param.required),
        ParamKind::Multiple => arg.action(ArgAction::Append).required(param.required),
    }
}

/// Resolve parsed terminal arguments into a leaf command and its call frame.
pub(crate) fn select(
    roots: &[Arc<CommandNode>],
    matches: &ArgMatches,
) -> Result<Selection, anyhow::Error> {
    let mut tokens = Vec::new();
    let mut leaf = matches;

    while let Some((name, matches)) = leaf.subcommand() {
        tokens.push(name.to_owned());
        leaf = matches;
    }

    let (command, path) = find_command(roots, &tokens)?;

    let globals = GlobalArgs::from_arg_matches(leaf)?;
    let mut frame = CallFrame::for_command(&command);

    for (index, argument) in command.arguments.iter().enumerate() {
        if let Some(value) = leaf.get_one::<String>(&argument.key(index)) {
            frame.set_arg(index, value.clone());
        }
    }

    for param in command.params.iter().filter(|param| param.name != CHAIN_PARAM) {
        let value = match param.kind {
            ParamKind::Flag => leaf.get_flag(&param.name).then_some(Value::Bool(true)),
            ParamKind::Value => leaf
                .get_one::<String>(&param.name)
                .map(|value| Value::String(value.clone())),
            ParamKind::Multiple => leaf.get_many::<String>(&param.name).map(|values| {
                values
                    .map(|value| Value::String(value.clone()))
                    .collect()
            }),
        };

        if let Some(value) = value {
            frame.params.insert(param.name.clone(), value);
        }
    }

    if let Some(chain) = &globals.chain {
        frame
            .params
            .insert(CHAIN_PARAM.to_owned(), Value::String(chain.clone()));
    }
    if let Some(config) = &globals.config {
        frame.params.insert(
            CONFIG_PARAM.to_owned(),
            Value::String(config.display().to_string()),
        );
    }

    Ok(Selection {
        path: path.join(" "),
        command,
        frame,
        globals,
    })
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use dispatch::CommandNode;
    use serde_json::{json, Value};

    use super::{build, select};

    fn roots() -> Vec<Arc<CommandNode>> {
        crate::roots()
    }

    #[test]
    fn command_is_valid() {
        build(&roots()).debug_assert();
    }

    #[test]
    fn positional_arguments() {
        let roots = roots();
        let matches = build(&roots)
            .try_get_matches_from(["cli", "c", "slot", "0xdead", "2-4", "--chain", "polygon"])
            .unwrap();

        let selection = select(&roots, &matches).unwrap();

        assert_eq!(selection.path, "contract slot");
        assert_eq!(
            selection.frame.args,
            [Some(String::from("0xdead")), Some(String::from("2-4"))]
        );
        assert_eq!(
            Value::Object(selection.frame.params),
            json!({ "chain": "polygon" })
        );
    }

    #[test]
    fn named_parameters() {
        let roots = roots();
        let matches = build(&roots)
            .try_get_matches_from([
                "cli", "contract", "logs", "0xdead", "-t", "0x01", "--topic", "0x02", "--format",
                "csv", "-c", "Chains.toml",
            ])
            .unwrap();

        let selection = select(&roots, &matches).unwrap();

        assert_eq!(
            Value::Object(selection.frame.params),
            json!({
                "topic": ["0x01", "0x02"],
                "format": "csv",
                "config": "Chains.toml",
            })
        );
        assert_eq!(selection.globals.config, Some(PathBuf::from("Chains.toml")));
    }

    #[test]
    fn flags() {
        let roots = roots();
        let matches = build(&roots)
            .try_get_matches_from(["cli", "b", "get", "latest", "--transactions"])
            .unwrap();

        let selection = select(&roots, &matches).unwrap();

        assert_eq!(
            Value::Object(selection.frame.params),
            json!({ "transactions": true })
        );
    }

    #[test]
    fn router_requires_subcommand() {
        let roots = roots();

        assert!(build(&roots)
            .try_get_matches_from(["cli", "contract"])
            .is_err());
    }

    #[test]
    fn required_parameters() {
        let roots = roots();

        assert!(build(&roots)
            .try_get_matches_from(["cli", "block", "dates"])
            .is_err());
        assert!(build(&roots)
            .try_get_matches_from(["cli", "block", "dates", "-b", "1000,2000"])
            .is_ok());
    }
}
