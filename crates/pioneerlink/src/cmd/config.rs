use crate::cmd::ConfigArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};

/// Print the configuration `run` would use, as JSON.
pub fn run(args: ConfigArgs) -> CliResult<i32> {
    let config = args.link.resolve()?;
    let text = serde_json::to_string_pretty(&config)
        .map_err(|err| CliError::new(INTERNAL, format!("config serialization failed: {err}")))?;
    println!("{text}");
    Ok(SUCCESS)
}
