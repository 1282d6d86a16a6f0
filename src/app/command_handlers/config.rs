use crate::app::command_support::{map_config_err, AppEnv, ArgList, CommandOutcome};
use crate::config::{save_settings, Settings};

const USAGE: &str = "generate-config [--force]";

pub fn cmd_generate_config(env: &AppEnv, args: &[String]) -> Result<CommandOutcome, String> {
    let mut args = ArgList::new(args);
    let force = args.take_flag("--force");
    args.finish(USAGE)?;

    let path = save_settings(&Settings::default(), &env.config_path, force)
        .map_err(map_config_err)?;
    Ok(CommandOutcome::ok(format!(
        "wrote default settings to {}",
        path.display()
    )))
}
