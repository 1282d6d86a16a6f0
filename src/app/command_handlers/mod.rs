use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::app::command_support::{AppEnv, CommandOutcome};

pub mod config;
pub mod remediation;
pub mod run;
pub mod state;

pub fn run_cli(args: Vec<String>) -> Result<CommandOutcome, String> {
    if args.is_empty() {
        return Ok(CommandOutcome::ok(help_text()));
    }
    let env = AppEnv::from_home()?;
    run_cli_with_env(args, &env)
}

pub fn run_cli_with_env(args: Vec<String>, env: &AppEnv) -> Result<CommandOutcome, String> {
    let Some(verb) = args.first() else {
        return Ok(CommandOutcome::ok(help_text()));
    };
    let rest = &args[1..];

    match parse_cli_verb(verb) {
        CliVerb::Run => run::cmd_run(env, rest),
        CliVerb::Diagnose => remediation::cmd_diagnose(env, rest),
        CliVerb::AutoFix => remediation::cmd_auto_fix(env, rest),
        CliVerb::ResetState => state::cmd_reset_state(env, rest),
        CliVerb::ExportState => state::cmd_export_state(env, rest),
        CliVerb::ListTasks => state::cmd_list_tasks(env, rest),
        CliVerb::TaskInfo => state::cmd_task_info(env, rest),
        CliVerb::History => state::cmd_history(env, rest),
        CliVerb::GenerateConfig => config::cmd_generate_config(env, rest),
        CliVerb::Help => Ok(CommandOutcome::ok(help_text())),
        CliVerb::Unknown => Err(format!("unknown command `{verb}`\n\n{}", help_text())),
    }
}
