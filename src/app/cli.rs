#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    Diagnose,
    AutoFix,
    ResetState,
    ExportState,
    ListTasks,
    TaskInfo,
    History,
    GenerateConfig,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "diagnose" => CliVerb::Diagnose,
        "auto-fix" => CliVerb::AutoFix,
        "reset-state" => CliVerb::ResetState,
        "export-state" => CliVerb::ExportState,
        "list-tasks" => CliVerb::ListTasks,
        "task-info" => CliVerb::TaskInfo,
        "history" => CliVerb::History,
        "generate-config" => CliVerb::GenerateConfig,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn split_global_flags(args: Vec<String>) -> (bool, Vec<String>) {
    let mut verbose = false;
    let rest = args
        .into_iter()
        .filter(|arg| {
            if arg == "--verbose" || arg == "-v" {
                verbose = true;
                false
            } else {
                true
            }
        })
        .collect();
    (verbose, rest)
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: benchkeeper [--verbose] <command> [options]".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  run [--dry-run] [--mode run|test|stress|security] [--task <filter>]...".to_string(),
        "                                       Run tasks that need it and record health"
            .to_string(),
        "  diagnose <task> [--autofix]          Diagnose one task, optionally healing it"
            .to_string(),
        "  auto-fix [--dry-run]                 Heal every task whose last status is FAIL"
            .to_string(),
        "  reset-state [--only-failed] [--backup|--no-backup]".to_string(),
        "                                       Reset all state, or only failed tasks".to_string(),
        "  export-state [--fmt json|csv|yaml]   Export state into the exports directory"
            .to_string(),
        "  list-tasks [--status pass|fail|warn|pending]".to_string(),
        "                                       Show recorded task statuses".to_string(),
        "  task-info <task> [--check]           Show a task, its history and a live health probe"
            .to_string(),
        "  history [--task <name>]              Show health history".to_string(),
        "  generate-config [--force]            Write the default settings file".to_string(),
        "  help                                 Show this text".to_string(),
    ]
}

pub fn help_text() -> String {
    cli_help_lines().join("\n")
}
