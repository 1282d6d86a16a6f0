use std::collections::BTreeMap;
use std::path::Path;

/// Fixed table from literal `shell_cmd` payload text to a pre-built argument vector.
/// Payloads are looked up verbatim; they are never split, parsed or handed to a shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellAllowList {
    commands: BTreeMap<String, Vec<String>>,
}

impl ShellAllowList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin(marker_path: &Path) -> Self {
        let marker = marker_path.display().to_string();
        Self::empty()
            .allow(format!("touch {marker}"), ["touch", marker.as_str()])
            .allow("brew update", ["brew", "update"])
            .allow("colima start", ["colima", "start"])
            .allow("dscacheutil -flushcache", ["dscacheutil", "-flushcache"])
            .allow(
                "killall -HUP mDNSResponder",
                ["killall", "-HUP", "mDNSResponder"],
            )
            .allow("resolvectl flush-caches", ["resolvectl", "flush-caches"])
    }

    pub fn allow<I, S>(mut self, payload: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if !argv.is_empty() {
            self.commands.insert(payload.into(), argv);
        }
        self
    }

    pub fn resolve(&self, payload: &str) -> Option<&[String]> {
        self.commands.get(payload).map(Vec::as_slice)
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}
