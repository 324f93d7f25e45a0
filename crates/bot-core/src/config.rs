use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context as _, Result, anyhow, bail};
use serde::Deserialize;

/// One command definition from the config file.
///
/// `args` lists the accepted signatures; only the length of each inner list
/// matters. An empty `args` list disables arity checking entirely, which is
/// different from `args: [[]]` (exactly zero arguments accepted).
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub args: Vec<Vec<String>>,
}

impl CommandSpec {
    /// Whether an invocation with `count` arguments passes the arity check.
    #[must_use]
    pub fn accepts_arity(&self, count: usize) -> bool {
        self.args.is_empty() || self.args.iter().any(|sig| sig.len() == count)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub sign: String,
    pub debug: bool,
    #[serde(default)]
    pub masters: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    #[serde(default)]
    pub subprocesses: Vec<String>,
    #[serde(default)]
    pub reacts: HashMap<String, String>,
    #[serde(default)]
    pub gifs: HashMap<String, String>,
}

/// Immutable token -> payload maps consulted by the router's fallback scan.
#[derive(Debug, Clone, Default)]
pub struct TriggerTables {
    pub reacts: HashMap<String, String>,
    pub gifs: HashMap<String, String>,
}

impl TriggerTables {
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            reacts: config.reacts.clone(),
            gifs: config.gifs.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file not found at {}. Create one or set --config",
            path.display()
        ));
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    let config: BotConfig = serde_yaml::from_str(&yaml).context("parsing YAML config")?;
    validate(&config)?;
    Ok(config)
}

/// Semantic validation on top of the typed deserialization.
///
/// Serde already guarantees field presence and types; this enforces the rules
/// a schema cannot express. Configuration is all-or-nothing: the first
/// violation aborts startup, naming the offending field, command and index.
pub fn validate(config: &BotConfig) -> Result<()> {
    if config.sign.is_empty() {
        bail!("configuration key 'sign' must be a non-empty string");
    }

    let mut seen = Vec::with_capacity(config.commands.len());
    for (idx, spec) in config.commands.iter().enumerate() {
        if spec.command.is_empty() {
            bail!("missing command name ['command'] at index {idx}");
        }
        if spec.description.is_empty() {
            bail!(
                "empty description ['description'] for command '{}' at index {idx}",
                spec.command
            );
        }
        if seen.contains(&spec.command.as_str()) {
            bail!("duplicate command name '{}' at index {idx}", spec.command);
        }
        seen.push(spec.command.as_str());
        for (alias_idx, alias) in spec.aliases.iter().enumerate() {
            if alias.is_empty() {
                bail!(
                    "empty alias ['aliases'] for command '{}' at index {alias_idx}",
                    spec.command
                );
            }
        }
    }

    // Subprocess identifiers share a prefix namespace with command tokens and
    // must not collide with the sign.
    for (idx, name) in config.subprocesses.iter().enumerate() {
        if name.is_empty() {
            bail!("empty subprocess name ['subprocesses'] at index {idx}");
        }
        if name.starts_with(&config.sign) {
            bail!(
                "subprocess '{name}' at index {idx} must not start with the bot sign '{}'",
                config.sign
            );
        }
    }

    // Same cross-cutting rule for trigger tokens: a sign-prefixed key could
    // never be typed as `sign + token` unambiguously.
    for (table, tokens) in [("reacts", &config.reacts), ("gifs", &config.gifs)] {
        for token in tokens.keys() {
            if token.starts_with(&config.sign) {
                bail!(
                    "{table} token '{token}' must not start with the bot sign '{}'",
                    config.sign
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> BotConfig {
        BotConfig {
            sign: "!".to_owned(),
            debug: false,
            masters: vec![],
            commands: vec![],
            subprocesses: vec![],
            reacts: HashMap::new(),
            gifs: HashMap::new(),
        }
    }

    fn spec(name: &str) -> CommandSpec {
        CommandSpec {
            command: name.to_owned(),
            description: format!("the {name} command"),
            aliases: vec![],
            args: vec![],
        }
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn rejects_empty_sign() {
        let mut config = base_config();
        config.sign = String::new();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("'sign'"), "{err}");
    }

    #[test]
    fn rejects_duplicate_command_names() {
        let mut config = base_config();
        config.commands = vec![spec("ping"), spec("ping")];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate command name 'ping' at index 1"), "{err}");
    }

    #[test]
    fn rejects_signed_subprocess_name() {
        let mut config = base_config();
        config.subprocesses = vec!["heartbeat".to_owned(), "!motd".to_owned()];
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("'!motd' at index 1"), "{err}");
    }

    #[test]
    fn rejects_signed_trigger_tokens() {
        let mut config = base_config();
        config.gifs.insert("!wave".to_owned(), "https://example.com/wave.gif".to_owned());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("gifs token '!wave'"), "{err}");
    }

    #[test]
    fn empty_args_accepts_any_arity() {
        let command = spec("ai");
        assert!(command.accepts_arity(0));
        assert!(command.accepts_arity(17));
    }

    #[test]
    fn single_empty_signature_means_zero_args() {
        let mut command = spec("ping");
        command.args = vec![vec![]];
        assert!(command.accepts_arity(0));
        assert!(!command.accepts_arity(1));
    }

    #[test]
    fn parses_yaml_shape() {
        let yaml = r#"
sign: "!"
debug: false
masters: ["@boss:example.org"]
commands:
  - command: ping
    description: liveness check
    args: [[]]
  - command: echo
    description: repeat the arguments
    aliases: [say, repeat]
    args: []
subprocesses: [heartbeat]
reacts:
  wave: "👋"
gifs:
  party: "https://example.com/party.gif"
"#;
        let config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.commands[1].aliases, vec!["say", "repeat"]);
        assert_eq!(config.reacts["wave"], "👋");
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "sign: \"!\"\ndebug: true\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!(config.debug);
        assert!(config.commands.is_empty());
    }
}
