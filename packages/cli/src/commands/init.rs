use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;
use weft_common::{Config, StateSavingMethod, DEFAULT_CONFIG_NAME};

const EXAMPLE_SCENARIO: &str = r##"{
  "name": "greeting",
  "templates": {
    "/hello": {
      "type": "weft.ViewRoot",
      "id": "root",
      "children": [
        {
          "type": "weft.Form",
          "id": "form",
          "children": [
            {
              "type": "weft.Input",
              "id": "name",
              "attributes": { "required": true, "validators": [{ "id": "length", "max": 20 }] },
              "bindings": { "value": "#{visitor.name}" }
            },
            { "type": "weft.Command", "id": "greet", "bindings": { "action": "#{visitor.greet}" } }
          ]
        }
      ]
    },
    "/welcome": { "type": "weft.ViewRoot", "id": "root" }
  },
  "navigation": [
    { "fromView": "/hello", "cases": [{ "fromOutcome": "greeted", "toView": "/welcome", "redirect": true }] }
  ],
  "model": { "visitor": { "name": "" } },
  "actions": {
    "visitor.greet": { "flash": { "notice": "Hello!" }, "outcome": "greeted" }
  },
  "requests": [
    { "viewId": "/hello" },
    { "viewId": "/hello", "postback": true, "params": { "form:name": "", "form:greet": "" } },
    { "viewId": "/hello", "postback": true, "params": { "form:name": "Ada", "form:greet": "" } },
    { "viewId": "/welcome" }
  ]
}
"##;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Where saved view state lives (server, client)
    #[arg(short, long, default_value = "server")]
    pub method: String,

    /// Force overwrite existing files
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = Config::path_in(cwd);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let method = match args.method.as_str() {
        "server" => StateSavingMethod::Server,
        "client" => StateSavingMethod::Client,
        other => return Err(anyhow::anyhow!("Unknown state saving method: {}. Use: server or client", other)),
    };

    println!("{}", "📝 Initializing weft project...".bright_blue().bold());

    let config = Config::default().with_state_saving_method(method);
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    let scenario_dir = cwd.join("scenarios");
    fs::create_dir_all(&scenario_dir)?;
    let example = scenario_dir.join("greeting.json");
    if !example.exists() || args.force {
        fs::write(&example, EXAMPLE_SCENARIO)?;
        println!("  {} Created scenarios/greeting.json", "✓".green());
    }

    println!();
    println!("Next: {}", "weft run scenarios".bright_white());
    Ok(())
}
