use clap::{Args, Subcommand, ValueEnum};

use crate::config::{Config, ConfigValue, ProjectConfig};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let config = config.redacted();
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_project("source", &config.source);
                        print_project("target", &config.target);

                        print_value("page_size", &config.page_size);
                        print_value("concurrency", &config.concurrency);
                        print_value("max_retries", &config.max_retries);
                    }
                }
                Ok(())
            }
        }
    }
}

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
}

fn print_optional(name: &str, value: &Option<ConfigValue<String>>) {
    match value {
        Some(value) => print_value(name, value),
        None => println!("{}: (not set)", name),
    }
}

fn print_project(side: &str, project: &ProjectConfig) {
    println!("[{}]", side);
    print_optional("project_key", &project.project_key);
    print_optional("client_id", &project.client_id);
    print_optional("client_secret", &project.client_secret);
    print_value("auth_url", &project.auth_url);
    print_value("api_url", &project.api_url);
    if project.scopes.value.is_empty() {
        println!("scopes: manage_project:<project_key>");
    } else {
        println!("scopes: {}", project.scopes.value.join(" "));
    }
    println!("  source: {}", project.scopes.source);
    println!();
}
